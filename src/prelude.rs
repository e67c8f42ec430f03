//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types, traits and
//! combinator functions:
//!
//! ```
//! use sprout::prelude::*;
//! ```
//!
//! # Re-exported Items
//!
//! ## Core Types
//! - [`Parser`] - Typed parser handle
//! - [`GrammarBuilder`] / [`Grammar`] - Named rules and their resolution
//! - [`CompiledParser`] - Resolved entry point
//! - [`ParseResult`] - Value, consumed length and final state
//! - [`ParserConfig`] - Resource limits
//!
//! ## Combinators
//! - [`exact()`], [`charset()`], [`one_of()`], [`none_of()`], [`regex()`]
//! - [`empty()`], [`eof()`], [`fail()`], [`fail_with()`], [`from_fn()`]
//! - [`seq()`], [`alt()`], [`reference()`], [`left_recur()`]
//!
//! ## Errors
//! - [`ParseError`] - Failed match
//! - [`GrammarError`] - Invalid grammar

// ============================================================================
// Core Types
// ============================================================================

pub use crate::engine::{
    CharSet, CharStream, CompiledParser, Grammar, GrammarBuilder, NodeId, ParseResult, Parser,
    ParserConfig, Stream, TokenCtx,
};

// ============================================================================
// Combinators
// ============================================================================

pub use crate::engine::combinator::{
    alt, charset, empty, eof, exact, fail, fail_with, from_fn, left_recur, none_of, one_of,
    reference, regex, seq, Captures, Reject,
};

// ============================================================================
// Errors and Diagnostics
// ============================================================================

pub use crate::engine::{
    GrammarError, GrammarWarning, ParseError, SourcePosition, WarningKind,
};
