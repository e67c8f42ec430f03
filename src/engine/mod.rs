//! Parsing engine
//!
//! # Module Organization
//!
//! ## Construction
//! - [`combinator`] - Typed [`Parser`] handles and the combinator API
//! - [`grammar`] - Named rules, resolution into a [`Grammar`]
//! - [`charset`] - Character sets for single-character leaves
//!
//! ## Execution
//! - [`parser`] - [`CompiledParser`], [`ParserConfig`], [`ParseResult`]
//! - [`context`] - Per-call [`ParseContext`] and the [`TokenCtx`] handed to transforms
//! - [`stream`] - Input abstraction ([`Stream`], [`CharStream`])
//!
//! ## Diagnostics
//! - [`error`] - [`ParseError`] and [`GrammarError`]
//! - [`analysis`] - Nullability, first-sets and grammar lints
//! - [`source_location`] - Line/column tracking

// ============================================================================
// Module Declarations
// ============================================================================

pub mod analysis;
pub mod charset;
pub mod combinator;
pub mod context;
pub mod error;
pub mod grammar;
pub mod parser;
pub mod regex_cache;
pub mod source_location;
pub mod stream;

// ============================================================================
// Re-exports
// ============================================================================

pub use analysis::{GrammarAnalyzer, GrammarWarning, WarningKind};
pub use charset::CharSet;
pub use combinator::{
    alt, charset, empty, eof, exact, fail, fail_with, from_fn, left_recur, none_of, one_of,
    reference, regex, seq, Captures, Parser, Reject, ROOT_RULE,
};
pub use context::{ParseContext, TokenCtx};
pub use error::{GrammarError, NodeId, ParseError};
pub use grammar::{Grammar, GrammarBuilder};
pub use parser::{CompiledParser, ParseResult, ParserConfig};
pub use source_location::SourcePosition;
pub use stream::{CharStream, Stream};
