//! Sprout - Parser Combinators with Left Recursion
//!
//! A generic parser-combinator engine. Parsers are built from typed
//! combinators, tied together with named rule references, resolved into a
//! grammar, and run over any input that implements [`Stream`]. It provides:
//! - Typed values and user state threaded through every parser
//! - Ordered choice that commits once an alternative has consumed input
//! - Direct left recursion through seed growing (`left_recur`)
//! - Construction-time checks (unresolved rules, nullable repetition)
//! - Errors that carry a position, the failing node and a user payload
//! - Grammar lints (unguarded left recursion, unreachable alternatives)
//!
//! ## Quick Start
//!
//! ```rust
//! use sprout::prelude::*;
//!
//! let digit: Parser<String, char> = charset(CharSet::range('0', '9'));
//! let number = digit.some().map(|ds, _| ds.into_iter().collect::<String>());
//!
//! let parser = number.compile().unwrap();
//! let result = parser.parse(&"123abc".to_string(), ());
//! assert_eq!(result.result, Ok("123".to_string()));
//! assert_eq!(result.consumed, 3);
//! ```
//!
//! ## Left Recursion
//!
//! ```rust
//! use sprout::prelude::*;
//!
//! let num: Parser<String, i64> = regex("[0-9]+")
//!     .map(|caps, _| caps.as_str().parse::<i64>().unwrap_or(0));
//! let sum = reference::<String, i64, (), ()>("sum")
//!     .then_l(exact("+"))
//!     .and(num.clone())
//!     .map(|(a, b), _| a + b)
//!     .or(num)
//!     .left_recur();
//!
//! let grammar = GrammarBuilder::new().rule("sum", sum).build().unwrap();
//! let parser = grammar.parser::<i64>("sum").unwrap();
//! assert_eq!(parser.parse(&"1+2+3".to_string(), ()).result, Ok(6));
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
#![allow(clippy::module_inception)]
#![allow(clippy::type_complexity)]

// Logging macros - no-op when logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "logging"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => { log::trace!($($arg)*) };
}

#[cfg(feature = "logging")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

// Prelude module for convenient imports
pub mod prelude;

// Parsing engine
pub mod engine;

/// Re-export commonly used types for convenience
pub use engine::{
    // Diagnostics
    analysis::{GrammarAnalyzer, GrammarWarning, WarningKind},
    // Construction
    charset::CharSet,
    combinator::{Captures, Parser, Reject},
    // Execution
    context::{ParseContext, TokenCtx},
    error::{GrammarError, NodeId, ParseError},
    grammar::{Grammar, GrammarBuilder},
    parser::{CompiledParser, ParseResult, ParserConfig},
    source_location::SourcePosition,
    stream::{CharStream, Stream},
};
