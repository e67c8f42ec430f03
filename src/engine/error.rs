//! Error types
//!
//! Two kinds of error exist and they never mix:
//!
//! - [`ParseError`] is data produced while parsing. It is returned as an
//!   ordinary value and carries the failing position, the failing node and an
//!   optional user payload.
//! - [`GrammarError`] is a construction-time contract violation detected while
//!   a grammar is resolved. A grammar that produces one can never be parsed
//!   with.

use super::source_location::SourcePosition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a node in a resolved grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Index of the node in its grammar's arena
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A failed match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseError<E> {
    /// Offset at which the failing node started matching
    pub position: usize,
    /// The node that failed
    pub parser: Option<NodeId>,
    /// Fixed message from the failing node, if any
    pub message: Option<String>,
    /// Payload reported by the grammar author
    pub user_error: Option<E>,
}

impl<E> ParseError<E> {
    /// Bare failure at `position`
    #[inline]
    pub fn at(position: usize) -> Self {
        Self {
            position,
            parser: None,
            message: None,
            user_error: None,
        }
    }

    /// Attribute the failure to a node
    #[inline]
    pub fn with_parser(mut self, parser: NodeId) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Attach a message
    #[inline]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach a user payload
    #[inline]
    pub fn with_user_error(mut self, user_error: E) -> Self {
        self.user_error = Some(user_error);
        self
    }

    /// Failure caused by a broken engine invariant rather than the input
    pub(crate) fn internal(position: usize, parser: NodeId, what: &str) -> Self {
        Self::at(position)
            .with_parser(parser)
            .with_message(format!("internal: {}", what))
    }

    /// Rewrite the user payload, keeping position and attribution
    pub fn map_user_error<F, E2>(self, f: F) -> ParseError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        ParseError {
            position: self.position,
            parser: self.parser,
            message: self.message,
            user_error: self.user_error.map(f),
        }
    }

    /// Line and column of the failure in a text input
    pub fn source_position(&self, input: &str) -> SourcePosition {
        SourcePosition::from_offset(input, self.position)
    }
}

impl<E: Serialize> ParseError<E> {
    /// Serialize to JSON
    #[inline]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl<E: fmt::Debug> fmt::Display for ParseError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse failed at position {}", self.position)?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        if let Some(parser) = self.parser {
            write!(f, " (parser {})", parser)?;
        }
        if let Some(user_error) = &self.user_error {
            write!(f, " [{:?}]", user_error)?;
        }
        Ok(())
    }
}

impl<E: fmt::Debug> std::error::Error for ParseError<E> {}

/// Invalid grammar detected during resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// A sequence with no elements
    EmptySequence,

    /// An alternation with no alternatives
    EmptyAlternation,

    /// An exact matcher with an empty literal
    EmptyLiteral,

    /// Repetition of a parser that can succeed without consuming
    NullableRepeat {
        /// Description of the repeated parser
        parser: String,
    },

    /// Left recursion around a parser that can succeed without consuming
    NullableLeftRecursion {
        /// Description of the wrapped parser
        parser: String,
    },

    /// Repetition bounds with `min > max`
    InvalidRepeatBounds {
        /// Lower bound
        min: usize,
        /// Upper bound
        max: usize,
    },

    /// A reference names a rule that does not exist
    UnresolvedReference {
        /// The missing rule name
        name: String,
    },

    /// Rules that only refer to each other and never reach a parser
    CyclicReference {
        /// A rule on the cycle
        name: String,
    },

    /// Two rules with the same name
    DuplicateRule {
        /// The repeated name
        name: String,
    },

    /// Entry point or reference asked for a rule by an unknown name
    UnknownRule {
        /// The requested name
        name: String,
    },

    /// A rule produces a different value type than its user expects
    TypeMismatch {
        /// The rule name
        name: String,
        /// Type the reference or entry point expects
        expected: &'static str,
        /// Type the rule produces
        found: &'static str,
    },

    /// A regex leaf failed to compile
    InvalidPattern {
        /// The pattern source
        pattern: String,
        /// Compiler message
        reason: String,
    },

    /// A character-set pattern could not be parsed
    InvalidCharset {
        /// The pattern source
        pattern: String,
        /// What is wrong with it
        reason: String,
    },
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarError::EmptySequence => write!(f, "Sequence can not be empty"),
            GrammarError::EmptyAlternation => write!(f, "Alternation can not be empty"),
            GrammarError::EmptyLiteral => {
                write!(f, "Exact match of an empty literal, use empty() instead")
            }
            GrammarError::NullableRepeat { parser } => {
                write!(f, "Repeat on nullable parser: {}", parser)
            }
            GrammarError::NullableLeftRecursion { parser } => {
                write!(f, "Left recursion on nullable parser: {}", parser)
            }
            GrammarError::InvalidRepeatBounds { min, max } => {
                write!(f, "Invalid repeat bounds: min {} exceeds max {}", min, max)
            }
            GrammarError::UnresolvedReference { name } => {
                write!(f, "Referenced rule does not exist: {}", name)
            }
            GrammarError::CyclicReference { name } => {
                write!(f, "Rule {} only refers to itself through references", name)
            }
            GrammarError::DuplicateRule { name } => {
                write!(f, "Rule defined more than once: {}", name)
            }
            GrammarError::UnknownRule { name } => write!(f, "Unknown rule: {}", name),
            GrammarError::TypeMismatch {
                name,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Rule {} produces {} but {} was expected",
                    name, found, expected
                )
            }
            GrammarError::InvalidPattern { pattern, reason } => {
                write!(f, "Invalid pattern {:?}: {}", pattern, reason)
            }
            GrammarError::InvalidCharset { pattern, reason } => {
                write!(f, "Invalid charset {:?}: {}", pattern, reason)
            }
        }
    }
}

impl std::error::Error for GrammarError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_methods() {
        let err: ParseError<&str> = ParseError::at(4)
            .with_parser(NodeId(2))
            .with_message("EOF")
            .with_user_error("boom");
        assert_eq!(err.position, 4);
        assert_eq!(err.parser, Some(NodeId(2)));
        assert_eq!(err.message.as_deref(), Some("EOF"));
        assert_eq!(err.user_error, Some("boom"));
    }

    #[test]
    fn test_display() {
        let err: ParseError<()> = ParseError::at(3).with_parser(NodeId(7)).with_message("EOF");
        assert_eq!(err.to_string(), "Parse failed at position 3: EOF (parser #7)");
    }

    #[test]
    fn test_map_user_error() {
        let err: ParseError<u32> = ParseError::at(1).with_user_error(2);
        let mapped = err.map_user_error(|n| format!("code {}", n));
        assert_eq!(mapped.user_error.as_deref(), Some("code 2"));
        assert_eq!(mapped.position, 1);
    }

    #[test]
    fn test_to_json_round_trip() {
        let err: ParseError<String> = ParseError::at(5)
            .with_parser(NodeId(1))
            .with_user_error("bad digit".to_string());
        let json = err.to_json().unwrap();
        let back: ParseError<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_source_position() {
        let err: ParseError<()> = ParseError::at(6);
        let pos = err.source_position("ab\ncdef");
        assert_eq!((pos.line, pos.column), (2, 4));
    }

    #[test]
    fn test_grammar_error_display() {
        let err = GrammarError::UnresolvedReference {
            name: "expr".to_string(),
        };
        assert_eq!(err.to_string(), "Referenced rule does not exist: expr");
    }
}
