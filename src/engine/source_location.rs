//! Source location utilities
//!
//! Converts byte offsets reported by the engine into line/column positions
//! so callers can render "parsed N units, then failed at line L" messages.

use std::fmt;

/// A position in source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    /// Byte offset from start of input
    pub offset: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, counted in characters)
    pub column: usize,
}

impl SourcePosition {
    /// Create a new source position
    #[inline]
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// Calculate position from an offset in the input
    pub fn from_offset(input: &str, offset: usize) -> Self {
        let offset = offset.min(input.len());

        let mut line = 1;
        let mut column = 1;

        for (at, ch) in input.char_indices() {
            if at >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }

        Self {
            offset,
            line,
            column,
        }
    }

    /// The full line of `input` containing this position, without its newline
    pub fn line_text<'a>(&self, input: &'a str) -> &'a str {
        let offset = self.offset.min(input.len());
        let start = input[..offset].rfind('\n').map_or(0, |i| i + 1);
        let end = input[offset..]
            .find('\n')
            .map_or(input.len(), |i| offset + i);
        &input[start..end]
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}
