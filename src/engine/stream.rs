//! Input stream contract
//!
//! Every input type the engine parses implements [`Stream`]: a length,
//! positional slicing that yields the same stream type, and structural
//! comparison against a literal. Character-level matchers additionally need
//! [`CharStream`], which exposes code points and a `&str` view.
//!
//! Positions are measured in the stream's own units. For `String` that is
//! UTF-8 bytes, so a single code point may advance the position by up to 4.

use std::fmt;

/// An addressable input sequence
pub trait Stream: Clone + PartialEq + fmt::Debug + 'static {
    /// Number of units in the stream
    fn len(&self) -> usize;

    /// Whether the stream has no units
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out `[start, end)` as a new stream
    ///
    /// Out-of-range bounds are clamped to the stream length.
    fn slice(&self, start: usize, end: usize) -> Self;

    /// Whether the units starting at `pos` are structurally equal to `literal`
    #[inline]
    fn matches_at(&self, pos: usize, literal: &Self) -> bool {
        let end = pos + literal.len();
        end <= self.len() && self.slice(pos, end) == *literal
    }
}

/// A stream of Unicode text
pub trait CharStream: Stream {
    /// The code point starting at `pos` and its width in stream units
    fn char_at(&self, pos: usize) -> Option<(char, usize)>;

    /// The whole stream as text
    fn text(&self) -> &str;
}

impl Stream for String {
    #[inline]
    fn len(&self) -> usize {
        str::len(self)
    }

    fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(str::len(self));
        let start = start.min(end);
        self.get(start..end).map(str::to_owned).unwrap_or_default()
    }

    #[inline]
    fn matches_at(&self, pos: usize, literal: &Self) -> bool {
        self.as_bytes()
            .get(pos..)
            .is_some_and(|rest| rest.starts_with(literal.as_bytes()))
    }
}

impl CharStream for String {
    #[inline]
    fn char_at(&self, pos: usize) -> Option<(char, usize)> {
        self.get(pos..)?.chars().next().map(|c| (c, c.len_utf8()))
    }

    #[inline]
    fn text(&self) -> &str {
        self.as_str()
    }
}

impl<T> Stream for Vec<T>
where
    T: Clone + PartialEq + fmt::Debug + 'static,
{
    #[inline]
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(<[T]>::len(self));
        let start = start.min(end);
        self[start..end].to_vec()
    }

    #[inline]
    fn matches_at(&self, pos: usize, literal: &Self) -> bool {
        self.get(pos..)
            .is_some_and(|rest| rest.starts_with(literal.as_slice()))
    }
}
