//! Mutable parsing context
//!
//! One [`ParseContext`] exists per top-level parse call. It is created by the
//! entry point, borrowed mutably by whichever atom is executing, and dropped
//! when the call returns. Nothing in the engine keeps it beyond that.

use super::error::{NodeId, ParseError};
use super::stream::Stream;
use hashbrown::HashMap;
use std::any::Any;
use std::rc::Rc;

/// Type-erased parse value
///
/// Typed [`Parser`](super::combinator::Parser) handles guarantee that the
/// value stored under a node always has that node's declared type.
pub(crate) type Value = Rc<dyn Any>;

/// What a single atom returns
pub(crate) type Outcome<E> = Result<Value, ParseError<E>>;

/// Wrap a typed value
#[inline]
pub(crate) fn erase<A: 'static>(value: A) -> Value {
    Rc::new(value)
}

/// Recover a typed value, cloning only when the value is shared
#[inline]
pub(crate) fn take<A: Clone + 'static>(value: Value) -> Option<A> {
    let value = value.downcast::<A>().ok()?;
    Some(Rc::try_unwrap(value).unwrap_or_else(|shared| (*shared).clone()))
}

/// A left-recursion seed for one `(node, start position)` pair
pub(crate) struct MemoEntry<St, E> {
    /// End position of the best result so far
    pub position: usize,
    /// State at that end position
    pub state: St,
    /// Best result so far
    pub result: Outcome<E>,
}

/// Mutable state for one parse call
pub struct ParseContext<'a, S, St, E> {
    /// The whole input
    pub(crate) input: &'a S,

    /// Current offset into the input
    pub position: usize,

    /// Current user state
    pub state: St,

    /// Span of the most recently completed mapped sub-match
    pub range: (usize, usize),

    /// Left-recursion seeds, keyed by node then start position
    pub(crate) memo: HashMap<NodeId, HashMap<usize, MemoEntry<St, E>>>,

    /// Current atom nesting depth
    pub(crate) depth: usize,

    /// Set once a resource limit trips; no combinator may backtrack past it
    pub(crate) aborted: Option<ParseError<E>>,
}

impl<'a, S: Stream, St: Clone, E: Clone> ParseContext<'a, S, St, E> {
    /// Create a fresh context at position 0
    pub fn new(input: &'a S, state: St) -> Self {
        Self {
            input,
            position: 0,
            state,
            range: (0, 0),
            memo: HashMap::new(),
            depth: 0,
            aborted: None,
        }
    }

    /// Whether a resource limit has ended the parse
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// The input being parsed
    #[inline]
    pub fn input(&self) -> &'a S {
        self.input
    }

    /// Copy of position and state for a later [`restore`](Self::restore)
    #[inline]
    pub fn snapshot(&self) -> (usize, St) {
        (self.position, self.state.clone())
    }

    /// Reset position and state to a snapshot
    #[inline]
    pub fn restore(&mut self, snapshot: (usize, St)) {
        self.position = snapshot.0;
        self.state = snapshot.1;
    }

    /// Read-only view handed to transforms after a match of `node`
    #[inline]
    pub(crate) fn token_ctx(&self, node: NodeId) -> TokenCtx<'_, S, St> {
        TokenCtx {
            input: self.input,
            range: self.range,
            state: &self.state,
            node,
        }
    }

    /// Seed recorded for `node` at `position`, if any
    #[inline]
    pub(crate) fn memo_get(&self, node: NodeId, position: usize) -> Option<&MemoEntry<St, E>> {
        self.memo.get(&node)?.get(&position)
    }

    /// Seed recorded for `node` at `position`, mutably
    #[inline]
    pub(crate) fn memo_get_mut(
        &mut self,
        node: NodeId,
        position: usize,
    ) -> Option<&mut MemoEntry<St, E>> {
        self.memo.get_mut(&node)?.get_mut(&position)
    }

    /// Record a seed for `node` at `position`
    #[inline]
    pub(crate) fn memo_insert(&mut self, node: NodeId, position: usize, entry: MemoEntry<St, E>) {
        self.memo.entry(node).or_default().insert(position, entry);
    }
}

/// What a transform sees about the match it is transforming
pub struct TokenCtx<'c, S, St> {
    input: &'c S,
    range: (usize, usize),
    state: &'c St,
    node: NodeId,
}

impl<'c, S: Stream, St> TokenCtx<'c, S, St> {
    /// The whole input
    #[inline]
    pub fn input(&self) -> &'c S {
        self.input
    }

    /// `[start, end)` of the match
    #[inline]
    pub fn range(&self) -> (usize, usize) {
        self.range
    }

    /// Offset where the match started
    #[inline]
    pub fn start(&self) -> usize {
        self.range.0
    }

    /// Offset where the match ended
    #[inline]
    pub fn end(&self) -> usize {
        self.range.1
    }

    /// The matched input
    #[inline]
    pub fn span(&self) -> S {
        self.input.slice(self.range.0, self.range.1)
    }

    /// User state at the end of the match
    #[inline]
    pub fn state(&self) -> &'c St {
        self.state
    }

    /// The node running the transform
    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }
}
