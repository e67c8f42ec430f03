//! Parsing engine
//!
//! [`CompiledParser`] is the entry point: it owns a handle on a resolved
//! [`Grammar`], the root node and a [`ParserConfig`]. Each call to
//! [`CompiledParser::parse`] creates a fresh [`ParseContext`] and walks the
//! arena from the root, dispatching on the atom tag.

use super::combinator::{Captures, Reject};
use super::context::{erase, take, MemoEntry, Outcome, ParseContext};
use super::error::{NodeId, ParseError};
use super::grammar::{Atom, Grammar, GrammarInner};
use super::stream::Stream;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

/// Default maximum input size (0 = unlimited)
pub const DEFAULT_MAX_INPUT_SIZE: usize = 0;

/// Default maximum atom nesting depth (0 = unlimited)
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 0;

/// Resource limits for a parser
///
/// # Example
///
/// ```rust
/// use sprout::ParserConfig;
///
/// let config = ParserConfig::new()
///     .with_max_input_size(1024 * 1024)
///     .with_max_recursion_depth(500);
/// assert_eq!(config.max_recursion_depth, 500);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Maximum input length in stream units
    pub max_input_size: usize,

    /// Maximum atom nesting depth
    pub max_recursion_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }
}

impl ParserConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum input size
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// Set the maximum recursion depth
    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }
}

/// Outcome of a top-level parse
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult<A, St, E> {
    /// The value, or the failure
    pub result: Result<A, ParseError<E>>,
    /// Final position, on success or failure
    pub consumed: usize,
    /// Final user state
    pub state: St,
}

impl<A, St, E> ParseResult<A, St, E> {
    /// Whether the parse succeeded
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Whether the parse failed
    #[inline]
    pub fn is_err(&self) -> bool {
        self.result.is_err()
    }

    /// The value, if the parse succeeded
    pub fn value(&self) -> Option<&A> {
        self.result.as_ref().ok()
    }

    /// The failure, if the parse failed
    pub fn error(&self) -> Option<&ParseError<E>> {
        self.result.as_ref().err()
    }

    /// Drop position and state
    pub fn into_result(self) -> Result<A, ParseError<E>> {
        self.result
    }
}

/// A rule of a resolved grammar, ready to parse
pub struct CompiledParser<S, A, St = (), E = ()> {
    grammar: Grammar<S, St, E>,
    root: NodeId,
    config: ParserConfig,
    marker: PhantomData<fn() -> A>,
}

impl<S, A, St, E> Clone for CompiledParser<S, A, St, E> {
    fn clone(&self) -> Self {
        Self {
            grammar: self.grammar.clone(),
            root: self.root,
            config: self.config,
            marker: PhantomData,
        }
    }
}

impl<S, A, St, E> fmt::Debug for CompiledParser<S, A, St, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledParser")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish()
    }
}

impl<S, A, St, E> CompiledParser<S, A, St, E>
where
    S: Stream,
    A: Clone + 'static,
    St: Clone + 'static,
    E: Clone + 'static,
{
    pub(crate) fn new(grammar: Grammar<S, St, E>, root: NodeId, config: ParserConfig) -> Self {
        Self {
            grammar,
            root,
            config,
            marker: PhantomData,
        }
    }

    /// Replace the resource limits
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    /// Current resource limits
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Root node of this parser
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The grammar this parser runs
    pub fn grammar(&self) -> &Grammar<S, St, E> {
        &self.grammar
    }

    /// Parse `input` from position 0 with initial `state`
    ///
    /// The input does not have to be consumed completely; compare
    /// [`ParseResult::consumed`] with the input length, or end the grammar
    /// with [`eof`](super::combinator::eof).
    pub fn parse(&self, input: &S, state: St) -> ParseResult<A, St, E> {
        let mut ctx = ParseContext::new(input, state);

        log_debug!(
            "Starting parse: input_len={}, root={}",
            input.len(),
            self.root
        );

        let outcome = if self.config.max_input_size > 0 && input.len() > self.config.max_input_size
        {
            Err(ParseError::at(0).with_message(format!(
                "input too large: {} units exceeds limit of {}",
                input.len(),
                self.config.max_input_size
            )))
        } else {
            let engine = Engine {
                grammar: &self.grammar.inner,
                config: self.config,
            };
            let outcome = engine.parse_atom(self.root, &mut ctx);
            match ctx.aborted.take() {
                Some(error) => Err(error),
                None => outcome,
            }
        };

        let root = self.root;
        let result = outcome.and_then(|value| {
            take::<A>(value).ok_or_else(|| ParseError::internal(0, root, "root value type mismatch"))
        });

        log_debug!(
            "Parse finished: ok={}, consumed={}",
            result.is_ok(),
            ctx.position
        );

        ParseResult {
            result,
            consumed: ctx.position,
            state: ctx.state,
        }
    }
}

impl<S: Stream, A, St, E> fmt::Display for CompiledParser<S, A, St, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.grammar.inner.describe(self.root))
    }
}

/// One parse call's view of the grammar
struct Engine<'g, S, St, E> {
    grammar: &'g GrammarInner<S, St, E>,
    config: ParserConfig,
}

impl<'g, S, St, E> Engine<'g, S, St, E>
where
    S: Stream,
    St: Clone + 'static,
    E: Clone + 'static,
{
    /// Run one node, enforcing the depth limit.
    ///
    /// Hitting the limit aborts the whole parse: the error is stored on the
    /// context and every later call returns it unchanged.
    fn parse_atom(&self, id: NodeId, ctx: &mut ParseContext<'_, S, St, E>) -> Outcome<E> {
        if let Some(error) = &ctx.aborted {
            return Err(error.clone());
        }

        ctx.depth += 1;
        let outcome = if self.config.max_recursion_depth > 0
            && ctx.depth > self.config.max_recursion_depth
        {
            log_debug!(
                "Recursion limit {} hit at node {} position {}",
                self.config.max_recursion_depth,
                id,
                ctx.position
            );
            let error = ParseError::at(ctx.position)
                .with_parser(id)
                .with_message("recursion limit exceeded");
            ctx.aborted = Some(error.clone());
            Err(error)
        } else {
            self.dispatch(id, ctx)
        };
        ctx.depth -= 1;

        match &ctx.aborted {
            Some(error) => Err(error.clone()),
            None => outcome,
        }
    }

    fn dispatch(&self, id: NodeId, ctx: &mut ParseContext<'_, S, St, E>) -> Outcome<E> {
        let Some(atom) = self.grammar.atoms.get(id.0) else {
            return Err(ParseError::internal(ctx.position, id, "node out of range"));
        };
        let start = ctx.position;

        match atom {
            Atom::Exact { literal, value } => {
                if ctx.input.matches_at(start, literal) {
                    ctx.position += literal.len();
                    Ok(Rc::clone(value))
                } else {
                    Err(ParseError::at(start).with_parser(id))
                }
            }

            Atom::Charset { set, read, .. } => match read(ctx.input, start) {
                Some((c, width)) if set.contains(c) => {
                    ctx.position += width;
                    Ok(erase(c))
                }
                Some(_) => Err(ParseError::at(start).with_parser(id)),
                None => Err(ParseError::at(start).with_parser(id).with_message("EOF")),
            },

            Atom::Pattern { regex, text, .. } => {
                let caps = text(ctx.input)
                    .get(start..)
                    .and_then(|rest| regex.captures(rest));
                match caps {
                    Some(caps) => {
                        ctx.position += caps.get(0).map_or(0, |m| m.end());
                        Ok(erase(Captures::from_regex(&caps)))
                    }
                    None => Err(ParseError::at(start).with_parser(id)),
                }
            }

            Atom::Empty => Ok(erase(())),

            Atom::Eof => {
                if start >= ctx.input.len() {
                    Ok(erase(()))
                } else {
                    Err(ParseError::at(start)
                        .with_parser(id)
                        .with_message("expected end of input"))
                }
            }

            Atom::Fail {
                message,
                user_error,
            } => {
                let mut error = ParseError::at(start)
                    .with_parser(id)
                    .with_message(message.clone());
                error.user_error = user_error.clone();
                Err(error)
            }

            Atom::Custom { f, .. } => match f(ctx.input, start, &ctx.state) {
                Ok((value, consumed)) => {
                    ctx.position = (start + consumed).min(ctx.input.len());
                    Ok(value)
                }
                Err(Reject::Fail) => Err(ParseError::at(start).with_parser(id)),
                Err(Reject::Message(message)) => Err(ParseError::at(start)
                    .with_parser(id)
                    .with_message(message)),
                Err(Reject::User(user_error)) => Err(ParseError::at(start)
                    .with_parser(id)
                    .with_user_error(user_error)),
            },

            Atom::Map { inner, f } => {
                let outcome = self.parse_atom(*inner, ctx);
                ctx.range = (start, ctx.position);
                f(outcome, &ctx.token_ctx(id))
            }

            Atom::StateF { inner, f } => {
                let outcome = self.parse_atom(*inner, ctx);
                if outcome.is_ok() {
                    ctx.range = (start, ctx.position);
                    let next = f(&ctx.state, &ctx.token_ctx(id));
                    ctx.state = next;
                }
                outcome
            }

            Atom::Sequence { items, collect } => {
                let mut values = Vec::with_capacity(items.len());
                for &item in items {
                    values.push(self.parse_atom(item, ctx)?);
                }
                collect(values)
                    .ok_or_else(|| ParseError::internal(start, id, "sequence value type mismatch"))
            }

            Atom::Alternation { alts } => self.parse_alternation(id, alts, ctx),

            Atom::Optional { inner, some, none } => {
                let snapshot = ctx.snapshot();
                match self.parse_atom(*inner, ctx) {
                    Ok(value) => some(value).ok_or_else(|| {
                        ParseError::internal(start, id, "optional value type mismatch")
                    }),
                    Err(_) if ctx.position == start && !ctx.is_aborted() => {
                        ctx.restore(snapshot);
                        Ok(Rc::clone(none))
                    }
                    Err(e) => Err(e),
                }
            }

            Atom::Try { inner } => {
                let snapshot = ctx.snapshot();
                let outcome = self.parse_atom(*inner, ctx);
                if outcome.is_err() && !ctx.is_aborted() {
                    ctx.restore(snapshot);
                }
                outcome
            }

            Atom::Lookahead {
                inner,
                look,
                negative,
            } => {
                let value = self.parse_atom(*inner, ctx)?;
                let snapshot = ctx.snapshot();
                let position = ctx.position;
                let looked = self.parse_atom(*look, ctx);
                if ctx.is_aborted() {
                    return looked;
                }
                let matched = looked.is_ok();
                ctx.restore(snapshot);

                if matched == *negative {
                    let message = if *negative {
                        "unexpected match of negative lookahead"
                    } else {
                        "expected lookahead to match"
                    };
                    return Err(ParseError::at(position)
                        .with_parser(id)
                        .with_message(message));
                }
                Ok(value)
            }

            Atom::Repeat {
                inner,
                min,
                max,
                collect,
            } => {
                // State is copied only when a state function can run under `inner`
                let tracks_state = self.grammar.writes_state(*inner);
                let mut values = Vec::new();
                while max.map_or(true, |max| values.len() < max) {
                    let before = ctx.position;
                    let saved = tracks_state.then(|| ctx.state.clone());
                    match self.parse_atom(*inner, ctx) {
                        Ok(value) => {
                            values.push(value);
                            // A zero-width iteration would repeat forever
                            if ctx.position == before && values.len() >= *min {
                                break;
                            }
                        }
                        Err(e) => {
                            if ctx.is_aborted() || ctx.position != before || values.len() < *min {
                                return Err(e);
                            }
                            ctx.position = before;
                            if let Some(state) = saved {
                                ctx.state = state;
                            }
                            break;
                        }
                    }
                }
                collect(values)
                    .ok_or_else(|| ParseError::internal(start, id, "repeat value type mismatch"))
            }

            Atom::Reference { .. } => Err(ParseError::internal(start, id, "unresolved reference")),

            Atom::LeftRecursion { inner } => self.parse_left_recursion(id, *inner, ctx),
        }
    }

    fn parse_alternation(
        &self,
        id: NodeId,
        alts: &[NodeId],
        ctx: &mut ParseContext<'_, S, St, E>,
    ) -> Outcome<E> {
        let (start, state) = ctx.snapshot();
        let mut last = None;

        for &alt in alts {
            match self.parse_atom(alt, ctx) {
                Ok(value) => return Ok(value),
                Err(e) if ctx.position != start || ctx.is_aborted() => return Err(e),
                Err(e) => {
                    ctx.restore((start, state.clone()));
                    last = Some(e);
                }
            }
        }

        Err(last.unwrap_or_else(|| ParseError::internal(start, id, "empty alternation")))
    }

    /// Grow a seed for `id` at the current position until it stops advancing
    fn parse_left_recursion(
        &self,
        id: NodeId,
        inner: NodeId,
        ctx: &mut ParseContext<'_, S, St, E>,
    ) -> Outcome<E> {
        let start = ctx.position;
        if let Some(result) = replay_seed(ctx, id, start) {
            return result;
        }

        let start_state = ctx.state.clone();
        ctx.memo_insert(
            id,
            start,
            MemoEntry {
                position: start,
                state: start_state.clone(),
                result: Err(ParseError::at(start).with_parser(id)),
            },
        );

        loop {
            ctx.position = start;
            ctx.state = start_state.clone();

            let outcome = self.parse_atom(inner, ctx);
            if ctx.is_aborted() {
                return outcome;
            }
            let end = ctx.position;

            let Some(best) = ctx.memo_get(id, start).map(|seed| seed.position) else {
                return Err(ParseError::internal(start, id, "left recursion seed missing"));
            };
            if end <= best {
                return replay_seed(ctx, id, start).unwrap_or_else(|| {
                    Err(ParseError::internal(start, id, "left recursion seed missing"))
                });
            }
            if outcome.is_err() {
                return outcome;
            }

            log_trace!("Left recursion {} at {} grew to {}", id, start, end);

            let state = ctx.state.clone();
            if let Some(seed) = ctx.memo_get_mut(id, start) {
                seed.position = end;
                seed.state = state;
                seed.result = outcome;
            }
        }
    }
}

/// Restore the seed's end position and state, returning its result
fn replay_seed<S, St, E>(
    ctx: &mut ParseContext<'_, S, St, E>,
    id: NodeId,
    start: usize,
) -> Option<Outcome<E>>
where
    S: Stream,
    St: Clone,
    E: Clone,
{
    let (position, state, result) = {
        let seed = ctx.memo_get(id, start)?;
        (seed.position, seed.state.clone(), seed.result.clone())
    };
    ctx.position = position;
    ctx.state = state;
    Some(result)
}
