//! Parser combinators
//!
//! A [`Parser`] is a typed, cheaply clonable handle to a construction-time
//! expression. Expressions never point at each other cyclically: recursion is
//! expressed with [`reference`], which names a rule that is bound later by
//! [`GrammarBuilder::build`](super::grammar::GrammarBuilder::build).
//!
//! # Example
//!
//! ```rust
//! use sprout::prelude::*;
//!
//! let digits: Parser<String, Vec<char>> = charset(CharSet::range('0', '9')).some();
//! let parser = digits.compile().unwrap();
//!
//! let result = parser.parse(&"123abc".to_string(), ());
//! assert_eq!(result.result, Ok(vec!['1', '2', '3']));
//! assert_eq!(result.consumed, 3);
//! ```

use super::charset::CharSet;
use super::context::{erase, take, Outcome, TokenCtx, Value};
use super::error::{GrammarError, ParseError};
use super::grammar::GrammarBuilder;
use super::parser::CompiledParser;
use super::stream::{CharStream, Stream};
use std::any::{type_name, TypeId};
use std::marker::PhantomData;
use std::rc::Rc;

/// Rule name used by [`Parser::compile`]
pub const ROOT_RULE: &str = "<root>";

pub(crate) type MapFn<S, St, E> = Rc<dyn Fn(Outcome<E>, &TokenCtx<'_, S, St>) -> Outcome<E>>;
pub(crate) type StateFn<S, St> = Rc<dyn Fn(&St, &TokenCtx<'_, S, St>) -> St>;
pub(crate) type CollectFn = Rc<dyn Fn(Vec<Value>) -> Option<Value>>;
pub(crate) type WrapFn = Rc<dyn Fn(Value) -> Option<Value>>;
pub(crate) type CustomFn<S, St, E> = Rc<dyn Fn(&S, usize, &St) -> Result<(Value, usize), Reject<E>>>;
pub(crate) type ReadChar<S> = fn(&S, usize) -> Option<(char, usize)>;
pub(crate) type ReadText<S> = fn(&S) -> &str;

/// Static type of the values a rule produces
#[derive(Debug, Clone, Copy)]
pub(crate) struct TypeTag {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeTag {
    pub fn of<A: 'static>() -> Self {
        Self {
            id: TypeId::of::<A>(),
            name: type_name::<A>(),
        }
    }
}

/// How a [`from_fn`] leaf reports a failed match
#[derive(Debug, Clone, PartialEq)]
pub enum Reject<E> {
    /// Plain failure
    Fail,
    /// Failure with a message
    Message(String),
    /// Failure with a user payload
    User(E),
}

/// Groups matched by a [`regex`] leaf
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Captures {
    groups: Vec<Option<String>>,
}

impl Captures {
    pub(crate) fn from_regex(caps: &::regex::Captures<'_>) -> Self {
        Self {
            groups: caps
                .iter()
                .map(|group| group.map(|m| m.as_str().to_string()))
                .collect(),
        }
    }

    /// The whole match
    pub fn as_str(&self) -> &str {
        self.get(0).unwrap_or("")
    }

    /// Group `i`, if it participated in the match
    pub fn get(&self, i: usize) -> Option<&str> {
        self.groups.get(i)?.as_deref()
    }

    /// Number of groups including group 0
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups at all
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Construction-time expression
pub(crate) enum Expr<S, St, E> {
    Exact {
        literal: S,
        value: Value,
    },
    Charset {
        set: CharSet,
        label: String,
        read: ReadChar<S>,
    },
    Pattern {
        source: String,
        text: ReadText<S>,
    },
    Empty,
    Eof,
    Fail {
        message: String,
        user_error: Option<E>,
    },
    Custom {
        name: String,
        f: CustomFn<S, St, E>,
    },
    Map {
        inner: Rc<Expr<S, St, E>>,
        f: MapFn<S, St, E>,
    },
    StateF {
        inner: Rc<Expr<S, St, E>>,
        f: StateFn<S, St>,
    },
    Sequence {
        items: Vec<Rc<Expr<S, St, E>>>,
        collect: CollectFn,
    },
    Alternation {
        alts: Vec<Rc<Expr<S, St, E>>>,
    },
    Optional {
        inner: Rc<Expr<S, St, E>>,
        some: WrapFn,
        none: Value,
    },
    Try {
        inner: Rc<Expr<S, St, E>>,
    },
    Lookahead {
        inner: Rc<Expr<S, St, E>>,
        look: Rc<Expr<S, St, E>>,
        negative: bool,
    },
    Repeat {
        inner: Rc<Expr<S, St, E>>,
        min: usize,
        max: Option<usize>,
        collect: CollectFn,
    },
    Reference {
        name: String,
        expected: TypeTag,
    },
    LeftRecursion {
        inner: Rc<Expr<S, St, E>>,
    },
}

/// A typed parser producing values of type `A`
///
/// `S` is the input stream, `St` the user state threaded through the parse
/// and `E` the user error payload.
pub struct Parser<S, A, St = (), E = ()> {
    pub(crate) expr: Rc<Expr<S, St, E>>,
    marker: PhantomData<fn() -> A>,
}

impl<S, A, St, E> Clone for Parser<S, A, St, E> {
    fn clone(&self) -> Self {
        Self {
            expr: Rc::clone(&self.expr),
            marker: PhantomData,
        }
    }
}

impl<S, A, St, E> Parser<S, A, St, E> {
    #[inline]
    fn from_expr(expr: Expr<S, St, E>) -> Self {
        Self::from_rc(Rc::new(expr))
    }

    #[inline]
    fn from_rc(expr: Rc<Expr<S, St, E>>) -> Self {
        Self {
            expr,
            marker: PhantomData,
        }
    }
}

fn mismatch<A, S: Stream, St, E>(ctx: &TokenCtx<'_, S, St>) -> ParseError<E> {
    ParseError::internal(
        ctx.start(),
        ctx.node(),
        &format!("expected a value of type {}", type_name::<A>()),
    )
}

fn collect_vec<A: Clone + 'static>() -> CollectFn {
    Rc::new(|values: Vec<Value>| {
        let items: Option<Vec<A>> = values.into_iter().map(take::<A>).collect();
        items.map(erase)
    })
}

fn pick(n: usize) -> CollectFn {
    Rc::new(move |mut values: Vec<Value>| (n < values.len()).then(|| values.swap_remove(n)))
}

impl<S, A, St, E> Parser<S, A, St, E>
where
    S: Stream,
    A: Clone + 'static,
    St: Clone + 'static,
    E: Clone + 'static,
{
    /// Wrap a raw map function, fusing with an existing map node
    fn compose<B>(self, f: MapFn<S, St, E>) -> Parser<S, B, St, E> {
        match &*self.expr {
            Expr::Map { inner, f: g } => {
                let g = Rc::clone(g);
                Parser::from_expr(Expr::Map {
                    inner: Rc::clone(inner),
                    f: Rc::new(move |r: Outcome<E>, ctx: &TokenCtx<'_, S, St>| f(g(r, ctx), ctx)),
                })
            }
            _ => Parser::from_expr(Expr::Map {
                inner: self.expr,
                f,
            }),
        }
    }

    /// Transform a successful value
    ///
    /// `f` also receives the matched span and a read-only view of the state.
    /// State changes belong in [`state_f`](Self::state_f).
    pub fn map<B, F>(self, f: F) -> Parser<S, B, St, E>
    where
        B: Clone + 'static,
        F: Fn(A, &TokenCtx<'_, S, St>) -> B + 'static,
    {
        self.compose(Rc::new(move |r: Outcome<E>, ctx: &TokenCtx<'_, S, St>| {
            let a = take::<A>(r?).ok_or_else(|| mismatch::<A, S, St, E>(ctx))?;
            Ok(erase(f(a, ctx)))
        }))
    }

    /// Transform a successful value with a function that may reject it
    ///
    /// A rejection fails at the start of the wrapped match, attributed to
    /// this node.
    pub fn map_e<B, F>(self, f: F) -> Parser<S, B, St, E>
    where
        B: Clone + 'static,
        F: Fn(A, &TokenCtx<'_, S, St>) -> Result<B, E> + 'static,
    {
        self.compose(Rc::new(move |r: Outcome<E>, ctx: &TokenCtx<'_, S, St>| {
            let a = take::<A>(r?).ok_or_else(|| mismatch::<A, S, St, E>(ctx))?;
            f(a, ctx).map(erase).map_err(|e| {
                ParseError::at(ctx.start())
                    .with_parser(ctx.node())
                    .with_user_error(e)
            })
        }))
    }

    /// Transform the whole result, success or failure
    pub fn map_f<B, F>(self, f: F) -> Parser<S, B, St, E>
    where
        B: Clone + 'static,
        F: Fn(Result<A, ParseError<E>>, &TokenCtx<'_, S, St>) -> Result<B, ParseError<E>>
            + 'static,
    {
        self.compose(Rc::new(move |r: Outcome<E>, ctx: &TokenCtx<'_, S, St>| {
            let typed = match r {
                Ok(v) => Ok(take::<A>(v).ok_or_else(|| mismatch::<A, S, St, E>(ctx))?),
                Err(e) => Err(e),
            };
            f(typed, ctx).map(erase)
        }))
    }

    /// Rewrite the user payload of a failure
    pub fn map_error<F>(self, f: F) -> Parser<S, A, St, E>
    where
        F: Fn(E) -> E + 'static,
    {
        self.compose(Rc::new(move |r: Outcome<E>, _: &TokenCtx<'_, S, St>| {
            r.map_err(|mut e| {
                e.user_error = e.user_error.map(&f);
                e
            })
        }))
    }

    /// Replace the state after a successful match
    pub fn state_f<F>(self, f: F) -> Parser<S, A, St, E>
    where
        F: Fn(&St, &TokenCtx<'_, S, St>) -> St + 'static,
    {
        Parser::from_expr(Expr::StateF {
            inner: self.expr,
            f: Rc::new(f),
        })
    }

    /// Replace the value with the consumed input
    pub fn slice(self) -> Parser<S, S, St, E> {
        self.map(|_, ctx| ctx.span())
    }

    /// Succeed with `None` when this parser fails without consuming
    pub fn opt(self) -> Parser<S, Option<A>, St, E> {
        Parser::from_expr(Expr::Optional {
            inner: self.expr,
            some: Rc::new(|v: Value| take::<A>(v).map(|a| erase(Some(a)))),
            none: erase(None::<A>),
        })
    }

    /// Backtrack to the starting position and state on any failure
    pub fn attempt(self) -> Parser<S, A, St, E> {
        Parser::from_expr(Expr::Try { inner: self.expr })
    }

    /// Require `look` to match after this parser, without consuming it
    pub fn followed_by<B>(self, look: Parser<S, B, St, E>) -> Parser<S, A, St, E> {
        Parser::from_expr(Expr::Lookahead {
            inner: self.expr,
            look: look.expr,
            negative: false,
        })
    }

    /// Require `look` to fail after this parser, without consuming anything
    pub fn not_followed_by<B>(self, look: Parser<S, B, St, E>) -> Parser<S, A, St, E> {
        Parser::from_expr(Expr::Lookahead {
            inner: self.expr,
            look: look.expr,
            negative: true,
        })
    }

    /// Sequence keeping the right value
    pub fn then_r<B>(self, next: Parser<S, B, St, E>) -> Parser<S, B, St, E> {
        Parser::from_expr(Expr::Sequence {
            items: vec![self.expr, next.expr],
            collect: pick(1),
        })
    }

    /// Sequence keeping the left value
    pub fn then_l<B>(self, next: Parser<S, B, St, E>) -> Parser<S, A, St, E> {
        Parser::from_expr(Expr::Sequence {
            items: vec![self.expr, next.expr],
            collect: pick(0),
        })
    }

    /// Sequence keeping both values
    pub fn and<B>(self, next: Parser<S, B, St, E>) -> Parser<S, (A, B), St, E>
    where
        B: Clone + 'static,
    {
        Parser::from_expr(Expr::Sequence {
            items: vec![self.expr, next.expr],
            collect: Rc::new(|values: Vec<Value>| {
                let mut values = values.into_iter();
                let a = take::<A>(values.next()?)?;
                let b = take::<B>(values.next()?)?;
                Some(erase((a, b)))
            }),
        })
    }

    /// Match `left`, this parser, then `right`, keeping this parser's value
    pub fn between<L, R>(
        self,
        left: Parser<S, L, St, E>,
        right: Parser<S, R, St, E>,
    ) -> Parser<S, A, St, E> {
        Parser::from_expr(Expr::Sequence {
            items: vec![left.expr, self.expr, right.expr],
            collect: pick(1),
        })
    }

    /// [`between`](Self::between) two literals
    pub fn betweens(self, left: S, right: S) -> Parser<S, A, St, E> {
        self.between(exact(left), exact(right))
    }

    /// Try this parser, then `other` if this one fails without consuming
    pub fn or(self, other: Parser<S, A, St, E>) -> Parser<S, A, St, E> {
        let mut alts = match &*self.expr {
            Expr::Alternation { alts } => alts.clone(),
            _ => vec![self.expr],
        };
        alts.push(other.expr);
        Parser::from_expr(Expr::Alternation { alts })
    }

    /// Between `min` and `max` matches (`None` means unbounded)
    pub fn repeat(self, min: usize, max: impl Into<Option<usize>>) -> Parser<S, Vec<A>, St, E> {
        Parser::from_expr(Expr::Repeat {
            inner: self.expr,
            min,
            max: max.into(),
            collect: collect_vec::<A>(),
        })
    }

    /// Exactly `n` matches
    pub fn count(self, n: usize) -> Parser<S, Vec<A>, St, E> {
        self.repeat(n, n)
    }

    /// Zero or more matches
    pub fn many(self) -> Parser<S, Vec<A>, St, E> {
        self.repeat(0, None)
    }

    /// One or more matches
    pub fn some(self) -> Parser<S, Vec<A>, St, E> {
        self.repeat(1, None)
    }

    /// Allow this parser to refer to itself in leftmost position
    pub fn left_recur(self) -> Parser<S, A, St, E> {
        Parser::from_expr(Expr::LeftRecursion { inner: self.expr })
    }

    /// Resolve this parser on its own and prepare it for parsing
    ///
    /// Any [`reference`] inside must name [`ROOT_RULE`]; use
    /// [`GrammarBuilder`] for grammars with several rules.
    pub fn compile(&self) -> Result<CompiledParser<S, A, St, E>, GrammarError> {
        GrammarBuilder::new()
            .rule(ROOT_RULE, self.clone())
            .build()?
            .parser(ROOT_RULE)
    }
}

impl<S, A, St, E> Parser<S, A, St, E>
where
    S: CharStream,
    A: Clone + 'static,
    St: Clone + 'static,
    E: Clone + 'static,
{
    fn pattern_source(&self) -> Option<String> {
        match &*self.expr {
            Expr::Charset { set, .. } => Some(set.to_pattern()),
            Expr::Pattern { source, .. } => Some(source.clone()),
            _ => None,
        }
    }

    /// Between `min` and `max` matches, as the consumed input
    ///
    /// Charset and regex leaves fuse into a single regex; other parsers
    /// fall back to [`repeat`](Self::repeat) plus [`slice`](Self::slice).
    pub fn repeats(self, min: usize, max: impl Into<Option<usize>>) -> Parser<S, S, St, E> {
        let max = max.into();
        match self.pattern_source() {
            Some(source) if max.map_or(true, |max| min <= max) => {
                let max = max.map_or_else(String::new, |max| max.to_string());
                regex::<S, St, E>(&format!("(?:{}){{{},{}}}", source, min, max)).slice()
            }
            _ => self.repeat(min, max).slice(),
        }
    }

    /// Exactly `n` matches, as the consumed input
    pub fn counts(self, n: usize) -> Parser<S, S, St, E> {
        self.repeats(n, n)
    }
}

/// Match a literal
pub fn exact<S: Stream, St, E>(literal: impl Into<S>) -> Parser<S, S, St, E> {
    let literal = literal.into();
    Parser::from_expr(Expr::Exact {
        value: erase(literal.clone()),
        literal,
    })
}

/// Match one character in `set`
pub fn charset<S: CharStream, St, E>(set: CharSet) -> Parser<S, char, St, E> {
    let label = format!("Charset({})", set.to_pattern());
    charset_labeled(set, label)
}

/// Match one of the given characters
pub fn one_of<S: CharStream, St, E>(chars: &str) -> Parser<S, char, St, E> {
    charset_labeled(CharSet::from_chars(chars.chars()), format!("OneOf({:?})", chars))
}

/// Match any character except the given ones
pub fn none_of<S: CharStream, St, E>(chars: &str) -> Parser<S, char, St, E> {
    charset_labeled(
        CharSet::from_chars(chars.chars()).complement(),
        format!("NoneOf({:?})", chars),
    )
}

fn charset_labeled<S: CharStream, St, E>(set: CharSet, label: String) -> Parser<S, char, St, E> {
    Parser::from_expr(Expr::Charset {
        set,
        label,
        read: S::char_at,
    })
}

/// Match a regular expression anchored at the current position
///
/// The pattern is compiled when the grammar is built.
pub fn regex<S: CharStream, St, E>(pattern: &str) -> Parser<S, Captures, St, E> {
    Parser::from_expr(Expr::Pattern {
        source: pattern.to_string(),
        text: S::text,
    })
}

/// Always succeed without consuming
pub fn empty<S, St, E>() -> Parser<S, (), St, E> {
    Parser::from_expr(Expr::Empty)
}

/// Succeed only at the end of input
pub fn eof<S, St, E>() -> Parser<S, (), St, E> {
    Parser::from_expr(Expr::Eof)
}

/// Always fail with `message`
pub fn fail<S, A, St, E>(message: &str) -> Parser<S, A, St, E> {
    Parser::from_expr(Expr::Fail {
        message: message.to_string(),
        user_error: None,
    })
}

/// Always fail with `message` and a user payload
pub fn fail_with<S, A, St, E>(message: &str, user_error: E) -> Parser<S, A, St, E> {
    Parser::from_expr(Expr::Fail {
        message: message.to_string(),
        user_error: Some(user_error),
    })
}

/// Placeholder for the rule called `name`, bound when the grammar is built
pub fn reference<S, A: 'static, St, E>(name: &str) -> Parser<S, A, St, E> {
    Parser::from_expr(Expr::Reference {
        name: name.to_string(),
        expected: TypeTag::of::<A>(),
    })
}

/// Allow `parser` to refer to itself in leftmost position
pub fn left_recur<S, A, St, E>(parser: Parser<S, A, St, E>) -> Parser<S, A, St, E> {
    Parser::from_expr(Expr::LeftRecursion { inner: parser.expr })
}

/// Match every parser in order, collecting their values
pub fn seq<S, A, St, E, I>(items: I) -> Parser<S, Vec<A>, St, E>
where
    A: Clone + 'static,
    I: IntoIterator<Item = Parser<S, A, St, E>>,
{
    Parser::from_expr(Expr::Sequence {
        items: items.into_iter().map(|p| p.expr).collect(),
        collect: collect_vec::<A>(),
    })
}

/// Try each parser in order
pub fn alt<S, A, St, E, I>(alts: I) -> Parser<S, A, St, E>
where
    I: IntoIterator<Item = Parser<S, A, St, E>>,
{
    Parser::from_expr(Expr::Alternation {
        alts: alts.into_iter().map(|p| p.expr).collect(),
    })
}

/// Leaf backed by a function
///
/// `f` gets the input, the current position and the state, and returns the
/// value with the number of units consumed. Function leaves are treated as
/// non-nullable by the analyses, so grammar validation will not reject
/// `from_fn(..).many()`. A repetition still stops after an iteration that
/// consumes nothing once its minimum count is met.
pub fn from_fn<S, A, St, E, F>(name: &str, f: F) -> Parser<S, A, St, E>
where
    A: 'static,
    F: Fn(&S, usize, &St) -> Result<(A, usize), Reject<E>> + 'static,
{
    Parser::from_expr(Expr::Custom {
        name: name.to_string(),
        f: Rc::new(move |input: &S, position: usize, state: &St| {
            f(input, position, state).map(|(value, consumed)| (erase(value), consumed))
        }),
    })
}
