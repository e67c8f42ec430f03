//! Grammar resolution
//!
//! [`GrammarBuilder`] collects named rules as construction-time expressions.
//! [`GrammarBuilder::build`] lowers them into a flat arena of [`Atom`]s where
//! children are [`NodeId`] indices, binds every reference to its rule, and
//! rewrites children so no executable atom points at a reference. The result
//! is a [`Grammar`], which is read-only apart from its lazily filled analysis
//! caches.
//!
//! # Example
//!
//! ```rust
//! use sprout::prelude::*;
//!
//! let list: Parser<String, Vec<String>> = exact("x")
//!     .then_l(exact(",").opt())
//!     .some();
//! let grammar = GrammarBuilder::new().rule("list", list).build().unwrap();
//! let parser = grammar.parser::<Vec<String>>("list").unwrap();
//!
//! assert_eq!(parser.parse(&"x,x,x".to_string(), ()).consumed, 5);
//! ```

use super::analysis::{GrammarAnalyzer, GrammarWarning, Nullability};
use super::charset::CharSet;
use super::combinator::{
    CollectFn, CustomFn, Expr, MapFn, Parser, ReadChar, ReadText, StateFn, TypeTag, WrapFn,
};
use super::context::Value;
use super::error::{GrammarError, NodeId};
use super::parser::{CompiledParser, ParserConfig};
use super::regex_cache;
use super::stream::Stream;
use hashbrown::{HashMap, HashSet};
use regex::Regex;
use std::cell::{Cell, OnceCell};
use std::fmt;
use std::rc::Rc;

/// A resolved grammar node
pub(crate) enum Atom<S, St, E> {
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
        regex: Regex,
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
        inner: NodeId,
        f: MapFn<S, St, E>,
    },
    StateF {
        inner: NodeId,
        f: StateFn<S, St>,
    },
    Sequence {
        items: Vec<NodeId>,
        collect: CollectFn,
    },
    Alternation {
        alts: Vec<NodeId>,
    },
    Optional {
        inner: NodeId,
        some: WrapFn,
        none: Value,
    },
    Try {
        inner: NodeId,
    },
    Lookahead {
        inner: NodeId,
        look: NodeId,
        negative: bool,
    },
    Repeat {
        inner: NodeId,
        min: usize,
        max: Option<usize>,
        collect: CollectFn,
    },
    /// Only present between lowering and dereferencing
    Reference {
        name: String,
        expected: TypeTag,
        target: Option<NodeId>,
    },
    LeftRecursion {
        inner: NodeId,
    },
}

impl<S, St, E> Atom<S, St, E> {
    /// Child indices in evaluation order
    pub(crate) fn children(&self) -> Vec<NodeId> {
        match self {
            Atom::Map { inner, .. }
            | Atom::StateF { inner, .. }
            | Atom::Optional { inner, .. }
            | Atom::Try { inner }
            | Atom::Repeat { inner, .. }
            | Atom::LeftRecursion { inner } => vec![*inner],
            Atom::Lookahead { inner, look, .. } => vec![*inner, *look],
            Atom::Sequence { items, .. } => items.clone(),
            Atom::Alternation { alts } => alts.clone(),
            _ => Vec::new(),
        }
    }

    fn children_mut(&mut self) -> Vec<&mut NodeId> {
        match self {
            Atom::Map { inner, .. }
            | Atom::StateF { inner, .. }
            | Atom::Optional { inner, .. }
            | Atom::Try { inner }
            | Atom::Repeat { inner, .. }
            | Atom::LeftRecursion { inner } => vec![inner],
            Atom::Lookahead { inner, look, .. } => vec![inner, look],
            Atom::Sequence { items, .. } => items.iter_mut().collect(),
            Atom::Alternation { alts } => alts.iter_mut().collect(),
            _ => Vec::new(),
        }
    }
}

/// A named entry point
#[derive(Debug, Clone, Copy)]
pub(crate) struct Rule {
    pub id: NodeId,
    pub ty: TypeTag,
}

pub(crate) struct GrammarInner<S, St, E> {
    pub atoms: Vec<Atom<S, St, E>>,
    pub rules: HashMap<String, Rule>,
    pub rule_order: Vec<String>,
    /// First rule name per rule root, for rendering
    pub rule_names: HashMap<NodeId, String>,
    pub nullable: Vec<Cell<Nullability>>,
    pub first_sets: Vec<OnceCell<Vec<NodeId>>>,
    pub state_writers: Vec<OnceCell<bool>>,
}

impl<S: Stream, St, E> GrammarInner<S, St, E> {
    fn new(
        atoms: Vec<Atom<S, St, E>>,
        rules: HashMap<String, Rule>,
        rule_order: Vec<String>,
    ) -> Self {
        let mut rule_names = HashMap::new();
        for name in &rule_order {
            if let Some(rule) = rules.get(name) {
                rule_names.entry(rule.id).or_insert_with(|| name.clone());
            }
        }
        let count = atoms.len();
        Self {
            atoms,
            rules,
            rule_order,
            rule_names,
            nullable: (0..count).map(|_| Cell::new(Nullability::Unknown)).collect(),
            first_sets: (0..count).map(|_| OnceCell::new()).collect(),
            state_writers: (0..count).map(|_| OnceCell::new()).collect(),
        }
    }

    /// Check repetition and left-recursion guards
    fn validate(&self) -> Result<(), GrammarError> {
        for atom in &self.atoms {
            match atom {
                Atom::Repeat {
                    inner, min, max, ..
                } => {
                    if let Some(max) = *max {
                        if *min > max {
                            return Err(GrammarError::InvalidRepeatBounds { min: *min, max });
                        }
                    }
                    if self.is_nullable(*inner) {
                        return Err(GrammarError::NullableRepeat {
                            parser: self.describe(*inner),
                        });
                    }
                }
                Atom::LeftRecursion { inner } if self.is_nullable(*inner) => {
                    return Err(GrammarError::NullableLeftRecursion {
                        parser: self.describe(*inner),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Lowers expressions into the arena, once per expression node
struct Lowering<S, St, E> {
    atoms: Vec<Atom<S, St, E>>,
    lowered: HashMap<*const Expr<S, St, E>, NodeId>,
}

impl<S: Stream, St, E: Clone> Lowering<S, St, E> {
    fn new() -> Self {
        Self {
            atoms: Vec::new(),
            lowered: HashMap::new(),
        }
    }

    fn lower_all(&mut self, exprs: &[Rc<Expr<S, St, E>>]) -> Result<Vec<NodeId>, GrammarError> {
        exprs.iter().map(|expr| self.lower(expr)).collect()
    }

    fn lower(&mut self, expr: &Rc<Expr<S, St, E>>) -> Result<NodeId, GrammarError> {
        let key = Rc::as_ptr(expr);
        if let Some(&id) = self.lowered.get(&key) {
            return Ok(id);
        }

        let atom = match &**expr {
            Expr::Exact { literal, value } => {
                if literal.is_empty() {
                    return Err(GrammarError::EmptyLiteral);
                }
                Atom::Exact {
                    literal: literal.clone(),
                    value: Rc::clone(value),
                }
            }
            Expr::Charset { set, label, read } => Atom::Charset {
                set: set.clone(),
                label: label.clone(),
                read: *read,
            },
            Expr::Pattern { source, text } => {
                let regex = regex_cache::get_or_compile(source).map_err(|reason| {
                    GrammarError::InvalidPattern {
                        pattern: source.clone(),
                        reason,
                    }
                })?;
                Atom::Pattern {
                    source: source.clone(),
                    regex,
                    text: *text,
                }
            }
            Expr::Empty => Atom::Empty,
            Expr::Eof => Atom::Eof,
            Expr::Fail {
                message,
                user_error,
            } => Atom::Fail {
                message: message.clone(),
                user_error: user_error.clone(),
            },
            Expr::Custom { name, f } => Atom::Custom {
                name: name.clone(),
                f: Rc::clone(f),
            },
            Expr::Map { inner, f } => Atom::Map {
                inner: self.lower(inner)?,
                f: Rc::clone(f),
            },
            Expr::StateF { inner, f } => Atom::StateF {
                inner: self.lower(inner)?,
                f: Rc::clone(f),
            },
            Expr::Sequence { items, collect } => {
                if items.is_empty() {
                    return Err(GrammarError::EmptySequence);
                }
                Atom::Sequence {
                    items: self.lower_all(items)?,
                    collect: Rc::clone(collect),
                }
            }
            Expr::Alternation { alts } => {
                if alts.is_empty() {
                    return Err(GrammarError::EmptyAlternation);
                }
                Atom::Alternation {
                    alts: self.lower_all(alts)?,
                }
            }
            Expr::Optional { inner, some, none } => Atom::Optional {
                inner: self.lower(inner)?,
                some: Rc::clone(some),
                none: Rc::clone(none),
            },
            Expr::Try { inner } => Atom::Try {
                inner: self.lower(inner)?,
            },
            Expr::Lookahead {
                inner,
                look,
                negative,
            } => Atom::Lookahead {
                inner: self.lower(inner)?,
                look: self.lower(look)?,
                negative: *negative,
            },
            Expr::Repeat {
                inner,
                min,
                max,
                collect,
            } => Atom::Repeat {
                inner: self.lower(inner)?,
                min: *min,
                max: *max,
                collect: Rc::clone(collect),
            },
            Expr::Reference { name, expected } => Atom::Reference {
                name: name.clone(),
                expected: *expected,
                target: None,
            },
            Expr::LeftRecursion { inner } => Atom::LeftRecursion {
                inner: self.lower(inner)?,
            },
        };

        let id = NodeId(self.atoms.len());
        self.atoms.push(atom);
        self.lowered.insert(key, id);
        Ok(id)
    }
}

/// Point every reference at the root of the rule it names
fn bind_references<S, St, E>(
    atoms: &mut [Atom<S, St, E>],
    rules: &HashMap<String, Rule>,
) -> Result<(), GrammarError> {
    for atom in atoms.iter_mut() {
        if let Atom::Reference {
            name,
            expected,
            target,
        } = atom
        {
            let rule = rules
                .get(name.as_str())
                .ok_or_else(|| GrammarError::UnresolvedReference { name: name.clone() })?;
            if rule.ty.id != expected.id {
                return Err(GrammarError::TypeMismatch {
                    name: name.clone(),
                    expected: expected.name,
                    found: rule.ty.name,
                });
            }
            *target = Some(rule.id);
        }
    }
    Ok(())
}

/// Final non-reference target of every atom
///
/// Each reference chain is walked once; every atom on it is assigned the
/// chain's end.
fn resolve_targets<S, St, E>(atoms: &[Atom<S, St, E>]) -> Result<Vec<NodeId>, GrammarError> {
    let mut targets: Vec<Option<NodeId>> = vec![None; atoms.len()];

    for start in 0..atoms.len() {
        if targets[start].is_some() {
            continue;
        }

        let mut chain = Vec::new();
        let mut current = NodeId(start);
        let end = loop {
            if let Some(done) = targets[current.0] {
                break done;
            }
            match &atoms[current.0] {
                Atom::Reference { name, target, .. } => {
                    if chain.contains(&current) {
                        return Err(GrammarError::CyclicReference { name: name.clone() });
                    }
                    chain.push(current);
                    current = target
                        .ok_or_else(|| GrammarError::UnresolvedReference { name: name.clone() })?;
                }
                _ => break current,
            }
        };

        targets[end.0] = Some(end);
        for id in chain {
            targets[id.0] = Some(end);
        }
    }

    Ok(targets
        .into_iter()
        .enumerate()
        .map(|(i, target)| target.unwrap_or(NodeId(i)))
        .collect())
}

/// A resolved, immutable grammar
///
/// Cloning is cheap; clones share the arena and analysis caches.
pub struct Grammar<S, St = (), E = ()> {
    pub(crate) inner: Rc<GrammarInner<S, St, E>>,
}

impl<S, St, E> Clone for Grammar<S, St, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S, St, E> fmt::Debug for Grammar<S, St, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("rules", &self.inner.rule_order)
            .field("nodes", &self.inner.atoms.len())
            .finish()
    }
}

impl<S, St, E> Grammar<S, St, E>
where
    S: Stream,
    St: Clone + 'static,
    E: Clone + 'static,
{
    /// Entry point for the rule called `name`
    ///
    /// Fails with [`GrammarError::UnknownRule`] for a missing rule and
    /// [`GrammarError::TypeMismatch`] if the rule does not produce `A`.
    pub fn parser<A: Clone + 'static>(
        &self,
        name: &str,
    ) -> Result<CompiledParser<S, A, St, E>, GrammarError> {
        let rule = self
            .inner
            .rules
            .get(name)
            .ok_or_else(|| GrammarError::UnknownRule {
                name: name.to_string(),
            })?;
        let expected = TypeTag::of::<A>();
        if rule.ty.id != expected.id {
            return Err(GrammarError::TypeMismatch {
                name: name.to_string(),
                expected: expected.name,
                found: rule.ty.name,
            });
        }
        Ok(CompiledParser::new(self.clone(), rule.id, ParserConfig::default()))
    }

    /// Root node of the rule called `name`
    pub fn rule_id(&self, name: &str) -> Option<NodeId> {
        self.inner.rules.get(name).map(|rule| rule.id)
    }

    /// Rule names in definition order
    pub fn rule_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.inner.rule_order.iter().map(String::as_str)
    }

    /// Number of nodes in the arena
    pub fn node_count(&self) -> usize {
        self.inner.atoms.len()
    }

    /// Render a node, with other rules shown as `<name>`
    pub fn describe(&self, id: NodeId) -> String {
        self.inner.describe(id)
    }

    /// Whether `id` can succeed without consuming input
    pub fn is_nullable(&self, id: NodeId) -> bool {
        self.inner.is_nullable(id)
    }

    /// Leaf nodes that can start a match of `id`
    pub fn first_set(&self, id: NodeId) -> &[NodeId] {
        self.inner.first_set(id)
    }

    /// Lint the grammar as seen from the rule called `root`
    pub fn warnings(&self, root: &str) -> Result<Vec<GrammarWarning>, GrammarError> {
        let id = self.rule_id(root).ok_or_else(|| GrammarError::UnknownRule {
            name: root.to_string(),
        })?;
        Ok(GrammarAnalyzer::new(self).analyze(id))
    }
}

impl<S: Stream, St, E> fmt::Display for Grammar<S, St, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.inner.rule_order {
            if let Some(rule) = self.inner.rules.get(name) {
                writeln!(f, "{} = {}", name, self.inner.describe(rule.id))?;
            }
        }
        Ok(())
    }
}

/// Collects named rules and resolves them into a [`Grammar`]
pub struct GrammarBuilder<S, St = (), E = ()> {
    rules: Vec<(String, Rc<Expr<S, St, E>>, TypeTag)>,
}

impl<S, St, E> Default for GrammarBuilder<S, St, E> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<S, St, E> GrammarBuilder<S, St, E>
where
    S: Stream,
    St: Clone + 'static,
    E: Clone + 'static,
{
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule
    pub fn rule<A: 'static>(mut self, name: &str, parser: Parser<S, A, St, E>) -> Self {
        self.rule_mut(name, parser);
        self
    }

    /// Add a rule in place
    pub fn rule_mut<A: 'static>(&mut self, name: &str, parser: Parser<S, A, St, E>) -> &mut Self {
        self.rules
            .push((name.to_string(), parser.expr, TypeTag::of::<A>()));
        self
    }

    /// Number of rules added so far
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Resolve every rule
    ///
    /// Building twice from the same builder yields equivalent grammars.
    pub fn build(&self) -> Result<Grammar<S, St, E>, GrammarError> {
        let mut seen = HashSet::new();
        for (name, _, _) in &self.rules {
            if !seen.insert(name.as_str()) {
                return Err(GrammarError::DuplicateRule { name: name.clone() });
            }
        }

        let mut lowering = Lowering::new();
        let mut rules = HashMap::new();
        let mut rule_order = Vec::with_capacity(self.rules.len());
        for (name, expr, ty) in &self.rules {
            let id = lowering.lower(expr)?;
            rules.insert(name.clone(), Rule { id, ty: *ty });
            rule_order.push(name.clone());
        }

        let mut atoms = lowering.atoms;
        bind_references(&mut atoms, &rules)?;

        let targets = resolve_targets(&atoms)?;
        for atom in atoms.iter_mut() {
            for child in atom.children_mut() {
                *child = targets[child.0];
            }
        }
        for rule in rules.values_mut() {
            rule.id = targets[rule.id.0];
        }

        let inner = GrammarInner::new(atoms, rules, rule_order);
        inner.validate()?;

        log_debug!(
            "Built grammar: rules={}, nodes={}",
            inner.rule_order.len(),
            inner.atoms.len()
        );

        Ok(Grammar {
            inner: Rc::new(inner),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::combinator::{charset, empty, exact, fail, reference, regex, seq};

    type P<A> = Parser<String, A>;

    fn digit() -> P<char> {
        charset(CharSet::range('0', '9'))
    }

    #[test]
    fn test_shared_subexpressions_lower_once() {
        let d = digit();
        let pair: P<Vec<char>> = seq(vec![d.clone(), d.clone(), d]);
        let grammar = GrammarBuilder::new().rule("pair", pair).build().unwrap();
        assert_eq!(grammar.node_count(), 2);
    }

    #[test]
    fn test_references_are_dereferenced() {
        let g = GrammarBuilder::new()
            .rule("digit", digit())
            .rule("alias", reference::<String, char, (), ()>("digit"))
            .rule(
                "pair",
                seq(vec![reference::<String, char, (), ()>("alias"), reference("digit")]),
            )
            .build()
            .unwrap();

        let digit_id = g.rule_id("digit").unwrap();
        assert_eq!(g.rule_id("alias"), Some(digit_id));
        let pair = g.rule_id("pair").unwrap();
        assert_eq!(g.inner.atoms[pair.0].children(), vec![digit_id, digit_id]);
        for atom in &g.inner.atoms {
            for child in atom.children() {
                assert!(!matches!(g.inner.atoms[child.0], Atom::Reference { .. }));
            }
        }
    }

    #[test]
    fn test_unresolved_reference() {
        let p: P<char> = reference("missing");
        let err = GrammarBuilder::new().rule("root", p).build().unwrap_err();
        assert_eq!(
            err,
            GrammarError::UnresolvedReference {
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_cyclic_reference() {
        let err = GrammarBuilder::new()
            .rule("a", reference::<String, char, (), ()>("b"))
            .rule("b", reference::<String, char, (), ()>("a"))
            .build()
            .unwrap_err();
        assert!(matches!(err, GrammarError::CyclicReference { .. }));
    }

    #[test]
    fn test_reference_type_mismatch() {
        let err = GrammarBuilder::new()
            .rule("digit", digit())
            .rule("bad", reference::<String, String, (), ()>("digit"))
            .build()
            .unwrap_err();
        assert!(matches!(err, GrammarError::TypeMismatch { .. }));
    }

    #[test]
    fn test_duplicate_rule() {
        let err = GrammarBuilder::new()
            .rule("d", digit())
            .rule("d", digit())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            GrammarError::DuplicateRule {
                name: "d".to_string()
            }
        );
    }

    #[test]
    fn test_structural_errors() {
        let empty_seq: P<Vec<char>> = seq(Vec::new());
        assert_eq!(empty_seq.compile().err(), Some(GrammarError::EmptySequence));

        let empty_alt: P<char> = crate::engine::combinator::alt(Vec::new());
        assert_eq!(empty_alt.compile().err(), Some(GrammarError::EmptyAlternation));

        let empty_lit: P<String> = exact("");
        assert_eq!(empty_lit.compile().err(), Some(GrammarError::EmptyLiteral));

        let bad_regex: P<_> = regex("(");
        assert!(matches!(
            bad_regex.compile().err(),
            Some(GrammarError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_nullable_repeat_rejected() {
        let p: P<Vec<()>> = empty().many();
        assert!(matches!(
            p.compile().err(),
            Some(GrammarError::NullableRepeat { .. })
        ));

        let q: P<Vec<Option<char>>> = digit().opt().some();
        assert!(matches!(
            q.compile().err(),
            Some(GrammarError::NullableRepeat { .. })
        ));
    }

    #[test]
    fn test_nullable_left_recursion_rejected() {
        let p: P<()> = fail::<String, (), (), ()>("no").left_recur();
        assert!(matches!(
            p.compile().err(),
            Some(GrammarError::NullableLeftRecursion { .. })
        ));
    }

    #[test]
    fn test_repeat_bounds() {
        let p: P<Vec<char>> = digit().repeat(3, 2);
        assert_eq!(
            p.compile().err(),
            Some(GrammarError::InvalidRepeatBounds { min: 3, max: 2 })
        );
    }

    #[test]
    fn test_unknown_rule_and_type() {
        let g = GrammarBuilder::new().rule("d", digit()).build().unwrap();
        assert!(matches!(
            g.parser::<char>("x").err(),
            Some(GrammarError::UnknownRule { .. })
        ));
        assert!(matches!(
            g.parser::<String>("d").err(),
            Some(GrammarError::TypeMismatch { .. })
        ));
        assert!(g.parser::<char>("d").is_ok());
    }

    #[test]
    fn test_build_is_repeatable() {
        let builder = GrammarBuilder::new()
            .rule("d", digit())
            .rule("ds", reference::<String, char, (), ()>("d").some());
        let a = builder.build().unwrap();
        let b = builder.build().unwrap();
        assert_eq!(a.node_count(), b.node_count());
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_display_lists_rules() {
        let g = GrammarBuilder::new()
            .rule("d", digit())
            .rule("ds", reference::<String, char, (), ()>("d").some())
            .build()
            .unwrap();
        let text = g.to_string();
        assert!(text.contains("d = Charset([0-9])"));
        assert!(text.contains("ds = <d>.repeat(1, Infinity)"));
    }
}
