//! Grammar analysis
//!
//! Nullability and first-sets are computed lazily per node and cached inside
//! the grammar. Both traversals are safe on cyclic grammars: nullability
//! answers `true` for a node that is still being computed, and first-set
//! collection keeps a visited set.
//!
//! [`GrammarAnalyzer`] runs lints on a resolved grammar:
//! - left recursion not guarded by `left_recur` (recurses forever)
//! - alternatives that can never be chosen
//! - rules unreachable from the root rule
//!
//! # Example
//!
//! ```
//! use sprout::prelude::*;
//!
//! let grammar = GrammarBuilder::new()
//!     .rule("start", exact::<String, (), ()>("a"))
//!     .rule("orphan", exact::<String, (), ()>("b"))
//!     .build()
//!     .unwrap();
//!
//! let warnings = grammar.warnings("start").unwrap();
//! assert_eq!(warnings[0].kind, WarningKind::UnusedRule);
//! ```

use super::error::NodeId;
use super::grammar::{Atom, Grammar, GrammarInner};
use super::stream::Stream;
use hashbrown::HashSet;
use std::fmt::{self, Write};

/// Cached nullability of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Nullability {
    Unknown,
    /// On the current computation path; answers `true`
    Computing,
    Known(bool),
}

impl<S: Stream, St, E> GrammarInner<S, St, E> {
    /// Whether `id` can succeed without consuming input
    pub(crate) fn is_nullable(&self, id: NodeId) -> bool {
        let Some(cell) = self.nullable.get(id.0) else {
            return false;
        };
        match cell.get() {
            Nullability::Known(nullable) => nullable,
            Nullability::Computing => true,
            Nullability::Unknown => {
                cell.set(Nullability::Computing);
                let nullable = self.compute_nullable(id);
                cell.set(Nullability::Known(nullable));
                nullable
            }
        }
    }

    fn compute_nullable(&self, id: NodeId) -> bool {
        match &self.atoms[id.0] {
            Atom::Exact { .. }
            | Atom::Charset { .. }
            | Atom::Custom { .. }
            | Atom::LeftRecursion { .. } => false,
            Atom::Pattern { regex, .. } => regex.is_match(""),
            Atom::Empty | Atom::Eof | Atom::Fail { .. } | Atom::Optional { .. } => true,
            Atom::Repeat { min, .. } => *min == 0,
            Atom::Lookahead { look, .. } => self.is_nullable(*look),
            Atom::Sequence { items, .. } => items.iter().all(|&item| self.is_nullable(item)),
            Atom::Alternation { alts } => alts.iter().any(|&alt| self.is_nullable(alt)),
            Atom::Map { inner, .. } | Atom::StateF { inner, .. } | Atom::Try { inner } => {
                self.is_nullable(*inner)
            }
            Atom::Reference { target, .. } => target.map_or(false, |t| self.is_nullable(t)),
        }
    }

    /// Leaf nodes that can start a match of `id`
    pub(crate) fn first_set(&self, id: NodeId) -> &[NodeId] {
        match self.first_sets.get(id.0) {
            Some(cell) => cell.get_or_init(|| {
                let mut leaves = Vec::new();
                self.collect_first(id, &mut HashSet::new(), &mut leaves);
                leaves
            }),
            None => &[],
        }
    }

    fn collect_first(&self, id: NodeId, visited: &mut HashSet<NodeId>, leaves: &mut Vec<NodeId>) {
        if !visited.insert(id) {
            return;
        }
        match &self.atoms[id.0] {
            Atom::Exact { .. }
            | Atom::Charset { .. }
            | Atom::Pattern { .. }
            | Atom::Empty
            | Atom::Eof
            | Atom::Fail { .. }
            | Atom::Custom { .. } => leaves.push(id),
            Atom::Sequence { items, .. } => {
                for &item in items {
                    self.collect_first(item, visited, leaves);
                    if !self.is_nullable(item) {
                        break;
                    }
                }
            }
            Atom::Alternation { alts } => {
                for &alt in alts {
                    self.collect_first(alt, visited, leaves);
                }
            }
            Atom::Map { inner, .. }
            | Atom::StateF { inner, .. }
            | Atom::Optional { inner, .. }
            | Atom::Try { inner }
            | Atom::Lookahead { inner, .. }
            | Atom::Repeat { inner, .. }
            | Atom::LeftRecursion { inner } => self.collect_first(*inner, visited, leaves),
            Atom::Reference { target, .. } => {
                if let Some(target) = target {
                    self.collect_first(*target, visited, leaves);
                }
            }
        }
    }

    /// Whether running `id` can replace the user state
    pub(crate) fn writes_state(&self, id: NodeId) -> bool {
        let Some(cell) = self.state_writers.get(id.0) else {
            return true;
        };
        *cell.get_or_init(|| {
            let mut visited = HashSet::new();
            let mut pending = vec![id];
            while let Some(next) = pending.pop() {
                if !visited.insert(next) {
                    continue;
                }
                match self.atoms.get(next.0) {
                    Some(Atom::StateF { .. }) => return true,
                    Some(Atom::Reference { target, .. }) => pending.extend(*target),
                    Some(atom) => pending.extend(atom.children()),
                    None => {}
                }
            }
            false
        })
    }

    /// Render a node; rule roots below the top render as `<name>`
    pub(crate) fn describe(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.describe_into(id, true, &mut out);
        out
    }

    fn describe_into(&self, id: NodeId, top: bool, out: &mut String) {
        if !top {
            if let Some(name) = self.rule_names.get(&id) {
                let _ = write!(out, "<{}>", name);
                return;
            }
        }
        let Some(atom) = self.atoms.get(id.0) else {
            let _ = write!(out, "?{}", id);
            return;
        };
        let _ = match atom {
            Atom::Exact { literal, .. } => write!(out, "Exact({:?})", literal),
            Atom::Charset { label, .. } => write!(out, "{}", label),
            Atom::Pattern { source, .. } => write!(out, "Regex(/{}/)", source),
            Atom::Empty => write!(out, "Empty"),
            Atom::Eof => write!(out, "Eof"),
            Atom::Fail { message, .. } => write!(out, "Fail({:?})", message),
            Atom::Custom { name, .. } => write!(out, "Custom({})", name),
            Atom::Map { inner, .. } => self.describe_wrapped("Map", &[*inner], out),
            Atom::StateF { inner, .. } => self.describe_wrapped("StateF", &[*inner], out),
            Atom::Optional { inner, .. } => self.describe_wrapped("Optional", &[*inner], out),
            Atom::Try { inner } => self.describe_wrapped("Try", &[*inner], out),
            Atom::Lookahead {
                inner,
                look,
                negative,
            } => {
                let name = if *negative {
                    "NotFollowedBy"
                } else {
                    "FollowedBy"
                };
                self.describe_wrapped(name, &[*inner, *look], out)
            }
            Atom::Sequence { items, .. } => self.describe_wrapped("Seq", items, out),
            Atom::Alternation { alts } => self.describe_wrapped("Alt", alts, out),
            Atom::Repeat {
                inner, min, max, ..
            } => {
                self.describe_into(*inner, false, out);
                match max {
                    Some(max) => write!(out, ".repeat({}, {})", min, max),
                    None => write!(out, ".repeat({}, Infinity)", min),
                }
            }
            Atom::Reference { name, .. } => write!(out, "Ref({})", name),
            Atom::LeftRecursion { inner } => self.describe_wrapped("LeftRecur", &[*inner], out),
        };
    }

    fn describe_wrapped(&self, name: &str, children: &[NodeId], out: &mut String) -> fmt::Result {
        out.push_str(name);
        out.push('(');
        for (i, &child) in children.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.describe_into(child, false, out);
        }
        out.push(')');
        Ok(())
    }
}

/// Kind of grammar warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// A rule reaches itself in leftmost position without `left_recur`
    ///
    /// Parsing such a rule never terminates.
    UnguardedLeftRecursion,

    /// An alternative can never be chosen
    ///
    /// It follows an `empty()` alternative, or repeats an earlier literal.
    UnreachableAlternative,

    /// A rule is not reachable from the root rule
    UnusedRule,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnguardedLeftRecursion => write!(f, "unguarded left recursion"),
            Self::UnreachableAlternative => write!(f, "unreachable alternative"),
            Self::UnusedRule => write!(f, "unused rule"),
        }
    }
}

/// A grammar warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarWarning {
    /// The kind of warning
    pub kind: WarningKind,
    /// Node where the warning was detected
    pub node: NodeId,
    /// Human-readable message
    pub message: String,
    /// Related nodes, such as the path of a left-recursive cycle
    pub related: Vec<NodeId>,
}

impl GrammarWarning {
    /// Create a new warning
    pub fn new(kind: WarningKind, node: NodeId, message: impl Into<String>) -> Self {
        Self {
            kind,
            node,
            message: message.into(),
            related: Vec::new(),
        }
    }

    /// Attach related nodes
    pub fn with_related(mut self, related: Vec<NodeId>) -> Self {
        self.related = related;
        self
    }
}

impl fmt::Display for GrammarWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[node {}] {}: {}", self.node, self.kind, self.message)?;
        if !self.related.is_empty() {
            let path: Vec<String> = self.related.iter().map(NodeId::to_string).collect();
            write!(f, " (path: {})", path.join(" -> "))?;
        }
        Ok(())
    }
}

/// Lints a resolved grammar
pub struct GrammarAnalyzer<'g, S, St, E> {
    grammar: &'g GrammarInner<S, St, E>,
}

impl<'g, S: Stream, St, E> GrammarAnalyzer<'g, S, St, E> {
    /// Create an analyzer for `grammar`
    pub fn new(grammar: &'g Grammar<S, St, E>) -> Self {
        Self {
            grammar: &grammar.inner,
        }
    }

    /// Every warning for the grammar as seen from `root`
    pub fn analyze(&self, root: NodeId) -> Vec<GrammarWarning> {
        let reachable = self.reachable_from(root);
        let mut warnings = Vec::new();

        self.detect_left_recursion(&reachable, &mut warnings);
        self.detect_unreachable_alternatives(&reachable, &mut warnings);
        self.detect_unused_rules(&reachable, &mut warnings);

        warnings
    }

    fn reachable_from(&self, root: NodeId) -> HashSet<NodeId> {
        let mut reachable = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if id.0 >= self.grammar.atoms.len() || !reachable.insert(id) {
                continue;
            }
            stack.extend(self.grammar.atoms[id.0].children());
        }
        reachable
    }

    /// Rules that reach themselves through leftmost edges
    fn detect_left_recursion(&self, reachable: &HashSet<NodeId>, warnings: &mut Vec<GrammarWarning>) {
        let mut checked = HashSet::new();
        for name in &self.grammar.rule_order {
            let Some(rule) = self.grammar.rules.get(name) else {
                continue;
            };
            if !reachable.contains(&rule.id) || !checked.insert(rule.id) {
                continue;
            }
            let mut visited = HashSet::new();
            if let Some(path) = self.find_left_path(rule.id, rule.id, &mut visited) {
                let message = format!(
                    "Rule {} refers to itself in leftmost position without left_recur",
                    name
                );
                report(
                    warnings,
                    GrammarWarning::new(WarningKind::UnguardedLeftRecursion, rule.id, message)
                        .with_related(path),
                );
            }
        }
    }

    fn left_edges(&self, id: NodeId) -> Vec<NodeId> {
        match &self.grammar.atoms[id.0] {
            Atom::Sequence { items, .. } => {
                let mut edges = Vec::new();
                for &item in items {
                    edges.push(item);
                    if !self.grammar.is_nullable(item) {
                        break;
                    }
                }
                edges
            }
            Atom::Alternation { alts } => alts.clone(),
            Atom::Map { inner, .. }
            | Atom::StateF { inner, .. }
            | Atom::Optional { inner, .. }
            | Atom::Try { inner }
            | Atom::Lookahead { inner, .. }
            | Atom::Repeat { inner, .. } => vec![*inner],
            _ => Vec::new(),
        }
    }

    fn find_left_path(
        &self,
        from: NodeId,
        target: NodeId,
        visited: &mut HashSet<NodeId>,
    ) -> Option<Vec<NodeId>> {
        for next in self.left_edges(from) {
            if next == target {
                return Some(vec![from, next]);
            }
            if visited.insert(next) {
                if let Some(mut path) = self.find_left_path(next, target, visited) {
                    path.insert(0, from);
                    return Some(path);
                }
            }
        }
        None
    }

    fn detect_unreachable_alternatives(
        &self,
        reachable: &HashSet<NodeId>,
        warnings: &mut Vec<GrammarWarning>,
    ) {
        let mut ids: Vec<NodeId> = reachable.iter().copied().collect();
        ids.sort_unstable();

        for id in ids {
            let Atom::Alternation { alts } = &self.grammar.atoms[id.0] else {
                continue;
            };
            let mut after_empty = false;
            let mut literals: Vec<&S> = Vec::new();

            for (index, &alt) in alts.iter().enumerate() {
                let atom = &self.grammar.atoms[alt.0];
                let duplicate = match atom {
                    Atom::Exact { literal, .. } => literals.contains(&literal),
                    _ => false,
                };

                let message = if after_empty {
                    Some(format!(
                        "Alternative {} follows an alternative that always succeeds",
                        index
                    ))
                } else if duplicate {
                    Some(format!(
                        "Alternative {} repeats an earlier literal {}",
                        index,
                        self.grammar.describe(alt)
                    ))
                } else {
                    None
                };
                if let Some(message) = message {
                    report(
                        warnings,
                        GrammarWarning::new(WarningKind::UnreachableAlternative, alt, message)
                            .with_related(vec![id]),
                    );
                }

                match atom {
                    Atom::Empty => after_empty = true,
                    Atom::Exact { literal, .. } => literals.push(literal),
                    _ => {}
                }
            }
        }
    }

    fn detect_unused_rules(&self, reachable: &HashSet<NodeId>, warnings: &mut Vec<GrammarWarning>) {
        for name in &self.grammar.rule_order {
            let Some(rule) = self.grammar.rules.get(name) else {
                continue;
            };
            if !reachable.contains(&rule.id) {
                let message = format!("Rule {} is never reachable from the root rule", name);
                report(
                    warnings,
                    GrammarWarning::new(WarningKind::UnusedRule, rule.id, message),
                );
            }
        }
    }
}

fn report(warnings: &mut Vec<GrammarWarning>, warning: GrammarWarning) {
    log_warn!("{}", warning);
    warnings.push(warning);
}
