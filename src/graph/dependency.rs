//! # Dependency graph with deterministic topological ordering.
//!
//! Every edge is recorded twice for O(log n) traversal in both directions:
//! `dependencies[unit]` (what `unit` needs) and `dependents[dependency]`
//! (who needs `dependency`). Units may also be added without any edge; they
//! are valid members of every order.
//!
//! ## Rules
//! - Insertion is idempotent.
//! - Iteration is lexicographic (`BTreeMap`/`BTreeSet`), so the same edge
//!   history always produces the same order.
//! - [`DependencyGraph::start_order`] fails closed on the first cycle it meets;
//!   [`DependencyGraph::detect_cycles`] reports all of them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use super::cycle::{self, CyclePath};

/// Directed graph of "unit depends on dependency" edges.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    dependencies: BTreeMap<String, BTreeSet<String>>,
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit without edges (no-op if it is already known).
    pub fn add_unit(&mut self, unit: &str) {
        self.dependencies.entry(unit.to_string()).or_default();
        self.dependents.entry(unit.to_string()).or_default();
    }

    /// Records that `unit` depends on `dependency`.
    pub fn add_dependency(&mut self, unit: &str, dependency: &str) {
        self.add_unit(unit);
        self.add_unit(dependency);
        self.dependencies
            .entry(unit.to_string())
            .or_default()
            .insert(dependency.to_string());
        self.dependents
            .entry(dependency.to_string())
            .or_default()
            .insert(unit.to_string());
    }

    /// True if the unit appears in the graph.
    pub fn contains(&self, unit: &str) -> bool {
        self.dependencies.contains_key(unit)
    }

    /// Direct dependencies of `unit` (empty if unknown).
    pub fn dependencies_of(&self, unit: &str) -> BTreeSet<String> {
        self.dependencies.get(unit).cloned().unwrap_or_default()
    }

    /// Units that directly depend on `unit` (empty if unknown).
    pub fn dependents_of(&self, unit: &str) -> BTreeSet<String> {
        self.dependents.get(unit).cloned().unwrap_or_default()
    }

    /// Every unit that depends on `unit`, directly or through others.
    pub fn transitive_dependents_of(&self, unit: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = vec![unit];
        while let Some(current) = stack.pop() {
            if let Some(next) = self.dependents.get(current) {
                for dependent in next {
                    if dependent != unit && seen.insert(dependent.clone()) {
                        stack.push(dependent);
                    }
                }
            }
        }
        seen
    }

    /// All units known to the graph.
    pub fn all_units(&self) -> BTreeSet<String> {
        self.dependencies.keys().cloned().collect()
    }

    /// Units without dependencies.
    pub fn roots(&self) -> BTreeSet<String> {
        self.dependencies
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(unit, _)| unit.clone())
            .collect()
    }

    /// Units nothing depends on.
    pub fn leaves(&self) -> BTreeSet<String> {
        self.dependents
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(unit, _)| unit.clone())
            .collect()
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// True if the graph has no units.
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Topological order, dependencies before dependents.
    ///
    /// Depth-first: each unit recurses into its dependencies before it is
    /// appended. Meeting a unit that is still on the recursion stack aborts
    /// with the closed path of that cycle; no partial order is returned.
    pub fn start_order(&self) -> Result<Vec<String>, CyclePath> {
        let mut order = Vec::with_capacity(self.dependencies.len());
        let mut done = BTreeSet::new();
        let mut stack = Vec::new();
        for unit in self.dependencies.keys() {
            self.visit(unit, &mut stack, &mut done, &mut order)?;
        }
        Ok(order)
    }

    /// Exact reverse of [`start_order`](Self::start_order).
    pub fn stop_order(&self) -> Result<Vec<String>, CyclePath> {
        let mut order = self.start_order()?;
        order.reverse();
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        unit: &'a str,
        stack: &mut Vec<&'a str>,
        done: &mut BTreeSet<&'a str>,
        order: &mut Vec<String>,
    ) -> Result<(), CyclePath> {
        if done.contains(unit) {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|u| *u == unit) {
            let mut path: Vec<String> = stack[pos..].iter().map(|u| u.to_string()).collect();
            path.push(unit.to_string());
            return Err(CyclePath::new(path));
        }

        stack.push(unit);
        if let Some(deps) = self.dependencies.get(unit) {
            for dep in deps {
                self.visit(dep, stack, done, order)?;
            }
        }
        stack.pop();

        done.insert(unit);
        order.push(unit.to_string());
        Ok(())
    }

    /// Every simple cycle of the graph, for diagnostics.
    pub fn detect_cycles(&self) -> Vec<CyclePath> {
        cycle::enumerate(&self.dependencies)
    }

    /// True if at least one cycle exists.
    pub fn has_cycles(&self) -> bool {
        self.start_order().is_err()
    }

    /// Multi-line rendering of edges and computed orders for boot logs.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for unit in self.dependencies.keys() {
            let deps = self.dependencies_of(unit);
            let dependents = self.dependents_of(unit);
            let _ = write!(out, "{unit}");
            if !deps.is_empty() {
                let _ = write!(out, " needs [{}]", join(&deps));
            }
            if !dependents.is_empty() {
                let _ = write!(out, " needed by [{}]", join(&dependents));
            }
            out.push('\n');
        }
        match self.start_order() {
            Ok(order) => {
                let _ = writeln!(out, "start order: {}", order.join(", "));
                let stop: Vec<&str> = order.iter().rev().map(String::as_str).collect();
                let _ = writeln!(out, "stop order: {}", stop.join(", "));
            }
            Err(cycle) => {
                let _ = writeln!(out, "no order: cycle {cycle}");
            }
        }
        out
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(pairs: &[(&str, &str)]) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for (unit, dep) in pairs {
            g.add_dependency(unit, dep);
        }
        g
    }

    fn position(order: &[String], unit: &str) -> usize {
        order.iter().position(|u| u == unit).unwrap()
    }

    #[test]
    fn dependencies_come_first() {
        let g = graph(&[("api", "db"), ("api", "cache"), ("worker", "api"), ("cache", "db")]);
        let order = g.start_order().unwrap();
        assert_eq!(order.len(), 4);
        for unit in g.all_units() {
            for dep in g.dependencies_of(&unit) {
                assert!(position(&order, &dep) < position(&order, &unit));
            }
        }
    }

    #[test]
    fn stop_order_is_reverse_of_start_order() {
        let g = graph(&[("b", "a"), ("c", "b"), ("d", "a"), ("e", "d"), ("e", "c")]);
        let mut start = g.start_order().unwrap();
        start.reverse();
        assert_eq!(g.stop_order().unwrap(), start);
    }

    #[test]
    fn order_is_deterministic_and_lexicographic_for_independent_units() {
        let mut g = DependencyGraph::new();
        g.add_unit("zeta");
        g.add_unit("alpha");
        g.add_unit("mid");
        let first = g.start_order().unwrap();
        assert_eq!(first, vec!["alpha", "mid", "zeta"]);
        assert_eq!(g.start_order().unwrap(), first);
    }

    #[test]
    fn isolated_unit_is_root_and_leaf() {
        let mut g = graph(&[("b", "a")]);
        g.add_unit("solo");
        assert!(g.roots().contains("solo"));
        assert!(g.leaves().contains("solo"));
        assert!(g.start_order().unwrap().contains(&"solo".to_string()));
        assert_eq!(g.roots(), BTreeSet::from(["a".to_string(), "solo".to_string()]));
        assert_eq!(g.leaves(), BTreeSet::from(["b".to_string(), "solo".to_string()]));
    }

    #[test]
    fn add_dependency_is_idempotent() {
        let mut g = graph(&[("b", "a")]);
        g.add_dependency("b", "a");
        assert_eq!(g.dependencies_of("b").len(), 1);
        assert_eq!(g.dependents_of("a").len(), 1);
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn unknown_units_have_empty_relations() {
        let g = DependencyGraph::new();
        assert!(g.dependencies_of("nope").is_empty());
        assert!(g.dependents_of("nope").is_empty());
        assert!(g.is_empty());
    }

    #[test]
    fn cycle_fails_start_order_and_is_reported() {
        let g = graph(&[("a", "b"), ("b", "c"), ("c", "a")]);
        let err = g.start_order().unwrap_err();
        assert_eq!(err.members(), BTreeSet::from(["a", "b", "c"]));
        assert_eq!(err.path().first(), err.path().last());
        assert!(g.stop_order().is_err());
        assert!(g.has_cycles());

        let cycles = g.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].members(), BTreeSet::from(["a", "b", "c"]));
    }

    #[test]
    fn transitive_dependents_cover_the_closure() {
        let g = graph(&[("b", "a"), ("c", "b"), ("d", "c"), ("x", "y")]);
        let closure = g.transitive_dependents_of("a");
        assert_eq!(
            closure,
            BTreeSet::from(["b".to_string(), "c".to_string(), "d".to_string()])
        );
        assert!(g.transitive_dependents_of("d").is_empty());
    }

    #[test]
    fn describe_mentions_orders() {
        let g = graph(&[("b", "a")]);
        let text = g.describe();
        assert!(text.contains("b needs [a]"));
        assert!(text.contains("start order: a, b"));
        assert!(text.contains("stop order: b, a"));

        let g = graph(&[("a", "b"), ("b", "a")]);
        assert!(g.describe().contains("no order: cycle"));
    }
}
