//! # Cycle reporting.
//!
//! A [`CyclePath`] is a closed walk through the dependency graph: the first and
//! last element are the same unit, e.g. `a -> b -> c -> a` means *a depends on
//! b, b depends on c, c depends on a*.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Closed dependency path (`first == last`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CyclePath(Vec<String>);

impl CyclePath {
    pub(crate) fn new(path: Vec<String>) -> Self {
        Self(path)
    }

    /// Units along the path, including the repeated closing unit.
    pub fn path(&self) -> &[String] {
        &self.0
    }

    /// Distinct units taking part in the cycle.
    pub fn members(&self) -> BTreeSet<&str> {
        self.0.iter().map(String::as_str).collect()
    }

    /// True if `unit` is part of the cycle.
    pub fn contains(&self, unit: &str) -> bool {
        self.0.iter().any(|u| u == unit)
    }
}

impl fmt::Display for CyclePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" -> "))
    }
}

/// Enumerates every simple cycle of `edges`.
///
/// Each cycle is reported exactly once, rotated so that it starts at its
/// lexicographically smallest unit. The search from `start` only walks through
/// units `>= start`, so a cycle is found from its minimum member only.
pub(crate) fn enumerate(edges: &BTreeMap<String, BTreeSet<String>>) -> Vec<CyclePath> {
    let mut cycles = Vec::new();
    for start in edges.keys() {
        let mut path = vec![start.as_str()];
        let mut on_path = BTreeSet::from([start.as_str()]);
        walk(edges, start, start, &mut path, &mut on_path, &mut cycles);
    }
    cycles
}

fn walk<'a>(
    edges: &'a BTreeMap<String, BTreeSet<String>>,
    start: &'a str,
    node: &'a str,
    path: &mut Vec<&'a str>,
    on_path: &mut BTreeSet<&'a str>,
    out: &mut Vec<CyclePath>,
) {
    let Some(next) = edges.get(node) else {
        return;
    };
    for dep in next {
        let dep = dep.as_str();
        if dep == start {
            let mut closed: Vec<String> = path.iter().map(|s| s.to_string()).collect();
            closed.push(start.to_string());
            out.push(CyclePath::new(closed));
            continue;
        }
        if dep < start || on_path.contains(dep) {
            continue;
        }
        path.push(dep);
        on_path.insert(dep);
        walk(edges, start, dep, path, on_path, out);
        on_path.remove(dep);
        path.pop();
    }
}
