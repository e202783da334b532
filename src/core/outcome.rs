//! Result types returned by batch operations and diagnostics.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, SystemTime};

use crate::error::LifecycleError;
use crate::graph::CyclePath;
use crate::lifecycle::{UnitSnapshot, UnitStatus};

/// Per-unit result of [`start_all`](crate::Orchestrator::start_all) or
/// [`stop_all`](crate::Orchestrator::stop_all).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOutcome {
    /// True if every unit succeeded.
    pub success: bool,
    /// Unit name → whether its operation succeeded.
    pub outcomes: BTreeMap<String, bool>,
    /// Errors of the units that failed.
    pub failures: BTreeMap<String, LifecycleError>,
}

impl Default for BatchOutcome {
    fn default() -> Self {
        Self {
            success: true,
            outcomes: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }
}

impl BatchOutcome {
    pub(crate) fn record(&mut self, name: &str, result: Result<(), LifecycleError>) {
        match result {
            Ok(()) => {
                self.outcomes.insert(name.to_string(), true);
            }
            Err(err) => {
                self.success = false;
                self.outcomes.insert(name.to_string(), false);
                self.failures.insert(name.to_string(), err);
            }
        }
    }

    /// Outcome of one unit, if it took part.
    pub fn succeeded(&self, name: &str) -> Option<bool> {
        self.outcomes.get(name).copied()
    }

    /// Names of units whose operation failed.
    pub fn failed_units(&self) -> impl Iterator<Item = &str> {
        self.failures.keys().map(String::as_str)
    }
}

/// Findings of [`check_dependency_consistency`](crate::Orchestrator::check_dependency_consistency).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Registered units the graph does not know.
    pub missing_from_graph: BTreeSet<String>,
    /// Graph nodes (usually declared dependencies) never registered.
    pub unregistered: BTreeSet<String>,
    /// Every dependency cycle.
    pub cycles: Vec<CyclePath>,
}

impl ConsistencyReport {
    /// True if nothing was found.
    pub fn is_consistent(&self) -> bool {
        self.missing_from_graph.is_empty() && self.unregistered.is_empty() && self.cycles.is_empty()
    }
}

/// Monitoring view of one unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitReport {
    pub name: String,
    pub status: UnitStatus,
    /// Kind of the registered implementation.
    pub kind: &'static str,
    pub critical: bool,
    pub initialized: bool,
    /// Start time of the current (or last) run.
    pub started_at: Option<SystemTime>,
    pub stopped_at: Option<SystemTime>,
    /// Time spent RUNNING in the current run, or in the last one once stopped.
    pub uptime: Option<Duration>,
    pub last_error: Option<LifecycleError>,
    /// Self-reported state, if the unit provides one.
    pub snapshot: Option<UnitSnapshot>,
}
