//! # Unit lifecycle states.
//!
//! ```text
//! Uninitialized ─► Initializing ─► Initialized ─► Starting ─► Running ─► Stopping ─► Stopped
//!                       │                            │                      │          │
//!                       └──────────► Failed ◄────────┴──────────────────────┘          │
//!                                      │                                               │
//!                                      └──► Stopping (restart)    Stopped ─► Initializing | Starting
//! ```
//!
//! Only the orchestrator moves a unit between states, through
//! [`UnitStatus::can_transition_to`].

use std::fmt;

use crate::error::LifecycleError;

/// State of a managed unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitStatus {
    /// Registered, nothing has run yet.
    Uninitialized,
    /// `initialize` in progress (dependencies first).
    Initializing,
    /// `initialize` succeeded.
    Initialized,
    /// `start` in progress (dependencies first).
    Starting,
    /// `start` succeeded.
    Running,
    /// `stop` in progress (dependents first).
    Stopping,
    /// Torn down; can be started again.
    Stopped,
    /// An operation failed; only `restart` leaves this state.
    Failed,
}

impl UnitStatus {
    /// Running or on its way there.
    pub fn is_running(self) -> bool {
        matches!(self, UnitStatus::Running | UnitStatus::Starting)
    }

    /// Not running and not failed.
    pub fn is_stopped(self) -> bool {
        matches!(self, UnitStatus::Stopped | UnitStatus::Uninitialized)
    }

    pub fn is_failed(self) -> bool {
        matches!(self, UnitStatus::Failed)
    }

    /// A transition is underway; re-entering the unit now would recurse.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            UnitStatus::Initializing | UnitStatus::Starting | UnitStatus::Stopping
        )
    }

    /// True if the state machine allows `self -> to`.
    pub fn can_transition_to(self, to: UnitStatus) -> bool {
        use UnitStatus::*;
        matches!(
            (self, to),
            (Uninitialized, Initializing)
                | (Initializing, Initialized)
                | (Initializing, Failed)
                | (Initialized, Starting)
                | (Initialized, Stopping)
                | (Starting, Running)
                | (Starting, Failed)
                | (Running, Stopping)
                | (Stopping, Stopped)
                | (Stopping, Failed)
                | (Stopped, Initializing)
                | (Stopped, Starting)
                | (Failed, Stopping)
        )
    }

    /// Validated move to `to`, or [`LifecycleError::IllegalTransition`] naming `unit`.
    pub fn transition(self, unit: &str, to: UnitStatus) -> Result<UnitStatus, LifecycleError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(LifecycleError::IllegalTransition {
                unit: unit.to_string(),
                from: self,
                to,
            })
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            UnitStatus::Uninitialized => "uninitialized",
            UnitStatus::Initializing => "initializing",
            UnitStatus::Initialized => "initialized",
            UnitStatus::Starting => "starting",
            UnitStatus::Running => "running",
            UnitStatus::Stopping => "stopping",
            UnitStatus::Stopped => "stopped",
            UnitStatus::Failed => "failed",
        }
    }
}

impl Default for UnitStatus {
    fn default() -> Self {
        UnitStatus::Uninitialized
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
