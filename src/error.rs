//! Error types used by the servicevisor runtime and its units.
//!
//! - [`RegistrationError`]: fatal problems with the set of registered units
//!   (conflicting names, dependency cycles). Aborts boot.
//! - [`LifecycleError`]: a single unit could not initialize/start/stop, or a
//!   dependency kept it from proceeding. Recorded per unit, never propagated
//!   past the orchestrator call that produced it.
//! - [`UnitError`]: what a [`Unit`](crate::Unit) implementation reports back.
//! - [`DispatchError`]: a bus handler failed while processing an event; logged only.
//! - [`ConfigError`]: configuration could not be parsed or is invalid.
//! - [`RuntimeError`]: [`Orchestrator::run_until_signal`](crate::Orchestrator::run_until_signal)
//!   could not boot or could not listen for signals.
//!
//! All enums expose `as_label` (stable snake_case) for logs/metrics.

use thiserror::Error;

use crate::graph::CyclePath;

/// # Errors raised while registering units or validating the dependency graph.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The name is already bound to a unit of a different kind.
    #[error("unit '{name}' is already registered as {existing}, refusing {incoming}")]
    Conflict {
        /// Unit name.
        name: String,
        /// Kind of the unit already registered.
        existing: String,
        /// Kind of the unit being registered.
        incoming: String,
    },

    /// The dependency graph contains a cycle; no order can be computed.
    #[error("dependency cycle detected: {0}")]
    Cycle(CyclePath),
}

impl RegistrationError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistrationError::Conflict { .. } => "registration_conflict",
            RegistrationError::Cycle(_) => "registration_cycle",
        }
    }
}

/// # Errors produced by a unit implementation.
///
/// Returned from [`Unit::initialize`](crate::Unit::initialize),
/// [`Unit::start`](crate::Unit::start) and [`Unit::stop`](crate::Unit::stop).
/// Panics inside those calls are caught by the orchestrator and reported as
/// [`UnitError::Panicked`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    /// Operation failed; a later restart may succeed.
    #[error("operation failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Operation failed in a way the unit considers unrecoverable.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// The unit panicked while performing the operation.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl UnitError {
    /// Shorthand for [`UnitError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        UnitError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`UnitError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        UnitError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            UnitError::Fail { .. } => "unit_failed",
            UnitError::Fatal { .. } => "unit_fatal",
            UnitError::Panicked { .. } => "unit_panicked",
        }
    }
}

/// # Per-unit lifecycle failures.
///
/// These are recorded as the unit's `last_error` and returned from the
/// orchestrator call that triggered them. They never abort other branches of
/// the dependency graph.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// No unit with this name is registered.
    #[error("unit '{unit}' is not registered")]
    UnknownUnit {
        /// Requested unit name.
        unit: String,
    },

    /// The factory could not build the unit instance.
    #[error("unit '{unit}' could not be constructed: {source}")]
    Construct {
        /// Unit name.
        unit: String,
        /// Error reported by the factory.
        source: UnitError,
    },

    /// `Unit::initialize` failed.
    #[error("unit '{unit}' failed to initialize: {source}")]
    Initialize {
        /// Unit name.
        unit: String,
        /// Error reported by the unit.
        source: UnitError,
    },

    /// `Unit::start` failed.
    #[error("unit '{unit}' failed to start: {source}")]
    Start {
        /// Unit name.
        unit: String,
        /// Error reported by the unit.
        source: UnitError,
    },

    /// `Unit::stop` failed. The unit is still marked stopped.
    #[error("unit '{unit}' failed to stop cleanly: {source}")]
    Stop {
        /// Unit name.
        unit: String,
        /// Error reported by the unit.
        source: UnitError,
    },

    /// A dependency did not reach the state required by this unit.
    #[error("unit '{unit}' cannot proceed: dependency '{dependency}' is unavailable")]
    Dependency {
        /// Unit that could not proceed.
        unit: String,
        /// Dependency that failed.
        dependency: String,
    },

    /// The unit is FAILED; only `restart` brings it back.
    #[error("unit '{unit}' is failed and must be restarted")]
    Failed {
        /// Unit name.
        unit: String,
    },

    /// The unit is already in the middle of a transition (re-entrant call or cycle).
    #[error("unit '{unit}' is already {status}")]
    InProgress {
        /// Unit name.
        unit: String,
        /// Status observed when the call arrived.
        status: crate::UnitStatus,
    },

    /// The state machine does not allow the requested transition.
    #[error("unit '{unit}': illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Unit name.
        unit: String,
        /// Current status.
        from: crate::UnitStatus,
        /// Requested status.
        to: crate::UnitStatus,
    },
}

impl LifecycleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleError::UnknownUnit { .. } => "lifecycle_unknown_unit",
            LifecycleError::Construct { .. } => "lifecycle_construct",
            LifecycleError::Initialize { .. } => "lifecycle_initialize",
            LifecycleError::Start { .. } => "lifecycle_start",
            LifecycleError::Stop { .. } => "lifecycle_stop",
            LifecycleError::Dependency { .. } => "lifecycle_dependency",
            LifecycleError::Failed { .. } => "lifecycle_failed",
            LifecycleError::InProgress { .. } => "lifecycle_in_progress",
            LifecycleError::IllegalTransition { .. } => "lifecycle_illegal_transition",
        }
    }

    /// Name of the unit this error belongs to.
    pub fn unit(&self) -> &str {
        match self {
            LifecycleError::UnknownUnit { unit }
            | LifecycleError::Construct { unit, .. }
            | LifecycleError::Initialize { unit, .. }
            | LifecycleError::Start { unit, .. }
            | LifecycleError::Stop { unit, .. }
            | LifecycleError::Dependency { unit, .. }
            | LifecycleError::Failed { unit }
            | LifecycleError::InProgress { unit, .. }
            | LifecycleError::IllegalTransition { unit, .. } => unit,
        }
    }

    /// Failing dependency, for [`LifecycleError::Dependency`].
    pub fn dependency(&self) -> Option<&str> {
        match self {
            LifecycleError::Dependency { dependency, .. } => Some(dependency),
            _ => None,
        }
    }
}

/// # Failures of a single handler while the dispatcher delivers an event.
///
/// Never surfaced to the publisher; the dispatcher logs it and moves on.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Handler returned an error.
    #[error("handler '{handler}' failed on '{event_type}': {error}")]
    HandlerFailed {
        /// Handler name.
        handler: String,
        /// Event type being delivered.
        event_type: String,
        /// Error message.
        error: String,
    },

    /// Handler panicked.
    #[error("handler '{handler}' panicked on '{event_type}': {info}")]
    HandlerPanicked {
        /// Handler name.
        handler: String,
        /// Event type being delivered.
        event_type: String,
        /// Panic payload rendered as text.
        info: String,
    },
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::HandlerFailed { .. } => "dispatch_handler_failed",
            DispatchError::HandlerPanicked { .. } => "dispatch_handler_panicked",
        }
    }
}

/// # Configuration loading and validation errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML document could not be parsed into [`Config`](crate::Config).
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds a value outside its allowed range.
    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        /// Dotted field path.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Parse(_) => "config_parse",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }
}

/// # Errors of the signal-driven run loop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Boot refused the unit set (dependency cycle).
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// OS signal handlers could not be installed.
    #[error("cannot listen for shutdown signals: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Registration(err) => err.as_label(),
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
