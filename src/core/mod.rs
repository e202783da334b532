//! Runtime core: unit registry and orchestration.
//!
//! The public entry point is [`Orchestrator`]; everything else here supports it.
//!
//! Internal modules:
//! - [`orchestrator`]: lifecycle operations, batch start/stop, accessors, diagnostics;
//! - [`registry`]: per-unit records (status, instance, timestamps, stop signal);
//! - [`builder`]: [`OrchestratorBuilder`];
//! - [`outcome`]: [`BatchOutcome`], [`ConsistencyReport`], [`UnitReport`];
//! - [`watchdog`]: opt-in restarts of failed critical units;
//! - [`shutdown`]: cross-platform termination signal handling.

mod builder;
mod orchestrator;
mod outcome;
mod registry;
mod shutdown;
mod watchdog;

pub use builder::OrchestratorBuilder;
pub use orchestrator::Orchestrator;
pub use outcome::{BatchOutcome, ConsistencyReport, UnitReport};
