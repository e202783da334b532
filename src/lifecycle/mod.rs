//! Unit lifecycle: states and the contract every managed unit implements.
//!
//! ## Contents
//! - [`UnitStatus`] finite state machine driven by the orchestrator
//! - [`Unit`], [`UnitContext`], [`UnitSnapshot`] the unit contract
//! - [`UnitFactory`], [`FactoryFn`], [`UnitSource`] lazy construction

mod factory;
mod status;
mod unit;

pub use factory::{FactoryFn, UnitFactory, UnitRef, UnitSource};
pub use status::UnitStatus;
pub use unit::{Unit, UnitContext, UnitSnapshot};
