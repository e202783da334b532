//! Dependency graph over unit names.
//!
//! ## Contents
//! - [`DependencyGraph`] edges "unit depends on dependency", direct and transitive
//!   queries, deterministic start/stop order
//! - [`CyclePath`] closed path returned when the graph is not a DAG
//!
//! ## Quick reference
//! ```text
//! add_dependency("api", "db")      api ──depends on──► db
//!
//! start_order() = [db, api]        dependencies first
//! stop_order()  = [api, db]        exact reverse
//! ```

mod cycle;
mod dependency;

pub use cycle::CyclePath;
pub use dependency::DependencyGraph;
