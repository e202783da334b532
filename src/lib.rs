//! # servicevisor
//!
//! **Servicevisor** is the orchestration core of a multi-service daemon.
//!
//! It registers long-running units, starts and stops them in dependency
//! order, tracks each one through a lifecycle state machine, and lets units
//! talk to each other over an in-process event bus instead of holding
//! references to one another.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  impl Unit   │   │ UnitFactory  │   │  impl Unit   │
//!     │   (db)       │   │  (cache)     │   │   (api)      │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼ register         ▼ register         ▼ register(deps = [db, cache])
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                     │
//! │  - Registry (status, instance, timestamps, stop signal per unit)  │
//! │  - DependencyGraph (start order / stop order / cycles)            │
//! │  - Watchdog (opt-in restarts of failed critical units)            │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼ initialize/start ▼                  ▼               │ service_started
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │ service_stopped
//!     │     db       │   │    cache     │   │     api      │   │ ...
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   │
//!      │ emit / subscribe │                  │                 │
//!      ▼                  ▼                  ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                EventBus (single FIFO queue, one dispatcher)       │
//! │        broadcast[type] / targeted[owner][type] / history[type]    │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! Uninitialized ─► Initializing ─► Initialized ─► Starting ─► Running ─► Stopping ─► Stopped
//!                        └──────────────┬───────────────┘                  │
//!                                       ▼                                  │
//!                                    Failed ──► (restart) ──► Stopping ◄───┘
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Units**         | Contract every managed service implements.                   | [`Unit`], [`UnitContext`], [`UnitFactory`]  |
//! | **Orchestration** | Dependency-ordered start/stop, restart, batch outcomes.       | [`Orchestrator`], [`BatchOutcome`]          |
//! | **Graph**         | Topological order and cycle detection.                       | [`DependencyGraph`], [`CyclePath`]          |
//! | **Events**        | Ordered, fault-isolated publish/subscribe with history.      | [`EventBus`], [`Event`], [`Handler`]        |
//! | **Policies**      | Backoff for watchdog restarts.                               | [`BackoffPolicy`], [`JitterPolicy`]         |
//! | **Errors**        | Typed errors for registration, lifecycle and dispatch.       | [`LifecycleError`], [`RegistrationError`]   |
//! | **Configuration** | Typed settings with defaults, loaded from TOML.              | [`Config`]                                  |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use serde_json::json;
//! use servicevisor::{Config, Event, HandlerError, HandlerFn, Orchestrator, Unit, UnitContext, UnitError};
//!
//! struct Pinger;
//!
//! #[async_trait]
//! impl Unit for Pinger {
//!     fn name(&self) -> &str { "pinger" }
//!
//!     async fn initialize(&self, ctx: &UnitContext) -> Result<(), UnitError> {
//!         ctx.subscribe("ping", HandlerFn::arc("pinger.ping", |ev: Arc<Event>| async move {
//!             println!("ping from {:?}", ev.source);
//!             Ok::<(), HandlerError>(())
//!         }));
//!         Ok(())
//!     }
//!
//!     async fn start(&self, ctx: &UnitContext) -> Result<(), UnitError> {
//!         ctx.emit("ping", json!({"n": 1}), Some("pinger"));
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orch = Orchestrator::new(Config::default());
//!     orch.register_unit(Arc::new(Pinger), &[])?;
//!
//!     let outcome = orch.start_all().await?;
//!     assert!(outcome.success);
//!
//!     orch.event_bus().wait_idle().await;
//!     orch.shutdown().await;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod graph;
mod lifecycle;
mod policies;

// ---- Public re-exports ----

pub use config::{BusConfig, Config, WatchdogConfig};
pub use core::{BatchOutcome, ConsistencyReport, Orchestrator, OrchestratorBuilder, UnitReport};
pub use error::{
    ConfigError, DispatchError, LifecycleError, RegistrationError, RuntimeError, UnitError,
};
pub use events::{
    kinds, BusStats, Event, EventBus, Handler, HandlerError, HandlerFn, HandlerRef, SubscriptionId,
};
pub use graph::{CyclePath, DependencyGraph};
pub use lifecycle::{
    FactoryFn, Unit, UnitContext, UnitFactory, UnitRef, UnitSnapshot, UnitSource, UnitStatus,
};
pub use policies::{BackoffPolicy, JitterPolicy};
