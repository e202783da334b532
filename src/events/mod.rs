//! Inter-unit messaging: event model, handlers and the bus.
//!
//! ## Contents
//! - [`Event`] message with type, source, optional target and JSON payload
//! - [`kinds`] event types published by the orchestrator
//! - [`Handler`], [`HandlerFn`] callbacks invoked by the dispatcher
//! - [`EventBus`] single-queue dispatcher with broadcast and targeted routing
//!   plus bounded per-type history
//!
//! ## Quick reference
//! - **Publishers**: units (through [`UnitContext::emit`](crate::UnitContext::emit)),
//!   the orchestrator (`service_*` lifecycle events), the watchdog.
//! - **Consumers**: handlers registered by units in `initialize`.

mod bus;
mod event;
mod handler;
mod history;
mod subscriptions;

pub use bus::{BusStats, EventBus};
pub use event::{kinds, Event};
pub use handler::{Handler, HandlerError, HandlerFn, HandlerRef};
pub use subscriptions::SubscriptionId;
