//! # Managed unit contract.
//!
//! A [`Unit`] is a long-running service supervised by the
//! [`Orchestrator`](crate::Orchestrator). It only reports whether the operation
//! it was asked to perform succeeded; the orchestrator derives the resulting
//! [`UnitStatus`](crate::UnitStatus).
//!
//! Every call receives a [`UnitContext`] carrying the unit's name, the shared
//! [`EventBus`] and the cooperative stop signal. Long-running work spawned in
//! `start` should watch [`UnitContext::stop_signal`] and exit when it fires;
//! the orchestrator never aborts a unit's tasks.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use parking_lot::Mutex;
//! use servicevisor::{Event, HandlerError, HandlerFn, SubscriptionId, Unit, UnitContext, UnitError};
//!
//! #[derive(Default)]
//! struct Greeter {
//!     sub: Mutex<Option<(servicevisor::EventBus, SubscriptionId)>>,
//! }
//!
//! #[async_trait]
//! impl Unit for Greeter {
//!     fn name(&self) -> &str { "greeter" }
//!
//!     async fn initialize(&self, ctx: &UnitContext) -> Result<(), UnitError> {
//!         let id = ctx.subscribe("hello", HandlerFn::arc("greeter.hello", |ev: Arc<Event>| async move {
//!             let _ = ev.payload.get("who");
//!             Ok::<(), HandlerError>(())
//!         }));
//!         *self.sub.lock() = Some((ctx.bus().clone(), id));
//!         Ok(())
//!     }
//!
//!     async fn start(&self, _ctx: &UnitContext) -> Result<(), UnitError> {
//!         Ok(())
//!     }
//!
//!     async fn stop(&self) -> Result<(), UnitError> {
//!         if let Some((bus, id)) = self.sub.lock().take() {
//!             bus.unsubscribe(id);
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::UnitError;
use crate::events::{Event, EventBus, HandlerRef, SubscriptionId};

/// Read-only view a unit may expose for monitoring.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitSnapshot {
    /// Whether the unit considers itself active.
    pub running: bool,
    /// When the unit's own work began.
    pub started_at: Option<SystemTime>,
    /// Last error the unit observed internally.
    pub last_error: Option<String>,
}

/// Per-unit handle to the runtime, passed into every lifecycle call.
#[derive(Clone, Debug)]
pub struct UnitContext {
    name: Arc<str>,
    bus: EventBus,
    stop: CancellationToken,
}

impl UnitContext {
    pub(crate) fn new(name: impl Into<Arc<str>>, bus: EventBus, stop: CancellationToken) -> Self {
        Self {
            name: name.into(),
            bus,
            stop,
        }
    }

    /// Registered name of the unit.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared event bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Cooperative stop signal; cancelled when the unit (or the whole runtime) stops.
    pub fn stop_signal(&self) -> &CancellationToken {
        &self.stop
    }

    /// True once the stop signal fired.
    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Subscribes `handler` to `event_type` with this unit as owner, so it also
    /// receives events targeted at this unit.
    pub fn subscribe(&self, event_type: impl Into<String>, handler: HandlerRef) -> SubscriptionId {
        self.bus.subscribe(event_type, handler, Some(self.name()))
    }

    /// Publishes an event with this unit as source.
    pub fn emit(&self, event_type: impl Into<String>, payload: Value, target: Option<&str>) -> Arc<Event> {
        self.bus.emit(event_type, payload, Some(self.name()), target)
    }
}

/// # Long-running service driven by the orchestrator.
///
/// `initialize` and `stop` default to no-ops. `initialize` should be idempotent;
/// `stop` is best-effort and must not block shutdown (an error or a panic is
/// recorded but the unit is still marked stopped).
#[async_trait]
pub trait Unit: Send + Sync + 'static {
    /// Stable name; used when registering through
    /// [`Orchestrator::register_unit`](crate::Orchestrator::register_unit).
    fn name(&self) -> &str;

    /// Implementation kind, used to detect conflicting registrations.
    fn kind(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// One-time setup. Subscribe to the bus here.
    async fn initialize(&self, _ctx: &UnitContext) -> Result<(), UnitError> {
        Ok(())
    }

    /// Begin active work.
    async fn start(&self, ctx: &UnitContext) -> Result<(), UnitError>;

    /// Tear down. Release subscriptions here.
    async fn stop(&self) -> Result<(), UnitError> {
        Ok(())
    }

    /// Optional self-reported state for monitoring.
    fn snapshot(&self) -> Option<UnitSnapshot> {
        None
    }
}
