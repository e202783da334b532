//! # Messages exchanged over the event bus.
//!
//! An [`Event`] carries a free-form `event_type`, an optional `source`, an
//! optional `target` (absent = broadcast) and an opaque JSON payload. The
//! orchestrator publishes its own lifecycle events under the names listed in
//! [`kinds`].
//!
//! ## Ordering guarantees
//! Each event gets a globally unique sequence number (`seq`) when it is built.
//! The dispatcher delivers events in publish order; `seq` breaks timestamp ties
//! when histories of different types are merged.
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use servicevisor::Event;
//!
//! let ev = Event::new("ping")
//!     .with_source("scheduler")
//!     .with_target("worker")
//!     .with_payload(json!({"n": 1}));
//!
//! assert_eq!(ev.event_type, "ping");
//! assert_eq!(ev.target.as_deref(), Some("worker"));
//! assert!(!ev.processed());
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime};

use serde_json::Value;
use uuid::Uuid;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Event types published by the orchestrator.
///
/// All of them carry `{"service_name": <unit>}` as payload (failures add
/// `"error"`) and `"orchestrator"` as source.
pub mod kinds {
    /// Source name used for orchestrator events.
    pub const ORCHESTRATOR: &str = "orchestrator";

    /// A unit reached RUNNING.
    pub const SERVICE_STARTED: &str = "service_started";
    /// `start` failed (own error or a dependency).
    pub const SERVICE_START_FAILED: &str = "service_start_failed";
    /// A unit was stopped cleanly.
    pub const SERVICE_STOPPED: &str = "service_stopped";
    /// `stop` reported an error or panicked; the unit is still stopped.
    pub const SERVICE_STOP_FAILED: &str = "service_stop_failed";
    /// The watchdog brought a failed critical unit back.
    pub const SERVICE_RECOVERED: &str = "service_recovered";
    /// The watchdog gave up on a failed critical unit.
    pub const SERVICE_RECOVERY_FAILED: &str = "service_recovery_failed";
}

/// Message routed by the [`EventBus`](crate::EventBus).
///
/// Shared as `Arc<Event>` once published; the only mutable part is the
/// write-once processing mark set by the dispatcher.
#[derive(Debug)]
pub struct Event {
    /// Unique identifier.
    pub id: Uuid,
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Routing key.
    pub event_type: String,
    /// Publishing unit, if any.
    pub source: Option<String>,
    /// Unit the event is addressed to; `None` broadcasts.
    pub target: Option<String>,
    /// Opaque payload.
    pub payload: Value,
    /// Wall-clock creation time.
    pub timestamp: SystemTime,

    created: Instant,
    latency: OnceLock<Duration>,
}

impl Event {
    /// Creates an event with a fresh id, sequence number and timestamp.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            event_type: event_type.into(),
            source: None,
            target: None,
            payload: Value::Null,
            timestamp: SystemTime::now(),
            created: Instant::now(),
            latency: OnceLock::new(),
        }
    }

    /// Attaches the publishing unit.
    #[inline]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Addresses the event to a single unit.
    #[inline]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Attaches a payload.
    #[inline]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Orchestrator lifecycle event for `unit`.
    pub(crate) fn lifecycle(event_type: &str, unit: &str, error: Option<&str>) -> Self {
        let mut payload = serde_json::json!({ "service_name": unit });
        if let Some(error) = error {
            payload["error"] = Value::from(error);
        }
        Event::new(event_type)
            .with_source(kinds::ORCHESTRATOR)
            .with_payload(payload)
    }

    #[inline]
    pub fn is_broadcast(&self) -> bool {
        self.target.is_none()
    }

    /// True once every handler has run.
    #[inline]
    pub fn processed(&self) -> bool {
        self.latency.get().is_some()
    }

    /// Time from creation until every handler had run.
    #[inline]
    pub fn processing_latency(&self) -> Option<Duration> {
        self.latency.get().copied()
    }

    /// Unit name carried by orchestrator lifecycle events.
    pub fn service_name(&self) -> Option<&str> {
        self.payload.get("service_name").and_then(Value::as_str)
    }

    /// Sets the processing mark; later calls are ignored.
    pub(crate) fn mark_processed(&self) {
        let _ = self.latency.set(self.created.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new("a");
        let b = Event::new("b");
        assert!(b.seq > a.seq);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn processing_mark_is_write_once() {
        let ev = Event::new("x");
        assert!(!ev.processed());
        assert_eq!(ev.processing_latency(), None);

        ev.mark_processed();
        let first = ev.processing_latency();
        assert!(ev.processed());

        std::thread::sleep(Duration::from_millis(2));
        ev.mark_processed();
        assert_eq!(ev.processing_latency(), first);
    }

    #[test]
    fn lifecycle_events_name_the_unit() {
        let ev = Event::lifecycle(kinds::SERVICE_STARTED, "db", None);
        assert_eq!(ev.source.as_deref(), Some(kinds::ORCHESTRATOR));
        assert_eq!(ev.service_name(), Some("db"));
        assert!(ev.payload.get("error").is_none());
        assert!(ev.is_broadcast());

        let ev = Event::lifecycle(kinds::SERVICE_STOP_FAILED, "db", Some("boom"));
        assert_eq!(ev.payload["error"], "boom");
    }
}
