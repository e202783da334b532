//! # In-process publish/subscribe bus.
//!
//! [`EventBus`] routes [`Event`]s from any number of publishers to subscribed
//! [`Handler`](crate::Handler)s through a single FIFO queue drained by one
//! dispatcher task.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                     Dispatcher (one):
//!   unit A ──┐
//!   unit B ──┼──► publish ──► [mpsc queue] ──► target? ──► targeted[target][type] ──► h1, h2 ...
//!   orch.  ──┘       │         (unbounded)        │
//!                    └──► history[type]           └──────► broadcast[type] ──► h1, h2 ...
//!                         (ring, cap H)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits and never rejects an
//!   event while the dispatcher runs; a stopped dispatcher drops the event with
//!   a warning (counted in `dropped`).
//! - **Global FIFO**: events are dispatched one at a time in publish order;
//!   handlers of one event run sequentially in registration order.
//! - **Isolation**: a handler error or panic is logged as a
//!   [`DispatchError`] and delivery continues with the next handler.
//! - **Targeted delivery**: an event with a `target` reaches only handlers that
//!   target registered for its type; with none it is processed with zero deliveries.
//! - **Stop discards**: events still queued when [`EventBus::stop`] is called are
//!   discarded. Call [`EventBus::wait_idle`] first to drain.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BusConfig;
use crate::error::{panic_message, DispatchError};
use crate::events::event::Event;
use crate::events::handler::HandlerRef;
use crate::events::history::History;
use crate::events::subscriptions::{SubscriberTable, SubscriptionId};

/// Point-in-time counters of a bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Events accepted into the queue.
    pub published: u64,
    /// Events fully dispatched.
    pub processed: u64,
    /// Events rejected at publish (queue full or dispatcher not running).
    pub dropped: u64,
    /// Events accepted but discarded by `stop`.
    pub discarded: u64,
    /// Handler invocations.
    pub deliveries: u64,
    /// Handler invocations that returned an error or panicked.
    pub handler_failures: u64,
    /// Live subscriptions.
    pub subscriptions: usize,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
    discarded: AtomicU64,
    deliveries: AtomicU64,
    handler_failures: AtomicU64,
    /// Accepted and not yet rejected; compared against `finished` by `wait_idle`.
    accepted: AtomicU64,
    finished: AtomicU64,
    idle: Notify,
}

impl Counters {
    fn finish(&self, n: u64) {
        self.finished.fetch_add(n, AtomicOrdering::SeqCst);
        self.idle.notify_waiters();
    }

    fn is_idle(&self) -> bool {
        self.finished.load(AtomicOrdering::SeqCst) >= self.accepted.load(AtomicOrdering::SeqCst)
    }
}

struct Dispatcher {
    tx: mpsc::UnboundedSender<Arc<Event>>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    subs: Arc<RwLock<SubscriberTable>>,
    counters: Arc<Counters>,
    history: Mutex<History>,
    dispatcher: Mutex<Option<Dispatcher>>,
}

/// Ordered, fault-isolated event bus.
///
/// Cheap to clone; clones share subscriptions, history and the dispatcher.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("running", &self.is_running())
            .field("history_cap", &self.history_cap())
            .finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(&BusConfig::default())
    }
}

impl EventBus {
    /// Creates a stopped bus. Call [`start`](Self::start) before publishing.
    pub fn new(cfg: &BusConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                subs: Arc::new(RwLock::new(SubscriberTable::default())),
                counters: Arc::new(Counters::default()),
                history: Mutex::new(History::new(cfg.history_enabled, cfg.history_cap)),
                dispatcher: Mutex::new(None),
            }),
        }
    }

    /// Spawns the dispatcher on the current tokio runtime.
    ///
    /// Returns `false` if it is already running or no runtime is available.
    pub fn start(&self) -> bool {
        let mut slot = self.inner.dispatcher.lock();
        if slot.as_ref().is_some_and(|d| !d.handle.is_finished()) {
            return false;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("event bus cannot start outside a tokio runtime");
            return false;
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let handle = runtime.spawn(dispatch_loop(
            rx,
            token.clone(),
            Arc::clone(&self.inner.subs),
            Arc::clone(&self.inner.counters),
        ));
        *slot = Some(Dispatcher { tx, token, handle });
        info!("event bus started");
        true
    }

    /// Stops the dispatcher; queued events are discarded. Idempotent.
    pub async fn stop(&self) {
        let Some(dispatcher) = self.inner.dispatcher.lock().take() else {
            return;
        };
        dispatcher.token.cancel();
        drop(dispatcher.tx);
        if let Err(err) = dispatcher.handle.await {
            warn!(error = %err, "event dispatcher ended abnormally");
        }
        info!("event bus stopped");
    }

    /// True while the dispatcher accepts events.
    pub fn is_running(&self) -> bool {
        self.inner
            .dispatcher
            .lock()
            .as_ref()
            .is_some_and(|d| !d.handle.is_finished())
    }

    /// Registers `handler` for `event_type`.
    ///
    /// With an `owner`, the handler also receives events targeted at that owner.
    pub fn subscribe(
        &self,
        event_type: impl Into<String>,
        handler: HandlerRef,
        owner: Option<&str>,
    ) -> SubscriptionId {
        let event_type = event_type.into();
        debug!(event_type = %event_type, handler = handler.name(), owner = ?owner, "subscribe");
        self.inner
            .subs
            .write()
            .insert(event_type, handler, owner.map(str::to_string))
    }

    /// Removes one subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.inner.subs.write().remove_id(id);
        debug!(subscription = %id, removed, "unsubscribe");
        removed
    }

    /// Removes subscriptions of `event_type`:
    /// - with `handler`: only that handler (restricted to `owner` if given);
    /// - with only `owner`: everything `owner` registered for the type;
    /// - with neither: every subscription of the type.
    ///
    /// Returns how many subscriptions were removed.
    pub fn unsubscribe_matching(
        &self,
        event_type: &str,
        handler: Option<&HandlerRef>,
        owner: Option<&str>,
    ) -> usize {
        let removed = self
            .inner
            .subs
            .write()
            .remove_matching(event_type, handler, owner);
        debug!(event_type, owner = ?owner, removed, "unsubscribe matching");
        removed
    }

    /// Removes every subscription held by `owner`, across all types.
    pub fn unsubscribe_owner(&self, owner: &str) -> usize {
        let removed = self.inner.subs.write().remove_owner(owner);
        debug!(owner, removed, "unsubscribe owner");
        removed
    }

    /// Number of subscriptions for `event_type`.
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.inner.subs.read().count(event_type)
    }

    /// Enqueues `event` for dispatch and records it in history.
    ///
    /// Never blocks. When the dispatcher is not running the event is dropped
    /// (and not recorded).
    pub fn publish(&self, event: Event) -> Arc<Event> {
        let event = Arc::new(event);
        let counters = &self.inner.counters;

        let slot = self.inner.dispatcher.lock();
        let Some(dispatcher) = slot.as_ref() else {
            counters.dropped.fetch_add(1, AtomicOrdering::Relaxed);
            warn!(event_type = %event.event_type, "event bus is not running, dropping event");
            return event;
        };

        // Holding the history lock across send keeps history in queue order.
        let mut history = self.inner.history.lock();
        counters.accepted.fetch_add(1, AtomicOrdering::SeqCst);
        if dispatcher.tx.send(Arc::clone(&event)).is_ok() {
            counters.published.fetch_add(1, AtomicOrdering::Relaxed);
            history.record(&event);
        } else {
            counters.accepted.fetch_sub(1, AtomicOrdering::SeqCst);
            counters.dropped.fetch_add(1, AtomicOrdering::Relaxed);
            counters.idle.notify_waiters();
            warn!(event_type = %event.event_type, "event dispatcher is gone, dropping event");
        }
        event
    }

    /// Builds and publishes an event.
    pub fn emit(
        &self,
        event_type: impl Into<String>,
        payload: Value,
        source: Option<&str>,
        target: Option<&str>,
    ) -> Arc<Event> {
        let mut event = Event::new(event_type).with_payload(payload);
        if let Some(source) = source {
            event = event.with_source(source);
        }
        if let Some(target) = target {
            event = event.with_target(target);
        }
        self.publish(event)
    }

    /// Most recent `limit` events of `event_type` (or of every type, merged by
    /// time), oldest first.
    pub fn history(&self, event_type: Option<&str>, limit: Option<usize>) -> Vec<Arc<Event>> {
        self.inner.history.lock().query(event_type, limit)
    }

    /// Drops retained events of one type, or of all types.
    pub fn clear_history(&self, event_type: Option<&str>) {
        self.inner.history.lock().clear(event_type);
    }

    /// Turns history recording on or off. Turning it off drops retained
    /// events, and [`history`](Self::history) returns nothing while off.
    pub fn set_history_enabled(&self, enabled: bool) {
        self.inner.history.lock().set_enabled(enabled);
    }

    pub fn history_enabled(&self) -> bool {
        self.inner.history.lock().is_enabled()
    }

    /// Changes the per-type cap; existing buffers are trimmed immediately.
    pub fn set_history_cap(&self, cap: usize) {
        self.inner.history.lock().set_cap(cap);
    }

    pub fn history_cap(&self) -> usize {
        self.inner.history.lock().cap()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> BusStats {
        let c = &self.inner.counters;
        BusStats {
            published: c.published.load(AtomicOrdering::Relaxed),
            processed: c.processed.load(AtomicOrdering::Relaxed),
            dropped: c.dropped.load(AtomicOrdering::Relaxed),
            discarded: c.discarded.load(AtomicOrdering::Relaxed),
            deliveries: c.deliveries.load(AtomicOrdering::Relaxed),
            handler_failures: c.handler_failures.load(AtomicOrdering::Relaxed),
            subscriptions: self.inner.subs.read().total(),
        }
    }

    /// Waits until every accepted event has been dispatched or discarded.
    ///
    /// Must not be awaited from inside a handler: the dispatcher would wait on itself.
    pub async fn wait_idle(&self) {
        let counters = &self.inner.counters;
        loop {
            let notified = counters.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if counters.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<Arc<Event>>,
    token: CancellationToken,
    subs: Arc<RwLock<SubscriberTable>>,
    counters: Arc<Counters>,
) {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            next = rx.recv() => match next {
                Some(event) => {
                    deliver(&event, &subs, &counters).await;
                    counters.finish(1);
                }
                None => break,
            },
        }
    }

    rx.close();
    let mut discarded = 0u64;
    while rx.try_recv().is_ok() {
        discarded += 1;
    }
    if discarded > 0 {
        warn!(discarded, "event bus stopped with queued events");
        counters.discarded.fetch_add(discarded, AtomicOrdering::Relaxed);
        counters.finish(discarded);
    }
}

async fn deliver(event: &Arc<Event>, subs: &RwLock<SubscriberTable>, counters: &Counters) {
    let handlers = {
        let table = subs.read();
        match event.target.as_deref() {
            Some(target) => table.targeted_handlers(target, &event.event_type),
            None => table.broadcast_handlers(&event.event_type),
        }
    };
    if handlers.is_empty() {
        debug!(event_type = %event.event_type, target = ?event.target, "no handlers");
    }

    for handler in handlers {
        counters.deliveries.fetch_add(1, AtomicOrdering::Relaxed);
        let outcome = std::panic::AssertUnwindSafe(handler.handle(Arc::clone(event)))
            .catch_unwind()
            .await;
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(DispatchError::HandlerFailed {
                handler: handler.name().to_string(),
                event_type: event.event_type.clone(),
                error: err.to_string(),
            }),
            Err(payload) => Some(DispatchError::HandlerPanicked {
                handler: handler.name().to_string(),
                event_type: event.event_type.clone(),
                info: panic_message(payload.as_ref()),
            }),
        };
        if let Some(err) = failure {
            counters.handler_failures.fetch_add(1, AtomicOrdering::Relaxed);
            error!(label = err.as_label(), seq = event.seq, "{err}");
        }
    }

    event.mark_processed();
    counters.processed.fetch_add(1, AtomicOrdering::Relaxed);
}
