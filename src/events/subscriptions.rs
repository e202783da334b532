//! # Subscription tables.
//!
//! Every subscription is indexed twice:
//! ```text
//! broadcast: event_type ──► [sub, sub, ...]            (registration order)
//! targeted:  owner ──► event_type ──► [sub, sub, ...]  (only subs with an owner)
//! ```
//! Broadcast events are delivered through the first index, targeted events
//! through the second. Removal always updates both.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::events::handler::{same_handler, HandlerRef};

/// Opaque handle returned by [`EventBus::subscribe`](crate::EventBus::subscribe).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

static SUBSCRIPTION_SEQ: AtomicU64 = AtomicU64::new(1);

impl SubscriptionId {
    fn next() -> Self {
        SubscriptionId(SUBSCRIPTION_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

#[derive(Clone)]
pub(crate) struct Subscription {
    pub(crate) id: SubscriptionId,
    pub(crate) event_type: String,
    pub(crate) owner: Option<String>,
    pub(crate) handler: HandlerRef,
}

impl Subscription {
    fn matches(&self, handler: Option<&HandlerRef>, owner: Option<&str>) -> bool {
        let handler_ok = handler.map_or(true, |h| same_handler(h, &self.handler));
        let owner_ok = owner.map_or(true, |o| self.owner.as_deref() == Some(o));
        handler_ok && owner_ok
    }
}

#[derive(Default)]
pub(crate) struct SubscriberTable {
    broadcast: HashMap<String, Vec<Subscription>>,
    targeted: HashMap<String, HashMap<String, Vec<Subscription>>>,
}

impl SubscriberTable {
    pub(crate) fn insert(
        &mut self,
        event_type: String,
        handler: HandlerRef,
        owner: Option<String>,
    ) -> SubscriptionId {
        let sub = Subscription {
            id: SubscriptionId::next(),
            event_type: event_type.clone(),
            owner: owner.clone(),
            handler,
        };
        let id = sub.id;
        if let Some(owner) = owner {
            self.targeted
                .entry(owner)
                .or_default()
                .entry(event_type.clone())
                .or_default()
                .push(sub.clone());
        }
        self.broadcast.entry(event_type).or_default().push(sub);
        id
    }

    /// Handlers for a broadcast event, in registration order.
    pub(crate) fn broadcast_handlers(&self, event_type: &str) -> Vec<HandlerRef> {
        self.broadcast
            .get(event_type)
            .map(|subs| subs.iter().map(|s| s.handler.clone()).collect())
            .unwrap_or_default()
    }

    /// Handlers `target` registered for `event_type`, in registration order.
    pub(crate) fn targeted_handlers(&self, target: &str, event_type: &str) -> Vec<HandlerRef> {
        self.targeted
            .get(target)
            .and_then(|by_type| by_type.get(event_type))
            .map(|subs| subs.iter().map(|s| s.handler.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, event_type: &str) -> usize {
        self.broadcast.get(event_type).map_or(0, Vec::len)
    }

    pub(crate) fn total(&self) -> usize {
        self.broadcast.values().map(Vec::len).sum()
    }

    pub(crate) fn remove_id(&mut self, id: SubscriptionId) -> bool {
        self.remove_where(|s| s.id == id) > 0
    }

    /// Removes subscriptions of `event_type` matching the optional filters.
    pub(crate) fn remove_matching(
        &mut self,
        event_type: &str,
        handler: Option<&HandlerRef>,
        owner: Option<&str>,
    ) -> usize {
        self.remove_where(|s| s.event_type == event_type && s.matches(handler, owner))
    }

    /// Removes every subscription held by `owner`.
    pub(crate) fn remove_owner(&mut self, owner: &str) -> usize {
        self.remove_where(|s| s.owner.as_deref() == Some(owner))
    }

    fn remove_where(&mut self, pred: impl Fn(&Subscription) -> bool) -> usize {
        let mut removed = 0;
        self.broadcast.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|s| !pred(s));
            removed += before - subs.len();
            !subs.is_empty()
        });
        self.targeted.retain(|_, by_type| {
            by_type.retain(|_, subs| {
                subs.retain(|s| !pred(s));
                !subs.is_empty()
            });
            !by_type.is_empty()
        });
        removed
    }
}
