//! Bounded per-type event history.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::events::Event;

pub(crate) struct History {
    enabled: bool,
    cap: usize,
    by_type: HashMap<String, VecDeque<Arc<Event>>>,
}

impl History {
    pub(crate) fn new(enabled: bool, cap: usize) -> Self {
        Self {
            enabled,
            cap: cap.max(1),
            by_type: HashMap::new(),
        }
    }

    pub(crate) fn record(&mut self, event: &Arc<Event>) {
        if !self.enabled {
            return;
        }
        let ring = self.by_type.entry(event.event_type.clone()).or_default();
        ring.push_back(Arc::clone(event));
        while ring.len() > self.cap {
            ring.pop_front();
        }
    }

    /// Most recent `limit` events, oldest first.
    pub(crate) fn query(&self, event_type: Option<&str>, limit: Option<usize>) -> Vec<Arc<Event>> {
        if !self.enabled {
            return Vec::new();
        }
        let mut events: Vec<Arc<Event>> = match event_type {
            Some(ty) => self
                .by_type
                .get(ty)
                .map(|ring| ring.iter().cloned().collect())
                .unwrap_or_default(),
            None => {
                let mut all: Vec<Arc<Event>> = self.by_type.values().flatten().cloned().collect();
                all.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.seq.cmp(&b.seq)));
                all
            }
        };
        if let Some(limit) = limit {
            let skip = events.len().saturating_sub(limit);
            events.drain(..skip);
        }
        events
    }

    pub(crate) fn clear(&mut self, event_type: Option<&str>) {
        match event_type {
            Some(ty) => {
                self.by_type.remove(ty);
            }
            None => self.by_type.clear(),
        }
    }

    /// Disabling also drops everything retained so far.
    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.by_type.clear();
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Changes the cap and trims every buffer to it.
    pub(crate) fn set_cap(&mut self, cap: usize) {
        self.cap = cap.max(1);
        for ring in self.by_type.values_mut() {
            while ring.len() > self.cap {
                ring.pop_front();
            }
        }
    }

    pub(crate) fn cap(&self) -> usize {
        self.cap
    }
}
