//! In-process event bus for zone graph changes, discovery, meta changes,
//! and cache invalidation.
//!
//! Dispatch is synchronous and best-effort: listeners run in registration
//! order over a snapshot of the listener list, and a listener error is
//! logged without affecting other listeners or the publisher.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::warn;

/// Event topics published by the engine.
pub mod topics {
    pub const EXIT_BLOCKED: &str = "zone_graph.exit_blocked";
    pub const EXIT_UNBLOCKED: &str = "zone_graph.exit_unblocked";
    pub const EXIT_CREATED: &str = "zone_graph.exit_created";
    pub const EXIT_DESTROYED: &str = "zone_graph.exit_destroyed";
    pub const EXIT_CONDITIONS_CHANGED: &str = "zone_graph.exit_conditions_changed";
    pub const ENTITY_DISCOVERED: &str = "entity.discovered";
    pub const ZONE_ENTITIES_DISCOVERED: &str = "zone.entities_discovered";
    pub const ZONE_ENTERED: &str = "zone.entered";
    pub const META_CHANGED: &str = "meta.changed";
    pub const CACHE_INVALIDATED: &str = "cache.invalidated";
}

/// A published event: topic plus JSON payload.
#[derive(Debug, Clone)]
pub struct GameEvent {
    pub topic: String,
    pub payload: Value,
}

type Listener = Rc<dyn Fn(&GameEvent) -> anyhow::Result<()>>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

#[derive(Default)]
struct BusInner {
    listeners: HashMap<String, Vec<(ListenerId, Listener)>>,
    next_id: u64,
}

/// Synchronous in-process pub/sub.
#[derive(Default)]
pub struct EventBus {
    inner: RefCell<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for a topic. Listeners are invoked in
    /// registration order.
    pub fn subscribe<F>(&self, topic: &str, listener: F) -> ListenerId
    where
        F: Fn(&GameEvent) -> anyhow::Result<()> + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner
            .listeners
            .entry(topic.to_string())
            .or_default()
            .push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns true if it was found.
    pub fn unsubscribe(&self, topic: &str, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        if let Some(list) = inner.listeners.get_mut(topic) {
            let before = list.len();
            list.retain(|(lid, _)| *lid != id);
            return list.len() < before;
        }
        false
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.inner
            .borrow()
            .listeners
            .get(topic)
            .map_or(0, Vec::len)
    }

    /// Publish an event to all listeners of its topic. Listener errors are
    /// logged and swallowed; publishing never fails.
    pub fn publish(&self, topic: &str, payload: Value) {
        // Snapshot so listeners can (un)subscribe during dispatch without
        // disrupting delivery.
        let snapshot: Vec<Listener> = {
            let inner = self.inner.borrow();
            match inner.listeners.get(topic) {
                Some(list) => list.iter().map(|(_, l)| Rc::clone(l)).collect(),
                None => return,
            }
        };

        let event = GameEvent {
            topic: topic.to_string(),
            payload,
        };
        for listener in snapshot {
            if let Err(err) = listener(&event) {
                warn!(topic, %err, "event listener failed");
            }
        }
    }
}
