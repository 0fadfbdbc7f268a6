//! Redaction cache for the player role.
//!
//! Keyed by `(pov_id, entity_id)`. Every Meta mutation must invalidate the
//! affected entity's entries (or the whole cache at coarse boundaries such
//! as turn end); invalidation publishes `cache.invalidated`.

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::{json, Value};
use taleforge_domain::GameState;

use crate::events::{topics, EventBus};
use crate::visibility::{redact_entity, Role};

type CacheKey = (Option<String>, String);

#[derive(Default)]
pub struct RedactionCache {
    entries: RefCell<HashMap<CacheKey, Value>>,
}

impl RedactionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Cached player-role view of an entity, computed on miss. Unknown
    /// entities get a stable "not found" shell.
    pub fn get_or_compute(&self, pov_id: Option<&str>, entity_id: &str, world: &GameState) -> Value {
        let key = (pov_id.map(str::to_string), entity_id.to_string());
        if let Some(cached) = self.entries.borrow().get(&key) {
            return cached.clone();
        }

        let view = match world.entities.get(entity_id) {
            Some(entity) => redact_entity(pov_id, entity, world, Role::Player),
            None => json!({
                "id": entity_id,
                "type": "unknown",
                "is_visible": false,
                "name": "Not Found",
            }),
        };

        self.entries.borrow_mut().insert(key, view.clone());
        view
    }

    /// Invalidate entries for one entity, or the whole cache when
    /// `entity_id` is None. Publishes `cache.invalidated`.
    pub fn invalidate(&self, entity_id: Option<&str>, bus: &EventBus) {
        let size_before = self.len();
        match entity_id {
            Some(eid) => {
                self.entries.borrow_mut().retain(|(_, cached_eid), _| cached_eid != eid);
            }
            None => self.entries.borrow_mut().clear(),
        }

        bus.publish(
            topics::CACHE_INVALIDATED,
            json!({
                "entity_id": entity_id,
                "cache_size_before": size_before,
                "full_clear": entity_id.is_none(),
            }),
        );
    }
}
