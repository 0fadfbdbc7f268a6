//! Automatic discovery on zone entry.
//!
//! Moving into a zone discovers the zone, reveals its adjacent zones, and
//! makes the arriving actor and the zone's public occupants known to each
//! other. Mutual discovery is two independent meta updates; each one touches
//! the learned entity's meta and invalidates the observer's cached views.

use serde_json::json;
use taleforge_domain::{GameState, Visibility};

use crate::events::topics;
use crate::runtime::WorldCtx;
use crate::zone_graph;

/// Entity ids in a zone that an arriving actor is allowed to discover.
pub fn discoverable_entities(world: &GameState, zone_id: &str, actor_id: &str) -> Vec<String> {
    world
        .entities
        .iter()
        .filter(|(id, entity)| {
            id.as_str() != actor_id
                && entity.current_zone() == zone_id
                && entity.meta().visibility != Visibility::GmOnly
                && entity.meta().visibility != Visibility::Hidden
        })
        .map(|(id, _)| id.clone())
        .collect()
}

/// Record that `observer` now knows `subject`. Returns true on new
/// knowledge; the subject's meta is touched and the observer's cached view
/// of the subject is invalidated.
fn learn_entity(ctx: &mut WorldCtx<'_>, observer: &str, subject: &str) -> bool {
    let Some(entity) = ctx.world.entities.get_mut(subject) else {
        return false;
    };
    let added = entity.meta_mut().add_known_by(observer);
    if added {
        ctx.cache.invalidate(Some(subject), ctx.bus);
        ctx.bus.publish(
            topics::META_CHANGED,
            json!({
                "object_id": subject,
                "visibility": entity.meta().visibility.as_str(),
                "gm_only": entity.meta().gm_only,
                "known_by_count": entity.meta().known_by.len(),
            }),
        );
    }
    added
}

/// Make the actor and the zone's discoverable occupants known to each other.
/// Returns the ids the actor newly discovered.
pub fn reveal_zone_entities(ctx: &mut WorldCtx<'_>, actor_id: &str, zone_id: &str) -> Vec<String> {
    let candidates = discoverable_entities(ctx.world, zone_id, actor_id);

    let mut discovered = Vec::new();
    for subject in candidates {
        // Two independent updates: actor learns subject, subject learns actor
        if learn_entity(ctx, actor_id, &subject) {
            discovered.push(subject.clone());
            ctx.bus.publish(
                topics::ENTITY_DISCOVERED,
                json!({
                    "entity_id": subject,
                    "discovered_by": actor_id,
                    "zone_id": zone_id,
                }),
            );
        }
        if ctx.world.entities.get(&subject).is_some_and(|e| e.is_creature()) {
            learn_entity(ctx, &subject, actor_id);
        }
    }

    if !discovered.is_empty() {
        ctx.bus.publish(
            topics::ZONE_ENTITIES_DISCOVERED,
            json!({
                "zone_id": zone_id,
                "actor": actor_id,
                "entities": discovered,
            }),
        );
    }

    discovered
}

/// Full exploration cascade for a completed move. Safe to call for
/// non-creatures; it simply does nothing visible.
pub fn trigger_exploration_events(
    ctx: &mut WorldCtx<'_>,
    actor_id: &str,
    from_zone: Option<&str>,
    to_zone: &str,
) {
    // The destination itself becomes discovered
    if let Some(zone) = ctx.world.zones.get_mut(to_zone) {
        if zone.meta.visibility != Visibility::GmOnly {
            zone.discover_by(actor_id);
        }
    }

    zone_graph::reveal_adjacent_zones(actor_id, to_zone, ctx.world, ctx.bus);
    reveal_zone_entities(ctx, actor_id, to_zone);

    ctx.bus.publish(
        topics::ZONE_ENTERED,
        json!({
            "actor": actor_id,
            "from_zone": from_zone,
            "to_zone": to_zone,
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::visibility::RedactionCache;
    use std::cell::RefCell;
    use std::rc::Rc;
    use taleforge_domain::{Creature, Entity, Exit, Meta, Zone};

    fn library_world() -> GameState {
        let mut world = GameState::default();
        let mut hall = Zone::new("hall", "Hall");
        hall.add_exit(Exit::new("library"));
        let mut library = Zone::new("library", "Library");
        library.add_exit(Exit::new("hall"));
        world.zones.insert("hall".to_string(), hall);
        world.zones.insert("library".to_string(), library);

        world.entities.insert(
            "pc.arin".to_string(),
            Entity::Pc(Creature::new("pc.arin", "Arin", "hall")),
        );
        world.entities.insert(
            "npc.librarian".to_string(),
            Entity::Npc(Creature::new("npc.librarian", "Librarian", "library")),
        );
        let mut scout = Creature::new("npc.scout", "Scout", "library");
        scout.meta = Meta::with_visibility(Visibility::Hidden);
        world.entities.insert("npc.scout".to_string(), Entity::Npc(scout));
        world
    }

    #[test]
    fn test_reveal_makes_public_entities_mutually_known() {
        let mut world = library_world();
        let bus = EventBus::new();
        let cache = RedactionCache::new();
        let mut ctx = WorldCtx::new(&mut world, &bus, &cache);

        let discovered = reveal_zone_entities(&mut ctx, "pc.arin", "library");
        assert_eq!(discovered, vec!["npc.librarian".to_string()]);

        let librarian = &world.entities["npc.librarian"];
        assert!(librarian.meta().known_by.contains("pc.arin"));
        let arin = &world.entities["pc.arin"];
        assert!(arin.meta().known_by.contains("npc.librarian"));
    }

    #[test]
    fn test_hidden_entities_stay_hidden() {
        let mut world = library_world();
        let bus = EventBus::new();
        let cache = RedactionCache::new();
        let mut ctx = WorldCtx::new(&mut world, &bus, &cache);

        reveal_zone_entities(&mut ctx, "pc.arin", "library");
        let scout = &world.entities["npc.scout"];
        assert!(!scout.meta().known_by.contains("pc.arin"));
    }

    #[test]
    fn test_exploration_cascade_discovers_and_publishes() {
        let mut world = library_world();
        let bus = EventBus::new();
        let cache = RedactionCache::new();

        let entered = Rc::new(RefCell::new(Vec::new()));
        let entered_clone = Rc::clone(&entered);
        bus.subscribe(topics::ZONE_ENTERED, move |event| {
            entered_clone.borrow_mut().push(event.payload.clone());
            Ok(())
        });
        let discovered = Rc::new(RefCell::new(Vec::new()));
        let discovered_clone = Rc::clone(&discovered);
        bus.subscribe(topics::ENTITY_DISCOVERED, move |event| {
            discovered_clone.borrow_mut().push(event.payload.clone());
            Ok(())
        });

        let mut ctx = WorldCtx::new(&mut world, &bus, &cache);
        trigger_exploration_events(&mut ctx, "pc.arin", Some("hall"), "library");

        assert!(world.zones["library"].is_discovered_by("pc.arin"));
        // Adjacent zones revealed from the library
        assert!(world.zones["hall"].is_discovered_by("pc.arin"));
        assert_eq!(entered.borrow().len(), 1);
        assert_eq!(entered.borrow()[0]["to_zone"], json!("library"));
        assert_eq!(discovered.borrow().len(), 1);
        assert_eq!(discovered.borrow()[0]["entity_id"], json!("npc.librarian"));
    }
}
