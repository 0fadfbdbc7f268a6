//! Fine-grained exit redaction.
//!
//! Actors standing in an exit's source zone see it in full (minus GM meta).
//! Actors who have merely discovered one endpoint get a masked record with
//! the label and condition details withheld. Everyone else sees nothing —
//! the safe default.

use serde_json::{json, Value};
use taleforge_domain::{Exit, GameState, Visibility, Zone};

/// Redact a single exit for an actor. Returns None when the actor has no
/// business knowing the exit exists.
pub fn redact_exit(
    exit: &Exit,
    source_zone: &Zone,
    actor_id: &str,
    world: &GameState,
) -> Option<Value> {
    // Exits into GM-only space never surface
    let target_hidden = world
        .zones
        .get(&exit.to)
        .is_none_or(|target| target.meta.visibility == Visibility::GmOnly);
    if target_hidden {
        return None;
    }

    let in_source_zone = world
        .entities
        .get(actor_id)
        .is_some_and(|actor| actor.current_zone() == source_zone.id);

    let knows_endpoint = source_zone.is_discovered_by(actor_id)
        || world
            .zones
            .get(&exit.to)
            .is_some_and(|target| target.is_discovered_by(actor_id));

    if !in_source_zone && !knows_endpoint {
        return None;
    }

    if in_source_zone {
        // Full view; lock internals stay hidden either way
        return Some(json!({
            "to": exit.to,
            "label": exit.display_label(&world.zones),
            "direction": exit.direction.map(|d| d.as_str()),
            "blocked": exit.blocked,
            "has_conditions": exit.conditions.as_ref().is_some_and(|c| !c.is_empty()),
            "terrain": exit.terrain,
            "cost": exit.cost,
            "masked": false,
        }));
    }

    // Knowledge by discovery only: existence and rough shape, details masked
    Some(json!({
        "to": exit.to,
        "label": null,
        "direction": exit.direction.map(|d| d.as_str()),
        "blocked": exit.blocked,
        "has_conditions": null,
        "terrain": null,
        "cost": null,
        "masked": true,
    }))
}

/// All exits of a zone visible to the actor, post-redaction.
pub fn redacted_exits(zone: &Zone, actor_id: &str, world: &GameState) -> Vec<Value> {
    zone.exits
        .iter()
        .filter_map(|exit| redact_exit(exit, zone, actor_id, world))
        .collect()
}
