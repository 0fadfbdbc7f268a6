//! Mode-aware world export.
//!
//! Four views of a world, matching the Meta serialization policy: `save`
//! (full fidelity), `session` (runtime subset), `public` (role-redacted,
//! gm_only entities excluded entirely), and `minimal` (visibility flags
//! only).

use serde_json::{json, Map, Value};
use taleforge_domain::{Entity, ExportMode, GameState};

use crate::visibility::{redact_clock, redact_entity, redact_zone, Role};

fn strip_to_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Export the world under a serialization mode.
///
/// `pov_id` selects the viewpoint for redacted modes; public exports with
/// no POV fall back to the first PC.
pub fn export_state(
    world: &GameState,
    mode: ExportMode,
    pov_id: Option<&str>,
    role: Role,
) -> Value {
    let apply_redaction =
        mode == ExportMode::Public || (mode == ExportMode::Session && role != Role::Gm);

    // Public exports need a real POV to filter against
    let default_pov: Option<String> = if mode == ExportMode::Public && pov_id.is_none() {
        world
            .entities
            .iter()
            .find(|(_, e)| matches!(e, Entity::Pc(_)))
            .map(|(id, _)| id.clone())
            .or_else(|| world.entities.keys().next().cloned())
    } else {
        None
    };
    let effective_pov = pov_id.or(default_pov.as_deref());

    let mut zones = Map::new();
    for (zone_id, zone) in &world.zones {
        let mut data = if apply_redaction {
            strip_to_object(redact_zone(effective_pov, zone, world, role))
        } else {
            let mut dump = strip_to_object(serde_json::to_value(zone).unwrap_or(Value::Null));
            dump.insert("adjacent_zones".into(), json!(zone.adjacent_zones()));
            dump.insert("blocked_exits".into(), json!(zone.blocked_exits()));
            dump
        };
        data.insert("meta".into(), zone.meta.export(mode, None));
        zones.insert(zone_id.clone(), Value::Object(data));
    }

    let mut entities = Map::new();
    for (entity_id, entity) in &world.entities {
        if apply_redaction {
            let redacted = redact_entity(effective_pov, entity, world, role);
            // Public saves drop invisible entities entirely
            if mode == ExportMode::Public
                && redacted.get("is_visible") != Some(&json!(true))
            {
                continue;
            }
            let mut data = strip_to_object(redacted);
            data.insert("meta".into(), entity.meta().export(mode, None));
            entities.insert(entity_id.clone(), Value::Object(data));
        } else {
            let mut data = strip_to_object(serde_json::to_value(entity).unwrap_or(Value::Null));
            data.insert("meta".into(), entity.meta().export(mode, None));
            entities.insert(entity_id.clone(), Value::Object(data));
        }
    }

    let mut clocks = Map::new();
    for (clock_id, clock) in &world.clocks {
        let mut data = if apply_redaction {
            strip_to_object(redact_clock(effective_pov, clock))
        } else {
            strip_to_object(serde_json::to_value(clock).unwrap_or(Value::Null))
        };
        if data.contains_key("meta") {
            data.insert("meta".into(), clock.meta.export(mode, None));
        }
        clocks.insert(clock_id.clone(), Value::Object(data));
    }

    let mut scene = strip_to_object(serde_json::to_value(&world.scene).unwrap_or(Value::Null));
    scene.insert("meta".into(), world.scene.meta.export(mode, None));

    json!({
        "scene": scene,
        "zones": zones,
        "entities": entities,
        "clocks": clocks,
        "current_actor": world.current_actor,
        "pending_action": world.pending_action,
        "turn_flags": world.turn_flags,
    })
}

/// Save-file export: complete persistent state with runtime knowledge.
pub fn to_save_format(world: &GameState) -> Value {
    export_state(world, ExportMode::Save, None, Role::Gm)
}

/// Session export: runtime subset for quick resumption.
pub fn to_session_format(world: &GameState, pov_id: Option<&str>) -> Value {
    let role = if pov_id.is_some() { Role::Player } else { Role::Gm };
    export_state(world, ExportMode::Session, pov_id, role)
}

/// Public export: role-redacted and safe to share.
pub fn to_public_format(world: &GameState, pov_id: Option<&str>) -> Value {
    export_state(world, ExportMode::Public, pov_id, Role::Player)
}

/// Minimal export: visibility flags only.
pub fn to_minimal_format(world: &GameState) -> Value {
    export_state(world, ExportMode::Minimal, None, Role::Gm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taleforge_domain::{Creature, Meta, Visibility, Zone};

    fn world() -> GameState {
        let mut world = GameState::default();
        world.zones.insert("hall".to_string(), Zone::new("hall", "Hall"));

        let mut arin = Creature::new("pc.arin", "Arin", "hall");
        arin.meta.notes = Some("secretly the heir".to_string());
        arin.meta.known_by.insert("npc.guard".to_string());
        world.entities.insert("pc.arin".to_string(), Entity::Pc(arin));

        let mut ghost = Creature::new("npc.ghost", "Ghost", "hall");
        ghost.meta = Meta::with_visibility(Visibility::GmOnly);
        world.entities.insert("npc.ghost".to_string(), Entity::Npc(ghost));
        world
    }

    #[test]
    fn test_save_format_keeps_notes_and_known_by() {
        let world = world();
        let saved = to_save_format(&world);
        let meta = &saved["entities"]["pc.arin"]["meta"];
        assert_eq!(meta["notes"], json!("secretly the heir"));
        assert_eq!(meta["known_by"], json!(["npc.guard"]));
    }

    #[test]
    fn test_public_format_excludes_gm_only_entities() {
        let world = world();
        let public = to_public_format(&world, Some("pc.arin"));
        let entities = public["entities"].as_object().expect("entities");
        assert!(entities.contains_key("pc.arin"));
        assert!(!entities.contains_key("npc.ghost"));
        // Public meta replaces known_by with a count
        assert_eq!(
            public["entities"]["pc.arin"]["meta"]["known_by_count"],
            json!(1)
        );
        assert!(public["entities"]["pc.arin"]["meta"].get("known_by").is_none());
    }

    #[test]
    fn test_minimal_format_core_fields_only() {
        let world = world();
        let minimal = to_minimal_format(&world);
        let meta = minimal["entities"]["pc.arin"]["meta"]
            .as_object()
            .expect("meta");
        let keys: Vec<&String> = meta.keys().collect();
        assert_eq!(keys, vec!["gm_only", "visibility"]);
    }

    #[test]
    fn test_session_format_gm_sees_all() {
        let world = world();
        let session = to_session_format(&world, None);
        let entities = session["entities"].as_object().expect("entities");
        assert!(entities.contains_key("npc.ghost"));
    }
}
