//! Visibility and redaction layer.
//!
//! Centralizes all visibility logic and produces safe, schema-stable JSON
//! views of entities, zones, and clocks. The top-level key set of a redacted
//! entity depends only on the entity type, never on visibility: hidden
//! fields are replaced by null/empty sentinels so downstream consumers keep
//! a fixed schema.

mod cache;

pub use cache::RedactionCache;

use serde_json::{json, Map, Value};
use taleforge_domain::{Clock, Entity, GameState, Visibility, Zone};

/// Redaction role determining information access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player,
    Narrator,
    Gm,
}

/// Pure visibility check. Does NOT cause discovery.
///
/// Returns true only if the POV already knows the entity or it is public and
/// perceivable under current conditions. `pov_id = None` is the GM view and
/// sees everything.
pub fn can_player_see(pov_id: Option<&str>, entity: &Entity, world: &GameState) -> bool {
    let Some(pov_id) = pov_id else {
        return true;
    };

    let meta = entity.meta();
    if meta.gm_only || meta.visibility == Visibility::GmOnly {
        return false;
    }

    // Hidden entities are only visible to those who know about them
    if meta.visibility == Visibility::Hidden {
        return meta.known_by.contains(pov_id);
    }

    let Some(pov) = world.entities.get(pov_id) else {
        return false;
    };

    // Basic spatial rule: same-zone visibility
    if entity.current_zone() == pov.current_zone() {
        return true;
    }

    // Public items stay known once learned, wherever they are
    if matches!(entity, Entity::Item(_)) && meta.known_by.contains(pov_id) {
        return true;
    }

    false
}

fn full_dump(entity: &Entity) -> Map<String, Value> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// The sensitive field names per entity shape, with their sentinel values.
fn sentinel_fields(entity: &Entity) -> Vec<(&'static str, Value)> {
    match entity {
        Entity::Pc(_) | Entity::Npc(_) => vec![
            ("stats", json!({
                "strength": null, "dexterity": null, "constitution": null,
                "intelligence": null, "wisdom": null, "charisma": null,
            })),
            ("hp", json!({"current": null, "max": null})),
            ("visible_actors", json!([])),
            ("has_weapon", Value::Null),
            ("has_talked_this_turn", Value::Null),
            ("inventory", json!([])),
            ("conditions", json!({})),
            ("guard", Value::Null),
            ("guard_duration", Value::Null),
            ("style_bonus", Value::Null),
            ("marks", json!({})),
        ],
        Entity::Object(_) => vec![
            ("description", Value::Null),
            ("interactable", Value::Null),
            ("locked", Value::Null),
        ],
        Entity::Item(_) => vec![
            ("description", Value::Null),
            ("weight", Value::Null),
            ("value", Value::Null),
        ],
    }
}

fn narrator_sentinel_fields(entity: &Entity) -> Vec<(&'static str, Value)> {
    match entity {
        Entity::Pc(c) | Entity::Npc(c) => vec![
            ("stats", json!({
                "strength": -1, "dexterity": -1, "constitution": -1,
                "intelligence": -1, "wisdom": -1, "charisma": -1,
            })),
            ("hp", json!({"current": -1, "max": -1})),
            ("visible_actors", json!([])),
            ("has_weapon", Value::Null),
            ("has_talked_this_turn", Value::Null),
            ("inventory", json!([])),
            ("conditions", json!({})),
            ("guard", Value::Null),
            ("guard_duration", Value::Null),
            ("style_bonus", Value::Null),
            ("marks", json!({"hidden_mark_count": c.marks.len()})),
        ],
        other => sentinel_fields(other),
    }
}

/// Return a safe, schema-consistent view of an entity for the role and POV.
pub fn redact_entity(
    pov_id: Option<&str>,
    entity: &Entity,
    world: &GameState,
    role: Role,
) -> Value {
    // GM role sees everything unredacted
    if role == Role::Gm {
        let mut dump = full_dump(entity);
        dump.insert("is_visible".into(), json!(true));
        return Value::Object(dump);
    }

    let visible = can_player_see(pov_id, entity, world);

    if visible {
        let mut safe = full_dump(entity);
        safe.insert("is_visible".into(), json!(true));
        // Player and narrator never see GM notes
        if let Some(Value::Object(meta)) = safe.get_mut("meta") {
            meta.insert("notes".into(), Value::Null);
        }
        return Value::Object(safe);
    }

    // Narrator keeps identity and location of hidden entities, with
    // sensitive fields collapsed to numeric sentinels.
    if role == Role::Narrator && entity.meta().visibility == Visibility::Hidden {
        let mut view = full_dump(entity);
        view.insert("is_visible".into(), json!(false));
        view.insert(
            "meta".into(),
            json!({
                "visibility": entity.meta().visibility.as_str(),
                "created_at": entity.meta().created_at,
                "last_changed_at": entity.meta().last_changed_at,
                "source": entity.meta().source,
                "notes": null,
                "extra": entity.meta().extra,
            }),
        );
        for (field, sentinel) in narrator_sentinel_fields(entity) {
            view.insert(field.to_string(), sentinel);
        }
        return Value::Object(view);
    }

    // Fully-redacted shell: same key set as the full dump, sensitive
    // values replaced by sentinels.
    let mut shell = full_dump(entity);
    shell.insert("is_visible".into(), json!(false));
    shell.insert("name".into(), json!("Unknown"));
    shell.insert("current_zone".into(), Value::Null);
    shell.insert("tags".into(), json!({}));
    shell.insert(
        "meta".into(),
        json!({
            "visibility": "hidden",
            "created_at": null,
            "last_changed_at": null,
            "source": null,
            "notes": null,
            "extra": {},
        }),
    );
    for (field, sentinel) in sentinel_fields(entity) {
        shell.insert(field.to_string(), sentinel);
    }
    Value::Object(shell)
}

/// Return a safe, schema-consistent view of a zone.
pub fn redact_zone(pov_id: Option<&str>, zone: &Zone, world: &GameState, role: Role) -> Value {
    if role == Role::Gm {
        let mut dump = zone_dump(zone);
        dump.insert("is_visible".into(), json!(true));
        return Value::Object(dump);
    }

    if zone.meta.visibility == Visibility::GmOnly {
        return json!({
            "id": zone.id,
            "name": "Unknown Area",
            "description": "You cannot see this area.",
            "adjacent_zones": [],
            "blocked_exits": [],
            "entities": [],
            "is_visible": false,
        });
    }

    let visible_entities: Vec<&String> = world
        .entities
        .iter()
        .filter(|(_, e)| e.current_zone() == zone.id && can_player_see(pov_id, e, world))
        .map(|(id, _)| id)
        .collect();

    let mut dump = zone_dump(zone);
    dump.insert("entities".into(), json!(visible_entities));
    dump.insert("is_visible".into(), json!(true));
    if let Some(Value::Object(meta)) = dump.get_mut("meta") {
        meta.insert("notes".into(), Value::Null);
    }
    Value::Object(dump)
}

fn zone_dump(zone: &Zone) -> Map<String, Value> {
    let mut dump = match serde_json::to_value(zone) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    // Legacy derived fields ride along for older consumers
    dump.insert("adjacent_zones".into(), json!(zone.adjacent_zones()));
    dump.insert("blocked_exits".into(), json!(zone.blocked_exits()));
    dump
}

/// Return a safe, schema-consistent view of a clock.
pub fn redact_clock(pov_id: Option<&str>, clock: &Clock) -> Value {
    let hidden_shell = || {
        json!({
            "id": clock.id,
            "name": "Unknown Progress",
            "value": null,
            "maximum": null,
            "is_visible": false,
        })
    };

    match clock.meta.visibility {
        Visibility::GmOnly => return hidden_shell(),
        Visibility::Hidden => {
            let known = pov_id.is_some_and(|pov| clock.meta.known_by.contains(pov));
            if !known {
                return hidden_shell();
            }
        }
        Visibility::Public => {}
    }

    let mut dump = match serde_json::to_value(clock) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    dump.insert("is_visible".into(), json!(true));
    if let Some(Value::Object(meta)) = dump.get_mut("meta") {
        meta.insert("notes".into(), Value::Null);
    }
    Value::Object(dump)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use taleforge_domain::{Creature, Exit, Meta};

    fn world_with_hidden_scout() -> GameState {
        let mut world = GameState::default();
        let mut hall = Zone::new("hall", "Great Hall");
        hall.add_exit(Exit::new("library"));
        world.zones.insert("hall".to_string(), hall);
        world
            .zones
            .insert("library".to_string(), Zone::new("library", "Library"));

        world.entities.insert(
            "pc.arin".to_string(),
            Entity::Pc(Creature::new("pc.arin", "Arin", "hall")),
        );

        let mut scout = Creature::new("npc.scout", "Scout", "hall");
        scout.meta = Meta::with_visibility(Visibility::Hidden);
        world
            .entities
            .insert("npc.scout".to_string(), Entity::Npc(scout));

        world
            .entities
            .insert(
                "npc.guard".to_string(),
                Entity::Npc(Creature::new("npc.guard", "Guard", "library")),
            );
        world
    }

    #[test]
    fn test_gm_pov_sees_everything() {
        let world = world_with_hidden_scout();
        let scout = &world.entities["npc.scout"];
        assert!(can_player_see(None, scout, &world));
    }

    #[test]
    fn test_hidden_requires_known_by() {
        let mut world = world_with_hidden_scout();
        let scout = world.entities["npc.scout"].clone();
        assert!(!can_player_see(Some("pc.arin"), &scout, &world));

        world
            .entities
            .get_mut("npc.scout")
            .expect("scout")
            .meta_mut()
            .known_by = BTreeSet::from(["pc.arin".to_string()]);
        let scout = &world.entities["npc.scout"];
        assert!(can_player_see(Some("pc.arin"), scout, &world));
    }

    #[test]
    fn test_same_zone_rule() {
        let world = world_with_hidden_scout();
        let guard = &world.entities["npc.guard"];
        // Guard is in the library, Arin in the hall
        assert!(!can_player_see(Some("pc.arin"), guard, &world));
    }

    #[test]
    fn test_redacted_shell_keeps_key_set() {
        let world = world_with_hidden_scout();
        let scout = &world.entities["npc.scout"];

        let visible_view = redact_entity(None, scout, &world, Role::Gm);
        let hidden_view = redact_entity(Some("pc.arin"), scout, &world, Role::Player);

        let visible_keys: BTreeSet<&String> =
            visible_view.as_object().expect("object").keys().collect();
        let hidden_keys: BTreeSet<&String> =
            hidden_view.as_object().expect("object").keys().collect();
        assert_eq!(visible_keys, hidden_keys);

        assert_eq!(hidden_view["is_visible"], json!(false));
        assert_eq!(hidden_view["name"], json!("Unknown"));
        assert_eq!(hidden_view["hp"], json!({"current": null, "max": null}));
        assert_eq!(hidden_view["inventory"], json!([]));
    }

    #[test]
    fn test_player_view_strips_gm_notes() {
        let mut world = world_with_hidden_scout();
        world
            .entities
            .get_mut("pc.arin")
            .expect("arin")
            .meta_mut()
            .notes = Some("secretly cursed".to_string());

        let view = redact_entity(Some("pc.arin"), &world.entities["pc.arin"], &world, Role::Player);
        assert_eq!(view["meta"]["notes"], Value::Null);
        assert_eq!(view["is_visible"], json!(true));
    }

    #[test]
    fn test_narrator_sees_hidden_identity_with_sentinels() {
        let world = world_with_hidden_scout();
        let scout = &world.entities["npc.scout"];
        let view = redact_entity(Some("pc.arin"), scout, &world, Role::Narrator);

        assert_eq!(view["name"], json!("Scout"));
        assert_eq!(view["current_zone"], json!("hall"));
        assert_eq!(view["hp"], json!({"current": -1, "max": -1}));
        assert_eq!(view["marks"], json!({"hidden_mark_count": 0}));
        assert_eq!(view["meta"]["notes"], Value::Null);
    }

    #[test]
    fn test_redact_zone_filters_entities() {
        let world = world_with_hidden_scout();
        let hall = &world.zones["hall"];
        let view = redact_zone(Some("pc.arin"), hall, &world, Role::Player);

        let entities: Vec<&str> = view["entities"]
            .as_array()
            .expect("array")
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(entities.contains(&"pc.arin"));
        assert!(!entities.contains(&"npc.scout"));
    }

    #[test]
    fn test_redact_gm_only_zone() {
        let mut world = world_with_hidden_scout();
        world
            .zones
            .get_mut("library")
            .expect("library")
            .meta = Meta::with_visibility(Visibility::GmOnly);

        let view = redact_zone(Some("pc.arin"), &world.zones["library"], &world, Role::Player);
        assert_eq!(view["is_visible"], json!(false));
        assert_eq!(view["name"], json!("Unknown Area"));
    }

    #[test]
    fn test_redact_clock_visibility() {
        let mut clock = Clock::new("doom", "Doom Clock");
        clock.meta = Meta::with_visibility(Visibility::Hidden);

        let hidden = redact_clock(Some("pc.arin"), &clock);
        assert_eq!(hidden["is_visible"], json!(false));
        assert_eq!(hidden["value"], Value::Null);

        clock.meta.known_by.insert("pc.arin".to_string());
        let known = redact_clock(Some("pc.arin"), &clock);
        assert_eq!(known["is_visible"], json!(true));
    }
}
