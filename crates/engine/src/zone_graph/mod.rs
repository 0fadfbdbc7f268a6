//! Zone graph utilities: adjacency, traversal, pathfinding, mirroring,
//! discovery, regions, topology mutation, and exit redaction.

mod discovery;
mod exit_redaction;
mod mirroring;
mod mutate;
mod pathfinding;
mod regions;

pub use discovery::{
    discover_zone, discovery_map, get_discovered_zones, get_undiscovered_adjacent_zones,
    is_zone_discovered, reveal_adjacent_zones,
};
pub use exit_redaction::{redact_exit, redacted_exits};
pub use mirroring::{
    create_bidirectional_exit, ensure_bidirectional_links, fix_bidirectional_inconsistencies,
    validate_bidirectional_consistency, FixStrategy, MirrorReport,
};
pub use mutate::{
    block_exit, create_exit, destroy_exit, set_exit_conditions, toggle_exit, unblock_exit,
};
pub use pathfinding::{
    calculate_path_cost, find_lowest_cost_path, find_multiple_paths, get_reachable_zones_with_cost,
    terrain_modifiers_template,
};

use std::collections::{BTreeSet, VecDeque};

use serde_json::{json, Value};
use taleforge_domain::{DomainError, Entity, Exit, GameState, Visibility, Zone};

/// Default search depth bound for BFS traversals.
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Get a zone by id.
pub fn get_zone<'a>(world: &'a GameState, zone_id: &str) -> Result<&'a Zone, DomainError> {
    world
        .zones
        .get(zone_id)
        .ok_or_else(|| DomainError::ZoneNotFound(zone_id.to_string()))
}

/// List usable exits from a zone.
pub fn list_exits<'a>(
    zone: &'a Zone,
    include_blocked: bool,
    include_conditional: bool,
) -> Vec<&'a Exit> {
    zone.exits
        .iter()
        .filter(|exit| include_blocked || !exit.blocked)
        .filter(|exit| {
            include_conditional || exit.conditions.as_ref().is_none_or(|c| c.is_empty())
        })
        .collect()
}

/// Human-readable exit descriptions for a zone. Exits into gm_only zones
/// are omitted.
pub fn describe_exits(zone: &Zone, world: &GameState, include_blocked: bool) -> Vec<Value> {
    list_exits(zone, include_blocked, true)
        .into_iter()
        .filter_map(|exit| {
            let target = world.zones.get(&exit.to)?;
            if target.meta.visibility == Visibility::GmOnly {
                return None;
            }
            Some(json!({
                "to": exit.to,
                "label": exit.display_label(&world.zones),
                "direction": exit.direction.map(|d| d.as_str()),
                "blocked": exit.blocked,
                "has_conditions": exit.conditions.as_ref().is_some_and(|c| !c.is_empty()),
                "target_name": target.name,
            }))
        })
        .collect()
}

/// Check if two zones are directly connected.
pub fn is_adjacent(zone_a_id: &str, zone_b_id: &str, world: &GameState, allow_blocked: bool) -> bool {
    let Ok(zone_a) = get_zone(world, zone_a_id) else {
        return false;
    };
    zone_a
        .exits
        .iter()
        .any(|exit| exit.to == zone_b_id && (allow_blocked || !exit.blocked))
}

/// Bounded BFS reachability check.
pub fn path_exists(
    start: &str,
    goal: &str,
    world: &GameState,
    allow_blocked: bool,
    max_depth: usize,
) -> bool {
    if start == goal {
        return true;
    }

    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    queue.push_back((start.to_string(), 0));

    while let Some((current, depth)) = queue.pop_front() {
        if depth > max_depth || !visited.insert(current.clone()) {
            continue;
        }

        let Ok(zone) = get_zone(world, &current) else {
            continue;
        };
        for exit in &zone.exits {
            if exit.blocked && !allow_blocked {
                continue;
            }
            if exit.to == goal {
                return true;
            }
            if !visited.contains(&exit.to) {
                queue.push_back((exit.to.clone(), depth + 1));
            }
        }
    }

    false
}

/// Shortest path by hop count (BFS, first found).
pub fn find_shortest_path(
    start: &str,
    goal: &str,
    world: &GameState,
    allow_blocked: bool,
    max_depth: usize,
) -> Option<Vec<String>> {
    if start == goal {
        return Some(vec![start.to_string()]);
    }

    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<(String, Vec<String>, usize)> = VecDeque::new();
    queue.push_back((start.to_string(), vec![start.to_string()], 0));

    while let Some((current, path, depth)) = queue.pop_front() {
        if depth > max_depth || !visited.insert(current.clone()) {
            continue;
        }

        let Ok(zone) = get_zone(world, &current) else {
            continue;
        };
        for exit in &zone.exits {
            if exit.blocked && !allow_blocked {
                continue;
            }
            let mut next_path = path.clone();
            next_path.push(exit.to.clone());
            if exit.to == goal {
                return Some(next_path);
            }
            if !visited.contains(&exit.to) {
                queue.push_back((exit.to.clone(), next_path, depth + 1));
            }
        }
    }

    None
}

/// Zone ids adjacent to a zone.
pub fn get_adjacent_zones(zone_id: &str, world: &GameState, include_blocked: bool) -> Vec<String> {
    let Ok(zone) = get_zone(world, zone_id) else {
        return Vec::new();
    };
    zone.exits
        .iter()
        .filter(|exit| include_blocked || !exit.blocked)
        .map(|exit| exit.to.clone())
        .collect()
}

/// All zones reachable from a start within a depth bound.
pub fn get_reachable_zones(
    start: &str,
    world: &GameState,
    allow_blocked: bool,
    max_depth: usize,
) -> BTreeSet<String> {
    let mut reachable = BTreeSet::new();
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    queue.push_back((start.to_string(), 0));

    while let Some((current, depth)) = queue.pop_front() {
        if depth > max_depth || !visited.insert(current.clone()) {
            continue;
        }
        reachable.insert(current.clone());

        let Ok(zone) = get_zone(world, &current) else {
            continue;
        };
        for exit in &zone.exits {
            if exit.blocked && !allow_blocked {
                continue;
            }
            if !visited.contains(&exit.to) {
                queue.push_back((exit.to.clone(), depth + 1));
            }
        }
    }

    reachable
}

/// Check whether an actor can use an exit right now.
///
/// Conditions are evaluated in order — blocked, key, level, tag, stat check —
/// and the first failure wins, returning a reason string.
pub fn is_exit_usable(exit: &Exit, actor: &Entity, _world: &GameState) -> (bool, Option<String>) {
    if exit.blocked {
        return (false, Some("blocked".to_string()));
    }

    let Some(conditions) = &exit.conditions else {
        return (true, None);
    };

    if let Some(key) = &conditions.key_required {
        let has_key = actor
            .as_creature()
            .is_some_and(|creature| creature.has_item(key));
        if !has_key {
            return (false, Some(format!("requires {key}")));
        }
    }

    if let Some(required_level) = conditions.level_required {
        let level = actor.as_creature().map_or(1, |c| c.level());
        if level < required_level {
            return (false, Some(format!("requires level {required_level}")));
        }
    }

    if let Some(tag) = &conditions.tag_required {
        if !actor.tags().contains_key(tag) {
            return (false, Some(format!("requires {tag}")));
        }
    }

    if let Some(stat_check) = &conditions.stat_check {
        // Reserved: stat-based gating is not resolved here yet
        return (false, Some(format!("requires {stat_check} check")));
    }

    (true, None)
}

/// Validate the zone graph for dangling and duplicate exits.
pub fn validate_zone_graph(world: &GameState) -> Vec<String> {
    let mut errors = Vec::new();

    for (zone_id, zone) in &world.zones {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut reported: BTreeSet<&str> = BTreeSet::new();
        for exit in &zone.exits {
            if !world.zones.contains_key(&exit.to) {
                errors.push(format!(
                    "Zone {zone_id} has exit to non-existent zone {}",
                    exit.to
                ));
            }
            if !seen.insert(exit.to.as_str()) && reported.insert(exit.to.as_str()) {
                errors.push(format!(
                    "Zone {zone_id} has multiple exits to zone {}",
                    exit.to
                ));
            }
        }
    }

    errors
}


#[cfg(test)]
mod tests {
    use super::test_support::linear_world;
    use super::*;
    use serde_json::json;
    use taleforge_domain::{Creature, Entity, ExitConditions};

    #[test]
    fn test_get_zone_error() {
        let world = linear_world();
        assert!(get_zone(&world, "a").is_ok());
        assert!(matches!(
            get_zone(&world, "nowhere"),
            Err(DomainError::ZoneNotFound(_))
        ));
    }

    #[test]
    fn test_is_adjacent_respects_blocked() {
        let world = linear_world();
        assert!(is_adjacent("a", "b", &world, false));
        assert!(!is_adjacent("a", "c", &world, false));
        assert!(is_adjacent("a", "c", &world, true));
        assert!(!is_adjacent("nowhere", "a", &world, false));
    }

    #[test]
    fn test_path_exists_and_shortest_path() {
        let world = linear_world();
        assert!(path_exists("a", "c", &world, false, DEFAULT_MAX_DEPTH));
        assert_eq!(
            find_shortest_path("a", "c", &world, false, DEFAULT_MAX_DEPTH),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        // Allowing blocked exits shortens the path
        assert_eq!(
            find_shortest_path("a", "c", &world, true, DEFAULT_MAX_DEPTH)
                .map(|p| p.len()),
            Some(2)
        );
    }

    #[test]
    fn test_path_exists_same_zone() {
        let world = linear_world();
        assert!(path_exists("a", "a", &world, false, DEFAULT_MAX_DEPTH));
        assert_eq!(
            find_shortest_path("a", "a", &world, false, DEFAULT_MAX_DEPTH),
            Some(vec!["a".to_string()])
        );
    }

    #[test]
    fn test_reachable_zones() {
        let world = linear_world();
        let reachable = get_reachable_zones("a", &world, false, DEFAULT_MAX_DEPTH);
        assert_eq!(
            reachable,
            ["a", "b", "c"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn test_is_exit_usable_ordering() {
        let world = linear_world();
        let actor = world.entities["pc.arin"].clone();

        let blocked = Exit::new("b").blocked();
        assert_eq!(
            is_exit_usable(&blocked, &actor, &world),
            (false, Some("blocked".to_string()))
        );

        let mut keyed = Exit::new("b");
        keyed.conditions = Some(ExitConditions {
            key_required: Some("brass_key".to_string()),
            ..ExitConditions::default()
        });
        assert_eq!(
            is_exit_usable(&keyed, &actor, &world),
            (false, Some("requires brass_key".to_string()))
        );

        let mut with_key = world.clone();
        with_key
            .actor_mut("pc.arin")
            .expect("arin")
            .inventory
            .push("brass_key".to_string());
        let actor_with_key = with_key.entities["pc.arin"].clone();
        assert_eq!(is_exit_usable(&keyed, &actor_with_key, &with_key), (true, None));
    }

    #[test]
    fn test_is_exit_usable_level_and_tag() {
        let world = linear_world();
        let mut creature = Creature::new("pc.lyra", "Lyra", "a");
        creature.tags.insert("level".to_string(), json!(3));
        let actor = Entity::Pc(creature);

        let mut exit = Exit::new("b");
        exit.conditions = Some(ExitConditions {
            level_required: Some(5),
            ..ExitConditions::default()
        });
        assert_eq!(
            is_exit_usable(&exit, &actor, &world).1,
            Some("requires level 5".to_string())
        );

        exit.conditions = Some(ExitConditions {
            level_required: Some(2),
            tag_required: Some("blessed".to_string()),
            ..ExitConditions::default()
        });
        assert_eq!(
            is_exit_usable(&exit, &actor, &world).1,
            Some("requires blessed".to_string())
        );
    }

    #[test]
    fn test_stat_check_reserved() {
        let world = linear_world();
        let actor = world.entities["pc.arin"].clone();
        let mut exit = Exit::new("b");
        exit.conditions = Some(ExitConditions {
            stat_check: Some("dexterity:12".to_string()),
            ..ExitConditions::default()
        });
        let (usable, reason) = is_exit_usable(&exit, &actor, &world);
        assert!(!usable);
        assert_eq!(reason, Some("requires dexterity:12 check".to_string()));
    }

    #[test]
    fn test_validate_zone_graph() {
        let mut world = linear_world();
        world
            .zones
            .get_mut("c")
            .expect("zone c")
            .add_exit(Exit::new("ghost"));
        world
            .zones
            .get_mut("c")
            .expect("zone c")
            .exits
            .push(Exit::new("b"));

        let errors = validate_zone_graph(&world);
        assert!(errors.iter().any(|e| e.contains("non-existent zone ghost")));
        assert!(errors.iter().any(|e| e.contains("multiple exits to zone b")));
    }

    #[test]
    fn test_describe_exits_skips_gm_only() {
        let mut world = linear_world();
        world.zones.get_mut("b").expect("zone b").meta =
            taleforge_domain::Meta::with_visibility(taleforge_domain::Visibility::GmOnly);

        let a = &world.zones["a"];
        let descriptions = describe_exits(a, &world, true);
        // b is gm_only so only the blocked exit to c remains
        assert_eq!(descriptions.len(), 1);
        assert_eq!(descriptions[0]["to"], json!("c"));
        assert_eq!(descriptions[0]["blocked"], json!(true));
    }
}
