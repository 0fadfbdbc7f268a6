//! Per-actor zone discovery.

use std::collections::BTreeMap;

use serde_json::json;
use taleforge_domain::{DomainError, GameState, Visibility};

use crate::events::{topics, EventBus};

/// Mark a zone discovered by an actor. Returns true on a new discovery.
pub fn discover_zone(
    zone_id: &str,
    actor_id: &str,
    world: &mut GameState,
) -> Result<bool, DomainError> {
    let zone = world
        .zones
        .get_mut(zone_id)
        .ok_or_else(|| DomainError::ZoneNotFound(zone_id.to_string()))?;
    Ok(zone.discover_by(actor_id))
}

pub fn is_zone_discovered(zone_id: &str, actor_id: &str, world: &GameState) -> bool {
    world
        .zones
        .get(zone_id)
        .is_some_and(|zone| zone.is_discovered_by(actor_id))
}

/// All zone ids an actor has discovered.
pub fn get_discovered_zones(actor_id: &str, world: &GameState) -> Vec<String> {
    world
        .zones
        .iter()
        .filter(|(_, zone)| zone.is_discovered_by(actor_id))
        .map(|(id, _)| id.clone())
        .collect()
}

/// Adjacent zones the actor has not discovered yet (gm_only targets are
/// never listed).
pub fn get_undiscovered_adjacent_zones(
    zone_id: &str,
    actor_id: &str,
    world: &GameState,
) -> Vec<String> {
    let Some(zone) = world.zones.get(zone_id) else {
        return Vec::new();
    };
    zone.exits
        .iter()
        .filter(|exit| !exit.blocked)
        .filter_map(|exit| world.zones.get(&exit.to).map(|target| (exit, target)))
        .filter(|(_, target)| {
            target.meta.visibility != Visibility::GmOnly && !target.is_discovered_by(actor_id)
        })
        .map(|(exit, _)| exit.to.clone())
        .collect()
}

/// Reveal every non-gm_only zone adjacent to the actor's position, adding
/// the actor to each `discovered_by` set. Returns the newly revealed ids.
pub fn reveal_adjacent_zones(
    actor_id: &str,
    zone_id: &str,
    world: &mut GameState,
    bus: &EventBus,
) -> Vec<String> {
    let targets: Vec<String> = {
        let Some(zone) = world.zones.get(zone_id) else {
            return Vec::new();
        };
        zone.exits.iter().map(|exit| exit.to.clone()).collect()
    };

    let mut revealed = Vec::new();
    for target_id in targets {
        let Some(target) = world.zones.get_mut(&target_id) else {
            continue;
        };
        if target.meta.visibility == Visibility::GmOnly {
            continue;
        }
        if target.discover_by(actor_id) {
            revealed.push(target_id);
        }
    }

    if !revealed.is_empty() {
        bus.publish(
            topics::ZONE_ENTITIES_DISCOVERED,
            json!({
                "actor": actor_id,
                "from_zone": zone_id,
                "revealed_zones": revealed,
            }),
        );
    }

    revealed
}

/// Per-zone discovery status for an actor: "discovered", "undiscovered", or
/// "hidden" for gm_only zones.
pub fn discovery_map(actor_id: &str, world: &GameState) -> BTreeMap<String, &'static str> {
    world
        .zones
        .iter()
        .map(|(id, zone)| {
            let status = if zone.meta.visibility == Visibility::GmOnly {
                "hidden"
            } else if zone.is_discovered_by(actor_id) {
                "discovered"
            } else {
                "undiscovered"
            };
            (id.clone(), status)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use taleforge_domain::{Exit, Meta, Zone};

    fn world() -> GameState {
        let mut world = GameState::default();
        let mut hall = Zone::new("hall", "Hall");
        hall.add_exit(Exit::new("library"));
        hall.add_exit(Exit::new("vault"));
        world.zones.insert("hall".to_string(), hall);
        world
            .zones
            .insert("library".to_string(), Zone::new("library", "Library"));
        let mut vault = Zone::new("vault", "Vault");
        vault.meta = Meta::with_visibility(Visibility::GmOnly);
        world.zones.insert("vault".to_string(), vault);
        world
    }

    #[test]
    fn test_discover_zone() {
        let mut world = world();
        assert!(discover_zone("hall", "pc.arin", &mut world).expect("discover"));
        assert!(!discover_zone("hall", "pc.arin", &mut world).expect("discover"));
        assert!(is_zone_discovered("hall", "pc.arin", &world));
        assert!(discover_zone("nowhere", "pc.arin", &mut world).is_err());
    }

    #[test]
    fn test_reveal_adjacent_skips_gm_only() {
        let mut world = world();
        let bus = EventBus::new();
        let revealed = reveal_adjacent_zones("pc.arin", "hall", &mut world, &bus);
        assert_eq!(revealed, vec!["library".to_string()]);
        assert!(!is_zone_discovered("vault", "pc.arin", &world));
    }

    #[test]
    fn test_discovery_map_statuses() {
        let mut world = world();
        discover_zone("hall", "pc.arin", &mut world).expect("discover");

        let map = discovery_map("pc.arin", &world);
        assert_eq!(map.get("hall"), Some(&"discovered"));
        assert_eq!(map.get("library"), Some(&"undiscovered"));
        assert_eq!(map.get("vault"), Some(&"hidden"));
    }

    #[test]
    fn test_undiscovered_adjacent() {
        let mut world = world();
        let undiscovered = get_undiscovered_adjacent_zones("hall", "pc.arin", &world);
        assert_eq!(undiscovered, vec!["library".to_string()]);

        discover_zone("library", "pc.arin", &mut world).expect("discover");
        assert!(get_undiscovered_adjacent_zones("hall", "pc.arin", &world).is_empty());
    }

    #[test]
    fn test_get_discovered_zones() {
        let mut world = world();
        discover_zone("hall", "pc.arin", &mut world).expect("discover");
        discover_zone("library", "pc.arin", &mut world).expect("discover");
        assert_eq!(
            get_discovered_zones("pc.arin", &world),
            vec!["hall".to_string(), "library".to_string()]
        );
    }
}
