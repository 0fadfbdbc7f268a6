//! Regional grouping of zones for macro-level organization.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};
use taleforge_domain::GameState;

/// Zone ids belonging to a region.
pub fn zones_in_region(region: &str, world: &GameState) -> Vec<String> {
    world
        .zones
        .iter()
        .filter(|(_, zone)| zone.is_in_region(region))
        .map(|(id, _)| id.clone())
        .collect()
}

/// Every region name present in the world.
pub fn all_regions(world: &GameState) -> BTreeSet<String> {
    world
        .zones
        .values()
        .filter_map(|zone| zone.region.clone())
        .collect()
}

/// Per-region summary: zone count plus internal/external exit counts.
pub fn region_summary(world: &GameState) -> BTreeMap<String, Value> {
    let mut summary = BTreeMap::new();

    for region in all_regions(world) {
        let members = zones_in_region(&region, world);
        let mut internal_exits = 0usize;
        let mut external_exits = 0usize;

        for zone_id in &members {
            let Some(zone) = world.zones.get(zone_id) else {
                continue;
            };
            for exit in &zone.exits {
                let target_in_region = world
                    .zones
                    .get(&exit.to)
                    .is_some_and(|target| target.is_in_region(&region));
                if target_in_region {
                    internal_exits += 1;
                } else {
                    external_exits += 1;
                }
            }
        }

        summary.insert(
            region.clone(),
            json!({
                "zone_count": members.len(),
                "zones": members,
                "internal_exits": internal_exits,
                "external_exits": external_exits,
            }),
        );
    }

    summary
}

/// Directed connections whose endpoints lie in different regions, as
/// `(from_zone, to_zone, from_region, to_region)`.
pub fn inter_region_connections(world: &GameState) -> Vec<(String, String, String, String)> {
    let mut connections = Vec::new();

    for (zone_id, zone) in &world.zones {
        let Some(from_region) = &zone.region else {
            continue;
        };
        for exit in &zone.exits {
            let Some(target) = world.zones.get(&exit.to) else {
                continue;
            };
            let Some(to_region) = &target.region else {
                continue;
            };
            if from_region != to_region {
                connections.push((
                    zone_id.clone(),
                    exit.to.clone(),
                    from_region.clone(),
                    to_region.clone(),
                ));
            }
        }
    }

    connections
}

/// Assign a region to several zones at once. Returns the ids actually
/// updated (unknown ids are skipped).
pub fn set_zone_regions(
    zone_ids: &[String],
    region: Option<&str>,
    world: &mut GameState,
) -> Vec<String> {
    let mut updated = Vec::new();
    for zone_id in zone_ids {
        if let Some(zone) = world.zones.get_mut(zone_id) {
            zone.set_region(region.map(str::to_string));
            updated.push(zone_id.clone());
        }
    }
    updated
}
