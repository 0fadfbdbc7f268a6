//! Cost-based pathfinding with terrain support.
//!
//! Dijkstra over non-negative edge weights, where an edge's weight is the
//! exit cost times any terrain modifier for the travelling actor, floored at
//! the minimum movement cost. Ties are broken by lexicographic successor id
//! so paths are deterministic.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use taleforge_domain::{Creature, GameState, TerrainModifiers};

/// Heap entry ordered by (lowest cost, lexicographic zone id).
#[derive(Debug, Clone, PartialEq)]
struct QueueEntry {
    cost: f64,
    zone: String,
    path: Vec<String>,
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert for lowest-cost-first.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.zone.cmp(&self.zone))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find the lowest-cost path between two zones.
///
/// Returns `(path, total_cost)` or None when the goal is unreachable or the
/// cheapest path would exceed `max_cost`.
pub fn find_lowest_cost_path(
    start: &str,
    goal: &str,
    world: &GameState,
    actor: Option<&Creature>,
    terrain_modifiers: Option<&TerrainModifiers>,
    allow_blocked: bool,
    max_cost: Option<f64>,
) -> Option<(Vec<String>, f64)> {
    find_lowest_cost_path_excluding(
        start,
        goal,
        world,
        actor,
        terrain_modifiers,
        allow_blocked,
        max_cost,
        &BTreeSet::new(),
    )
}

/// Dijkstra with an excluded set of directed edges `(from, to)`; backs both
/// the public entry point and successive-shortest-path enumeration.
#[allow(clippy::too_many_arguments)]
fn find_lowest_cost_path_excluding(
    start: &str,
    goal: &str,
    world: &GameState,
    actor: Option<&Creature>,
    terrain_modifiers: Option<&TerrainModifiers>,
    allow_blocked: bool,
    max_cost: Option<f64>,
    excluded_edges: &BTreeSet<(String, String)>,
) -> Option<(Vec<String>, f64)> {
    if !world.zones.contains_key(start) || !world.zones.contains_key(goal) {
        return None;
    }
    if start == goal {
        return Some((vec![start.to_string()], 0.0));
    }

    let mut best: BTreeMap<String, f64> = BTreeMap::new();
    let mut heap = BinaryHeap::new();
    heap.push(QueueEntry {
        cost: 0.0,
        zone: start.to_string(),
        path: vec![start.to_string()],
    });

    while let Some(QueueEntry { cost, zone, path }) = heap.pop() {
        if let Some(limit) = max_cost {
            if cost > limit {
                continue;
            }
        }
        if zone == goal {
            return Some((path, cost));
        }
        if let Some(&known) = best.get(&zone) {
            if cost > known {
                continue;
            }
        }

        let Some(current) = world.zones.get(&zone) else {
            continue;
        };
        for exit in &current.exits {
            if exit.blocked && !allow_blocked {
                continue;
            }
            if excluded_edges.contains(&(zone.clone(), exit.to.clone())) {
                continue;
            }
            if !world.zones.contains_key(&exit.to) {
                continue;
            }

            let next_cost = cost + exit.movement_cost(actor, terrain_modifiers);
            let improved = best.get(&exit.to).is_none_or(|&known| next_cost < known);
            if improved {
                best.insert(exit.to.clone(), next_cost);
                let mut next_path = path.clone();
                next_path.push(exit.to.clone());
                heap.push(QueueEntry {
                    cost: next_cost,
                    zone: exit.to.clone(),
                    path: next_path,
                });
            }
        }
    }

    None
}

/// Total cost of walking an explicit path with the same parameters the
/// pathfinder would use. None if any hop is missing or blocked.
pub fn calculate_path_cost(
    path: &[String],
    world: &GameState,
    actor: Option<&Creature>,
    terrain_modifiers: Option<&TerrainModifiers>,
    allow_blocked: bool,
) -> Option<f64> {
    if path.len() < 2 {
        return Some(0.0);
    }

    let mut total = 0.0;
    for pair in path.windows(2) {
        let zone = world.zones.get(&pair[0])?;
        let exit = zone.get_exit(&pair[1])?;
        if exit.blocked && !allow_blocked {
            return None;
        }
        total += exit.movement_cost(actor, terrain_modifiers);
    }
    Some(total)
}

/// Find up to `max_paths` distinct paths via successive shortest paths,
/// excluding every directed edge already used by an earlier path. Sorted by
/// total cost.
pub fn find_multiple_paths(
    start: &str,
    goal: &str,
    world: &GameState,
    actor: Option<&Creature>,
    terrain_modifiers: Option<&TerrainModifiers>,
    allow_blocked: bool,
    max_paths: usize,
) -> Vec<(Vec<String>, f64)> {
    let mut paths = Vec::new();
    let mut excluded: BTreeSet<(String, String)> = BTreeSet::new();

    while paths.len() < max_paths {
        let Some((path, cost)) = find_lowest_cost_path_excluding(
            start,
            goal,
            world,
            actor,
            terrain_modifiers,
            allow_blocked,
            None,
            &excluded,
        ) else {
            break;
        };

        for pair in path.windows(2) {
            excluded.insert((pair[0].clone(), pair[1].clone()));
        }
        paths.push((path, cost));
    }

    paths.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    paths
}

/// All zones reachable within a cost budget, with their cheapest cost.
pub fn get_reachable_zones_with_cost(
    start: &str,
    world: &GameState,
    max_cost: f64,
    actor: Option<&Creature>,
    terrain_modifiers: Option<&TerrainModifiers>,
    allow_blocked: bool,
) -> BTreeMap<String, f64> {
    let mut reachable: BTreeMap<String, f64> = BTreeMap::new();
    if !world.zones.contains_key(start) {
        return reachable;
    }

    let mut heap = BinaryHeap::new();
    heap.push(QueueEntry {
        cost: 0.0,
        zone: start.to_string(),
        path: Vec::new(),
    });

    while let Some(QueueEntry { cost, zone, .. }) = heap.pop() {
        if cost > max_cost {
            continue;
        }
        if let Some(&known) = reachable.get(&zone) {
            if cost >= known {
                continue;
            }
        }
        reachable.insert(zone.clone(), cost);

        let Some(current) = world.zones.get(&zone) else {
            continue;
        };
        for exit in &current.exits {
            if exit.blocked && !allow_blocked {
                continue;
            }
            if !world.zones.contains_key(&exit.to) {
                continue;
            }
            let next_cost = cost + exit.movement_cost(actor, terrain_modifiers);
            if next_cost <= max_cost {
                heap.push(QueueEntry {
                    cost: next_cost,
                    zone: exit.to.clone(),
                    path: Vec::new(),
                });
            }
        }
    }

    reachable
}

/// A starting terrain modifier table covering the common terrain tokens.
/// Keys under each terrain are actor tags; values are cost multipliers.
pub fn terrain_modifiers_template() -> TerrainModifiers {
    let mut modifiers: TerrainModifiers = BTreeMap::new();

    let entries: &[(&str, &[(&str, f64)])] = &[
        ("stairs", &[("climbing", 0.5), ("heavy_armor", 1.5)]),
        ("mud", &[("light_step", 0.5), ("heavy_armor", 2.0)]),
        ("water", &[("swimming", 0.5), ("heavy_armor", 3.0)]),
        ("ice", &[("sure_footed", 0.5), ("heavy_armor", 2.0)]),
        ("thorns", &[("thick_hide", 0.5)]),
        ("sand", &[("desert_born", 0.5)]),
        ("rubble", &[("sure_footed", 0.75)]),
        ("swamp", &[("swamp_walker", 0.5), ("heavy_armor", 2.5)]),
        ("fire", &[("fire_resistant", 0.5)]),
        ("lava", &[("fire_resistant", 0.75)]),
    ];

    for (terrain, mods) in entries {
        let table = mods
            .iter()
            .map(|(tag, mult)| ((*tag).to_string(), *mult))
            .collect();
        modifiers.insert((*terrain).to_string(), table);
    }

    modifiers
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taleforge_domain::{Creature, Exit, Zone};

    /// Diamond: start -> (left | right) -> goal, left cheap, right expensive,
    /// plus a direct expensive edge start -> goal.
    fn diamond_world() -> GameState {
        let mut world = GameState::default();

        let mut start = Zone::new("start", "Start");
        start.add_exit(Exit::new("left").with_cost(1.0));
        start.add_exit(Exit::new("right").with_cost(1.0));
        start.add_exit(Exit::new("goal").with_cost(5.0));

        let mut left = Zone::new("left", "Left");
        left.add_exit(Exit::new("goal").with_cost(1.0));
        let mut right = Zone::new("right", "Right");
        right.add_exit(Exit::new("goal").with_cost(3.0));

        world.zones.insert("start".to_string(), start);
        world.zones.insert("left".to_string(), left);
        world.zones.insert("right".to_string(), right);
        world.zones.insert("goal".to_string(), Zone::new("goal", "Goal"));
        world
    }

    #[test]
    fn test_lowest_cost_path_prefers_cheap_route() {
        let world = diamond_world();
        let (path, cost) =
            find_lowest_cost_path("start", "goal", &world, None, None, false, None)
                .expect("path");
        assert_eq!(path, vec!["start", "left", "goal"]);
        assert!((cost - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_lowest_cost_path_same_zone() {
        let world = diamond_world();
        let (path, cost) =
            find_lowest_cost_path("start", "start", &world, None, None, false, None)
                .expect("path");
        assert_eq!(path, vec!["start"]);
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn test_lowest_cost_respects_max_cost() {
        let world = diamond_world();
        assert!(
            find_lowest_cost_path("start", "goal", &world, None, None, false, Some(1.5)).is_none()
        );
        assert!(
            find_lowest_cost_path("start", "goal", &world, None, None, false, Some(2.0)).is_some()
        );
    }

    #[test]
    fn test_terrain_modifier_changes_route() {
        let mut world = diamond_world();
        // Make the cheap route muddy
        world
            .zones
            .get_mut("start")
            .expect("start")
            .get_exit_mut("left")
            .expect("exit")
            .terrain = Some("mud".to_string());

        let mut armored = Creature::new("npc.guard", "Guard", "start");
        armored.tags.insert("heavy_armor".to_string(), json!(true));
        let modifiers = terrain_modifiers_template();

        let (path, cost) = find_lowest_cost_path(
            "start",
            "goal",
            &world,
            Some(&armored),
            Some(&modifiers),
            false,
            None,
        )
        .expect("path");
        // Mud at x2.0 makes the left route cost 3.0; right route also 4.0;
        // left is still cheapest but the cost reflects the modifier.
        assert_eq!(path, vec!["start", "left", "goal"]);
        assert!((cost - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_path_cost_matches_pathfinder_parameters() {
        let world = diamond_world();
        let (path, cost) =
            find_lowest_cost_path("start", "goal", &world, None, None, false, None)
                .expect("path");
        let recomputed =
            calculate_path_cost(&path, &world, None, None, false).expect("cost");
        assert!((cost - recomputed).abs() < f64::EPSILON);
    }

    #[test]
    fn test_multiple_paths_sorted_and_edge_disjoint() {
        let world = diamond_world();
        let paths = find_multiple_paths("start", "goal", &world, None, None, false, 3);
        assert_eq!(paths.len(), 3);

        // Sorted by cost
        assert!(paths[0].1 <= paths[1].1 && paths[1].1 <= paths[2].1);
        assert_eq!(paths[0].0, vec!["start", "left", "goal"]);

        // No directed edge reused
        let mut seen = std::collections::BTreeSet::new();
        for (path, _) in &paths {
            for pair in path.windows(2) {
                assert!(seen.insert((pair[0].clone(), pair[1].clone())));
            }
        }
    }

    #[test]
    fn test_reachable_with_cost() {
        let world = diamond_world();
        let reachable = get_reachable_zones_with_cost("start", &world, 1.0, None, None, false);
        assert!(reachable.contains_key("start"));
        assert!(reachable.contains_key("left"));
        assert!(reachable.contains_key("right"));
        assert!(!reachable.contains_key("goal"));

        let wider = get_reachable_zones_with_cost("start", &world, 2.0, None, None, false);
        assert_eq!(wider.get("goal").copied(), Some(2.0));
    }

    #[test]
    fn test_deterministic_tie_break() {
        let mut world = GameState::default();
        let mut start = Zone::new("start", "Start");
        start.add_exit(Exit::new("zeta").with_cost(1.0));
        start.add_exit(Exit::new("alpha").with_cost(1.0));
        let mut zeta = Zone::new("zeta", "Zeta");
        zeta.add_exit(Exit::new("goal").with_cost(1.0));
        let mut alpha = Zone::new("alpha", "Alpha");
        alpha.add_exit(Exit::new("goal").with_cost(1.0));
        world.zones.insert("start".to_string(), start);
        world.zones.insert("zeta".to_string(), zeta);
        world.zones.insert("alpha".to_string(), alpha);
        world.zones.insert("goal".to_string(), Zone::new("goal", "Goal"));

        for _ in 0..5 {
            let (path, _) =
                find_lowest_cost_path("start", "goal", &world, None, None, false, None)
                    .expect("path");
            assert_eq!(path, vec!["start", "alpha", "goal"]);
        }
    }
}
