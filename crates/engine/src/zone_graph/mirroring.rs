//! Bidirectional exit mirroring and consistency repair.
//!
//! World builders usually author one direction of a passage; these utilities
//! generate the reciprocal exits, flag asymmetric pairs, and equalize them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use taleforge_domain::{Direction, Exit, GameState};
use tracing::info;

/// Outcome of a mirroring pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorReport {
    /// `(from_zone, to_zone)` pairs whose reciprocal was created (or would
    /// be, in dry-run mode)
    pub created: Vec<(String, String)>,
    /// Non-fatal problems, e.g. missing target zones
    pub errors: Vec<Value>,
    pub dry_run: bool,
}

/// Reciprocal label by direction-token substitution: "north door" mirrors to
/// "south door" when the exit points north. Labels without a direction token
/// are not carried over.
fn reciprocal_label(label: Option<&str>, direction: Option<Direction>) -> Option<String> {
    let label = label?;
    let direction = direction?;
    let token = direction.as_str();
    let lower = label.to_lowercase();
    if lower.contains(token) {
        return Some(lower.replace(token, direction.opposite().as_str()));
    }
    None
}

fn build_reciprocal(origin_zone: &str, exit: &Exit) -> Exit {
    let mut reciprocal = Exit::new(origin_zone);
    reciprocal.direction = exit.direction.map(|d| d.opposite());
    reciprocal.label = reciprocal_label(exit.label.as_deref(), exit.direction);
    reciprocal.blocked = exit.blocked;
    reciprocal.lock_id = exit.lock_id.clone();
    reciprocal.conditions = exit.conditions.clone();
    reciprocal.cost = exit.cost;
    reciprocal.terrain = exit.terrain.clone();
    reciprocal
}

/// Ensure every exit has a reciprocal on its target zone.
///
/// In dry-run mode the report lists what would be created without touching
/// the world. Missing target zones are reported as `missing_target_zone`
/// errors and do not abort the batch.
pub fn ensure_bidirectional_links(world: &mut GameState, dry_run: bool) -> MirrorReport {
    let mut report = MirrorReport {
        dry_run,
        ..MirrorReport::default()
    };

    // Collect the work list first; mutation happens afterwards so the scan
    // sees a consistent graph.
    let mut missing: Vec<(String, Exit)> = Vec::new();
    for (zone_id, zone) in &world.zones {
        for exit in &zone.exits {
            match world.zones.get(&exit.to) {
                None => report.errors.push(json!({
                    "error": "missing_target_zone",
                    "from_zone": zone_id,
                    "to_zone": exit.to,
                })),
                Some(target) => {
                    if target.get_exit(zone_id).is_none() {
                        missing.push((zone_id.clone(), exit.clone()));
                    }
                }
            }
        }
    }

    for (origin_id, exit) in missing {
        report.created.push((exit.to.clone(), origin_id.clone()));
        if !dry_run {
            let reciprocal = build_reciprocal(&origin_id, &exit);
            if let Some(target) = world.zones.get_mut(&exit.to) {
                target.add_exit(reciprocal);
            }
        }
    }

    if !report.created.is_empty() {
        info!(
            created = report.created.len(),
            dry_run, "bidirectional mirroring pass"
        );
    }

    report
}

/// Create an exit and its reciprocal in one call.
pub fn create_bidirectional_exit(
    world: &mut GameState,
    from_zone: &str,
    to_zone: &str,
    exit: Exit,
) -> Result<(), taleforge_domain::DomainError> {
    if !world.zones.contains_key(to_zone) {
        return Err(taleforge_domain::DomainError::ZoneNotFound(to_zone.to_string()));
    }

    let mut forward = exit;
    forward.to = to_zone.to_string();
    let reciprocal = build_reciprocal(from_zone, &forward);

    let origin = world
        .zones
        .get_mut(from_zone)
        .ok_or_else(|| taleforge_domain::DomainError::ZoneNotFound(from_zone.to_string()))?;
    origin.add_exit(forward);

    if let Some(target) = world.zones.get_mut(to_zone) {
        target.add_exit(reciprocal);
    }
    Ok(())
}

/// Inconsistencies between the two directions of a passage.
pub fn validate_bidirectional_consistency(world: &GameState) -> Vec<Value> {
    let mut issues = Vec::new();

    for (zone_id, zone) in &world.zones {
        for exit in &zone.exits {
            let Some(target) = world.zones.get(&exit.to) else {
                continue;
            };
            let Some(reciprocal) = target.get_exit(zone_id) else {
                issues.push(json!({
                    "issue": "missing_reciprocal",
                    "from_zone": zone_id,
                    "to_zone": exit.to,
                }));
                continue;
            };

            // Each unordered pair is visited twice; report from the smaller
            // id so every issue appears once.
            if zone_id.as_str() > exit.to.as_str() {
                continue;
            }
            if (exit.cost - reciprocal.cost).abs() > f64::EPSILON {
                issues.push(json!({
                    "issue": "cost_mismatch",
                    "from_zone": zone_id,
                    "to_zone": exit.to,
                    "forward_cost": exit.cost,
                    "reverse_cost": reciprocal.cost,
                }));
            }
            if exit.terrain != reciprocal.terrain {
                issues.push(json!({
                    "issue": "terrain_mismatch",
                    "from_zone": zone_id,
                    "to_zone": exit.to,
                }));
            }
            if exit.blocked != reciprocal.blocked {
                issues.push(json!({
                    "issue": "blocked_mismatch",
                    "from_zone": zone_id,
                    "to_zone": exit.to,
                }));
            }
        }
    }

    issues
}

/// How [`fix_bidirectional_inconsistencies`] equalizes a mismatched pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixStrategy {
    PreferLowerCost,
    PreferHigherCost,
    Average,
}

/// Equalize cost/terrain/blocked across every exit pair. Returns the number
/// of pairs fixed.
pub fn fix_bidirectional_inconsistencies(world: &mut GameState, strategy: FixStrategy) -> usize {
    // Gather pairs first to avoid aliasing two zones at once.
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (zone_id, zone) in &world.zones {
        for exit in &zone.exits {
            if zone_id.as_str() < exit.to.as_str() && world.zones.contains_key(&exit.to) {
                pairs.push((zone_id.clone(), exit.to.clone()));
            }
        }
    }

    let mut fixed = 0;
    for (a, b) in pairs {
        let forward = world.zones.get(&a).and_then(|z| z.get_exit(&b)).cloned();
        let reverse = world.zones.get(&b).and_then(|z| z.get_exit(&a)).cloned();
        let (Some(forward), Some(reverse)) = (forward, reverse) else {
            continue;
        };

        let mismatched = (forward.cost - reverse.cost).abs() > f64::EPSILON
            || forward.terrain != reverse.terrain
            || forward.blocked != reverse.blocked;
        if !mismatched {
            continue;
        }

        let cost = match strategy {
            FixStrategy::PreferLowerCost => forward.cost.min(reverse.cost),
            FixStrategy::PreferHigherCost => forward.cost.max(reverse.cost),
            FixStrategy::Average => (forward.cost + reverse.cost) / 2.0,
        };
        // Terrain and blocked flags follow the forward (lexicographically
        // first) exit; cost follows the strategy.
        let terrain = forward.terrain.clone();
        let blocked = forward.blocked;

        for (zone_id, to) in [(&a, &b), (&b, &a)] {
            if let Some(exit) = world
                .zones
                .get_mut(zone_id)
                .and_then(|z| z.get_exit_mut(to))
            {
                exit.cost = cost;
                exit.terrain = terrain.clone();
                exit.blocked = blocked;
            }
            if let Some(zone) = world.zones.get_mut(zone_id) {
                zone.meta.touch();
            }
        }
        fixed += 1;
    }

    fixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use taleforge_domain::Zone;

    fn one_way_world() -> GameState {
        let mut world = GameState::default();
        let mut hall = Zone::new("hall", "Hall");
        let mut exit = Exit::new("cellar")
            .with_direction(Direction::Down)
            .with_cost(2.0)
            .with_terrain("stairs");
        exit.label = Some("down the stairwell".to_string());
        hall.add_exit(exit);
        world.zones.insert("hall".to_string(), hall);
        world.zones.insert("cellar".to_string(), Zone::new("cellar", "Cellar"));
        world
    }

    #[test]
    fn test_ensure_creates_reciprocal() {
        let mut world = one_way_world();
        let report = ensure_bidirectional_links(&mut world, false);

        assert_eq!(report.created, vec![("cellar".to_string(), "hall".to_string())]);
        assert!(report.errors.is_empty());

        let reciprocal = world.zones["cellar"].get_exit("hall").expect("reciprocal");
        assert_eq!(reciprocal.direction, Some(Direction::Up));
        assert_eq!(reciprocal.cost, 2.0);
        assert_eq!(reciprocal.terrain.as_deref(), Some("stairs"));
        assert_eq!(reciprocal.label.as_deref(), Some("up the stairwell"));
    }

    #[test]
    fn test_dry_run_does_not_mutate() {
        let mut world = one_way_world();
        let report = ensure_bidirectional_links(&mut world, true);
        assert_eq!(report.created.len(), 1);
        assert!(world.zones["cellar"].exits.is_empty());
    }

    #[test]
    fn test_missing_target_reported_not_fatal() {
        let mut world = one_way_world();
        world
            .zones
            .get_mut("hall")
            .expect("hall")
            .add_exit(Exit::new("the_void"));

        let report = ensure_bidirectional_links(&mut world, false);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0]["error"], "missing_target_zone");
        // The valid exit was still mirrored
        assert!(world.zones["cellar"].get_exit("hall").is_some());
    }

    #[test]
    fn test_idempotent_once_mirrored() {
        let mut world = one_way_world();
        ensure_bidirectional_links(&mut world, false);
        let second = ensure_bidirectional_links(&mut world, false);
        assert!(second.created.is_empty());
    }

    #[test]
    fn test_label_without_direction_token_not_carried() {
        assert_eq!(
            reciprocal_label(Some("rusty hatch"), Some(Direction::Down)),
            None
        );
        assert_eq!(
            reciprocal_label(Some("north gate"), Some(Direction::North)),
            Some("south gate".to_string())
        );
    }

    #[test]
    fn test_validate_and_fix_consistency() {
        let mut world = one_way_world();
        ensure_bidirectional_links(&mut world, false);
        // Introduce a cost mismatch
        world
            .zones
            .get_mut("cellar")
            .expect("cellar")
            .get_exit_mut("hall")
            .expect("exit")
            .cost = 6.0;

        let issues = validate_bidirectional_consistency(&world);
        assert!(issues.iter().any(|i| i["issue"] == "cost_mismatch"));

        let fixed = fix_bidirectional_inconsistencies(&mut world, FixStrategy::Average);
        assert_eq!(fixed, 1);
        assert_eq!(world.zones["hall"].get_exit("cellar").expect("exit").cost, 4.0);
        assert_eq!(world.zones["cellar"].get_exit("hall").expect("exit").cost, 4.0);
        assert!(validate_bidirectional_consistency(&world).is_empty());
    }

    #[test]
    fn test_create_bidirectional_exit() {
        let mut world = GameState::default();
        world.zones.insert("a".to_string(), Zone::new("a", "A"));
        world.zones.insert("b".to_string(), Zone::new("b", "B"));

        create_bidirectional_exit(
            &mut world,
            "a",
            "b",
            Exit::new("b").with_direction(Direction::East),
        )
        .expect("create");

        assert!(world.zones["a"].get_exit("b").is_some());
        let back = world.zones["b"].get_exit("a").expect("reciprocal");
        assert_eq!(back.direction, Some(Direction::West));

        assert!(create_bidirectional_exit(&mut world, "a", "ghost", Exit::new("ghost")).is_err());
    }
}
