//! Core game state: the world that one table plays against.
//!
//! `GameState` is plain serializable data. The event bus, redaction cache,
//! and external collaborators live on the engine's `Runtime`, which owns a
//! `GameState` by value and hands it to mutators by exclusive reference.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::Clock;
use crate::entities::{Creature, Entity};
use crate::scene::Scene;
use crate::space::Zone;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GameState {
    pub entities: BTreeMap<String, Entity>,
    pub zones: BTreeMap<String, Zone>,
    pub clocks: BTreeMap<String, Clock>,
    pub scene: Scene,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_action: Option<String>,
    pub turn_flags: BTreeMap<String, Value>,
}

impl GameState {
    /// Iterate over living entities (PCs and NPCs) only.
    pub fn actors(&self) -> impl Iterator<Item = (&String, &Creature)> {
        self.entities
            .iter()
            .filter_map(|(id, e)| e.as_creature().map(|c| (id, c)))
    }

    pub fn actor(&self, id: &str) -> Option<&Creature> {
        self.entities.get(id).and_then(Entity::as_creature)
    }

    pub fn actor_mut(&mut self, id: &str) -> Option<&mut Creature> {
        self.entities.get_mut(id).and_then(Entity::as_creature_mut)
    }

    /// The creature currently taking its turn, if any.
    pub fn current_creature(&self) -> Option<&Creature> {
        self.current_actor.as_deref().and_then(|id| self.actor(id))
    }

    /// Recompute `visible_actors` for every living entity from zone
    /// co-presence.
    pub fn update_visibility(&mut self) {
        let positions: Vec<(String, String)> = self
            .actors()
            .map(|(id, c)| (id.clone(), c.current_zone.clone()))
            .collect();

        for (id, zone) in &positions {
            let visible: Vec<String> = positions
                .iter()
                .filter(|(other_id, other_zone)| other_id != id && other_zone == zone)
                .map(|(other_id, _)| other_id.clone())
                .collect();
            if let Some(creature) = self.actor_mut(id) {
                creature.visible_actors = visible;
            }
        }
    }

    /// Validate world invariants, returning human-readable violations.
    pub fn validate_invariants(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (eid, entity) in &self.entities {
            if !self.zones.contains_key(entity.current_zone()) {
                errors.push(format!(
                    "Entity {eid} is in unknown zone '{}'",
                    entity.current_zone()
                ));
            }
            if let Err(err) = entity.meta().validate() {
                errors.push(format!("Entity {eid}: {err}"));
            }
            if let Some(creature) = entity.as_creature() {
                if creature.hp.current < 0 || creature.hp.current > creature.hp.max {
                    errors.push(format!(
                        "Entity {eid} hp {} outside [0, {}]",
                        creature.hp.current, creature.hp.max
                    ));
                }
                if creature.guard < 0 {
                    errors.push(format!("Entity {eid} has negative guard"));
                }
            }
        }

        for (zid, zone) in &self.zones {
            for exit in &zone.exits {
                if !self.zones.contains_key(&exit.to) {
                    errors.push(format!("Zone {zid} has exit to non-existent zone {}", exit.to));
                }
            }
            if let Err(err) = zone.meta.validate() {
                errors.push(format!("Zone {zid}: {err}"));
            }
        }

        for (cid, clock) in &self.clocks {
            if clock.value < clock.minimum || clock.value > clock.maximum {
                errors.push(format!(
                    "Clock {cid} value {} outside [{}, {}]",
                    clock.value, clock.minimum, clock.maximum
                ));
            }
            if let Err(err) = clock.meta.validate() {
                errors.push(format!("Clock {cid}: {err}"));
            }
        }

        if self.scene.choice_count_this_turn > 3 {
            errors.push(format!(
                "Scene has {} clarifications this turn (max 3)",
                self.scene.choice_count_this_turn
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Creature, Entity};
    use crate::space::{Exit, Zone};

    fn two_zone_world() -> GameState {
        let mut world = GameState::default();

        let mut hall = Zone::new("hall", "Great Hall");
        hall.add_exit(Exit::new("courtyard"));
        world.zones.insert("hall".to_string(), hall);
        world
            .zones
            .insert("courtyard".to_string(), Zone::new("courtyard", "Courtyard"));

        world.entities.insert(
            "pc.arin".to_string(),
            Entity::Pc(Creature::new("pc.arin", "Arin", "hall")),
        );
        world.entities.insert(
            "npc.guard".to_string(),
            Entity::Npc(Creature::new("npc.guard", "Guard", "hall")),
        );
        world.current_actor = Some("pc.arin".to_string());
        world
    }

    #[test]
    fn test_update_visibility_same_zone() {
        let mut world = two_zone_world();
        world.update_visibility();

        let arin = world.actor("pc.arin").expect("arin");
        assert_eq!(arin.visible_actors, vec!["npc.guard".to_string()]);
    }

    #[test]
    fn test_update_visibility_after_move() {
        let mut world = two_zone_world();
        world
            .entities
            .get_mut("pc.arin")
            .expect("arin")
            .set_current_zone("courtyard");
        world.update_visibility();

        assert!(world.actor("pc.arin").expect("arin").visible_actors.is_empty());
        assert!(world.actor("npc.guard").expect("guard").visible_actors.is_empty());
    }

    #[test]
    fn test_invariants_pass_on_consistent_world() {
        let world = two_zone_world();
        assert!(world.validate_invariants().is_empty());
    }

    #[test]
    fn test_invariants_catch_dangling_zone() {
        let mut world = two_zone_world();
        world
            .entities
            .get_mut("pc.arin")
            .expect("arin")
            .set_current_zone("nowhere");

        let errors = world.validate_invariants();
        assert!(errors.iter().any(|e| e.contains("unknown zone")));
    }

    #[test]
    fn test_invariants_catch_dangling_exit() {
        let mut world = two_zone_world();
        world
            .zones
            .get_mut("courtyard")
            .expect("zone")
            .add_exit(Exit::new("the_void"));

        let errors = world.validate_invariants();
        assert!(errors.iter().any(|e| e.contains("non-existent zone")));
    }

    #[test]
    fn test_state_serde_round_trip() {
        let world = two_zone_world();
        let value = serde_json::to_value(&world).expect("serialize");
        let back: GameState = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, world);
    }
}
