//! Shared fixtures for validator tests.

use taleforge_domain::{Creature, Entity, Exit, GameState, Zone};

/// Demo world: Arin and a guard in the courtyard, an adjacent threshold,
/// with an alarm clock ticking.
pub(crate) fn demo_world() -> GameState {
    let mut world = GameState::default();

    let mut courtyard = Zone::new("courtyard", "Courtyard");
    courtyard.add_exit(Exit::new("threshold"));
    world.zones.insert("courtyard".to_string(), courtyard);
    let mut threshold = Zone::new("threshold", "Threshold");
    threshold.add_exit(Exit::new("courtyard"));
    world.zones.insert("threshold".to_string(), threshold);

    let mut arin = Creature::new("pc.arin", "Arin", "courtyard");
    arin.inventory.push("healing_potion".to_string());
    world.entities.insert("pc.arin".to_string(), Entity::Pc(arin));
    world.entities.insert(
        "npc.guard".to_string(),
        Entity::Npc(Creature::new("npc.guard", "Guard", "courtyard")),
    );

    let mut alarm = taleforge_domain::Clock::new("alarm", "Alarm");
    alarm.maximum = 6;
    alarm.value = 2;
    world.clocks.insert("alarm".to_string(), alarm);

    world.current_actor = Some("pc.arin".to_string());
    world.update_visibility();
    world
}
