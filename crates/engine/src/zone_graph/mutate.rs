//! Dynamic topology: blocking, creating, and destroying exits at runtime.
//!
//! Every mutator updates the exit, touches the zone's meta, and publishes a
//! `zone_graph.*` event with `{from_zone, to_zone, cause, reason}` unless
//! emission is suppressed for the call.

use serde_json::json;
use taleforge_domain::{DomainError, Exit, ExitConditions, GameState};

use crate::events::{topics, EventBus};

fn publish_exit_event(
    bus: &EventBus,
    emit: bool,
    topic: &str,
    from_zone: &str,
    to_zone: &str,
    cause: Option<&str>,
    reason: Option<&str>,
) {
    if !emit {
        return;
    }
    bus.publish(
        topic,
        json!({
            "from_zone": from_zone,
            "to_zone": to_zone,
            "cause": cause,
            "reason": reason,
        }),
    );
}

/// Block an existing exit. Returns true when the exit changed state.
pub fn block_exit(
    from_zone: &str,
    to_zone: &str,
    world: &mut GameState,
    bus: &EventBus,
    cause: Option<&str>,
    emit_event: bool,
) -> Result<bool, DomainError> {
    let zone = world
        .zones
        .get_mut(from_zone)
        .ok_or_else(|| DomainError::ZoneNotFound(from_zone.to_string()))?;
    let exit = zone
        .get_exit_mut(to_zone)
        .ok_or_else(|| DomainError::constraint(format!("no exit from {from_zone} to {to_zone}")))?;

    if exit.blocked {
        return Ok(false);
    }
    exit.blocked = true;
    zone.meta.touch();

    publish_exit_event(bus, emit_event, topics::EXIT_BLOCKED, from_zone, to_zone, cause, None);
    Ok(true)
}

/// Unblock an existing exit. Returns true when the exit changed state.
pub fn unblock_exit(
    from_zone: &str,
    to_zone: &str,
    world: &mut GameState,
    bus: &EventBus,
    cause: Option<&str>,
    emit_event: bool,
) -> Result<bool, DomainError> {
    let zone = world
        .zones
        .get_mut(from_zone)
        .ok_or_else(|| DomainError::ZoneNotFound(from_zone.to_string()))?;
    let exit = zone
        .get_exit_mut(to_zone)
        .ok_or_else(|| DomainError::constraint(format!("no exit from {from_zone} to {to_zone}")))?;

    if !exit.blocked {
        return Ok(false);
    }
    exit.blocked = false;
    zone.meta.touch();

    publish_exit_event(bus, emit_event, topics::EXIT_UNBLOCKED, from_zone, to_zone, cause, None);
    Ok(true)
}

/// Toggle an exit's blocked state, returning the new state.
pub fn toggle_exit(
    from_zone: &str,
    to_zone: &str,
    world: &mut GameState,
    bus: &EventBus,
    cause: Option<&str>,
    emit_event: bool,
) -> Result<bool, DomainError> {
    let currently_blocked = world
        .zones
        .get(from_zone)
        .ok_or_else(|| DomainError::ZoneNotFound(from_zone.to_string()))?
        .get_exit(to_zone)
        .ok_or_else(|| DomainError::constraint(format!("no exit from {from_zone} to {to_zone}")))?
        .blocked;

    if currently_blocked {
        unblock_exit(from_zone, to_zone, world, bus, cause, emit_event)?;
        Ok(false)
    } else {
        block_exit(from_zone, to_zone, world, bus, cause, emit_event)?;
        Ok(true)
    }
}

/// Create a new exit. Fails when either zone is missing or the exit already
/// exists.
pub fn create_exit(
    from_zone: &str,
    exit: Exit,
    world: &mut GameState,
    bus: &EventBus,
    cause: Option<&str>,
    emit_event: bool,
) -> Result<(), DomainError> {
    if !world.zones.contains_key(&exit.to) {
        return Err(DomainError::ZoneNotFound(exit.to.clone()));
    }
    let zone = world
        .zones
        .get_mut(from_zone)
        .ok_or_else(|| DomainError::ZoneNotFound(from_zone.to_string()))?;
    if zone.get_exit(&exit.to).is_some() {
        return Err(DomainError::constraint(format!(
            "exit from {from_zone} to {} already exists",
            exit.to
        )));
    }

    let to_zone = exit.to.clone();
    zone.add_exit(exit);

    publish_exit_event(bus, emit_event, topics::EXIT_CREATED, from_zone, &to_zone, cause, None);
    Ok(())
}

/// Destroy an existing exit.
pub fn destroy_exit(
    from_zone: &str,
    to_zone: &str,
    world: &mut GameState,
    bus: &EventBus,
    cause: Option<&str>,
    emit_event: bool,
) -> Result<(), DomainError> {
    let zone = world
        .zones
        .get_mut(from_zone)
        .ok_or_else(|| DomainError::ZoneNotFound(from_zone.to_string()))?;
    if !zone.remove_exit(to_zone) {
        return Err(DomainError::constraint(format!(
            "no exit from {from_zone} to {to_zone}"
        )));
    }

    publish_exit_event(bus, emit_event, topics::EXIT_DESTROYED, from_zone, to_zone, cause, None);
    Ok(())
}

/// Replace an exit's travel conditions.
pub fn set_exit_conditions(
    from_zone: &str,
    to_zone: &str,
    conditions: Option<ExitConditions>,
    world: &mut GameState,
    bus: &EventBus,
    cause: Option<&str>,
    emit_event: bool,
) -> Result<(), DomainError> {
    let zone = world
        .zones
        .get_mut(from_zone)
        .ok_or_else(|| DomainError::ZoneNotFound(from_zone.to_string()))?;
    let exit = zone
        .get_exit_mut(to_zone)
        .ok_or_else(|| DomainError::constraint(format!("no exit from {from_zone} to {to_zone}")))?;

    exit.conditions = conditions;
    zone.meta.touch();

    publish_exit_event(
        bus,
        emit_event,
        topics::EXIT_CONDITIONS_CHANGED,
        from_zone,
        to_zone,
        cause,
        None,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use taleforge_domain::Zone;

    fn world() -> GameState {
        let mut world = GameState::default();
        let mut gate = Zone::new("gate", "Gate");
        gate.add_exit(Exit::new("field"));
        world.zones.insert("gate".to_string(), gate);
        world.zones.insert("field".to_string(), Zone::new("field", "Field"));
        world
    }

    fn recording_bus(topic: &'static str) -> (EventBus, Rc<RefCell<Vec<serde_json::Value>>>) {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        bus.subscribe(topic, move |event| {
            seen_clone.borrow_mut().push(event.payload.clone());
            Ok(())
        });
        (bus, seen)
    }

    #[test]
    fn test_block_unblock_with_events() {
        let mut world = world();
        let (bus, blocked_events) = recording_bus(topics::EXIT_BLOCKED);

        let changed = block_exit("gate", "field", &mut world, &bus, Some("cave_in"), true)
            .expect("block");
        assert!(changed);
        assert!(world.zones["gate"].get_exit("field").expect("exit").blocked);
        assert_eq!(blocked_events.borrow().len(), 1);
        assert_eq!(blocked_events.borrow()[0]["cause"], "cave_in");

        // Re-blocking is a no-op and emits nothing
        let changed = block_exit("gate", "field", &mut world, &bus, None, true).expect("block");
        assert!(!changed);
        assert_eq!(blocked_events.borrow().len(), 1);

        let changed =
            unblock_exit("gate", "field", &mut world, &bus, Some("cleared"), true).expect("unblock");
        assert!(changed);
        assert!(!world.zones["gate"].get_exit("field").expect("exit").blocked);
    }

    #[test]
    fn test_suppressed_emission() {
        let mut world = world();
        let (bus, events) = recording_bus(topics::EXIT_BLOCKED);
        block_exit("gate", "field", &mut world, &bus, None, false).expect("block");
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_toggle() {
        let mut world = world();
        let bus = EventBus::new();
        assert!(toggle_exit("gate", "field", &mut world, &bus, None, true).expect("toggle"));
        assert!(!toggle_exit("gate", "field", &mut world, &bus, None, true).expect("toggle"));
    }

    #[test]
    fn test_create_and_destroy() {
        let mut world = world();
        let (bus, created) = recording_bus(topics::EXIT_CREATED);

        create_exit("field", Exit::new("gate"), &mut world, &bus, None, true).expect("create");
        assert!(world.zones["field"].get_exit("gate").is_some());
        assert_eq!(created.borrow().len(), 1);

        // Duplicate creation fails
        assert!(create_exit("field", Exit::new("gate"), &mut world, &bus, None, true).is_err());
        // Missing target fails
        assert!(create_exit("field", Exit::new("ghost"), &mut world, &bus, None, true).is_err());

        destroy_exit("field", "gate", &mut world, &bus, None, true).expect("destroy");
        assert!(world.zones["field"].get_exit("gate").is_none());
        assert!(destroy_exit("field", "gate", &mut world, &bus, None, true).is_err());
    }

    #[test]
    fn test_set_conditions_emits() {
        let mut world = world();
        let (bus, events) = recording_bus(topics::EXIT_CONDITIONS_CHANGED);

        set_exit_conditions(
            "gate",
            "field",
            Some(ExitConditions {
                key_required: Some("gate_key".to_string()),
                ..ExitConditions::default()
            }),
            &mut world,
            &bus,
            Some("locked_down"),
            true,
        )
        .expect("set conditions");

        assert_eq!(events.borrow().len(), 1);
        let exit = world.zones["gate"].get_exit("field").expect("exit");
        assert_eq!(
            exit.conditions.as_ref().and_then(|c| c.key_required.as_deref()),
            Some("gate_key")
        );
    }
}
