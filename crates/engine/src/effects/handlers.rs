//! Builtin effect handlers.
//!
//! Each handler captures a before snapshot of the fields it touches, mutates
//! through the world's typed accessors, and returns an audit log entry. A
//! handler never panics; bad input produces a failed log entry that the
//! transaction layer turns into a rollback (strict) or a skip (lenient).

use serde_json::{json, Value};
use taleforge_domain::{mark_key, Effect, Mark, TagPayload};

use crate::auto_reveal;
use crate::effects::{make_log_entry, resolve_delta, ApplyMeta};
use crate::runtime::WorldCtx;

fn fail(
    effect: &Effect,
    error: impl Into<String>,
    round: u64,
    meta: &ApplyMeta,
) -> taleforge_domain::EffectLogEntry {
    make_log_entry(
        effect,
        Value::Null,
        Value::Null,
        false,
        Some(error.into()),
        meta,
        round,
        Vec::new(),
        None,
    )
}

pub(super) fn apply_hp(
    effect: &Effect,
    ctx: &mut WorldCtx<'_>,
    meta: &ApplyMeta,
) -> taleforge_domain::EffectLogEntry {
    let round = ctx.world.scene.round;
    let Some(target) = effect.target.clone() else {
        return fail(effect, "HP effect requires target", round, meta);
    };
    let (delta, rolled) = match resolve_delta(effect.delta.as_ref(), meta.seed) {
        Ok(resolved) => resolved,
        Err(err) => return fail(effect, err, round, meta),
    };

    let Some(creature) = ctx.world.actor_mut(&target) else {
        return fail(effect, format!("HP effect target not found: {target}"), round, meta);
    };

    let old_hp = creature.hp.current;
    creature.hp.apply(delta);
    let new_hp = creature.hp.current;

    make_log_entry(
        effect,
        json!({"hp": old_hp}),
        json!({"hp": new_hp}),
        true,
        None,
        meta,
        round,
        rolled,
        Some(delta),
    )
}

pub(super) fn apply_guard(
    effect: &Effect,
    ctx: &mut WorldCtx<'_>,
    meta: &ApplyMeta,
) -> taleforge_domain::EffectLogEntry {
    let round = ctx.world.scene.round;
    let Some(target) = effect.target.clone() else {
        return fail(effect, "Guard effect requires target", round, meta);
    };
    let (delta, rolled) = match resolve_delta(effect.delta.as_ref(), meta.seed) {
        Ok(resolved) => resolved,
        Err(err) => return fail(effect, err, round, meta),
    };

    let Some(creature) = ctx.world.actor_mut(&target) else {
        return fail(effect, format!("Guard effect target not found: {target}"), round, meta);
    };

    let old_guard = creature.guard;
    creature.guard = (creature.guard + delta).max(0);
    let new_guard = creature.guard;

    make_log_entry(
        effect,
        json!({"guard": old_guard}),
        json!({"guard": new_guard}),
        true,
        None,
        meta,
        round,
        rolled,
        Some(new_guard - old_guard),
    )
}

pub(super) fn apply_position(
    effect: &Effect,
    ctx: &mut WorldCtx<'_>,
    meta: &ApplyMeta,
) -> taleforge_domain::EffectLogEntry {
    let round = ctx.world.scene.round;
    let Some(target) = effect.target.clone() else {
        return fail(effect, "Position effect requires target", round, meta);
    };
    let Some(to_zone) = effect.to.clone() else {
        return fail(effect, "Position effect requires 'to' field", round, meta);
    };
    if !ctx.world.zones.contains_key(&to_zone) {
        return fail(effect, format!("Target zone {to_zone} not found"), round, meta);
    }

    let Some(entity) = ctx.world.entities.get_mut(&target) else {
        return fail(effect, format!("Position effect target not found: {target}"), round, meta);
    };

    let old_zone = entity.current_zone().to_string();
    entity.set_current_zone(to_zone.clone());
    let is_creature = entity.is_creature();

    ctx.world.update_visibility();

    // Exploration cascade: discovery, auto-reveal, and zone events
    if is_creature && old_zone != to_zone {
        auto_reveal::trigger_exploration_events(ctx, &target, Some(&old_zone), &to_zone);
    }

    make_log_entry(
        effect,
        json!({"zone": old_zone}),
        json!({"zone": to_zone}),
        true,
        None,
        meta,
        round,
        Vec::new(),
        None,
    )
}

pub(super) fn apply_mark(
    effect: &Effect,
    ctx: &mut WorldCtx<'_>,
    meta: &ApplyMeta,
) -> taleforge_domain::EffectLogEntry {
    let round = ctx.world.scene.round;
    let Some(target) = effect.target.clone() else {
        return fail(effect, "Mark effect requires target", round, meta);
    };
    let source = effect.source.clone().unwrap_or_else(|| "unknown".to_string());

    // Shape check before taking the creature borrow
    let supported = matches!(
        (&effect.add, &effect.remove),
        (Some(TagPayload::One(_)), _)
            | (None, Some(TagPayload::One(_)))
            | (None, Some(TagPayload::Flag(true)))
    );
    if !supported {
        return fail(effect, "mark effect requires either 'add' or 'remove'", round, meta);
    }
    if ctx.world.actor(&target).is_none() {
        return fail(effect, format!("Mark effect target not found: {target}"), round, meta);
    }

    let mut old_marks = Value::Null;
    let mut new_marks = Value::Null;
    if let Some(creature) = ctx.world.actor_mut(&target) {
        old_marks = serde_json::to_value(&creature.marks).unwrap_or(Value::Null);

        match (&effect.add, &effect.remove) {
            (Some(TagPayload::One(tag)), _) => {
                let key = mark_key(&source, tag);
                creature.marks.insert(
                    key,
                    Mark {
                        tag: tag.clone(),
                        source: source.clone(),
                        value: effect.value.unwrap_or(1),
                        consumes: effect.consumes.unwrap_or(true),
                        created_round: round,
                    },
                );
            }
            (None, Some(TagPayload::One(tag))) => {
                let key = mark_key(&source, tag);
                creature.marks.remove(&key);
            }
            (None, Some(TagPayload::Flag(true))) => {
                // Legacy removal: wipe the style bonus and consumable marks
                creature.style_bonus = 0;
                creature.marks.retain(|_, mark| !mark.consumes);
            }
            _ => {}
        }

        new_marks = serde_json::to_value(&creature.marks).unwrap_or(Value::Null);
    }

    make_log_entry(
        effect,
        json!({"marks": old_marks}),
        json!({"marks": new_marks}),
        true,
        None,
        meta,
        round,
        Vec::new(),
        None,
    )
}

pub(super) fn apply_inventory(
    effect: &Effect,
    ctx: &mut WorldCtx<'_>,
    meta: &ApplyMeta,
) -> taleforge_domain::EffectLogEntry {
    let round = ctx.world.scene.round;
    let Some(target) = effect.target.clone() else {
        return fail(effect, "Inventory effect requires target", round, meta);
    };
    let Some(item_id) = effect.id.clone() else {
        return fail(effect, "Item ID is required for inventory effect", round, meta);
    };
    let (delta, rolled) = match resolve_delta(effect.delta.as_ref(), meta.seed) {
        Ok(resolved) => resolved,
        Err(err) => return fail(effect, err, round, meta),
    };

    let Some(creature) = ctx.world.actor_mut(&target) else {
        return fail(effect, format!("Inventory effect target not found: {target}"), round, meta);
    };

    let old_inventory = creature.inventory.clone();
    if delta > 0 {
        for _ in 0..delta {
            creature.inventory.push(item_id.clone());
        }
    } else {
        for _ in 0..(-delta) {
            let Some(index) = creature.inventory.iter().position(|i| *i == item_id) else {
                break;
            };
            creature.inventory.remove(index);
        }
    }
    let new_inventory = creature.inventory.clone();

    make_log_entry(
        effect,
        json!({"inventory": old_inventory}),
        json!({"inventory": new_inventory}),
        true,
        None,
        meta,
        round,
        rolled,
        Some(delta),
    )
}

pub(super) fn apply_clock(
    effect: &Effect,
    ctx: &mut WorldCtx<'_>,
    meta: &ApplyMeta,
) -> taleforge_domain::EffectLogEntry {
    let round = ctx.world.scene.round;
    let Some(clock_id) = effect.id.clone() else {
        return fail(effect, "Clock ID is required for clock effect", round, meta);
    };
    let (delta, rolled) = match resolve_delta(effect.delta.as_ref(), meta.seed) {
        Ok(resolved) => resolved,
        Err(err) => return fail(effect, err, round, meta),
    };

    let source = effect.source.as_deref();

    let clock = ctx
        .world
        .clocks
        .entry(clock_id.clone())
        .or_insert_with(|| {
            let mut fresh =
                taleforge_domain::Clock::autovivified(clock_id.clone(), source, round);
            if let Some(max) = effect.max {
                fresh.maximum = max;
            }
            fresh
        });

    let (old_value, new_value) = clock.apply(delta, source, round);

    make_log_entry(
        effect,
        json!({"value": old_value}),
        json!({"value": new_value}),
        true,
        None,
        meta,
        round,
        rolled,
        Some(new_value - old_value),
    )
}

fn coerce_tag_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "true".to_string(),
        other => other.to_string(),
    }
}

pub(super) fn apply_tag(
    effect: &Effect,
    ctx: &mut WorldCtx<'_>,
    meta: &ApplyMeta,
) -> taleforge_domain::EffectLogEntry {
    let round = ctx.world.scene.round;
    let Some(target) = effect.target.clone() else {
        return fail(effect, "Tag effect requires target", round, meta);
    };
    let fallback_value = effect
        .value
        .map(|v| v.to_string())
        .or_else(|| effect.note.clone())
        .unwrap_or_else(|| "true".to_string());

    if target == "scene" {
        let old_tags = ctx.world.scene.tags.clone();

        if let Some(add) = &effect.add {
            match add {
                TagPayload::Map(map) => {
                    for (key, value) in map {
                        ctx.world.scene.tags.insert(key.clone(), coerce_tag_value(value));
                    }
                }
                TagPayload::One(key) => {
                    ctx.world.scene.tags.insert(key.clone(), fallback_value.clone());
                }
                TagPayload::Many(keys) => {
                    for key in keys {
                        ctx.world.scene.tags.insert(key.clone(), fallback_value.clone());
                    }
                }
                TagPayload::Flag(_) => {
                    return fail(effect, "tag effect 'add' must be a string, list, or map", round, meta);
                }
            }
        }

        if let Some(remove) = &effect.remove {
            match remove {
                TagPayload::One(key) => {
                    ctx.world.scene.tags.remove(key);
                }
                TagPayload::Many(keys) => {
                    for key in keys {
                        ctx.world.scene.tags.remove(key);
                    }
                }
                _ => {
                    return fail(effect, "tag effect 'remove' must be a string or list", round, meta);
                }
            }
        }

        let new_tags = ctx.world.scene.tags.clone();
        return make_log_entry(
            effect,
            json!({"scene_tags": old_tags}),
            json!({"scene_tags": new_tags}),
            true,
            None,
            meta,
            round,
            Vec::new(),
            None,
        );
    }

    // Validate payload shapes before borrowing the entity
    if matches!(effect.add, Some(TagPayload::Flag(_))) {
        return fail(effect, "tag effect 'add' must be a string, list, or map", round, meta);
    }
    if matches!(effect.remove, Some(TagPayload::Map(_)) | Some(TagPayload::Flag(_))) {
        return fail(effect, "tag effect 'remove' must be a string or list", round, meta);
    }
    if !ctx.world.entities.contains_key(&target) {
        return fail(effect, format!("Tag effect target not found: {target}"), round, meta);
    }

    let mut old_tags = Value::Null;
    let mut new_tags = Value::Null;
    if let Some(entity) = ctx.world.entities.get_mut(&target) {
        old_tags = serde_json::to_value(entity.tags()).unwrap_or(Value::Null);
        let tags = entity.tags_mut();

        match &effect.add {
            Some(TagPayload::Map(map)) => {
                for (key, value) in map {
                    tags.insert(key.clone(), json!(coerce_tag_value(value)));
                }
            }
            Some(TagPayload::One(key)) => {
                tags.insert(key.clone(), json!(fallback_value.clone()));
            }
            Some(TagPayload::Many(keys)) => {
                for key in keys {
                    tags.insert(key.clone(), json!(fallback_value.clone()));
                }
            }
            _ => {}
        }

        match &effect.remove {
            Some(TagPayload::One(key)) => {
                tags.remove(key);
            }
            Some(TagPayload::Many(keys)) => {
                for key in keys {
                    tags.remove(key);
                }
            }
            _ => {}
        }

        new_tags = serde_json::to_value(&*tags).unwrap_or(Value::Null);
    }

    make_log_entry(
        effect,
        json!({"tags": old_tags}),
        json!({"tags": new_tags}),
        true,
        None,
        meta,
        round,
        Vec::new(),
        None,
    )
}

pub(super) fn apply_resource(
    effect: &Effect,
    ctx: &mut WorldCtx<'_>,
    meta: &ApplyMeta,
) -> taleforge_domain::EffectLogEntry {
    let round = ctx.world.scene.round;
    let Some(target) = effect.target.clone() else {
        return fail(effect, "Resource effect requires target", round, meta);
    };
    let Some(resource_id) = effect.id.clone() else {
        return fail(effect, "Resource effect requires 'id' field", round, meta);
    };
    let (delta, rolled) = match resolve_delta(effect.delta.as_ref(), meta.seed) {
        Ok(resolved) => resolved,
        Err(err) => return fail(effect, err, round, meta),
    };

    let tag_key = format!("resource_{resource_id}");

    let Some(entity) = ctx.world.entities.get_mut(&target) else {
        return fail(effect, format!("Resource effect target not found: {target}"), round, meta);
    };

    // Resources are stored as entity tags for save compatibility
    let old_value = entity.tags().get(&tag_key).and_then(Value::as_i64).unwrap_or(0);
    let new_value = old_value + delta;
    entity.tags_mut().insert(tag_key, json!(new_value));

    make_log_entry(
        effect,
        json!({"value": old_value}),
        json!({"value": new_value}),
        true,
        None,
        meta,
        round,
        rolled,
        Some(delta),
    )
}

pub(super) fn apply_noise(
    effect: &Effect,
    ctx: &mut WorldCtx<'_>,
    meta: &ApplyMeta,
) -> taleforge_domain::EffectLogEntry {
    let round = ctx.world.scene.round;
    // Passive atom: validated only, so subsystems can subscribe later
    if effect.zone.is_none() || effect.intensity.is_none() || effect.source.is_none() {
        return fail(
            effect,
            "noise effect requires zone, intensity, and source",
            round,
            meta,
        );
    }

    make_log_entry(
        effect,
        Value::Null,
        Value::Null,
        true,
        None,
        meta,
        round,
        Vec::new(),
        None,
    )
}

pub(super) fn apply_meta(
    effect: &Effect,
    ctx: &mut WorldCtx<'_>,
    meta: &ApplyMeta,
) -> taleforge_domain::EffectLogEntry {
    let round = ctx.world.scene.round;
    // Placeholder: logged only
    make_log_entry(
        effect,
        Value::Null,
        Value::Null,
        true,
        None,
        meta,
        round,
        Vec::new(),
        None,
    )
}
