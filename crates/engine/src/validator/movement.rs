//! `move` executor: zone transitions with exit validation.

use serde_json::{json, Value};
use taleforge_domain::{Effect, EffectKind, NoiseLevel, TagPayload};

use crate::catalog::{MoveArgs, MoveMethod, ToolId};
use crate::runtime::WorldCtx;
use crate::validator::{ToolResult, Validator};
use crate::zone_graph;

impl Validator {
    pub(super) fn execute_move(
        &mut self,
        args_value: &Value,
        ctx: &mut WorldCtx<'_>,
        _seed: u64,
    ) -> ToolResult {
        let args: MoveArgs = match serde_json::from_value(args_value.clone()) {
            Ok(args) => args,
            Err(err) => {
                return ToolResult::clarify(
                    "Who should move, and where to?",
                    "missing_arg",
                    json!({}),
                    Value::Null,
                    "Asked for clarification due to malformed move args",
                    format!("Schema validation failed: {err}"),
                )
            }
        };

        // The actor must exist, be a creature, and be conscious
        let Some(actor_entity) = ctx.world.entities.get(&args.actor) else {
            return ToolResult::clarify(
                "Who should move? I don't see that character.",
                "invalid_target",
                json!({}),
                Value::Null,
                "Asked for clarification due to missing actor",
                format!("Actor '{}' not found", args.actor),
            );
        };
        let Some(actor) = actor_entity.as_creature() else {
            return ToolResult::clarify(
                "That entity cannot move.",
                "invalid_target",
                json!({}),
                Value::Null,
                "Asked for clarification due to non-creature actor",
                format!("Actor '{}' is not a creature", args.actor),
            );
        };
        if !actor.is_conscious() {
            return ToolResult::clarify(
                format!("{} is unconscious and cannot move.", actor.name),
                "not_your_turn",
                json!({
                    "cause": "actor_state",
                    "actor_state": "unconscious",
                    "actor": args.actor,
                }),
                Value::Null,
                "Asked for clarification due to unconscious actor",
                format!("Actor '{}' is unconscious", args.actor),
            );
        }

        let current_zone_id = actor.current_zone.clone();
        let actor_name = actor.name.clone();

        let Some(current_zone) = ctx.world.zones.get(&current_zone_id) else {
            return ToolResult::clarify(
                "Something is wrong with the current location.",
                "invalid_target",
                json!({}),
                Value::Null,
                "Asked for clarification due to missing current zone",
                format!("Zone '{current_zone_id}' not found"),
            );
        };

        let Some(target_zone) = ctx.world.zones.get(&args.to) else {
            return ToolResult::clarify(
                format!("I don't know where '{}' is.", args.to),
                "invalid_target",
                json!({}),
                Value::Null,
                "Asked for clarification due to unknown destination",
                format!("Zone '{}' not found", args.to),
            );
        };
        let target_name = target_zone.name.clone();
        let current_name = current_zone.name.clone();

        if args.to == current_zone_id {
            return ToolResult::clarify(
                format!("You're already in {current_name}. Where would you like to go?"),
                "invalid_target",
                json!({"cause": "same_zone", "current_zone": current_zone_id}),
                Value::Null,
                "Asked for clarification due to same-zone move",
                format!("Already in zone '{current_zone_id}'"),
            );
        }

        // Exit validation: reason-aware envelopes, unless explicitly skipped
        match current_zone.get_exit(&args.to) {
            Some(exit) => {
                let (usable, reason) =
                    zone_graph::is_exit_usable(exit, actor_entity, ctx.world);
                std::fs::write("/root/crate/debug_trace.txt", format!("usable={:?} reason={:?}", usable, reason)).expect("write");
                if !usable {
                    let reason = reason.unwrap_or_else(|| "blocked".to_string());
                    return ToolResult::clarify(
                        format!("The path to {target_name} is {reason}."),
                        "not_adjacent",
                        json!({
                            "cause": "blocked",
                            "destination": args.to,
                            "reason": reason,
                        }),
                        Value::Null,
                        "Asked for clarification due to unusable exit",
                        format!("Exit to '{}' is not usable: {reason}", args.to),
                    );
                }
            }
            None if !args.ignore_adjacency => {
                let valid_exits: Vec<String> = zone_graph::describe_exits(current_zone, ctx.world, false)
                    .iter()
                    .filter_map(|d| d["target_name"].as_str().map(str::to_string))
                    .collect();
                let exits_text = if valid_exits.is_empty() {
                    "nowhere".to_string()
                } else {
                    valid_exits.join(", ")
                };
                return ToolResult::clarify(
                    format!("You can't move there from {current_name}. Valid exits: {exits_text}."),
                    "not_adjacent",
                    json!({"cause": "invalid", "valid_exits": valid_exits}),
                    Value::Null,
                    "Asked for clarification due to invalid destination",
                    format!("No exit from '{current_zone_id}' to '{}'", args.to),
                );
            }
            None => {}
        }

        // Sneaking through a watchful scene needs a stealth roll instead
        if args.method == MoveMethod::Sneak {
            let alert_level = ctx.world.scene.alert_level();
            if alert_level > 1 {
                return ToolResult::deferred(
                    ToolId::AskRoll,
                    json!({
                        "actor": args.actor,
                        "action": "sneak",
                        "zone_target": args.to,
                        "style": 1,
                        "domain": "d6",
                        "dc_hint": 10 + alert_level,
                        "context": format!("Moving stealthily to {target_name}"),
                    }),
                );
            }
        }

        let mut effects = vec![{
            let mut position = Effect::position(&args.actor, &args.to)
                .with_source(args.actor.clone())
                .with_cause("move");
            position.from = Some(current_zone_id.clone());
            position
        }];

        let mut facts = json!({
            "from_zone": current_zone_id.clone(),
            "to_zone": args.to.clone(),
            "destination": args.to.clone(),
            "method": args.method.as_str(),
            "actor": args.actor.clone(),
            "cost": args.cost,
        });
        let mut tone_tags = vec!["transition".to_string(), "movement".to_string()];

        match args.method {
            MoveMethod::Run => {
                // Running is loud: scene tag, a noise atom for subsystems,
                // and the alarm clock if one is live
                effects.push(Effect {
                    kind: EffectKind::Tag,
                    target: Some("scene".to_string()),
                    add: Some(TagPayload::Map(
                        [("noise".to_string(), json!("loud"))].into_iter().collect(),
                    )),
                    source: Some(args.actor.clone()),
                    cause: Some("running".to_string()),
                    ..Effect::default()
                });
                effects.push(Effect {
                    kind: EffectKind::Noise,
                    zone: Some(args.to.clone()),
                    intensity: Some(NoiseLevel::Loud),
                    source: Some(args.actor.clone()),
                    cause: Some("running".to_string()),
                    ..Effect::default()
                });
                if ctx.world.clocks.contains_key("alarm") {
                    effects.push(
                        Effect::clock("alarm", 1)
                            .with_source(args.actor.clone())
                            .with_cause("noisy_movement"),
                    );
                }
                tone_tags.push("urgent".to_string());
                facts["noise_generated"] = json!(true);
            }
            MoveMethod::Sneak => {
                effects.push(Effect {
                    kind: EffectKind::Tag,
                    target: Some(args.actor.clone()),
                    add: Some(TagPayload::Map(
                        [("sneak_intent".to_string(), json!(true))].into_iter().collect(),
                    )),
                    source: Some(args.actor.clone()),
                    cause: Some("stealth_movement".to_string()),
                    ..Effect::default()
                });
                tone_tags.push("stealthy".to_string());
                facts["sneak_intent"] = json!(true);
            }
            MoveMethod::Walk => {}
        }

        let narration_hint = json!({
            "summary": format!(
                "{actor_name} {} from {current_name} to {target_name}.",
                args.method.verb()
            ),
            "movement": {
                "from": current_zone_id.clone(),
                "to": args.to.clone(),
                "method": args.method.as_str(),
                "movement_verb": args.method.verb(),
                "from_name": current_name.clone(),
                "to_name": target_name.clone(),
            },
            "tone_tags": tone_tags,
            "salient_entities": [args.actor.clone()],
            "mentioned_zones": [current_zone_id.clone(), args.to.clone()],
            "zone_names": {
                (current_zone_id.clone()): current_name.clone(),
                (args.to.clone()): target_name.clone(),
            },
            "camera": "tracking",
        });

        ToolResult::success(ToolId::Move, args_value.clone(), facts, effects, narration_hint)
    }
}
