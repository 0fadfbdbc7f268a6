//! `ask_roll` executor: Style+Domain dice resolution for declared actions.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};

use taleforge_domain::Effect;

use crate::catalog::{AskRollArgs, RollAction, ToolId};
use crate::runtime::WorldCtx;
use crate::validator::rolls::{self, RollOutcome};
use crate::validator::{ToolResult, Validator};
use crate::zone_graph;

impl Validator {
    pub(super) fn execute_ask_roll(
        &mut self,
        args_value: &Value,
        ctx: &mut WorldCtx<'_>,
        seed: u64,
    ) -> ToolResult {
        let args: AskRollArgs = match serde_json::from_value(args_value.clone()) {
            Ok(args) => args,
            Err(err) => {
                return ToolResult::clarify(
                    "I couldn't make sense of that roll. What are you trying to do?",
                    "missing_arg",
                    json!({}),
                    Value::Null,
                    "Asked for clarification due to malformed roll args",
                    format!("Schema validation failed: {err}"),
                )
            }
        };

        // A declared zone target must be reachable from here
        if let Some(zone_target) = &args.zone_target {
            let reachable = ctx
                .world
                .actor(&args.actor)
                .map(|actor| {
                    actor.current_zone == *zone_target
                        || zone_graph::is_adjacent(&actor.current_zone, zone_target, ctx.world, false)
                })
                .unwrap_or(false);
            if !reachable {
                return ToolResult::clarify(
                    format!("You can't reach {zone_target} from here. Where would you like to go instead?"),
                    "not_adjacent",
                    json!({}),
                    Value::Null,
                    "Asked for clarification due to invalid target zone",
                    format!("Zone target '{zone_target}' is not adjacent"),
                );
            }
        }

        // Derive DC from scene tags when the hint is still the default
        let dc = if args.dc_hint == 12 {
            rolls::derive_dc(args.action, &ctx.world.scene)
        } else {
            args.dc_hint
        };

        let effective_style = (args.style + args.adv_style_delta).clamp(0, 3);
        let mut rng = StdRng::seed_from_u64(seed);
        let roll = rolls::resolve_roll(&mut rng, effective_style, args.domain.die_size(), dc);

        let effects = generate_roll_effects(&args, roll.outcome);

        let mut salient = vec![args.actor.clone()];
        if let Some(target) = &args.target {
            salient.push(target.clone());
        }

        let narration_hint = json!({
            "summary": format!(
                "{} {}",
                capitalize(args.action.as_str()),
                roll.outcome.to_text()
            ),
            "dice": roll.dice_block(),
            "outcome": roll.outcome.as_str(),
            "tone_tags": tone_tags(roll.outcome, args.action),
            "salient_entities": salient,
        });

        ToolResult::success(
            ToolId::AskRoll,
            args_value.clone(),
            json!({
                "outcome": roll.outcome.as_str(),
                "margin": roll.margin,
                "total": roll.total,
                "dc": roll.dc,
                "style_dice": roll.style_dice,
            }),
            effects,
            narration_hint,
        )
    }
}

/// Effect atoms per outcome × action.
fn generate_roll_effects(args: &AskRollArgs, outcome: RollOutcome) -> Vec<Effect> {
    let mut effects = Vec::new();
    let actor = &args.actor;

    match outcome {
        RollOutcome::CritSuccess => match (args.action, &args.zone_target, &args.target) {
            (RollAction::Sneak, Some(zone), _) => {
                effects.push(
                    Effect::position(actor, zone)
                        .with_source(actor.clone())
                        .with_cause("sneak"),
                );
                // A flawless approach buys the alarm back down
                effects.push(Effect::clock("scene.alarm", -1).with_source(actor.clone()));
            }
            (RollAction::Persuade, _, Some(target)) => {
                let mut mark = Effect::mark_add(target, "favor").with_source(actor.clone());
                mark.value = Some(2);
                effects.push(mark);
            }
            _ => {}
        },
        RollOutcome::Success => match (args.action, &args.zone_target, &args.target) {
            (RollAction::Sneak | RollAction::Athletics, Some(zone), _) => {
                effects.push(
                    Effect::position(actor, zone)
                        .with_source(actor.clone())
                        .with_cause(args.action.as_str()),
                );
            }
            (RollAction::Persuade, _, Some(target)) => {
                effects.push(Effect::mark_add(target, "favor").with_source(actor.clone()));
            }
            _ => {}
        },
        RollOutcome::Partial => {
            effects.push(Effect::clock("scene.alarm", 1).with_source(actor.clone()));
        }
        RollOutcome::Fail => {
            effects.push(Effect::clock("scene.alarm", 2).with_source(actor.clone()));
        }
    }

    effects
}

fn tone_tags(outcome: RollOutcome, action: RollAction) -> Vec<String> {
    let mut tags = vec![action.as_str().to_string()];
    match outcome {
        RollOutcome::CritSuccess | RollOutcome::Success => {
            tags.push("confident".to_string());
            tags.push("smooth".to_string());
        }
        RollOutcome::Partial => {
            tags.push("tense".to_string());
            tags.push("close".to_string());
        }
        RollOutcome::Fail => {
            tags.push("tense".to_string());
            tags.push("risky".to_string());
        }
    }
    tags
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
