//! `talk` executor: social interactions with Style+Domain mechanics.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Map, Value};
use taleforge_domain::{mark_key, Creature, Effect, EffectKind, GameState, TagPayload};

use crate::catalog::{TalkArgs, ToolId};
use crate::runtime::WorldCtx;
use crate::social::SocialOutcomes;
use crate::validator::rolls::{self, RollOutcome};
use crate::validator::{ToolResult, Validator};

fn look_around_option() -> Value {
    json!([{
        "id": "A",
        "label": "Look around first",
        "tool_id": "narrate_only",
        "args_patch": {"topic": "look around"},
    }])
}

impl Validator {
    pub(super) fn execute_talk(
        &mut self,
        args_value: &Value,
        ctx: &mut WorldCtx<'_>,
        seed: u64,
    ) -> ToolResult {
        let args: TalkArgs = match serde_json::from_value(args_value.clone()) {
            Ok(args) => args,
            Err(err) => {
                return ToolResult::clarify(
                    "Who are you trying to talk to?",
                    "missing_arg",
                    json!({}),
                    look_around_option(),
                    "Asked for clarification due to malformed talk args",
                    format!("Schema validation failed: {err}"),
                )
            }
        };

        let targets = args.target.to_vec();
        if targets.is_empty() {
            return ToolResult::clarify(
                "Who are you trying to talk to?",
                "missing_arg",
                json!({}),
                look_around_option(),
                "Asked for clarification due to missing target",
                "No target specified for talk action",
            );
        }

        // Actor validation
        let Some(actor) = ctx.world.actor(&args.actor) else {
            return ToolResult::clarify(
                format!("Actor '{}' not found. Who is trying to talk?", args.actor),
                "invalid_target",
                json!({}),
                look_around_option(),
                "Asked for clarification due to missing actor",
                format!("Actor '{}' not found", args.actor),
            );
        };
        if !actor.is_conscious() {
            return ToolResult::clarify(
                format!("{} is unconscious and cannot talk.", actor.name),
                "not_your_turn",
                json!({}),
                look_around_option(),
                "Asked for clarification due to unconscious actor",
                format!("Actor '{}' is unconscious", args.actor),
            );
        }
        let actor_name = actor.name.clone();
        let visible_actors = actor.visible_actors.clone();

        // Every target must be a living, visible social creature
        for target_id in &targets {
            let Some(target_entity) = ctx.world.entities.get(target_id) else {
                return ToolResult::clarify(
                    format!("Target '{target_id}' not found. Who are you trying to talk to?"),
                    "invalid_target",
                    json!({}),
                    look_around_option(),
                    "Asked for clarification due to missing target",
                    format!("Target '{target_id}' not found"),
                );
            };
            if !target_entity.is_creature() {
                return ToolResult::clarify(
                    format!(
                        "You can't have a meaningful conversation with {}.",
                        target_entity.name()
                    ),
                    "invalid_target",
                    json!({}),
                    look_around_option(),
                    "Asked for clarification due to non-social target",
                    format!("Target '{target_id}' is not social_receptive"),
                );
            }
            if !visible_actors.contains(target_id) {
                return ToolResult::clarify(
                    format!("You can't see {} to talk to them.", target_entity.name()),
                    "not_adjacent",
                    json!({}),
                    look_around_option(),
                    "Asked for clarification due to invisible target",
                    format!("Target '{target_id}' is not visible to speaker '{}'", args.actor),
                );
            }
        }

        // One roll covers the whole audience
        let effective_style = (args.style + args.adv_style_delta).clamp(0, 3);
        let mut rng = StdRng::seed_from_u64(seed);
        let roll = rolls::resolve_roll(&mut rng, effective_style, args.domain.die_size(), args.dc_hint);

        // Per-intent effects for every target, from the social table
        let mut effects = Vec::new();
        for target_id in &targets {
            effects.extend(generate_talk_effects(
                &self.social_outcomes,
                args.intent.as_str(),
                roll.outcome,
                &args.actor,
                target_id,
                ctx.world,
            ));
        }

        // Disposition before/after per target for the narrator
        let mut disposition_before = Map::new();
        let mut disposition_after = Map::new();
        let mut effects_summary: Vec<String> = Vec::new();

        for target_id in &targets {
            let Some(target) = ctx.world.actor(target_id) else {
                continue;
            };
            disposition_before.insert(target_id.clone(), disposition_of(target));

            let (after, mut lines) =
                simulate_disposition(target, target_id, &effects, ctx.world);
            disposition_after.insert(target_id.clone(), after);
            effects_summary.append(&mut lines);
        }

        let target_names: Vec<String> = targets
            .iter()
            .filter_map(|id| ctx.world.entities.get(id).map(|e| e.name().to_string()))
            .collect();
        let audience = match target_names.len() {
            0 => String::new(),
            1 => target_names[0].clone(),
            2 => format!("{} and {}", target_names[0], target_names[1]),
            _ => format!(
                "{}, and {}",
                target_names[..target_names.len() - 1].join(", "),
                target_names[target_names.len() - 1]
            ),
        };
        let mut summary = format!("{actor_name} tries to {} {audience}", args.intent.as_str());
        if let Some(topic) = &args.topic {
            summary.push_str(&format!(" about {topic}"));
        }

        let mut tone_tags = vec!["social".to_string(), args.intent.as_str().to_string()];
        if roll.outcome == RollOutcome::CritSuccess {
            tone_tags.push("critical".to_string());
        }

        let mut mentioned = vec![args.actor.clone()];
        mentioned.extend(targets.iter().cloned());

        let narration_hint = json!({
            "summary": summary,
            "dice": roll.dice_block(),
            "outcome": roll.outcome.as_str(),
            "tone_tags": tone_tags,
            "mentioned_entities": mentioned,
            "intent": args.intent.as_str(),
            "topic": args.topic,
            "sentences_max": 3,
            "audience_disposition_before": disposition_before,
            "audience_disposition_after": disposition_after,
            "effects_summary": effects_summary,
        });

        ToolResult::success(
            ToolId::Talk,
            args_value.clone(),
            json!({
                "outcome": roll.outcome.as_str(),
                "margin": roll.margin,
                "total": roll.total,
                "dc": roll.dc,
                "intent": args.intent.as_str(),
                "topic": args.topic,
            }),
            effects,
            narration_hint,
        )
    }
}

/// Expand the social table templates into effect atoms for one target.
fn generate_talk_effects(
    outcomes: &SocialOutcomes,
    intent: &str,
    outcome: RollOutcome,
    actor: &str,
    target: &str,
    world: &GameState,
) -> Vec<Effect> {
    let current_guard = world.actor(target).map_or(0, |c| c.guard);

    let mut effects = Vec::new();
    for template in outcomes.templates(intent, outcome.as_str()) {
        let mut effect = Effect {
            kind: template.kind.clone().into(),
            target: Some(target.to_string()),
            source: Some(actor.to_string()),
            cause: Some(intent.to_string()),
            ..Effect::default()
        };

        match effect.kind {
            EffectKind::Guard => {
                // Delta with a floor: the handler clamps at zero, but the
                // floor from the table is enforced here too
                let delta = template.delta.unwrap_or(0);
                let min_value = template.min_value.unwrap_or(0);
                let new_guard = (current_guard + delta).max(min_value);
                effect.delta = Some(taleforge_domain::Delta::Int(new_guard - current_guard));
            }
            EffectKind::Clock => {
                if let Some(suffix) = &template.id_suffix {
                    effect.id = Some(format!("{target}.{suffix}"));
                }
                effect.delta = Some(taleforge_domain::Delta::Int(template.delta.unwrap_or(1)));
                effect.max = template.max;
            }
            EffectKind::Mark => {
                if let Some(tag) = &template.tag {
                    effect.add = Some(TagPayload::One(tag.clone()));
                }
                effect.value = template.value;
            }
            _ => {}
        }

        effects.push(effect);
    }

    effects
}

fn disposition_of(target: &Creature) -> Value {
    json!({
        "guard": target.guard,
        "marks": target.marks,
        "attitude": "neutral",
    })
}

/// Predict the target's disposition after the generated effects land.
fn simulate_disposition(
    target: &Creature,
    target_id: &str,
    effects: &[Effect],
    _world: &GameState,
) -> (Value, Vec<String>) {
    let mut guard = target.guard;
    let mut marks = target.marks.clone();
    let mut lines = Vec::new();

    for effect in effects.iter().filter(|e| e.target.as_deref() == Some(target_id)) {
        match effect.kind {
            EffectKind::Guard => {
                if let Some(delta) = effect.delta.as_ref().and_then(|d| d.as_int()) {
                    let new_guard = (guard + delta).max(0);
                    if new_guard != guard {
                        lines.push(format!("{}: guard {guard} → {new_guard}", target.name));
                    }
                    guard = new_guard;
                }
            }
            EffectKind::Mark => {
                if let Some(tag) = effect.add.as_ref().and_then(TagPayload::as_single) {
                    let source = effect.source.as_deref().unwrap_or("unknown");
                    marks.insert(
                        mark_key(source, tag),
                        taleforge_domain::Mark {
                            tag: tag.to_string(),
                            source: source.to_string(),
                            value: effect.value.unwrap_or(1),
                            consumes: true,
                            created_round: 0,
                        },
                    );
                    lines.push(format!("{}: gained {tag} mark", target.name));
                }
            }
            EffectKind::Clock => {
                if let (Some(id), Some(delta)) = (
                    effect.id.as_deref(),
                    effect.delta.as_ref().and_then(|d| d.as_int()),
                ) {
                    lines.push(format!("Clock {id}: +{delta}"));
                }
            }
            _ => {}
        }
    }

    let attitude = if guard < target.guard {
        "positive"
    } else if guard > target.guard {
        "negative"
    } else {
        "neutral"
    };

    (
        json!({
            "guard": guard,
            "marks": marks,
            "attitude": attitude,
        }),
        lines,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::validator::test_support::demo_world;
    use crate::visibility::RedactionCache;
    use taleforge_domain::Utterance;

    fn run_talk(world: &mut GameState, args: Value, seed: u64) -> ToolResult {
        let bus = EventBus::new();
        let cache = RedactionCache::new();
        let mut validator = Validator::with_defaults();
        let mut ctx = WorldCtx::new(world, &bus, &cache);
        validator.validate_and_execute(
            "talk",
            &args,
            &mut ctx,
            &Utterance::new("I talk to the guard", "pc.arin"),
            Some(seed),
        )
    }

    #[test]
    fn test_talk_outcome_effects_follow_band() {
        let mut world = demo_world();
        let result = run_talk(
            &mut world,
            json!({"actor": "pc.arin", "target": "npc.guard", "intent": "persuade"}),
            3,
        );
        assert!(result.ok, "{:?}", result.error_message);

        let outcome = result.facts["outcome"].as_str().expect("outcome");
        let guard = world.actor("npc.guard").expect("guard");
        match outcome {
            "crit_success" => {
                assert!(guard.marks.contains_key("pc.arin.favor"));
            }
            "success" => {
                // guard starts at 0 and is floored there
                assert_eq!(guard.guard, 0);
            }
            "partial" => {
                assert!(world.clocks.contains_key("npc.guard.persuade"));
            }
            "fail" => {
                assert_eq!(guard.guard, 1);
            }
            other => panic!("unexpected outcome {other}"),
        }
    }

    #[test]
    fn test_talk_invisible_target_rejected() {
        let mut world = demo_world();
        world
            .actor_mut("pc.arin")
            .expect("arin")
            .visible_actors
            .clear();

        let result = run_talk(
            &mut world,
            json!({"actor": "pc.arin", "target": "npc.guard"}),
            3,
        );
        assert!(!result.ok);
        assert_eq!(result.tool_id, "ask_clarifying");
        assert!(result
            .error_message
            .expect("error")
            .contains("not visible"));
    }

    #[test]
    fn test_talk_multiple_targets_roll_once() {
        let mut world = demo_world();
        world.entities.insert(
            "npc.captain".to_string(),
            taleforge_domain::Entity::Npc(Creature::new("npc.captain", "Captain", "courtyard")),
        );
        world.update_visibility();

        let result = run_talk(
            &mut world,
            json!({
                "actor": "pc.arin",
                "target": ["npc.guard", "npc.captain"],
                "intent": "intimidate",
            }),
            11,
        );
        assert!(result.ok, "{:?}", result.error_message);

        let hint = &result.narration_hint;
        let mentioned = hint["mentioned_entities"].as_array().expect("mentioned");
        assert_eq!(mentioned.len(), 3);
        // Both targets appear in the disposition map
        assert!(hint["audience_disposition_before"]["npc.guard"].is_object());
        assert!(hint["audience_disposition_before"]["npc.captain"].is_object());
    }

    #[test]
    fn test_talk_object_target_rejected() {
        let mut world = demo_world();
        world.entities.insert(
            "obj.door".to_string(),
            taleforge_domain::Entity::Object(taleforge_domain::ObjectEntity {
                id: "obj.door".to_string(),
                name: "Oak Door".to_string(),
                current_zone: "courtyard".to_string(),
                tags: Default::default(),
                description: String::new(),
                interactable: true,
                locked: false,
                meta: Default::default(),
            }),
        );

        let result = run_talk(
            &mut world,
            json!({"actor": "pc.arin", "target": "obj.door"}),
            3,
        );
        assert!(!result.ok);
        assert!(result
            .error_message
            .expect("error")
            .contains("not social_receptive"));
    }
}
