//! `attack` executor: combat with Style+Domain rolling and mark consumption.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use taleforge_domain::{Effect, TagPayload};

use crate::catalog::{AttackArgs, AttackMode, ToolId};
use crate::runtime::WorldCtx;
use crate::validator::rolls::{self, RollOutcome};
use crate::validator::{ToolResult, Validator};

impl Validator {
    pub(super) fn execute_attack(
        &mut self,
        args_value: &Value,
        ctx: &mut WorldCtx<'_>,
        seed: u64,
    ) -> ToolResult {
        let args: AttackArgs = match serde_json::from_value(args_value.clone()) {
            Ok(args) => args,
            Err(err) => {
                return ToolResult::clarify(
                    "I can't work out that attack. Who is attacking whom?",
                    "missing_arg",
                    json!({}),
                    Value::Null,
                    "Asked for clarification due to malformed attack args",
                    format!("Schema validation failed: {err}"),
                )
            }
        };

        let Some(attacker) = ctx.world.actor(&args.actor) else {
            return ToolResult::clarify(
                "I can't find the attacker. Who is attacking?",
                "invalid_target",
                json!({}),
                Value::Null,
                "Asked for clarification due to missing attacker",
                format!("Actor '{}' not found in entities", args.actor),
            );
        };
        let attacker_name = attacker.name.clone();
        let attacker_visible = attacker.visible_actors.clone();

        let Some(target_entity) = ctx.world.entities.get(&args.target) else {
            return ToolResult::clarify(
                "I can't find the target. Who are you attacking?",
                "invalid_target",
                json!({}),
                Value::Null,
                "Asked for clarification due to missing target",
                format!("Target '{}' not found in entities", args.target),
            );
        };
        let Some(target) = target_entity.as_creature() else {
            return ToolResult::clarify(
                "You can't attack that. Try attacking a living creature instead.",
                "invalid_target",
                json!({}),
                Value::Null,
                "Asked for clarification due to invalid target type",
                format!(
                    "Target '{}' is not attackable (type: {})",
                    args.target,
                    target_entity.type_str()
                ),
            );
        };

        if !attacker_visible.contains(&args.target) {
            return ToolResult::clarify(
                "You can't see your target. Look around first.",
                "not_adjacent",
                json!({}),
                Value::Null,
                "Asked for clarification due to invisible target",
                format!(
                    "Target '{}' is not visible to attacker '{}'",
                    args.target, args.actor
                ),
            );
        }

        // A consumable mark on the target sharpens the attack
        let legacy_mark = target.style_bonus > 0;
        let keyed_mark = target
            .marks
            .iter()
            .find(|(_, mark)| mark.consumes)
            .map(|(_, mark)| (mark.tag.clone(), mark.source.clone()));
        let target_has_mark = legacy_mark || keyed_mark.is_some();

        let mut effective_style = (args.style + args.adv_style_delta).clamp(0, 3);
        let mut mark_consumed = false;
        if args.consume_mark && target_has_mark {
            effective_style = (effective_style + 1).min(3);
            mark_consumed = true;
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let roll =
            rolls::resolve_roll(&mut rng, effective_style, args.domain.die_size(), args.dc_hint);

        // Scrolls always at least partially succeed
        let mut outcome = roll.outcome;
        if args.attack_mode == AttackMode::Scroll && outcome == RollOutcome::Fail {
            outcome = RollOutcome::Partial;
            tracing::debug!(weapon = %args.weapon, "scroll attack upgraded from fail to partial");
        }

        // Damage lands on anything better than a miss
        let mut damage_dice = Vec::new();
        let mut raw_damage = 0;
        let mut applied_damage = 0;
        if outcome.is_hit() {
            let (dice, total) =
                rolls::roll_damage(&args.damage_expr, outcome == RollOutcome::CritSuccess, &mut rng);
            damage_dice = dice;
            raw_damage = total.max(0);
            applied_damage = if outcome == RollOutcome::Partial {
                raw_damage / 2
            } else {
                raw_damage
            };
        }

        let mut effects = Vec::new();
        if applied_damage > 0 {
            effects.push(
                Effect::hp(&args.target, -applied_damage)
                    .with_source(args.actor.clone())
                    .with_cause("attack"),
            );
        }
        if mark_consumed {
            let mut remove = Effect {
                kind: taleforge_domain::EffectKind::Mark,
                target: Some(args.target.clone()),
                cause: Some("attack".to_string()),
                ..Effect::default()
            };
            match &keyed_mark {
                Some((tag, source)) => {
                    remove.remove = Some(TagPayload::One(tag.clone()));
                    remove.source = Some(source.clone());
                }
                None => {
                    remove.remove = Some(TagPayload::Flag(true));
                    remove.source = Some(args.actor.clone());
                }
            }
            effects.push(remove);
        }

        let mut dice_block = roll.dice_block();
        dice_block["damage_dice"] = serde_json::to_value(&damage_dice).unwrap_or(json!([]));

        let narration_hint = json!({
            "summary": attack_summary(outcome, &args.weapon, applied_damage, &attacker_name),
            "dice": dice_block,
            "outcome": outcome.as_str(),
            "raw_damage": raw_damage,
            "applied_damage": applied_damage,
            "mark_consumed": mark_consumed,
            "tone_tags": attack_tone_tags(outcome),
            "salient_entities": [args.actor.clone(), args.target.clone()],
        });

        ToolResult::success(
            ToolId::Attack,
            args_value.clone(),
            json!({
                "outcome": outcome.as_str(),
                "margin": roll.margin,
                "total": roll.total,
                "dc": roll.dc,
                "raw_damage": raw_damage,
                "applied_damage": applied_damage,
                "mark_consumed": mark_consumed,
                "weapon": args.weapon,
            }),
            effects,
            narration_hint,
        )
    }
}

fn attack_summary(outcome: RollOutcome, weapon: &str, damage: i64, attacker_name: &str) -> String {
    let weapon_text = if weapon == "basic_melee" { "weapon" } else { weapon };
    match outcome {
        RollOutcome::CritSuccess => format!(
            "{attacker_name}'s {weapon_text} strikes true, dealing {damage} devastating damage"
        ),
        RollOutcome::Success => {
            format!("{attacker_name} hits with {weapon_text} for {damage} damage")
        }
        RollOutcome::Partial => {
            format!("{attacker_name}'s {weapon_text} grazes the target for {damage} damage")
        }
        RollOutcome::Fail => format!("{attacker_name}'s {weapon_text} misses completely"),
    }
}

fn attack_tone_tags(outcome: RollOutcome) -> Vec<&'static str> {
    let mut tags = vec!["violent", "tense"];
    if outcome == RollOutcome::CritSuccess {
        tags.push("critical");
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::validator::test_support::demo_world;
    use crate::visibility::RedactionCache;
    use taleforge_domain::{GameState, Mark, Utterance};

    fn run_attack(world: &mut GameState, args: Value, seed: u64) -> ToolResult {
        let bus = EventBus::new();
        let cache = RedactionCache::new();
        let mut validator = Validator::with_defaults();
        let mut ctx = WorldCtx::new(world, &bus, &cache);
        validator.validate_and_execute(
            "attack",
            &args,
            &mut ctx,
            &Utterance::new("I attack the guard", "pc.arin"),
            Some(seed),
        )
    }

    #[test]
    fn test_attack_damage_consistent_with_outcome() {
        let mut world = demo_world();
        let hp_before = world.actor("npc.guard").expect("guard").hp.current;
        let result = run_attack(
            &mut world,
            json!({"actor": "pc.arin", "target": "npc.guard"}),
            13,
        );
        assert!(result.ok, "{:?}", result.error_message);

        let outcome = result.facts["outcome"].as_str().expect("outcome");
        let applied = result.facts["applied_damage"].as_i64().expect("damage");
        let raw = result.facts["raw_damage"].as_i64().expect("raw");
        let hp_after = world.actor("npc.guard").expect("guard").hp.current;

        match outcome {
            "fail" => {
                assert_eq!(applied, 0);
                assert_eq!(hp_after, hp_before);
            }
            "partial" => {
                assert_eq!(applied, raw / 2);
                assert_eq!(hp_after, (hp_before - applied).max(0));
            }
            _ => {
                assert_eq!(applied, raw);
                assert_eq!(hp_after, (hp_before - applied).max(0));
            }
        }
    }

    #[test]
    fn test_scroll_mode_upgrades_fail_to_partial() {
        // Scan seeds for one where a normal attack fails, then confirm the
        // scroll upgrade on the same seed.
        let mut failing_seed = None;
        for seed in 0..200u64 {
            let mut world = demo_world();
            let result = run_attack(
                &mut world,
                json!({"actor": "pc.arin", "target": "npc.guard", "dc_hint": 25, "style": 0}),
                seed,
            );
            if result.facts["outcome"] == json!("fail") {
                failing_seed = Some(seed);
                break;
            }
        }
        let seed = failing_seed.expect("some seed should fail against DC 25");

        let mut world = demo_world();
        let result = run_attack(
            &mut world,
            json!({
                "actor": "pc.arin",
                "target": "npc.guard",
                "dc_hint": 25,
                "style": 0,
                "attack_mode": "scroll",
            }),
            seed,
        );
        assert_eq!(result.facts["outcome"], json!("partial"));
    }

    #[test]
    fn test_mark_consumption_bumps_style_and_removes_mark() {
        let mut world = demo_world();
        world.actor_mut("npc.guard").expect("guard").marks.insert(
            "pc.arin.favor".to_string(),
            Mark {
                tag: "favor".to_string(),
                source: "pc.arin".to_string(),
                value: 1,
                consumes: true,
                created_round: 1,
            },
        );

        let result = run_attack(
            &mut world,
            json!({"actor": "pc.arin", "target": "npc.guard", "style": 1}),
            5,
        );
        assert!(result.ok);
        assert_eq!(result.facts["mark_consumed"], json!(true));
        assert_eq!(result.narration_hint["dice"]["effective_style"], json!(2));
        assert!(!world
            .actor("npc.guard")
            .expect("guard")
            .marks
            .contains_key("pc.arin.favor"));
    }

    #[test]
    fn test_consume_mark_false_preserves_mark() {
        let mut world = demo_world();
        world.actor_mut("npc.guard").expect("guard").marks.insert(
            "pc.arin.favor".to_string(),
            Mark {
                tag: "favor".to_string(),
                source: "pc.arin".to_string(),
                value: 1,
                consumes: true,
                created_round: 1,
            },
        );

        let result = run_attack(
            &mut world,
            json!({"actor": "pc.arin", "target": "npc.guard", "consume_mark": false}),
            5,
        );
        assert!(result.ok);
        assert_eq!(result.facts["mark_consumed"], json!(false));
        assert!(world
            .actor("npc.guard")
            .expect("guard")
            .marks
            .contains_key("pc.arin.favor"));
    }

    #[test]
    fn test_invisible_target_rejected() {
        let mut world = demo_world();
        world
            .actor_mut("pc.arin")
            .expect("arin")
            .visible_actors
            .clear();

        let result = run_attack(
            &mut world,
            json!({"actor": "pc.arin", "target": "npc.guard"}),
            5,
        );
        assert!(!result.ok);
        assert_eq!(result.tool_id, "ask_clarifying");
    }
}
