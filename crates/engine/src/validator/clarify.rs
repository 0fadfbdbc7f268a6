//! `ask_clarifying` executor: short-lived disambiguation contracts.

use serde_json::{json, Value};
use taleforge_domain::{ChoiceOption, PendingChoice};
use uuid::Uuid;

use crate::catalog::{AskClarifyingArgs, ToolId};
use crate::runtime::WorldCtx;
use crate::validator::{ToolResult, Validator};

/// Clarifications allowed per turn before falling back to narration.
const MAX_CLARIFICATIONS_PER_TURN: u32 = 3;

impl Validator {
    pub(super) fn execute_ask_clarifying(
        &mut self,
        args_value: &Value,
        ctx: &mut WorldCtx<'_>,
    ) -> ToolResult {
        // The 4th clarification in a round downgrades to hesitation
        if ctx.world.scene.choice_count_this_turn >= MAX_CLARIFICATIONS_PER_TURN {
            ctx.world.scene.pending_choice = None;
            let actor = ctx.world.current_actor.clone();

            return ToolResult {
                ok: true,
                tool_id: ToolId::NarrateOnly.as_str().to_string(),
                args: json!({"topic": "hesitation", "actor": actor}),
                facts: json!({
                    "clarification_limit_reached": true,
                    "max_clarifications": MAX_CLARIFICATIONS_PER_TURN,
                    "fallback_reason": "You hesitate, unsure what to do next.",
                }),
                effects: Vec::new(),
                narration_hint: json!({
                    "summary": "You hesitate, unsure what to do next.",
                    "tone_tags": ["neutral", "reflective"],
                    "sentences_max": 1,
                    "salient_entities": actor.map(|a| vec![a]).unwrap_or_default(),
                }),
                error_message: None,
            };
        }

        let args: AskClarifyingArgs = match serde_json::from_value(args_value.clone()) {
            Ok(args) => args,
            Err(err) => {
                return ToolResult::clarify(
                    "Could you clarify what you'd like to do?",
                    "ambiguous_intent",
                    json!({}),
                    Value::Null,
                    "Asked for clarification due to malformed clarify args",
                    format!("Schema validation failed: {err}"),
                )
            }
        };

        // Structural validation of the option set
        if args.options.len() < 2 {
            return clarify_error(
                args_value,
                "Failed to create clarifying question - need at least 2 options",
                "ask_clarifying requires at least 2 options",
            );
        }

        let mut seen_ids = std::collections::BTreeSet::new();
        for option in &args.options {
            if !seen_ids.insert(option.id.as_str()) {
                return clarify_error(
                    args_value,
                    "Failed to create clarifying question - option IDs must be unique",
                    "Option IDs must be unique",
                );
            }
            // Options may route to any catalog tool except another clarify
            match ToolId::parse(&option.tool_id) {
                Some(ToolId::AskClarifying) | None => {
                    return clarify_error(
                        args_value,
                        &format!(
                            "Failed to create clarifying question - invalid tool_id: {}",
                            option.tool_id
                        ),
                        &format!("Invalid tool_id: {}", option.tool_id),
                    );
                }
                Some(_) => {}
            }
        }

        let actor = args
            .actor
            .clone()
            .or_else(|| ctx.world.current_actor.clone());

        ctx.world.scene.choice_count_this_turn += 1;

        let choice_id = format!("pc_{}", &Uuid::new_v4().simple().to_string()[..6]);
        let expires_round = ctx.world.scene.round + args.expires_in_turns;

        let options: Vec<ChoiceOption> = args
            .options
            .iter()
            .map(|option| ChoiceOption {
                id: option.id.clone(),
                label: option.label.clone(),
                tool_id: option.tool_id.clone(),
                args_patch: option.args_patch.clone(),
            })
            .collect();

        ctx.world.scene.pending_choice = Some(PendingChoice {
            id: choice_id.clone(),
            actor: actor.clone(),
            question: args.question.clone(),
            options: options.clone(),
            reason: args.reason.clone(),
            expires_round,
            created_turn: u64::from(ctx.world.scene.choice_count_this_turn),
            context_note: args.context_note.clone(),
        });

        let options_text: Vec<String> = options
            .iter()
            .map(|o| format!("({}) {}", o.id, o.label))
            .collect();
        let options_summary: Vec<String> = options
            .iter()
            .map(|o| format!("{}: {}", o.id, o.label))
            .collect();

        let facts = json!({
            "pending_choice_id": choice_id,
            "actor": actor,
            "question": args.question,
            "options": options
                .iter()
                .map(|o| json!({"id": o.id, "label": o.label, "tool_id": o.tool_id}))
                .collect::<Vec<_>>(),
            "reason": args.reason,
            "clarification_number": ctx.world.scene.choice_count_this_turn,
            // Options are suggestions, not restrictions
            "open_choice": true,
        });

        let narration_hint = json!({
            "summary": format!("{} {}", args.question, options_text.join(" or ")),
            "options_summary": options_summary,
            "tone_tags": ["interactive", "concise"],
            "sentences_max": 1,
            "salient_entities": actor.map(|a| vec![a]).unwrap_or_default(),
        });

        ToolResult::success(
            ToolId::AskClarifying,
            args_value.clone(),
            facts,
            Vec::new(),
            narration_hint,
        )
    }
}

fn clarify_error(args_value: &Value, summary: &str, error: &str) -> ToolResult {
    ToolResult {
        ok: false,
        tool_id: ToolId::AskClarifying.as_str().to_string(),
        args: args_value.clone(),
        facts: json!({}),
        effects: Vec::new(),
        narration_hint: json!({
            "summary": summary,
            "tone_tags": ["error"],
            "salient_entities": [],
        }),
        error_message: Some(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::validator::test_support::demo_world;
    use crate::visibility::RedactionCache;
    use taleforge_domain::{GameState, Utterance};

    fn two_options() -> Value {
        json!([
            {
                "id": "A",
                "label": "Sneak to the threshold",
                "tool_id": "ask_roll",
                "args_patch": {"action": "sneak", "zone_target": "threshold"},
            },
            {
                "id": "B",
                "label": "Charge the guard",
                "tool_id": "attack",
                "args_patch": {"target": "npc.guard"},
            },
        ])
    }

    fn run_clarify(world: &mut GameState, args: Value) -> ToolResult {
        let bus = EventBus::new();
        let cache = RedactionCache::new();
        let mut validator = Validator::with_defaults();
        let mut ctx = WorldCtx::new(world, &bus, &cache);
        validator.validate_and_execute(
            "ask_clarifying",
            &args,
            &mut ctx,
            &Utterance::new("do something", "pc.arin"),
            Some(1),
        )
    }

    #[test]
    fn test_creates_pending_choice() {
        let mut world = demo_world();
        let result = run_clarify(
            &mut world,
            json!({"question": "Sneak or charge?", "options": two_options()}),
        );
        assert!(result.ok, "{:?}", result.error_message);

        let choice = world.scene.pending_choice.as_ref().expect("pending choice");
        assert!(choice.id.starts_with("pc_"));
        assert_eq!(choice.options.len(), 2);
        assert_eq!(choice.expires_round, world.scene.round + 1);
        assert_eq!(world.scene.choice_count_this_turn, 1);
        assert_eq!(result.facts["open_choice"], json!(true));
    }

    #[test]
    fn test_requires_two_options() {
        let mut world = demo_world();
        let result = run_clarify(
            &mut world,
            json!({"question": "What?", "options": [{"id": "A", "label": "Only one", "tool_id": "move"}]}),
        );
        assert!(!result.ok);
        assert!(result
            .error_message
            .expect("error")
            .contains("at least 2 options"));
        assert!(world.scene.pending_choice.is_none());
    }

    #[test]
    fn test_rejects_duplicate_option_ids() {
        let mut world = demo_world();
        let result = run_clarify(
            &mut world,
            json!({
                "question": "What?",
                "options": [
                    {"id": "A", "label": "One", "tool_id": "move"},
                    {"id": "A", "label": "Two", "tool_id": "attack"},
                ],
            }),
        );
        assert!(!result.ok);
        assert!(result.error_message.expect("error").contains("unique"));
    }

    #[test]
    fn test_rejects_unknown_tool_ids() {
        let mut world = demo_world();
        let result = run_clarify(
            &mut world,
            json!({
                "question": "What?",
                "options": [
                    {"id": "A", "label": "One", "tool_id": "move"},
                    {"id": "B", "label": "Two", "tool_id": "cast_fireball"},
                ],
            }),
        );
        assert!(!result.ok);
        assert!(result.error_message.expect("error").contains("Invalid tool_id"));
    }

    #[test]
    fn test_fourth_clarification_downgrades_to_hesitation() {
        let mut world = demo_world();
        world.scene.choice_count_this_turn = 3;

        let result = run_clarify(
            &mut world,
            json!({"question": "Again?", "options": two_options()}),
        );
        assert!(result.ok);
        assert_eq!(result.tool_id, "narrate_only");
        assert_eq!(result.facts["clarification_limit_reached"], json!(true));
        assert!(world.scene.pending_choice.is_none());
        // Counter does not grow past the cap
        assert_eq!(world.scene.choice_count_this_turn, 3);
    }
}
