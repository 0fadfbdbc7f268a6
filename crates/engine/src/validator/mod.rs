//! Validator/executor: the sole callable that mutates the world.
//!
//! Per utterance the pipeline is: pending-choice capture, tool lookup,
//! schema validation, non-destructive sanitization, precondition re-check,
//! per-tool execution, and effect application. Failures never escape as
//! errors; every path returns a `ToolResult` envelope, usually rewritten to
//! an `ask_clarifying` fallback with a targeted question.

mod ask_roll;
mod attack;
mod clarify;
mod get_info;
mod movement;
mod narrate;
pub mod rolls;
mod talk;
mod use_item;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use taleforge_domain::{Effect, GameState, Utterance};
use tracing::{error, info, warn};

use crate::catalog::{self, ToolId};
use crate::config::RuntimeConfig;
use crate::effects::{ApplyOptions, EffectEngine, TransactionMode};
use crate::items::ItemRegistry;
use crate::runtime::WorldCtx;
use crate::social::SocialOutcomes;

/// Standardized result envelope for all tool executions.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub ok: bool,
    pub tool_id: String,
    pub args: Value,
    pub facts: Value,
    pub effects: Vec<Effect>,
    pub narration_hint: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ToolResult {
    pub fn success(
        tool_id: ToolId,
        args: Value,
        facts: Value,
        effects: Vec<Effect>,
        narration_hint: Value,
    ) -> Self {
        Self {
            ok: true,
            tool_id: tool_id.as_str().to_string(),
            args,
            facts,
            effects,
            narration_hint,
            error_message: None,
        }
    }

    /// Error envelope rewritten to an `ask_clarifying` fallback with a
    /// targeted question (and optionally a short option list).
    pub fn clarify(
        question: impl Into<String>,
        reason: &str,
        facts: Value,
        options: Value,
        summary: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        let mut args = Map::new();
        args.insert("question".into(), json!(question.into()));
        args.insert("reason".into(), json!(reason));
        if !options.is_null() {
            args.insert("options".into(), options);
        }

        Self {
            ok: false,
            tool_id: ToolId::AskClarifying.as_str().to_string(),
            args: Value::Object(args),
            facts,
            effects: Vec::new(),
            narration_hint: json!({
                "summary": summary.into(),
                "tone_tags": ["helpful"],
                "salient_entities": [],
            }),
            error_message: Some(error_message.into()),
        }
    }

    /// Deferred execution: a non-OK envelope whose tool id names the tool
    /// that should run instead, with synthesized args.
    pub fn deferred(tool_id: ToolId, args: Value) -> Self {
        Self {
            ok: false,
            tool_id: tool_id.as_str().to_string(),
            args,
            facts: json!({}),
            effects: Vec::new(),
            narration_hint: json!({}),
            error_message: None,
        }
    }
}

/// Handles the validation pipeline: schema → sanitize → preconditions →
/// execute → apply effects.
pub struct Validator {
    turn_counter: u64,
    pub(crate) social_outcomes: SocialOutcomes,
    pub(crate) item_registry: ItemRegistry,
    pub(crate) engine: EffectEngine,
}

impl Validator {
    pub fn new(social_outcomes: SocialOutcomes, item_registry: ItemRegistry) -> Self {
        Self {
            turn_counter: 0,
            social_outcomes,
            item_registry,
            engine: EffectEngine::new(),
        }
    }

    /// Validator with builtin data tables.
    pub fn with_defaults() -> Self {
        Self::new(SocialOutcomes::builtin(), ItemRegistry::builtin())
    }

    /// Validator loading data tables from configured paths.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(
            SocialOutcomes::load(&config.social_outcomes_path),
            ItemRegistry::load(&config.items_path),
        )
    }

    pub fn effect_engine(&self) -> &EffectEngine {
        &self.engine
    }

    pub fn effect_engine_mut(&mut self) -> &mut EffectEngine {
        &mut self.engine
    }

    /// Advance to the next turn: rotate the turn order, roll the round over
    /// when it wraps, reset the clarification counter, and clear expired
    /// pending choices.
    pub fn advance_turn(&self, world: &mut GameState) {
        if !world.scene.turn_order.is_empty() {
            world.scene.turn_index = (world.scene.turn_index + 1) % world.scene.turn_order.len();
            if world.scene.turn_index == 0 {
                world.scene.round += 1;
            }
            world.current_actor = world
                .scene
                .turn_order
                .get(world.scene.turn_index)
                .cloned();
        }

        world.scene.choice_count_this_turn = 0;

        let expired = world
            .scene
            .pending_choice
            .as_ref()
            .is_some_and(|choice| choice.is_expired(world.scene.round));
        if expired {
            if let Some(choice) = world.scene.pending_choice.take() {
                info!(choice_id = %choice.id, round = world.scene.round,
                    "clearing expired pending choice");
            }
        }
    }

    /// If a live pending choice matches the utterance, consume it and
    /// return the `(tool, args)` it resolves to: the option's `args_patch`
    /// merged over the target tool's suggested args.
    pub fn maybe_consume_pending_choice(
        &self,
        world: &mut GameState,
        utterance: &Utterance,
    ) -> Option<(ToolId, Value)> {
        let choice = world.scene.pending_choice.clone()?;

        if choice.is_expired(world.scene.round) {
            info!(choice_id = %choice.id, round = world.scene.round, "pending choice expired");
            world.scene.pending_choice = None;
            return None;
        }

        let user_text = utterance.text.to_lowercase();
        let user_text = user_text.trim();

        // Exact option id first ("A", "B", ...)
        let mut matched = choice
            .options
            .iter()
            .find(|option| option.id.to_lowercase() == user_text);

        // Then fuzzy label-word matching
        if matched.is_none() {
            matched = choice.options.iter().find(|option| {
                option
                    .label
                    .to_lowercase()
                    .split_whitespace()
                    .any(|word| word.len() > 2 && user_text.contains(word))
            });
        }

        let option = matched?;
        let tool_id = ToolId::parse(&option.tool_id)?;

        let tool = catalog::get_tool(tool_id);
        let mut args = as_map((tool.suggest_args)(world, utterance));
        if let Value::Object(patch) = &option.args_patch {
            for (key, value) in patch {
                args.insert(key.clone(), value.clone());
            }
        }

        info!(
            choice_id = %choice.id,
            option = %option.id,
            tool = %option.tool_id,
            "consumed pending choice"
        );
        world.scene.pending_choice = None;

        Some((tool_id, Value::Object(args)))
    }

    /// Entry point with automatic pending-choice consumption.
    pub fn process_turn_with_pending_choice_check(
        &mut self,
        tool_id: &str,
        raw_args: &Value,
        ctx: &mut WorldCtx<'_>,
        utterance: &Utterance,
        seed: Option<u64>,
    ) -> ToolResult {
        if let Some((consumed_tool, consumed_args)) =
            self.maybe_consume_pending_choice(ctx.world, utterance)
        {
            return self.execute_consumed_choice(consumed_tool, &consumed_args, ctx, utterance, seed);
        }
        self.validate_and_execute(tool_id, raw_args, ctx, utterance, seed)
    }

    /// Execute a tool resolved from a consumed pending choice. The player's
    /// explicit selection stands in for the precondition gate, which is
    /// keyed to free-text analysis and would reject bare option inputs
    /// like "A".
    pub fn execute_consumed_choice(
        &mut self,
        tool_id: ToolId,
        args: &Value,
        ctx: &mut WorldCtx<'_>,
        utterance: &Utterance,
        seed: Option<u64>,
    ) -> ToolResult {
        self.run_pipeline(tool_id.as_str(), args, ctx, utterance, seed, false)
    }

    /// Run the full validation pipeline and execute a tool.
    pub fn validate_and_execute(
        &mut self,
        tool_id: &str,
        raw_args: &Value,
        ctx: &mut WorldCtx<'_>,
        utterance: &Utterance,
        seed: Option<u64>,
    ) -> ToolResult {
        self.run_pipeline(tool_id, raw_args, ctx, utterance, seed, true)
    }

    fn run_pipeline(
        &mut self,
        tool_id: &str,
        raw_args: &Value,
        ctx: &mut WorldCtx<'_>,
        utterance: &Utterance,
        seed: Option<u64>,
        check_precond: bool,
    ) -> ToolResult {
        self.turn_counter += 1;
        let turn_id = format!("t_{:04}", self.turn_counter);
        // Deterministic replay: absent seeds derive from the clock
        let seed = seed.unwrap_or_else(|| (Utc::now().timestamp_millis().unsigned_abs()) % 10_000);

        let Some(tool_id) = ToolId::parse(tool_id) else {
            error!(%turn_id, tool = tool_id, "unknown tool");
            return self.error_result(tool_id, raw_args.clone(), format!("Unknown tool: {tool_id}"));
        };
        let tool = catalog::get_tool(tool_id);

        // Schema validation + non-destructive sanitization
        let sanitized_args = match (tool.validate_args)(raw_args) {
            Ok(sanitized) => sanitized,
            Err(err) => {
                warn!(%turn_id, tool = tool_id.as_str(), %err, "schema validation failed");
                return self.error_result(tool_id.as_str(), raw_args.clone(), err);
            }
        };

        // Precondition re-check, same predicate the affordance filter used
        if check_precond && !(tool.precond)(ctx.world, utterance) {
            warn!(%turn_id, tool = tool_id.as_str(), "preconditions not satisfied");
            return self.error_result(
                tool_id.as_str(),
                sanitized_args,
                "Preconditions not satisfied".to_string(),
            );
        }

        let result = self.execute_tool(tool_id, &sanitized_args, ctx, utterance, seed);

        // Route emitted effects through the effect engine
        let result = if result.ok && !result.effects.is_empty() {
            let actor = result
                .args
                .get("actor")
                .and_then(Value::as_str)
                .map(str::to_string);
            let report = self.engine.apply_effects(
                ctx,
                &result.effects,
                &ApplyOptions::strict(actor, seed),
            );
            if report.ok {
                result
            } else {
                let message = report
                    .error_message
                    .unwrap_or_else(|| "effect application failed".to_string());
                return self.error_result(
                    tool_id.as_str(),
                    result.args,
                    format!("Effect application failed: {message}"),
                );
            }
        } else {
            result
        };

        info!(
            %turn_id,
            seed,
            player_text = %utterance.text,
            tool = %result.tool_id,
            ok = result.ok,
            "turn executed"
        );

        result
    }

    fn execute_tool(
        &mut self,
        tool_id: ToolId,
        args: &Value,
        ctx: &mut WorldCtx<'_>,
        utterance: &Utterance,
        seed: u64,
    ) -> ToolResult {
        match tool_id {
            ToolId::AskRoll => self.execute_ask_roll(args, ctx, seed),
            ToolId::Move => self.execute_move(args, ctx, seed),
            ToolId::Talk => self.execute_talk(args, ctx, seed),
            ToolId::Attack => self.execute_attack(args, ctx, seed),
            ToolId::UseItem => self.execute_use_item(args, ctx, utterance, seed),
            ToolId::GetInfo => self.execute_get_info(args, ctx),
            ToolId::NarrateOnly => self.execute_narrate_only(args, ctx),
            ToolId::ApplyEffects => self.execute_apply_effects(args, ctx, seed),
            ToolId::AskClarifying => self.execute_ask_clarifying(args, ctx),
        }
    }

    /// Execute the `apply_effects` tool: a thin wrapper over the effect
    /// engine's transaction protocol. The batch is applied here; the
    /// returned envelope carries no unapplied atoms.
    fn execute_apply_effects(
        &mut self,
        args: &Value,
        ctx: &mut WorldCtx<'_>,
        seed: u64,
    ) -> ToolResult {
        let parsed: catalog::ApplyEffectsArgs = match serde_json::from_value(args.clone()) {
            Ok(parsed) => parsed,
            Err(err) => {
                return self.error_result(
                    ToolId::ApplyEffects.as_str(),
                    args.clone(),
                    format!("Schema validation failed: {err}"),
                )
            }
        };

        let mode = TransactionMode::parse(&parsed.transaction_mode)
            .unwrap_or(TransactionMode::Strict);
        let options = ApplyOptions {
            actor: parsed.actor.clone(),
            transactional: parsed.transactional,
            mode,
            seed: parsed.seed.unwrap_or(seed),
        };

        let report = self.engine.apply_effects(ctx, &parsed.effects, &options);

        ToolResult {
            ok: report.ok,
            tool_id: ToolId::ApplyEffects.as_str().to_string(),
            args: args.clone(),
            facts: report.facts,
            effects: Vec::new(),
            narration_hint: report.narration_hint,
            error_message: report.error_message,
        }
    }

    /// Generic error envelope with the ask_clarifying fallback.
    fn error_result(&self, tool_id: &str, args: Value, error_msg: String) -> ToolResult {
        error!(tool = tool_id, %error_msg, "tool execution error");
        let _ = args;
        ToolResult::clarify(
            "I'm not sure how to do that. Could you try something else?",
            "ambiguous_intent",
            json!({}),
            Value::Null,
            "Asked for clarification due to error",
            error_msg,
        )
    }
}

pub(crate) fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
pub(crate) mod test_support;
