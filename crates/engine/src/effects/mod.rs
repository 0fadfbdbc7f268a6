//! The transactional effect engine.
//!
//! Effect atoms are the only way game state changes. The engine owns a
//! dispatch table from effect kind to handler, resolves dice-expression
//! deltas with the transaction seed, evaluates per-effect conditions,
//! schedules timed effects, cascades reactive rules, and keeps the audit
//! log. Batches are applied under a snapshot/rollback protocol whose
//! behavior depends on the transaction mode.

mod handlers;
mod reactions;

pub use reactions::{ReactionRule, ReactionTemplate};

use std::collections::HashMap;

use serde_json::{json, Map, Value};
use taleforge_domain::meta::now_iso;
use taleforge_domain::{
    Clock, Delta, DiceExpression, Effect, EffectKind, EffectLogEntry, GameState, PendingEffect,
};
use tracing::{debug, warn};

use crate::runtime::WorldCtx;

/// How a batch responds to validation and application failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// Any failure aborts the whole batch and rolls back
    #[default]
    Strict,
    /// Invalid/failed atoms are dropped; the rest proceed
    Partial,
    /// Apply whatever can be applied, swallow the rest
    BestEffort,
}

impl TransactionMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(Self::Strict),
            "partial" => Some(Self::Partial),
            "best_effort" => Some(Self::BestEffort),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Partial => "partial",
            Self::BestEffort => "best_effort",
        }
    }
}

/// Per-application context: who caused the batch and the replay seed.
#[derive(Debug, Clone)]
pub struct ApplyMeta {
    pub actor: Option<String>,
    pub seed: u64,
}

/// Options for [`EffectEngine::apply_effects`].
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    pub actor: Option<String>,
    pub transactional: bool,
    pub mode: TransactionMode,
    pub seed: u64,
}

impl ApplyOptions {
    pub fn strict(actor: Option<String>, seed: u64) -> Self {
        Self {
            actor,
            transactional: true,
            mode: TransactionMode::Strict,
            seed,
        }
    }
}

/// Result of applying a batch of effects.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub ok: bool,
    pub facts: Value,
    pub logs: Vec<EffectLogEntry>,
    pub narration_hint: Value,
    pub error_message: Option<String>,
}

type Handler = Box<dyn Fn(&Effect, &mut WorldCtx<'_>, &ApplyMeta) -> EffectLogEntry>;

/// Dispatch table plus reaction rule set.
pub struct EffectEngine {
    handlers: HashMap<EffectKind, Handler>,
    reaction_rules: Vec<ReactionRule>,
}

impl Default for EffectEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectEngine {
    /// Engine with the builtin handlers and baseline reaction rules.
    pub fn new() -> Self {
        let mut engine = Self {
            handlers: HashMap::new(),
            reaction_rules: reactions::baseline_rules(),
        };

        engine.register_handler(EffectKind::Hp, Box::new(handlers::apply_hp));
        engine.register_handler(EffectKind::Guard, Box::new(handlers::apply_guard));
        engine.register_handler(EffectKind::Position, Box::new(handlers::apply_position));
        engine.register_handler(EffectKind::Mark, Box::new(handlers::apply_mark));
        engine.register_handler(EffectKind::Inventory, Box::new(handlers::apply_inventory));
        engine.register_handler(EffectKind::Clock, Box::new(handlers::apply_clock));
        engine.register_handler(EffectKind::Tag, Box::new(handlers::apply_tag));
        engine.register_handler(EffectKind::Resource, Box::new(handlers::apply_resource));
        engine.register_handler(EffectKind::Noise, Box::new(handlers::apply_noise));
        engine.register_handler(EffectKind::Meta, Box::new(handlers::apply_meta));
        engine
    }

    /// Register (or replace) a handler for an effect kind.
    pub fn register_handler(&mut self, kind: EffectKind, handler: Handler) {
        self.handlers.insert(kind, handler);
    }

    pub fn registered_kinds(&self) -> Vec<&EffectKind> {
        self.handlers.keys().collect()
    }

    /// Dispatch one effect. Unknown kinds are skipped gracefully with an
    /// ok log so plugins can ship new atoms ahead of the engine.
    pub fn dispatch(
        &self,
        effect: &Effect,
        ctx: &mut WorldCtx<'_>,
        meta: &ApplyMeta,
    ) -> EffectLogEntry {
        match self.handlers.get(&effect.kind) {
            Some(handler) => handler(effect, ctx, meta),
            None => {
                debug!(kind = effect.kind.as_str(), "unknown effect kind skipped");
                make_log_entry(
                    effect,
                    Value::Null,
                    Value::Null,
                    true,
                    Some(format!("Unknown effect type: {} (skipped)", effect.kind.as_str())),
                    meta,
                    ctx.world.scene.round,
                    Vec::new(),
                    None,
                )
            }
        }
    }

    /// Validate a single effect against the world. Returns an error message
    /// when invalid.
    pub fn validate_effect(&self, effect: &Effect, world: &GameState) -> Option<String> {
        if let Some(target) = &effect.target {
            let known_special = target == "scene" || target == "global";
            if !known_special
                && !world.entities.contains_key(target)
                && effect.kind != EffectKind::Meta
                && effect.kind != EffectKind::Clock
            {
                return Some(format!("Entity {target} not found"));
            }
        }

        match &effect.kind {
            EffectKind::Hp | EffectKind::Guard => {
                let Some(target) = &effect.target else {
                    return Some(format!("{} effect requires target", effect.kind.as_str()));
                };
                let Some(entity) = world.entities.get(target) else {
                    return Some(format!("{} effect target not found: {target}", effect.kind.as_str()));
                };
                if !entity.is_creature() {
                    return Some(format!(
                        "{} effect on non-creature: {}",
                        effect.kind.as_str(),
                        entity.type_str()
                    ));
                }
                if effect.delta.is_none() {
                    return Some(format!("{} effect requires delta", effect.kind.as_str()));
                }
            }
            EffectKind::Position => {
                let Some(to) = &effect.to else {
                    return Some("Position effect requires 'to' field".to_string());
                };
                if !world.zones.contains_key(to) {
                    return Some(format!("Target zone {to} not found"));
                }
                if effect.target.is_none() {
                    return Some("Position effect requires target".to_string());
                }
            }
            EffectKind::Clock => {
                if effect.id.is_none() {
                    return Some("Clock effect requires 'id' field".to_string());
                }
                if effect.delta.is_none() {
                    return Some("Clock effect requires delta".to_string());
                }
            }
            EffectKind::Inventory => {
                if effect.id.is_none() {
                    return Some("Inventory effect requires 'id' field".to_string());
                }
                if effect.delta.is_none() {
                    return Some("Inventory effect requires delta".to_string());
                }
            }
            EffectKind::Mark | EffectKind::Tag => {
                if effect.add.is_none() && effect.remove.is_none() {
                    return Some(format!(
                        "{} effect requires either 'add' or 'remove'",
                        effect.kind.as_str()
                    ));
                }
            }
            EffectKind::Resource => {
                if effect.id.is_none() {
                    return Some("Resource effect requires 'id' field".to_string());
                }
                if effect.delta.is_none() {
                    return Some("Resource effect requires delta".to_string());
                }
            }
            EffectKind::Noise => {
                if effect.zone.is_none() || effect.intensity.is_none() || effect.source.is_none() {
                    return Some("noise effect requires zone, intensity, and source".to_string());
                }
            }
            EffectKind::Meta | EffectKind::Other(_) => {}
        }

        None
    }

    /// Apply a batch of effects with transactional semantics.
    pub fn apply_effects(
        &self,
        ctx: &mut WorldCtx<'_>,
        effects: &[Effect],
        options: &ApplyOptions,
    ) -> ApplyReport {
        let meta = ApplyMeta {
            actor: options.actor.clone(),
            seed: options.seed,
        };

        let has_pending = !ctx.world.scene.pending_effects.is_empty();
        if effects.is_empty() && !has_pending {
            return ApplyReport {
                ok: false,
                facts: json!({}),
                logs: Vec::new(),
                narration_hint: json!({
                    "summary": "No effects to apply",
                    "tone_tags": ["error"],
                    "salient_entities": [],
                }),
                error_message: Some("No effects provided".to_string()),
            };
        }

        let mut logs: Vec<EffectLogEntry> = Vec::new();

        // Timed drain: due pending effects run first, each as its own
        // nested single-effect application with its own reactive pass.
        let timed_logs = self.drain_timed_effects(ctx);
        let timed_applied = timed_logs.iter().filter(|l| l.ok).count();
        if !timed_logs.is_empty() {
            let reactive = self.process_reactive_effects(&timed_logs, ctx, &meta);
            logs.extend(timed_logs);
            logs.extend(reactive);
        }

        let primary_start = logs.len();

        // Pre-validation
        let mut validation_errors: Vec<(usize, String)> = Vec::new();
        for (index, effect) in effects.iter().enumerate() {
            if let Some(error) = self.validate_effect(effect, ctx.world) {
                validation_errors.push((index, error));
            }
        }

        let total_effects = effects.len();
        if !validation_errors.is_empty() && options.mode == TransactionMode::Strict {
            let first_error = validation_errors[0].1.clone();
            return ApplyReport {
                ok: false,
                facts: json!({
                    "applied": 0,
                    "skipped": total_effects,
                    "transaction_mode": options.mode.as_str(),
                    "total_effects": total_effects,
                }),
                logs,
                narration_hint: json!({
                    "summary": format!("Effect validation failed: {first_error}"),
                    "tone_tags": ["error"],
                    "salient_entities": [],
                }),
                error_message: Some(first_error),
            };
        }

        let invalid_indices: std::collections::BTreeSet<usize> =
            validation_errors.iter().map(|(i, _)| *i).collect();
        let valid_effects: Vec<&Effect> = effects
            .iter()
            .enumerate()
            .filter(|(i, _)| !invalid_indices.contains(i))
            .map(|(_, e)| e)
            .collect();

        if valid_effects.is_empty() && options.mode == TransactionMode::Partial && total_effects > 0
        {
            return ApplyReport {
                ok: false,
                facts: json!({
                    "applied": 0,
                    "skipped": total_effects,
                    "transaction_mode": options.mode.as_str(),
                    "total_effects": total_effects,
                }),
                logs,
                narration_hint: json!({
                    "summary": "All effects failed validation",
                    "tone_tags": ["error"],
                    "salient_entities": [],
                }),
                error_message: Some("All effects failed validation".to_string()),
            };
        }

        let mut applied_count = 0usize;
        let mut skipped_count = 0usize;
        let mut failed_count = 0usize;
        let mut scheduled_count = 0usize;

        // Log the dropped atoms in the lenient modes
        for (index, error) in &validation_errors {
            logs.push(make_log_entry(
                &effects[*index],
                Value::Null,
                Value::Null,
                false,
                Some(format!("Validation failed: {error}")),
                &meta,
                ctx.world.scene.round,
                Vec::new(),
                None,
            ));
            skipped_count += 1;
            failed_count += 1;
        }

        // Snapshot happens before any mutation from this batch
        let snapshot = options
            .transactional
            .then(|| Snapshot::capture(ctx.world, &valid_effects));

        for effect in &valid_effects {
            // Conditional effects evaluate against the live world
            if let Some(condition) = &effect.condition {
                if !self.effect_condition_holds(condition, effect, ctx.world) {
                    logs.push(make_log_entry(
                        effect,
                        Value::Null,
                        Value::Null,
                        false,
                        Some(format!("Condition not met: {condition}")),
                        &meta,
                        ctx.world.scene.round,
                        Vec::new(),
                        None,
                    ));
                    skipped_count += 1;
                    continue;
                }
            }

            // Timed scheduling instead of immediate application
            if let Some(after_rounds) = effect.after_rounds {
                if after_rounds > 0 {
                    self.schedule_timed_effect(effect, ctx.world, &meta);
                    logs.push(make_log_entry(
                        effect,
                        Value::Null,
                        Value::Null,
                        true,
                        Some(format!("Scheduled for +{after_rounds} rounds")),
                        &meta,
                        ctx.world.scene.round,
                        Vec::new(),
                        None,
                    ));
                    scheduled_count += 1;
                    continue;
                }
            }

            let entry = self.dispatch(effect, ctx, &meta);
            let graceful_skip = entry
                .error
                .as_deref()
                .is_some_and(|e| e.starts_with("Unknown effect type"));
            let entry_ok = entry.ok;
            logs.push(entry);

            if entry_ok && !graceful_skip {
                applied_count += 1;
            } else if graceful_skip {
                skipped_count += 1;
            } else {
                skipped_count += 1;
                failed_count += 1;

                if options.transactional && options.mode == TransactionMode::Strict {
                    if let Some(snapshot) = &snapshot {
                        snapshot.rollback(ctx.world);
                    }
                    let error = logs
                        .last()
                        .and_then(|l| l.error.clone())
                        .unwrap_or_else(|| "effect application failed".to_string());
                    return ApplyReport {
                        ok: false,
                        facts: json!({
                            "applied": 0,
                            "skipped": total_effects,
                            "transaction_mode": options.mode.as_str(),
                            "total_effects": total_effects,
                        }),
                        logs: Vec::new(),
                        narration_hint: json!({
                            "summary": format!("Transaction failed: {error}"),
                            "tone_tags": ["error"],
                            "salient_entities": [],
                        }),
                        error_message: Some(format!("Transaction failed: {error}")),
                    };
                }
                // Partial: no per-effect rollback in this version; continue.
                // BestEffort: swallow and continue.
            }
        }

        // Reactive pass over this batch's primary logs only; timed logs
        // already had their reactive pass at drain time
        let reactive_logs = self.process_reactive_effects(&logs[primary_start..], ctx, &meta);
        let reactive_applied = reactive_logs.iter().filter(|l| l.ok).count();
        let reactive_failed = reactive_logs.len() - reactive_applied;
        logs.extend(reactive_logs);

        // Finalize: audit log, diff summary, narration hint
        for entry in &logs {
            ctx.world.scene.add_effect_log(entry.clone());
        }
        let audit = generate_audit_trail(&logs, meta.actor.as_deref(), ctx.world.scene.round);
        ctx.world.scene.last_diff_summary = Some(audit);

        let narration_hint = generate_narration_hint(&logs);

        let mut targets: Vec<&str> = valid_effects
            .iter()
            .filter_map(|e| e.target.as_deref())
            .collect();
        targets.sort_unstable();
        targets.dedup();

        let ok = match options.mode {
            TransactionMode::Strict => failed_count == 0,
            TransactionMode::Partial => applied_count > 0 || total_effects == 0,
            TransactionMode::BestEffort => true,
        };

        ApplyReport {
            ok,
            facts: json!({
                "applied": applied_count,
                "skipped": skipped_count,
                "scheduled": scheduled_count,
                "targets": targets,
                "transaction_mode": options.mode.as_str(),
                "total_effects": total_effects,
                "reactive_applied": reactive_applied,
                "reactive_failed": reactive_failed,
                "timed_applied": timed_applied,
                "pending_effects_count": ctx.world.scene.pending_effects.len(),
            }),
            logs,
            narration_hint,
            error_message: None,
        }
    }

    fn schedule_timed_effect(&self, effect: &Effect, world: &mut GameState, meta: &ApplyMeta) {
        let trigger_round = world.scene.round + effect.after_rounds.unwrap_or(0);
        let id = format!("timed_{}_{}", meta.seed, world.scene.pending_effects.len());

        let mut stored = effect.clone();
        stored.after_rounds = None;

        world.scene.add_pending_effect(PendingEffect {
            id,
            effect: stored,
            trigger_round,
            scheduled_at: world.scene.round,
            actor: meta.actor.clone(),
            seed: Some(meta.seed),
            condition: effect.condition.clone(),
            source: effect.source.clone(),
        });
    }

    /// Dispatch every due pending effect, preserving schedule order.
    fn drain_timed_effects(&self, ctx: &mut WorldCtx<'_>) -> Vec<EffectLogEntry> {
        let current_round = ctx.world.scene.round;
        let due = ctx.world.scene.drain_due_pending_effects(current_round);

        let mut logs = Vec::new();
        for pending in due {
            let meta = ApplyMeta {
                actor: pending.actor.clone().map(|a| format!("{a}_timed")),
                seed: pending.seed.unwrap_or(0),
            };
            let mut entry = self.dispatch(&pending.effect, ctx, &meta);
            entry.timed_effect_id = Some(pending.id.clone());
            logs.push(entry);
        }
        logs
    }

    fn effect_condition_holds(&self, condition: &str, effect: &Effect, world: &GameState) -> bool {
        let Some(target_id) = &effect.target else {
            return false;
        };
        let Some(entity) = world.entities.get(target_id) else {
            return false;
        };

        let (hp_current, guard, tags, marks) = match entity.as_creature() {
            Some(creature) => (
                creature.hp.current,
                creature.guard,
                serde_json::to_value(&creature.tags).unwrap_or(Value::Null),
                serde_json::to_value(&creature.marks).unwrap_or(Value::Null),
            ),
            None => (0, 0, Value::Null, Value::Null),
        };

        let context = json!({
            "target": {
                "hp": {"current": hp_current},
                "guard": guard,
                "tags": tags,
                "marks": marks,
            },
            "scene": {
                "round": world.scene.round,
                "turn_index": world.scene.turn_index,
            },
            // Shorthand aliases
            "hp": hp_current,
            "guard": guard,
            "round": world.scene.round,
        });

        match taleforge_domain::evaluate_condition(condition, &context) {
            Ok(holds) => holds,
            Err(err) => {
                warn!(%condition, %err, "effect condition rejected, treated as false");
                false
            }
        }
    }

    /// Apply reaction rules triggered by successful logs, cascading up to
    /// depth 3, FIFO within each depth.
    fn process_reactive_effects(
        &self,
        primary_logs: &[EffectLogEntry],
        ctx: &mut WorldCtx<'_>,
        meta: &ApplyMeta,
    ) -> Vec<EffectLogEntry> {
        let reaction_meta = ApplyMeta {
            actor: meta.actor.clone().map(|a| format!("{a}_reaction")),
            seed: meta.seed,
        };

        let mut reactive_logs = Vec::new();
        let mut queue: Vec<Effect> = primary_logs
            .iter()
            .flat_map(|log| reactions::check_triggers(&self.reaction_rules, log))
            .collect();

        let max_depth = 3;
        let mut depth = 0;
        while !queue.is_empty() && depth < max_depth {
            depth += 1;
            let batch = std::mem::take(&mut queue);
            for reactive_effect in batch {
                let entry = self.dispatch(&reactive_effect, ctx, &reaction_meta);
                if entry.ok {
                    queue.extend(reactions::check_triggers(&self.reaction_rules, &entry));
                }
                reactive_logs.push(entry);
            }
        }

        reactive_logs
    }
}

/// Deep-copy of the pieces a batch can touch, for strict rollback. Captured
/// before any mutation from the batch.
struct Snapshot {
    entities: Vec<(String, taleforge_domain::Entity)>,
    clocks: Option<std::collections::BTreeMap<String, Clock>>,
    scene_tags: Option<std::collections::BTreeMap<String, String>>,
    pending_effects: Option<Vec<PendingEffect>>,
}

impl Snapshot {
    fn capture(world: &GameState, effects: &[&Effect]) -> Self {
        let mut entities = Vec::new();
        for effect in effects {
            if let Some(target) = &effect.target {
                if let Some(entity) = world.entities.get(target) {
                    if !entities.iter().any(|(id, _)| id == target) {
                        entities.push((target.clone(), entity.clone()));
                    }
                }
            }
        }

        let touches_clocks = effects.iter().any(|e| e.kind == EffectKind::Clock);
        let touches_scene = effects.iter().any(|e| {
            e.target.as_deref() == Some("scene")
                || e.kind == EffectKind::Tag
                || e.after_rounds.is_some()
        });

        Self {
            clocks: touches_clocks.then(|| world.clocks.clone()),
            scene_tags: touches_scene.then(|| world.scene.tags.clone()),
            pending_effects: touches_scene.then(|| world.scene.pending_effects.clone()),
            entities,
        }
    }

    fn rollback(&self, world: &mut GameState) {
        for (id, entity) in &self.entities {
            world.entities.insert(id.clone(), entity.clone());
        }
        if let Some(clocks) = &self.clocks {
            world.clocks = clocks.clone();
        }
        if let Some(tags) = &self.scene_tags {
            world.scene.tags = tags.clone();
        }
        if let Some(pending) = &self.pending_effects {
            world.scene.pending_effects = pending.clone();
        }
    }
}

/// Resolve a delta that may be a dice expression, seeding a fresh RNG from
/// the transaction seed so replays are exact.
pub(crate) fn resolve_delta(
    delta: Option<&Delta>,
    seed: u64,
) -> Result<(i64, Vec<taleforge_domain::DieRoll>), String> {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    match delta {
        None => Ok((0, Vec::new())),
        Some(Delta::Int(value)) => Ok((*value, Vec::new())),
        Some(Delta::Expr(expr)) => {
            let parsed = DiceExpression::parse(expr).map_err(|e| e.to_string())?;
            let mut rng = StdRng::seed_from_u64(seed);
            let roll = parsed.roll(&mut rng);
            Ok((roll.total, roll.details))
        }
    }
}

/// Build an audit log entry with impact analysis and a one-line summary.
#[allow(clippy::too_many_arguments)]
pub(crate) fn make_log_entry(
    effect: &Effect,
    before: Value,
    after: Value,
    ok: bool,
    error: Option<String>,
    meta: &ApplyMeta,
    round: u64,
    rolled: Vec<taleforge_domain::DieRoll>,
    resolved_delta: Option<i64>,
) -> EffectLogEntry {
    let impact_level = match resolved_delta {
        Some(delta) => delta.abs(),
        None if ok
            && matches!(
                effect.kind,
                EffectKind::Position | EffectKind::Mark | EffectKind::Tag
            ) =>
        {
            1
        }
        None => 0,
    };

    let summary = if ok {
        summarize_effect(effect, resolved_delta)
    } else {
        format!(
            "Failed to apply {} effect: {}",
            effect.kind.as_str(),
            error.as_deref().unwrap_or("unknown error")
        )
    };

    EffectLogEntry {
        effect: effect.clone(),
        before,
        after,
        ok,
        error,
        actor: meta.actor.clone().or_else(|| effect.source.clone()),
        seed: Some(meta.seed),
        rolled,
        impact_level,
        resolved_delta,
        timestamp: Some(now_iso()),
        round_applied: Some(round),
        summary,
        timed_effect_id: None,
    }
}

/// Short display name: last dotted segment, capitalized.
pub(crate) fn display_name(target: &str) -> String {
    let last = target.rsplit('.').next().unwrap_or(target);
    let mut chars = last.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn summarize_effect(effect: &Effect, resolved_delta: Option<i64>) -> String {
    let target_name = effect.target.as_deref().map(display_name).unwrap_or_default();
    let delta = resolved_delta.unwrap_or(0);

    match &effect.kind {
        EffectKind::Hp => match delta {
            d if d > 0 => format!("{target_name} healed {d} HP"),
            d if d < 0 => format!("{target_name} took {} damage", -d),
            _ => format!("{target_name} HP unchanged"),
        },
        EffectKind::Guard => match delta {
            d if d > 0 => format!("{target_name} gained {d} guard"),
            d if d < 0 => format!("{target_name} lost {} guard", -d),
            _ => format!("{target_name} guard unchanged"),
        },
        EffectKind::Position => format!(
            "{target_name} moved to {}",
            effect.to.as_deref().unwrap_or("unknown")
        ),
        EffectKind::Mark => match (&effect.add, &effect.remove) {
            (Some(add), _) => format!(
                "{target_name} gained {} mark",
                add.as_single().unwrap_or("a")
            ),
            (_, Some(remove)) => format!(
                "{target_name} lost {} mark",
                remove.as_single().unwrap_or("a")
            ),
            _ => format!("{target_name} marks changed"),
        },
        EffectKind::Inventory => {
            let item = effect.id.as_deref().unwrap_or("item");
            match delta {
                d if d > 0 => format!("{target_name} gained {d} {item}"),
                d if d < 0 => format!("{target_name} lost {} {item}", -d),
                _ => format!("{target_name} {item} unchanged"),
            }
        }
        EffectKind::Clock => {
            let clock = effect.id.as_deref().unwrap_or("clock");
            match delta {
                d if d > 0 => format!("{clock} advanced by {d}"),
                d if d < 0 => format!("{clock} decreased by {}", -d),
                _ => format!("{clock} unchanged"),
            }
        }
        EffectKind::Tag => match (&effect.add, &effect.remove) {
            (Some(_), _) => format!("{target_name} gained tags"),
            (_, Some(_)) => format!("{target_name} lost tags"),
            _ => format!("{target_name} tags changed"),
        },
        other => format!("{target_name} {} changed", other.as_str()),
    }
}

/// Human-readable audit trail like
/// `[Round 3] [pc.arin] Arin.hp: 18 → 13, Guard.marks: +fear`.
pub(crate) fn generate_audit_trail(
    logs: &[EffectLogEntry],
    actor: Option<&str>,
    round: u64,
) -> String {
    let mut changes: Vec<String> = Vec::new();

    for log in logs {
        if !log.ok {
            continue;
        }
        let effect = &log.effect;
        let name = effect.target.as_deref().map(display_name).unwrap_or_default();

        match &effect.kind {
            EffectKind::Hp => {
                if let (Some(before), Some(after)) =
                    (log.before.get("hp").and_then(Value::as_i64), log.after.get("hp").and_then(Value::as_i64))
                {
                    if before != after {
                        changes.push(format!("{name}.hp: {before} → {after}"));
                    }
                }
            }
            EffectKind::Position => {
                if let (Some(before), Some(after)) = (
                    log.before.get("zone").and_then(Value::as_str),
                    log.after.get("zone").and_then(Value::as_str),
                ) {
                    if before != after {
                        changes.push(format!("{name}.zone: {before} → {after}"));
                    }
                }
            }
            EffectKind::Guard => {
                if let (Some(before), Some(after)) = (
                    log.before.get("guard").and_then(Value::as_i64),
                    log.after.get("guard").and_then(Value::as_i64),
                ) {
                    if before != after {
                        changes.push(format!("{name}.guard: {before} → {after}"));
                    }
                }
            }
            EffectKind::Mark => {
                if let Some(tag) = effect.add.as_ref().and_then(taleforge_domain::TagPayload::as_single) {
                    changes.push(format!("{name}.marks: +{tag}"));
                }
                if let Some(tag) = effect.remove.as_ref().and_then(taleforge_domain::TagPayload::as_single) {
                    changes.push(format!("{name}.marks: -{tag}"));
                }
            }
            EffectKind::Inventory => {
                let item = effect.id.as_deref().unwrap_or("item");
                if let Some(delta) = log.resolved_delta {
                    if delta > 0 {
                        changes.push(format!("{name}.inventory: +{delta} {item}"));
                    } else if delta < 0 {
                        changes.push(format!("{name}.inventory: {delta} {item}"));
                    }
                }
            }
            EffectKind::Clock => {
                let clock = effect.id.as_deref().unwrap_or("clock");
                if let (Some(before), Some(after)) = (
                    log.before.get("value").and_then(Value::as_i64),
                    log.after.get("value").and_then(Value::as_i64),
                ) {
                    if before != after {
                        changes.push(format!("{clock}: {before} → {after}"));
                    }
                }
            }
            EffectKind::Tag => {
                if let Some(tag) = effect.add.as_ref().and_then(taleforge_domain::TagPayload::as_single) {
                    changes.push(format!("{name}.tags: +{tag}"));
                }
                if let Some(tag) = effect.remove.as_ref().and_then(taleforge_domain::TagPayload::as_single) {
                    changes.push(format!("{name}.tags: -{tag}"));
                }
            }
            _ => {}
        }
    }

    if changes.is_empty() {
        return "No visible changes".to_string();
    }

    let actor_prefix = actor.map(|a| format!("[{a}] ")).unwrap_or_default();
    format!("[Round {round}] {actor_prefix}{}", changes.join(", "))
}

/// Aggregate narration hint from a batch's logs.
pub(crate) fn generate_narration_hint(logs: &[EffectLogEntry]) -> Value {
    if logs.is_empty() {
        return json!({
            "summary": "No effects applied",
            "tone_tags": ["neutral"],
            "sentences_max": 1,
        });
    }

    let mut by_target: Map<String, Value> = Map::new();
    let mut summaries: Vec<String> = Vec::new();
    for log in logs {
        if !log.ok || log.summary.is_empty() {
            continue;
        }
        summaries.push(log.summary.clone());
        if let Some(target) = &log.effect.target {
            by_target.insert(target.clone(), Value::Bool(true));
        }
    }

    let summary = if summaries.is_empty() {
        "Effects applied".to_string()
    } else {
        summaries.join(". ")
    };

    let mut tone_tags = vec!["mechanical".to_string()];
    if summaries.iter().any(|s| s.contains("damage")) {
        tone_tags.push("damage".to_string());
    }
    if summaries.iter().any(|s| s.contains("healed")) {
        tone_tags.push("healing".to_string());
    }
    if summaries.iter().any(|s| s.contains("moved")) {
        tone_tags.push("movement".to_string());
    }

    json!({
        "summary": summary,
        "tone_tags": tone_tags,
        "sentences_max": 2,
        "salient_entities": by_target.keys().collect::<Vec<_>>(),
    })
}
