//! Reactive rules: effects that trigger more effects.
//!
//! Rules match on the kind of a successfully applied effect plus a
//! condition over `{effect, before, after}`. Outputs are applied to the
//! triggering effect's target and may cascade further, bounded by the
//! engine's depth cap.

use serde_json::{json, Value};
use taleforge_domain::{evaluate_condition, Delta, Effect, EffectKind, EffectLogEntry, TagPayload};
use tracing::warn;

/// Template for an effect produced by a triggered rule.
#[derive(Debug, Clone)]
pub struct ReactionTemplate {
    pub kind: EffectKind,
    pub delta: Option<i64>,
    pub add: Option<String>,
    pub remove: Option<String>,
    pub source: &'static str,
}

/// One reactive rule.
#[derive(Debug, Clone)]
pub struct ReactionRule {
    pub name: &'static str,
    pub trigger_kind: EffectKind,
    pub condition: &'static str,
    pub effects: Vec<ReactionTemplate>,
}

/// The baseline rule set.
///
/// Position changes also trigger a reaction conceptually, but visibility
/// recomputation happens inline in the position handler rather than through
/// effect templates.
pub(super) fn baseline_rules() -> Vec<ReactionRule> {
    vec![
        ReactionRule {
            name: "hp_zero",
            trigger_kind: EffectKind::Hp,
            condition: "after.hp.current <= 0",
            effects: vec![ReactionTemplate {
                kind: EffectKind::Tag,
                delta: None,
                add: Some("unconscious".to_string()),
                remove: None,
                source: "hp_reaction",
            }],
        },
        ReactionRule {
            name: "hp_critical",
            trigger_kind: EffectKind::Hp,
            condition: "after.hp.current <= 3 and after.hp.current > 0 and before.hp.current > 3",
            effects: vec![ReactionTemplate {
                kind: EffectKind::Tag,
                delta: None,
                add: Some("bloodied".to_string()),
                remove: None,
                source: "hp_reaction",
            }],
        },
        ReactionRule {
            name: "fear_guard_penalty",
            trigger_kind: EffectKind::Mark,
            condition: "effect.add == 'fear'",
            effects: vec![ReactionTemplate {
                kind: EffectKind::Guard,
                delta: Some(-1),
                add: None,
                remove: None,
                source: "fear_reaction",
            }],
        },
        ReactionRule {
            name: "confidence_guard_bonus",
            trigger_kind: EffectKind::Mark,
            condition: "effect.add == 'confidence'",
            effects: vec![ReactionTemplate {
                kind: EffectKind::Guard,
                delta: Some(1),
                add: None,
                remove: None,
                source: "confidence_reaction",
            }],
        },
    ]
}

fn hp_from(value: &Value) -> Value {
    // Log before/after carry `{"hp": n}`; the condition context wants
    // `{"hp": {"current": n}}`.
    let n = value.get("hp").and_then(Value::as_i64).unwrap_or(0);
    json!({"hp": {"current": n}})
}

/// Reaction effects triggered by one successful log entry, in rule
/// registration order. Entries carrying an error note (scheduled or
/// gracefully skipped effects) applied nothing, so they trigger nothing.
pub(super) fn check_triggers(rules: &[ReactionRule], log: &EffectLogEntry) -> Vec<Effect> {
    if !log.ok || log.error.is_some() {
        return Vec::new();
    }

    let effect_add = log
        .effect
        .add
        .as_ref()
        .and_then(TagPayload::as_single)
        .map(str::to_string);

    let context = json!({
        "effect": {"add": effect_add},
        "before": hp_from(&log.before),
        "after": hp_from(&log.after),
    });

    let mut produced = Vec::new();
    for rule in rules {
        if rule.trigger_kind != log.effect.kind {
            continue;
        }

        let holds = match evaluate_condition(rule.condition, &context) {
            Ok(holds) => holds,
            Err(err) => {
                warn!(rule = rule.name, %err, "reaction condition rejected");
                continue;
            }
        };
        if !holds {
            continue;
        }

        for template in &rule.effects {
            produced.push(Effect {
                kind: template.kind.clone(),
                target: log.effect.target.clone(),
                source: Some(template.source.to_string()),
                cause: Some(format!("reaction_{}", rule.name)),
                note: Some(format!("Triggered by {} effect", log.effect.kind.as_str())),
                delta: template.delta.map(Delta::Int),
                add: template.add.clone().map(TagPayload::One),
                remove: template.remove.clone().map(TagPayload::One),
                ..Effect::default()
            });
        }
    }

    produced
}
