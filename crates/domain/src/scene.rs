//! Scene state: turn order, environmental tags, pending choices, the
//! pending-effects queue, and the effect audit log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dice::DieRoll;
use crate::effect::Effect;
use crate::meta::Meta;

/// One option of a pending clarification choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub label: String,
    pub tool_id: String,
    /// Arguments merged over the tool's suggested args on consumption
    #[serde(default)]
    pub args_patch: Value,
}

/// Short-lived disambiguation contract created by `ask_clarifying` and
/// consumed (or expired) on a following utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChoice {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub question: String,
    pub options: Vec<ChoiceOption>,
    pub reason: String,
    /// Round after which the choice no longer matches
    pub expires_round: u64,
    #[serde(default)]
    pub created_turn: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_note: Option<String>,
}

impl PendingChoice {
    pub fn is_expired(&self, current_round: u64) -> bool {
        current_round > self.expires_round
    }
}

/// Timed effect waiting in the scene's FIFO queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEffect {
    pub id: String,
    pub effect: Effect,
    /// Round when this effect activates
    pub trigger_round: u64,
    /// Round when this was scheduled
    pub scheduled_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Structured audit entry for one applied effect: before/after state, dice
/// detail, and a one-line human summary. Entries are never mutated after
/// being appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EffectLogEntry {
    pub effect: Effect,
    pub before: Value,
    pub after: Value,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Every constituent die rolled while resolving this effect
    pub rolled: Vec<DieRoll>,
    /// Magnitude of the change (|resolved delta|, or 1 for binary changes)
    pub impact_level: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_delta: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_applied: Option<u64>,
    pub summary: String,
    /// Set when this entry came from a scheduled (timed) effect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timed_effect_id: Option<String>,
}

fn default_base_dc() -> i64 {
    12
}

fn default_round() -> u64 {
    1
}

fn default_scene_id() -> String {
    "default_scene".to_string()
}

fn default_scene_tags() -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    tags.insert("alert".to_string(), "normal".to_string()); // sleepy | normal | wary | alarmed
    tags.insert("lighting".to_string(), "normal".to_string()); // dim | normal | bright
    tags.insert("noise".to_string(), "normal".to_string()); // quiet | normal | loud
    tags.insert("cover".to_string(), "some".to_string()); // none | some | good
    tags
}

/// Scene tracking for turn order and environmental conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scene {
    pub id: String,
    pub turn_order: Vec<String>,
    pub turn_index: usize,
    pub round: u64,
    pub base_dc: i64,
    pub tags: BTreeMap<String, String>,
    pub objective: BTreeMap<String, Value>,
    pub pending_choice: Option<PendingChoice>,
    /// Max 3 clarifications per turn; the 4th falls back to narrate_only
    pub choice_count_this_turn: u32,
    /// Append-only audit trail of applied effects
    pub last_effect_log: Vec<EffectLogEntry>,
    /// Human-readable audit line for the most recent batch
    pub last_diff_summary: Option<String>,
    /// FIFO queue of timed effects awaiting execution
    pub pending_effects: Vec<PendingEffect>,
    pub meta: Meta,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            id: default_scene_id(),
            turn_order: Vec::new(),
            turn_index: 0,
            round: default_round(),
            base_dc: default_base_dc(),
            tags: default_scene_tags(),
            objective: BTreeMap::new(),
            pending_choice: None,
            choice_count_this_turn: 0,
            last_effect_log: Vec::new(),
            last_diff_summary: None,
            pending_effects: Vec::new(),
            meta: Meta::new(),
        }
    }
}

impl Scene {
    /// Append a timed effect; the queue stays in insertion order.
    pub fn add_pending_effect(&mut self, pending: PendingEffect) {
        self.pending_effects.push(pending);
    }

    /// Remove and return every pending effect whose `trigger_round` is due,
    /// regardless of position, preserving insertion order for both the
    /// drained and the remaining effects.
    pub fn drain_due_pending_effects(&mut self, current_round: u64) -> Vec<PendingEffect> {
        let mut triggered = Vec::new();
        let mut remaining = Vec::new();

        for pending in self.pending_effects.drain(..) {
            if pending.trigger_round <= current_round {
                triggered.push(pending);
            } else {
                remaining.push(pending);
            }
        }

        self.pending_effects = remaining;
        triggered
    }

    /// Append to the audit trail.
    pub fn add_effect_log(&mut self, entry: EffectLogEntry) {
        self.last_effect_log.push(entry);
    }

    /// The numeric alert level derived from the alert tag (sleepy=0,
    /// normal=1, wary=2, alarmed=3). Also honors a raw `alert_level` tag.
    pub fn alert_level(&self) -> i64 {
        if let Some(raw) = self.tags.get("alert_level") {
            if let Ok(level) = raw.parse::<i64>() {
                return level;
            }
        }
        match self.tags.get("alert").map(String::as_str) {
            Some("sleepy") => 0,
            Some("wary") => 2,
            Some("alarmed") => 3,
            _ => 1,
        }
    }
}
