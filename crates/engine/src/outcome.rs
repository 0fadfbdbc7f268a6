//! Outcome resolution: bridges bare dice results and storytelling.
//!
//! Takes a mechanical `ToolResult`, detects its outcome domain (stealth /
//! social / combat), looks up a consequence in data tables keyed
//! `(domain, outcome)`, substitutes `{actor}`/`{target}`/`{zone}`
//! placeholders in the consequence's effect templates, and enriches the
//! result with a `consequence` line and extra tone tags.

use std::collections::BTreeMap;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use taleforge_domain::{Effect, GameState};
use tracing::{debug, warn};

use crate::validator::ToolResult;

/// One consequence variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consequence {
    pub description: String,
    #[serde(default)]
    pub effects: Vec<Value>,
    #[serde(default)]
    pub tone_tags: Vec<String>,
}

/// outcome band → consequence variants.
pub type BandTable = BTreeMap<String, Vec<Consequence>>;

/// Consequence tables per domain.
#[derive(Debug, Clone, Default)]
pub struct OutcomeResolver {
    tables: BTreeMap<String, BandTable>,
}

impl OutcomeResolver {
    /// Resolver with the builtin consequence tables.
    pub fn with_defaults() -> Self {
        Self {
            tables: builtin_tables(),
        }
    }

    /// Load per-domain tables (`stealth.yaml`, `social.yaml`, `combat.yaml`
    /// — YAML or JSON) from a directory, falling back to the builtins for
    /// any domain that fails to load.
    pub fn load(tables_dir: &Path) -> Self {
        let mut tables = builtin_tables();

        for domain in ["stealth", "social", "combat"] {
            let base = tables_dir.join(domain);
            let loaded = config::Config::builder()
                .add_source(config::File::from(base.clone()).required(false))
                .build()
                .ok()
                .and_then(|settings| settings.try_deserialize::<BandTable>().ok());

            match loaded {
                Some(table) if !table.is_empty() => {
                    debug!(domain, "loaded outcome table");
                    tables.insert(domain.to_string(), table);
                }
                _ => {
                    warn!(domain, dir = %tables_dir.display(),
                        "outcome table missing or unreadable, using builtin");
                }
            }
        }

        Self { tables }
    }

    /// Enrich a ToolResult with a consequence. Idempotent: a result already
    /// marked `consequences_resolved` passes through untouched.
    pub fn resolve_outcome(&self, mut result: ToolResult, world: &GameState) -> ToolResult {
        if result.narration_hint.get("consequences_resolved") == Some(&json!(true)) {
            return result;
        }
        let Some(outcome) = result
            .narration_hint
            .get("outcome")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            return result;
        };
        let Some(domain) = detect_domain(&result) else {
            return result;
        };

        let variants = self
            .tables
            .get(&domain)
            .and_then(|table| table.get(&outcome))
            .filter(|v| !v.is_empty());
        let Some(variants) = variants else {
            debug!(%domain, %outcome, "no consequence found");
            return result;
        };

        // Seeded variant choice keyed off the roll so replays match
        let pick_seed = result
            .narration_hint
            .get("dice")
            .and_then(|d| d.get("total"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let index = StdRng::seed_from_u64(pick_seed).gen_range(0..variants.len());
        let chosen = &variants[index];

        // Secondary effects with placeholder substitution
        for template in &chosen.effects {
            let substituted = substitute_placeholders(template, &result, world);
            match serde_json::from_value::<Effect>(substituted) {
                Ok(effect) => result.effects.push(effect),
                Err(err) => warn!(%err, "unparseable consequence effect skipped"),
            }
        }

        if let Value::Object(hint) = &mut result.narration_hint {
            hint.insert("consequence".into(), json!(chosen.description));
            let tags = hint
                .entry("tone_tags")
                .or_insert_with(|| json!([]));
            if let Value::Array(tags) = tags {
                tags.extend(chosen.tone_tags.iter().map(|t| json!(t)));
            }
            hint.insert("consequences_resolved".into(), json!(true));
        }

        debug!(%domain, %outcome, consequence = %chosen.description, "resolved outcome");
        result
    }
}

/// Map a tool result to its outcome domain.
fn detect_domain(result: &ToolResult) -> Option<String> {
    let action = result.args.get("action").and_then(Value::as_str).unwrap_or("");
    let method = result.args.get("method").and_then(Value::as_str).unwrap_or("");

    let domain = match result.tool_id.as_str() {
        "ask_roll" => match action {
            "sneak" => "stealth",
            "persuade" => "social",
            "athletics" | "shove" => "combat",
            _ => return None,
        },
        "attack" => "combat",
        "talk" => "social",
        "move" if method == "sneak" => "stealth",
        _ => return None,
    };
    Some(domain.to_string())
}

/// Replace `{actor}`, `{target}`, and `{zone}` tokens in every string leaf.
fn substitute_placeholders(template: &Value, result: &ToolResult, world: &GameState) -> Value {
    let actor = result
        .args
        .get("actor")
        .and_then(Value::as_str)
        .unwrap_or("");
    let target = result
        .args
        .get("target")
        .and_then(Value::as_str)
        .unwrap_or("");
    let zone = world
        .entities
        .get(actor)
        .map(|e| e.current_zone())
        .unwrap_or("");

    fn walk(value: &Value, actor: &str, target: &str, zone: &str) -> Value {
        match value {
            Value::String(s) => Value::String(
                s.replace("{actor}", actor)
                    .replace("{target}", target)
                    .replace("{zone}", zone),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), walk(v, actor, target, zone)))
                    .collect(),
            ),
            Value::Array(list) => {
                Value::Array(list.iter().map(|v| walk(v, actor, target, zone)).collect())
            }
            other => other.clone(),
        }
    }

    walk(template, actor, target, zone)
}

fn builtin_tables() -> BTreeMap<String, BandTable> {
    fn entry(description: &str, effects: Value, tone_tags: &[&str]) -> Consequence {
        Consequence {
            description: description.to_string(),
            effects: effects.as_array().cloned().unwrap_or_default(),
            tone_tags: tone_tags.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    let mut tables = BTreeMap::new();

    let mut stealth: BandTable = BTreeMap::new();
    stealth.insert(
        "crit_success".to_string(),
        vec![entry(
            "Not even the dust stirs as {actor} slips past.",
            json!([]),
            &["graceful", "quiet"],
        )],
    );
    stealth.insert(
        "success".to_string(),
        vec![entry(
            "{actor} keeps to the shadows and passes unseen.",
            json!([]),
            &["quiet"],
        )],
    );
    stealth.insert(
        "partial".to_string(),
        vec![entry(
            "A floorboard creaks under {actor}; somewhere, a head turns.",
            json!([{"type": "noise", "zone": "{zone}", "intensity": "normal", "source": "{actor}"}]),
            &["tense"],
        )],
    );
    stealth.insert(
        "fail".to_string(),
        vec![entry(
            "{actor} stumbles into the open, drawing every nearby eye.",
            json!([{"type": "noise", "zone": "{zone}", "intensity": "loud", "source": "{actor}"}]),
            &["alarming"],
        )],
    );
    tables.insert("stealth".to_string(), stealth);

    let mut social: BandTable = BTreeMap::new();
    social.insert(
        "crit_success".to_string(),
        vec![entry(
            "{target} warms to {actor} completely.",
            json!([]),
            &["warm"],
        )],
    );
    social.insert(
        "success".to_string(),
        vec![entry("{target} nods along, half convinced.", json!([]), &["warm"])],
    );
    social.insert(
        "partial".to_string(),
        vec![entry(
            "{target} wavers, but suspicion lingers.",
            json!([]),
            &["uncertain"],
        )],
    );
    social.insert(
        "fail".to_string(),
        vec![entry(
            "{target}'s expression hardens against {actor}.",
            json!([]),
            &["cold"],
        )],
    );
    tables.insert("social".to_string(), social);

    let mut combat: BandTable = BTreeMap::new();
    combat.insert(
        "crit_success".to_string(),
        vec![entry(
            "The blow lands with brutal precision.",
            json!([]),
            &["brutal"],
        )],
    );
    combat.insert(
        "success".to_string(),
        vec![entry("Steel finds its mark.", json!([]), &["sharp"])],
    );
    combat.insert(
        "partial".to_string(),
        vec![entry(
            "A glancing hit; the exchange continues.",
            json!([]),
            &["gritty"],
        )],
    );
    combat.insert(
        "fail".to_string(),
        vec![entry(
            "The swing goes wide, leaving {actor} exposed.",
            json!([{"type": "guard", "target": "{actor}", "delta": -1}]),
            &["desperate"],
        )],
    );
    tables.insert("combat".to_string(), combat);

    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ToolId;

    fn combat_result(outcome: &str) -> ToolResult {
        ToolResult::success(
            ToolId::Attack,
            json!({"actor": "pc.arin", "target": "npc.guard"}),
            json!({"outcome": outcome}),
            Vec::new(),
            json!({"summary": "swing", "outcome": outcome, "tone_tags": ["violent"], "dice": {"total": 14}}),
        )
    }

    #[test]
    fn test_adds_consequence_and_marks_resolved() {
        let resolver = OutcomeResolver::with_defaults();
        let world = GameState::default();

        let result = resolver.resolve_outcome(combat_result("success"), &world);
        assert_eq!(
            result.narration_hint["consequence"],
            json!("Steel finds its mark.")
        );
        assert_eq!(result.narration_hint["consequences_resolved"], json!(true));
        let tags = result.narration_hint["tone_tags"].as_array().expect("tags");
        assert!(tags.contains(&json!("sharp")));
    }

    #[test]
    fn test_idempotent() {
        let resolver = OutcomeResolver::with_defaults();
        let world = GameState::default();

        let once = resolver.resolve_outcome(combat_result("success"), &world);
        let tags_after_once = once.narration_hint["tone_tags"].as_array().expect("tags").len();
        let twice = resolver.resolve_outcome(once, &world);
        assert_eq!(
            twice.narration_hint["tone_tags"].as_array().expect("tags").len(),
            tags_after_once
        );
    }

    #[test]
    fn test_placeholder_substitution_in_effects() {
        let resolver = OutcomeResolver::with_defaults();
        let world = GameState::default();

        let result = resolver.resolve_outcome(combat_result("fail"), &world);
        assert_eq!(result.effects.len(), 1);
        assert_eq!(result.effects[0].target.as_deref(), Some("pc.arin"));
    }

    #[test]
    fn test_unrelated_tool_untouched() {
        let resolver = OutcomeResolver::with_defaults();
        let world = GameState::default();

        let result = ToolResult::success(
            ToolId::GetInfo,
            json!({}),
            json!({}),
            Vec::new(),
            json!({"summary": "facts"}),
        );
        let resolved = resolver.resolve_outcome(result, &world);
        assert!(resolved.narration_hint.get("consequence").is_none());
    }

    #[test]
    fn test_move_sneak_maps_to_stealth() {
        let result = ToolResult::success(
            ToolId::Move,
            json!({"actor": "pc.arin", "method": "sneak"}),
            json!({}),
            Vec::new(),
            json!({"outcome": "partial"}),
        );
        assert_eq!(detect_domain(&result).as_deref(), Some("stealth"));
    }
}
