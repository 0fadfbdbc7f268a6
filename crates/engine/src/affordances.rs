//! Affordance filter: which tools apply right now, with enriched hints.
//!
//! Computes the candidate tool list for the planner by filtering on
//! preconditions (escape hatches always pass), enriching each tool's
//! suggested arguments from the utterance and world, and scoring a
//! confidence per tool. The filter never fails: a hook error logs a warning
//! and skips that tool.

use serde::Serialize;
use serde_json::{json, Map, Value};
use taleforge_domain::{GameState, Utterance};
use tracing::warn;

use crate::catalog::{catalog, confidence_keywords, Tool, ToolId};

/// A tool candidate with enriched argument hints.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCandidate {
    pub id: ToolId,
    pub description: String,
    pub args_hint: Value,
    /// How confident we are this tool applies, in [0, 1]
    pub confidence: f64,
}

/// Compute applicable tool candidates, sorted by descending confidence.
/// Escape hatches (`narrate_only`, `ask_clarifying`) are always included.
pub fn get_candidates(world: &GameState, utterance: &Utterance) -> Vec<ToolCandidate> {
    let mut candidates = Vec::new();

    for tool in catalog() {
        let applicable = tool.id.is_escape_hatch() || (tool.precond)(world, utterance);
        if !applicable {
            continue;
        }

        let base_args = (tool.suggest_args)(world, utterance);
        let args_hint = match enrich_arguments(tool, base_args, world, utterance) {
            Ok(enriched) => enriched,
            Err(err) => {
                warn!(tool = tool.id.as_str(), %err, "affordance enrichment failed, tool skipped");
                continue;
            }
        };

        candidates.push(ToolCandidate {
            id: tool.id,
            description: tool.description.to_string(),
            args_hint,
            confidence: calculate_confidence(tool.id, utterance),
        });
    }

    // Highest confidence first; stable sort keeps catalog order for ties
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates
}

fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn enrich_arguments(
    tool: &Tool,
    base_args: Value,
    world: &GameState,
    utterance: &Utterance,
) -> Result<Value, String> {
    let mut args = as_map(base_args);

    match tool.id {
        ToolId::AskRoll => enrich_ask_roll(&mut args, world),
        ToolId::Move => enrich_move(&mut args, world, utterance),
        ToolId::Attack => enrich_attack(&mut args, world, utterance),
        ToolId::Talk => enrich_talk(&mut args, world, utterance),
        ToolId::AskClarifying => enrich_clarifying(&mut args, world, utterance),
        _ => {}
    }

    Ok(Value::Object(args))
}

/// Context-aware DC adjustment: a sleepy mark eases stealth, open ground
/// hampers it.
fn enrich_ask_roll(args: &mut Map<String, Value>, world: &GameState) {
    let Some(base_dc) = args.get("dc_hint").and_then(Value::as_i64) else {
        return;
    };
    let is_sneak = args.get("action").and_then(Value::as_str) == Some("sneak");
    if !is_sneak {
        return;
    }

    let target_is_sleepy_guard = args
        .get("target")
        .and_then(Value::as_str)
        .is_some_and(|target| {
            target.contains("guard")
                && world.scene.tags.get("alert").map(String::as_str) == Some("sleepy")
        });
    if target_is_sleepy_guard {
        args.insert("dc_hint".into(), json!((base_dc - 3).max(8)));
        args.insert("dc_reason".into(), json!("sleepy guard"));
        return;
    }

    let in_courtyard = world
        .current_creature()
        .is_some_and(|actor| actor.current_zone.contains("courtyard"));
    if in_courtyard {
        args.insert("dc_hint".into(), json!((base_dc + 2).min(18)));
        args.insert("dc_reason".into(), json!("open courtyard"));
    }
}

fn enrich_move(args: &mut Map<String, Value>, world: &GameState, utterance: &Utterance) {
    let lower = utterance.text.to_lowercase();
    let style = if ["sneak", "quietly", "stealth"].iter().any(|w| lower.contains(w)) {
        "sneak"
    } else if ["run", "quickly", "fast", "charge"].iter().any(|w| lower.contains(w)) {
        "run"
    } else {
        "walk"
    };
    args.insert("movement_style".into(), json!(style));

    if let Some(to) = args.get("to").and_then(Value::as_str) {
        if let Some(zone) = world.zones.get(to) {
            args.insert("zone_name".into(), json!(zone.name));
            args.insert("zone_desc".into(), json!(zone.description));
        }
    }
}

fn enrich_attack(args: &mut Map<String, Value>, world: &GameState, utterance: &Utterance) {
    let lower = utterance.text.to_lowercase();
    for weapon in ["sword", "bow", "dagger", "axe", "spear"] {
        if lower.contains(weapon) {
            args.insert("weapon".into(), json!(weapon));
            break;
        }
    }

    if let Some(target) = args.get("target").and_then(Value::as_str) {
        if let Some(creature) = world.actor(target) {
            args.insert("target_name".into(), json!(creature.name));
            args.insert("target_zone".into(), json!(creature.current_zone));
        }
    }
}

/// Pull a spoken message out of quotes or a say/tell/ask prefix.
fn enrich_talk(args: &mut Map<String, Value>, world: &GameState, utterance: &Utterance) {
    let text = &utterance.text;

    let quoted = regex_lite::Regex::new(r#""([^"]+)"|'([^']+)'"#)
        .ok()
        .and_then(|re| {
            re.captures(text).and_then(|caps| {
                caps.get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str().to_string())
            })
        });

    let message = quoted.or_else(|| {
        let lower = text.to_lowercase();
        ["say ", "tell ", "ask "].iter().find_map(|prefix| {
            lower
                .find(prefix)
                .map(|idx| text[idx + prefix.len()..].trim().to_string())
                .filter(|m| !m.is_empty())
        })
    });

    if let Some(message) = message {
        args.insert("message".into(), json!(message));
    }

    if let Some(target) = args.get("target").and_then(Value::as_str) {
        if let Some(creature) = world.actor(target) {
            args.insert("target_name".into(), json!(creature.name));
            let relationship = if creature.name.to_lowercase().contains("guard") {
                "authority_figure"
            } else {
                "stranger"
            };
            args.insert("relationship".into(), json!(relationship));
        }
    }
}

/// Generate a plausible clarifying question from what the actor can see and
/// where they can go.
fn enrich_clarifying(args: &mut Map<String, Value>, world: &GameState, utterance: &Utterance) {
    let lower = utterance.text.to_lowercase();
    let Some(actor) = world.current_creature() else {
        return;
    };
    let visible = &actor.visible_actors;
    let zone = world.zones.get(&actor.current_zone);

    let vague_reference = ["it", "that", "thing", "there"]
        .iter()
        .any(|w| lower.split_whitespace().any(|word| word == *w));

    if vague_reference {
        if let Some(first) = visible.first().and_then(|id| world.actor(id)) {
            args.insert("question".into(), json!(format!("Do you mean the {}?", first.name)));
            return;
        }
        if let Some(zone) = zone {
            args.insert(
                "question".into(),
                json!(format!("What specifically in the {}?", zone.name)),
            );
            return;
        }
    }

    if (lower.contains("go") || lower.contains("move")) && zone.is_some() {
        let adjacent_names: Vec<String> = zone
            .map(|z| {
                z.adjacent_zones()
                    .iter()
                    .filter_map(|id| world.zones.get(*id).map(|z| z.name.clone()))
                    .collect()
            })
            .unwrap_or_default();
        if adjacent_names.len() > 1 {
            args.insert(
                "question".into(),
                json!(format!("Where to? You can go to: {}", adjacent_names.join(", "))),
            );
            return;
        }
    }

    if (lower.contains("attack") || lower.contains("approach")) && !visible.is_empty() {
        if let Some(first) = visible.first().and_then(|id| world.actor(id)) {
            args.insert(
                "question".into(),
                json!(format!(
                    "How do you want to approach the {}? Stealthily, directly, or diplomatically?",
                    first.name
                )),
            );
        }
    }
}

/// Escape hatches sit at 0.3; everything else starts at 0.5 and gains 0.2
/// per keyword match, clamped to [0, 1].
fn calculate_confidence(tool_id: ToolId, utterance: &Utterance) -> f64 {
    if tool_id.is_escape_hatch() {
        return 0.3;
    }

    let lower = utterance.text.to_lowercase();
    let matches = confidence_keywords()
        .get(&tool_id)
        .map(|keywords| keywords.iter().filter(|k| lower.contains(*k)).count())
        .unwrap_or(0);

    (0.5 + 0.2 * matches as f64).clamp(0.0, 1.0)
}
