//! Social outcome tables.
//!
//! Talk resolves through a data-driven table: intent × outcome band →
//! effect templates. Templates support guard deltas with a floor, marks,
//! and clocks with an id suffix expanded to `{target}.{suffix}`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

/// One effect template from the social table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialEffectTemplate {
    #[serde(rename = "type")]
    pub kind: String,
    /// mark: tag to add
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// mark strength / clock step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    /// guard/clock delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    /// guard floor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,
    /// clock: expanded to "{target}.{id_suffix}"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_suffix: Option<String>,
    /// clock maximum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IntentOutcomes {
    #[serde(default)]
    pub outcomes: BTreeMap<String, OutcomeEffects>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OutcomeEffects {
    #[serde(default)]
    pub effects: Vec<SocialEffectTemplate>,
}

/// The loaded social outcomes configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialOutcomes {
    #[serde(default)]
    pub intents: BTreeMap<String, IntentOutcomes>,
}

impl SocialOutcomes {
    /// Load from a JSON file, falling back to the builtin table.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Self>(&raw) {
                Ok(outcomes) => {
                    info!(intents = outcomes.intents.len(), path = %path.display(),
                        "loaded social outcomes");
                    outcomes
                }
                Err(err) => {
                    warn!(%err, path = %path.display(), "social outcomes unparseable, using builtins");
                    Self::builtin()
                }
            },
            Err(_) => {
                warn!(path = %path.display(), "social outcomes not found, using builtins");
                Self::builtin()
            }
        }
    }

    /// Templates for an intent and outcome band, empty when unknown.
    pub fn templates(&self, intent: &str, outcome: &str) -> &[SocialEffectTemplate] {
        self.intents
            .get(intent)
            .and_then(|i| i.outcomes.get(outcome))
            .map(|o| o.effects.as_slice())
            .unwrap_or(&[])
    }

    /// The builtin table covering every talk intent.
    pub fn builtin() -> Self {
        fn intent(
            crit_mark: &str,
            partial_suffix: &str,
            partial_max: i64,
        ) -> serde_json::Value {
            json!({
                "outcomes": {
                    "crit_success": {
                        "effects": [{"type": "mark", "tag": crit_mark, "value": 1}]
                    },
                    "success": {
                        "effects": [{"type": "guard", "delta": -1, "min_value": 0}]
                    },
                    "partial": {
                        "effects": [{
                            "type": "clock",
                            "id_suffix": partial_suffix,
                            "delta": 1,
                            "max": partial_max,
                        }]
                    },
                    "fail": {"effects": [{"type": "guard", "delta": 1}]},
                }
            })
        }

        let raw = json!({
            "intents": {
                "persuade": intent("favor", "persuade", 3),
                "intimidate": intent("fear", "fear", 4),
                "deceive": {
                    "outcomes": {
                        "crit_success": {
                            "effects": [{"type": "mark", "tag": "deception", "value": 1}]
                        },
                        "success": {
                            "effects": [{"type": "clock", "id_suffix": "lie", "delta": 1, "max": 2}]
                        },
                        "partial": {"effects": [{"type": "guard", "delta": 1}]},
                        "fail": {"effects": [{"type": "guard", "delta": 1}]},
                    }
                },
                "charm": intent("charm", "charm", 3),
                "comfort": intent("comfort", "comfort", 3),
                "request": intent("favor", "request", 3),
                "distract": intent("distraction", "distraction", 3),
            }
        });

        serde_json::from_value(raw).unwrap_or(Self {
            intents: BTreeMap::new(),
        })
    }
}
