//! Player input with basic analysis.

use serde::{Deserialize, Serialize};

/// Verbs that suggest the player wants to act rather than chat.
const ACTION_VERBS: &[&str] = &[
    "move", "go", "walk", "run", "sneak", "travel", "attack", "hit", "strike", "fight", "combat",
    "talk", "speak", "say", "tell", "ask", "whisper", "use", "cast", "drink", "activate", "throw",
    "look", "examine", "search", "investigate",
];

/// A raw player utterance attributed to an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub actor_id: String,
}

impl Utterance {
    pub fn new(text: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actor_id: actor_id.into(),
        }
    }

    /// Whether the text contains an actionable verb.
    pub fn has_actionable_verb(&self) -> bool {
        let lower = self.text.to_lowercase();
        ACTION_VERBS.iter().any(|verb| lower.contains(verb))
    }

    /// Case-insensitive containment check used for zone/target matching.
    pub fn mentions(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        self.text.to_lowercase().contains(&needle.to_lowercase())
    }
}
