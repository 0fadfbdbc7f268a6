//! Item registry.
//!
//! Item definitions live in a JSON data file; a small builtin set keeps the
//! engine usable when no file is present. Definitions carry effect
//! templates (with dice-expression deltas), allowed usage methods, and an
//! optional delegation to another tool.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use taleforge_domain::Effect;
use tracing::{info, warn};

/// Delegation of an item use to another tool (attack/talk/move).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDelegation {
    pub tool: String,
    /// Merged over the delegated tool's args
    #[serde(default)]
    pub args_override: Value,
}

/// Clock side effect of reading an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemClockEffect {
    pub id: String,
    pub delta: i64,
    #[serde(default = "default_clock_max")]
    pub max: i64,
}

fn default_clock_max() -> i64 {
    10
}

fn default_item_charges() -> i64 {
    1
}

fn default_usage_methods() -> Vec<String> {
    vec!["consume".to_string()]
}

/// One item definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_usage_methods")]
    pub usage_methods: Vec<String>,
    /// -1 means unlimited uses
    #[serde(default = "default_item_charges")]
    pub charges: i64,
    /// Effect templates; `target` is filled at use time
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation: Option<ItemDelegation>,
    /// Lore revealed when the item is read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_effect: Option<ItemClockEffect>,
}

impl ItemDefinition {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn allows_method(&self, method: &str) -> bool {
        self.usage_methods.iter().any(|m| m == method)
    }
}

/// Lookup table of item definitions.
#[derive(Debug, Clone)]
pub struct ItemRegistry {
    items: BTreeMap<String, ItemDefinition>,
}

impl ItemRegistry {
    /// Load from a JSON file mapping item id to definition; falls back to
    /// the builtin set when the file is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, ItemDefinition>>(&raw) {
                Ok(items) => {
                    info!(count = items.len(), path = %path.display(), "loaded item registry");
                    Self { items }
                }
                Err(err) => {
                    warn!(%err, path = %path.display(), "item registry unparseable, using builtins");
                    Self::builtin()
                }
            },
            Err(_) => {
                warn!(path = %path.display(), "item registry not found, using builtins");
                Self::builtin()
            }
        }
    }

    /// The builtin fallback registry.
    pub fn builtin() -> Self {
        let raw = json!({
            "healing_potion": {
                "id": "healing_potion",
                "name": "Healing Potion",
                "description": "Restores health when drunk.",
                "tags": ["consumable", "healing", "magical"],
                "usage_methods": ["consume"],
                "charges": 1,
                "effects": [{"type": "hp", "delta": "2d4+2"}],
            },
            "poison_vial": {
                "id": "poison_vial",
                "name": "Poison Vial",
                "description": "Deals poison damage to target.",
                "tags": ["consumable", "poison", "dangerous"],
                "usage_methods": ["consume"],
                "charges": 1,
                "effects": [{"type": "hp", "delta": "-1d6"}],
            },
            "rope": {
                "id": "rope",
                "name": "Rope",
                "description": "Provides advantage on climbing checks.",
                "tags": ["consumable", "mundane", "tool"],
                "usage_methods": ["consume"],
                "charges": 1,
                "effects": [{"type": "mark", "add": "climbing_advantage"}],
            },
            "torch": {
                "id": "torch",
                "name": "Torch",
                "description": "Lights up dim places while held.",
                "tags": ["reusable", "illumination"],
                "usage_methods": ["activate"],
                "charges": -1,
                "effects": [{"type": "tag", "target": "scene", "add": {"lighting": "bright"}}],
            },
            "scroll_of_flames": {
                "id": "scroll_of_flames",
                "name": "Scroll of Flames",
                "description": "A crackling scroll that hurls fire at a foe.",
                "tags": ["consumable", "magical", "scroll", "fire"],
                "usage_methods": ["read"],
                "charges": 1,
                "effects": [],
                "delegation": {
                    "tool": "attack",
                    "args_override": {
                        "weapon": "scroll_of_flames",
                        "damage_expr": "2d6",
                        "attack_mode": "scroll"
                    }
                },
            },
        });

        let items = serde_json::from_value(raw)
            .unwrap_or_else(|_| BTreeMap::new());
        Self { items }
    }

    pub fn get(&self, item_id: &str) -> Option<&ItemDefinition> {
        self.items.get(item_id)
    }

    /// Definition for an item, or a minimal mundane definition for ids the
    /// registry does not know (keeps unknown inventory usable).
    pub fn get_or_default(&self, item_id: &str) -> ItemDefinition {
        self.items.get(item_id).cloned().unwrap_or_else(|| ItemDefinition {
            id: item_id.to_string(),
            name: item_id.replace('_', " "),
            description: String::new(),
            tags: vec!["mundane".to_string()],
            usage_methods: default_usage_methods(),
            charges: 1,
            effects: Vec::new(),
            delegation: None,
            knowledge: None,
            clock_effect: None,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taleforge_domain::{Delta, EffectKind};

    #[test]
    fn test_builtin_registry_has_core_items() {
        let registry = ItemRegistry::builtin();
        assert!(registry.get("healing_potion").is_some());
        assert!(registry.get("poison_vial").is_some());
        assert!(registry.get("rope").is_some());
    }

    #[test]
    fn test_healing_potion_template() {
        let registry = ItemRegistry::builtin();
        let potion = registry.get("healing_potion").expect("potion");
        assert!(potion.allows_method("consume"));
        assert!(!potion.allows_method("equip"));
        assert_eq!(potion.effects.len(), 1);
        assert_eq!(potion.effects[0].kind, EffectKind::Hp);
        assert!(matches!(
            potion.effects[0].delta,
            Some(Delta::Expr(ref e)) if e == "2d4+2"
        ));
    }

    #[test]
    fn test_scroll_delegation() {
        let registry = ItemRegistry::builtin();
        let scroll = registry.get("scroll_of_flames").expect("scroll");
        let delegation = scroll.delegation.as_ref().expect("delegation");
        assert_eq!(delegation.tool, "attack");
        assert_eq!(delegation.args_override["attack_mode"], json!("scroll"));
    }

    #[test]
    fn test_unknown_item_gets_mundane_default() {
        let registry = ItemRegistry::builtin();
        let mystery = registry.get_or_default("rusty_spoon");
        assert_eq!(mystery.name, "rusty spoon");
        assert!(mystery.has_tag("mundane"));
        assert!(mystery.allows_method("consume"));
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let registry = ItemRegistry::load(Path::new("/definitely/not/here/items.json"));
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("items.json");
        std::fs::write(
            &path,
            serde_json::to_string(&json!({
                "lantern": {
                    "id": "lantern",
                    "name": "Lantern",
                    "usage_methods": ["activate"],
                    "charges": -1
                }
            }))
            .expect("serialize"),
        )
        .expect("write");

        let registry = ItemRegistry::load(&path);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("lantern").is_some());
    }
}
