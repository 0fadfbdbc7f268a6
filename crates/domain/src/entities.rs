//! Game entities: player characters, NPCs, scene objects, and items.
//!
//! The entity model is a tagged union with a `type` discriminator. Fields
//! that only make sense for living entities (hp, inventory, marks) live on
//! the creature payload and are reached by pattern matching rather than
//! attribute probing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::meta::Meta;

/// The six ability scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub strength: i64,
    pub dexterity: i64,
    pub constitution: i64,
    pub intelligence: i64,
    pub wisdom: i64,
    pub charisma: i64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

/// Health points for living entities. `current` stays in `[0, max]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hp {
    pub current: i64,
    pub max: i64,
}

impl Hp {
    pub fn new(current: i64, max: i64) -> Self {
        Self { current, max }
    }

    /// Apply a delta, clamping to `[0, max]`.
    pub fn apply(&mut self, delta: i64) {
        self.current = (self.current + delta).clamp(0, self.max);
    }
}

impl Default for Hp {
    fn default() -> Self {
        Self { current: 20, max: 20 }
    }
}

/// A named, optionally consumable bonus/penalty carried by a creature,
/// keyed in the marks map as `"{source}.{tag}"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    pub tag: String,
    pub source: String,
    #[serde(default = "default_mark_value")]
    pub value: i64,
    #[serde(default = "default_true")]
    pub consumes: bool,
    #[serde(default)]
    pub created_round: u64,
}

fn default_mark_value() -> i64 {
    1
}

fn default_true() -> bool {
    true
}

/// Mark map key: `"{source}.{tag}"`.
pub fn mark_key(source: &str, tag: &str) -> String {
    format!("{source}.{tag}")
}

/// Shared payload for PCs and NPCs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    pub id: String,
    pub name: String,
    pub current_zone: String,
    #[serde(default)]
    pub tags: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub hp: Hp,
    /// Derived: other living entities currently in view
    #[serde(default)]
    pub visible_actors: Vec<String>,
    #[serde(default = "default_true")]
    pub has_weapon: bool,
    #[serde(default)]
    pub has_talked_this_turn: bool,
    /// Multiset semantics; duplicates allowed
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub conditions: BTreeMap<String, bool>,
    /// Guard never drops below zero
    #[serde(default)]
    pub guard: i64,
    #[serde(default)]
    pub guard_duration: i64,
    #[serde(default)]
    pub style_bonus: i64,
    #[serde(default)]
    pub marks: BTreeMap<String, Mark>,
    #[serde(default)]
    pub meta: Meta,
}

impl Creature {
    pub fn new(id: impl Into<String>, name: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            current_zone: zone.into(),
            tags: BTreeMap::new(),
            stats: Stats::default(),
            hp: Hp::default(),
            visible_actors: Vec::new(),
            has_weapon: true,
            has_talked_this_turn: false,
            inventory: Vec::new(),
            conditions: BTreeMap::new(),
            guard: 0,
            guard_duration: 0,
            style_bonus: 0,
            marks: BTreeMap::new(),
            meta: Meta::new(),
        }
    }

    pub fn is_conscious(&self) -> bool {
        self.hp.current > 0
    }

    /// Count copies of an item in the inventory multiset.
    pub fn item_count(&self, item_id: &str) -> usize {
        self.inventory.iter().filter(|i| i.as_str() == item_id).count()
    }

    pub fn has_item(&self, item_id: &str) -> bool {
        self.item_count(item_id) > 0
    }

    /// Actor level from the `level` tag, defaulting to 1.
    pub fn level(&self) -> i64 {
        self.tags
            .get("level")
            .and_then(|v| v.as_i64())
            .unwrap_or(1)
    }
}

/// Environmental object like a door or chest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntity {
    pub id: String,
    pub name: String,
    pub current_zone: String,
    #[serde(default)]
    pub tags: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub interactable: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub meta: Meta,
}

/// Item lying in the world (inventory items are plain ids).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEntity {
    pub id: String,
    pub name: String,
    pub current_zone: String,
    #[serde(default)]
    pub tags: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub meta: Meta,
}

fn default_weight() -> f64 {
    1.0
}

/// Any entity in the world, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entity {
    Pc(Creature),
    Npc(Creature),
    Object(ObjectEntity),
    Item(ItemEntity),
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Self::Pc(c) | Self::Npc(c) => &c.id,
            Self::Object(o) => &o.id,
            Self::Item(i) => &i.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Pc(c) | Self::Npc(c) => &c.name,
            Self::Object(o) => &o.name,
            Self::Item(i) => &i.name,
        }
    }

    pub fn type_str(&self) -> &'static str {
        match self {
            Self::Pc(_) => "pc",
            Self::Npc(_) => "npc",
            Self::Object(_) => "object",
            Self::Item(_) => "item",
        }
    }

    pub fn current_zone(&self) -> &str {
        match self {
            Self::Pc(c) | Self::Npc(c) => &c.current_zone,
            Self::Object(o) => &o.current_zone,
            Self::Item(i) => &i.current_zone,
        }
    }

    pub fn set_current_zone(&mut self, zone: impl Into<String>) {
        let zone = zone.into();
        match self {
            Self::Pc(c) | Self::Npc(c) => c.current_zone = zone,
            Self::Object(o) => o.current_zone = zone,
            Self::Item(i) => i.current_zone = zone,
        }
    }

    pub fn tags(&self) -> &BTreeMap<String, serde_json::Value> {
        match self {
            Self::Pc(c) | Self::Npc(c) => &c.tags,
            Self::Object(o) => &o.tags,
            Self::Item(i) => &i.tags,
        }
    }

    pub fn tags_mut(&mut self) -> &mut BTreeMap<String, serde_json::Value> {
        match self {
            Self::Pc(c) | Self::Npc(c) => &mut c.tags,
            Self::Object(o) => &mut o.tags,
            Self::Item(i) => &mut i.tags,
        }
    }

    pub fn meta(&self) -> &Meta {
        match self {
            Self::Pc(c) | Self::Npc(c) => &c.meta,
            Self::Object(o) => &o.meta,
            Self::Item(i) => &i.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        match self {
            Self::Pc(c) | Self::Npc(c) => &mut c.meta,
            Self::Object(o) => &mut o.meta,
            Self::Item(i) => &mut i.meta,
        }
    }

    /// True for PCs and NPCs.
    pub fn is_creature(&self) -> bool {
        matches!(self, Self::Pc(_) | Self::Npc(_))
    }

    pub fn as_creature(&self) -> Option<&Creature> {
        match self {
            Self::Pc(c) | Self::Npc(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_creature_mut(&mut self) -> Option<&mut Creature> {
        match self {
            Self::Pc(c) | Self::Npc(c) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_discriminator_round_trip() {
        let pc = Entity::Pc(Creature::new("pc.arin", "Arin", "courtyard"));
        let value = serde_json::to_value(&pc).expect("serialize");
        assert_eq!(value["type"], json!("pc"));

        let back: Entity = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, pc);
    }

    #[test]
    fn test_hp_apply_clamps() {
        let mut hp = Hp::new(5, 20);
        hp.apply(-10);
        assert_eq!(hp.current, 0);
        hp.apply(100);
        assert_eq!(hp.current, 20);
    }

    #[test]
    fn test_inventory_multiset_count() {
        let mut creature = Creature::new("pc.arin", "Arin", "hall");
        creature.inventory.push("torch".to_string());
        creature.inventory.push("torch".to_string());
        assert_eq!(creature.item_count("torch"), 2);
        assert!(creature.has_item("torch"));
        assert!(!creature.has_item("rope"));
    }

    #[test]
    fn test_level_from_tags() {
        let mut creature = Creature::new("pc.arin", "Arin", "hall");
        assert_eq!(creature.level(), 1);
        creature.tags.insert("level".to_string(), json!(4));
        assert_eq!(creature.level(), 4);
    }

    #[test]
    fn test_mark_key_format() {
        assert_eq!(mark_key("pc.arin", "favor"), "pc.arin.favor");
    }

    #[test]
    fn test_object_defaults() {
        let value = json!({
            "type": "object",
            "id": "obj.door",
            "name": "Oak Door",
            "current_zone": "hall"
        });
        let entity: Entity = serde_json::from_value(value).expect("deserialize");
        match entity {
            Entity::Object(o) => {
                assert!(o.interactable);
                assert!(!o.locked);
            }
            other => panic!("expected object, got {other:?}"),
        }
    }
}
