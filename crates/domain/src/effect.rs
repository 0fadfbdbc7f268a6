//! Effect atoms - the only vocabulary for world mutation.
//!
//! Tools emit effect atoms; the engine's dispatch table applies them. Kinds
//! are an open set: unknown kinds deserialize to `Other` so future atoms can
//! flow through saves and transactions, and the dispatcher skips them with a
//! log instead of failing the batch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminator for effect atoms. Serialized as its snake_case token;
/// unknown tokens round-trip through [`EffectKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EffectKind {
    Hp,
    Guard,
    Position,
    Mark,
    Inventory,
    Clock,
    Tag,
    Resource,
    Noise,
    Meta,
    Other(String),
}

impl EffectKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Hp => "hp",
            Self::Guard => "guard",
            Self::Position => "position",
            Self::Mark => "mark",
            Self::Inventory => "inventory",
            Self::Clock => "clock",
            Self::Tag => "tag",
            Self::Resource => "resource",
            Self::Noise => "noise",
            Self::Meta => "meta",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for EffectKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "hp" => Self::Hp,
            "guard" => Self::Guard,
            "position" => Self::Position,
            "mark" => Self::Mark,
            "inventory" => Self::Inventory,
            "clock" => Self::Clock,
            "tag" => Self::Tag,
            "resource" => Self::Resource,
            "noise" => Self::Noise,
            "meta" => Self::Meta,
            _ => Self::Other(s),
        }
    }
}

impl From<EffectKind> for String {
    fn from(kind: EffectKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A delta that is either a flat integer or a dice expression to roll at
/// application time ("2d4+2", "-1d6").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Delta {
    Int(i64),
    Expr(String),
}

impl Delta {
    /// The flat value, if this delta needs no dice.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Expr(_) => None,
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, Self::Expr(_))
    }
}

/// Payload of tag/mark add/remove fields: a single token, a list of tokens,
/// a key→value map, or the legacy boolean form of mark removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagPayload {
    One(String),
    Many(Vec<String>),
    Map(BTreeMap<String, Value>),
    Flag(bool),
}

impl TagPayload {
    /// The single token, when the payload is one string.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            Self::One(s) => Some(s),
            _ => None,
        }
    }
}

/// Noise intensity for passive noise atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseLevel {
    Quiet,
    Normal,
    Loud,
    VeryLoud,
}

impl NoiseLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Normal => "normal",
            Self::Loud => "loud",
            Self::VeryLoud => "very_loud",
        }
    }
}

/// A typed, minimal, independently dispatchable state mutation.
///
/// The common metadata block (`target`, `source`, `cause`, `condition`,
/// `after_rounds`, `note`) applies to every kind; the remaining fields are
/// interpreted per kind as described in the effect engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Effect {
    #[serde(rename = "type")]
    pub kind: EffectKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Restricted condition expression gating application
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Schedule this many rounds into the future instead of applying now
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_rounds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    // Per-kind fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    /// position: destination zone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// position: origin zone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// clock/inventory/resource: the clock, item, or resource id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// mark/tag: what to add
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add: Option<TagPayload>,
    /// mark/tag: what to remove (mark also accepts remove=true + add tag)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove: Option<TagPayload>,
    /// mark strength / tag value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    /// mark: whether attacking consumes it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumes: Option<bool>,
    /// noise: zone where the noise happens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    /// noise: loudness
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<NoiseLevel>,
    /// clock: maximum for autovivified clocks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

impl Default for EffectKind {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl Effect {
    pub fn of_kind(kind: EffectKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// HP change on a living target.
    pub fn hp(target: impl Into<String>, delta: i64) -> Self {
        Self {
            kind: EffectKind::Hp,
            target: Some(target.into()),
            delta: Some(Delta::Int(delta)),
            ..Self::default()
        }
    }

    /// HP change rolled from a dice expression.
    pub fn hp_expr(target: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            kind: EffectKind::Hp,
            target: Some(target.into()),
            delta: Some(Delta::Expr(expr.into())),
            ..Self::default()
        }
    }

    /// Guard delta (floored at zero by the handler).
    pub fn guard(target: impl Into<String>, delta: i64) -> Self {
        Self {
            kind: EffectKind::Guard,
            target: Some(target.into()),
            delta: Some(Delta::Int(delta)),
            ..Self::default()
        }
    }

    /// Move an entity to a zone.
    pub fn position(target: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            kind: EffectKind::Position,
            target: Some(target.into()),
            to: Some(to.into()),
            ..Self::default()
        }
    }

    /// Advance or rewind a clock.
    pub fn clock(id: impl Into<String>, delta: i64) -> Self {
        Self {
            kind: EffectKind::Clock,
            id: Some(id.into()),
            delta: Some(Delta::Int(delta)),
            ..Self::default()
        }
    }

    /// Add a keyed mark to a creature.
    pub fn mark_add(target: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            kind: EffectKind::Mark,
            target: Some(target.into()),
            add: Some(TagPayload::One(tag.into())),
            ..Self::default()
        }
    }

    /// Inventory change: delta copies of an item.
    pub fn inventory(target: impl Into<String>, item: impl Into<String>, delta: i64) -> Self {
        Self {
            kind: EffectKind::Inventory,
            target: Some(target.into()),
            id: Some(item.into()),
            delta: Some(Delta::Int(delta)),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn after_rounds(mut self, rounds: u64) -> Self {
        self.after_rounds = Some(rounds);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trips_through_strings() {
        let effect = Effect::hp("pc.arin", -3);
        let value = serde_json::to_value(&effect).expect("serialize");
        assert_eq!(value["type"], json!("hp"));
        assert_eq!(value["delta"], json!(-3));

        let back: Effect = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back.kind, EffectKind::Hp);
    }

    #[test]
    fn test_unknown_kind_is_preserved() {
        let value = json!({"type": "weather", "target": "scene"});
        let effect: Effect = serde_json::from_value(value).expect("deserialize");
        assert_eq!(effect.kind, EffectKind::Other("weather".to_string()));
        assert_eq!(effect.kind.as_str(), "weather");

        let out = serde_json::to_value(&effect).expect("serialize");
        assert_eq!(out["type"], json!("weather"));
    }

    #[test]
    fn test_delta_accepts_int_or_expression() {
        let effect: Effect =
            serde_json::from_value(json!({"type": "hp", "target": "pc.arin", "delta": "2d4+2"}))
                .expect("deserialize");
        assert!(matches!(effect.delta, Some(Delta::Expr(ref e)) if e == "2d4+2"));

        let effect: Effect =
            serde_json::from_value(json!({"type": "hp", "target": "pc.arin", "delta": -5}))
                .expect("deserialize");
        assert_eq!(effect.delta.and_then(|d| d.as_int()), Some(-5));
    }

    #[test]
    fn test_tag_payload_shapes() {
        let effect: Effect = serde_json::from_value(
            json!({"type": "tag", "target": "scene", "add": {"noise": "loud"}}),
        )
        .expect("deserialize");
        assert!(matches!(effect.add, Some(TagPayload::Map(_))));

        let effect: Effect = serde_json::from_value(
            json!({"type": "tag", "target": "scene", "remove": ["noise", "cover"]}),
        )
        .expect("deserialize");
        assert!(matches!(effect.remove, Some(TagPayload::Many(ref v)) if v.len() == 2));
    }

    #[test]
    fn test_builders_set_metadata() {
        let effect = Effect::clock("scene.alarm", -1)
            .with_source("pc.arin")
            .with_cause("sneak")
            .after_rounds(2);
        assert_eq!(effect.source.as_deref(), Some("pc.arin"));
        assert_eq!(effect.after_rounds, Some(2));
    }
}
