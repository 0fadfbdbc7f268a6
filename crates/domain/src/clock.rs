//! Progress clocks.
//!
//! A clock tracks an integer value inside `[minimum, maximum]` with audit
//! fields for who moved it last and whether it filled this turn. The legacy
//! dict form (`max`/`min` key style) is absorbed at the serde boundary via
//! aliases; everything past that point is the typed record.

use serde::{Deserialize, Serialize};

use crate::meta::Meta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clock {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: i64,
    #[serde(default = "default_maximum", alias = "max")]
    pub maximum: i64,
    #[serde(default, alias = "min")]
    pub minimum: i64,
    /// Who created or drives this clock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, alias = "created_turn")]
    pub created_round: Option<u64>,
    #[serde(default, alias = "last_modified_turn")]
    pub last_modified_round: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
    #[serde(default)]
    pub filled_this_turn: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled_by: Option<String>,
    #[serde(default)]
    pub meta: Meta,
}

fn default_maximum() -> i64 {
    4
}

impl Clock {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: name.into(),
            id,
            value: 0,
            maximum: default_maximum(),
            minimum: 0,
            source: None,
            created_round: None,
            last_modified_round: None,
            last_modified_by: None,
            filled_this_turn: false,
            filled_by: None,
            meta: Meta::new(),
        }
    }

    /// Autovivified clock for clock effects on unknown ids: range [0, 10].
    pub fn autovivified(id: impl Into<String>, source: Option<&str>, round: u64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            value: 0,
            maximum: 10,
            minimum: 0,
            source: source.map(str::to_string),
            created_round: Some(round),
            last_modified_round: Some(round),
            last_modified_by: source.map(str::to_string),
            filled_this_turn: false,
            filled_by: None,
            meta: Meta::new(),
        }
    }

    pub fn is_filled(&self) -> bool {
        self.value >= self.maximum
    }

    /// Apply a delta, clamping to `[minimum, maximum]` and tracking fill
    /// transitions: crossing into filled records `filled_this_turn` and
    /// `filled_by`; dropping out of filled clears them; staying filled
    /// preserves the original fill record.
    pub fn apply(&mut self, delta: i64, source: Option<&str>, round: u64) -> (i64, i64) {
        let old_value = self.value;
        let was_filled = self.is_filled();

        self.value = (self.value + delta).clamp(self.minimum, self.maximum);
        self.last_modified_round = Some(round);
        self.last_modified_by = source.map(str::to_string);

        let is_filled = self.is_filled();
        if !was_filled && is_filled {
            self.filled_this_turn = true;
            self.filled_by = source.map(str::to_string);
        } else if was_filled && !is_filled {
            self.filled_this_turn = false;
            self.filled_by = None;
        }

        (old_value, self.value)
    }
}
