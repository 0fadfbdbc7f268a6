//! Metadata attached to every world object (entities, zones, clocks, scene).
//!
//! Controls visibility, knowledge tracking, and audit timestamps while
//! keeping them separate from gameplay state. The export policy here backs
//! the persistence layer's four save views.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::DomainError;

/// Who is allowed to perceive a world object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Visible to anyone in a position to see it
    #[default]
    Public,
    /// Visible only to actors listed in `known_by`
    Hidden,
    /// Never visible outside the GM view
    GmOnly,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Hidden => "hidden",
            Self::GmOnly => "gm_only",
        }
    }
}

/// Serialization policy for [`Meta::export`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// All fields (debugging / GM tools)
    Full,
    /// Public-safe fields only; `known_by` collapses to a count
    Public,
    /// Core fields only
    Minimal,
    /// Persistent fields for save files
    Save,
    /// Runtime fields for session management
    Session,
}

/// Per-object metadata record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub visibility: Visibility,
    /// Redundant flag, kept for fast checks. Must equal `visibility == GmOnly`.
    #[serde(default)]
    pub gm_only: bool,
    #[serde(default)]
    pub known_by: BTreeSet<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_changed_at: Option<String>,
    /// "manual" | "generator" | "import"
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            visibility: Visibility::Public,
            gm_only: false,
            known_by: BTreeSet::new(),
            created_at: Some(now_iso()),
            last_changed_at: None,
            source: None,
            notes: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Current UTC time as an ISO-8601 string.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Meta {
    /// Create a public Meta with a fresh creation timestamp.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a Meta with the given visibility; the gm_only flag is derived.
    pub fn with_visibility(visibility: Visibility) -> Self {
        Self {
            visibility,
            gm_only: visibility == Visibility::GmOnly,
            ..Self::default()
        }
    }

    /// Strict consistency check: `gm_only` must mirror the visibility.
    pub fn validate(&self) -> Result<(), DomainError> {
        let expected = self.visibility == Visibility::GmOnly;
        if self.gm_only != expected {
            return Err(DomainError::validation(format!(
                "inconsistent gm_only flag: visibility='{}' but gm_only={}",
                self.visibility.as_str(),
                self.gm_only
            )));
        }
        Ok(())
    }

    /// Update `last_changed_at`. Cache invalidation and the `meta.changed`
    /// event are the engine's responsibility.
    pub fn touch(&mut self) {
        self.last_changed_at = Some(now_iso());
    }

    /// Grant knowledge of this object to an actor. Returns true on change.
    pub fn add_known_by(&mut self, actor_id: &str) -> bool {
        let added = self.known_by.insert(actor_id.to_string());
        if added {
            self.touch();
        }
        added
    }

    /// Export with the given serialization policy.
    ///
    /// `include_known_by` overrides the mode default (full/save/session carry
    /// the set, public carries only `known_by_count`, minimal carries neither).
    pub fn export(&self, mode: ExportMode, include_known_by: Option<bool>) -> Value {
        let include_known_by =
            include_known_by.unwrap_or(matches!(mode, ExportMode::Full | ExportMode::Save | ExportMode::Session));

        let mut out = serde_json::Map::new();
        out.insert("visibility".into(), json!(self.visibility.as_str()));
        out.insert("gm_only".into(), json!(self.gm_only));

        if include_known_by {
            let known: Vec<&String> = self.known_by.iter().collect();
            out.insert("known_by".into(), json!(known));
        } else if mode == ExportMode::Public {
            out.insert("known_by_count".into(), json!(self.known_by.len()));
        }

        if matches!(mode, ExportMode::Full | ExportMode::Save | ExportMode::Public) {
            out.insert("created_at".into(), json!(self.created_at));
        }
        if matches!(mode, ExportMode::Full | ExportMode::Save | ExportMode::Session) {
            if let Some(changed) = &self.last_changed_at {
                out.insert("last_changed_at".into(), json!(changed));
            }
        }
        if matches!(mode, ExportMode::Full | ExportMode::Save | ExportMode::Public) {
            if let Some(source) = &self.source {
                out.insert("source".into(), json!(source));
            }
        }
        if matches!(mode, ExportMode::Full | ExportMode::Save) {
            if let Some(notes) = &self.notes {
                out.insert("notes".into(), json!(notes));
            }
            if !self.extra.is_empty() {
                out.insert("extra".into(), json!(self.extra));
            }
        }

        Value::Object(out)
    }

    /// Rebuild a Meta from exported data, filling defaults for missing
    /// fields. An inconsistent gm_only flag is auto-corrected here (strict
    /// validation applies only to freshly constructed Metas).
    pub fn from_export(data: &Value) -> Self {
        let obj = data.as_object().cloned().unwrap_or_default();

        let visibility = obj
            .get("visibility")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        let known_by = obj
            .get("known_by")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let get_str = |key: &str| {
            obj.get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        let extra = obj
            .get("extra")
            .and_then(|v| v.as_object())
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        Self {
            visibility,
            // Auto-fix: the flag always follows visibility on deserialization
            gm_only: visibility == Visibility::GmOnly,
            known_by,
            created_at: get_str("created_at").or_else(|| Some(now_iso())),
            last_changed_at: get_str("last_changed_at"),
            source: get_str("source"),
            notes: get_str("notes"),
            extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_meta_is_public_and_consistent() {
        let meta = Meta::new();
        assert_eq!(meta.visibility, Visibility::Public);
        assert!(!meta.gm_only);
        assert!(meta.created_at.is_some());
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_with_visibility_derives_gm_only() {
        let meta = Meta::with_visibility(Visibility::GmOnly);
        assert!(meta.gm_only);
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inconsistent_flag() {
        let meta = Meta {
            visibility: Visibility::Public,
            gm_only: true,
            ..Meta::default()
        };
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_touch_updates_timestamp() {
        let mut meta = Meta::new();
        assert!(meta.last_changed_at.is_none());
        meta.touch();
        assert!(meta.last_changed_at.is_some());
    }

    #[test]
    fn test_export_public_replaces_known_by_with_count() {
        let mut meta = Meta::new();
        meta.known_by.insert("pc.arin".to_string());
        meta.known_by.insert("npc.guard".to_string());

        let out = meta.export(ExportMode::Public, None);
        assert_eq!(out["known_by_count"], json!(2));
        assert!(out.get("known_by").is_none());
        assert!(out.get("notes").is_none());
    }

    #[test]
    fn test_export_minimal_is_core_fields_only() {
        let out = Meta::new().export(ExportMode::Minimal, None);
        let keys: Vec<&String> = out.as_object().map(|o| o.keys().collect()).unwrap_or_default();
        assert_eq!(keys, vec!["gm_only", "visibility"]);
    }

    #[test]
    fn test_export_save_round_trips_known_by() {
        let mut meta = Meta::new();
        meta.notes = Some("secret".to_string());
        meta.known_by.insert("pc.arin".to_string());

        let exported = meta.export(ExportMode::Save, None);
        let restored = Meta::from_export(&exported);
        assert_eq!(restored.known_by, meta.known_by);
        assert_eq!(restored.notes, meta.notes);
        assert_eq!(restored.created_at, meta.created_at);
    }

    #[test]
    fn test_from_export_auto_fixes_gm_only() {
        let data = json!({"visibility": "public", "gm_only": true});
        let meta = Meta::from_export(&data);
        assert!(!meta.gm_only);
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_from_export_fills_created_at() {
        let meta = Meta::from_export(&json!({}));
        assert!(meta.created_at.is_some());
    }
}
