//! Multi-file persistence.
//!
//! Saves live in a directory per save name: `public.json` (role-redacted),
//! `gm.json` (complete state), optional `session.json`, and a
//! `manifest.json` with save metadata. Corrupted JSON and missing required
//! keys fail loudly with distinct error categories.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{json, Map, Value};
use taleforge_domain::{meta::now_iso, Clock, Entity, GameState, Meta, Scene, Zone};
use thiserror::Error;
use tracing::info;

use crate::exporter;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Save '{0}' does not exist")]
    Missing(String),
    #[error("File type '{file_type}' not found in save '{save_name}'")]
    FileMissing {
        save_name: String,
        file_type: String,
    },
    #[error("Save file is corrupted: {0}")]
    Corrupted(String),
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Which file of a save directory to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFileType {
    Public,
    Gm,
    Session,
}

impl SaveFileType {
    fn file_name(&self) -> &'static str {
        match self {
            Self::Public => "public.json",
            Self::Gm => "gm.json",
            Self::Session => "session.json",
        }
    }

    fn stem(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Gm => "gm",
            Self::Session => "session",
        }
    }
}

/// Options for [`PersistenceManager::save_game_state`].
#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub save_public: bool,
    pub save_gm: bool,
    pub save_session: bool,
    pub create_backup: bool,
    pub metadata: Map<String, Value>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            save_public: true,
            save_gm: true,
            save_session: false,
            create_backup: true,
            metadata: Map::new(),
        }
    }
}

/// Manages the save directory layout.
pub struct PersistenceManager {
    base_path: PathBuf,
}

impl PersistenceManager {
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// Write a save directory. Returns the map of file stems to paths.
    pub fn save_game_state(
        &self,
        world: &GameState,
        save_name: &str,
        options: &SaveOptions,
    ) -> Result<Map<String, Value>, PersistenceError> {
        let save_dir = self.base_path.join(save_name);
        fs::create_dir_all(&save_dir)?;

        let timestamp = now_iso();
        let mut save_metadata = Map::new();
        save_metadata.insert("save_name".into(), json!(save_name));
        save_metadata.insert("timestamp".into(), json!(timestamp));
        save_metadata.insert("version".into(), json!("1.0"));
        for (key, value) in &options.metadata {
            save_metadata.insert(key.clone(), value.clone());
        }

        let mut saved_files = Map::new();

        if options.save_public {
            let payload = json!({
                "metadata": save_metadata,
                "game_state": exporter::to_public_format(world, None),
            });
            let path = save_dir.join(SaveFileType::Public.file_name());
            write_json(&path, &payload, options.create_backup)?;
            saved_files.insert("public".into(), json!(path.display().to_string()));
        }

        if options.save_gm {
            let payload = json!({
                "metadata": save_metadata,
                "game_state": exporter::to_save_format(world),
            });
            let path = save_dir.join(SaveFileType::Gm.file_name());
            write_json(&path, &payload, options.create_backup)?;
            saved_files.insert("gm".into(), json!(path.display().to_string()));
        }

        if options.save_session {
            let payload = json!({
                "metadata": save_metadata,
                "game_state": exporter::to_session_format(world, None),
                "session_info": {
                    "last_updated": timestamp,
                    "entity_count": world.entities.len(),
                    "zone_count": world.zones.len(),
                    "clock_count": world.clocks.len(),
                },
            });
            let path = save_dir.join(SaveFileType::Session.file_name());
            write_json(&path, &payload, options.create_backup)?;
            saved_files.insert("session".into(), json!(path.display().to_string()));
        }

        let manifest = json!({
            "save_name": save_name,
            "created": save_metadata["timestamp"],
            "files": saved_files.keys().collect::<Vec<_>>(),
            "metadata": save_metadata,
        });
        let manifest_path = save_dir.join("manifest.json");
        write_json(&manifest_path, &manifest, false)?;
        saved_files.insert("manifest".into(), json!(manifest_path.display().to_string()));

        info!(save_name, files = saved_files.len(), "saved game state");
        Ok(saved_files)
    }

    /// Load and reconstruct a world from a save.
    pub fn load_game_state(
        &self,
        save_name: &str,
        file_type: SaveFileType,
    ) -> Result<GameState, PersistenceError> {
        let save_dir = self.base_path.join(save_name);
        if !save_dir.exists() {
            return Err(PersistenceError::Missing(save_name.to_string()));
        }

        let path = save_dir.join(file_type.file_name());
        if !path.exists() {
            return Err(PersistenceError::FileMissing {
                save_name: save_name.to_string(),
                file_type: file_type.stem().to_string(),
            });
        }

        let raw = fs::read_to_string(&path)?;
        let data: Value = serde_json::from_str(&raw)
            .map_err(|e| PersistenceError::Corrupted(e.to_string()))?;

        validate_save_data(&data)?;
        reconstruct_game_state(&data["game_state"])
    }

    /// List saves with their manifests, newest first.
    pub fn list_saves(&self) -> Vec<Value> {
        let mut saves = Vec::new();
        let Ok(entries) = fs::read_dir(&self.base_path) else {
            return saves;
        };

        for entry in entries.flatten() {
            let manifest_path = entry.path().join("manifest.json");
            let Ok(raw) = fs::read_to_string(&manifest_path) else {
                continue;
            };
            let Ok(manifest) = serde_json::from_str::<Value>(&raw) else {
                continue;
            };
            saves.push(json!({
                "name": manifest.get("save_name"),
                "created": manifest.get("created"),
                "files": manifest.get("files"),
                "metadata": manifest.get("metadata"),
            }));
        }

        saves.sort_by(|a, b| {
            let a_created = a["created"].as_str().unwrap_or("");
            let b_created = b["created"].as_str().unwrap_or("");
            b_created.cmp(a_created)
        });
        saves
    }

    /// Delete a save directory. Requires an explicit confirmation flag.
    pub fn delete_save(&self, save_name: &str, confirm: bool) -> Result<(), PersistenceError> {
        if !confirm {
            return Err(PersistenceError::Corrupted(
                "delete_save requires confirm=true for safety".to_string(),
            ));
        }
        let save_dir = self.base_path.join(save_name);
        if !save_dir.exists() {
            return Err(PersistenceError::Missing(save_name.to_string()));
        }
        fs::remove_dir_all(save_dir)?;
        Ok(())
    }
}

fn write_json(path: &Path, data: &Value, create_backup: bool) -> Result<(), PersistenceError> {
    if create_backup && path.exists() {
        let backup_name = format!(
            "{}.bak.{}.json",
            path.file_stem().and_then(|s| s.to_str()).unwrap_or("save"),
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let backup_path = path.with_file_name(backup_name);
        fs::rename(path, backup_path)?;
    }

    let serialized = serde_json::to_string_pretty(data)
        .map_err(|e| PersistenceError::Corrupted(e.to_string()))?;
    fs::write(path, serialized)?;
    Ok(())
}

fn validate_save_data(data: &Value) -> Result<(), PersistenceError> {
    let Some(object) = data.as_object() else {
        return Err(PersistenceError::Corrupted(
            "Save data must be an object".to_string(),
        ));
    };
    if !object.contains_key("metadata") {
        return Err(PersistenceError::Corrupted(
            "Save data missing metadata".to_string(),
        ));
    }
    let Some(game_state) = object.get("game_state").and_then(Value::as_object) else {
        return Err(PersistenceError::Corrupted(
            "Save data missing game_state".to_string(),
        ));
    };

    for key in ["entities", "zones", "scene"] {
        if !game_state.contains_key(key) {
            return Err(PersistenceError::Corrupted(format!(
                "Game state missing required key: {key}"
            )));
        }
    }
    Ok(())
}

/// Strip redaction artifacts and normalize meta before typed parsing.
fn clean_record(record: &Value) -> Value {
    let Some(object) = record.as_object() else {
        return record.clone();
    };
    let mut cleaned: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| key.as_str() != "is_visible")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if let Some(meta) = cleaned.get("meta") {
        let normalized = Meta::from_export(meta);
        cleaned.insert(
            "meta".into(),
            serde_json::to_value(normalized).unwrap_or(Value::Null),
        );
    }
    Value::Object(cleaned)
}

fn reconstruct_game_state(data: &Value) -> Result<GameState, PersistenceError> {
    let mut world = GameState::default();

    if let Some(entities) = data.get("entities").and_then(Value::as_object) {
        for (entity_id, record) in entities {
            let entity: Entity = serde_json::from_value(clean_record(record))
                .map_err(|e| PersistenceError::Corrupted(format!("entity {entity_id}: {e}")))?;
            world.entities.insert(entity_id.clone(), entity);
        }
    }

    if let Some(zones) = data.get("zones").and_then(Value::as_object) {
        for (zone_id, record) in zones {
            // Derived legacy fields are re-computed, never loaded
            let mut cleaned = clean_record(record);
            if let Some(object) = cleaned.as_object_mut() {
                object.remove("adjacent_zones");
                object.remove("blocked_exits");
                object.remove("entities");
            }
            let zone: Zone = serde_json::from_value(cleaned)
                .map_err(|e| PersistenceError::Corrupted(format!("zone {zone_id}: {e}")))?;
            world.zones.insert(zone_id.clone(), zone);
        }
    }

    if let Some(clocks) = data.get("clocks").and_then(Value::as_object) {
        for (clock_id, record) in clocks {
            // Redacted clock shells (value nulled out) cannot be restored
            if record.get("value").is_some_and(Value::is_null) {
                continue;
            }
            let mut cleaned = clean_record(record);
            if let Some(object) = cleaned.as_object_mut() {
                object.entry("id").or_insert(json!(clock_id));
            }
            let clock: Clock = serde_json::from_value(cleaned)
                .map_err(|e| PersistenceError::Corrupted(format!("clock {clock_id}: {e}")))?;
            world.clocks.insert(clock_id.clone(), clock);
        }
    }

    let scene_value = data.get("scene").cloned().unwrap_or(json!({}));
    let scene: Scene = serde_json::from_value(clean_record(&scene_value))
        .map_err(|e| PersistenceError::Corrupted(format!("scene: {e}")))?;
    world.scene = scene;

    world.current_actor = data
        .get("current_actor")
        .and_then(Value::as_str)
        .map(str::to_string);
    world.pending_action = data
        .get("pending_action")
        .and_then(Value::as_str)
        .map(str::to_string);
    if let Some(flags) = data.get("turn_flags").and_then(Value::as_object) {
        world.turn_flags = flags.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    }

    Ok(world)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taleforge_domain::{Creature, Exit, Visibility};

    fn sample_world() -> GameState {
        let mut world = GameState::default();
        let mut hall = Zone::new("hall", "Hall");
        hall.add_exit(Exit::new("cellar"));
        hall.discover_by("pc.arin");
        world.zones.insert("hall".to_string(), hall);
        world.zones.insert("cellar".to_string(), Zone::new("cellar", "Cellar"));

        let mut arin = Creature::new("pc.arin", "Arin", "hall");
        arin.inventory.push("torch".to_string());
        arin.meta.notes = Some("heir to the keep".to_string());
        world.entities.insert("pc.arin".to_string(), Entity::Pc(arin));

        let mut ghost = Creature::new("npc.ghost", "Ghost", "cellar");
        ghost.meta = Meta::with_visibility(Visibility::GmOnly);
        world.entities.insert("npc.ghost".to_string(), Entity::Npc(ghost));

        let mut alarm = Clock::new("alarm", "Alarm");
        alarm.value = 2;
        alarm.maximum = 6;
        world.clocks.insert("alarm".to_string(), alarm);

        world.current_actor = Some("pc.arin".to_string());
        world.scene.round = 3;
        world
    }

    #[test]
    fn test_save_creates_expected_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = PersistenceManager::new(dir.path()).expect("manager");
        let world = sample_world();

        let files = manager
            .save_game_state(&world, "chapter_one", &SaveOptions::default())
            .expect("save");
        assert!(files.contains_key("public"));
        assert!(files.contains_key("gm"));
        assert!(files.contains_key("manifest"));
        assert!(dir.path().join("chapter_one/gm.json").exists());
        assert!(dir.path().join("chapter_one/public.json").exists());
        assert!(dir.path().join("chapter_one/manifest.json").exists());
    }

    #[test]
    fn test_gm_round_trip_preserves_world() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = PersistenceManager::new(dir.path()).expect("manager");
        let world = sample_world();

        manager
            .save_game_state(&world, "chapter_one", &SaveOptions::default())
            .expect("save");
        let loaded = manager
            .load_game_state("chapter_one", SaveFileType::Gm)
            .expect("load");

        assert_eq!(loaded.scene.round, 3);
        assert_eq!(loaded.current_actor.as_deref(), Some("pc.arin"));
        assert_eq!(loaded.entities.len(), 2);
        let arin = loaded.actor("pc.arin").expect("arin");
        assert_eq!(arin.inventory, vec!["torch".to_string()]);
        assert_eq!(arin.meta.notes.as_deref(), Some("heir to the keep"));
        assert!(loaded.zones["hall"].is_discovered_by("pc.arin"));
        assert_eq!(loaded.clocks["alarm"].value, 2);
        assert_eq!(loaded.clocks["alarm"].maximum, 6);
    }

    #[test]
    fn test_public_load_excludes_gm_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = PersistenceManager::new(dir.path()).expect("manager");
        let world = sample_world();

        manager
            .save_game_state(&world, "chapter_one", &SaveOptions::default())
            .expect("save");
        let loaded = manager
            .load_game_state("chapter_one", SaveFileType::Public)
            .expect("load");
        assert!(loaded.entities.contains_key("pc.arin"));
        assert!(!loaded.entities.contains_key("npc.ghost"));
    }

    #[test]
    fn test_missing_save_and_file_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = PersistenceManager::new(dir.path()).expect("manager");

        assert!(matches!(
            manager.load_game_state("nope", SaveFileType::Gm),
            Err(PersistenceError::Missing(_))
        ));

        let world = sample_world();
        let options = SaveOptions {
            save_session: false,
            ..SaveOptions::default()
        };
        manager
            .save_game_state(&world, "chapter_one", &options)
            .expect("save");
        assert!(matches!(
            manager.load_game_state("chapter_one", SaveFileType::Session),
            Err(PersistenceError::FileMissing { .. })
        ));
    }

    #[test]
    fn test_corrupted_json_fails_loudly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = PersistenceManager::new(dir.path()).expect("manager");
        fs::create_dir_all(dir.path().join("broken")).expect("mkdir");
        fs::write(dir.path().join("broken/gm.json"), "{not json").expect("write");

        assert!(matches!(
            manager.load_game_state("broken", SaveFileType::Gm),
            Err(PersistenceError::Corrupted(_))
        ));
    }

    #[test]
    fn test_missing_required_keys_fail() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = PersistenceManager::new(dir.path()).expect("manager");
        fs::create_dir_all(dir.path().join("partial")).expect("mkdir");
        fs::write(
            dir.path().join("partial/gm.json"),
            serde_json::to_string(&json!({
                "metadata": {},
                "game_state": {"entities": {}, "zones": {}},
            }))
            .expect("serialize"),
        )
        .expect("write");

        let err = manager
            .load_game_state("partial", SaveFileType::Gm)
            .expect_err("should fail");
        assert!(err.to_string().contains("scene"));
    }

    #[test]
    fn test_backup_created_on_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = PersistenceManager::new(dir.path()).expect("manager");
        let world = sample_world();

        manager
            .save_game_state(&world, "chapter_one", &SaveOptions::default())
            .expect("first save");
        manager
            .save_game_state(&world, "chapter_one", &SaveOptions::default())
            .expect("second save");

        let backups: Vec<_> = fs::read_dir(dir.path().join("chapter_one"))
            .expect("read dir")
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().contains(".bak."))
            .collect();
        assert!(!backups.is_empty());
    }

    #[test]
    fn test_list_and_delete_saves() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = PersistenceManager::new(dir.path()).expect("manager");
        let world = sample_world();

        manager
            .save_game_state(&world, "chapter_one", &SaveOptions::default())
            .expect("save");
        let saves = manager.list_saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0]["name"], json!("chapter_one"));

        assert!(manager.delete_save("chapter_one", false).is_err());
        manager.delete_save("chapter_one", true).expect("delete");
        assert!(manager.list_saves().is_empty());
    }
}
