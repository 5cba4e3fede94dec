use crate::error::{Result, ViewerError};
use crate::model::{Preset, PresetItem};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name given to the throwaway preset handed to the scraper.
pub const TEMP_PRESET_NAME: &str = "临时预设";

pub trait PresetStore {
    fn save(&self, name: &str, items: &[PresetItem]) -> Result<()>;
    fn list(&self) -> Result<Vec<Preset>>;
}

fn new_preset(name: &str, items: &[PresetItem]) -> Result<Preset> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ViewerError::PresetSave("preset name is empty".to_string()));
    }
    Ok(Preset {
        name: name.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        items: items.to_vec(),
    })
}

/// `preset_<epoch-millis>.json` files shared with the scraper.
pub struct FilePresetStore {
    dir: PathBuf,
}

#[derive(Serialize)]
struct TempPresetItem<'a> {
    name: &'a str,
    category: &'a str,
    original_name: &'a str,
    is_display_name: bool,
}

#[derive(Serialize)]
struct TempPreset<'a> {
    name: &'a str,
    timestamp: String,
    items: Vec<TempPresetItem<'a>>,
}

impl FilePresetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)?;
        }
        Ok(())
    }

    /// Writes `temp_preset_<epoch-millis>.json` for one scraper run and
    /// returns its absolute path.
    pub fn write_temp_preset(&self, items: &[PresetItem]) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self
            .dir
            .join(format!("temp_preset_{}.json", Utc::now().timestamp_millis()));

        let preset = TempPreset {
            name: TEMP_PRESET_NAME,
            timestamp: Utc::now().to_rfc3339(),
            items: items
                .iter()
                .map(|item| TempPresetItem {
                    name: &item.name,
                    category: &item.category,
                    original_name: &item.name,
                    is_display_name: true,
                })
                .collect(),
        };
        std::fs::write(&path, serde_json::to_string_pretty(&preset)?)?;
        info!(path = %path.display(), items = items.len(), "wrote temporary preset");

        Ok(std::path::absolute(&path).unwrap_or(path))
    }
}

impl PresetStore for FilePresetStore {
    fn save(&self, name: &str, items: &[PresetItem]) -> Result<()> {
        let preset = new_preset(name, items)?;
        let write = || -> Result<PathBuf> {
            self.ensure_dir()?;
            let path = self
                .dir
                .join(format!("preset_{}.json", Utc::now().timestamp_millis()));
            std::fs::write(&path, serde_json::to_string_pretty(&preset)?)?;
            Ok(path)
        };
        let path = write().map_err(|e| ViewerError::PresetSave(e.to_string()))?;
        info!(path = %path.display(), name = %preset.name, "saved preset");
        Ok(())
    }

    fn list(&self) -> Result<Vec<Preset>> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)?;
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("preset_") && n.ends_with(".json"))
            })
            .collect();
        files.sort();

        let presets = files
            .iter()
            .filter_map(|path| {
                let parsed = std::fs::read_to_string(path)
                    .map_err(ViewerError::from)
                    .and_then(|data| Ok(serde_json::from_str::<Preset>(&data)?));
                match parsed {
                    Ok(preset) => Some(preset),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable preset");
                        None
                    }
                }
            })
            .collect();
        Ok(presets)
    }
}

/// Presets kept only on this machine.
pub struct LocalPresetStore {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalPreset {
    pub id: i64,
    pub preset: Preset,
}

impl LocalPresetStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(db_path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS presets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                items TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn entries(&self) -> Result<Vec<LocalPreset>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at, items FROM presets ORDER BY id")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, name, timestamp, items) = row?;
            match serde_json::from_str::<Vec<PresetItem>>(&items) {
                Ok(items) => entries.push(LocalPreset {
                    id,
                    preset: Preset { name, timestamp, items },
                }),
                Err(e) => warn!(id, error = %e, "skipping local preset with bad items"),
            }
        }
        Ok(entries)
    }

    pub fn delete(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM presets WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

impl PresetStore for LocalPresetStore {
    fn save(&self, name: &str, items: &[PresetItem]) -> Result<()> {
        let preset = new_preset(name, items)?;
        let items = serde_json::to_string(&preset.items)?;
        self.conn
            .execute(
                "INSERT INTO presets (name, created_at, items) VALUES (?1, ?2, ?3)",
                params![preset.name, preset.timestamp, items],
            )
            .map_err(|e| ViewerError::PresetSave(e.to_string()))?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<Preset>> {
        Ok(self.entries()?.into_iter().map(|e| e.preset).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn items() -> Vec<PresetItem> {
        vec![
            PresetItem { name: "Widget".to_string(), category: "parts".to_string() },
            PresetItem { name: "Cannon".to_string(), category: "weapons".to_string() },
        ]
    }

    #[test]
    fn file_store_round_trips_and_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePresetStore::new(dir.path().join("presets"));
        assert!(store.list().unwrap().is_empty());

        store.save("  evening run ", &items()).unwrap();
        std::fs::write(store.dir().join("preset_1.json"), "{not json").unwrap();
        std::fs::write(store.dir().join("other.json"), "{}").unwrap();

        let presets = store.list().unwrap();
        assert_eq!(presets.len(), 1);
        assert_eq!(presets[0].name, "evening run");
        assert_eq!(presets[0].items, items());
    }

    #[test]
    fn empty_name_is_a_save_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePresetStore::new(dir.path());
        assert!(matches!(
            store.save("   ", &items()),
            Err(ViewerError::PresetSave(_))
        ));
    }

    #[test]
    fn temp_preset_marks_display_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePresetStore::new(dir.path());

        let path = store.write_temp_preset(&items()).unwrap();
        assert!(path.is_absolute());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("temp_preset_"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["name"], TEMP_PRESET_NAME);
        assert_eq!(json["items"][1]["original_name"], "Cannon");
        assert_eq!(json["items"][1]["is_display_name"], true);
        // Temporary presets never show up as saved presets.
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn local_store_saves_lists_and_deletes() {
        let store = LocalPresetStore::open_in_memory().unwrap();
        store.save("first", &items()).unwrap();
        store.save("second", &items()[..1]).unwrap();

        let entries = store.entries().unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.preset.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(entries[1].preset.items.len(), 1);

        assert!(store.delete(entries[0].id).unwrap());
        assert!(!store.delete(entries[0].id).unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn local_store_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("local_presets.db");
        LocalPresetStore::open(&db).unwrap().save("kept", &items()).unwrap();

        let reopened = LocalPresetStore::open(&db).unwrap();
        assert_eq!(reopened.list().unwrap()[0].name, "kept");
    }
}
