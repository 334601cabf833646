use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::error::{MindMapError, Result};
use crate::mindmap::MindMap;
use crate::settings::Settings;

pub const MAP_FILE: &str = "mindflow_last_map.json";
pub const SETTINGS_FILE: &str = "mindflow_settings.json";

/// Where the single current map and the settings record live between sessions.
///
/// `Ok(None)` means nothing was stored yet. Unreadable or unparsable data is
/// reported as [`MindMapError::PersistenceUnavailable`] and left for the
/// caller to fall back from.
pub trait Storage: Send {
    fn load_map(&self) -> Result<Option<MindMap>>;
    fn save_map(&mut self, map: &MindMap) -> Result<()>;
    fn load_settings(&self) -> Result<Option<Settings>>;
    fn save_settings(&mut self, settings: &Settings) -> Result<()>;
}

fn decode<T: serde::de::DeserializeOwned>(raw: &str, what: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|err| MindMapError::storage(format!("malformed {what}: {err}")))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(MindMapError::storage)
}

/// JSON files in one directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn map_path(&self) -> PathBuf {
        self.dir.join(MAP_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    fn read(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "nothing stored yet");
                Ok(None)
            }
            Err(err) => Err(MindMapError::storage(format!(
                "failed to read '{}': {err}",
                path.display()
            ))),
        }
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|err| {
            MindMapError::storage(format!(
                "failed to create data directory '{}': {err}",
                self.dir.display()
            ))
        })?;

        // Write next to the target first so a failed write never truncates the last good copy.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, contents)
            .and_then(|_| fs::rename(&staging, path))
            .map_err(|err| {
                MindMapError::storage(format!("failed to write '{}': {err}", path.display()))
            })
    }
}

impl Storage for FileStorage {
    fn load_map(&self) -> Result<Option<MindMap>> {
        let path = self.map_path();
        match self.read(&path)? {
            Some(raw) => {
                let map = decode::<MindMap>(&raw, "map")?;
                info!(path = %path.display(), nodes = map.nodes.len(), "loaded map");
                Ok(Some(map))
            }
            None => Ok(None),
        }
    }

    fn save_map(&mut self, map: &MindMap) -> Result<()> {
        let path = self.map_path();
        self.write(&path, &encode(map)?)?;
        info!(path = %path.display(), nodes = map.nodes.len(), "saved map");
        Ok(())
    }

    fn load_settings(&self) -> Result<Option<Settings>> {
        match self.read(&self.settings_path())? {
            Some(raw) => decode(&raw, "settings").map(Some),
            None => Ok(None),
        }
    }

    fn save_settings(&mut self, settings: &Settings) -> Result<()> {
        self.write(&self.settings_path(), &encode(settings)?)
    }
}

#[derive(Debug, Default)]
struct MemorySlots {
    map: Option<String>,
    settings: Option<String>,
    read_only: bool,
    saves: usize,
}

/// In-memory storage holding the same JSON text a file would.
///
/// Clones share their contents, so a test can keep a handle after giving
/// one to an editor.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: Arc<Mutex<MemorySlots>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map_json(raw: impl Into<String>) -> Self {
        let storage = Self::new();
        if let Ok(mut slots) = storage.slots.lock() {
            slots.map = Some(raw.into());
        }
        storage
    }

    /// Makes every later save fail, like a full or revoked store.
    pub fn set_read_only(&self, read_only: bool) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.read_only = read_only;
        }
    }

    pub fn map_json(&self) -> Option<String> {
        self.slots.lock().ok().and_then(|slots| slots.map.clone())
    }

    pub fn settings_json(&self) -> Option<String> {
        self.slots.lock().ok().and_then(|slots| slots.settings.clone())
    }

    /// Number of successful map saves.
    pub fn save_count(&self) -> usize {
        self.slots.lock().map(|slots| slots.saves).unwrap_or(0)
    }

    fn with_slots<T>(&self, f: impl FnOnce(&mut MemorySlots) -> Result<T>) -> Result<T> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| MindMapError::storage("memory store lock poisoned"))?;
        f(&mut slots)
    }
}

impl Storage for MemoryStorage {
    fn load_map(&self) -> Result<Option<MindMap>> {
        self.with_slots(|slots| slots.map.as_deref().map(|raw| decode(raw, "map")).transpose())
    }

    fn save_map(&mut self, map: &MindMap) -> Result<()> {
        let raw = encode(map)?;
        self.with_slots(|slots| {
            if slots.read_only {
                return Err(MindMapError::storage("store is read-only"));
            }
            slots.map = Some(raw);
            slots.saves += 1;
            Ok(())
        })
    }

    fn load_settings(&self) -> Result<Option<Settings>> {
        self.with_slots(|slots| {
            slots
                .settings
                .as_deref()
                .map(|raw| decode(raw, "settings"))
                .transpose()
        })
    }

    fn save_settings(&mut self, settings: &Settings) -> Result<()> {
        let raw = encode(settings)?;
        self.with_slots(|slots| {
            if slots.read_only {
                return Err(MindMapError::storage("store is read-only"));
            }
            slots.settings = Some(raw);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Point;
    use crate::settings::Theme;
    use tempfile::TempDir;

    #[test]
    fn file_storage_round_trips_map_and_settings() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(temp.path().join("nested"));
        assert!(storage.load_map().unwrap().is_none());
        assert!(storage.load_settings().unwrap().is_none());

        let mut map = MindMap::new("Saved", Point::new(10.0, 20.0));
        let root = map.root().unwrap().id;
        map.add_child(root, "child").unwrap();
        storage.save_map(&map).unwrap();

        let settings = Settings {
            theme: Theme::Dark,
            ..Settings::default()
        };
        storage.save_settings(&settings).unwrap();

        assert_eq!(storage.load_map().unwrap(), Some(map));
        assert_eq!(storage.load_settings().unwrap(), Some(settings));
        assert!(storage.map_path().ends_with(MAP_FILE));
        assert!(!storage.dir().join("mindflow_last_map.json.tmp").exists());
    }

    #[test]
    fn malformed_file_is_reported_not_panicked() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(MAP_FILE), "{ not json").unwrap();
        let storage = FileStorage::new(temp.path());
        assert!(matches!(
            storage.load_map(),
            Err(MindMapError::PersistenceUnavailable(_))
        ));
    }

    #[test]
    fn memory_storage_shares_state_between_clones() {
        let handle = MemoryStorage::new();
        let mut storage = handle.clone();
        storage.save_map(&MindMap::default()).unwrap();
        assert_eq!(handle.save_count(), 1);
        assert!(handle.map_json().unwrap().contains("nextNodeId"));

        handle.set_read_only(true);
        assert!(matches!(
            storage.save_map(&MindMap::default()),
            Err(MindMapError::PersistenceUnavailable(_))
        ));
        assert_eq!(handle.save_count(), 1);
    }
}
