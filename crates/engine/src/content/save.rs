use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::atomic_io::write_text_atomic;
use super::quests::RoundCounters;
use super::types::Wallet;
use super::upgrades::LevelMap;

pub const SAVE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    /// Fingerprint of the game data the save was written against.
    pub data_fingerprint: String,
    pub hero_name: String,
    pub day: u32,
    pub wallet: Wallet,
    pub upgrades: LevelMap,
    #[serde(default)]
    pub equipped_weapon: Option<String>,
    #[serde(default)]
    pub quest_index: usize,
    #[serde(default)]
    pub quest_progress: RoundCounters,
    pub seed: u64,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to read save file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write save file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("save file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize save data: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("save file {path} has format version {found}, expected {expected}")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

/// One JSON save slot, stamped with the current data fingerprint on every store.
#[derive(Debug, Clone)]
pub struct SaveStore {
    path: PathBuf,
    fingerprint: String,
}

impl SaveStore {
    pub fn new(path: impl Into<PathBuf>, fingerprint: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fingerprint: fingerprint.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn store(&self, data: &SaveData) -> Result<(), SaveError> {
        let mut stamped = data.clone();
        stamped.version = SAVE_FORMAT_VERSION;
        stamped.data_fingerprint = self.fingerprint.clone();
        let text = serde_json::to_string_pretty(&stamped).map_err(SaveError::Serialize)?;
        write_text_atomic(&self.path, &text).map_err(|source| SaveError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), day = stamped.day, "save_written");
        Ok(())
    }

    /// `Ok(None)` when no save exists. A save made for different game data still loads;
    /// the caller applies what it recognises.
    pub fn load(&self) -> Result<Option<SaveData>, SaveError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SaveError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let data: SaveData = serde_json::from_str(&raw).map_err(|source| SaveError::Parse {
            path: self.path.clone(),
            source,
        })?;
        if data.version != SAVE_FORMAT_VERSION {
            return Err(SaveError::UnsupportedVersion {
                path: self.path.clone(),
                found: data.version,
                expected: SAVE_FORMAT_VERSION,
            });
        }
        if data.data_fingerprint != self.fingerprint {
            warn!(
                path = %self.path.display(),
                saved = %data.data_fingerprint,
                current = %self.fingerprint,
                "save_data_fingerprint_mismatch"
            );
        }
        Ok(Some(data))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn sample() -> SaveData {
        let mut upgrades = LevelMap::new();
        upgrades
            .entry("perks".to_string())
            .or_default()
            .insert("lungs".to_string(), 2);
        SaveData {
            version: 0,
            data_fingerprint: String::new(),
            hero_name: "Pip".to_string(),
            day: 3,
            wallet: Wallet { gold: 40, exp: 7 },
            upgrades,
            equipped_weapon: Some("pin".to_string()),
            quest_index: 1,
            quest_progress: RoundCounters::default(),
            seed: 99,
        }
    }

    #[test]
    fn missing_save_loads_as_none() {
        let temp = TempDir::new().expect("tempdir");
        let store = SaveStore::new(temp.path().join("slot.json"), "abc");
        assert!(!store.exists());
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn store_then_load_keeps_progress_and_stamps_fingerprint() {
        let temp = TempDir::new().expect("tempdir");
        let store = SaveStore::new(temp.path().join("saves").join("slot.json"), "abc");
        store.store(&sample()).expect("store");

        let loaded = store.load().expect("load").expect("present");
        assert_eq!(loaded.version, SAVE_FORMAT_VERSION);
        assert_eq!(loaded.data_fingerprint, "abc");
        assert_eq!(loaded.day, 3);
        assert_eq!(loaded.upgrades["perks"]["lungs"], 2);
    }

    #[test]
    fn save_from_other_data_still_loads() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("slot.json");
        SaveStore::new(&path, "old").store(&sample()).expect("store");

        let loaded = SaveStore::new(&path, "new")
            .load()
            .expect("load")
            .expect("present");
        assert_eq!(loaded.data_fingerprint, "old");
        assert_eq!(loaded.hero_name, "Pip");
    }

    #[test]
    fn corrupt_or_future_saves_are_errors() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("slot.json");
        fs::write(&path, "{ not json").expect("write");
        assert!(matches!(
            SaveStore::new(&path, "abc").load(),
            Err(SaveError::Parse { .. })
        ));

        let mut future = serde_json::to_value(sample()).expect("value");
        future["version"] = serde_json::json!(SAVE_FORMAT_VERSION + 1);
        fs::write(&path, future.to_string()).expect("write");
        assert!(matches!(
            SaveStore::new(&path, "abc").load(),
            Err(SaveError::UnsupportedVersion { .. })
        ));
    }
}
