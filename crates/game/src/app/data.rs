use std::fs;
use std::path::{Path, PathBuf};

use bubble_engine::content::{
    fingerprint_data, ContentError, QuestDef, QuestLog, UpgradeBook, UpgradeDef,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

pub(crate) const UPGRADES_FILE: &str = "upgrades.json";
pub(crate) const QUESTS_FILE: &str = "quests.json";
pub(crate) const BALANCE_FILE: &str = "balance.json";
pub(crate) const STORY_FILE: &str = "story.json";

#[derive(Debug, Error)]
pub(crate) enum DataError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{file} is invalid at {at}: {source}")]
    Parse {
        file: String,
        at: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Content(#[from] ContentError),
}

/// Tuning for one round of bubble popping.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct Balance {
    pub(crate) round_seconds: f32,
    pub(crate) spawn_interval: f32,
    pub(crate) max_bubbles: usize,
    pub(crate) bubble_radius: [f32; 2],
    pub(crate) bubble_speed: [f32; 2],
    #[serde(default)]
    pub(crate) pop_radius: f32,
    pub(crate) combo_window: f32,
    pub(crate) combo_cap: u32,
    pub(crate) gold_per_pop: u64,
    pub(crate) exp_per_pop: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct Story {
    pub(crate) intro: Vec<String>,
}

/// Everything read from `assets/data`, plus the fingerprint saves are stamped with.
pub(crate) struct GameData {
    pub(crate) upgrades: UpgradeBook,
    pub(crate) quests: QuestLog,
    pub(crate) balance: Balance,
    pub(crate) story: Story,
    pub(crate) fingerprint: String,
}

pub(crate) fn load_game_data(data_dir: &Path) -> Result<GameData, DataError> {
    let upgrades_raw = read_data_file(data_dir, UPGRADES_FILE)?;
    let quests_raw = read_data_file(data_dir, QUESTS_FILE)?;
    let balance_raw = read_data_file(data_dir, BALANCE_FILE)?;
    let story_raw = read_data_file(data_dir, STORY_FILE)?;
    let data = parse_game_data(&upgrades_raw, &quests_raw, &balance_raw, &story_raw)?;
    info!(
        upgrades = data.upgrades.len(),
        quests = data.quests.len(),
        fingerprint = %data.fingerprint,
        "game_data_loaded"
    );
    Ok(data)
}

pub(crate) fn parse_game_data(
    upgrades_raw: &str,
    quests_raw: &str,
    balance_raw: &str,
    story_raw: &str,
) -> Result<GameData, DataError> {
    let upgrade_defs: Vec<UpgradeDef> = parse_json(UPGRADES_FILE, upgrades_raw)?;
    let quest_defs: Vec<QuestDef> = parse_json(QUESTS_FILE, quests_raw)?;
    let balance: Balance = parse_json(BALANCE_FILE, balance_raw)?;
    let story: Story = parse_json(STORY_FILE, story_raw)?;

    let fingerprint = fingerprint_data(&[
        (UPGRADES_FILE, upgrades_raw.as_bytes()),
        (QUESTS_FILE, quests_raw.as_bytes()),
        (BALANCE_FILE, balance_raw.as_bytes()),
        (STORY_FILE, story_raw.as_bytes()),
    ]);

    Ok(GameData {
        upgrades: UpgradeBook::from_defs(upgrade_defs)?,
        quests: QuestLog::from_defs(quest_defs)?,
        balance,
        story,
        fingerprint,
    })
}

fn read_data_file(data_dir: &Path, file: &str) -> Result<String, DataError> {
    let path = data_dir.join(file);
    fs::read_to_string(&path).map_err(|source| DataError::Read { path, source })
}

fn parse_json<T: DeserializeOwned>(file: &str, raw: &str) -> Result<T, DataError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, T>(&mut deserializer).map_err(|error| {
        let at = error.path().to_string();
        DataError::Parse {
            file: file.to_string(),
            at,
            source: error.into_inner(),
        }
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use bubble_engine::content::UpgradeCategory;
    use tempfile::TempDir;

    use super::*;

    pub(crate) const UPGRADES_JSON: &str = include_str!("../../../../assets/data/upgrades.json");
    pub(crate) const QUESTS_JSON: &str = include_str!("../../../../assets/data/quests.json");
    pub(crate) const BALANCE_JSON: &str = include_str!("../../../../assets/data/balance.json");
    pub(crate) const STORY_JSON: &str = include_str!("../../../../assets/data/story.json");

    pub(crate) fn shipped_data() -> GameData {
        parse_game_data(UPGRADES_JSON, QUESTS_JSON, BALANCE_JSON, STORY_JSON)
            .expect("shipped data parses")
    }

    #[test]
    fn shipped_data_parses_and_equips_a_weapon() {
        let data = shipped_data();
        assert!(data.upgrades.equipped_weapon().is_some());
        assert!(data.upgrades.in_category(UpgradeCategory::Elements).count() > 0);
        assert!(!data.quests.is_empty());
        assert!(data.balance.round_seconds > 0.0);
        assert!(!data.story.intro.is_empty());
        assert_eq!(data.fingerprint.len(), 64);
    }

    #[test]
    fn parse_errors_name_the_file_and_path() {
        let broken = r#"{"round_seconds": "long"}"#;
        let error = match parse_game_data(UPGRADES_JSON, QUESTS_JSON, broken, STORY_JSON) {
            Err(error) => error,
            Ok(_) => panic!("balance should be rejected"),
        };
        match error {
            DataError::Parse { file, at, .. } => {
                assert_eq!(file, BALANCE_FILE);
                assert_eq!(at, "round_seconds");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn fingerprint_changes_with_any_file() {
        let base = shipped_data().fingerprint;
        let tweaked = BALANCE_JSON.replacen("\"combo_cap\"", "\"combo_cap\" ", 1);
        let other = parse_game_data(UPGRADES_JSON, QUESTS_JSON, &tweaked, STORY_JSON)
            .expect("tweaked data parses")
            .fingerprint;
        assert_ne!(base, other);
    }

    #[test]
    fn load_reads_from_the_data_directory() {
        let temp = TempDir::new().expect("tempdir");
        for (file, raw) in [
            (UPGRADES_FILE, UPGRADES_JSON),
            (QUESTS_FILE, QUESTS_JSON),
            (BALANCE_FILE, BALANCE_JSON),
            (STORY_FILE, STORY_JSON),
        ] {
            fs::write(temp.path().join(file), raw).expect("write data file");
        }
        let data = load_game_data(temp.path()).expect("load");
        assert_eq!(data.fingerprint, shipped_data().fingerprint);

        fs::remove_file(temp.path().join(STORY_FILE)).expect("remove");
        assert!(matches!(
            load_game_data(temp.path()),
            Err(DataError::Read { .. })
        ));
    }
}
