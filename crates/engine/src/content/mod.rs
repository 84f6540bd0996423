mod atomic_io;
mod hashing;
mod quests;
mod save;
mod types;
mod upgrades;

pub use hashing::fingerprint_data;
pub use quests::{
    Objective, ObjectiveKind, Quest, QuestDef, QuestLog, QuestReward, RoundCounters,
};
pub use save::{SaveData, SaveError, SaveStore, SAVE_FORMAT_VERSION};
pub use types::{ContentError, Cost, UpgradeCategory, Wallet};
pub use upgrades::{Abilities, LevelMap, Upgrade, UpgradeBook, UpgradeDef, UpgradeLevel};
