use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeCategory {
    General,
    Weapons,
    Perks,
    Elements,
}

impl UpgradeCategory {
    pub const ALL: [UpgradeCategory; 4] = [
        UpgradeCategory::General,
        UpgradeCategory::Weapons,
        UpgradeCategory::Perks,
        UpgradeCategory::Elements,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UpgradeCategory::General => "general",
            UpgradeCategory::Weapons => "weapons",
            UpgradeCategory::Perks => "perks",
            UpgradeCategory::Elements => "elements",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == raw)
    }
}

impl fmt::Display for UpgradeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cost {
    #[serde(default)]
    pub gold: u64,
    #[serde(default)]
    pub exp: u64,
}

impl Cost {
    pub const FREE: Cost = Cost { gold: 0, exp: 0 };

    pub const fn gold(gold: u64) -> Self {
        Self { gold, exp: 0 }
    }

    pub const fn exp(exp: u64) -> Self {
        Self { gold: 0, exp }
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.gold, self.exp) {
            (0, 0) => f.write_str("free"),
            (gold, 0) => write!(f, "{gold}g"),
            (0, exp) => write!(f, "{exp}xp"),
            (gold, exp) => write!(f, "{gold}g {exp}xp"),
        }
    }
}

/// Currency the hero carries between rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub gold: u64,
    pub exp: u64,
}

impl Wallet {
    pub fn can_afford(&self, cost: &Cost) -> bool {
        self.gold >= cost.gold && self.exp >= cost.exp
    }

    pub fn spend(&mut self, cost: &Cost) -> Result<(), ContentError> {
        if !self.can_afford(cost) {
            return Err(ContentError::NotAffordable {
                cost: *cost,
                wallet: *self,
            });
        }
        self.gold -= cost.gold;
        self.exp -= cost.exp;
        Ok(())
    }

    pub fn earn(&mut self, reward: &Cost) {
        self.gold = self.gold.saturating_add(reward.gold);
        self.exp = self.exp.saturating_add(reward.exp);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("unknown upgrade id '{0}'")]
    UnknownUpgrade(String),
    #[error("duplicate id '{0}' in content data")]
    DuplicateId(String),
    #[error("upgrade '{0}' has an empty level ladder")]
    EmptyLadder(String),
    #[error("upgrade '{id}' has no level {level} (max {max})")]
    LevelOutOfRange { id: String, level: usize, max: usize },
    #[error("upgrade '{0}' is already at its highest level")]
    MaxLevel(String),
    #[error("upgrade '{0}' is locked")]
    Locked(String),
    #[error("upgrade '{0}' is not owned")]
    NotOwned(String),
    #[error("upgrade '{0}' is not a weapon")]
    NotAWeapon(String),
    #[error("weapon '{0}' cannot be unequipped; equip another weapon instead")]
    WeaponRequired(String),
    #[error("cannot afford {cost} with {} gold and {} exp", wallet.gold, wallet.exp)]
    NotAffordable { cost: Cost, wallet: Wallet },
}
