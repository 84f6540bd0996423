use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::types::{ContentError, Cost, UpgradeCategory, Wallet};

/// Per-category `id -> level` mapping used by saves.
pub type LevelMap = BTreeMap<String, BTreeMap<String, usize>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeLevel {
    #[serde(default)]
    pub cost: Cost,
    #[serde(default)]
    pub modifiers: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: UpgradeCategory,
    pub ladder: Vec<UpgradeLevel>,
    #[serde(default = "default_unlocked")]
    pub unlocked: bool,
    #[serde(default)]
    pub starting_level: usize,
}

fn default_unlocked() -> bool {
    true
}

/// An upgrade and its progress. `level` 0 means not owned; level `n` applies `ladder[n - 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Upgrade {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: UpgradeCategory,
    pub ladder: Vec<UpgradeLevel>,
    level: usize,
    enabled: bool,
    unlocked: bool,
}

impl Upgrade {
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn max_level(&self) -> usize {
        self.ladder.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn is_owned(&self) -> bool {
        self.level > 0
    }

    pub fn is_maxed(&self) -> bool {
        self.level >= self.ladder.len()
    }

    /// Price of the next level, `None` once maxed.
    pub fn next_cost(&self) -> Option<Cost> {
        self.ladder.get(self.level).map(|level| level.cost)
    }

    pub fn current_modifiers(&self) -> Option<&BTreeMap<String, f64>> {
        self.level
            .checked_sub(1)
            .and_then(|index| self.ladder.get(index))
            .map(|level| &level.modifiers)
    }
}

/// Summed modifiers of every enabled upgrade.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Abilities {
    values: BTreeMap<String, f64>,
}

impl Abilities {
    pub fn value(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    /// `base` plus the modifier total for `name`.
    pub fn apply(&self, name: &str, base: f64) -> f64 {
        base + self.value(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpgradeBook {
    upgrades: Vec<Upgrade>,
    index: HashMap<String, usize>,
}

impl UpgradeBook {
    pub fn from_defs(defs: Vec<UpgradeDef>) -> Result<Self, ContentError> {
        let mut book = Self::default();
        for def in defs {
            if def.ladder.is_empty() {
                return Err(ContentError::EmptyLadder(def.id));
            }
            if book.index.contains_key(&def.id) {
                return Err(ContentError::DuplicateId(def.id));
            }
            let level = def.starting_level.min(def.ladder.len());
            book.index.insert(def.id.clone(), book.upgrades.len());
            book.upgrades.push(Upgrade {
                id: def.id,
                name: def.name,
                description: def.description,
                enabled: level > 0 && def.category != UpgradeCategory::Weapons,
                category: def.category,
                ladder: def.ladder,
                level,
                unlocked: def.unlocked,
            });
        }
        book.ensure_weapon_equipped();
        Ok(book)
    }

    pub fn len(&self) -> usize {
        self.upgrades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upgrades.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Upgrade> {
        self.index.get(id).map(|index| &self.upgrades[*index])
    }

    pub fn in_category(&self, category: UpgradeCategory) -> impl Iterator<Item = &Upgrade> {
        self.upgrades
            .iter()
            .filter(move |upgrade| upgrade.category == category)
    }

    pub fn equipped_weapon(&self) -> Option<&Upgrade> {
        self.in_category(UpgradeCategory::Weapons)
            .find(|upgrade| upgrade.enabled)
    }

    fn lookup_mut(&mut self, id: &str) -> Result<&mut Upgrade, ContentError> {
        match self.index.get(id) {
            Some(index) => Ok(&mut self.upgrades[*index]),
            None => {
                error!(upgrade = id, "upgrade_unknown_id");
                Err(ContentError::UnknownUpgrade(id.to_string()))
            }
        }
    }

    /// Buys the next level. A first purchase also enables (or equips) the upgrade.
    pub fn purchase(&mut self, id: &str, wallet: &mut Wallet) -> Result<usize, ContentError> {
        let upgrade = self.lookup_mut(id)?;
        if !upgrade.unlocked {
            return Err(ContentError::Locked(id.to_string()));
        }
        let Some(cost) = upgrade.next_cost() else {
            return Err(ContentError::MaxLevel(id.to_string()));
        };
        wallet.spend(&cost)?;
        upgrade.level += 1;
        let level = upgrade.level;
        let first_purchase = level == 1;
        let category = upgrade.category;
        info!(upgrade = id, level, gold = cost.gold, exp = cost.exp, "upgrade_purchased");

        if first_purchase {
            match category {
                UpgradeCategory::Weapons => self.equip(id)?,
                _ => self.enable(id)?,
            }
        }
        Ok(level)
    }

    /// Sets the level directly; level 0 disables. Weapons keep their equip state.
    pub fn set_level(&mut self, id: &str, level: usize) -> Result<(), ContentError> {
        let upgrade = self.lookup_mut(id)?;
        if level > upgrade.ladder.len() {
            return Err(ContentError::LevelOutOfRange {
                id: id.to_string(),
                level,
                max: upgrade.ladder.len(),
            });
        }
        upgrade.level = level;
        if level == 0 {
            upgrade.enabled = false;
        } else if upgrade.category != UpgradeCategory::Weapons {
            upgrade.enabled = true;
        }
        debug!(upgrade = id, level, "upgrade_level_set");
        Ok(())
    }

    pub fn enable(&mut self, id: &str) -> Result<(), ContentError> {
        let upgrade = self.lookup_mut(id)?;
        if upgrade.category == UpgradeCategory::Weapons {
            return self.equip(id);
        }
        if !upgrade.is_owned() {
            return Err(ContentError::NotOwned(id.to_string()));
        }
        upgrade.enabled = true;
        Ok(())
    }

    pub fn disable(&mut self, id: &str) -> Result<(), ContentError> {
        let upgrade = self.lookup_mut(id)?;
        if upgrade.category == UpgradeCategory::Weapons && upgrade.enabled {
            return Err(ContentError::WeaponRequired(id.to_string()));
        }
        upgrade.enabled = false;
        Ok(())
    }

    pub fn unlock(&mut self, id: &str) -> Result<(), ContentError> {
        let upgrade = self.lookup_mut(id)?;
        if !upgrade.unlocked {
            upgrade.unlocked = true;
            info!(upgrade = id, "upgrade_unlocked");
        }
        Ok(())
    }

    /// Enables weapon `id` and disables every other weapon.
    pub fn equip(&mut self, id: &str) -> Result<(), ContentError> {
        let upgrade = self.lookup_mut(id)?;
        if upgrade.category != UpgradeCategory::Weapons {
            return Err(ContentError::NotAWeapon(id.to_string()));
        }
        if !upgrade.is_owned() {
            return Err(ContentError::NotOwned(id.to_string()));
        }
        for weapon in self
            .upgrades
            .iter_mut()
            .filter(|upgrade| upgrade.category == UpgradeCategory::Weapons)
        {
            weapon.enabled = weapon.id == id;
        }
        info!(weapon = id, "weapon_equipped");
        Ok(())
    }

    pub fn abilities(&self) -> Abilities {
        let mut abilities = Abilities::default();
        for upgrade in self.upgrades.iter().filter(|upgrade| upgrade.enabled) {
            let Some(modifiers) = upgrade.current_modifiers() else {
                continue;
            };
            for (name, value) in modifiers {
                *abilities.values.entry(name.clone()).or_insert(0.0) += value;
            }
        }
        abilities
    }

    /// Applies a saved `category -> id -> level` mapping. Unknown entries are logged and skipped.
    pub fn load(&mut self, levels: &LevelMap) {
        for (category_name, entries) in levels {
            let Some(category) = UpgradeCategory::parse(category_name) else {
                warn!(category = %category_name, "upgrade_load_unknown_category");
                continue;
            };
            for (id, level) in entries {
                match self.get(id) {
                    Some(upgrade) if upgrade.category != category => {
                        warn!(
                            upgrade = %id,
                            expected = %upgrade.category,
                            found = %category,
                            "upgrade_load_category_mismatch"
                        );
                    }
                    Some(_) => {}
                    None => {
                        warn!(upgrade = %id, category = %category, "upgrade_load_unknown_id");
                        continue;
                    }
                }
                if let Err(error) = self.set_level(id, *level) {
                    warn!(upgrade = %id, error = %error, "upgrade_load_level_rejected");
                }
            }
        }
        self.ensure_weapon_equipped();
    }

    pub fn levels(&self) -> LevelMap {
        let mut levels = LevelMap::new();
        for upgrade in &self.upgrades {
            levels
                .entry(upgrade.category.as_str().to_string())
                .or_default()
                .insert(upgrade.id.clone(), upgrade.level);
        }
        levels
    }

    fn ensure_weapon_equipped(&mut self) {
        if self.equipped_weapon().is_some() {
            return;
        }
        let first_owned = self
            .in_category(UpgradeCategory::Weapons)
            .find(|upgrade| upgrade.is_owned())
            .map(|upgrade| upgrade.id.clone());
        if let Some(id) = first_owned {
            if let Err(error) = self.equip(&id) {
                warn!(weapon = %id, error = %error, "weapon_auto_equip_failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(gold: u64, modifiers: &[(&str, f64)]) -> UpgradeLevel {
        UpgradeLevel {
            cost: Cost::gold(gold),
            modifiers: modifiers
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
        }
    }

    fn def(id: &str, category: UpgradeCategory, ladder: Vec<UpgradeLevel>) -> UpgradeDef {
        UpgradeDef {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            category,
            ladder,
            unlocked: true,
            starting_level: 0,
        }
    }

    fn book() -> UpgradeBook {
        let mut pin = def("pin", UpgradeCategory::Weapons, vec![level(0, &[("pop_radius", 4.0)])]);
        pin.starting_level = 1;
        let needle = def(
            "needle",
            UpgradeCategory::Weapons,
            vec![level(20, &[("pop_radius", 8.0)])],
        );
        let lungs = def(
            "lungs",
            UpgradeCategory::Perks,
            vec![
                level(10, &[("round_time", 5.0)]),
                level(30, &[("round_time", 12.0), ("gold_bonus", 1.0)]),
            ],
        );
        let mut fire = def("fire", UpgradeCategory::Elements, vec![level(5, &[("burst", 1.0)])]);
        fire.unlocked = false;
        UpgradeBook::from_defs(vec![pin, needle, lungs, fire]).expect("book")
    }

    #[test]
    fn starting_weapon_is_equipped() {
        let book = book();
        assert_eq!(book.equipped_weapon().map(|w| w.id.as_str()), Some("pin"));
        assert_eq!(book.abilities().value("pop_radius"), 4.0);
    }

    #[test]
    fn purchase_spends_and_levels_replace_modifiers() {
        let mut book = book();
        let mut wallet = Wallet { gold: 100, exp: 0 };
        assert_eq!(book.purchase("lungs", &mut wallet).expect("level 1"), 1);
        assert_eq!(book.abilities().value("round_time"), 5.0);
        assert_eq!(book.purchase("lungs", &mut wallet).expect("level 2"), 2);
        let abilities = book.abilities();
        assert_eq!(abilities.value("round_time"), 12.0);
        assert_eq!(abilities.value("gold_bonus"), 1.0);
        assert_eq!(wallet.gold, 60);
        assert_eq!(
            book.purchase("lungs", &mut wallet),
            Err(ContentError::MaxLevel("lungs".to_string()))
        );
    }

    #[test]
    fn unaffordable_or_locked_purchases_change_nothing() {
        let mut book = book();
        let mut wallet = Wallet { gold: 5, exp: 0 };
        assert!(matches!(
            book.purchase("needle", &mut wallet),
            Err(ContentError::NotAffordable { .. })
        ));
        assert_eq!(book.get("needle").map(Upgrade::level), Some(0));
        assert_eq!(
            book.purchase("fire", &mut wallet),
            Err(ContentError::Locked("fire".to_string()))
        );
        book.unlock("fire").expect("unlock");
        book.purchase("fire", &mut wallet).expect("fire affordable");
        assert_eq!(wallet.gold, 0);
    }

    #[test]
    fn buying_a_weapon_equips_it_exclusively() {
        let mut book = book();
        let mut wallet = Wallet { gold: 20, exp: 0 };
        book.purchase("needle", &mut wallet).expect("needle");
        let enabled: Vec<&str> = book
            .in_category(UpgradeCategory::Weapons)
            .filter(|weapon| weapon.is_enabled())
            .map(|weapon| weapon.id.as_str())
            .collect();
        assert_eq!(enabled, vec!["needle"]);
        assert_eq!(book.abilities().value("pop_radius"), 8.0);

        assert_eq!(
            book.disable("needle"),
            Err(ContentError::WeaponRequired("needle".to_string()))
        );
        book.equip("pin").expect("swap back");
        assert_eq!(book.equipped_weapon().map(|w| w.id.as_str()), Some("pin"));
    }

    #[test]
    fn disabled_upgrades_drop_out_of_abilities() {
        let mut book = book();
        book.set_level("lungs", 1).expect("set level");
        assert_eq!(book.abilities().value("round_time"), 5.0);
        book.disable("lungs").expect("disable");
        assert_eq!(book.abilities().value("round_time"), 0.0);
        book.enable("lungs").expect("enable");
        assert_eq!(book.abilities().apply("round_time", 30.0), 35.0);
    }

    #[test]
    fn unknown_ids_and_bad_levels_are_errors() {
        let mut book = book();
        assert_eq!(
            book.enable("ghost"),
            Err(ContentError::UnknownUpgrade("ghost".to_string()))
        );
        assert_eq!(
            book.equip("lungs"),
            Err(ContentError::NotAWeapon("lungs".to_string()))
        );
        assert!(matches!(
            book.set_level("lungs", 3),
            Err(ContentError::LevelOutOfRange { max: 2, .. })
        ));
        assert_eq!(
            book.enable("fire"),
            Err(ContentError::NotOwned("fire".to_string()))
        );
    }

    #[test]
    fn load_walks_categories_and_skips_unknown_entries() {
        let mut book = book();
        let mut levels = LevelMap::new();
        levels
            .entry("perks".to_string())
            .or_default()
            .insert("lungs".to_string(), 2);
        levels
            .entry("weapons".to_string())
            .or_default()
            .insert("ghost".to_string(), 1);
        levels
            .entry("armor".to_string())
            .or_default()
            .insert("plate".to_string(), 1);
        book.load(&levels);

        assert_eq!(book.get("lungs").map(Upgrade::level), Some(2));
        assert_eq!(book.levels()["perks"]["lungs"], 2);
        assert_eq!(book.levels()["weapons"]["pin"], 1);
    }

    #[test]
    fn rejects_duplicate_ids_and_empty_ladders() {
        let a = def("a", UpgradeCategory::General, vec![level(1, &[])]);
        assert_eq!(
            UpgradeBook::from_defs(vec![a.clone(), a]).map(|book| book.len()),
            Err(ContentError::DuplicateId("a".to_string()))
        );
        let empty = def("e", UpgradeCategory::General, Vec::new());
        assert_eq!(
            UpgradeBook::from_defs(vec![empty]).map(|book| book.len()),
            Err(ContentError::EmptyLadder("e".to_string()))
        );
    }
}
