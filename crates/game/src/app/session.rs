use bubble_engine::content::{
    Cost, QuestLog, QuestReward, RoundCounters, SaveData, SaveStore, UpgradeBook, Wallet,
    SAVE_FORMAT_VERSION,
};
use tracing::{error, info, warn};

use super::data::{Balance, GameData};

pub(crate) const ROUND_TIME: &str = "round_time";
pub(crate) const POP_RADIUS: &str = "pop_radius";
pub(crate) const SPAWN_INTERVAL: &str = "spawn_interval";
pub(crate) const GOLD_BONUS: &str = "gold_bonus";
pub(crate) const EXP_BONUS: &str = "exp_bonus";
pub(crate) const COMBO_WINDOW: &str = "combo_window";

const MIN_ROUND_SECONDS: f32 = 5.0;
const MIN_SPAWN_INTERVAL: f32 = 0.1;
const MIN_COMBO_WINDOW: f32 = 0.1;

/// Round tuning after upgrades are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RoundRules {
    pub(crate) duration: f32,
    pub(crate) spawn_interval: f32,
    pub(crate) max_bubbles: usize,
    pub(crate) bubble_radius: (f32, f32),
    pub(crate) bubble_speed: (f32, f32),
    pub(crate) pop_radius: f32,
    pub(crate) combo_window: f32,
    pub(crate) combo_cap: u32,
    pub(crate) gold_per_pop: u64,
    pub(crate) exp_per_pop: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RoundSummary {
    pub(crate) day: u32,
    pub(crate) round: RoundCounters,
    pub(crate) exp: u64,
    pub(crate) quest_name: Option<String>,
    pub(crate) reward: Option<QuestReward>,
    pub(crate) quest_lines: Vec<String>,
}

impl RoundSummary {
    /// Results pages shown by the cutscene after a round.
    pub(crate) fn pages(&self) -> Vec<String> {
        let mut pages = vec![format!(
            "Day {} is over\nPopped {} bubbles\nBest combo {}\nEarned {}",
            self.day,
            self.round.bubbles_popped,
            self.round.best_combo,
            Cost {
                gold: self.round.gold_earned,
                exp: self.exp,
            }
        )];
        match (&self.reward, &self.quest_name) {
            (Some(reward), name) => {
                let mut page = format!(
                    "Quest complete: {}\nReward {}",
                    name.as_deref().unwrap_or(reward.quest_id.as_str()),
                    reward.reward
                );
                if !reward.unlocks.is_empty() {
                    page.push_str(&format!("\nNew in town: {}", reward.unlocks.join(", ")));
                }
                pages.push(page);
            }
            (None, Some(name)) => {
                let mut page = name.clone();
                for line in &self.quest_lines {
                    page.push('\n');
                    page.push_str(line);
                }
                pages.push(page);
            }
            (None, None) => {}
        }
        pages
    }
}

/// Progress shared by every state, stored as a resource.
pub(crate) struct GameSession {
    pub(crate) hero_name: String,
    pub(crate) day: u32,
    pub(crate) wallet: Wallet,
    pub(crate) round: RoundCounters,
    pub(crate) round_exp: u64,
    pub(crate) quest_progress: RoundCounters,
    pub(crate) upgrades: UpgradeBook,
    pub(crate) quests: QuestLog,
    pub(crate) seed: u64,
    pub(crate) balance: Balance,
    pub(crate) intro: Vec<String>,
    save: Option<SaveStore>,
}

impl GameSession {
    pub(crate) fn new(data: GameData, seed: u64, save: Option<SaveStore>) -> Self {
        Self {
            hero_name: String::new(),
            day: 1,
            wallet: Wallet::default(),
            round: RoundCounters::default(),
            round_exp: 0,
            quest_progress: RoundCounters::default(),
            upgrades: data.upgrades,
            quests: data.quests,
            seed,
            balance: data.balance,
            intro: data.story.intro,
            save,
        }
    }

    pub(crate) fn has_hero(&self) -> bool {
        !self.hero_name.trim().is_empty()
    }

    pub(crate) fn apply_save(&mut self, save: SaveData) {
        self.hero_name = save.hero_name;
        self.day = save.day.max(1);
        self.wallet = save.wallet;
        self.seed = save.seed;
        self.upgrades.load(&save.upgrades);
        self.quests.restore_progress(save.quest_index);
        self.quest_progress = save.quest_progress;

        let unlocks: Vec<String> = self
            .quests
            .completed()
            .flat_map(|quest| quest.unlocks.iter().cloned())
            .collect();
        for id in unlocks {
            if let Err(error) = self.upgrades.unlock(&id) {
                warn!(upgrade = %id, error = %error, "save_unlock_skipped");
            }
        }
        if let Some(weapon) = save.equipped_weapon {
            if let Err(error) = self.upgrades.equip(&weapon) {
                warn!(weapon = %weapon, error = %error, "save_equip_skipped");
            }
        }
        info!(
            hero = %self.hero_name,
            day = self.day,
            quest = self.quests.current_index(),
            "save_applied"
        );
    }

    pub(crate) fn to_save(&self) -> SaveData {
        SaveData {
            version: SAVE_FORMAT_VERSION,
            data_fingerprint: self
                .save
                .as_ref()
                .map(|store| store.fingerprint().to_string())
                .unwrap_or_default(),
            hero_name: self.hero_name.clone(),
            day: self.day,
            wallet: self.wallet,
            upgrades: self.upgrades.levels(),
            equipped_weapon: self
                .upgrades
                .equipped_weapon()
                .map(|weapon| weapon.id.clone()),
            quest_index: self.quests.current_index(),
            quest_progress: self.quest_progress,
            seed: self.seed,
        }
    }

    /// Writes the save slot. Failures are logged; play continues unsaved.
    pub(crate) fn save(&self) {
        let Some(store) = &self.save else {
            return;
        };
        if let Err(error) = store.store(&self.to_save()) {
            error!(error = %error, "save_failed");
        }
    }

    /// Seed for today's spawner, so each day plays differently but replays the same.
    pub(crate) fn round_seed(&self) -> u64 {
        self.seed.wrapping_add(u64::from(self.day))
    }

    pub(crate) fn round_rules(&self) -> RoundRules {
        let abilities = self.upgrades.abilities();
        let balance = &self.balance;
        let apply = |name: &str, base: f32| abilities.apply(name, f64::from(base)) as f32;
        let bonus = |name: &str| abilities.value(name).max(0.0).round() as u64;
        RoundRules {
            duration: apply(ROUND_TIME, balance.round_seconds).max(MIN_ROUND_SECONDS),
            spawn_interval: apply(SPAWN_INTERVAL, balance.spawn_interval).max(MIN_SPAWN_INTERVAL),
            max_bubbles: balance.max_bubbles.max(1),
            bubble_radius: ordered(balance.bubble_radius),
            bubble_speed: ordered(balance.bubble_speed),
            pop_radius: apply(POP_RADIUS, balance.pop_radius).max(0.0),
            combo_window: apply(COMBO_WINDOW, balance.combo_window).max(MIN_COMBO_WINDOW),
            combo_cap: balance.combo_cap.max(1),
            gold_per_pop: balance.gold_per_pop.saturating_add(bonus(GOLD_BONUS)),
            exp_per_pop: balance.exp_per_pop.saturating_add(bonus(EXP_BONUS)),
        }
    }

    pub(crate) fn start_round(&mut self) -> RoundRules {
        self.round = RoundCounters::default();
        self.round_exp = 0;
        let rules = self.round_rules();
        info!(
            day = self.day,
            duration = rules.duration,
            spawn_interval = rules.spawn_interval,
            pop_radius = rules.pop_radius,
            "round_started"
        );
        rules
    }

    /// Counts one pop at `combo` and returns the gold it earned.
    pub(crate) fn record_pop(&mut self, combo: u32, rules: &RoundRules) -> u64 {
        let combo_bonus = u64::from(combo.min(rules.combo_cap) / 2);
        let gold = rules.gold_per_pop.saturating_add(combo_bonus);
        self.round.bubbles_popped = self.round.bubbles_popped.saturating_add(1);
        self.round.best_combo = self.round.best_combo.max(combo);
        self.round.gold_earned = self.round.gold_earned.saturating_add(gold);
        self.round_exp = self.round_exp.saturating_add(rules.exp_per_pop);
        gold
    }

    /// Banks the round, judges the current quest and moves to the next day.
    pub(crate) fn finish_round(&mut self) -> RoundSummary {
        self.round.rounds_survived = 1;
        let round = self.round;
        let exp = self.round_exp;
        let day = self.day;
        self.wallet.earn(&Cost {
            gold: round.gold_earned,
            exp,
        });
        self.quest_progress.absorb(&round);

        let quest_name = self.quests.current().map(|quest| quest.name.clone());
        let mut reward = None;
        if self.quests.evaluate(&self.quest_progress) {
            reward = self.quests.complete_current();
        }
        if let Some(reward) = &reward {
            self.wallet.earn(&reward.reward);
            for id in &reward.unlocks {
                if let Err(error) = self.upgrades.unlock(id) {
                    warn!(upgrade = %id, error = %error, "quest_unlock_skipped");
                }
            }
            self.quest_progress = RoundCounters::default();
        }
        let quest_lines = match (&reward, self.quests.current()) {
            (None, Some(quest)) => quest.status_lines(&self.quest_progress),
            _ => Vec::new(),
        };

        self.day = self.day.saturating_add(1);
        info!(
            day,
            popped = round.bubbles_popped,
            best_combo = round.best_combo,
            gold = round.gold_earned,
            exp,
            quest_completed = reward.is_some(),
            "round_finished"
        );
        self.save();

        RoundSummary {
            day,
            round,
            exp,
            quest_name,
            reward,
            quest_lines,
        }
    }
}

fn ordered([low, high]: [f32; 2]) -> (f32, f32) {
    if low <= high {
        (low, high)
    } else {
        (high, low)
    }
}
