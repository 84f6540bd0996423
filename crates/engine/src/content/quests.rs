use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::types::{ContentError, Cost};

/// Progress counters a round accumulates; objectives are judged against these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundCounters {
    pub bubbles_popped: u64,
    pub best_combo: u32,
    pub gold_earned: u64,
    pub rounds_survived: u32,
}

impl RoundCounters {
    /// Folds one round into running totals. Combos keep the best, the rest add up.
    pub fn absorb(&mut self, round: &RoundCounters) {
        self.bubbles_popped = self.bubbles_popped.saturating_add(round.bubbles_popped);
        self.best_combo = self.best_combo.max(round.best_combo);
        self.gold_earned = self.gold_earned.saturating_add(round.gold_earned);
        self.rounds_survived = self.rounds_survived.saturating_add(round.rounds_survived);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectiveKind {
    PopBubbles { count: u64 },
    ReachCombo { combo: u32 },
    EarnGold { amount: u64 },
    SurviveRounds { rounds: u32 },
}

impl ObjectiveKind {
    pub fn is_met(&self, counters: &RoundCounters) -> bool {
        match *self {
            ObjectiveKind::PopBubbles { count } => counters.bubbles_popped >= count,
            ObjectiveKind::ReachCombo { combo } => counters.best_combo >= combo,
            ObjectiveKind::EarnGold { amount } => counters.gold_earned >= amount,
            ObjectiveKind::SurviveRounds { rounds } => counters.rounds_survived >= rounds,
        }
    }

    pub fn status_line(&self, counters: &RoundCounters) -> String {
        match *self {
            ObjectiveKind::PopBubbles { count } => {
                format!("Pop bubbles {}/{count}", counters.bubbles_popped.min(count))
            }
            ObjectiveKind::ReachCombo { combo } => {
                format!("Reach combo {}/{combo}", counters.best_combo.min(combo))
            }
            ObjectiveKind::EarnGold { amount } => {
                format!("Earn gold {}/{amount}", counters.gold_earned.min(amount))
            }
            ObjectiveKind::SurviveRounds { rounds } => {
                format!("Survive rounds {}/{rounds}", counters.rounds_survived.min(rounds))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub objectives: Vec<ObjectiveKind>,
    #[serde(default)]
    pub reward: Cost,
    #[serde(default)]
    pub unlocks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub kind: ObjectiveKind,
    complete: bool,
}

impl Objective {
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn status_line(&self, counters: &RoundCounters) -> String {
        let line = self.kind.status_line(counters);
        if self.complete {
            format!("{line} done")
        } else {
            line
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quest {
    pub id: String,
    pub name: String,
    pub description: String,
    pub objectives: Vec<Objective>,
    pub reward: Cost,
    pub unlocks: Vec<String>,
}

impl Quest {
    pub fn is_complete(&self) -> bool {
        self.objectives.iter().all(Objective::is_complete)
    }

    pub fn status_lines(&self, counters: &RoundCounters) -> Vec<String> {
        self.objectives
            .iter()
            .map(|objective| objective.status_line(counters))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestReward {
    pub quest_id: String,
    pub reward: Cost,
    pub unlocks: Vec<String>,
}

/// Quests run in order; only the current one is evaluated.
#[derive(Debug, Clone, Default)]
pub struct QuestLog {
    quests: Vec<Quest>,
    current: usize,
}

impl QuestLog {
    pub fn from_defs(defs: Vec<QuestDef>) -> Result<Self, ContentError> {
        let mut seen = HashSet::new();
        let mut quests = Vec::with_capacity(defs.len());
        for def in defs {
            if !seen.insert(def.id.clone()) {
                return Err(ContentError::DuplicateId(def.id));
            }
            quests.push(Quest {
                id: def.id,
                name: def.name,
                description: def.description,
                objectives: def
                    .objectives
                    .into_iter()
                    .map(|kind| Objective {
                        kind,
                        complete: false,
                    })
                    .collect(),
                reward: def.reward,
                unlocks: def.unlocks,
            });
        }
        Ok(Self { quests, current: 0 })
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }

    pub fn current(&self) -> Option<&Quest> {
        self.quests.get(self.current)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn completed_count(&self) -> usize {
        self.current.min(self.quests.len())
    }

    /// Quests already handed in, oldest first.
    pub fn completed(&self) -> impl Iterator<Item = &Quest> {
        self.quests[..self.completed_count()].iter()
    }

    pub fn all_done(&self) -> bool {
        self.current >= self.quests.len()
    }

    /// Resumes at `index`, clamped to the end of the log.
    pub fn restore_progress(&mut self, index: usize) {
        self.current = index.min(self.quests.len());
    }

    /// Marks met objectives of the current quest. Marks stick. True when the quest is complete.
    pub fn evaluate(&mut self, counters: &RoundCounters) -> bool {
        let Some(quest) = self.quests.get_mut(self.current) else {
            return false;
        };
        for objective in quest.objectives.iter_mut().filter(|o| !o.complete) {
            if objective.kind.is_met(counters) {
                objective.complete = true;
                debug!(quest = %quest.id, objective = ?objective.kind, "quest_objective_complete");
            }
        }
        quest.is_complete()
    }

    /// Hands out the reward of a completed current quest and advances.
    pub fn complete_current(&mut self) -> Option<QuestReward> {
        let Some(quest) = self.quests.get(self.current) else {
            error!(index = self.current, count = self.quests.len(), "quest_no_current");
            return None;
        };
        if !quest.is_complete() {
            debug!(quest = %quest.id, "quest_not_yet_complete");
            return None;
        }
        let reward = QuestReward {
            quest_id: quest.id.clone(),
            reward: quest.reward,
            unlocks: quest.unlocks.clone(),
        };
        info!(
            quest = %reward.quest_id,
            gold = reward.reward.gold,
            exp = reward.reward.exp,
            unlocks = reward.unlocks.len(),
            "quest_completed"
        );
        self.current += 1;
        Some(reward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> QuestLog {
        QuestLog::from_defs(vec![
            QuestDef {
                id: "first_day".to_string(),
                name: "First day".to_string(),
                description: String::new(),
                objectives: vec![
                    ObjectiveKind::PopBubbles { count: 10 },
                    ObjectiveKind::ReachCombo { combo: 3 },
                ],
                reward: Cost { gold: 25, exp: 5 },
                unlocks: vec!["needle".to_string()],
            },
            QuestDef {
                id: "endurance".to_string(),
                name: "Endurance".to_string(),
                description: String::new(),
                objectives: vec![ObjectiveKind::SurviveRounds { rounds: 2 }],
                reward: Cost::exp(10),
                unlocks: Vec::new(),
            },
        ])
        .expect("quest log")
    }

    #[test]
    fn objectives_stay_marked_across_evaluations() {
        let mut quests = log();
        let first = RoundCounters {
            bubbles_popped: 12,
            best_combo: 1,
            ..RoundCounters::default()
        };
        assert!(!quests.evaluate(&first));
        let second = RoundCounters {
            best_combo: 4,
            ..RoundCounters::default()
        };
        assert!(quests.evaluate(&second));
    }

    #[test]
    fn complete_current_rewards_once_and_advances() {
        let mut quests = log();
        assert_eq!(quests.complete_current(), None);

        quests.evaluate(&RoundCounters {
            bubbles_popped: 10,
            best_combo: 3,
            ..RoundCounters::default()
        });
        let reward = quests.complete_current().expect("reward");
        assert_eq!(reward.quest_id, "first_day");
        assert_eq!(reward.reward, Cost { gold: 25, exp: 5 });
        assert_eq!(reward.unlocks, vec!["needle".to_string()]);
        assert_eq!(quests.current().map(|q| q.id.as_str()), Some("endurance"));
        assert_eq!(quests.completed_count(), 1);
        let done: Vec<&str> = quests.completed().map(|q| q.id.as_str()).collect();
        assert_eq!(done, vec!["first_day"]);
    }

    #[test]
    fn no_current_quest_yields_none() {
        let mut quests = log();
        quests.restore_progress(99);
        assert!(quests.all_done());
        assert!(quests.current().is_none());
        assert!(!quests.evaluate(&RoundCounters::default()));
        assert_eq!(quests.complete_current(), None);
    }

    #[test]
    fn status_lines_report_clamped_progress() {
        let quests = log();
        let counters = RoundCounters {
            bubbles_popped: 40,
            best_combo: 2,
            ..RoundCounters::default()
        };
        let lines = quests.current().expect("current").status_lines(&counters);
        assert_eq!(lines, vec!["Pop bubbles 10/10", "Reach combo 2/3"]);
    }

    #[test]
    fn absorb_sums_counts_and_keeps_best_combo() {
        let mut totals = RoundCounters {
            bubbles_popped: 5,
            best_combo: 6,
            gold_earned: 1,
            rounds_survived: 1,
        };
        totals.absorb(&RoundCounters {
            bubbles_popped: 7,
            best_combo: 4,
            gold_earned: 2,
            rounds_survived: 1,
        });
        assert_eq!(totals.bubbles_popped, 12);
        assert_eq!(totals.best_combo, 6);
        assert_eq!(totals.rounds_survived, 2);
    }

    #[test]
    fn objective_kinds_parse_from_tagged_json() {
        let parsed: Vec<ObjectiveKind> = serde_json::from_str(
            r#"[{"kind":"earn_gold","amount":50},{"kind":"survive_rounds","rounds":3}]"#,
        )
        .expect("parse");
        assert_eq!(
            parsed,
            vec![
                ObjectiveKind::EarnGold { amount: 50 },
                ObjectiveKind::SurviveRounds { rounds: 3 }
            ]
        );
    }
}
