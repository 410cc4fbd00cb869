//! Threshold evaluators.
//!
//! Every evaluator is a pure function of cumulative stats. Unmet thresholds
//! are simply absent from the result; nothing here fails.

use chrono::{Datelike, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::{bestie_achievement_id, friend_achievement_id};
use crate::calendar::LocalTime;
use crate::types::CompanionId;

const FIRST_SESSION_MINUTES: u32 = 1;
const MASTER_SESSION_MINUTES: u32 = 50;
const MARATHON_SESSION_MINUTES: u32 = 120;
const DEDICATION_TOTAL_MINUTES: u32 = 600;
const CENTURION_SESSIONS: u32 = 100;

const STREAK_THRESHOLDS: [(u32, &str); 3] = [
    (7, "weekly_warrior"),
    (30, "monthly_master"),
    (100, "legendary"),
];

const GOAL_THRESHOLDS: [(u32, &str); 3] = [
    (1, "your_first_goal"),
    (5, "achiever"),
    (25, "overachiever"),
];
const CHALLENGE_MASTER_GOALS: u32 = 10;

const FRIEND_AFFINITY: u32 = 10;
const BESTIE_AFFINITY: u32 = 50;
const MAX_AFFINITY: u32 = 100;

const NIGHT_OWL_MINUTES: u32 = 120;
const WEEKEND_WARRIOR_MINUTES: u32 = 240;
const HOLIDAY_HERO_MINUTES: u32 = 30;

/// Full-stat sweep input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementStats {
    pub total_focus_minutes: u32,
    pub total_sessions: u32,
    pub streak_days: u32,
    pub completed_goals: u32,
    pub challenge_goals_completed: u32,
    #[serde(default)]
    pub affinities: BTreeMap<CompanionId, u32>,
}

/// One evaluation request. Serializable so it can sit in the pending queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum AchievementCheck {
    Focus {
        total_minutes: u32,
        session_minutes: u32,
        total_sessions: u32,
    },
    Streak {
        days: u32,
    },
    Companion {
        companion: CompanionId,
        affinity: u32,
        #[serde(default)]
        all_affinities: Option<BTreeMap<CompanionId, u32>>,
    },
    Goal {
        completed_goals: u32,
        challenge_goals_completed: u32,
    },
    TimeBased {
        started_at: LocalTime,
        session_minutes: u32,
    },
    /// Focus and time-based rules for one finished session
    Session {
        started_at: LocalTime,
        session_minutes: u32,
        total_minutes: u32,
        total_sessions: u32,
    },
    All(AchievementStats),
}

impl AchievementCheck {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Focus { .. } => "focus",
            Self::Streak { .. } => "streak",
            Self::Companion { .. } => "companion",
            Self::Goal { .. } => "goal",
            Self::TimeBased { .. } => "time",
            Self::Session { .. } => "session",
            Self::All(_) => "all",
        }
    }

    /// Ids whose thresholds are met, in catalog order, without duplicates.
    pub fn evaluate(&self) -> Vec<String> {
        let mut ids = Vec::new();
        match self {
            Self::Focus {
                total_minutes,
                session_minutes,
                total_sessions,
            } => focus(&mut ids, *total_minutes, *session_minutes, *total_sessions),
            Self::Streak { days } => streak(&mut ids, *days),
            Self::Companion {
                companion,
                affinity,
                all_affinities,
            } => companion_bond(&mut ids, *companion, *affinity, all_affinities.as_ref()),
            Self::Goal {
                completed_goals,
                challenge_goals_completed,
            } => goals(&mut ids, *completed_goals, *challenge_goals_completed),
            Self::TimeBased {
                started_at,
                session_minutes,
            } => time_based(&mut ids, started_at, *session_minutes),
            Self::Session {
                started_at,
                session_minutes,
                total_minutes,
                total_sessions,
            } => {
                focus(&mut ids, *total_minutes, *session_minutes, *total_sessions);
                time_based(&mut ids, started_at, *session_minutes);
            }
            Self::All(stats) => {
                focus(&mut ids, stats.total_focus_minutes, 0, stats.total_sessions);
                streak(&mut ids, stats.streak_days);
                goals(&mut ids, stats.completed_goals, stats.challenge_goals_completed);
                for (companion, affinity) in &stats.affinities {
                    companion_bond(&mut ids, *companion, *affinity, Some(&stats.affinities));
                }
            }
        }

        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(id.clone()));
        ids
    }
}

fn focus(ids: &mut Vec<String>, total_minutes: u32, session_minutes: u32, total_sessions: u32) {
    if session_minutes >= FIRST_SESSION_MINUTES {
        ids.push("first_session".to_string());
    }
    if session_minutes >= MASTER_SESSION_MINUTES {
        ids.push("master".to_string());
    }
    if session_minutes >= MARATHON_SESSION_MINUTES {
        ids.push("marathon".to_string());
    }
    if total_minutes >= DEDICATION_TOTAL_MINUTES {
        ids.push("dedication".to_string());
    }
    if total_sessions >= CENTURION_SESSIONS {
        ids.push("centurion".to_string());
    }
}

fn streak(ids: &mut Vec<String>, days: u32) {
    for (threshold, id) in STREAK_THRESHOLDS {
        if days >= threshold {
            ids.push(id.to_string());
        }
    }
}

fn companion_bond(
    ids: &mut Vec<String>,
    companion: CompanionId,
    affinity: u32,
    all: Option<&BTreeMap<CompanionId, u32>>,
) {
    if affinity >= FRIEND_AFFINITY {
        ids.push(friend_achievement_id(companion));
    }
    if affinity >= BESTIE_AFFINITY {
        ids.push(bestie_achievement_id(companion));
    }
    if let Some(all) = all {
        let everyone_friends = CompanionId::ALL
            .iter()
            .all(|c| all.get(c).copied().unwrap_or(0) >= FRIEND_AFFINITY);
        if everyone_friends {
            ids.push("companion_collector".to_string());
        }
    }
    if companion == CompanionId::Monika && affinity >= MAX_AFFINITY {
        ids.push("just_monika".to_string());
    }
}

fn goals(ids: &mut Vec<String>, completed: u32, challenges: u32) {
    for (threshold, id) in GOAL_THRESHOLDS {
        if completed >= threshold {
            ids.push(id.to_string());
        }
    }
    if challenges >= CHALLENGE_MASTER_GOALS {
        ids.push("challenge_master".to_string());
    }
}

fn time_based(ids: &mut Vec<String>, started_at: &LocalTime, session_minutes: u32) {
    let hour = started_at.hour();
    let weekend = matches!(started_at.weekday(), Weekday::Sat | Weekday::Sun);

    if hour < 5 && session_minutes >= NIGHT_OWL_MINUTES {
        ids.push("night_owl".to_string());
    }
    if hour < 7 && session_minutes >= 1 {
        ids.push("early_bird".to_string());
    }
    if weekend && session_minutes >= WEEKEND_WARRIOR_MINUTES {
        ids.push("weekend_warrior".to_string());
    }
    if is_holiday(started_at) && session_minutes >= HOLIDAY_HERO_MINUTES {
        ids.push("holiday_hero".to_string());
    }
}

/// Fixed calendar table, evaluated on the local date.
pub fn is_holiday(at: &LocalTime) -> bool {
    matches!(
        (at.month(), at.day()),
        (1, 1)
            | (2, 14)
            | (3, 17)
            | (4, 22..=25)
            | (7, 4)
            | (10, 31)
            | (11, 22..=28)
            | (12, 24)
            | (12, 25)
            | (12, 31)
    )
}

/// Drop candidates that are already unlocked.
pub fn newly_unlocked(candidates: Vec<String>, already: &HashSet<String>) -> Vec<String> {
    candidates
        .into_iter()
        .filter(|id| !already.contains(id))
        .collect()
}
