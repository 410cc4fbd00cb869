//! The per-user aggregate document.
//!
//! This is the single source of truth held by the gateway. Stores keep derived
//! copies of their slice of it and reconcile by pulling the whole document.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::achievement::{AchievementStats, UnlockedAchievement};
use crate::calendar::Timestamp;
use crate::companion::CompanionData;
use crate::focus::{FocusSession, FocusStats};
use crate::goal::Goal;
use crate::types::{CompanionId, OwnerId};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub created_at: Timestamp,
    pub last_login: Timestamp,
    pub last_active: Timestamp,
}

/// Durations in minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct TimerSettings {
    pub work_duration: u32,
    pub short_break_duration: u32,
    pub long_break_duration: u32,
    pub long_break_interval: u32,
    pub auto_start_breaks: bool,
    pub auto_start_pomodoros: bool,
    pub notifications: bool,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            work_duration: 25,
            short_break_duration: 5,
            long_break_duration: 15,
            long_break_interval: 4,
            auto_start_breaks: false,
            auto_start_pomodoros: false,
            notifications: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ThemeSettings {
    pub dark_mode: bool,
    pub accent_color: String,
    pub background_id: String,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            dark_mode: true,
            accent_color: "#FF80AB".to_string(),
            background_id: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default)]
    pub selected_companion: Option<CompanionId>,
    #[serde(default)]
    pub timer_settings: TimerSettings,
    #[serde(default)]
    pub theme: ThemeSettings,
}

impl UserSettings {
    /// Selected companion, Sayori when none was picked.
    pub fn companion(&self) -> CompanionId {
        self.selected_companion.unwrap_or_default()
    }

    pub fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(companion) = update.selected_companion {
            self.selected_companion = Some(companion);
        }
        if let Some(timer) = &update.timer_settings {
            self.timer_settings = timer.clone();
        }
        if let Some(theme) = &update.theme {
            self.theme = theme.clone();
        }
    }
}

/// Partial settings change. Absent sections are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_companion: Option<CompanionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_settings: Option<TimerSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeSettings>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.selected_companion.is_none() && self.timer_settings.is_none() && self.theme.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct GoalBook {
    /// Minutes
    pub daily_goal: u32,
    /// Minutes
    pub weekly_goal: u32,
    #[serde(default)]
    pub list: Vec<Goal>,
    pub last_updated: Timestamp,
    #[serde(default)]
    pub completed_goals: u32,
    #[serde(default)]
    pub challenge_goals_completed: u32,
}

/// Items granted by achievement and goal rewards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    #[serde(default)]
    pub backgrounds: Vec<String>,
    #[serde(default)]
    pub sprites: Vec<String>,
    #[serde(default)]
    pub gifts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    pub base: UserProfile,
    #[serde(default)]
    pub settings: UserSettings,
    #[serde(default)]
    pub companions: BTreeMap<CompanionId, CompanionData>,
    #[serde(default)]
    pub focus_stats: FocusStats,
    #[serde(default)]
    pub recent_sessions: Vec<FocusSession>,
    pub goals: GoalBook,
    #[serde(default)]
    pub achievements: Vec<UnlockedAchievement>,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
    pub version: u32,
}

impl UserDocument {
    /// The document written on first sign-in.
    pub fn initial(owner: &OwnerId, email: &str, selected: CompanionId, now: Timestamp) -> Self {
        let display_name = email.split('@').next().unwrap_or_default().to_string();
        Self {
            base: UserProfile {
                uid: owner.to_string(),
                email: email.to_string(),
                display_name,
                created_at: now,
                last_login: now,
                last_active: now,
            },
            settings: UserSettings {
                selected_companion: Some(selected),
                ..Default::default()
            },
            companions: CompanionId::ALL
                .into_iter()
                .map(|id| (id, CompanionData::initial(id, now)))
                .collect(),
            focus_stats: FocusStats::default(),
            recent_sessions: Vec::new(),
            goals: GoalBook {
                daily_goal: 25,
                weekly_goal: 150,
                list: Vec::new(),
                last_updated: now,
                completed_goals: 0,
                challenge_goals_completed: 0,
            },
            achievements: Vec::new(),
            inventory: Inventory::default(),
            features: BTreeMap::new(),
            version: SCHEMA_VERSION,
        }
    }

    /// Companion state, created on first reference.
    pub fn companion_mut(&mut self, id: CompanionId, now: Timestamp) -> &mut CompanionData {
        self.companions
            .entry(id)
            .or_insert_with(|| CompanionData::initial(id, now))
    }

    pub fn unlocked_ids(&self) -> HashSet<String> {
        self.achievements.iter().map(|a| a.id.clone()).collect()
    }

    pub fn affinities(&self) -> BTreeMap<CompanionId, u32> {
        self.companions
            .iter()
            .map(|(id, data)| (*id, data.affinity_level))
            .collect()
    }

    /// Cumulative numbers for a full achievement sweep.
    pub fn achievement_stats(&self) -> AchievementStats {
        AchievementStats {
            total_focus_minutes: self.focus_stats.total_focus_minutes(),
            total_sessions: self.focus_stats.total_sessions,
            streak_days: self.focus_stats.daily_streak,
            completed_goals: self.goals.completed_goals,
            challenge_goals_completed: self.goals.challenge_goals_completed,
            affinities: self.affinities(),
        }
    }
}
