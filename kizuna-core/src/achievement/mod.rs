//! Achievement catalog and per-user unlock records.
//!
//! # Key Components
//!
//! - [`ACHIEVEMENTS`]: the immutable catalog
//! - [`AchievementCheck`]: threshold evaluators run after stat-changing events
//! - [`dedupe_unlocked`] / [`diagnose`]: repair helpers for historical duplicates

pub mod evaluate;
pub mod repair;

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::calendar::Timestamp;
use crate::types::CompanionId;

pub use evaluate::{is_holiday, newly_unlocked, AchievementCheck, AchievementStats};
pub use repair::{dedupe_unlocked, diagnose, AchievementDiagnostics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    Focus,
    Streak,
    Companion,
    Goal,
    Hidden,
}

/// What a threshold is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    Minutes,
    Sessions,
    Streak,
    Affinity,
    Goals,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub kind: RequirementKind,
    pub value: u32,
}

/// Where an unlocked reward is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    Background,
    Sprite,
    Gift,
    Feature,
}

impl RewardKind {
    /// Inventory array path for item rewards. Features are flags instead.
    pub fn inventory_field(&self) -> Option<&'static str> {
        match self {
            Self::Background => Some("inventory.backgrounds"),
            Self::Sprite => Some("inventory.sprites"),
            Self::Gift => Some("inventory.gifts"),
            Self::Feature => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reward {
    pub kind: RewardKind,
    pub id: &'static str,
    pub description: &'static str,
}

/// Catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub kind: AchievementKind,
    pub requirement: Requirement,
    pub reward: Option<Reward>,
}

/// Per-user record. At most one per achievement id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct UnlockedAchievement {
    pub id: String,
    pub unlocked_at: Timestamp,
}

const fn entry(
    id: &'static str,
    title: &'static str,
    description: &'static str,
    icon: &'static str,
    kind: AchievementKind,
    requirement: (RequirementKind, u32),
    reward: (RewardKind, &'static str, &'static str),
) -> Achievement {
    Achievement {
        id,
        title,
        description,
        icon,
        kind,
        requirement: Requirement {
            kind: requirement.0,
            value: requirement.1,
        },
        reward: Some(Reward {
            kind: reward.0,
            id: reward.1,
            description: reward.2,
        }),
    }
}

use self::AchievementKind as K;
use self::RequirementKind as Q;
use self::RewardKind as W;

pub static ACHIEVEMENTS: [Achievement; 27] = [
    // Focus
    entry("first_session", "First Step", "Complete your first focus session", "⭐", K::Focus, (Q::Minutes, 1), (W::Feature, "daily_quote", "Unlocks daily motivational quotes from your companion")),
    entry("dedication", "Dedicated Student", "Accumulate 10 hours of focus time", "📚", K::Focus, (Q::Minutes, 600), (W::Background, "sunset_bg", "Unlocks the peaceful sunset background")),
    entry("master", "Focus Master", "Complete a 50-minute session without breaks", "🎯", K::Focus, (Q::Minutes, 50), (W::Feature, "custom_timer", "Unlocks custom timer settings")),
    entry("centurion", "Centurion", "Complete 100 focus sessions", "💯", K::Focus, (Q::Sessions, 100), (W::Background, "galaxy_bg", "Unlocks the cosmic galaxy background")),
    entry("marathon", "Focus Marathon", "Complete a 2-hour focus session", "🏃", K::Focus, (Q::Minutes, 120), (W::Gift, "golden_trophy", "A special trophy gift for your companion")),
    // Streak
    entry("weekly_warrior", "Weekly Warrior", "Maintain a 7-day focus streak", "📅", K::Streak, (Q::Streak, 7), (W::Feature, "streak_calendar", "Unlocks a visual streak calendar")),
    entry("monthly_master", "Monthly Master", "Maintain a 30-day focus streak", "🗓️", K::Streak, (Q::Streak, 30), (W::Sprite, "special_outfit", "Unlocks a special outfit for your companion")),
    entry("legendary", "Legendary Dedication", "Maintain a 100-day focus streak", "👑", K::Streak, (Q::Streak, 100), (W::Feature, "custom_themes", "Unlocks the ability to customize app themes")),
    // Companion
    entry("sayori_friend", "Sayori's Friend", "Reach affinity level 10 with Sayori", "💕", K::Companion, (Q::Affinity, 10), (W::Sprite, "sayori_casual", "Unlocks Sayori's casual outfit")),
    entry("sayori_bestie", "Sayori's Best Friend", "Reach affinity level 50 with Sayori", "💖", K::Companion, (Q::Affinity, 50), (W::Sprite, "sayori_special", "Unlocks Sayori's special outfit")),
    entry("natsuki_friend", "Natsuki's Friend", "Reach affinity level 10 with Natsuki", "💝", K::Companion, (Q::Affinity, 10), (W::Sprite, "natsuki_casual", "Unlocks Natsuki's casual outfit")),
    entry("natsuki_bestie", "Natsuki's Best Friend", "Reach affinity level 50 with Natsuki", "💘", K::Companion, (Q::Affinity, 50), (W::Sprite, "natsuki_special", "Unlocks Natsuki's special outfit")),
    entry("yuri_friend", "Yuri's Friend", "Reach affinity level 10 with Yuri", "💜", K::Companion, (Q::Affinity, 10), (W::Sprite, "yuri_casual", "Unlocks Yuri's casual outfit")),
    entry("yuri_bestie", "Yuri's Best Friend", "Reach affinity level 50 with Yuri", "💞", K::Companion, (Q::Affinity, 50), (W::Sprite, "yuri_special", "Unlocks Yuri's special outfit")),
    entry("monika_friend", "Monika's Friend", "Reach affinity level 10 with Monika", "💚", K::Companion, (Q::Affinity, 10), (W::Sprite, "monika_casual", "Unlocks Monika's casual outfit")),
    entry("monika_bestie", "Monika's Best Friend", "Reach affinity level 50 with Monika", "💓", K::Companion, (Q::Affinity, 50), (W::Sprite, "monika_special", "Unlocks Monika's special outfit")),
    entry("companion_collector", "Friend to All", "Reach affinity level 10 with all companions", "🌟", K::Companion, (Q::Special, 0), (W::Background, "club_room", "Unlocks the Literature Club room background")),
    // Goals
    entry("your_first_goal", "Your First Goal", "Complete your first study goal", "📝", K::Goal, (Q::Goals, 1), (W::Feature, "goal_templates", "Unlocks goal templates for quick creation")),
    entry("achiever", "Achiever", "Complete 5 study goals", "🏆", K::Goal, (Q::Goals, 5), (W::Gift, "achievement_medal", "A special medal gift for your companion")),
    entry("overachiever", "Overachiever", "Complete 25 study goals", "🏅", K::Goal, (Q::Goals, 25), (W::Feature, "advanced_stats", "Unlocks advanced goal statistics and insights")),
    entry("challenge_master", "Challenge Master", "Complete 10 challenge-type goals", "🎮", K::Goal, (Q::Special, 10), (W::Feature, "custom_challenges", "Unlocks the ability to create custom challenges")),
    // Hidden
    entry("night_owl", "Night Owl", "Study for 2 hours after midnight", "🦉", K::Hidden, (Q::Minutes, 120), (W::Background, "night_sky", "Unlocks the starry night sky background")),
    entry("early_bird", "Early Bird", "Start a session before 7 AM", "🌅", K::Hidden, (Q::Minutes, 1), (W::Background, "sunrise", "Unlocks the beautiful sunrise background")),
    entry("weekend_warrior", "Weekend Warrior", "Complete 4 hours of focus time on a weekend", "🏋️", K::Hidden, (Q::Minutes, 240), (W::Gift, "weekend_badge", "A special weekend warrior badge for your companion")),
    entry("holiday_hero", "Holiday Hero", "Study on a major holiday", "🎄", K::Hidden, (Q::Special, 0), (W::Sprite, "holiday_outfit", "Unlocks a holiday-themed outfit for your companion")),
    entry("poetry_lover", "Poetry Lover", "Write a poem for your companion", "📜", K::Hidden, (Q::Special, 0), (W::Feature, "poem_sharing", "Unlocks the ability to share poems with your companion")),
    entry("just_monika", "???", "Discovered by those who truly understand", "👁️", K::Hidden, (Q::Special, 0), (W::Feature, "special_dialogue", "Unlocks special dialogue options with Monika")),
];

pub fn find_achievement(id: &str) -> Option<&'static Achievement> {
    ACHIEVEMENTS.iter().find(|a| a.id == id)
}

pub fn friend_achievement_id(companion: CompanionId) -> String {
    format!("{}_friend", companion)
}

pub fn bestie_achievement_id(companion: CompanionId) -> String {
    format!("{}_bestie", companion)
}
