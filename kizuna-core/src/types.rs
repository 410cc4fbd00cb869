//! Shared identifiers, enums and errors.
//!
//! With the `typescript` feature enabled, these types can be exported to TypeScript
//! using ts-rs so the web client reads the same shapes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Identifier of the user that owns a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The four fixed companions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum CompanionId {
    Sayori,
    Natsuki,
    Yuri,
    Monika,
}

impl CompanionId {
    pub const ALL: [CompanionId; 4] = [Self::Sayori, Self::Natsuki, Self::Yuri, Self::Monika];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sayori => "sayori",
            Self::Natsuki => "natsuki",
            Self::Yuri => "yuri",
            Self::Monika => "monika",
        }
    }

    /// Display name shown next to dialogue.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Sayori => "Sayori",
            Self::Natsuki => "Natsuki",
            Self::Yuri => "Yuri",
            Self::Monika => "Monika",
        }
    }
}

impl Default for CompanionId {
    fn default() -> Self {
        Self::Sayori
    }
}

impl fmt::Display for CompanionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompanionId {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownCompanion(s.to_string()))
    }
}

/// Companion mood, recomputed from how recently the user interacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum CompanionMood {
    Happy,
    Neutral,
    Annoyed,
    Sad,
}

impl Default for CompanionMood {
    fn default() -> Self {
        Self::Happy
    }
}

/// Wall-clock band used by dialogue conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// 5-12 morning, 12-17 afternoon, 17-21 evening, everything else night.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=20 => Self::Evening,
            _ => Self::Night,
        }
    }
}

/// Errors raised synchronously to the caller. Never enqueued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Goal title must not be empty")]
    EmptyTitle,

    #[error("Goal target must be at least one minute")]
    ZeroTarget,

    #[error("Goal deadline is in the past")]
    DeadlineInPast,

    #[error("Goal not found: {0}")]
    UnknownGoal(String),

    #[error("Goal {0} was assigned by the system and cannot be changed")]
    ProtectedGoal(String),

    #[error("Unknown companion: {0}")]
    UnknownCompanion(String),

    #[error("Gift not found: {0}")]
    UnknownGift(String),

    #[error("Gift not unlocked yet: {0}")]
    LockedGift(String),

    #[error("Unknown dialogue category: {0}")]
    UnknownDialogueCategory(String),
}

/// Raised when an embedded catalog cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Dialogue catalog is malformed: {0}")]
    Malformed(#[from] serde_yaml::Error),

    #[error("Dialogue catalog has no entries for {0}")]
    MissingCompanion(CompanionId),
}

pub type Result<T> = std::result::Result<T, ValidationError>;
