//! Kizuna Core - domain model and rule engines for the focus companion
//!
//! Everything here is pure: no I/O, no async, no clock. Callers pass the
//! current time and a random source in.
//!
//! - **Goals**: progress, completion, and the daily/weekly/challenge refresh cycle
//! - **Achievements**: catalog, threshold evaluators, unlock-list repair
//! - **Companions**: affinity, mood, unlockables, gifts, fire-once events
//! - **Dialogue**: condition and priority matching over a YAML catalog
//! - **Focus**: session records and streak/day/week counters
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      UserDocument                        │
//! │  settings │ companions │ focusStats │ goals │ achievements│
//! └─────┬───────────┬────────────┬─────────┬──────────┬──────┘
//!       │           │            │         │          │
//!       │     ┌─────▼─────┐ ┌────▼───┐ ┌───▼───┐ ┌────▼──────┐
//!       │     │ companion │ │ focus  │ │ goal  │ │achievement│
//!       │     └─────┬─────┘ └────────┘ └───────┘ └───────────┘
//!       │           │
//!       │     ┌─────▼─────┐
//!       └────►│ dialogue  │
//!             └───────────┘
//! ```

pub mod achievement;
pub mod calendar;
pub mod companion;
pub mod dialogue;
pub mod document;
pub mod focus;
pub mod goal;
pub mod types;

pub use achievement::{Achievement, AchievementCheck, AchievementStats, UnlockedAchievement, ACHIEVEMENTS};
pub use calendar::{LocalTime, Timestamp};
pub use companion::{CompanionData, GiftOutcome};
pub use dialogue::{DialogueEngine, DialogueLine, DialogueRequest, SamplingPolicy};
pub use document::{SettingsUpdate, UserDocument};
pub use focus::{FocusSession, FocusStats};
pub use goal::{Goal, GoalEdit, GoalOrigin, GoalReward, GoalType, NewGoal, ProgressOutcome};
pub use types::*;
