//! Dialogue selection.
//!
//! Lines live in a per-companion, per-category catalog shipped as YAML. A
//! request either names a category or lets the context pick one, entries are
//! filtered by their conditions, sorted by priority, and one is sampled
//! according to the engine's [`SamplingPolicy`].
//!
//! ```text
//! request ──► category ──► condition filter ──► priority sort ──► sample
//!   │           │                                                   │
//!   │           └─ context order: achievement > streak > affinity   │
//!   │              > break > task completed > in session            │
//!   │              then time of day, then greeting                  │
//!   └─────────────────────────────── fallback "[Default <c> dialogue]"
//! ```

mod catalog;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use crate::calendar::{time_of_day, LocalTime};
use crate::companion::{DialogueEvent, EventTrigger};
use crate::types::{CatalogError, CompanionId, CompanionMood, TimeOfDay, ValidationError};

pub use catalog::{CompanionLines, DialogueCatalog, SessionLines, TimeOfDayLines};

const BUILTIN_CATALOG: &str = include_str!("../../data/dialogue.yaml");

/// Basic gates every entry declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueConditions {
    pub min_affinity: u32,
    pub max_affinity: u32,
    pub mood: CompanionMood,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<TimeOfDay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consecutive_days: Option<u32>,
}

/// Focus numbers, all in minutes. A zero requirement is no requirement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusSnapshot {
    #[serde(default)]
    pub current_session_time: u32,
    #[serde(default)]
    pub daily_focus_time: u32,
    #[serde(default)]
    pub breaks_taken: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_sessions: Option<u32>,
}

/// What just happened. Used both as the caller's context and as an entry's
/// required context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_stats: Option<FocusSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_break_time: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_completed: Option<bool>,
    /// An achievement id, or `any` in a requirement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievement_unlocked: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak_milestone: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity_milestone: Option<u32>,
}

impl DialogueContext {
    /// Does this (current) context satisfy `required`?
    pub fn satisfies(&self, required: &DialogueContext) -> bool {
        if required.is_break_time.is_some() && required.is_break_time != self.is_break_time {
            return false;
        }
        if required.task_completed.is_some() && required.task_completed != self.task_completed {
            return false;
        }
        if let Some(achievement) = &required.achievement_unlocked {
            if achievement != "any" && Some(achievement) != self.achievement_unlocked.as_ref() {
                return false;
            }
        }
        if let Some(required_streak) = required.streak_milestone.filter(|s| *s > 0) {
            if self.streak_milestone.unwrap_or(0) < required_streak {
                return false;
            }
        }
        if let Some(required_affinity) = required.affinity_milestone.filter(|a| *a > 0) {
            if self.affinity_milestone != Some(required_affinity) {
                return false;
            }
        }
        if let (Some(req), Some(cur)) = (&required.focus_stats, &self.focus_stats) {
            if cur.current_session_time < req.current_session_time
                || cur.daily_focus_time < req.daily_focus_time
                || cur.breaks_taken < req.breaks_taken
            {
                return false;
            }
            if let (Some(req_sessions), Some(cur_sessions)) = (req.total_sessions, cur.total_sessions) {
                if cur_sessions < req_sessions {
                    return false;
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueEntry {
    pub text: String,
    pub conditions: DialogueConditions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<DialogueContext>,
    #[serde(default)]
    pub priority: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogueCategory {
    Greeting,
    Farewell,
    Encouragement,
    Achievement,
    Streak,
    Affinity,
    SessionStart,
    SessionDuring,
    SessionEnd,
    SessionBreak,
    TimeOfDay(TimeOfDay),
}

impl FromStr for DialogueCategory {
    type Err = ValidationError;

    /// Accepts flat names and dotted sub-categories such as `session.start`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let category = match s {
            "greeting" => Self::Greeting,
            "farewell" => Self::Farewell,
            "encouragement" => Self::Encouragement,
            "achievement" => Self::Achievement,
            "streak" => Self::Streak,
            "affinity" => Self::Affinity,
            "session.start" => Self::SessionStart,
            "session.during" => Self::SessionDuring,
            "session.end" => Self::SessionEnd,
            "session.break" => Self::SessionBreak,
            "timeOfDay.morning" | "time_of_day.morning" => Self::TimeOfDay(TimeOfDay::Morning),
            "timeOfDay.afternoon" | "time_of_day.afternoon" => Self::TimeOfDay(TimeOfDay::Afternoon),
            "timeOfDay.evening" | "time_of_day.evening" => Self::TimeOfDay(TimeOfDay::Evening),
            "timeOfDay.night" | "time_of_day.night" => Self::TimeOfDay(TimeOfDay::Night),
            other => return Err(ValidationError::UnknownDialogueCategory(other.to_string())),
        };
        Ok(category)
    }
}

/// How one line is drawn from the filtered, priority-sorted candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingPolicy {
    /// Uniform over every surviving entry, whatever its priority
    #[default]
    FullPool,
    /// Uniform over the entries sharing the highest priority
    TopTier,
}

#[derive(Debug, Clone)]
pub struct DialogueRequest {
    pub companion: CompanionId,
    pub mood: CompanionMood,
    pub affinity: u32,
    pub consecutive_days: u32,
    pub context: Option<DialogueContext>,
    pub category: Option<DialogueCategory>,
    pub now: LocalTime,
}

impl DialogueRequest {
    pub fn new(companion: CompanionId, mood: CompanionMood, affinity: u32, now: LocalTime) -> Self {
        Self {
            companion,
            mood,
            affinity,
            consecutive_days: 0,
            context: None,
            category: None,
            now,
        }
    }

    pub fn with_streak(mut self, consecutive_days: u32) -> Self {
        self.consecutive_days = consecutive_days;
        self
    }

    pub fn with_context(mut self, context: DialogueContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_category(mut self, category: DialogueCategory) -> Self {
        self.category = Some(category);
        self
    }
}

/// The selected line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueLine {
    pub text: String,
    /// No entry matched and `text` is the placeholder
    pub is_fallback: bool,
}

impl DialogueLine {
    fn fallback(companion: CompanionId) -> Self {
        Self {
            text: format!("[Default {} dialogue]", companion),
            is_fallback: true,
        }
    }
}

pub struct DialogueEngine {
    catalog: DialogueCatalog,
    sampling: SamplingPolicy,
}

impl DialogueEngine {
    /// Engine over the catalog compiled into the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        Ok(Self {
            catalog: DialogueCatalog::from_yaml(yaml)?,
            sampling: SamplingPolicy::default(),
        })
    }

    pub fn with_sampling(mut self, sampling: SamplingPolicy) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn sampling(&self) -> SamplingPolicy {
        self.sampling
    }

    pub fn catalog(&self) -> &DialogueCatalog {
        &self.catalog
    }

    fn filter<'a>(&self, entries: &'a [DialogueEntry], request: &DialogueRequest) -> Vec<&'a DialogueEntry> {
        let band = time_of_day(&request.now);
        entries
            .iter()
            .filter(|entry| {
                let c = &entry.conditions;
                let basic = request.affinity >= c.min_affinity
                    && request.affinity <= c.max_affinity
                    && c.mood == request.mood
                    && c.consecutive_days.map_or(true, |d| request.consecutive_days >= d)
                    && c.time_of_day.map_or(true, |t| t == band);
                if !basic {
                    return false;
                }
                match (&entry.context, &request.context) {
                    (Some(required), Some(current)) => current.satisfies(required),
                    _ => true,
                }
            })
            .collect()
    }

    fn context_category(context: &DialogueContext) -> Option<DialogueCategory> {
        if context.achievement_unlocked.is_some() {
            Some(DialogueCategory::Achievement)
        } else if context.streak_milestone.unwrap_or(0) > 0 {
            Some(DialogueCategory::Streak)
        } else if context.affinity_milestone.unwrap_or(0) > 0 {
            Some(DialogueCategory::Affinity)
        } else if context.is_break_time == Some(true) {
            Some(DialogueCategory::SessionBreak)
        } else if context.task_completed == Some(true) {
            Some(DialogueCategory::SessionEnd)
        } else if context
            .focus_stats
            .as_ref()
            .is_some_and(|f| f.current_session_time > 0)
        {
            Some(DialogueCategory::SessionDuring)
        } else {
            None
        }
    }

    /// Matching entries in descending priority. Ties keep catalog order.
    pub fn candidates(&self, request: &DialogueRequest) -> Vec<&DialogueEntry> {
        let Some(lines) = self.catalog.lines(request.companion) else {
            return Vec::new();
        };

        let mut matched = match request.category {
            Some(category) => self.filter(lines.entries(category), request),
            None => {
                let mut matched = request
                    .context
                    .as_ref()
                    .and_then(Self::context_category)
                    .map(|category| self.filter(lines.entries(category), request))
                    .unwrap_or_default();
                if matched.is_empty() {
                    let band = DialogueCategory::TimeOfDay(time_of_day(&request.now));
                    matched = self.filter(lines.entries(band), request);
                }
                if matched.is_empty() {
                    matched = self.filter(lines.entries(DialogueCategory::Greeting), request);
                }
                matched
            }
        };

        matched.sort_by(|a, b| b.priority.cmp(&a.priority));
        matched
    }

    pub fn select<R: Rng + ?Sized>(&self, request: &DialogueRequest, rng: &mut R) -> DialogueLine {
        let candidates = self.candidates(request);
        let pool: &[&DialogueEntry] = match (self.sampling, candidates.first()) {
            (SamplingPolicy::TopTier, Some(top)) => {
                let tier = candidates.iter().take_while(|e| e.priority == top.priority).count();
                &candidates[..tier]
            }
            _ => &candidates,
        };

        match pool.choose(rng) {
            Some(entry) => DialogueLine {
                text: entry.text.clone(),
                is_fallback: false,
            },
            None => {
                debug!(companion = %request.companion, mood = ?request.mood, affinity = request.affinity, "No dialogue matched, using fallback");
                DialogueLine::fallback(request.companion)
            }
        }
    }

    pub fn achievement_line<R: Rng + ?Sized>(
        &self,
        companion: CompanionId,
        mood: CompanionMood,
        affinity: u32,
        achievement_id: &str,
        now: LocalTime,
        rng: &mut R,
    ) -> DialogueLine {
        let request = DialogueRequest::new(companion, mood, affinity, now)
            .with_context(DialogueContext {
                achievement_unlocked: Some(achievement_id.to_string()),
                ..Default::default()
            })
            .with_category(DialogueCategory::Achievement);
        self.select(&request, rng)
    }

    pub fn streak_line<R: Rng + ?Sized>(
        &self,
        companion: CompanionId,
        mood: CompanionMood,
        affinity: u32,
        streak_days: u32,
        now: LocalTime,
        rng: &mut R,
    ) -> DialogueLine {
        let request = DialogueRequest::new(companion, mood, affinity, now)
            .with_streak(streak_days)
            .with_context(DialogueContext {
                streak_milestone: Some(streak_days),
                ..Default::default()
            })
            .with_category(DialogueCategory::Streak);
        self.select(&request, rng)
    }

    pub fn session_start_line<R: Rng + ?Sized>(
        &self,
        companion: CompanionId,
        mood: CompanionMood,
        affinity: u32,
        consecutive_days: u32,
        now: LocalTime,
        rng: &mut R,
    ) -> DialogueLine {
        let request = DialogueRequest::new(companion, mood, affinity, now)
            .with_streak(consecutive_days)
            .with_category(DialogueCategory::SessionStart);
        self.select(&request, rng)
    }

    pub fn session_complete_line<R: Rng + ?Sized>(
        &self,
        companion: CompanionId,
        mood: CompanionMood,
        affinity: u32,
        session: FocusSnapshot,
        now: LocalTime,
        rng: &mut R,
    ) -> DialogueLine {
        let request = DialogueRequest::new(companion, mood, affinity, now)
            .with_context(DialogueContext {
                focus_stats: Some(session),
                task_completed: Some(true),
                ..Default::default()
            })
            .with_category(DialogueCategory::SessionEnd);
        self.select(&request, rng)
    }

    /// Build a titled one-line event for a trigger.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_event<R: Rng + ?Sized>(
        &self,
        companion: CompanionId,
        trigger: EventTrigger,
        trigger_value: u32,
        mood: CompanionMood,
        affinity: u32,
        now: LocalTime,
        rng: &mut R,
    ) -> DialogueEvent {
        let base = DialogueRequest::new(companion, mood, affinity, now);
        let (title, request) = match trigger {
            EventTrigger::Affinity => (
                format!("Affinity Level {trigger_value}"),
                base.with_context(DialogueContext {
                    affinity_milestone: Some(trigger_value),
                    ..Default::default()
                })
                .with_category(DialogueCategory::Affinity),
            ),
            EventTrigger::Streak => (
                format!("{trigger_value}-Day Streak"),
                base.with_streak(trigger_value)
                    .with_context(DialogueContext {
                        streak_milestone: Some(trigger_value),
                        ..Default::default()
                    })
                    .with_category(DialogueCategory::Streak),
            ),
            EventTrigger::Achievement => (
                "New Achievement".to_string(),
                base.with_context(DialogueContext {
                    achievement_unlocked: Some("any".to_string()),
                    ..Default::default()
                })
                .with_category(DialogueCategory::Achievement),
            ),
            EventTrigger::Inactivity => {
                let mut request = base.with_category(DialogueCategory::Farewell);
                request.mood = CompanionMood::Sad;
                ("We Miss You".to_string(), request)
            }
            EventTrigger::Daily => (
                "Daily Check-in".to_string(),
                base.with_category(DialogueCategory::Greeting),
            ),
        };

        let line = self.select(&request, rng);
        DialogueEvent {
            id: format!(
                "{}_{}_{}",
                companion,
                trigger.as_str(),
                now.with_timezone(&Utc).timestamp_millis()
            ),
            trigger,
            trigger_value: Some(trigger_value),
            title,
            content: vec![line.text],
            seen: false,
        }
    }
}

#[cfg(test)]
mod tests;
