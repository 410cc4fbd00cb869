//! Goals: user-authored targets and companion-assigned daily, weekly and
//! challenge goals.
//!
//! A goal's `origin` is fixed at creation. Only [`GoalOrigin::User`] goals may
//! be edited, and system goals can only be removed once they have expired.

pub mod catalog;
pub mod refresh;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::calendar::Timestamp;
use crate::types::{CompanionId, Result, ValidationError};

pub use catalog::{assign_random_companion_goal, templates_for, GoalTemplate};
pub use refresh::{refresh_goals, GoalRefresh, GoalSlot};

/// Goal cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Daily,
    Weekly,
    Challenge,
    Custom,
}

/// Who created a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum GoalOrigin {
    /// Authored directly by the user
    User,
    /// Drawn by the refresh cycle
    System,
    /// Assigned on request by a companion
    Companion,
}

/// Reward granted when a goal is completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum GoalReward {
    Affinity(u32),
    Achievement(String),
    Background(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub description: String,
    pub target_minutes: u32,
    pub current_minutes: u32,
    pub deadline: Timestamp,
    pub created_at: Timestamp,
    pub completed: bool,
    #[serde(rename = "type")]
    pub goal_type: GoalType,
    pub origin: GoalOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companion_id: Option<CompanionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<GoalReward>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

/// Fields supplied by the user when authoring a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub title: String,
    pub description: String,
    pub target_minutes: u32,
    pub deadline: Timestamp,
}

/// Partial edit of a user goal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalEdit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_minutes: Option<u32>,
}

/// Result of applying minutes to a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// Minutes were added and the goal is still open
    Advanced,
    /// This call crossed the target
    Completed,
    /// The goal was already complete, nothing changed
    Ignored,
}

pub(crate) fn new_goal_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

impl Goal {
    /// Build a user goal, rejecting drafts the UI should never submit.
    pub fn user(draft: NewGoal, now: Timestamp) -> Result<Self> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if draft.target_minutes == 0 {
            return Err(ValidationError::ZeroTarget);
        }
        if draft.deadline <= now {
            return Err(ValidationError::DeadlineInPast);
        }

        Ok(Self {
            id: new_goal_id("user"),
            title: title.to_string(),
            description: draft.description,
            target_minutes: draft.target_minutes,
            current_minutes: 0,
            deadline: draft.deadline,
            created_at: now,
            completed: false,
            goal_type: GoalType::Custom,
            origin: GoalOrigin::User,
            companion_id: None,
            reward: None,
            completed_at: None,
        })
    }

    /// A goal a companion hands out directly, with a two week window.
    pub fn for_companion(
        template: &GoalTemplate,
        companion: CompanionId,
        now: Timestamp,
    ) -> Self {
        Self {
            id: new_goal_id(&format!("goal_{}", companion)),
            title: template.title.to_string(),
            description: template.description.to_string(),
            target_minutes: template.target_minutes,
            current_minutes: 0,
            deadline: now + Duration::days(14),
            created_at: now,
            completed: false,
            goal_type: template.goal_type,
            origin: GoalOrigin::Companion,
            companion_id: Some(companion),
            reward: Some(template.reward()),
            completed_at: None,
        }
    }

    pub fn is_system_goal(&self) -> bool {
        self.origin != GoalOrigin::User
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.deadline < now
    }

    pub fn is_active(&self, now: Timestamp) -> bool {
        !self.completed && !self.is_expired(now)
    }

    /// User goals can always be removed, system goals only after they expire.
    pub fn can_delete(&self, now: Timestamp) -> bool {
        !self.is_system_goal() || self.is_expired(now)
    }

    /// Add minutes. Once completed, further minutes are ignored so the value
    /// recorded at completion is final.
    pub fn apply_progress(&mut self, minutes: u32, now: Timestamp) -> ProgressOutcome {
        if self.completed {
            return ProgressOutcome::Ignored;
        }

        self.current_minutes = self.current_minutes.saturating_add(minutes);
        if self.current_minutes >= self.target_minutes {
            self.completed = true;
            self.completed_at = Some(now);
            ProgressOutcome::Completed
        } else {
            ProgressOutcome::Advanced
        }
    }

    /// Manual completion. Does not require the target to be reached.
    pub fn force_complete(&mut self, now: Timestamp) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        self.completed_at = Some(now);
        true
    }

    pub fn apply_edit(&mut self, edit: &GoalEdit) -> Result<()> {
        if self.is_system_goal() {
            return Err(ValidationError::ProtectedGoal(self.id.clone()));
        }
        if let Some(title) = &edit.title {
            if title.trim().is_empty() {
                return Err(ValidationError::EmptyTitle);
            }
        }
        if edit.target_minutes == Some(0) {
            return Err(ValidationError::ZeroTarget);
        }

        if let Some(title) = &edit.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = &edit.description {
            self.description = description.clone();
        }
        if let Some(target) = edit.target_minutes {
            self.target_minutes = target;
        }
        Ok(())
    }
}

/// Find a goal by id.
pub fn find_goal<'a>(goals: &'a [Goal], id: &str) -> Option<&'a Goal> {
    goals.iter().find(|g| g.id == id)
}

pub fn find_goal_mut<'a>(goals: &'a mut [Goal], id: &str) -> Option<&'a mut Goal> {
    goals.iter_mut().find(|g| g.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn draft(target: u32) -> NewGoal {
        NewGoal {
            title: "Read chapter 3".to_string(),
            description: String::new(),
            target_minutes: target,
            deadline: Utc::now() + Duration::days(2),
        }
    }

    #[test]
    fn test_user_goal_validation() {
        let now = Utc::now();
        assert_eq!(Goal::user(draft(0), now), Err(ValidationError::ZeroTarget));

        let mut past = draft(25);
        past.deadline = now - Duration::hours(1);
        assert_eq!(Goal::user(past, now), Err(ValidationError::DeadlineInPast));

        let mut blank = draft(25);
        blank.title = "   ".to_string();
        assert_eq!(Goal::user(blank, now), Err(ValidationError::EmptyTitle));

        let goal = Goal::user(draft(25), now).unwrap();
        assert!(goal.id.starts_with("user_"));
        assert_eq!(goal.origin, GoalOrigin::User);
        assert!(!goal.is_system_goal());
    }

    #[test]
    fn test_progress_completes_exactly_once() {
        let now = Utc::now();
        let mut goal = Goal::user(draft(25), now).unwrap();

        assert_eq!(goal.apply_progress(10, now), ProgressOutcome::Advanced);
        assert_eq!(goal.apply_progress(15, now), ProgressOutcome::Completed);
        assert!(goal.completed);
        assert_eq!(goal.current_minutes, 25);

        assert_eq!(goal.apply_progress(10, now), ProgressOutcome::Ignored);
        assert_eq!(goal.current_minutes, 25);
        assert!(goal.completed);
    }

    #[test]
    fn test_completing_delta_is_kept_in_full() {
        let now = Utc::now();
        let mut goal = Goal::user(draft(25), now).unwrap();
        goal.apply_progress(20, now);
        assert_eq!(goal.apply_progress(10, now), ProgressOutcome::Completed);
        assert_eq!(goal.current_minutes, 30);
    }

    #[test]
    fn test_system_goals_are_protected() {
        let now = Utc::now();
        let template = &templates_for(CompanionId::Yuri)[0];
        let mut goal = Goal::for_companion(template, CompanionId::Yuri, now);

        assert!(goal.is_system_goal());
        assert!(goal.id.starts_with("goal_yuri_"));
        assert!(!goal.can_delete(now));
        assert!(goal.can_delete(now + Duration::days(15)));
        assert_eq!(
            goal.apply_edit(&GoalEdit {
                title: Some("Mine now".to_string()),
                ..Default::default()
            }),
            Err(ValidationError::ProtectedGoal(goal.id.clone()))
        );
    }

    #[test]
    fn test_edit_user_goal() {
        let now = Utc::now();
        let mut goal = Goal::user(draft(25), now).unwrap();
        goal.apply_edit(&GoalEdit {
            title: Some("Read chapter 4".to_string()),
            target_minutes: Some(40),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(goal.title, "Read chapter 4");
        assert_eq!(goal.target_minutes, 40);
        assert!(goal
            .apply_edit(&GoalEdit {
                target_minutes: Some(0),
                ..Default::default()
            })
            .is_err());
    }

    #[test]
    fn test_goal_document_shape() {
        let goal = Goal::user(draft(25), Utc::now()).unwrap();
        let json = serde_json::to_value(&goal).unwrap();
        assert_eq!(json["type"], "custom");
        assert_eq!(json["origin"], "user");
        assert_eq!(json["targetMinutes"], 25);
        assert!(json.get("companionId").is_none());
    }
}
