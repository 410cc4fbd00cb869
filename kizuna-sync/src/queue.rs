//! Pending-update queue.
//!
//! Every store mutator appends exactly one [`PendingUpdate`] describing the
//! intent it just applied locally. Updates are immutable once queued and leave
//! the queue only as a fully replayed prefix.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kizuna_core::achievement::AchievementCheck;
use kizuna_core::{CompanionId, FocusSession, Goal, GoalEdit, OwnerId, SettingsUpdate, Timestamp};

/// The intent carried by a pending update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingKind {
    // Goals
    CreateGoal {
        goal: Goal,
    },
    CreateCompanionGoal {
        goal: Goal,
    },
    UpdateGoalProgress {
        goal_id: String,
        minutes: u32,
    },
    CompleteGoal {
        goal_id: String,
    },
    RemoveGoal {
        goal_id: String,
    },
    EditGoal {
        goal_id: String,
        edit: GoalEdit,
    },

    // Achievements
    UnlockAchievement {
        achievement_id: String,
    },
    ApplyReward {
        achievement_id: String,
    },
    CheckAchievements {
        check: AchievementCheck,
    },

    // Companion
    UpdateCompanionAfterSession {
        companion: CompanionId,
        duration_secs: u64,
        completed: bool,
    },
    UpdateCompanionAfterGoal {
        companion: CompanionId,
        is_companion_goal: bool,
    },
    GiveGift {
        companion: CompanionId,
        gift_id: String,
    },

    // User
    RecordFocusSession {
        session: FocusSession,
    },
    UpdateSettings {
        update: SettingsUpdate,
    },
}

impl PendingKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateGoal { .. } => "create_goal",
            Self::CreateCompanionGoal { .. } => "create_companion_goal",
            Self::UpdateGoalProgress { .. } => "update_goal_progress",
            Self::CompleteGoal { .. } => "complete_goal",
            Self::RemoveGoal { .. } => "remove_goal",
            Self::EditGoal { .. } => "edit_goal",
            Self::UnlockAchievement { .. } => "unlock_achievement",
            Self::ApplyReward { .. } => "apply_reward",
            Self::CheckAchievements { .. } => "check_achievements",
            Self::UpdateCompanionAfterSession { .. } => "update_companion_after_session",
            Self::UpdateCompanionAfterGoal { .. } => "update_companion_after_goal",
            Self::GiveGift { .. } => "give_gift",
            Self::RecordFocusSession { .. } => "record_focus_session",
            Self::UpdateSettings { .. } => "update_settings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingUpdate {
    /// Idempotency key for replays
    pub op_id: Uuid,
    pub owner: OwnerId,
    pub enqueued_at: Timestamp,
    #[serde(flatten)]
    pub kind: PendingKind,
}

impl PendingUpdate {
    pub fn new(owner: OwnerId, kind: PendingKind, enqueued_at: Timestamp) -> Self {
        Self {
            op_id: Uuid::new_v4(),
            owner,
            enqueued_at,
            kind,
        }
    }

    /// Key for the whole update.
    pub fn operation_key(&self) -> String {
        self.op_id.to_string()
    }

    /// Key for one step of a multi-write replay.
    pub fn step_key(&self, step: &str) -> String {
        format!("{}:{}", self.op_id, step)
    }
}

/// FIFO of updates not yet confirmed by the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingQueue {
    items: Vec<PendingUpdate>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_updates(items: Vec<PendingUpdate>) -> Self {
        Self { items }
    }

    pub fn push(&mut self, update: PendingUpdate) {
        self.items.push(update);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingUpdate> {
        self.items.iter()
    }

    /// Copy of the current contents, in enqueue order.
    pub fn snapshot(&self) -> Vec<PendingUpdate> {
        self.items.clone()
    }

    /// Drop the first `n` updates after they were replayed.
    pub fn clear_prefix(&mut self, n: usize) {
        let n = n.min(self.items.len());
        self.items.drain(..n);
    }
}
