//! Goals store.
//!
//! Completing a goal locally fans out to the achievements store (goal count
//! check, forced sync) and to the owning companion's store.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use kizuna_core::goal::{assign_random_companion_goal, find_goal, find_goal_mut, refresh_goals};
use kizuna_core::{
    AchievementCheck, CompanionId, Goal, GoalEdit, GoalOrigin, GoalType, NewGoal, ProgressOutcome, UserDocument,
    ValidationError,
};

use super::achievements::AchievementsStore;
use super::companion::CompanionStore;
use crate::error::Result;
use crate::queue::{PendingKind, PendingUpdate};
use crate::remote::{self, Remote};
use crate::sync::{Domain, DomainStore, StoreSnapshot, SyncCore, SyncReport};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalsSnapshot {
    pub list: Vec<Goal>,
    pub completed_goals: u32,
    pub challenge_goals_completed: u32,
}

impl GoalsSnapshot {
    fn count_completion(&mut self, goal: &Goal) {
        self.completed_goals += 1;
        if goal.goal_type == GoalType::Challenge {
            self.challenge_goals_completed += 1;
        }
    }
}

pub struct GoalsDomain;

#[async_trait]
impl Domain for GoalsDomain {
    type Data = GoalsSnapshot;

    fn name(&self) -> &'static str {
        "goals"
    }

    async fn replay(&self, remote: &Remote, update: &PendingUpdate) -> Result<()> {
        remote::goals::replay(remote, update).await
    }

    fn pull(&self, doc: &UserDocument) -> Self::Data {
        GoalsSnapshot {
            list: doc.goals.list.clone(),
            completed_goals: doc.goals.completed_goals,
            challenge_goals_completed: doc.goals.challenge_goals_completed,
        }
    }
}

/// Goal ids touched by a refresh pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub removed: Vec<String>,
    pub created: Vec<String>,
}

pub struct GoalsStore {
    core: SyncCore<GoalsDomain>,
    achievements: Option<Arc<AchievementsStore>>,
    companions: Option<Arc<CompanionStore>>,
}

impl GoalsStore {
    pub fn new(remote: Remote) -> Self {
        let cooldown = remote.ctx().config().goals.cooldown();
        Self {
            core: SyncCore::new(GoalsDomain, remote, cooldown, GoalsSnapshot::default()),
            achievements: None,
            companions: None,
        }
    }

    pub fn with_achievements(mut self, store: Arc<AchievementsStore>) -> Self {
        self.achievements = Some(store);
        self
    }

    pub fn with_companions(mut self, store: Arc<CompanionStore>) -> Self {
        self.companions = Some(store);
        self
    }

    pub fn core(&self) -> &SyncCore<GoalsDomain> {
        &self.core
    }

    pub async fn goals(&self) -> Vec<Goal> {
        self.core.read(|state| state.data.list.clone()).await
    }

    pub async fn goal(&self, goal_id: &str) -> Option<Goal> {
        self.core
            .read(|state| find_goal(&state.data.list, goal_id).cloned())
            .await
    }

    pub async fn active_goals(&self) -> Vec<Goal> {
        let now = self.core.ctx().now();
        self.core
            .read(|state| state.data.list.iter().filter(|g| g.is_active(now)).cloned().collect())
            .await
    }

    /// Validate and add a user goal, queued for creation.
    pub async fn add_goal(&self, draft: NewGoal) -> Result<Goal> {
        let goal = Goal::user(draft, self.core.ctx().now())?;
        self.core
            .mutate(|data, intents| {
                data.list.push(goal.clone());
                intents.push(PendingKind::CreateGoal { goal: goal.clone() });
                info!(goal = %goal.id, target = goal.target_minutes, "Goal added");
                Ok(goal)
            })
            .await
    }

    /// Hand out a random challenge from the companion's catalog.
    pub async fn assign_companion_goal<R: Rng + ?Sized>(&self, companion: CompanionId, rng: &mut R) -> Result<Option<Goal>> {
        let Some(goal) = assign_random_companion_goal(companion, self.core.ctx().now(), rng) else {
            return Ok(None);
        };
        self.core
            .mutate(|data, intents| {
                data.list.push(goal.clone());
                intents.push(PendingKind::CreateCompanionGoal { goal: goal.clone() });
                info!(goal = %goal.id, %companion, "Companion goal assigned");
                Ok(Some(goal))
            })
            .await
    }

    /// Add minutes to one goal, cascade a completion, then try to sync.
    pub async fn update_progress(&self, goal_id: &str, minutes: u32) -> Result<ProgressOutcome> {
        let now = self.core.ctx().now();
        let (outcome, completed) = self
            .core
            .mutate(|data, intents| {
                let goal = find_goal_mut(&mut data.list, goal_id)
                    .ok_or_else(|| ValidationError::UnknownGoal(goal_id.to_string()))?;
                let outcome = goal.apply_progress(minutes, now);
                if outcome == ProgressOutcome::Ignored {
                    debug!(goal = %goal_id, "Goal already complete, progress ignored");
                    return Ok((outcome, None));
                }
                let goal = goal.clone();
                intents.push(PendingKind::UpdateGoalProgress {
                    goal_id: goal_id.to_string(),
                    minutes,
                });
                if outcome != ProgressOutcome::Completed {
                    return Ok((outcome, None));
                }
                data.count_completion(&goal);
                Ok((outcome, Some((goal, data.clone()))))
            })
            .await?;

        if let Some((goal, snapshot)) = completed {
            self.after_completion(&[goal], &snapshot).await;
        }
        self.try_sync().await;
        Ok(outcome)
    }

    /// Add the same minutes to every active goal. Returns the ids this completed.
    pub async fn add_focus_minutes(&self, minutes: u32) -> Result<Vec<String>> {
        if minutes == 0 {
            return Ok(Vec::new());
        }
        let now = self.core.ctx().now();
        let (completed, snapshot) = self
            .core
            .mutate(|data, intents| {
                let mut completed = Vec::new();
                for goal in data.list.iter_mut().filter(|g| g.is_active(now)) {
                    let outcome = goal.apply_progress(minutes, now);
                    intents.push(PendingKind::UpdateGoalProgress {
                        goal_id: goal.id.clone(),
                        minutes,
                    });
                    if outcome == ProgressOutcome::Completed {
                        completed.push(goal.clone());
                    }
                }
                for goal in &completed {
                    data.count_completion(goal);
                }
                Ok((completed, data.clone()))
            })
            .await?;

        if !completed.is_empty() {
            self.after_completion(&completed, &snapshot).await;
        }
        self.try_sync().await;
        Ok(completed.into_iter().map(|g| g.id).collect())
    }

    /// Complete a goal without reaching its target.
    pub async fn mark_complete(&self, goal_id: &str) -> Result<bool> {
        let now = self.core.ctx().now();
        let completed = self
            .core
            .mutate(|data, intents| {
                let goal = find_goal_mut(&mut data.list, goal_id)
                    .ok_or_else(|| ValidationError::UnknownGoal(goal_id.to_string()))?;
                if !goal.force_complete(now) {
                    return Ok(None);
                }
                let goal = goal.clone();
                intents.push(PendingKind::CompleteGoal {
                    goal_id: goal_id.to_string(),
                });
                data.count_completion(&goal);
                Ok(Some((goal, data.clone())))
            })
            .await?;

        let Some((goal, snapshot)) = completed else {
            debug!(goal = %goal_id, "Goal already complete");
            return Ok(false);
        };
        self.after_completion(&[goal], &snapshot).await;
        self.try_sync().await;
        Ok(true)
    }

    /// Remove a user goal, or a system goal once it has expired.
    pub async fn remove_goal(&self, goal_id: &str) -> Result<()> {
        let now = self.core.ctx().now();
        self.core
            .mutate(|data, intents| {
                let goal = find_goal(&data.list, goal_id)
                    .ok_or_else(|| ValidationError::UnknownGoal(goal_id.to_string()))?;
                if !goal.can_delete(now) {
                    return Err(ValidationError::ProtectedGoal(goal_id.to_string()).into());
                }
                data.list.retain(|g| g.id != goal_id);
                intents.push(PendingKind::RemoveGoal {
                    goal_id: goal_id.to_string(),
                });
                Ok(())
            })
            .await
    }

    /// Change the title, description, target or deadline of an open goal.
    pub async fn edit_goal(&self, goal_id: &str, edit: GoalEdit) -> Result<()> {
        self.core
            .mutate(|data, intents| {
                let goal = find_goal_mut(&mut data.list, goal_id)
                    .ok_or_else(|| ValidationError::UnknownGoal(goal_id.to_string()))?;
                goal.apply_edit(&edit)?;
                intents.push(PendingKind::EditGoal {
                    goal_id: goal_id.to_string(),
                    edit,
                });
                Ok(())
            })
            .await
    }

    /// Drop expired open goals and top up empty daily, weekly and challenge
    /// slots for the selected companion.
    pub async fn refresh<R: Rng + ?Sized>(&self, selected: CompanionId, rng: &mut R) -> Result<RefreshSummary> {
        let now = self.core.ctx().local_now();
        self.core
            .mutate(|data, intents| {
                let refresh = refresh_goals(std::mem::take(&mut data.list), selected, &now, rng);
                data.list = refresh.goals;

                for goal_id in &refresh.removed {
                    intents.push(PendingKind::RemoveGoal {
                        goal_id: goal_id.clone(),
                    });
                }
                for goal_id in &refresh.created {
                    let Some(goal) = find_goal(&data.list, goal_id) else {
                        continue;
                    };
                    // Drawn from a companion's catalog
                    if goal.companion_id.is_some() {
                        intents.push(PendingKind::CreateCompanionGoal { goal: goal.clone() });
                    } else {
                        intents.push(PendingKind::CreateGoal { goal: goal.clone() });
                    }
                }
                if !refresh.removed.is_empty() || !refresh.created.is_empty() {
                    info!(
                        removed = refresh.removed.len(),
                        created = refresh.created.len(),
                        "Goals refreshed"
                    );
                }
                Ok(RefreshSummary {
                    removed: refresh.removed,
                    created: refresh.created,
                })
            })
            .await
    }

    async fn after_completion(&self, goals: &[Goal], snapshot: &GoalsSnapshot) {
        for goal in goals {
            info!(goal = %goal.id, "Goal completed locally");
            let Some(companion) = goal.companion_id else {
                continue;
            };
            let Some(companions) = &self.companions else {
                continue;
            };
            let is_companion_goal = goal.origin == GoalOrigin::Companion;
            if let Err(err) = companions.after_goal(companion, is_companion_goal).await {
                debug!(goal = %goal.id, error = %err, "Companion update after goal failed");
            }
        }

        let Some(achievements) = &self.achievements else {
            return;
        };
        let check = AchievementCheck::Goal {
            completed_goals: snapshot.completed_goals,
            challenge_goals_completed: snapshot.challenge_goals_completed,
        };
        if let Err(err) = achievements.check(check).await {
            debug!(error = %err, "Goal achievement check failed");
            return;
        }
        // The failure also stays on the achievements store's error field.
        if let Err(err) = achievements.sync(true).await {
            warn!(error = %err, "Achievements sync after goal completion failed");
        }
    }

    /// Sync now; a failure is kept on the store and retried later.
    async fn try_sync(&self) {
        if let Err(err) = self.core.sync(false).await {
            debug!(error = %err, "Immediate goals sync failed");
        }
    }

    pub async fn export_state(&self) -> StoreSnapshot<GoalsSnapshot> {
        self.core.export_state().await
    }

    pub async fn restore_state(&self, snapshot: StoreSnapshot<GoalsSnapshot>) {
        self.core.restore_state(snapshot).await
    }
}

#[async_trait]
impl DomainStore for GoalsStore {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    async fn sync(&self, force: bool) -> Result<SyncReport> {
        self.core.sync(force).await
    }

    async fn pending_len(&self) -> usize {
        self.core.pending_len().await
    }

    async fn last_error(&self) -> Option<String> {
        self.core.last_error().await
    }
}
