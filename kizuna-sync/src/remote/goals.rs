use serde_json::json;
use tracing::{debug, info, warn};

use kizuna_core::achievement::UnlockedAchievement;
use kizuna_core::companion::MAX_AFFINITY;
use kizuna_core::goal::{find_goal, find_goal_mut};
use kizuna_core::{Goal, GoalEdit, GoalReward, GoalType, ProgressOutcome, UserDocument};

use super::Remote;
use crate::error::{Result, SyncError};
use crate::gateway::FieldUpdate;
use crate::queue::{PendingKind, PendingUpdate};

/// Replay a queued goal change against the remote document.
pub async fn replay(remote: &Remote, update: &PendingUpdate) -> Result<()> {
    match &update.kind {
        PendingKind::CreateGoal { goal } | PendingKind::CreateCompanionGoal { goal } => {
            create(remote, update, goal).await
        }
        PendingKind::UpdateGoalProgress { goal_id, minutes } => progress(remote, update, goal_id, *minutes).await,
        PendingKind::CompleteGoal { goal_id } => complete(remote, update, goal_id).await,
        PendingKind::RemoveGoal { goal_id } => remove(remote, update, goal_id).await,
        PendingKind::EditGoal { goal_id, edit } => edit_goal(remote, update, goal_id, edit).await,
        other => Err(SyncError::UnsupportedUpdate {
            store: "goals",
            kind: other.name(),
        }),
    }
}

fn list_update(update: &PendingUpdate, list: &[Goal], remote: &Remote) -> Result<FieldUpdate> {
    Ok(FieldUpdate::keyed(update.operation_key())
        .set_json("goals.list", list)?
        .set_json("goals.lastUpdated", &remote.now())?)
}

/// Counter, reward and bookkeeping writes for a goal that just completed.
fn completion_writes(mut writes: FieldUpdate, goal: &Goal, doc: &UserDocument, remote: &Remote) -> Result<FieldUpdate> {
    writes = writes.increment("goals.completedGoals", 1);
    if goal.goal_type == GoalType::Challenge {
        writes = writes.increment("goals.challengeGoalsCompleted", 1);
    }

    match &goal.reward {
        Some(GoalReward::Affinity(points)) => {
            let companion = goal.companion_id.unwrap_or_else(|| doc.settings.companion());
            if doc.companions.contains_key(&companion) {
                writes = writes.increment_capped(
                    format!("companions.{companion}.affinityLevel"),
                    i64::from(*points),
                    i64::from(MAX_AFFINITY),
                );
            } else {
                warn!(goal = %goal.id, %companion, "Reward companion missing from document");
            }
        }
        Some(GoalReward::Achievement(id)) => {
            let record = UnlockedAchievement {
                id: id.clone(),
                unlocked_at: remote.now(),
            };
            writes = writes.append_if_absent("achievements", "id", serde_json::to_value(&record)?);
        }
        Some(GoalReward::Background(id)) => {
            writes = writes.array_union("inventory.backgrounds", vec![json!(id)]);
        }
        None => {}
    }

    info!(owner = %remote.owner(), goal = %goal.id, "Goal completed");
    Ok(writes)
}

async fn create(remote: &Remote, update: &PendingUpdate, goal: &Goal) -> Result<()> {
    let doc = remote.document().await?;
    if find_goal(&doc.goals.list, &goal.id).is_some() {
        debug!(goal = %goal.id, "Goal already stored");
        return Ok(());
    }

    let writes = FieldUpdate::keyed(update.operation_key())
        .array_union("goals.list", vec![serde_json::to_value(goal)?])
        .set_json("goals.lastUpdated", &remote.now())?;
    remote.write(writes).await?;
    Ok(())
}

async fn progress(remote: &Remote, update: &PendingUpdate, goal_id: &str, minutes: u32) -> Result<()> {
    let doc = remote.document().await?;
    let mut list = doc.goals.list.clone();
    let Some(goal) = find_goal_mut(&mut list, goal_id) else {
        warn!(goal = %goal_id, "Progress for a goal that no longer exists");
        return Ok(());
    };

    let outcome = goal.apply_progress(minutes, remote.now());
    let goal = goal.clone();
    let writes = match outcome {
        ProgressOutcome::Ignored => {
            debug!(goal = %goal_id, "Goal already complete, progress ignored");
            return Ok(());
        }
        ProgressOutcome::Advanced => list_update(update, &list, remote)?,
        ProgressOutcome::Completed => completion_writes(list_update(update, &list, remote)?, &goal, &doc, remote)?,
    };
    remote.write(writes).await?;
    Ok(())
}

async fn complete(remote: &Remote, update: &PendingUpdate, goal_id: &str) -> Result<()> {
    let doc = remote.document().await?;
    let mut list = doc.goals.list.clone();
    let Some(goal) = find_goal_mut(&mut list, goal_id) else {
        warn!(goal = %goal_id, "Completion for a goal that no longer exists");
        return Ok(());
    };
    if !goal.force_complete(remote.now()) {
        debug!(goal = %goal_id, "Goal already complete");
        return Ok(());
    }

    let goal = goal.clone();
    let writes = completion_writes(list_update(update, &list, remote)?, &goal, &doc, remote)?;
    remote.write(writes).await?;
    Ok(())
}

async fn remove(remote: &Remote, update: &PendingUpdate, goal_id: &str) -> Result<()> {
    let doc = remote.document().await?;
    let before = doc.goals.list.len();
    let list: Vec<Goal> = doc.goals.list.into_iter().filter(|g| g.id != goal_id).collect();
    if list.len() == before {
        debug!(goal = %goal_id, "Goal already removed");
        return Ok(());
    }
    remote.write(list_update(update, &list, remote)?).await?;
    Ok(())
}

async fn edit_goal(remote: &Remote, update: &PendingUpdate, goal_id: &str, edit: &GoalEdit) -> Result<()> {
    let doc = remote.document().await?;
    let mut list = doc.goals.list;
    let Some(goal) = find_goal_mut(&mut list, goal_id) else {
        warn!(goal = %goal_id, "Edit for a goal that no longer exists");
        return Ok(());
    };
    // Validated at enqueue time. A rejection now is dropped, not retried.
    if let Err(err) = goal.apply_edit(edit) {
        warn!(goal = %goal_id, error = %err, "Stored goal rejects the edit, dropping it");
        return Ok(());
    }
    remote.write(list_update(update, &list, remote)?).await?;
    Ok(())
}
