use serde_json::json;
use tracing::{debug, info};

use kizuna_core::achievement::{find_achievement, AchievementCheck, RewardKind, UnlockedAchievement};

use super::Remote;
use crate::error::{Result, SyncError};
use crate::gateway::FieldUpdate;
use crate::queue::{PendingKind, PendingUpdate};

/// Replay a queued unlock, reward or check. Unlocks are appended only when absent.
pub async fn replay(remote: &Remote, update: &PendingUpdate) -> Result<()> {
    match &update.kind {
        PendingKind::UnlockAchievement { achievement_id } => {
            unlock(remote, update, achievement_id).await?;
            Ok(())
        }
        PendingKind::ApplyReward { achievement_id } => {
            apply_reward(remote, update.operation_key(), achievement_id).await?;
            Ok(())
        }
        PendingKind::CheckAchievements { check } => run_check(remote, update, check).await,
        other => Err(SyncError::UnsupportedUpdate {
            store: "achievements",
            kind: other.name(),
        }),
    }
}

/// Reward writes for a catalog achievement. `None` when it carries no reward.
pub fn reward_update(key: String, achievement_id: &str) -> Option<FieldUpdate> {
    let reward = find_achievement(achievement_id)?.reward?;
    let update = FieldUpdate::keyed(key);
    Some(match reward.kind {
        RewardKind::Feature => update.set(format!("features.{}", reward.id), json!(true)),
        kind => {
            let field = kind.inventory_field()?;
            update.array_union(field, vec![json!(reward.id)])
        }
    })
}

async fn apply_reward(remote: &Remote, key: String, achievement_id: &str) -> Result<bool> {
    let Some(update) = reward_update(key, achievement_id) else {
        debug!(achievement = %achievement_id, "No reward to apply");
        return Ok(false);
    };
    remote.write(update).await?;
    Ok(true)
}

/// Append-if-absent unlock, then the reward only if this unlock appended.
/// Both steps carry their own keys so a retried batch resumes where it failed.
async fn unlock(remote: &Remote, update: &PendingUpdate, achievement_id: &str) -> Result<bool> {
    let record = UnlockedAchievement {
        id: achievement_id.to_string(),
        unlocked_at: remote.now(),
    };
    let append = FieldUpdate::keyed(update.step_key(&format!("unlock:{achievement_id}"))).append_if_absent(
        "achievements",
        "id",
        serde_json::to_value(&record)?,
    );
    let outcome = remote.write(append).await?;
    if outcome.appended() == 0 {
        debug!(achievement = %achievement_id, "Already unlocked");
        return Ok(false);
    }

    apply_reward(remote, update.step_key(&format!("reward:{achievement_id}")), achievement_id).await?;
    if !outcome.was_replayed() {
        info!(owner = %remote.owner(), achievement = %achievement_id, "Achievement unlocked");
    }
    Ok(true)
}

async fn run_check(remote: &Remote, update: &PendingUpdate, check: &AchievementCheck) -> Result<()> {
    let doc = remote.document().await?;
    let candidates = check.evaluate();

    for id in candidates {
        // Records older than this update came from elsewhere. Newer ones may be
        // this update's own earlier attempt, which the step keys resolve.
        let unlocked_before = doc
            .achievements
            .iter()
            .any(|record| record.id == id && record.unlocked_at < update.enqueued_at);
        if unlocked_before {
            continue;
        }
        unlock(remote, update, &id).await?;
    }
    debug!(check = check.name(), "Achievement check replayed");
    Ok(())
}
