//! Unlocked achievements.
//!
//! Checks are evaluated locally for immediate feedback and queued as a whole,
//! so the remote replay re-evaluates against the same inputs and unlocks with
//! append-if-absent writes.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use kizuna_core::achievement::{dedupe_unlocked, diagnose, find_achievement, newly_unlocked, AchievementDiagnostics};
use kizuna_core::{AchievementCheck, UnlockedAchievement, UserDocument};

use crate::error::Result;
use crate::gateway::FieldUpdate;
use crate::queue::{PendingKind, PendingUpdate};
use crate::remote::{self, Remote};
use crate::sync::{Domain, DomainStore, StoreSnapshot, SyncCore, SyncReport};

pub struct AchievementsDomain;

#[async_trait]
impl Domain for AchievementsDomain {
    type Data = Vec<UnlockedAchievement>;

    fn name(&self) -> &'static str {
        "achievements"
    }

    async fn replay(&self, remote: &Remote, update: &PendingUpdate) -> Result<()> {
        remote::achievements::replay(remote, update).await
    }

    fn pull(&self, doc: &UserDocument) -> Self::Data {
        doc.achievements.clone()
    }
}

pub struct AchievementsStore {
    core: SyncCore<AchievementsDomain>,
}

impl AchievementsStore {
    pub fn new(remote: Remote) -> Self {
        let cooldown = remote.ctx().config().achievements.cooldown();
        Self {
            core: SyncCore::new(AchievementsDomain, remote, cooldown, Vec::new()),
        }
    }

    pub fn core(&self) -> &SyncCore<AchievementsDomain> {
        &self.core
    }

    pub async fn unlocked(&self) -> Vec<UnlockedAchievement> {
        self.core.data().await
    }

    pub async fn unlocked_ids(&self) -> HashSet<String> {
        self.core
            .read(|state| state.data.iter().map(|a| a.id.clone()).collect())
            .await
    }

    pub async fn is_unlocked(&self, id: &str) -> bool {
        self.core.read(|state| state.data.iter().any(|a| a.id == id)).await
    }

    /// Unlock one achievement. Already unlocked is a no-op and queues nothing.
    pub async fn unlock(&self, achievement_id: &str) -> Result<bool> {
        let now = self.core.ctx().now();
        self.core
            .mutate(|data, intents| {
                if data.iter().any(|a| a.id == achievement_id) {
                    warn!(achievement = %achievement_id, "Achievement already unlocked");
                    return Ok(false);
                }
                data.push(UnlockedAchievement {
                    id: achievement_id.to_string(),
                    unlocked_at: now,
                });
                intents.push(PendingKind::UnlockAchievement {
                    achievement_id: achievement_id.to_string(),
                });
                info!(achievement = %achievement_id, "Achievement unlocked locally");
                Ok(true)
            })
            .await
    }

    /// Queue the reward of a catalog achievement. Rewards land in the user
    /// document's inventory and features, outside this store.
    pub async fn apply_reward(&self, achievement_id: &str) -> Result<bool> {
        let has_reward = find_achievement(achievement_id).is_some_and(|a| a.reward.is_some());
        if !has_reward {
            debug!(achievement = %achievement_id, "No reward to queue");
            return Ok(false);
        }
        self.core
            .mutate(|_, intents| {
                intents.push(PendingKind::ApplyReward {
                    achievement_id: achievement_id.to_string(),
                });
                Ok(true)
            })
            .await
    }

    /// Evaluate a check, record what it newly unlocks and queue it for replay.
    /// Returns the ids unlocked by this call.
    pub async fn check(&self, check: AchievementCheck) -> Result<Vec<String>> {
        let candidates = check.evaluate();
        if candidates.is_empty() {
            debug!(check = check.name(), "No thresholds met");
            return Ok(Vec::new());
        }

        let now = self.core.ctx().now();
        self.core
            .mutate(|data, intents| {
                let already: HashSet<String> = data.iter().map(|a| a.id.clone()).collect();
                let fresh = newly_unlocked(candidates, &already);
                for id in &fresh {
                    info!(achievement = %id, check = check.name(), "Achievement unlocked locally");
                    data.push(UnlockedAchievement {
                        id: id.clone(),
                        unlocked_at: now,
                    });
                }
                // The remote may be ahead of or behind this copy, so the check
                // is queued even when nothing is new here.
                intents.push(PendingKind::CheckAchievements { check });
                Ok(fresh)
            })
            .await
    }

    pub async fn diagnostics(&self) -> AchievementDiagnostics {
        self.core.read(|state| diagnose(&state.data)).await
    }

    /// Remove duplicate unlock records from the remote document, keeping the
    /// first per id. Writes only when duplicates exist.
    pub async fn cleanup_duplicates(&self) -> Result<usize> {
        let remote = self.core.remote();
        let mut records = remote.document().await?.achievements;
        let removed = dedupe_unlocked(&mut records);
        if removed == 0 {
            debug!(owner = %remote.owner(), "No duplicate achievements");
            return Ok(0);
        }

        remote
            .write(FieldUpdate::new().set_json("achievements", &records)?)
            .await?;
        info!(owner = %remote.owner(), removed, "Removed duplicate achievements");
        self.core.sync(true).await?;
        Ok(removed)
    }

    pub async fn export_state(&self) -> StoreSnapshot<Vec<UnlockedAchievement>> {
        self.core.export_state().await
    }

    pub async fn restore_state(&self, snapshot: StoreSnapshot<Vec<UnlockedAchievement>>) {
        self.core.restore_state(snapshot).await
    }
}

#[async_trait]
impl DomainStore for AchievementsStore {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Clock;
    use crate::stores::testing::{fixture, Fixture};
    use kizuna_core::OwnerId;

    fn store(fx: &Fixture) -> AchievementsStore {
        AchievementsStore::new(fx.remote())
    }

    #[tokio::test]
    async fn test_unlock_twice_queues_once() {
        let fx = fixture();
        let store = store(&fx);

        assert!(store.unlock("first_session").await.unwrap());
        assert!(!store.unlock("first_session").await.unwrap());
        assert_eq!(store.core().pending_len().await, 1);

        store.sync(false).await.unwrap();
        let doc = fx.gateway.document(&OwnerId::new("u1")).unwrap();
        assert_eq!(doc.achievements.len(), 1);
        assert_eq!(doc.features.get("daily_quote"), Some(&true));
    }

    #[tokio::test]
    async fn test_check_reports_only_new_ids() {
        let fx = fixture();
        let store = store(&fx);
        let check = AchievementCheck::Goal {
            completed_goals: 1,
            challenge_goals_completed: 0,
        };

        assert_eq!(store.check(check.clone()).await.unwrap(), vec!["your_first_goal".to_string()]);
        assert!(store.check(check).await.unwrap().is_empty());

        store.sync(false).await.unwrap();
        let doc = fx.gateway.document(&OwnerId::new("u1")).unwrap();
        assert_eq!(doc.achievements.iter().filter(|a| a.id == "your_first_goal").count(), 1);
        assert_eq!(doc.features.get("goal_templates"), Some(&true));
    }

    #[tokio::test]
    async fn test_check_below_threshold_queues_nothing() {
        let fx = fixture();
        let store = store(&fx);
        let unlocked = store.check(AchievementCheck::Streak { days: 3 }).await.unwrap();
        assert!(unlocked.is_empty());
        assert_eq!(store.core().pending_len().await, 0);
    }

    #[tokio::test]
    async fn test_item_reward_goes_to_inventory() {
        let fx = fixture();
        let store = store(&fx);
        store.unlock("sayori_friend").await.unwrap();
        store.sync(false).await.unwrap();

        let doc = fx.gateway.document(&OwnerId::new("u1")).unwrap();
        assert_eq!(doc.inventory.sprites, vec!["sayori_casual".to_string()]);
    }

    #[tokio::test]
    async fn test_cleanup_writes_only_with_duplicates() {
        let fx = fixture();
        let store = store(&fx);
        let writes = fx.gateway.write_count();
        assert_eq!(store.cleanup_duplicates().await.unwrap(), 0);
        assert_eq!(fx.gateway.write_count(), writes);

        let owner = OwnerId::new("u1");
        let mut doc = fx.gateway.document(&owner).unwrap();
        let record = UnlockedAchievement {
            id: "master".into(),
            unlocked_at: fx.clock.now(),
        };
        doc.achievements = vec![record.clone(), record.clone(), record];
        fx.gateway.insert_document(&owner, &doc).unwrap();

        assert_eq!(store.cleanup_duplicates().await.unwrap(), 2);
        assert_eq!(fx.gateway.document(&owner).unwrap().achievements.len(), 1);
        assert!(store.diagnostics().await.is_clean());
    }
}
