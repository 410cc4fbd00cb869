//! Store, queue and gateway integration tests
//!
//! Drives the four stores against the in-memory gateway:
//! - All-or-nothing queue draining and op-id dedup on retry
//! - Unlock-once behaviour across repeated sessions
//! - Goal refresh and the session completion cascade
//! - Stores draining side by side against the same companion
//! - Coordinator shutdown and restoring a queue after restart

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio_test::assert_ok;

use kizuna_core::goal::{find_goal, templates_for};
use kizuna_core::{
    CompanionId, FocusSession, Goal, GoalReward, GoalType, NewGoal, OwnerId, SettingsUpdate, Timestamp, UserDocument,
};
use kizuna_sync::{
    complete_focus_session, Clock, DomainStore, FieldUpdate, GatewayError, ManualClock, MemoryGateway,
    PersistenceGateway, SessionContext, Stores, SyncConfig, SyncCoordinator, WriteOutcome,
};

struct Harness {
    gateway: Arc<MemoryGateway>,
    clock: Arc<ManualClock>,
    stores: Stores,
}

impl Harness {
    fn owner(&self) -> OwnerId {
        OwnerId::new("u1")
    }

    fn document(&self) -> kizuna_core::UserDocument {
        self.gateway.document(&self.owner()).unwrap()
    }

    fn reopen(&self) -> Stores {
        let ctx = SessionContext::new(self.owner(), self.clock.clone(), SyncConfig::default());
        Stores::new(self.gateway.clone(), ctx).unwrap()
    }
}

/// Wednesday 2024-03-06 10:00 UTC.
fn start() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 6, 10, 0, 0).unwrap()
}

async fn harness() -> Harness {
    let gateway = Arc::new(MemoryGateway::new());
    let clock = Arc::new(ManualClock::new(start()));
    let ctx = SessionContext::new(OwnerId::new("u1"), clock.clone(), SyncConfig::default());
    let stores = Stores::new(gateway.clone(), ctx).unwrap();
    assert!(assert_ok!(stores.user.ensure_document("u1@example.com", CompanionId::Sayori).await));
    assert_ok!(stores.load().await);
    Harness { gateway, clock, stores }
}

fn user_goal(target: u32) -> NewGoal {
    NewGoal {
        title: "Finish problem set".into(),
        description: "Chapter 4".into(),
        target_minutes: target,
        deadline: start() + Duration::days(3),
    }
}

// =============================================================================
// Queue Draining
// =============================================================================

#[tokio::test]
async fn test_failed_batch_keeps_every_update() {
    let h = harness().await;
    let goals = &h.stores.goals;

    h.gateway.set_offline(true);
    let goal = goals.add_goal(user_goal(60)).await.unwrap();
    goals.update_progress(&goal.id, 10).await.unwrap();
    goals.update_progress(&goal.id, 5).await.unwrap();
    assert_eq!(goals.core().pending_len().await, 3);
    assert!(goals.last_error().await.is_some());

    // online again, but the second write of the batch fails
    h.gateway.set_offline(false);
    h.gateway.fail_write_number(2);
    assert!(goals.sync(true).await.is_err());
    assert_eq!(goals.core().pending_len().await, 3);
    assert!(goals.last_error().await.is_some());

    // optimistic state is never rolled back
    assert_eq!(goals.goal(&goal.id).await.unwrap().current_minutes, 15);

    goals.sync(true).await.unwrap();
    assert_eq!(goals.core().pending_len().await, 0);
    assert!(goals.last_error().await.is_none());
}

#[tokio::test]
async fn test_retry_does_not_double_apply_minutes() {
    let h = harness().await;
    let goals = &h.stores.goals;
    let goal = goals.add_goal(user_goal(60)).await.unwrap();
    goals.sync(true).await.unwrap();

    h.gateway.set_offline(true);
    goals.update_progress(&goal.id, 10).await.unwrap();
    goals.update_progress(&goal.id, 5).await.unwrap();
    h.gateway.set_offline(false);

    // first progress lands, second fails
    h.gateway.fail_write_number(2);
    assert!(goals.sync(true).await.is_err());
    let doc = h.document();
    assert_eq!(find_goal(&doc.goals.list, &goal.id).unwrap().current_minutes, 10);

    // the whole batch is replayed; the first update is recognised by its op id
    goals.sync(true).await.unwrap();
    let doc = h.document();
    assert_eq!(find_goal(&doc.goals.list, &goal.id).unwrap().current_minutes, 15);
}

#[tokio::test]
async fn test_completed_goal_minutes_stay_frozen() {
    let h = harness().await;
    let goals = &h.stores.goals;
    let goal = goals.add_goal(user_goal(25)).await.unwrap();

    goals.update_progress(&goal.id, 25).await.unwrap();
    goals.update_progress(&goal.id, 10).await.unwrap();
    goals.sync(true).await.unwrap();

    let doc = h.document();
    let stored = find_goal(&doc.goals.list, &goal.id).unwrap();
    assert!(stored.completed);
    assert_eq!(stored.current_minutes, 25);
    assert_eq!(doc.goals.completed_goals, 1);
}

// =============================================================================
// Achievements
// =============================================================================

#[tokio::test]
async fn test_friend_unlocks_once_across_sessions() {
    let h = harness().await;
    let mut doc = h.document();
    doc.companions.get_mut(&CompanionId::Sayori).unwrap().affinity_level = 8;
    h.gateway.insert_document(&h.owner(), &doc).unwrap();
    assert_ok!(h.stores.load().await);
    let mut rng = StdRng::seed_from_u64(9);

    // five completed minutes, five affinity points
    let first = FocusSession::finished(CompanionId::Sayori, h.clock.now(), 300, true);
    let summary = complete_focus_session(&h.stores, first, &mut rng).await.unwrap();
    assert_eq!(summary.affinity, 13);
    assert!(summary.unlocked.contains(&"sayori_friend".to_string()));
    assert!(summary.synced);

    h.clock.advance(Duration::hours(1));
    let second = FocusSession::finished(CompanionId::Sayori, h.clock.now(), 300, true);
    let summary = complete_focus_session(&h.stores, second, &mut rng).await.unwrap();
    assert_eq!(summary.affinity, 18);
    assert!(!summary.unlocked.contains(&"sayori_friend".to_string()));

    let doc = h.document();
    assert_eq!(doc.achievements.iter().filter(|a| a.id == "sayori_friend").count(), 1);
    assert_eq!(doc.inventory.sprites, vec!["sayori_casual".to_string()]);
    assert_eq!(doc.companions[&CompanionId::Sayori].affinity_level, 18);
}

#[tokio::test]
async fn test_goal_reward_affinity_is_clamped() {
    let h = harness().await;
    let mut doc = h.document();
    doc.companions.get_mut(&CompanionId::Monika).unwrap().affinity_level = 98;
    h.gateway.insert_document(&h.owner(), &doc).unwrap();
    assert_ok!(h.stores.load().await);

    let mut rng = StdRng::seed_from_u64(1);
    let goal = h
        .stores
        .goals
        .assign_companion_goal(CompanionId::Monika, &mut rng)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(goal.goal_type, GoalType::Challenge);
    h.stores.goals.mark_complete(&goal.id).await.unwrap();
    assert_ok!(h.stores.load().await);

    let doc = h.document();
    // 98 plus five for a companion goal
    assert_eq!(doc.companions[&CompanionId::Monika].affinity_level, 100);
    assert_eq!(doc.goals.completed_goals, 1);
    assert_eq!(doc.goals.challenge_goals_completed, 1);
    assert!(doc.achievements.iter().any(|a| a.id == "your_first_goal"));
}

// =============================================================================
// Goal Refresh & Session Cascade
// =============================================================================

#[tokio::test]
async fn test_expired_daily_is_replaced_remotely() {
    let h = harness().await;
    let goals = &h.stores.goals;
    let mut rng = StdRng::seed_from_u64(21);

    let first = goals.refresh(CompanionId::Natsuki, &mut rng).await.unwrap();
    assert_eq!(first.created.len(), 4);
    assert!(goals.refresh(CompanionId::Natsuki, &mut rng).await.unwrap().created.is_empty());
    goals.sync(true).await.unwrap();

    let stale = h
        .document()
        .goals
        .list
        .iter()
        .find(|g| g.goal_type == GoalType::Daily)
        .unwrap()
        .id
        .clone();

    h.clock.advance(Duration::days(1));
    let second = goals.refresh(CompanionId::Natsuki, &mut rng).await.unwrap();
    assert_eq!(second.removed, vec![stale.clone()]);
    assert_eq!(second.created.len(), 1);
    goals.sync(true).await.unwrap();

    let doc = h.document();
    assert_eq!(doc.goals.list.len(), 4);
    assert!(find_goal(&doc.goals.list, &stale).is_none());
    let dailies: Vec<_> = doc.goals.list.iter().filter(|g| g.goal_type == GoalType::Daily).collect();
    assert_eq!(dailies.len(), 1);
    assert!(dailies[0].deadline > h.clock.now());
}

#[tokio::test]
async fn test_session_completes_goal_and_cascades() {
    let h = harness().await;
    let goal = h.stores.goals.add_goal(user_goal(25)).await.unwrap();
    let mut rng = StdRng::seed_from_u64(4);

    let session = FocusSession::finished(CompanionId::Sayori, h.clock.now(), 25 * 60, true);
    let summary = complete_focus_session(&h.stores, session, &mut rng).await.unwrap();

    assert_eq!(summary.completed_goals, vec![goal.id.clone()]);
    assert_eq!(summary.affinity_gained, 25);
    assert!(summary.unlocked.contains(&"first_session".to_string()));
    assert!(summary.unlocked.contains(&"your_first_goal".to_string()));
    assert!(!summary.line.is_empty());

    for store in h.stores.handles() {
        assert_eq!(store.pending_len().await, 0, "{} still has pending updates", store.name());
    }
    let doc = h.document();
    assert_eq!(doc.focus_stats.total_sessions, 1);
    assert_eq!(doc.goals.completed_goals, 1);
    assert_eq!(doc.features.get("daily_quote"), Some(&true));
    assert_eq!(doc.features.get("goal_templates"), Some(&true));
    assert_eq!(doc.companions[&CompanionId::Sayori].affinity_level, 25);
}

#[tokio::test]
async fn test_session_offline_reports_unsynced() {
    let h = harness().await;
    let mut rng = StdRng::seed_from_u64(8);
    h.gateway.set_offline(true);

    let session = FocusSession::finished(CompanionId::Sayori, h.clock.now(), 600, false);
    let summary = complete_focus_session(&h.stores, session, &mut rng).await.unwrap();
    assert!(!summary.synced);
    // incomplete sessions earn a point per two minutes
    assert_eq!(summary.affinity_gained, 5);
    assert!(h.stores.user.pending_len().await > 0);

    h.gateway.set_offline(false);
    for result in h.stores.sync_all(true).await {
        assert_ok!(result);
    }
    assert_eq!(h.document().focus_stats.total_sessions, 1);
}

// =============================================================================
// Concurrent Replay
// =============================================================================

/// Memory gateway that hands control back to the runtime around every call,
/// so stores draining side by side interleave their reads and writes.
struct YieldingGateway {
    inner: Arc<MemoryGateway>,
}

#[async_trait]
impl PersistenceGateway for YieldingGateway {
    fn id(&self) -> &str {
        "yielding"
    }

    async fn get_document(&self, owner: &OwnerId) -> Result<Option<UserDocument>, GatewayError> {
        let doc = self.inner.get_document(owner).await;
        tokio::task::yield_now().await;
        doc
    }

    async fn create_document(&self, owner: &OwnerId, document: &UserDocument) -> Result<bool, GatewayError> {
        self.inner.create_document(owner, document).await
    }

    async fn update_fields(&self, owner: &OwnerId, update: FieldUpdate) -> Result<WriteOutcome, GatewayError> {
        tokio::task::yield_now().await;
        self.inner.update_fields(owner, update).await
    }
}

#[tokio::test]
async fn test_concurrent_drain_keeps_every_affinity_gain() {
    let memory = Arc::new(MemoryGateway::new());
    let owner = OwnerId::new("u1");
    let clock = Arc::new(ManualClock::new(start()));

    // a Sayori goal worth five affinity points on completion
    let goal = Goal::for_companion(&templates_for(CompanionId::Sayori)[0], CompanionId::Sayori, start());
    assert_eq!(goal.reward, Some(GoalReward::Affinity(5)));
    let mut doc = UserDocument::initial(&owner, "u1@example.com", CompanionId::Sayori, start());
    doc.goals.list.push(goal.clone());
    memory.insert_document(&owner, &doc).unwrap();

    let gateway = Arc::new(YieldingGateway { inner: memory.clone() });
    let ctx = SessionContext::new(owner.clone(), clock.clone(), SyncConfig::default());
    let stores = Stores::new(gateway, ctx).unwrap();
    assert_ok!(stores.load().await);

    memory.set_offline(true);
    stores.companion.after_session(CompanionId::Sayori, 25 * 60, true).await.unwrap();
    assert!(stores.goals.mark_complete(&goal.id).await.unwrap());
    // the achievements sync that follows a completion fails quietly
    assert!(stores.achievements.last_error().await.is_some());
    assert_eq!(stores.companion.pending_len().await, 2);

    memory.set_offline(false);
    for result in stores.sync_all(true).await {
        assert_ok!(result);
    }

    let doc = memory.document(&owner).unwrap();
    let sayori = &doc.companions[&CompanionId::Sayori];
    // 25 for the session, 5 for a companion goal, 5 from the goal's reward
    assert_eq!(sayori.affinity_level, 35);
    assert_eq!(sayori.stats.sessions_completed, 1);
    assert_eq!(sayori.stats.goals_completed, 1);
    assert_eq!(sayori.stats.total_interaction_time, 25 * 60);
    assert_eq!(doc.goals.completed_goals, 1);
}

// =============================================================================
// Coordinator & Restart
// =============================================================================

#[tokio::test]
async fn test_coordinator_drains_on_shutdown() {
    let h = harness().await;
    h.stores
        .user
        .update_settings(SettingsUpdate {
            selected_companion: Some(CompanionId::Yuri),
            ..Default::default()
        })
        .await
        .unwrap();

    let coordinator = SyncCoordinator::from_config(h.stores.handles(), &SyncConfig::default().coordinator);
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(coordinator.run(rx));
    tx.send(true).unwrap();

    let reports = handle.await.unwrap();
    assert_eq!(reports.len(), 4);
    assert!(reports.iter().all(|r| !r.is_failure()));
    assert_eq!(h.document().settings.selected_companion, Some(CompanionId::Yuri));
}

#[tokio::test]
async fn test_restored_queue_replays_after_restart() {
    let h = harness().await;
    h.gateway.set_offline(true);
    h.stores
        .user
        .update_settings(SettingsUpdate {
            selected_companion: Some(CompanionId::Natsuki),
            ..Default::default()
        })
        .await
        .unwrap();
    let saved = serde_json::to_string(&h.stores.user.export_state().await).unwrap();
    let op_id = h.stores.user.core().pending().await[0].op_id;

    h.gateway.set_offline(false);
    let reopened = h.reopen();
    reopened.user.restore_state(serde_json::from_str(&saved).unwrap()).await;
    assert_eq!(reopened.user.core().pending().await[0].op_id, op_id);
    assert_eq!(reopened.user.selected_companion().await, CompanionId::Natsuki);

    reopened.user.sync(false).await.unwrap();
    assert_eq!(h.document().settings.selected_companion, Some(CompanionId::Natsuki));
}
