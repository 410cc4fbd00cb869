use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use kizuna_core::document::{Inventory, UserSettings};
use kizuna_core::focus::push_recent;
use kizuna_core::{CompanionId, FocusSession, FocusStats, SettingsUpdate, UserDocument};

use crate::error::Result;
use crate::queue::{PendingKind, PendingUpdate};
use crate::remote::{self, Remote};
use crate::sync::{Domain, DomainStore, StoreSnapshot, SyncCore, SyncReport};

/// The user's slice of the document: settings, focus counters and rewards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    pub settings: UserSettings,
    pub focus_stats: FocusStats,
    pub recent_sessions: Vec<FocusSession>,
    pub inventory: Inventory,
    pub features: BTreeMap<String, bool>,
}

pub struct UserDomain;

#[async_trait]
impl Domain for UserDomain {
    type Data = UserState;

    fn name(&self) -> &'static str {
        "user"
    }

    async fn replay(&self, remote: &Remote, update: &PendingUpdate) -> Result<()> {
        remote::user::replay(remote, update).await
    }

    fn pull(&self, doc: &UserDocument) -> Self::Data {
        UserState {
            settings: doc.settings.clone(),
            focus_stats: doc.focus_stats.clone(),
            recent_sessions: doc.recent_sessions.clone(),
            inventory: doc.inventory.clone(),
            features: doc.features.clone(),
        }
    }
}

pub struct UserStore {
    core: SyncCore<UserDomain>,
}

impl UserStore {
    pub fn new(remote: Remote) -> Self {
        let cooldown = remote.ctx().config().user.cooldown();
        Self {
            core: SyncCore::new(UserDomain, remote, cooldown, UserState::default()),
        }
    }

    pub fn core(&self) -> &SyncCore<UserDomain> {
        &self.core
    }

    /// Create the document on first sign-in, then load it.
    pub async fn ensure_document(&self, email: &str, selected: CompanionId) -> Result<bool> {
        let created = remote::user::ensure_document(self.core.remote(), email, selected).await?;
        self.core.sync(true).await?;
        Ok(created)
    }

    pub async fn state(&self) -> UserState {
        self.core.data().await
    }

    pub async fn selected_companion(&self) -> CompanionId {
        self.core.read(|state| state.data.settings.companion()).await
    }

    pub async fn focus_stats(&self) -> FocusStats {
        self.core.read(|state| state.data.focus_stats.clone()).await
    }

    pub async fn has_feature(&self, feature: &str) -> bool {
        self.core
            .read(|state| state.data.features.get(feature).copied().unwrap_or(false))
            .await
    }

    /// Fold a finished session into the counters. Returns the updated stats.
    pub async fn record_focus_session(&self, session: FocusSession) -> Result<FocusStats> {
        let now = self.core.ctx().local_now();
        let limit = self.core.ctx().config().user.recent_sessions_limit;
        self.core
            .mutate(|data, intents| {
                data.focus_stats.record(&session, &now);
                push_recent(&mut data.recent_sessions, session.clone(), limit);
                debug!(
                    session = %session.id,
                    streak = data.focus_stats.daily_streak,
                    total = data.focus_stats.total_sessions,
                    "Focus session recorded"
                );
                intents.push(PendingKind::RecordFocusSession { session });
                Ok(data.focus_stats.clone())
            })
            .await
    }

    /// Merge a partial settings change.
    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        self.core
            .mutate(|data, intents| {
                data.settings.apply(&update);
                intents.push(PendingKind::UpdateSettings { update });
                Ok(())
            })
            .await
    }

    pub async fn export_state(&self) -> StoreSnapshot<UserState> {
        self.core.export_state().await
    }

    pub async fn restore_state(&self, snapshot: StoreSnapshot<UserState>) {
        self.core.restore_state(snapshot).await
    }
}

#[async_trait]
impl DomainStore for UserStore {
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
    use crate::error::SyncError;
    use crate::gateway::MemoryGateway;
    use crate::stores::testing::{fixture, start};
    use chrono::Duration;
    use kizuna_core::document::ThemeSettings;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_ensure_document_creates_once() {
        let fx = fixture();
        let fresh = Arc::new(MemoryGateway::new());
        let store = UserStore::new(Remote::new(fresh.clone(), fx.ctx.clone()));

        assert!(store.ensure_document("u1@example.com", CompanionId::Yuri).await.unwrap());
        assert!(!store.ensure_document("u1@example.com", CompanionId::Sayori).await.unwrap());

        let doc = fresh.document(&fx.owner()).unwrap();
        assert_eq!(doc.companions.len(), 4);
        assert_eq!(doc.goals.daily_goal, 25);
        assert_eq!(doc.goals.weekly_goal, 150);
        assert_eq!(store.selected_companion().await, CompanionId::Yuri);
    }

    #[tokio::test]
    async fn test_missing_document_is_an_error() {
        let fx = fixture();
        let store = UserStore::new(Remote::new(Arc::new(MemoryGateway::new()), fx.ctx.clone()));
        let err = store.sync(true).await.unwrap_err();
        assert!(matches!(err, SyncError::MissingDocument(_)));
    }

    #[tokio::test]
    async fn test_session_updates_stats_everywhere() {
        let fx = fixture();
        let store = UserStore::new(fx.remote());
        store.sync(true).await.unwrap();

        let session = FocusSession::finished(CompanionId::Sayori, start(), 25 * 60, true);
        let stats = store.record_focus_session(session.clone()).await.unwrap();
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.daily_streak, 1);

        store.sync(false).await.unwrap();
        let doc = fx.document();
        assert_eq!(doc.focus_stats, stats);
        assert_eq!(doc.recent_sessions, vec![session]);
    }

    #[tokio::test]
    async fn test_recent_sessions_capped_by_config() {
        let fx = fixture();
        let store = UserStore::new(fx.remote());
        store.sync(true).await.unwrap();

        for i in 0..12 {
            let end = start() + Duration::minutes(30 * i);
            store
                .record_focus_session(FocusSession::finished(CompanionId::Sayori, end, 600, true))
                .await
                .unwrap();
        }
        store.sync(false).await.unwrap();

        assert_eq!(store.state().await.recent_sessions.len(), 10);
        assert_eq!(fx.document().focus_stats.total_sessions, 12);
    }

    #[tokio::test]
    async fn test_settings_update_touches_only_given_sections() {
        let fx = fixture();
        let store = UserStore::new(fx.remote());
        store.sync(true).await.unwrap();

        let theme = ThemeSettings {
            dark_mode: false,
            ..Default::default()
        };
        store
            .update_settings(SettingsUpdate {
                theme: Some(theme.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        store.sync(false).await.unwrap();

        let doc = fx.document();
        assert_eq!(doc.settings.theme, theme);
        assert_eq!(doc.settings.selected_companion, Some(CompanionId::Sayori));
        assert_eq!(doc.settings.timer_settings.work_duration, 25);
    }
}
