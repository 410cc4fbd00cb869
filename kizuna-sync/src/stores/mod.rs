//! Domain stores.
//!
//! Each store owns an optimistic copy of one slice of the user document and a
//! pending queue for it. Mutators change the copy, queue the intent and return;
//! only `sync` talks to the gateway.

pub mod achievements;
pub mod companion;
pub mod goals;
pub mod user;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use futures::future::join_all;

pub use achievements::AchievementsStore;
pub use companion::{CompanionChange, CompanionStore};
pub use goals::{GoalsSnapshot, GoalsStore, RefreshSummary};
pub use user::{UserState, UserStore};

use crate::context::SessionContext;
use crate::error::Result;
use crate::gateway::PersistenceGateway;
use crate::remote::Remote;
use crate::sync::{DomainStore, SyncReport};

/// The four stores of one session, wired for the goal completion cascade.
#[derive(Clone)]
pub struct Stores {
    pub user: Arc<UserStore>,
    pub goals: Arc<GoalsStore>,
    pub achievements: Arc<AchievementsStore>,
    pub companion: Arc<CompanionStore>,
}

impl Stores {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, ctx: SessionContext) -> Result<Self> {
        let remote = Remote::new(gateway, ctx);
        let achievements = Arc::new(AchievementsStore::new(remote.clone()));
        let companion = Arc::new(CompanionStore::new(remote.clone())?);
        let goals = Arc::new(
            GoalsStore::new(remote.clone())
                .with_achievements(achievements.clone())
                .with_companions(companion.clone()),
        );
        let user = Arc::new(UserStore::new(remote));
        Ok(Self {
            user,
            goals,
            achievements,
            companion,
        })
    }

    /// Every store as a coordinator handle.
    pub fn handles(&self) -> Vec<Arc<dyn DomainStore>> {
        vec![
            self.user.clone(),
            self.goals.clone(),
            self.achievements.clone(),
            self.companion.clone(),
        ]
    }

    /// Load every store from the remote document.
    pub async fn load(&self) -> Result<()> {
        for store in self.handles() {
            store.sync(true).await?;
        }
        Ok(())
    }

    /// Sync every store concurrently. One result per store, in handle order.
    pub async fn sync_all(&self, force: bool) -> Vec<Result<SyncReport>> {
        let handles = self.handles();
        join_all(handles.iter().map(|store| store.sync(force))).await
    }
}
