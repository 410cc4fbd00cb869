//! Sync coordinator: periodic drains plus a final forced drain on shutdown.
//!
//! Stores stay independent. One timer drives all of them, and a failing store
//! never holds up the others.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;
use crate::sync::{DomainStore, SyncOutcome, SyncReport};

pub struct SyncCoordinator {
    stores: Vec<Arc<dyn DomainStore>>,
    interval: Duration,
}

impl SyncCoordinator {
    pub fn new(stores: Vec<Arc<dyn DomainStore>>, interval: Duration) -> Self {
        Self { stores, interval }
    }

    pub fn from_config(stores: Vec<Arc<dyn DomainStore>>, config: &CoordinatorConfig) -> Self {
        Self::new(stores, config.interval())
    }

    pub fn stores(&self) -> &[Arc<dyn DomainStore>] {
        &self.stores
    }

    /// Sync every store concurrently and report each outcome.
    pub async fn sync_all(&self, force: bool) -> Vec<SyncReport> {
        let results = join_all(self.stores.iter().map(|store| store.sync(force))).await;
        self.stores
            .iter()
            .zip(results)
            .map(|(store, result)| match result {
                Ok(report) => report,
                Err(err) => {
                    warn!(store = store.name(), error = %err, "Store sync failed");
                    SyncReport::new(
                        store.name(),
                        SyncOutcome::Failed {
                            error: err.to_string(),
                        },
                    )
                }
            })
            .collect()
    }

    /// Run until `shutdown` flips to true or its sender is dropped, then force
    /// a last sync of every store.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Vec<SyncReport> {
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick completes immediately.
        ticker.tick().await;
        info!(stores = self.stores.len(), interval_secs = self.interval.as_secs(), "Sync coordinator started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let reports = self.sync_all(false).await;
                    let failed = reports.iter().filter(|r| r.is_failure()).count();
                    debug!(failed, "Periodic sync finished");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let reports = self.sync_all(true).await;
        info!(
            failed = reports.iter().filter(|r| r.is_failure()).count(),
            "Sync coordinator stopped"
        );
        reports
    }
}
