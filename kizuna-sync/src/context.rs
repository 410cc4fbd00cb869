//! Session context handed to every store.
//!
//! Stores never look up the owner or the time themselves; both come from
//! here, so tests can pin the clock.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use kizuna_core::{LocalTime, OwnerId, Timestamp};

use crate::config::SyncConfig;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn set(&self, at: Timestamp) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct SessionContext {
    owner: OwnerId,
    clock: Arc<dyn Clock>,
    config: Arc<SyncConfig>,
}

impl SessionContext {
    pub fn new(owner: OwnerId, clock: Arc<dyn Clock>, config: SyncConfig) -> Self {
        Self {
            owner,
            clock,
            config: Arc::new(config),
        }
    }

    /// Context on the system clock with default configuration.
    pub fn system(owner: OwnerId) -> Self {
        Self::new(owner, Arc::new(SystemClock), SyncConfig::default())
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.config.clock.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// `now()` on the user's wall clock.
    pub fn local_now(&self) -> LocalTime {
        self.now().with_timezone(&self.offset())
    }

    pub fn to_local(&self, at: Timestamp) -> LocalTime {
        at.with_timezone(&self.offset())
    }
}
