//! Shared setup for store unit tests.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use kizuna_core::{CompanionId, OwnerId, Timestamp, UserDocument};

use crate::config::SyncConfig;
use crate::context::{ManualClock, SessionContext};
use crate::gateway::MemoryGateway;
use crate::remote::Remote;

pub struct Fixture {
    pub gateway: Arc<MemoryGateway>,
    pub clock: Arc<ManualClock>,
    pub ctx: SessionContext,
}

impl Fixture {
    pub fn remote(&self) -> Remote {
        Remote::new(self.gateway.clone(), self.ctx.clone())
    }

    pub fn owner(&self) -> OwnerId {
        self.ctx.owner().clone()
    }

    pub fn document(&self) -> UserDocument {
        self.gateway.document(self.ctx.owner()).unwrap()
    }
}

/// Wednesday 2024-03-06 10:00 UTC.
pub fn start() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 6, 10, 0, 0).unwrap()
}

/// A seeded document for `u1` with Sayori selected.
pub fn fixture() -> Fixture {
    let owner = OwnerId::new("u1");
    let gateway = Arc::new(MemoryGateway::new());
    gateway
        .insert_document(&owner, &UserDocument::initial(&owner, "u1@example.com", CompanionId::Sayori, start()))
        .unwrap();
    let clock = Arc::new(ManualClock::new(start()));
    let ctx = SessionContext::new(owner, clock.clone(), SyncConfig::default());
    Fixture { gateway, clock, ctx }
}
