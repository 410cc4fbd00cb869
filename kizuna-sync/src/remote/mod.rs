//! Remote operations.
//!
//! One replay function per domain. Each reads the authoritative document,
//! runs the same core rule the store ran optimistically, and writes the result
//! back as a single keyed [`FieldUpdate`]. The key is the update's `op_id`, so a
//! batch retried after a partial failure does not apply anything twice.

pub mod achievements;
pub mod companion;
pub mod goals;
pub mod user;

use std::sync::Arc;

use kizuna_core::{OwnerId, Timestamp, UserDocument};

use crate::context::SessionContext;
use crate::error::{Result, SyncError};
use crate::gateway::{FieldUpdate, PersistenceGateway, WriteOutcome};

/// Gateway bound to one session.
#[derive(Clone)]
pub struct Remote {
    gateway: Arc<dyn PersistenceGateway>,
    ctx: SessionContext,
}

impl Remote {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, ctx: SessionContext) -> Self {
        Self { gateway, ctx }
    }

    pub fn ctx(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn owner(&self) -> &OwnerId {
        self.ctx.owner()
    }

    pub fn now(&self) -> Timestamp {
        self.ctx.now()
    }

    pub fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        &self.gateway
    }

    /// The owner's document. A missing document is an error.
    pub async fn document(&self) -> Result<UserDocument> {
        self.gateway
            .get_document(self.owner())
            .await?
            .ok_or_else(|| SyncError::MissingDocument(self.owner().clone()))
    }

    pub async fn write(&self, update: FieldUpdate) -> Result<WriteOutcome> {
        Ok(self.gateway.update_fields(self.owner(), update).await?)
    }
}
