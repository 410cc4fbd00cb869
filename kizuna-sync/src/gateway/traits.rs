//! Core trait for remote persistence.
//!
//! The gateway is the only thing that talks to the document store. Reads are
//! whole-document; writes are targeted field updates made of a few atomic
//! operators.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use kizuna_core::{OwnerId, UserDocument};

use crate::error::GatewayError;

/// One atomic operator applied at a dotted field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldOp {
    /// Replace the value
    Set { value: Value },
    /// Add a delta to a number. A missing field counts as zero. With `max`,
    /// the result never exceeds it.
    Increment {
        delta: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    /// Append each value the array does not already contain
    ArrayUnion { values: Vec<Value> },
    /// Append `value` unless an element has the same value under `key`
    AppendIfAbsent { key: String, value: Value },
}

/// A batch of writes applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    /// Dedup key. A key already applied for the owner turns the whole update
    /// into a no-op.
    pub operation: Option<String>,
    pub writes: Vec<(String, FieldOp)>,
}

impl FieldUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tagged with an operation key.
    pub fn keyed(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            writes: Vec::new(),
        }
    }

    pub fn set(mut self, path: impl Into<String>, value: Value) -> Self {
        self.writes.push((path.into(), FieldOp::Set { value }));
        self
    }

    /// Serialize `value` and set it.
    pub fn set_json<T: Serialize + ?Sized>(self, path: impl Into<String>, value: &T) -> Result<Self, GatewayError> {
        Ok(self.set(path, serde_json::to_value(value)?))
    }

    pub fn increment(mut self, path: impl Into<String>, delta: i64) -> Self {
        self.writes.push((path.into(), FieldOp::Increment { delta, max: None }));
        self
    }

    /// Increment clamped at `max`, applied against the stored value.
    pub fn increment_capped(mut self, path: impl Into<String>, delta: i64, max: i64) -> Self {
        self.writes.push((path.into(), FieldOp::Increment { delta, max: Some(max) }));
        self
    }

    pub fn array_union(mut self, path: impl Into<String>, values: Vec<Value>) -> Self {
        self.writes.push((path.into(), FieldOp::ArrayUnion { values }));
        self
    }

    pub fn append_if_absent(mut self, path: impl Into<String>, key: impl Into<String>, value: Value) -> Self {
        self.writes.push((
            path.into(),
            FieldOp::AppendIfAbsent {
                key: key.into(),
                value,
            },
        ));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// How an update landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Writes applied. `appended` counts `AppendIfAbsent` writes that added
    /// an element.
    Applied { appended: usize },
    /// The operation key was seen before. Nothing changed; `appended` is
    /// what the first application reported.
    Replayed { appended: usize },
}

impl WriteOutcome {
    pub fn appended(&self) -> usize {
        match self {
            Self::Applied { appended } | Self::Replayed { appended } => *appended,
        }
    }

    pub fn was_replayed(&self) -> bool {
        matches!(self, Self::Replayed { .. })
    }
}

/// Remote document store.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Gateway identifier for logs.
    fn id(&self) -> &str;

    /// Full snapshot read.
    async fn get_document(&self, owner: &OwnerId) -> Result<Option<UserDocument>, GatewayError>;

    /// Create the document if absent. Returns whether it was created.
    async fn create_document(&self, owner: &OwnerId, document: &UserDocument) -> Result<bool, GatewayError>;

    /// Apply targeted writes to an existing document.
    async fn update_fields(&self, owner: &OwnerId, update: FieldUpdate) -> Result<WriteOutcome, GatewayError>;
}
