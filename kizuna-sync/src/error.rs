//! Error types for the sync layer.

use kizuna_core::{OwnerId, ValidationError};

/// Failures raised by a persistence gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Store unreachable (offline, timeout)
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    /// A dotted path crosses a non-object value
    #[error("Invalid field path: {0}")]
    InvalidPath(String),

    #[error("Field {path} is not {expected}")]
    TypeMismatch { path: String, expected: &'static str },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors surfaced by stores and the coordinator.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The owner has no document. Call `ensure_document` during onboarding.
    #[error("No document for user {0}")]
    MissingDocument(OwnerId),

    /// A pending update was routed to a store that cannot replay it
    #[error("Store {store} cannot replay {kind}")]
    UnsupportedUpdate { store: &'static str, kind: &'static str },

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("Dialogue catalog error: {0}")]
    Catalog(#[from] kizuna_core::CatalogError),
}

impl SyncError {
    /// True for failures a later retry may clear, such as being offline.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Gateway(GatewayError::Unavailable(_)))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Gateway(GatewayError::from(err))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
