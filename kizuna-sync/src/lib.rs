//! Kizuna Sync - optimistic stores over a remote user document
//!
//! Provides:
//! - A persistence gateway trait with keyed, all-or-nothing field updates
//! - Per-domain stores that mutate locally and queue pending updates
//! - Replay of queued updates against the document, deduplicated by op id
//! - A coordinator that drains every store on a timer and on shutdown
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │  Stores (user │ goals │ achievements │ companion)│
//! │  local data + PendingQueue, one per store        │
//! └──────┬───────────────────────────────▲───────────┘
//!        │ sync: replay FIFO             │ pull
//!        ▼                               │
//! ┌──────────────┐   FieldUpdate   ┌─────┴──────────────┐
//! │ remote::*    ├────────────────►│ PersistenceGateway │
//! │ (core rules) │   op-keyed      │ (MemoryGateway)    │
//! └──────────────┘                 └────────────────────┘
//!        ▲
//! ┌──────┴─────────┐
//! │SyncCoordinator │ interval tick + forced drain on shutdown
//! └────────────────┘
//! ```

pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod queue;
pub mod remote;
pub mod session;
pub mod stores;
pub mod sync;

pub use config::SyncConfig;
pub use context::{Clock, ManualClock, SessionContext, SystemClock};
pub use coordinator::SyncCoordinator;
pub use error::{GatewayError, Result, SyncError};
pub use gateway::{FieldOp, FieldUpdate, MemoryGateway, PersistenceGateway, WriteOutcome};
pub use queue::{PendingKind, PendingQueue, PendingUpdate};
pub use session::{complete_focus_session, SessionSummary};
pub use stores::{AchievementsStore, CompanionStore, GoalsStore, Stores, UserStore};
pub use sync::{DomainStore, StoreSnapshot, SyncOutcome, SyncReport};
