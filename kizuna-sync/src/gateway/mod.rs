//! Remote persistence layer.
//!
//! - [`PersistenceGateway`]: the trait every backend implements
//! - [`MemoryGateway`]: in-memory backend with failure injection for tests

pub mod memory;
pub mod traits;

pub use memory::MemoryGateway;
pub use traits::{FieldOp, FieldUpdate, PersistenceGateway, WriteOutcome};
