//! Repository trait definition (Port)
//!
//! Implementations can be file-backed, in-memory, or mock for testing.

use crate::error::StoreError;
use async_trait::async_trait;
use signalflip_domain::Position;

/// Durable copy of the tracked position.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Overwrite the stored position.
    ///
    /// Called after every transition, so it must be cheap and safe to repeat.
    async fn save(&self, position: &Position) -> Result<(), StoreError>;

    /// Load the stored position.
    ///
    /// Returns `Ok(None)` when nothing was saved or the record is corrupt
    /// (corruption is logged, never fatal). `Err` is reserved for the store
    /// itself being unreachable.
    async fn load(&self) -> Result<Option<Position>, StoreError>;
}
