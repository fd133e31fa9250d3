//! In-memory store implementation
//!
//! Used for testing and development without a state file.
//! Thread-safe using RwLock for concurrent access.

use crate::error::StoreError;
use crate::repository::PositionStore;
use async_trait::async_trait;
use signalflip_domain::Position;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

/// In-memory store for testing
#[derive(Default)]
pub struct MemoryStore {
    position: RwLock<Option<Position>>,
    saves: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `position`
    pub fn with_position(position: Position) -> Self {
        Self {
            position: RwLock::new(Some(position)),
            ..Self::default()
        }
    }

    /// Currently stored position (without going through `load`)
    pub fn stored(&self) -> Option<Position> {
        self.position.read().unwrap().clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every operation fail until turned off
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("Simulated store failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn save(&self, position: &Position) -> Result<(), StoreError> {
        self.check_available()?;
        *self.position.write().unwrap() = Some(position.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self) -> Result<Option<Position>, StoreError> {
        self.check_available()?;
        Ok(self.position.read().unwrap().clone())
    }
}
