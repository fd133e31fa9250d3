//! Signalflip Storage Layer
//!
//! Durable copy of the tracked position for crash recovery.
//!
//! # Architecture
//!
//! - **Repository trait**: Defines the storage interface (port)
//! - **File store**: JSON state file, atomically replaced on every save
//! - **In-memory store**: Fast implementation for testing
//!
//! # Usage
//!
//! ```rust
//! use signalflip_store::{FileStore, PositionStore};
//! use signalflip_domain::Position;
//!
//! #[tokio::main]
//! async fn main() {
//!     let path = std::env::temp_dir().join("signalflip-doc-state.json");
//!     let store = FileStore::new(&path);
//!
//!     store.save(&Position::Flat).await.unwrap();
//!     assert_eq!(store.load().await.unwrap(), Some(Position::Flat));
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod file;
mod memory;
mod record;
mod repository;

// Re-exports
pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use record::{PositionRecord, RecordedSide};
pub use repository::PositionStore;
