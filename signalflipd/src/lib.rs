//! Signalflip Daemon Library
//!
//! Runtime orchestrator for the signalflip position engine.
//!
//! # Architecture
//!
//! ```text
//! Webhook → API Server → Position Engine → Executor → Exchange
//!                             │
//!                    Store + Notifier
//!                             ↑
//!                  Startup Reconciler (once)
//! ```
//!
//! # Components
//!
//! - **Daemon**: Main runtime orchestrator
//! - **Position Engine**: Serializes signals into position transitions
//! - **Startup Reconciler**: Aligns the position with the exchange at boot
//! - **API**: HTTP endpoints for webhooks and operators
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use signalflipd::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new_live(config).expect("Failed to build daemon");
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod position_engine;
pub mod reconciler;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ApiConfig, Config, EngineConfig, Environment, ExchangeConfig};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
pub use position_engine::{DropReason, Entry, PositionEngine, SignalOutcome};
pub use reconciler::{ReconcileSource, Reconciliation, StartupReconciler};
