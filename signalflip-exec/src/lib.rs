//! Signalflip Execution Layer
//!
//! Market order execution with price resolution.
//!
//! # Architecture
//!
//! ```text
//! Engine Decision → Executor → Exchange → PriceResolver → Execution
//! ```
//!
//! # Components
//!
//! - **Ports**: Traits defining interfaces for the exchange and notifications
//! - **PriceResolver**: Last traded price with bounded retry and cached fallback
//! - **Executor**: Places entry/exit orders and resolves their prices
//! - **Stub**: Test implementations for development
//!
//! # Example
//!
//! ```rust,ignore
//! use signalflip_exec::{Executor, ExecutorConfig, StubExchange};
//! use std::sync::Arc;
//!
//! let exchange = Arc::new(StubExchange::new(dec!(27000)));
//! let executor = Executor::new(exchange, config);
//!
//! let execution = executor.enter(Side::Long, None).await?;
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod executor;
pub mod ports;
pub mod price;
pub mod stub;

// Re-exports for convenience
pub use error::{ExecError, ExecResult};
pub use executor::{Execution, Executor, ExecutorConfig};
pub use ports::{ExchangePort, Notifier, OrderFill, PositionSnapshot};
pub use price::{PriceQuote, PriceResolver, PriceResolverConfig};
pub use stub::{PlacedOrder, RecordingNotifier, StubExchange};
