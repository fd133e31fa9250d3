//! Signalflip Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains the tracked position, trade summaries, signal classification,
//! and validated value objects.

#![warn(clippy::all)]

// Public modules
pub mod entities;
pub mod signal;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{OpenPosition, Position, TradeSummary, UNKNOWN_ORDER_ID};
pub use signal::SignalKind;
pub use value_objects::{DomainError, OrderSide, Price, Product, Quantity, Side};
