//! Signalflip Connectors
//!
//! Adapters for external services: the Delta Exchange REST API and
//! Telegram notifications. Normalizes service-specific types to domain types.

#![warn(clippy::all)]

// Public modules
pub mod delta_rest;
pub mod telegram;

// Re-exports
pub use delta_rest::{
    DeltaOrder, DeltaPosition, DeltaRestClient, DeltaRestError, DeltaTicker, DELTA_API_URL,
};
pub use telegram::{LogNotifier, TelegramConfig, TelegramNotifier};
