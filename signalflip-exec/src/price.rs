//! Last-traded-price resolution with bounded retry and cached fallback.
//!
//! # Resolution order
//!
//! ```text
//! ticker (up to N attempts, fixed delay; only transient errors are retried)
//!   → last price seen for the product (process-wide cache)
//!   → entry price of the open position
//!   → Unavailable (0)
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use signalflip_domain::{Price, Product};

use crate::ports::ExchangePort;

/// Retry policy for ticker queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceResolverConfig {
    /// Ticker attempts before falling back (at least one is always made)
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
}

impl Default for PriceResolverConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// A resolved price and where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "price", rename_all = "snake_case")]
pub enum PriceQuote {
    /// Average fill price reported with the order
    Fill(Price),
    /// Fresh ticker price
    Live(Price),
    /// Ticker unreachable; last price observed earlier
    Cached(Price),
    /// Ticker unreachable, nothing cached; entry price of the open position
    EntryFallback(Price),
    /// Nothing available. Callers treat the zero value as degraded.
    Unavailable,
}

impl PriceQuote {
    /// Price value, zero when unavailable
    pub fn value(&self) -> Decimal {
        match self {
            PriceQuote::Fill(p)
            | PriceQuote::Live(p)
            | PriceQuote::Cached(p)
            | PriceQuote::EntryFallback(p) => p.as_decimal(),
            PriceQuote::Unavailable => Decimal::ZERO,
        }
    }

    /// True when the price did not come from the exchange just now
    pub fn is_degraded(&self) -> bool {
        !matches!(self, PriceQuote::Fill(_) | PriceQuote::Live(_))
    }
}

/// Resolves last traded prices for a product.
pub struct PriceResolver<E: ExchangePort> {
    exchange: Arc<E>,
    config: PriceResolverConfig,
    /// Last observed price per product id
    cache: RwLock<HashMap<u64, Price>>,
}

impl<E: ExchangePort> PriceResolver<E> {
    /// Create a new resolver.
    pub fn new(exchange: Arc<E>, config: PriceResolverConfig) -> Self {
        Self {
            exchange,
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the last traded price.
    ///
    /// `fallback_entry` is the entry price of the open position (if any),
    /// used only when the ticker and the cache both come up empty.
    pub async fn resolve(&self, product: &Product, fallback_entry: Option<Decimal>) -> PriceQuote {
        let attempts = self.config.max_attempts.max(1);

        for attempt in 1..=attempts {
            match self.exchange.get_ticker(product).await {
                Ok(price) => {
                    debug!(%product, %price, attempt, "Ticker resolved");
                    self.record(product, price);
                    return PriceQuote::Live(price);
                },
                Err(e) if e.is_transient() => {
                    warn!(%product, attempt, max_attempts = attempts, error = %e, "Ticker query failed");
                },
                Err(e) => {
                    warn!(%product, attempt, error = %e, "Ticker query failed, not retrying");
                    break;
                },
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        if let Some(price) = self.cached(product) {
            warn!(%product, %price, "Ticker unavailable, using cached price");
            return PriceQuote::Cached(price);
        }

        if let Some(price) = fallback_entry.and_then(|p| Price::new(p).ok()) {
            warn!(%product, %price, "Ticker unavailable, using entry price");
            return PriceQuote::EntryFallback(price);
        }

        warn!(%product, "No price available");
        PriceQuote::Unavailable
    }

    /// Remember an observed price (ticker or fill).
    pub fn record(&self, product: &Product, price: Price) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(product.id(), price);
    }

    /// Last observed price for a product
    pub fn cached(&self, product: &Product) -> Option<Price> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&product.id())
            .copied()
    }
}

// =============================================================================
// Tests
// =============================================================================
