//! Executor: turns engine decisions into exchange orders with resolved prices.
//!
//! The Executor is the bridge between the pure Engine (decisions) and
//! the impure Exchange (I/O). It places one market order per call and
//! works out the price the order executed at.
//!
//! # Flow
//!
//! ```text
//! enter: order → fill price? ──yes──→ Fill
//!                    │no
//!                    └→ settle delay → PriceResolver
//! exit:  order → PriceResolver (entry price as last resort)
//! ```
//!
//! No timeout is applied to the order call itself; only price resolution is
//! time-bounded.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info};

use signalflip_domain::{OpenPosition, Product, Quantity, Side};

use crate::error::ExecResult;
use crate::ports::ExchangePort;
use crate::price::{PriceQuote, PriceResolver, PriceResolverConfig};

// =============================================================================
// Execution Result
// =============================================================================

/// Outcome of a filled market order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Exchange order id, when reported
    pub order_id: Option<String>,
    /// Execution price and its source
    pub quote: PriceQuote,
}

impl Execution {
    /// Execution price, zero when unavailable
    pub fn price(&self) -> Decimal {
        self.quote.value()
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Product every order is placed on
    pub product: Product,
    /// Size of every order
    pub order_size: Quantity,
    /// Wait before asking the ticker when an entry fill has no price
    pub fill_settle_delay: Duration,
    /// Ticker retry policy
    pub price: PriceResolverConfig,
}

/// Places entry and exit orders for the configured product.
pub struct Executor<E: ExchangePort> {
    exchange: Arc<E>,
    prices: PriceResolver<E>,
    config: ExecutorConfig,
}

impl<E: ExchangePort> Executor<E> {
    /// Create a new executor.
    pub fn new(exchange: Arc<E>, config: ExecutorConfig) -> Self {
        let prices = PriceResolver::new(exchange.clone(), config.price);
        Self {
            exchange,
            prices,
            config,
        }
    }

    /// Product traded by this executor
    pub fn product(&self) -> &Product {
        &self.config.product
    }

    /// Order size
    pub fn order_size(&self) -> Quantity {
        self.config.order_size
    }

    /// Price resolver (shares the last-price cache)
    pub fn prices(&self) -> &PriceResolver<E> {
        &self.prices
    }

    /// Open a position on `side`.
    ///
    /// `fallback_entry` is the best price known if nothing else resolves
    /// (the entry price of a position just closed in a flip).
    ///
    /// # Errors
    ///
    /// Only the order call can fail; once the order is accepted a price is
    /// always produced, possibly degraded.
    pub async fn enter(&self, side: Side, fallback_entry: Option<Decimal>) -> ExecResult<Execution> {
        let product = &self.config.product;
        let order_side = side.entry_action();

        info!(%product, %order_side, size = %self.config.order_size, "Placing entry order");
        let fill = self
            .exchange
            .place_market_order(product, order_side, self.config.order_size)
            .await?;

        let quote = match fill.fill_price() {
            Some(price) => {
                self.prices.record(product, price);
                PriceQuote::Fill(price)
            },
            None => {
                debug!(%product, "Fill price missing, waiting for ticker");
                tokio::time::sleep(self.config.fill_settle_delay).await;
                self.prices.resolve(product, fallback_entry).await
            },
        };

        Ok(Execution {
            order_id: fill.order_id,
            quote,
        })
    }

    /// Close `position` with an opposite-side market order.
    ///
    /// The exit price always comes from the price resolver, falling back to
    /// the entry price when the ticker is unreachable.
    pub async fn exit(&self, position: &OpenPosition) -> ExecResult<Execution> {
        let product = &self.config.product;
        let order_side = position.side.exit_action();

        info!(%product, %order_side, size = %self.config.order_size, "Placing exit order");
        let fill = self
            .exchange
            .place_market_order(product, order_side, self.config.order_size)
            .await?;

        let quote = self.prices.resolve(product, Some(position.entry_price)).await;

        Ok(Execution {
            order_id: fill.order_id,
            quote,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecError;
    use crate::stub::StubExchange;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use signalflip_domain::{OrderSide, Price};

    fn create_executor(exchange: Arc<StubExchange>) -> Executor<StubExchange> {
        Executor::new(
            exchange,
            ExecutorConfig {
                product: Product::new(84, "BTCUSD").unwrap(),
                order_size: Quantity::new(dec!(1)).unwrap(),
                fill_settle_delay: Duration::from_secs(1),
                price: PriceResolverConfig::default(),
            },
        )
    }

    fn long_at(price: Decimal) -> OpenPosition {
        OpenPosition {
            side: Side::Long,
            entry_price: price,
            entry_time: Utc::now(),
            entry_order_id: "1".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_uses_fill_price() {
        let exchange = Arc::new(StubExchange::new(dec!(27000)));
        let executor = create_executor(exchange.clone());

        let execution = executor.enter(Side::Short, None).await.unwrap();

        assert_eq!(execution.quote, PriceQuote::Fill(Price::new(dec!(27000)).unwrap()));
        assert_eq!(execution.order_id.as_deref(), Some("STUB-1"));
        assert_eq!(exchange.orders()[0].side, OrderSide::Sell);
        assert_eq!(exchange.ticker_calls(), 0);
        // Fill prices feed the cache
        assert_eq!(executor.prices().cached(executor.product()).unwrap().as_decimal(), dec!(27000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_without_fill_price_uses_ticker() {
        let exchange = Arc::new(StubExchange::new(dec!(27050)));
        exchange.set_fill_reporting(false);
        let executor = create_executor(exchange.clone());

        let execution = executor.enter(Side::Long, None).await.unwrap();

        assert_eq!(execution.quote, PriceQuote::Live(Price::new(dec!(27050)).unwrap()));
        assert_eq!(exchange.ticker_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_degrades_to_fallback_entry() {
        let exchange = Arc::new(StubExchange::new(dec!(27050)));
        exchange.set_fill_reporting(false);
        exchange.set_ticker_failing(true);
        let executor = create_executor(exchange);

        let execution = executor.enter(Side::Long, Some(dec!(26500))).await.unwrap();

        assert_eq!(execution.price(), dec!(26500));
        assert!(execution.quote.is_degraded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_propagates_rejection() {
        let exchange = Arc::new(StubExchange::new(dec!(27000)));
        exchange.reject_next_order("insufficient_margin");
        let executor = create_executor(exchange);

        let result = executor.enter(Side::Long, None).await;
        assert!(matches!(result, Err(ExecError::OrderRejected(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_places_opposite_order() {
        let exchange = Arc::new(StubExchange::new(dec!(27500)));
        let executor = create_executor(exchange.clone());

        let execution = executor.exit(&long_at(dec!(27000))).await.unwrap();

        assert_eq!(exchange.orders()[0].side, OrderSide::Sell);
        assert_eq!(execution.price(), dec!(27500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_falls_back_to_entry_price() {
        let exchange = Arc::new(StubExchange::new(dec!(27500)));
        exchange.set_ticker_failing(true);
        let executor = create_executor(exchange);

        let execution = executor.exit(&long_at(dec!(27000))).await.unwrap();

        assert_eq!(execution.quote, PriceQuote::EntryFallback(Price::new(dec!(27000)).unwrap()));
    }
}
