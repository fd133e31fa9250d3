//! Execution layer port definitions.
//!
//! Ports define the interfaces for external services (exchange, notifications).
//! Adapters implement these ports for specific services (Delta, Telegram, stub, etc.).

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use signalflip_domain::{OrderSide, Price, Product, Quantity, Side};

use crate::error::ExecError;

// =============================================================================
// Exchange Port
// =============================================================================

/// Port for exchange operations.
///
/// Implementations:
/// - `StubExchange` - For testing (scriptable fills, failures and positions)
/// - `DeltaRestClient` - Real Delta Exchange REST API
#[async_trait]
pub trait ExchangePort: Send + Sync {
    /// Place a market order for the full size.
    ///
    /// # Errors
    ///
    /// - `ExecError::Exchange` when the exchange cannot be reached
    /// - `ExecError::OrderRejected` when the exchange reports `success=false`
    async fn place_market_order(
        &self,
        product: &Product,
        side: OrderSide,
        size: Quantity,
    ) -> Result<OrderFill, ExecError>;

    /// Last traded price for a product.
    async fn get_ticker(&self, product: &Product) -> Result<Price, ExecError>;

    /// All positions currently held on the account.
    async fn get_positions(&self) -> Result<Vec<PositionSnapshot>, ExecError>;
}

/// Result of an accepted market order.
///
/// Both fields are optional: some venues acknowledge market orders before
/// the fill is known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFill {
    /// Exchange-assigned order ID
    pub order_id: Option<String>,
    /// Average fill price, when reported
    pub average_fill_price: Option<Decimal>,
}

impl OrderFill {
    /// Fill price, if the exchange reported a strictly positive one
    pub fn fill_price(&self) -> Option<Price> {
        self.average_fill_price.and_then(|p| Price::new(p).ok())
    }
}

/// A position as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Exchange product id
    pub product_id: u64,
    /// Absolute size in contracts (zero when flat)
    pub size: Decimal,
    /// Direction
    pub side: Side,
    /// Average entry price, when reported
    pub entry_price: Option<Decimal>,
}

impl PositionSnapshot {
    /// Build from a signed size (positive long, negative short).
    pub fn from_signed(product_id: u64, signed_size: Decimal, entry_price: Option<Decimal>) -> Self {
        let side = if signed_size < Decimal::ZERO {
            Side::Short
        } else {
            Side::Long
        };

        Self {
            product_id,
            size: signed_size.abs(),
            side,
            entry_price,
        }
    }

    /// Check if the snapshot holds a non-zero position
    pub fn is_open(&self) -> bool {
        self.size > Decimal::ZERO
    }
}

// =============================================================================
// Notification Port
// =============================================================================

/// Port for human-readable status messages.
///
/// Delivery is best-effort: implementations log their own failures and
/// never surface them to the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a message.
    async fn notify(&self, message: &str);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fill_price_requires_positive() {
        let fill = OrderFill {
            order_id: Some("1".to_string()),
            average_fill_price: Some(dec!(27000)),
        };
        assert_eq!(fill.fill_price().unwrap().as_decimal(), dec!(27000));

        let fill = OrderFill {
            order_id: None,
            average_fill_price: Some(Decimal::ZERO),
        };
        assert!(fill.fill_price().is_none());

        assert!(OrderFill::default().fill_price().is_none());
    }

    #[test]
    fn test_snapshot_from_signed_size() {
        let short = PositionSnapshot::from_signed(84, dec!(-3), Some(dec!(27000)));
        assert_eq!(short.side, Side::Short);
        assert_eq!(short.size, dec!(3));
        assert!(short.is_open());

        let flat = PositionSnapshot::from_signed(84, Decimal::ZERO, None);
        assert!(!flat.is_open());
    }

    #[test]
    fn test_order_fill_serialization() {
        let fill = OrderFill {
            order_id: Some("12345".to_string()),
            average_fill_price: Some(dec!(27000.5)),
        };

        let json = serde_json::to_string(&fill).unwrap();
        let parsed: OrderFill = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, fill);
    }
}
