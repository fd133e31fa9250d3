//! Domain Entities for Signalflip
//!
//! The tracked position and the summary derived when it is closed.

use crate::value_objects::{Quantity, Side};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order id recorded when the exchange does not return one.
pub const UNKNOWN_ORDER_ID: &str = "NA";

// =============================================================================
// Position
// =============================================================================

/// The single position tracked for the configured product.
///
/// Entry fields only exist on an open position, so a flat position can never
/// carry a stale entry price.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Position {
    /// No open position
    #[default]
    Flat,
    /// Long or short with entry details
    Open(OpenPosition),
}

/// Entry details of an open position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPosition {
    /// Direction
    pub side: Side,
    /// Entry price; zero only when no price could be resolved at entry
    pub entry_price: Decimal,
    /// When the position was entered (synthetic after reconciliation)
    pub entry_time: DateTime<Utc>,
    /// Exchange order id of the entry order, or [`UNKNOWN_ORDER_ID`]
    pub entry_order_id: String,
}

impl Position {
    /// Open a new position.
    pub fn open(
        side: Side,
        entry_price: Decimal,
        entry_time: DateTime<Utc>,
        entry_order_id: Option<String>,
    ) -> Self {
        Position::Open(OpenPosition {
            side,
            entry_price,
            entry_time,
            entry_order_id: entry_order_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_ORDER_ID.to_string()),
        })
    }

    /// Current direction, `None` when flat
    pub fn side(&self) -> Option<Side> {
        match self {
            Position::Flat => None,
            Position::Open(open) => Some(open.side),
        }
    }

    /// Entry details, `None` when flat
    pub fn as_open(&self) -> Option<&OpenPosition> {
        match self {
            Position::Flat => None,
            Position::Open(open) => Some(open),
        }
    }

    /// Check if there is no open position
    pub fn is_flat(&self) -> bool {
        matches!(self, Position::Flat)
    }

    /// Entry price of the open position, if any
    pub fn entry_price(&self) -> Option<Decimal> {
        self.as_open().map(|open| open.entry_price)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Flat => write!(f, "FLAT"),
            Position::Open(open) => write!(f, "{} @ {}", open.side, open.entry_price),
        }
    }
}

// =============================================================================
// Trade Summary
// =============================================================================

/// Realized result of a closed position. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeSummary {
    pub side: Side,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub size: Quantity,
    pub realized_pnl: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
}

impl TradeSummary {
    /// Summarize closing `entry` at `exit_price`.
    ///
    /// ```text
    /// LONG:  pnl = (exit - entry) × size
    /// SHORT: pnl = (entry - exit) × size
    /// ```
    pub fn close(
        entry: &OpenPosition,
        exit_price: Decimal,
        exit_time: DateTime<Utc>,
        size: Quantity,
    ) -> Self {
        let realized_pnl = match entry.side {
            Side::Long => (exit_price - entry.entry_price) * size.as_decimal(),
            Side::Short => (entry.entry_price - exit_price) * size.as_decimal(),
        };

        Self {
            side: entry.side,
            entry_price: entry.entry_price,
            exit_price,
            size,
            realized_pnl,
            entry_time: entry.entry_time,
            exit_time,
        }
    }

    /// Time between entry and exit
    pub fn holding_duration(&self) -> Duration {
        self.exit_time - self.entry_time
    }

    /// Holding duration as `1h 02m 03s`
    pub fn holding_display(&self) -> String {
        let secs = self.holding_duration().num_seconds().max(0);
        let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
        if h > 0 {
            format!("{}h {:02}m {:02}s", h, m, s)
        } else {
            format!("{}m {:02}s", m, s)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(side: Side, price: Decimal) -> OpenPosition {
        OpenPosition {
            side,
            entry_price: price,
            entry_time: Utc::now() - Duration::seconds(3723),
            entry_order_id: "42".to_string(),
        }
    }

    #[test]
    fn test_open_defaults_missing_order_id() {
        let position = Position::open(Side::Long, dec!(27000), Utc::now(), None);
        assert_eq!(position.as_open().unwrap().entry_order_id, UNKNOWN_ORDER_ID);

        let position = Position::open(Side::Long, dec!(27000), Utc::now(), Some(" ".into()));
        assert_eq!(position.as_open().unwrap().entry_order_id, UNKNOWN_ORDER_ID);
    }

    #[test]
    fn test_flat_has_no_entry() {
        let position = Position::Flat;
        assert!(position.is_flat());
        assert_eq!(position.side(), None);
        assert_eq!(position.entry_price(), None);
        assert_eq!(position.to_string(), "FLAT");
    }

    #[test]
    fn test_long_pnl() {
        let e = entry(Side::Long, dec!(27000));
        let summary = TradeSummary::close(&e, dec!(27500), Utc::now(), Quantity::new(dec!(2)).unwrap());
        assert_eq!(summary.realized_pnl, dec!(1000));
    }

    #[test]
    fn test_short_pnl() {
        let e = entry(Side::Short, dec!(27000));
        let summary = TradeSummary::close(&e, dec!(27500), Utc::now(), Quantity::new(dec!(1)).unwrap());
        assert_eq!(summary.realized_pnl, dec!(-500));
    }

    #[test]
    fn test_holding_display() {
        let e = entry(Side::Long, dec!(100));
        let exit_time = e.entry_time + Duration::seconds(3723);
        let summary = TradeSummary::close(&e, dec!(100), exit_time, Quantity::new(dec!(1)).unwrap());
        assert_eq!(summary.holding_display(), "1h 02m 03s");

        let exit_time = e.entry_time + Duration::seconds(65);
        let summary = TradeSummary::close(&e, dec!(100), exit_time, Quantity::new(dec!(1)).unwrap());
        assert_eq!(summary.holding_display(), "1m 05s");
    }
}
