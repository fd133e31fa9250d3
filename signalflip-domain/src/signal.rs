//! Inbound alert classification.

use crate::value_objects::Side;
use serde::Serialize;
use std::fmt;

/// Classified direction of an inbound alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Buy,
    Sell,
    Unknown,
}

impl SignalKind {
    /// Classify raw alert text by substring containment, case-insensitively.
    ///
    /// `BUY` is checked first, so text containing both tokens is a buy.
    pub fn classify(raw: &str) -> Self {
        let text = raw.trim().to_uppercase();
        if text.contains("BUY") {
            SignalKind::Buy
        } else if text.contains("SELL") {
            SignalKind::Sell
        } else {
            SignalKind::Unknown
        }
    }

    /// Side the signal wants to hold
    pub fn target_side(&self) -> Option<Side> {
        match self {
            SignalKind::Buy => Some(Side::Long),
            SignalKind::Sell => Some(Side::Short),
            SignalKind::Unknown => None,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "BUY"),
            SignalKind::Sell => write!(f, "SELL"),
            SignalKind::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(SignalKind::classify("buy"), SignalKind::Buy);
        assert_eq!(SignalKind::classify("  Sell \n"), SignalKind::Sell);
        assert_eq!(SignalKind::classify("BTCUSD strategy: BUY @ 27000"), SignalKind::Buy);
    }

    #[test]
    fn test_classify_buy_wins_tie() {
        assert_eq!(SignalKind::classify("BUYSELL"), SignalKind::Buy);
        assert_eq!(SignalKind::classify("sell then buy"), SignalKind::Buy);
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(SignalKind::classify("PING"), SignalKind::Unknown);
        assert_eq!(SignalKind::classify(""), SignalKind::Unknown);
        assert_eq!(SignalKind::Unknown.target_side(), None);
    }

    #[test]
    fn test_target_side() {
        assert_eq!(SignalKind::Buy.target_side(), Some(Side::Long));
        assert_eq!(SignalKind::Sell.target_side(), Some(Side::Short));
    }
}
