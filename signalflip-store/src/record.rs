//! On-disk record format.
//!
//! ```json
//! {
//!   "current_position": "LONG",
//!   "entry_price": "27000.5",
//!   "entry_time": "2024-01-01T12:00:00Z",
//!   "entry_side": "buy",
//!   "entry_order_id": "123456"
//! }
//! ```
//!
//! A flat position is stored with every field `null`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use signalflip_domain::{OrderSide, Position, Side};

use crate::error::StoreError;

/// Serialized position.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PositionRecord {
    /// `"LONG"`, `"SHORT"`, or null when flat
    #[serde(default)]
    pub current_position: Option<RecordedSide>,
    #[serde(default)]
    pub entry_price: Option<Decimal>,
    #[serde(default)]
    pub entry_time: Option<DateTime<Utc>>,
    /// Order side of the entry order (`"buy"` / `"sell"`)
    #[serde(default)]
    pub entry_side: Option<OrderSide>,
    #[serde(default)]
    pub entry_order_id: Option<String>,
}

/// Position direction as written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordedSide {
    Long,
    Short,
}

impl From<Side> for RecordedSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Long => RecordedSide::Long,
            Side::Short => RecordedSide::Short,
        }
    }
}

impl From<RecordedSide> for Side {
    fn from(side: RecordedSide) -> Self {
        match side {
            RecordedSide::Long => Side::Long,
            RecordedSide::Short => Side::Short,
        }
    }
}

impl From<&Position> for PositionRecord {
    fn from(position: &Position) -> Self {
        match position {
            Position::Flat => PositionRecord::default(),
            Position::Open(open) => PositionRecord {
                current_position: Some(open.side.into()),
                entry_price: Some(open.entry_price),
                entry_time: Some(open.entry_time),
                entry_side: Some(open.side.entry_action()),
                entry_order_id: Some(open.entry_order_id.clone()),
            },
        }
    }
}

impl TryFrom<PositionRecord> for Position {
    type Error = StoreError;

    fn try_from(record: PositionRecord) -> Result<Self, Self::Error> {
        let Some(recorded) = record.current_position else {
            return Ok(Position::Flat);
        };
        let side = Side::from(recorded);

        if let Some(entry_side) = record.entry_side {
            if entry_side.opens() != side {
                return Err(StoreError::corrupt(format!(
                    "entry_side {} does not open a {} position",
                    entry_side, side
                )));
            }
        }

        let entry_price = record.entry_price.unwrap_or(Decimal::ZERO);
        if entry_price < Decimal::ZERO {
            return Err(StoreError::corrupt(format!("negative entry_price {}", entry_price)));
        }

        let entry_time = match record.entry_time {
            Some(time) => time,
            None => {
                warn!(%side, "State record has no entry_time, using load time");
                Utc::now()
            },
        };

        Ok(Position::open(side, entry_price, entry_time, record.entry_order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use signalflip_domain::UNKNOWN_ORDER_ID;

    #[test]
    fn test_flat_record_is_all_null() {
        let json = serde_json::to_value(PositionRecord::from(&Position::Flat)).unwrap();

        assert!(json["current_position"].is_null());
        assert!(json["entry_price"].is_null());
        assert!(json["entry_time"].is_null());
        assert!(json["entry_side"].is_null());
        assert!(json["entry_order_id"].is_null());
    }

    #[test]
    fn test_open_record_fields() {
        let time = "2024-01-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let position = Position::open(Side::Short, dec!(27000.5), time, Some("99".into()));

        let json = serde_json::to_value(PositionRecord::from(&position)).unwrap();

        assert_eq!(json["current_position"], "SHORT");
        assert_eq!(json["entry_price"], "27000.5");
        assert_eq!(json["entry_time"], "2024-01-01T12:00:00Z");
        assert_eq!(json["entry_side"], "sell");
        assert_eq!(json["entry_order_id"], "99");
    }

    #[test]
    fn test_record_accepts_numeric_price_and_missing_fields() {
        let json = r#"{"current_position": "LONG", "entry_price": 26950.0, "entry_time": "2024-01-01T12:00:00Z"}"#;
        let record: PositionRecord = serde_json::from_str(json).unwrap();
        let position = Position::try_from(record).unwrap();

        let open = position.as_open().unwrap();
        assert_eq!(open.side, Side::Long);
        assert_eq!(open.entry_price, dec!(26950));
        assert_eq!(open.entry_order_id, UNKNOWN_ORDER_ID);
    }

    #[test]
    fn test_mismatched_entry_side_is_corrupt() {
        let record = PositionRecord {
            current_position: Some(RecordedSide::Long),
            entry_price: Some(dec!(27000)),
            entry_time: Some(Utc::now()),
            entry_side: Some(OrderSide::Sell),
            entry_order_id: None,
        };

        assert!(matches!(Position::try_from(record), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_negative_price_is_corrupt() {
        let record = PositionRecord {
            current_position: Some(RecordedSide::Short),
            entry_price: Some(dec!(-1)),
            ..Default::default()
        };

        assert!(matches!(Position::try_from(record), Err(StoreError::Corrupt(_))));
    }
}
