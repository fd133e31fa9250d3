//! Signalflip Engine Layer
//!
//! Pure decision logic, deterministic, no I/O.
//! Takes the current position and a classified signal → returns the action
//! the daemon must execute.
//!
//! ```text
//! | Current | Signal | Decision            |
//! |---------|--------|---------------------|
//! | FLAT    | BUY    | Open LONG           |
//! | FLAT    | SELL   | Open SHORT          |
//! | LONG    | BUY    | Hold                |
//! | LONG    | SELL   | Flip LONG → SHORT   |
//! | SHORT   | SELL   | Hold                |
//! | SHORT   | BUY    | Flip SHORT → LONG   |
//! | any     | other  | Ignore              |
//! ```

#![warn(clippy::all)]

use serde::Serialize;
use signalflip_domain::{Position, Side, SignalKind};
use tracing::trace;

/// Action chosen for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    /// Signal carries no direction
    Ignore,
    /// Already positioned in the signalled direction
    Hold(Side),
    /// Flat → open in this direction
    Open(Side),
    /// Close `from`, then open `to`, as one unit
    Flip { from: Side, to: Side },
}

/// Decide what to do with `signal` given the current `position`.
pub fn decide(position: &Position, signal: SignalKind) -> Decision {
    let decision = match (signal.target_side(), position.side()) {
        (None, _) => Decision::Ignore,
        (Some(target), None) => Decision::Open(target),
        (Some(target), Some(current)) if target == current => Decision::Hold(current),
        (Some(_), Some(current)) => Decision::Flip {
            from: current,
            to: current.opposite(),
        },
    };

    trace!(%signal, %position, ?decision, "Decided");
    decision
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn long() -> Position {
        Position::open(Side::Long, dec!(27000), Utc::now(), Some("1".into()))
    }

    fn short() -> Position {
        Position::open(Side::Short, dec!(27000), Utc::now(), Some("1".into()))
    }

    #[test]
    fn test_flat_opens() {
        assert_eq!(decide(&Position::Flat, SignalKind::Buy), Decision::Open(Side::Long));
        assert_eq!(decide(&Position::Flat, SignalKind::Sell), Decision::Open(Side::Short));
    }

    #[test]
    fn test_same_direction_holds() {
        assert_eq!(decide(&long(), SignalKind::Buy), Decision::Hold(Side::Long));
        assert_eq!(decide(&short(), SignalKind::Sell), Decision::Hold(Side::Short));
    }

    #[test]
    fn test_opposite_direction_flips() {
        assert_eq!(
            decide(&long(), SignalKind::Sell),
            Decision::Flip {
                from: Side::Long,
                to: Side::Short
            }
        );
        assert_eq!(
            decide(&short(), SignalKind::Buy),
            Decision::Flip {
                from: Side::Short,
                to: Side::Long
            }
        );
    }

    #[test]
    fn test_unknown_ignored_in_every_state() {
        for position in [Position::Flat, long(), short()] {
            assert_eq!(decide(&position, SignalKind::Unknown), Decision::Ignore);
        }
    }
}
