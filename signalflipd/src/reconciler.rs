//! Startup reconciliation.
//!
//! Aligns the local position with what the exchange actually holds before the
//! engine accepts signals. The exchange wins whenever it can be reached; the
//! state file is only a fallback.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use signalflip_domain::{Position, Product, UNKNOWN_ORDER_ID};
use signalflip_exec::{ExchangePort, PositionSnapshot};
use signalflip_store::PositionStore;

use crate::clock::Clock;

/// Upper bound on the exchange query at startup
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the reconciled position came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileSource {
    /// Exchange positions
    Exchange,
    /// State file (exchange unreachable)
    Store,
    /// Nothing known, starting flat
    Default,
}

/// Result of startup reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub position: Position,
    pub source: ReconcileSource,
}

/// Runs once at startup, before the engine accepts signals.
pub struct StartupReconciler<E: ExchangePort, S: PositionStore> {
    exchange: Arc<E>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    product: Product,
    /// Age given to a discovered position whose real entry time is unknown
    entry_offset: Duration,
}

impl<E: ExchangePort, S: PositionStore> StartupReconciler<E, S> {
    /// Create a reconciler for `product`.
    pub fn new(
        exchange: Arc<E>,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        product: Product,
        entry_offset: Duration,
    ) -> Self {
        Self {
            exchange,
            store,
            clock,
            product,
            entry_offset,
        }
    }

    /// Work out the starting position. Never fails.
    pub async fn reconcile(&self) -> Reconciliation {
        let local = match self.store.load().await {
            Ok(local) => local,
            Err(e) => {
                warn!(error = %e, "Could not read stored position");
                None
            },
        };

        let query = tokio::time::timeout(QUERY_TIMEOUT, self.exchange.get_positions()).await;
        let snapshots = match query {
            Ok(Ok(snapshots)) => snapshots,
            Ok(Err(e)) => {
                warn!(error = %e, "Exchange position query failed, using stored state");
                return Self::fallback_to_store(local);
            },
            Err(_) => {
                warn!(
                    timeout_secs = QUERY_TIMEOUT.as_secs(),
                    "Exchange position query timed out, using stored state"
                );
                return Self::fallback_to_store(local);
            },
        };

        let held = snapshots
            .into_iter()
            .find(|snapshot| snapshot.product_id == self.product.id() && snapshot.is_open());

        let position = match held {
            Some(snapshot) => self.adopt_snapshot(&snapshot, local.as_ref()),
            None => Position::Flat,
        };

        match &local {
            Some(stored) if *stored == position => {
                info!(%position, "Stored position matches exchange");
            },
            Some(stored) => {
                warn!(stored = %stored, exchange = %position, "Stored position drifted, using exchange");
            },
            None => info!(%position, "No stored position, using exchange"),
        }

        if let Err(e) = self.store.save(&position).await {
            warn!(error = %e, "Failed to persist reconciled position");
        }

        Reconciliation {
            position,
            source: ReconcileSource::Exchange,
        }
    }

    fn adopt_snapshot(&self, snapshot: &PositionSnapshot, local: Option<&Position>) -> Position {
        let same_side = local
            .and_then(Position::as_open)
            .filter(|open| open.side == snapshot.side);

        let entry_price = snapshot
            .entry_price
            .or_else(|| same_side.map(|open| open.entry_price))
            .unwrap_or_default();

        match same_side {
            // Same position we already knew about; keep its real entry details
            Some(open) => Position::open(
                snapshot.side,
                entry_price,
                open.entry_time,
                Some(open.entry_order_id.clone()),
            ),
            None => {
                let offset = chrono::Duration::from_std(self.entry_offset)
                    .unwrap_or_else(|_| chrono::Duration::zero());
                info!(
                    side = %snapshot.side,
                    size = %snapshot.size,
                    %entry_price,
                    "Adopting exchange position"
                );
                Position::open(
                    snapshot.side,
                    entry_price,
                    self.clock.now() - offset,
                    Some(UNKNOWN_ORDER_ID.to_string()),
                )
            },
        }
    }

    fn fallback_to_store(local: Option<Position>) -> Reconciliation {
        match local {
            Some(position) => {
                info!(%position, "Restored position from store");
                Reconciliation {
                    position,
                    source: ReconcileSource::Store,
                }
            },
            None => {
                warn!("No stored position and exchange unreachable, starting flat");
                Reconciliation {
                    position: Position::Flat,
                    source: ReconcileSource::Default,
                }
            },
        }
    }
}
