//! Position Engine: serializes signals into position transitions.
//!
//! The Position Engine owns the single tracked position and is responsible for:
//! - Dropping signals that arrive while another one is being processed
//! - Enforcing the cooldown between processed signals
//! - Running the flat/long/short transitions through the Executor
//! - Persisting and announcing every transition
//!
//! # Architecture
//!
//! ```text
//! webhook → handle(raw) → try_lock ──busy──→ Dropped
//!                            │
//!                       cooldown gate ──too soon──→ Dropped
//!                            │
//!                  decide() → Executor → Exchange
//!                            │
//!                 store.save + snapshot + notify
//! ```
//!
//! The lock is held across every exchange call of a transition, so a flip
//! (close then open) is never interleaved with another signal.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use signalflip_domain::{OpenPosition, Position, Side, SignalKind, TradeSummary, UNKNOWN_ORDER_ID};
use signalflip_engine::{decide, Decision};
use signalflip_exec::{ExchangePort, ExecError, Executor, Notifier, PriceQuote};
use signalflip_store::PositionStore;

use crate::clock::Clock;

// =============================================================================
// Outcomes
// =============================================================================

/// Why a signal was dropped without being looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Another signal is being processed
    Busy,
    /// Too soon after the last processed signal
    Cooldown,
}

/// A position opened by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub side: Side,
    pub price: Decimal,
    pub order_id: String,
    pub entry_time: DateTime<Utc>,
    /// Where the price came from
    pub quote: PriceQuote,
}

/// Result of handling one signal or close request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalOutcome {
    /// Not a BUY or SELL signal
    Ignored,
    /// Dropped before touching the position
    Dropped { reason: DropReason },
    /// Already positioned in the signalled direction
    Held { side: Side },
    /// Flat → open
    Opened { entry: Entry },
    /// Closed the old position and opened the opposite one
    Flipped { closed: TradeSummary, entry: Entry },
    /// Explicit close
    Closed { closed: TradeSummary },
    /// Explicit close while flat
    NothingToClose,
    /// The order failed; the position is unchanged
    Failed { reason: String },
    /// The close leg of a flip succeeded but the open leg failed; now flat
    FlipAborted { closed: TradeSummary, reason: String },
}

impl SignalOutcome {
    /// Short label for logs and API responses
    pub fn label(&self) -> &'static str {
        match self {
            SignalOutcome::Ignored => "ignored",
            SignalOutcome::Dropped {
                reason: DropReason::Busy,
            } => "dropped_busy",
            SignalOutcome::Dropped {
                reason: DropReason::Cooldown,
            } => "dropped_cooldown",
            SignalOutcome::Held { .. } => "held",
            SignalOutcome::Opened { .. } => "opened",
            SignalOutcome::Flipped { .. } => "flipped",
            SignalOutcome::Closed { .. } => "closed",
            SignalOutcome::NothingToClose => "nothing_to_close",
            SignalOutcome::Failed { .. } => "failed",
            SignalOutcome::FlipAborted { .. } => "flip_aborted",
        }
    }
}

// =============================================================================
// Position Engine
// =============================================================================

/// State guarded by the engine lock.
#[derive(Debug)]
struct EngineState {
    position: Position,
    last_processed_at: Option<DateTime<Utc>>,
}

/// Serializes signals into transitions of the tracked position.
pub struct PositionEngine<E: ExchangePort + 'static, S: PositionStore + 'static> {
    /// Order executor
    executor: Executor<E>,
    /// Store for persistence
    store: Arc<S>,
    /// Human-readable status messages
    notifier: Arc<dyn Notifier>,
    /// Time source for entry/exit times and the cooldown
    clock: Arc<dyn Clock>,
    /// Minimum time between processed signals
    cooldown: Duration,
    /// Position and last processed time
    state: Mutex<EngineState>,
    /// Copy of the position readable without the lock
    snapshot: watch::Sender<Position>,
}

impl<E: ExchangePort + 'static, S: PositionStore + 'static> PositionEngine<E, S> {
    /// Create an engine starting from `initial` (normally the reconciled position).
    pub fn new(
        executor: Executor<E>,
        store: Arc<S>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        cooldown: Duration,
        initial: Position,
    ) -> Self {
        let (snapshot, _) = watch::channel(initial.clone());

        Self {
            executor,
            store,
            notifier,
            clock,
            cooldown,
            state: Mutex::new(EngineState {
                position: initial,
                last_processed_at: None,
            }),
            snapshot,
        }
    }

    /// Current position, without waiting for an in-flight transition.
    pub fn position(&self) -> Position {
        self.snapshot.borrow().clone()
    }

    /// Watch position changes.
    pub fn subscribe(&self) -> watch::Receiver<Position> {
        self.snapshot.subscribe()
    }

    /// Order executor
    pub fn executor(&self) -> &Executor<E> {
        &self.executor
    }

    /// Handle a raw signal.
    ///
    /// Never fails: every error ends up in the returned outcome, logged and
    /// notified.
    pub async fn handle(&self, raw: &str) -> SignalOutcome {
        let signal = SignalKind::classify(raw);
        if signal == SignalKind::Unknown {
            warn!(raw = raw.trim(), "Unrecognized signal, discarded");
            return SignalOutcome::Ignored;
        }

        let mut state = match self.acquire() {
            Ok(state) => state,
            Err(reason) => return SignalOutcome::Dropped { reason },
        };

        info!(%signal, position = %state.position, "Processing signal");

        let outcome = match decide(&state.position, signal) {
            Decision::Ignore => SignalOutcome::Ignored,
            Decision::Hold(side) => {
                info!(%side, "Already positioned, holding");
                SignalOutcome::Held { side }
            },
            Decision::Open(side) => match self.open_leg(&mut state, side, None).await {
                Ok(entry) => SignalOutcome::Opened { entry },
                Err(e) => SignalOutcome::Failed {
                    reason: e.to_string(),
                },
            },
            Decision::Flip { to, .. } => self.flip(&mut state, to).await,
        };

        debug!(outcome = outcome.label(), "Signal handled");
        outcome
    }

    /// Close the open position, if any.
    ///
    /// Goes through the same lock and cooldown as signals.
    pub async fn close(&self, reason: &str) -> SignalOutcome {
        let mut state = match self.acquire() {
            Ok(state) => state,
            Err(dropped) => return SignalOutcome::Dropped { reason: dropped },
        };

        let Some(open) = state.position.as_open().cloned() else {
            info!(%reason, "Close requested while flat");
            return SignalOutcome::NothingToClose;
        };

        info!(%reason, side = %open.side, "Closing position");

        match self.close_leg(&mut state, &open, reason).await {
            Ok(closed) => SignalOutcome::Closed { closed },
            Err(e) => SignalOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// Take the lock without waiting and pass the cooldown gate.
    fn acquire(&self) -> Result<MutexGuard<'_, EngineState>, DropReason> {
        let Ok(mut state) = self.state.try_lock() else {
            info!("Engine busy, signal dropped");
            return Err(DropReason::Busy);
        };

        let now = self.clock.now();
        if let Some(last) = state.last_processed_at {
            // A clock stepping backwards never blocks signals
            let elapsed = (now - last).to_std().unwrap_or(self.cooldown);
            if elapsed < self.cooldown {
                info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    cooldown_ms = self.cooldown.as_millis() as u64,
                    "Signal within cooldown, dropped"
                );
                return Err(DropReason::Cooldown);
            }
        }

        state.last_processed_at = Some(now);
        Ok(state)
    }

    async fn flip(&self, state: &mut EngineState, to: Side) -> SignalOutcome {
        let Some(open) = state.position.as_open().cloned() else {
            // decide() only flips an open position
            return SignalOutcome::Failed {
                reason: "no open position to flip".to_string(),
            };
        };

        info!(from = %open.side, %to, "Flipping position");

        let cause = format!("flip to {}", to);
        let closed = match self.close_leg(state, &open, &cause).await {
            Ok(closed) => closed,
            Err(e) => {
                return SignalOutcome::Failed {
                    reason: e.to_string(),
                }
            },
        };

        match self.open_leg(state, to, Some(open.entry_price)).await {
            Ok(entry) => SignalOutcome::Flipped { closed, entry },
            Err(e) => {
                warn!(%to, "Flip aborted after close, position is flat");
                SignalOutcome::FlipAborted {
                    closed,
                    reason: e.to_string(),
                }
            },
        }
    }

    async fn open_leg(
        &self,
        state: &mut EngineState,
        side: Side,
        fallback_entry: Option<Decimal>,
    ) -> Result<Entry, ExecError> {
        let execution = match self.executor.enter(side, fallback_entry).await {
            Ok(execution) => execution,
            Err(e) => {
                error!(%side, error = %e, "Entry order failed");
                self.notifier.notify(&self.failure_message("open", side, &e)).await;
                return Err(e);
            },
        };

        let entry_time = self.clock.now();
        let position = Position::open(side, execution.price(), entry_time, execution.order_id);
        let order_id = position
            .as_open()
            .map(|open| open.entry_order_id.clone())
            .unwrap_or_else(|| UNKNOWN_ORDER_ID.to_string());

        let entry = Entry {
            side,
            price: execution.quote.value(),
            order_id,
            entry_time,
            quote: execution.quote,
        };

        if entry.quote.is_degraded() {
            warn!(%side, price = %entry.price, source = quote_source(&entry.quote), "Entry price degraded");
        }

        self.commit(state, position).await;

        info!(%side, price = %entry.price, order_id = %entry.order_id, "Position opened");
        self.notifier.notify(&self.opened_message(&entry)).await;

        Ok(entry)
    }

    async fn close_leg(
        &self,
        state: &mut EngineState,
        open: &OpenPosition,
        cause: &str,
    ) -> Result<TradeSummary, ExecError> {
        let execution = match self.executor.exit(open).await {
            Ok(execution) => execution,
            Err(e) => {
                error!(side = %open.side, error = %e, "Exit order failed");
                self.notifier
                    .notify(&self.failure_message("close", open.side, &e))
                    .await;
                return Err(e);
            },
        };

        if execution.quote.is_degraded() {
            warn!(
                side = %open.side,
                price = %execution.price(),
                source = quote_source(&execution.quote),
                "Exit price degraded"
            );
        }

        let closed = TradeSummary::close(
            open,
            execution.price(),
            self.clock.now(),
            self.executor.order_size(),
        );

        self.commit(state, Position::Flat).await;

        info!(
            side = %closed.side,
            entry = %closed.entry_price,
            exit = %closed.exit_price,
            pnl = %closed.realized_pnl,
            "Position closed"
        );
        self.notifier.notify(&self.closed_message(&closed, cause)).await;

        Ok(closed)
    }

    /// Apply a transition: state, snapshot, then store.
    ///
    /// A failed save is logged only; the in-memory position stays authoritative.
    async fn commit(&self, state: &mut EngineState, position: Position) {
        state.position = position.clone();
        self.snapshot.send_replace(position.clone());

        if let Err(e) = self.store.save(&position).await {
            error!(error = %e, %position, "Failed to persist position");
        }
    }

    // =========================================================================
    // Messages
    // =========================================================================

    fn opened_message(&self, entry: &Entry) -> String {
        let icon = match entry.side {
            Side::Long => "🟢",
            Side::Short => "🔴",
        };

        let mut message = format!(
            "{} {} opened\nSymbol: {}\nPrice: {}\nSize: {}\nOrder: {}\nTime: {}",
            icon,
            entry.side,
            self.executor.product().symbol(),
            entry.price,
            self.executor.order_size(),
            entry.order_id,
            entry.entry_time.format("%Y-%m-%d %H:%M:%S UTC"),
        );

        if entry.quote.is_degraded() {
            message.push_str(&format!("\n⚠️ Price source: {}", quote_source(&entry.quote)));
        }

        message
    }

    fn closed_message(&self, closed: &TradeSummary, cause: &str) -> String {
        let pnl = if closed.realized_pnl > Decimal::ZERO {
            format!("+{}", closed.realized_pnl)
        } else {
            closed.realized_pnl.to_string()
        };

        format!(
            "🔒 {} closed ({})\nSymbol: {}\nEntry: {}\nExit: {}\nSize: {}\nPnL: {}\nHeld: {}",
            closed.side,
            cause,
            self.executor.product().symbol(),
            closed.entry_price,
            closed.exit_price,
            closed.size,
            pnl,
            closed.holding_display(),
        )
    }

    fn failure_message(&self, action: &str, side: Side, error: &ExecError) -> String {
        format!(
            "❌ Failed to {} {} on {}: {}",
            action,
            side,
            self.executor.product().symbol(),
            error
        )
    }
}

fn quote_source(quote: &PriceQuote) -> &'static str {
    match quote {
        PriceQuote::Fill(_) => "fill",
        PriceQuote::Live(_) => "ticker",
        PriceQuote::Cached(_) => "cached",
        PriceQuote::EntryFallback(_) => "entry price",
        PriceQuote::Unavailable => "unavailable",
    }
}

// =============================================================================
// Tests
// =============================================================================
