//! Stub implementations for testing.
//!
//! These implementations simulate exchange and notification behavior
//! without making real API calls.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::Semaphore;

use signalflip_domain::{OrderSide, Price, Product, Quantity};

use crate::error::ExecError;
use crate::ports::{ExchangePort, Notifier, OrderFill, PositionSnapshot};

// =============================================================================
// Stub Exchange
// =============================================================================

/// An order the stub accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub product_id: u64,
    pub side: OrderSide,
    pub size: Quantity,
    pub order_id: String,
}

/// Stub exchange for testing.
///
/// Simulates immediate fills at a configured price. Failures, missing fill
/// prices and in-flight orders can be scripted.
pub struct StubExchange {
    /// Current price (ticker and fills)
    price: RwLock<Decimal>,
    /// Whether fills carry an average price
    report_fill_price: AtomicBool,
    /// Whether fills carry an order id
    report_order_id: AtomicBool,
    /// Scripted results for the next order calls (`None` accepts)
    order_script: Mutex<VecDeque<Option<ExecError>>>,
    /// Ticker calls left to fail
    ticker_failures: AtomicU32,
    /// Fail every ticker call
    ticker_failing: AtomicBool,
    /// Answer every ticker call with an unusable response
    ticker_invalid: AtomicBool,
    /// Positions reported by `get_positions`
    positions: RwLock<Vec<PositionSnapshot>>,
    /// Fail `get_positions`
    positions_failing: AtomicBool,
    /// Never answer `get_positions`
    positions_hanging: AtomicBool,
    /// Accepted orders, in order
    orders: RwLock<Vec<PlacedOrder>>,
    /// Every call to `place_market_order`, including failures
    order_attempts: AtomicUsize,
    /// Every call to `get_ticker`
    ticker_calls: AtomicUsize,
    /// Order counter for generating IDs
    order_counter: AtomicU64,
    /// When set, order calls wait here until released
    gate: Mutex<Option<Arc<Semaphore>>>,
    /// Order calls currently parked at the gate
    parked: AtomicUsize,
}

impl StubExchange {
    /// Create a new stub exchange trading at `price`.
    pub fn new(price: Decimal) -> Self {
        Self {
            price: RwLock::new(price),
            report_fill_price: AtomicBool::new(true),
            report_order_id: AtomicBool::new(true),
            order_script: Mutex::new(VecDeque::new()),
            ticker_failures: AtomicU32::new(0),
            ticker_failing: AtomicBool::new(false),
            ticker_invalid: AtomicBool::new(false),
            positions: RwLock::new(Vec::new()),
            positions_failing: AtomicBool::new(false),
            positions_hanging: AtomicBool::new(false),
            orders: RwLock::new(Vec::new()),
            order_attempts: AtomicUsize::new(0),
            ticker_calls: AtomicUsize::new(0),
            order_counter: AtomicU64::new(0),
            gate: Mutex::new(None),
            parked: AtomicUsize::new(0),
        }
    }

    /// Set the current price.
    pub fn set_price(&self, price: Decimal) {
        *self.price.write().unwrap() = price;
    }

    /// Control whether fills report an average price.
    pub fn set_fill_reporting(&self, enabled: bool) {
        self.report_fill_price.store(enabled, Ordering::SeqCst);
    }

    /// Control whether fills report an order id.
    pub fn set_order_id_reporting(&self, enabled: bool) {
        self.report_order_id.store(enabled, Ordering::SeqCst);
    }

    /// Accept the next scripted order, so a later failure lands on a later call.
    pub fn accept_next_order(&self) {
        self.order_script.lock().unwrap().push_back(None);
    }

    /// Reject the next order with `reason` (`success=false`).
    pub fn reject_next_order(&self, reason: &str) {
        self.order_script
            .lock()
            .unwrap()
            .push_back(Some(ExecError::OrderRejected(reason.to_string())));
    }

    /// Fail the next order with a transport error.
    pub fn fail_next_order(&self) {
        self.order_script
            .lock()
            .unwrap()
            .push_back(Some(ExecError::Exchange("Simulated exchange failure".to_string())));
    }

    /// Fail the next `count` ticker calls.
    pub fn fail_next_tickers(&self, count: u32) {
        self.ticker_failures.store(count, Ordering::SeqCst);
    }

    /// Fail every ticker call until turned off.
    pub fn set_ticker_failing(&self, failing: bool) {
        self.ticker_failing.store(failing, Ordering::SeqCst);
    }

    /// Answer ticker calls with a response that carries no usable price.
    pub fn set_ticker_invalid(&self, invalid: bool) {
        self.ticker_invalid.store(invalid, Ordering::SeqCst);
    }

    /// Set the positions reported by the exchange.
    pub fn set_positions(&self, positions: Vec<PositionSnapshot>) {
        *self.positions.write().unwrap() = positions;
    }

    /// Fail position queries.
    pub fn set_positions_failing(&self, failing: bool) {
        self.positions_failing.store(failing, Ordering::SeqCst);
    }

    /// Make position queries hang forever.
    pub fn hang_positions(&self) {
        self.positions_hanging.store(true, Ordering::SeqCst);
    }

    /// Park subsequent order calls until [`release_orders`](Self::release_orders).
    pub fn hold_orders(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let parked and future order calls through.
    pub fn release_orders(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.close();
        }
    }

    /// Number of order calls currently parked.
    pub fn parked_orders(&self) -> usize {
        self.parked.load(Ordering::SeqCst)
    }

    /// Accepted orders.
    pub fn orders(&self) -> Vec<PlacedOrder> {
        self.orders.read().unwrap().clone()
    }

    /// Calls to `place_market_order`, including failed ones.
    pub fn order_attempts(&self) -> usize {
        self.order_attempts.load(Ordering::SeqCst)
    }

    /// Calls to `get_ticker`.
    pub fn ticker_calls(&self) -> usize {
        self.ticker_calls.load(Ordering::SeqCst)
    }

    fn current_price(&self) -> Decimal {
        *self.price.read().unwrap()
    }

    fn next_order_id(&self) -> String {
        let n = self.order_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("STUB-{}", n)
    }

    async fn wait_at_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.parked.fetch_add(1, Ordering::SeqCst);
            // Closed gate means released
            let _ = gate.acquire().await;
            self.parked.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ExchangePort for StubExchange {
    async fn place_market_order(
        &self,
        product: &Product,
        side: OrderSide,
        size: Quantity,
    ) -> Result<OrderFill, ExecError> {
        self.order_attempts.fetch_add(1, Ordering::SeqCst);
        self.wait_at_gate().await;

        if let Some(Some(error)) = self.order_script.lock().unwrap().pop_front() {
            return Err(error);
        }

        let order_id = self.next_order_id();
        self.orders.write().unwrap().push(PlacedOrder {
            product_id: product.id(),
            side,
            size,
            order_id: order_id.clone(),
        });

        tracing::debug!(%order_id, %side, %size, "Stub: order filled");

        Ok(OrderFill {
            order_id: self.report_order_id.load(Ordering::SeqCst).then_some(order_id),
            average_fill_price: self
                .report_fill_price
                .load(Ordering::SeqCst)
                .then(|| self.current_price()),
        })
    }

    async fn get_ticker(&self, _product: &Product) -> Result<Price, ExecError> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);

        if self.ticker_failing.load(Ordering::SeqCst) {
            return Err(ExecError::Exchange("Simulated ticker failure".to_string()));
        }

        if self.ticker_invalid.load(Ordering::SeqCst) {
            return Err(ExecError::InvalidResponse("Simulated ticker without price".to_string()));
        }

        let remaining = self.ticker_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.ticker_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ExecError::Exchange("Simulated ticker failure".to_string()));
        }

        Ok(Price::new(self.current_price())?)
    }

    async fn get_positions(&self) -> Result<Vec<PositionSnapshot>, ExecError> {
        if self.positions_hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.positions_failing.load(Ordering::SeqCst) {
            return Err(ExecError::Exchange("Simulated positions failure".to_string()));
        }
        Ok(self.positions.read().unwrap().clone())
    }
}

// =============================================================================
// Recording Notifier
// =============================================================================

/// Notifier that keeps every message in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    /// Check if any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.messages.lock().unwrap().iter().any(|m| m.contains(needle))
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

// =============================================================================
// Tests
// =============================================================================
