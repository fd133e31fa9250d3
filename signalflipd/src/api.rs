//! HTTP API for the signalflip daemon.
//!
//! Provides REST endpoints for:
//! - Health check
//! - Status (current position)
//! - Webhook (signal ingress)
//! - Close (explicit close of the open position)

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

use signalflip_domain::Position;
use signalflip_exec::ExchangePort;
use signalflip_store::PositionStore;

use crate::position_engine::{PositionEngine, SignalOutcome};

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState<E: ExchangePort + 'static, S: PositionStore + 'static> {
    pub engine: Arc<PositionEngine<E, S>>,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub product_id: u64,
    pub symbol: String,
    pub order_size: Decimal,
    /// FLAT, LONG or SHORT
    pub position: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_order_id: Option<String>,
}

/// Response to a webhook or close request.
///
/// Always `200 ok` once the request was read; what happened is in `outcome`.
#[derive(Debug, Serialize)]
pub struct SignalResponse {
    pub status: String,
    pub outcome: String,
    pub detail: SignalOutcome,
}

/// Optional close parameters.
#[derive(Debug, Default, Deserialize)]
pub struct CloseParams {
    pub reason: Option<String>,
}

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router<E, S>(state: Arc<ApiState<E, S>>) -> Router
where
    E: ExchangePort + 'static,
    S: PositionStore + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/webhook", post(webhook_handler))
        .route("/close", post(close_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Current position.
async fn status_handler<E, S>(State(state): State<Arc<ApiState<E, S>>>) -> Json<StatusResponse>
where
    E: ExchangePort + 'static,
    S: PositionStore + 'static,
{
    let executor = state.engine.executor();
    let position = state.engine.position();
    let open = position.as_open();

    Json(StatusResponse {
        product_id: executor.product().id(),
        symbol: executor.product().symbol().to_string(),
        order_size: executor.order_size().as_decimal(),
        position: position_label(&position),
        entry_price: open.map(|o| o.entry_price),
        entry_time: open.map(|o| o.entry_time),
        entry_order_id: open.map(|o| o.entry_order_id.clone()),
    })
}

/// Signal ingress. The body is the raw signal text.
async fn webhook_handler<E, S>(
    State(state): State<Arc<ApiState<E, S>>>,
    body: String,
) -> Json<SignalResponse>
where
    E: ExchangePort + 'static,
    S: PositionStore + 'static,
{
    let raw = body.trim();

    let outcome = if raw.is_empty() {
        debug!("Empty webhook body ignored");
        SignalOutcome::Ignored
    } else {
        state.engine.handle(raw).await
    };

    Json(signal_response(outcome))
}

/// Close the open position.
async fn close_handler<E, S>(
    State(state): State<Arc<ApiState<E, S>>>,
    Query(params): Query<CloseParams>,
) -> Json<SignalResponse>
where
    E: ExchangePort + 'static,
    S: PositionStore + 'static,
{
    let reason = params.reason.unwrap_or_else(|| "api".to_string());
    let outcome = state.engine.close(&reason).await;

    Json(signal_response(outcome))
}

// =============================================================================
// Helpers
// =============================================================================

fn signal_response(outcome: SignalOutcome) -> SignalResponse {
    SignalResponse {
        status: "ok".to_string(),
        outcome: outcome.label().to_string(),
        detail: outcome,
    }
}

fn position_label(position: &Position) -> String {
    match position.side() {
        Some(side) => side.to_string(),
        None => "FLAT".to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use rust_decimal_macros::dec;
    use signalflip_domain::{Product, Quantity, Side};
    use signalflip_exec::{
        Executor, ExecutorConfig, PriceResolverConfig, RecordingNotifier, StubExchange,
    };
    use signalflip_store::MemoryStore;
    use std::time::Duration;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        exchange: Arc<StubExchange>,
    }

    fn create_test_app(initial: Position) -> TestApp {
        let exchange = Arc::new(StubExchange::new(dec!(27000)));
        let executor = Executor::new(
            exchange.clone(),
            ExecutorConfig {
                product: Product::new(84, "BTCUSD").unwrap(),
                order_size: Quantity::new(dec!(1)).unwrap(),
                fill_settle_delay: Duration::from_secs(1),
                price: PriceResolverConfig::default(),
            },
        );
        let engine = Arc::new(PositionEngine::new(
            executor,
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingNotifier::new()),
            Arc::new(SystemClock),
            Duration::ZERO,
            initial,
        ));

        TestApp {
            router: create_router(Arc::new(ApiState { engine })),
            exchange,
        }
    }

    async fn send(router: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app(Position::Flat);

        let (status, json) = send(&app.router, "GET", "/health", "").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_status_when_flat() {
        let app = create_test_app(Position::Flat);

        let (status, json) = send(&app.router, "GET", "/status", "").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["position"], "FLAT");
        assert_eq!(json["symbol"], "BTCUSD");
        assert_eq!(json["product_id"], 84);
        assert!(json.get("entry_price").is_none());
    }

    #[tokio::test]
    async fn test_webhook_opens_and_status_reports_it() {
        let app = create_test_app(Position::Flat);

        let (status, json) = send(&app.router, "POST", "/webhook", "buy\n").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["outcome"], "opened");
        assert_eq!(json["detail"]["entry"]["order_id"], "STUB-1");

        let (_, json) = send(&app.router, "GET", "/status", "").await;
        assert_eq!(json["position"], "LONG");
        assert_eq!(json["entry_price"], "27000");
        assert_eq!(json["entry_order_id"], "STUB-1");
    }

    #[tokio::test]
    async fn test_webhook_empty_body_is_ignored() {
        let app = create_test_app(Position::Flat);

        let (status, json) = send(&app.router, "POST", "/webhook", "   ").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["outcome"], "ignored");
        assert_eq!(app.exchange.order_attempts(), 0);
    }

    #[tokio::test]
    async fn test_webhook_unknown_signal() {
        let app = create_test_app(Position::Flat);

        let (_, json) = send(&app.router, "POST", "/webhook", "PING").await;

        assert_eq!(json["outcome"], "ignored");
        assert_eq!(app.exchange.order_attempts(), 0);
    }

    #[tokio::test]
    async fn test_close_endpoint() {
        let app = create_test_app(Position::open(Side::Long, dec!(26000), Utc::now(), None));

        let (status, json) = send(&app.router, "POST", "/close?reason=manual", "").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["outcome"], "closed");
        assert_eq!(json["detail"]["closed"]["realized_pnl"], "1000");

        let (_, json) = send(&app.router, "GET", "/status", "").await;
        assert_eq!(json["position"], "FLAT");
    }

    #[tokio::test]
    async fn test_close_when_flat() {
        let app = create_test_app(Position::Flat);

        let (_, json) = send(&app.router, "POST", "/close", "").await;

        assert_eq!(json["outcome"], "nothing_to_close");
    }
}
