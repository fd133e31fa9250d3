//! Delta Exchange REST API Client for Derivatives Trading
//!
//! Provides REST API integration for:
//! - Placing market orders
//! - Reading the last traded price of a product
//! - Querying open (margined) positions
//! - Authentication via HMAC SHA256 signatures
//!
//! # Authentication
//!
//! Delta uses API key + secret with HMAC SHA256 signatures.
//! All signed requests require headers:
//! - `api-key`
//! - `timestamp` (unix seconds)
//! - `signature`: hex HMAC SHA256 of `method + timestamp + path + query + body`
//!
//! where `query` includes its leading `?` when present.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

use signalflip_domain::{OrderSide, Price, Product, Quantity};
use signalflip_exec::{ExchangePort, ExecError, OrderFill, PositionSnapshot};

// =============================================================================
// Constants
// =============================================================================

/// Delta Exchange REST API base URL
pub const DELTA_API_URL: &str = "https://api.india.delta.exchange";

/// Request timeout in seconds (queries only)
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Order placement endpoint
const ORDERS_PATH: &str = "/v2/orders";

/// Delta rejects requests without a user agent
const USER_AGENT: &str = concat!("signalflip/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur in the Delta REST client.
#[derive(Debug, Clone, Error)]
pub enum DeltaRestError {
    /// Failed to build request signature
    #[error("Failed to build signature: {0}")]
    SignatureError(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// API returned `success: false`
    #[error("Delta API error: {code} {}", .context.as_deref().unwrap_or(""))]
    ApiError { code: String, context: Option<String> },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<DeltaRestError> for ExecError {
    fn from(err: DeltaRestError) -> Self {
        match err {
            DeltaRestError::ApiError { .. } => ExecError::OrderRejected(err.to_string()),
            DeltaRestError::ParseError(msg) => ExecError::InvalidResponse(msg),
            DeltaRestError::InvalidParameter(msg) | DeltaRestError::SignatureError(msg) => {
                ExecError::Config(msg)
            },
            DeltaRestError::RequestFailed(_) | DeltaRestError::Timeout => {
                ExecError::Exchange(err.to_string())
            },
        }
    }
}

// =============================================================================
// Delta REST Client
// =============================================================================

/// Delta Exchange REST API client.
pub struct DeltaRestClient {
    /// HTTP client
    client: Client,
    /// Base URL (production, testnet or regional)
    base_url: String,
    /// API key
    api_key: String,
    /// API secret
    api_secret: String,
}

impl DeltaRestClient {
    /// Create a new Delta REST client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. [`DELTA_API_URL`]
    /// * `api_key` - Delta API key
    /// * `api_secret` - Delta API secret
    pub fn new(base_url: impl Into<String>, api_key: String, api_secret: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            api_secret,
        }
    }

    /// Sign a request.
    fn sign(
        &self,
        method: &Method,
        timestamp: &str,
        path: &str,
        query: &str,
        body: &str,
    ) -> Result<String, DeltaRestError> {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        type HmacSha256 = Hmac<Sha256>;

        let payload = signature_payload(method, timestamp, path, query, body);

        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| DeltaRestError::SignatureError(format!("HMAC error: {}", e)))?;
        mac.update(payload.as_bytes());

        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Send a request and unwrap the `{success, result, error}` envelope.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<serde_json::Value>,
        signed: bool,
    ) -> Result<T, DeltaRestError> {
        let query = build_query(params);
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let url = format!("{}{}{}", self.base_url, path, query);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header("User-Agent", USER_AGENT)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");

        if signed {
            let timestamp = Utc::now().timestamp().to_string();
            let signature = self.sign(&method, &timestamp, path, &query, &body)?;
            request = request
                .header("api-key", &self.api_key)
                .header("timestamp", timestamp)
                .header("signature", signature);
        }

        if !body.is_empty() {
            request = request.body(body);
        }

        debug!(%method, %path, "Delta request");

        let response = match request_timeout(path) {
            Some(limit) => timeout(limit, request.send())
                .await
                .map_err(|_| DeltaRestError::Timeout)?,
            None => request.send().await,
        }
        .map_err(|e| DeltaRestError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DeltaRestError::ParseError(e.to_string()))?;

        parse_envelope(status.as_u16(), &text)
    }

    // =========================================================================
    // Order API
    // =========================================================================

    /// Place a market order.
    ///
    /// # Endpoint
    ///
    /// `POST /v2/orders`
    ///
    /// # Example
    ///
    /// ```ignore
    /// let order = client.place_market_order(84, 1, OrderSide::Buy).await?;
    /// println!("Order ID: {:?}", order.id);
    /// ```
    pub async fn place_market_order(
        &self,
        product_id: u64,
        size: u64,
        side: OrderSide,
    ) -> Result<DeltaOrder, DeltaRestError> {
        let body = serde_json::json!({
            "product_id": product_id,
            "size": size,
            "side": side.as_str(),
            "order_type": "market_order",
        });

        self.send(Method::POST, ORDERS_PATH, &[], Some(body), true).await
    }

    // =========================================================================
    // Market Data API
    // =========================================================================

    /// Get the ticker for a product symbol.
    ///
    /// Uses public endpoint, no signature required.
    ///
    /// # Endpoint
    ///
    /// `GET /v2/tickers/{symbol}`
    pub async fn get_ticker(&self, symbol: &str) -> Result<DeltaTicker, DeltaRestError> {
        let path = format!("/v2/tickers/{}", symbol);
        self.send(Method::GET, &path, &[], None, false).await
    }

    // =========================================================================
    // Position API
    // =========================================================================

    /// Get all margined positions on the account.
    ///
    /// # Endpoint
    ///
    /// `GET /v2/positions/margined`
    pub async fn get_margined_positions(&self) -> Result<Vec<DeltaPosition>, DeltaRestError> {
        self.send(Method::GET, "/v2/positions/margined", &[], None, true)
            .await
    }
}

#[async_trait]
impl ExchangePort for DeltaRestClient {
    async fn place_market_order(
        &self,
        product: &Product,
        side: OrderSide,
        size: Quantity,
    ) -> Result<OrderFill, ExecError> {
        let contracts = contracts(size)?;
        let order = DeltaRestClient::place_market_order(self, product.id(), contracts, side).await?;

        Ok(OrderFill {
            order_id: order.id.map(|id| id.to_string()),
            average_fill_price: order.average_fill_price,
        })
    }

    async fn get_ticker(&self, product: &Product) -> Result<Price, ExecError> {
        let ticker = DeltaRestClient::get_ticker(self, product.symbol()).await?;
        Ok(ticker.last_price()?)
    }

    async fn get_positions(&self) -> Result<Vec<PositionSnapshot>, ExecError> {
        let positions = self.get_margined_positions().await?;

        Ok(positions
            .into_iter()
            .map(|p| PositionSnapshot::from_signed(p.product_id, p.size, p.entry_price))
            .collect())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// String that gets signed: `method + timestamp + path + query + body`.
fn signature_payload(method: &Method, timestamp: &str, path: &str, query: &str, body: &str) -> String {
    format!("{}{}{}{}{}", method.as_str(), timestamp, path, query, body)
}

/// Time limit for a request to `path`.
///
/// Orders have none and always wait for the exchange's answer.
fn request_timeout(path: &str) -> Option<Duration> {
    (path != ORDERS_PATH).then_some(Duration::from_secs(REQUEST_TIMEOUT_SECS))
}

/// `?k=v&k2=v2`, or empty when there are no parameters.
fn build_query(params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return String::new();
    }

    let joined = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!("?{}", joined)
}

/// Delta sizes are whole contracts.
fn contracts(size: Quantity) -> Result<u64, DeltaRestError> {
    let value = size.as_decimal();
    if !value.fract().is_zero() {
        return Err(DeltaRestError::InvalidParameter(format!(
            "Order size must be a whole number of contracts, got {}",
            value
        )));
    }

    value
        .to_u64()
        .ok_or_else(|| DeltaRestError::InvalidParameter(format!("Order size out of range: {}", value)))
}

/// Unwrap a Delta response envelope.
fn parse_envelope<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, DeltaRestError> {
    let envelope: DeltaEnvelope<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if (200..300).contains(&status) => {
            return Err(DeltaRestError::ParseError(e.to_string()));
        },
        Err(_) => {
            return Err(DeltaRestError::RequestFailed(format!("HTTP {}: {}", status, body)));
        },
    };

    if !envelope.success {
        let error = envelope.error.unwrap_or_default();
        return Err(DeltaRestError::ApiError {
            code: error.code.unwrap_or_else(|| format!("http_{}", status)),
            context: error.context.map(|c| c.to_string()),
        });
    }

    envelope
        .result
        .ok_or_else(|| DeltaRestError::ParseError("Missing result".to_string()))
}

// =============================================================================
// Delta Types (from API responses)
// =============================================================================

/// Response envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
struct DeltaEnvelope<T> {
    success: bool,
    result: Option<T>,
    error: Option<DeltaErrorBody>,
}

/// Error object of a failed response.
#[derive(Debug, Default, Deserialize)]
struct DeltaErrorBody {
    code: Option<String>,
    context: Option<serde_json::Value>,
}

/// Order returned by `POST /v2/orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeltaOrder {
    /// Order ID
    pub id: Option<u64>,
    /// Product ID
    pub product_id: Option<u64>,
    /// Order state (`open`, `closed`, `cancelled`, ...)
    pub state: Option<String>,
    /// Contracts still unfilled
    pub unfilled_size: Option<Decimal>,
    /// Average fill price, null until filled
    pub average_fill_price: Option<Decimal>,
}

/// Ticker returned by `GET /v2/tickers/{symbol}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeltaTicker {
    /// Symbol
    pub symbol: String,
    /// Last traded price
    pub close: Option<Decimal>,
    /// Mark price
    pub mark_price: Option<Decimal>,
}

impl DeltaTicker {
    /// Last traded price, falling back to mark price.
    pub fn last_price(&self) -> Result<Price, DeltaRestError> {
        let value = self
            .close
            .filter(|p| *p > Decimal::ZERO)
            .or(self.mark_price)
            .ok_or_else(|| DeltaRestError::ParseError(format!("No price in ticker for {}", self.symbol)))?;

        Price::new(value).map_err(|e| DeltaRestError::ParseError(e.to_string()))
    }
}

/// Position returned by `GET /v2/positions/margined`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeltaPosition {
    /// Product ID
    pub product_id: u64,
    /// Product symbol
    pub product_symbol: Option<String>,
    /// Signed size in contracts (negative = short)
    pub size: Decimal,
    /// Average entry price
    pub entry_price: Option<Decimal>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use signalflip_domain::Side;

    fn client() -> DeltaRestClient {
        DeltaRestClient::new(DELTA_API_URL, "test_key".to_string(), "test_secret".to_string())
    }

    #[test]
    fn test_signature_payload_order() {
        let payload = signature_payload(
            &Method::POST,
            "1700000000",
            "/v2/orders",
            "",
            r#"{"product_id":84}"#,
        );
        assert_eq!(payload, r#"POST1700000000/v2/orders{"product_id":84}"#);

        let payload = signature_payload(&Method::GET, "1700000000", "/v2/positions", "?product_id=84", "");
        assert_eq!(payload, "GET1700000000/v2/positions?product_id=84");
    }

    #[test]
    fn test_sign_is_deterministic_hex() {
        let client = client();
        let a = client.sign(&Method::GET, "1700000000", "/v2/positions/margined", "", "").unwrap();
        let b = client.sign(&Method::GET, "1700000000", "/v2/positions/margined", "", "").unwrap();
        let c = client.sign(&Method::GET, "1700000001", "/v2/positions/margined", "", "").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_orders_are_not_timed_out() {
        assert_eq!(request_timeout(ORDERS_PATH), None);
        assert_eq!(
            request_timeout("/v2/tickers/BTCUSD"),
            Some(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        );
        assert_eq!(
            request_timeout("/v2/positions/margined"),
            Some(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        );
    }

    #[test]
    fn test_build_query() {
        assert_eq!(build_query(&[]), "");
        assert_eq!(
            build_query(&[("product_id", "84".to_string()), ("state", "open".to_string())]),
            "?product_id=84&state=open"
        );
    }

    #[test]
    fn test_contracts_must_be_whole() {
        assert_eq!(contracts(Quantity::new(dec!(3)).unwrap()).unwrap(), 3);
        assert!(matches!(
            contracts(Quantity::new(dec!(0.5)).unwrap()),
            Err(DeltaRestError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_parse_order_success() {
        let body = r#"{"success":true,"result":{"id":123456,"product_id":84,"state":"closed","unfilled_size":0,"average_fill_price":"27012.5"}}"#;
        let order: DeltaOrder = parse_envelope(200, body).unwrap();

        assert_eq!(order.id, Some(123456));
        assert_eq!(order.average_fill_price, Some(dec!(27012.5)));
    }

    #[test]
    fn test_parse_order_without_fill_price() {
        let body = r#"{"success":true,"result":{"id":7,"state":"open","average_fill_price":null}}"#;
        let order: DeltaOrder = parse_envelope(200, body).unwrap();

        assert_eq!(order.average_fill_price, None);
    }

    #[test]
    fn test_parse_rejection() {
        let body = r#"{"success":false,"error":{"code":"insufficient_margin","context":{"available_balance":"0.1"}}}"#;
        let err = parse_envelope::<DeltaOrder>(400, body).unwrap_err();

        match &err {
            DeltaRestError::ApiError { code, context } => {
                assert_eq!(code, "insufficient_margin");
                assert!(context.as_deref().unwrap().contains("available_balance"));
            },
            other => panic!("Expected ApiError, got {:?}", other),
        }
        assert!(matches!(ExecError::from(err), ExecError::OrderRejected(_)));
    }

    #[test]
    fn test_parse_non_json_error() {
        let err = parse_envelope::<DeltaOrder>(502, "<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, DeltaRestError::RequestFailed(_)));
        assert!(ExecError::from(err).is_transient());
    }

    #[test]
    fn test_ticker_last_price() {
        let body = r#"{"success":true,"result":{"symbol":"BTCUSD","close":27001.5,"mark_price":"27003.1"}}"#;
        let ticker: DeltaTicker = parse_envelope(200, body).unwrap();
        assert_eq!(ticker.last_price().unwrap().as_decimal(), dec!(27001.5));

        let body = r#"{"success":true,"result":{"symbol":"BTCUSD","close":null,"mark_price":"27003.1"}}"#;
        let ticker: DeltaTicker = parse_envelope(200, body).unwrap();
        assert_eq!(ticker.last_price().unwrap().as_decimal(), dec!(27003.1));

        let body = r#"{"success":true,"result":{"symbol":"BTCUSD"}}"#;
        let ticker: DeltaTicker = parse_envelope(200, body).unwrap();
        assert!(ticker.last_price().is_err());
    }

    #[test]
    fn test_parse_positions() {
        let body = r#"{"success":true,"result":[
            {"product_id":84,"product_symbol":"BTCUSD","size":-2,"entry_price":"27100.0"},
            {"product_id":27,"product_symbol":"ETHUSD","size":5,"entry_price":"1650"}
        ]}"#;
        let positions: Vec<DeltaPosition> = parse_envelope(200, body).unwrap();

        let snapshots: Vec<PositionSnapshot> = positions
            .into_iter()
            .map(|p| PositionSnapshot::from_signed(p.product_id, p.size, p.entry_price))
            .collect();

        assert_eq!(snapshots[0].side, Side::Short);
        assert_eq!(snapshots[0].size, dec!(2));
        assert_eq!(snapshots[0].entry_price, Some(dec!(27100)));
        assert_eq!(snapshots[1].side, Side::Long);
    }
}
