//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{DaemonError, DaemonResult};
use rust_decimal::Decimal;
use signalflip_connectors::{TelegramConfig, DELTA_API_URL};
use signalflip_domain::{Product, Quantity};
use signalflip_exec::{ExecutorConfig, PriceResolverConfig};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Port used when neither `SIGNALFLIP_API_PORT` nor `PORT` is set
const DEFAULT_PORT: u16 = 10000;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Engine configuration
    pub engine: EngineConfig,

    /// Exchange credentials
    pub exchange: ExchangeConfig,

    /// Where the position is persisted
    pub state_file: PathBuf,

    /// Telegram delivery, log-only when absent
    pub telegram: Option<TelegramConfig>,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Exchange product id
    pub product_id: u64,
    /// Ticker symbol of the product
    pub product_symbol: String,
    /// Contracts per order
    pub order_size: Decimal,
    /// Minimum time between processed signals
    pub cooldown: Duration,
    /// Ticker attempts when resolving a price
    pub price_retries: u32,
    /// Delay between ticker attempts
    pub price_retry_delay: Duration,
    /// Wait before asking the ticker for an entry without fill price
    pub fill_settle_delay: Duration,
    /// Age given to a position discovered at startup
    pub reconcile_entry_offset: Duration,
}

/// Delta Exchange connection.
#[derive(Clone)]
pub struct ExchangeConfig {
    /// REST base URL
    pub base_url: String,
    /// API key
    pub api_key: String,
    /// API secret
    pub api_secret: String,
}

impl std::fmt::Debug for ExchangeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .finish()
    }
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let api = Self::load_api_config()?;
        let engine = Self::load_engine_config()?;
        let exchange = Self::load_exchange_config(environment)?;
        let state_file = env::var("SIGNALFLIP_STATE_FILE")
            .unwrap_or_else(|_| "position_state.json".to_string())
            .into();

        Ok(Self {
            api,
            engine,
            exchange,
            state_file,
            telegram: TelegramConfig::from_env(),
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            engine: EngineConfig::default(),
            exchange: ExchangeConfig {
                base_url: DELTA_API_URL.to_string(),
                api_key: String::new(),
                api_secret: String::new(),
            },
            state_file: PathBuf::from("position_state.json"),
            telegram: None,
            environment: Environment::Test,
        }
    }

    fn load_environment() -> DaemonResult<Environment> {
        let env_str = env::var("SIGNALFLIP_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid SIGNALFLIP_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_api_config() -> DaemonResult<ApiConfig> {
        let host = env::var("SIGNALFLIP_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = match env::var("SIGNALFLIP_API_PORT").or_else(|_| env::var("PORT")) {
            Ok(port_str) => port_str
                .parse::<u16>()
                .map_err(|_| DaemonError::Config(format!("Invalid API port: {}", port_str)))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(ApiConfig { host, port })
    }

    fn load_engine_config() -> DaemonResult<EngineConfig> {
        let defaults = EngineConfig::default();

        let order_size = Self::load_decimal_env("SIGNALFLIP_ORDER_SIZE", defaults.order_size)?;
        if order_size <= Decimal::ZERO {
            return Err(DaemonError::Config(format!(
                "SIGNALFLIP_ORDER_SIZE must be positive, got {}",
                order_size
            )));
        }

        let price_retries = Self::load_parsed_env("SIGNALFLIP_PRICE_RETRIES", defaults.price_retries)?;
        if price_retries == 0 {
            return Err(DaemonError::Config(
                "SIGNALFLIP_PRICE_RETRIES must be at least 1".to_string(),
            ));
        }

        Ok(EngineConfig {
            product_id: Self::load_parsed_env("SIGNALFLIP_PRODUCT_ID", defaults.product_id)?,
            product_symbol: env::var("SIGNALFLIP_PRODUCT_SYMBOL")
                .unwrap_or(defaults.product_symbol),
            order_size,
            cooldown: Self::load_millis_env("SIGNALFLIP_COOLDOWN_MS", defaults.cooldown)?,
            price_retries,
            price_retry_delay: Self::load_millis_env(
                "SIGNALFLIP_PRICE_RETRY_DELAY_MS",
                defaults.price_retry_delay,
            )?,
            fill_settle_delay: Self::load_millis_env(
                "SIGNALFLIP_FILL_SETTLE_MS",
                defaults.fill_settle_delay,
            )?,
            reconcile_entry_offset: Duration::from_secs(Self::load_parsed_env(
                "SIGNALFLIP_RECONCILE_OFFSET_SECS",
                defaults.reconcile_entry_offset.as_secs(),
            )?),
        })
    }

    fn load_exchange_config(environment: Environment) -> DaemonResult<ExchangeConfig> {
        let base_url = env::var("DELTA_BASE_URL").unwrap_or_else(|_| DELTA_API_URL.to_string());
        let api_key = env::var("DELTA_API_KEY").unwrap_or_default();
        let api_secret = env::var("DELTA_API_SECRET").unwrap_or_default();

        // Stubs need no credentials
        if environment != Environment::Test && (api_key.is_empty() || api_secret.is_empty()) {
            return Err(DaemonError::Config(
                "DELTA_API_KEY and DELTA_API_SECRET are required outside the test environment"
                    .to_string(),
            ));
        }

        Ok(ExchangeConfig {
            base_url,
            api_key,
            api_secret,
        })
    }

    fn load_decimal_env(key: &str, default: Decimal) -> DaemonResult<Decimal> {
        match env::var(key) {
            Ok(val) => Decimal::from_str(&val)
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }

    fn load_parsed_env<T: FromStr>(key: &str, default: T) -> DaemonResult<T> {
        match env::var(key) {
            Ok(val) => val
                .trim()
                .parse::<T>()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }

    fn load_millis_env(key: &str, default: Duration) -> DaemonResult<Duration> {
        let millis = Self::load_parsed_env(key, default.as_millis() as u64)?;
        Ok(Duration::from_millis(millis))
    }
}

impl EngineConfig {
    /// The configured product.
    pub fn product(&self) -> DaemonResult<Product> {
        Ok(Product::new(self.product_id, self.product_symbol.clone())?)
    }

    /// Executor settings derived from this config.
    pub fn executor_config(&self) -> DaemonResult<ExecutorConfig> {
        Ok(ExecutorConfig {
            product: self.product()?,
            order_size: Quantity::new(self.order_size)?,
            fill_settle_delay: self.fill_settle_delay,
            price: PriceResolverConfig {
                max_attempts: self.price_retries,
                retry_delay: self.price_retry_delay,
            },
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            product_id: 84,
            product_symbol: "BTCUSD".to_string(),
            order_size: Decimal::ONE,
            cooldown: Duration::from_millis(2000),
            price_retries: 5,
            price_retry_delay: Duration::from_millis(1000),
            fill_settle_delay: Duration::from_millis(1000),
            reconcile_entry_offset: Duration::from_secs(60),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: DEFAULT_PORT,
            },
            environment: Environment::Development,
            ..Self::test()
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
