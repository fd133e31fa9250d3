//! Signalflip Daemon
//!
//! Turns BUY/SELL webhook signals into a single flipping position.
//!
//! # Usage
//!
//! ```bash
//! # Start against Delta Exchange
//! DELTA_API_KEY=... DELTA_API_SECRET=... cargo run -p signalflipd
//!
//! # Start with stubs
//! SIGNALFLIP_ENV=test SIGNALFLIP_API_PORT=8081 cargo run -p signalflipd
//! ```
//!
//! # Environment Variables
//!
//! - `SIGNALFLIP_ENV`: Environment (test, development, production)
//! - `SIGNALFLIP_API_HOST`: API host (default: 0.0.0.0)
//! - `SIGNALFLIP_API_PORT` / `PORT`: API port (default: 10000)
//! - `DELTA_BASE_URL`, `DELTA_API_KEY`, `DELTA_API_SECRET`: Exchange access
//! - `SIGNALFLIP_PRODUCT_ID` / `SIGNALFLIP_PRODUCT_SYMBOL`: Product (default: 84 / BTCUSD)
//! - `SIGNALFLIP_ORDER_SIZE`: Contracts per order (default: 1)
//! - `SIGNALFLIP_COOLDOWN_MS`: Minimum gap between signals (default: 2000)
//! - `SIGNALFLIP_STATE_FILE`: Position state file (default: position_state.json)
//! - `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`: Optional notifications
//! - `RUST_LOG`: Log filter (default: info)

use signalflipd::{logging, Config, Daemon, Environment};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(logging::env_filter())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        symbol = %config.engine.product_symbol,
        "Signalflip Daemon"
    );

    // Create and run daemon
    match config.environment {
        Environment::Test => Daemon::new_stub(config).run().await?,
        Environment::Development | Environment::Production => {
            Daemon::new_live(config)?.run().await?
        },
    }

    Ok(())
}
