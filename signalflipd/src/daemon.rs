//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Startup Reconciler (exchange vs. stored position)
//! - Position Engine (signal serialization)
//! - API Server (HTTP endpoints)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Reconcile the position with the exchange
//! 3. Build the engine from the reconciled position
//! 4. Start API server
//! 5. Serve until SIGINT
//! 6. Log the final position

use std::net::SocketAddr;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tracing::{error, info};

use signalflip_connectors::{DeltaRestClient, LogNotifier, TelegramNotifier};
use signalflip_exec::{ExchangePort, Executor, Notifier, StubExchange};
use signalflip_store::{FileStore, MemoryStore, PositionStore};

use crate::api::{create_router, ApiState};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{DaemonError, DaemonResult};
use crate::position_engine::PositionEngine;
use crate::reconciler::StartupReconciler;

// =============================================================================
// Daemon
// =============================================================================

/// The main signalflip daemon.
pub struct Daemon<E: ExchangePort + 'static, S: PositionStore + 'static> {
    /// Configuration
    config: Config,
    /// Exchange adapter
    exchange: Arc<E>,
    /// Position store
    store: Arc<S>,
    /// Status messages
    notifier: Arc<dyn Notifier>,
    /// Time source
    clock: Arc<dyn Clock>,
}

impl Daemon<StubExchange, MemoryStore> {
    /// Create a new daemon with stub components (for testing/development).
    pub fn new_stub(config: Config) -> Self {
        let exchange = Arc::new(StubExchange::new(Decimal::new(27000, 0)));
        let store = Arc::new(MemoryStore::new());

        Self::new(config, exchange, store, Arc::new(LogNotifier), Arc::new(SystemClock))
    }
}

impl Daemon<DeltaRestClient, FileStore> {
    /// Create a daemon trading on Delta Exchange with a file-backed store.
    pub fn new_live(config: Config) -> DaemonResult<Self> {
        if config.exchange.api_key.is_empty() || config.exchange.api_secret.is_empty() {
            return Err(DaemonError::Config("Delta API credentials are missing".to_string()));
        }

        let exchange = Arc::new(DeltaRestClient::new(
            config.exchange.base_url.clone(),
            config.exchange.api_key.clone(),
            config.exchange.api_secret.clone(),
        ));
        let store = Arc::new(FileStore::new(config.state_file.clone()));

        let notifier: Arc<dyn Notifier> = match &config.telegram {
            Some(telegram) => Arc::new(TelegramNotifier::new(telegram.clone())),
            None => {
                info!("Telegram not configured, notifications go to the log");
                Arc::new(LogNotifier)
            },
        };

        Ok(Self::new(config, exchange, store, notifier, Arc::new(SystemClock)))
    }
}

impl<E: ExchangePort + 'static, S: PositionStore + 'static> Daemon<E, S> {
    /// Create a new daemon with provided components.
    pub fn new(
        config: Config,
        exchange: Arc<E>,
        store: Arc<S>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            exchange,
            store,
            notifier,
            clock,
        }
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT).
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting signalflip daemon"
        );

        // 1. Reconcile and build the engine
        let engine = self.start_engine().await?;

        // 2. Start API server
        let api_addr = self.start_api_server(engine.clone()).await?;
        info!(%api_addr, "API server started");

        // 3. Serve until interrupted
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Received shutdown signal");

        // 4. Graceful shutdown
        self.shutdown(&engine).await;

        Ok(())
    }

    /// Reconcile with the exchange and build the engine on the result.
    pub async fn start_engine(&self) -> DaemonResult<Arc<PositionEngine<E, S>>> {
        let executor_config = self.config.engine.executor_config()?;
        let product = executor_config.product.clone();

        let reconciliation = StartupReconciler::new(
            self.exchange.clone(),
            self.store.clone(),
            self.clock.clone(),
            product.clone(),
            self.config.engine.reconcile_entry_offset,
        )
        .reconcile()
        .await;

        info!(
            position = %reconciliation.position,
            source = ?reconciliation.source,
            "Position reconciled"
        );

        self.notifier
            .notify(&format!(
                "🚀 signalflip started\nSymbol: {}\nPosition: {}",
                product.symbol(),
                reconciliation.position
            ))
            .await;

        let executor = Executor::new(self.exchange.clone(), executor_config);

        Ok(Arc::new(PositionEngine::new(
            executor,
            self.store.clone(),
            self.notifier.clone(),
            self.clock.clone(),
            self.config.engine.cooldown,
            reconciliation.position,
        )))
    }

    /// Start the API server.
    pub async fn start_api_server(
        &self,
        engine: Arc<PositionEngine<E, S>>,
    ) -> DaemonResult<SocketAddr> {
        let state = Arc::new(ApiState { engine });
        let router = create_router(state);

        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DaemonError::Api(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| DaemonError::Api(format!("Failed to get local address: {}", e)))?;

        // Spawn the server task
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "API server error");
            }
        });

        Ok(local_addr)
    }

    /// Graceful shutdown.
    async fn shutdown(&self, engine: &PositionEngine<E, S>) {
        info!("Initiating graceful shutdown");

        // Open positions stay open on the exchange; the next start reconciles them
        let position = engine.position();
        info!(%position, "Shutdown complete");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use rust_decimal_macros::dec;
    use signalflip_domain::{Position, Side};
    use signalflip_exec::{PositionSnapshot, RecordingNotifier};

    #[tokio::test]
    async fn test_daemon_stub_starts_flat() {
        let daemon = Daemon::new_stub(Config::test());

        let engine = daemon.start_engine().await.unwrap();

        assert_eq!(engine.position(), Position::Flat);
    }

    #[tokio::test]
    async fn test_daemon_engine_starts_from_exchange_position() {
        let exchange = Arc::new(StubExchange::new(dec!(27000)));
        exchange.set_positions(vec![PositionSnapshot::from_signed(84, dec!(1), Some(dec!(26900)))]);
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let daemon = Daemon::new(
            Config::test(),
            exchange,
            store.clone(),
            notifier.clone(),
            Arc::new(ManualClock::default()),
        );
        let engine = daemon.start_engine().await.unwrap();

        assert_eq!(engine.position().side(), Some(Side::Long));
        assert_eq!(engine.position().entry_price(), Some(dec!(26900)));
        assert_eq!(store.stored(), Some(engine.position()));
        assert!(notifier.contains("signalflip started"));
    }

    #[tokio::test]
    async fn test_daemon_api_server_start() {
        let daemon = Daemon::new_stub(Config::test());
        let engine = daemon.start_engine().await.unwrap();

        let addr = daemon.start_api_server(engine).await.unwrap();

        // Server should be running on a port
        assert!(addr.port() > 0);

        // Can make a health check request
        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap();

        assert!(response.status().is_success());
    }

    #[test]
    fn test_new_live_requires_credentials() {
        let result = Daemon::new_live(Config::test());

        assert!(matches!(result, Err(DaemonError::Config(_))));
    }
}
