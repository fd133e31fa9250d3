//! Log filter setup.
//!
//! `RUST_LOG` wins when set. Otherwise every target logs at `info`, which
//! covers the daemon and the workspace crates it drives (notifications
//! without Telegram, state file warnings, degraded prices).

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Filter from `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_env_filter())
}

/// The fallback filter.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_LOG_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalflip_connectors::LogNotifier;
    use signalflip_exec::Notifier;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::{fmt, prelude::*};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_filter_keeps_workspace_targets() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::registry()
            .with(default_env_filter())
            .with(fmt::layer().with_ansi(false).with_writer(move || writer.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        LogNotifier.notify("LONG opened on BTCUSD").await;
        tracing::warn!(target: "signalflip_store::file", "State file corrupt");
        tracing::warn!(target: "signalflip_exec::price", "Ticker unavailable, using cached price");
        tracing::info!(target: "signalflipd::daemon", "Engine ready");
        tracing::debug!(target: "signalflipd::api", "Empty webhook body ignored");

        let text = captured.text();
        assert!(text.contains("LONG opened on BTCUSD"));
        assert!(text.contains("State file corrupt"));
        assert!(text.contains("using cached price"));
        assert!(text.contains("Engine ready"));
        assert!(!text.contains("Empty webhook body"));
    }
}
