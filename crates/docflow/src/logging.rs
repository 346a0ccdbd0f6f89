//! Process-wide `tracing` subscriber with a `log` bridge.

use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::DocflowError;

/// Installs the global subscriber. `RUST_LOG` overrides the configured
/// level. Fails if a subscriber or logger is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), DocflowError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.level)));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_current_span(true)),
        )
    } else {
        tracing::subscriber::set_global_default(registry.with(fmt::layer().with_target(false)))
    };
    installed.map_err(|e| DocflowError::Logging(e.to_string()))?;

    LogTracer::init().map_err(|e| DocflowError::Logging(e.to_string()))
}

fn default_directive(level: &str) -> String {
    format!("warn,docflow={}", level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive("debug"), "warn,docflow=debug");
    }

    #[test]
    #[serial]
    fn test_second_init_is_rejected() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config);
        assert!(matches!(
            init_logging(&config),
            Err(DocflowError::Logging(_))
        ));
    }
}
