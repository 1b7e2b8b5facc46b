//! Tracing subscriber setup for processes embedding the executor.

use crate::config::LogConfig;
use crate::{ExecutorError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber writing to stderr, leaving stdout free for
/// protocol traffic. `RUST_LOG` overrides `config.level`.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ExecutorError::Config(format!("invalid log level '{}': {}", config.level, e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    installed.map_err(|e| ExecutorError::Config(format!("failed to install subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_installs_once() {
        let config = LogConfig {
            level: "step_executor=debug".to_string(),
            json: true,
        };
        assert!(init(&config).is_ok());
        tracing::debug!("subscriber installed");

        let err = init(&config).unwrap_err();
        assert!(err.to_string().contains("failed to install subscriber"));
    }
}
