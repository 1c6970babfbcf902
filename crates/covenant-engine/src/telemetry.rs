//! Tracing subscriber setup for hosts embedding the engine.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{EngineError, LoggingConfig};

/// Install a global subscriber. `RUST_LOG` wins over `config.level`.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), EngineError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    result.map_err(|error| EngineError::Telemetry(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_error() {
        let config = LoggingConfig {
            level: "debug".into(),
            json: true,
        };
        // Another test binary may already own the global subscriber.
        let _ = init_tracing(&config);
        assert!(matches!(
            init_tracing(&config),
            Err(EngineError::Telemetry(_))
        ));
    }
}
