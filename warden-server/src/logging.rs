//! Tracing initialisation

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global tracing subscriber.
///
/// The configured level wins; `RUST_LOG` is consulted only when the level is
/// not a valid filter directive. Safe to call more than once.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_new(&config.level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Use try_init to avoid panic if global subscriber already set
    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(config.ansi)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable() {
        let config = LoggingConfig::default();
        init_tracing(&config).unwrap();
        init_tracing(&config).unwrap();
    }

    #[test]
    fn test_bad_level_falls_back() {
        let config = LoggingConfig {
            level: "[not a filter".to_string(),
            ansi: false,
        };
        init_tracing(&config).unwrap();
    }
}
