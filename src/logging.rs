//! tracing subscriber setup.
//!
//! Logs go to stderr so CLI output on stdout stays clean. `RUST_LOG`
//! overrides `[logging].level` when set.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter(config));

    let result = match config.format.as_str() {
        "pretty" => builder.pretty().try_init(),
        "json" => builder.json().try_init(),
        _ => builder.compact().try_init(),
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        let config = LoggingConfig::default();
        init_logging(&config);
        init_logging(&LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
        });
    }

    #[test]
    fn test_bad_level_falls_back() {
        let config = LoggingConfig {
            level: "not a level ===".to_string(),
            format: "compact".to_string(),
        };
        // Must not panic; the exact fallback depends on RUST_LOG.
        let _ = filter(&config);
    }
}
