//! Tracing setup
//!
//! `RUST_LOG` wins over the configured level when set.

use crate::config::LoggingConfig;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive for a configured level: the crate at `level`, dependencies at warn
fn default_directive(level: &str) -> String {
    format!("bms_bot={},warn", level)
}

/// Install the global tracing subscriber
pub fn init_tracing(config: &LoggingConfig) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.level)));

    let file_layer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    let json = config.format == "json";
    let stdout_json = json.then(|| tracing_subscriber::fmt::layer().json());
    let stdout_pretty = (!json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_json)
        .with(stdout_pretty)
        .with(file_layer)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_parses() {
        let directive = default_directive("debug");
        assert!(directive.starts_with("bms_bot=debug"));
        // must be accepted by EnvFilter
        let _ = EnvFilter::try_new(directive).unwrap();
    }
}
