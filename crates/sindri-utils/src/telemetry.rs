/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Sindri Telemetry Module
//!
//! Process-wide tracing setup for Sindri components.
//!
//! ## Usage
//!
//! ```rust,ignore
//! sindri_utils::telemetry::init("info", "text")?;
//!
//! tracing::info!("Application started");
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Error type for telemetry initialization
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to set global subscriber
    #[error("subscriber error: {0}")]
    SubscriberError(String),
}

/// Initialize the tracing subscriber for this process.
///
/// `RUST_LOG` takes precedence over the configured `log_level` when set.
///
/// # Arguments
/// * `log_level` - Log level filter string (e.g., "info", "debug")
/// * `log_format` - Log format ("text" or "json")
pub fn init(log_level: &str, log_format: &str) -> Result<(), TelemetryError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if log_format.eq_ignore_ascii_case("json") {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| TelemetryError::SubscriberError(e.to_string()))?;
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| TelemetryError::SubscriberError(e.to_string()))?;
    }

    Ok(())
}

/// Re-export tracing macros for convenience
pub mod prelude {
    pub use tracing::Instrument;
    pub use tracing::{debug, error, info, trace, warn};
    pub use tracing::{info_span, instrument, span, Level};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent_failure() {
        // The first init in the process wins; later calls report an error
        // instead of panicking.
        let first = init("info", "text");
        let second = init("debug", "json");
        assert!(first.is_ok() || second.is_err());
    }
}
