//! Logging and metrics setup for jsonapi services.
//!
//! - **Logging**: `tracing-subscriber` with JSON or pretty output, see
//!   [`init_logging`].
//! - **Metrics**: standard request metrics through the `metrics` facade,
//!   see [`metrics`]. Installing a recorder (and an exporter) is up to the
//!   application.
//!
//! # Example
//!
//! ```rust,ignore
//! use jsonapi_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::builder()
//!     .service_name("users")
//!     .environment("production")
//!     .build();
//! init_telemetry(&config)?;
//! ```

#![doc(html_root_url = "https://docs.rs/jsonapi-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig};
pub use metrics::{describe_metrics, record_request, InFlightGuard};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging, then registers metric descriptions.
///
/// # Errors
///
/// Returns `TelemetryError` if logging fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;

    if config.metrics_enabled {
        describe_metrics();
    }

    tracing::info!(
        service = %config.service_name,
        environment = %config.environment,
        "telemetry initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_with_logging_disabled() {
        let config = TelemetryConfig::builder()
            .logging(LogConfig {
                enabled: false,
                ..LogConfig::default()
            })
            .build();
        assert!(init_telemetry(&config).is_ok());
    }
}
