//! The root configuration type.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use jsonapi_core::cookie::expiry_after;
use jsonapi_middleware::session::{IdHandler, InCookie, InHeader, MemoryStore, StoreProvider};
use jsonapi_middleware::stages::CorsOption;
use jsonapi_middleware::SessionProvider;
use jsonapi_server::ServerConfig;
use jsonapi_telemetry::{LogConfig, TelemetryConfig};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::schema::{
    CorsSection, IdLocation, LogFormat, ServerSection, SessionSection, TelemetrySection,
};

/// Complete configuration of a jsonapi service.
///
/// ```
/// use jsonapi_config::JsonApiConfig;
///
/// let config = JsonApiConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct JsonApiConfig {
    /// HTTP server.
    #[serde(default)]
    pub server: ServerSection,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetrySection,

    /// CORS middleware.
    #[serde(default)]
    pub cors: CorsSection,

    /// Session middleware.
    #[serde(default)]
    pub session: SessionSection,
}

impl JsonApiConfig {
    /// Checks the values serde cannot check.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field:
    /// an unparsable address, a zero timeout or body limit, a bad log
    /// filter, an empty session name, or a session TTL which is zero or
    /// expires after the year 9999.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }
        if self.server.shutdown_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "server.shutdown_timeout_secs",
                "must not be zero",
            ));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must not be zero",
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value("server.max_body_bytes", "must not be zero"));
        }

        if let Err(e) = jsonapi_telemetry::create_env_filter(&self.telemetry.logging.level) {
            return Err(ConfigError::invalid_value("telemetry.logging.level", e.to_string()));
        }

        if self.session.enabled {
            if self.session.name.is_empty() {
                return Err(ConfigError::invalid_value("session.name", "must not be empty"));
            }
            if self.session.ttl_secs == 0 {
                return Err(ConfigError::invalid_value("session.ttl_secs", "must not be zero"));
            }
            if expiry_after(Duration::from_secs(self.session.ttl_secs)).is_none() {
                return Err(ConfigError::invalid_value(
                    "session.ttl_secs",
                    "expiry must be before the year 10000",
                ));
            }
        }
        Ok(())
    }

    /// Pretty debug logs.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.environment = "development".to_string();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.ansi_enabled = true;
        config.telemetry.logging.include_location = true;
        config
    }

    /// JSON info logs and secure session cookies.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.environment = "production".to_string();
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config.telemetry.logging.ansi_enabled = false;
        config.session.secure = true;
        config
    }

    /// Settings for [`jsonapi_server::Server`].
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::builder()
            .http_addr(self.server.http_addr.clone())
            .shutdown_timeout(Duration::from_secs(self.server.shutdown_timeout_secs))
            .request_timeout(Duration::from_millis(self.server.request_timeout_ms))
            .max_body_bytes(self.server.max_body_bytes)
            .build()
    }

    /// Settings for [`jsonapi_telemetry::init_telemetry`].
    #[must_use]
    pub fn telemetry_config(&self) -> TelemetryConfig {
        let logging = &self.telemetry.logging;
        TelemetryConfig::builder()
            .service_name(&self.telemetry.service_name)
            .environment(&self.telemetry.environment)
            .metrics_enabled(self.telemetry.metrics_enabled)
            .logging(LogConfig {
                enabled: logging.enabled,
                level: logging.level.clone(),
                json_format: logging.format == LogFormat::Json,
                file_line_info: logging.include_location,
                ansi: logging.ansi_enabled,
                ..LogConfig::default()
            })
            .build()
    }

    /// Options of the CORS middleware, `None` when it is disabled.
    #[must_use]
    pub fn cors_option(&self) -> Option<CorsOption> {
        let cors = &self.cors;
        cors.enabled.then(|| CorsOption {
            origin: cors.origin.clone(),
            expose_headers: cors.expose_headers.clone(),
            headers: cors.headers.clone(),
            max_age: Duration::from_secs(cors.max_age_secs),
            credential: cors.credential,
            methods: cors.methods.clone(),
        })
    }

    /// An in-memory session provider, `None` when sessions are disabled.
    #[must_use]
    pub fn session_provider(&self) -> Option<Arc<dyn SessionProvider>> {
        let session = &self.session;
        if !session.enabled {
            return None;
        }

        let ttl = Duration::from_secs(session.ttl_secs);
        let id_handler: Arc<dyn IdHandler> = match session.id_location {
            IdLocation::Header => Arc::new(InHeader::new(session.name.clone())),
            IdLocation::Cookie => {
                let mut cookie = InCookie::new(session.name.clone());
                cookie.ttl = ttl;
                cookie.auto_refresh = session.auto_refresh;
                cookie.secure = session.secure;
                Arc::new(cookie)
            }
        };

        Some(Arc::new(StoreProvider::new(
            id_handler,
            Arc::new(MemoryStore::new()),
            ttl,
        )))
    }
}
