//! Configuration sections.
//!
//! Every section rejects unknown fields and falls back to a default for
//! each field it does not set.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Bind address.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Per-request deadline in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_max_body_bytes() -> usize {
    4 << 20
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable lines.
    Pretty,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directives, e.g. `info` or `jsonapi::access=info,warn`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// ANSI colors in pretty output.
    #[serde(default)]
    pub ansi_enabled: bool,

    /// Source file and line in records.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            ansi_enabled: false,
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Observability settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Service name used in the startup record.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Deployment environment.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Register request metric descriptions.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            environment: default_environment(),
            metrics_enabled: true,
            logging: LoggingSection::default(),
        }
    }
}

fn default_service_name() -> String {
    "jsonapi-service".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

/// CORS settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CorsSection {
    /// Attach the CORS middleware.
    #[serde(default)]
    pub enabled: bool,

    /// Allowed origin.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Allowed methods; the requested one is echoed when empty.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Allowed request headers; the requested ones are echoed when empty.
    #[serde(default)]
    pub headers: Vec<String>,

    /// Headers exposed to scripts.
    #[serde(default)]
    pub expose_headers: Vec<String>,

    /// Preflight cache lifetime in seconds.
    #[serde(default)]
    pub max_age_secs: u64,

    /// Allow credentials.
    #[serde(default)]
    pub credential: bool,
}

impl Default for CorsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            origin: default_origin(),
            methods: Vec::new(),
            headers: Vec::new(),
            expose_headers: Vec::new(),
            max_age_secs: 0,
            credential: false,
        }
    }
}

fn default_origin() -> String {
    "*".to_string()
}

/// Where the session id travels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdLocation {
    /// A cookie.
    #[default]
    Cookie,
    /// A request and response header.
    Header,
}

/// Session settings. Sessions are kept in memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SessionSection {
    /// Attach the session middleware.
    #[serde(default)]
    pub enabled: bool,

    /// Where the id is read from and written to.
    #[serde(default)]
    pub id_location: IdLocation,

    /// Cookie or header name.
    #[serde(default = "default_session_name")]
    pub name: String,

    /// Session lifetime in seconds.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// Mark the cookie `Secure`.
    #[serde(default)]
    pub secure: bool,

    /// Push the cookie expiry back on every request.
    #[serde(default)]
    pub auto_refresh: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            enabled: false,
            id_location: IdLocation::default(),
            name: default_session_name(),
            ttl_secs: default_session_ttl(),
            secure: false,
            auto_refresh: false,
        }
    }
}

fn default_session_name() -> String {
    "JSONAPISESSID".to_string()
}

fn default_session_ttl() -> u64 {
    3600
}
