//! Typed configuration for jsonapi services.
//!
//! A [`JsonApiConfig`] is loaded in layers by [`ConfigLoader`]: defaults,
//! then a TOML or JSON file, then `PREFIX__SECTION__KEY` environment
//! variables. Unknown fields are errors and the result is validated.
//!
//! ```no_run
//! use jsonapi_config::ConfigLoader;
//!
//! # fn main() -> Result<(), jsonapi_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("jsonapi.toml")?
//!     .with_env_prefix("JSONAPI")
//!     .load()?;
//!
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # File format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! shutdown_timeout_secs = 30
//! request_timeout_ms = 30000
//! max_body_bytes = 4194304
//!
//! [telemetry]
//! service_name = "orders"
//! environment = "production"
//! metrics_enabled = true
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [cors]
//! enabled = true
//! origin = "https://example.com"
//! max_age_secs = 600
//!
//! [session]
//! enabled = true
//! id_location = "cookie"
//! name = "JSONAPISESSID"
//! ttl_secs = 3600
//! ```
//!
//! The sections convert to the settings of the other crates:
//! [`JsonApiConfig::server_config`], [`JsonApiConfig::telemetry_config`],
//! [`JsonApiConfig::cors_option`] and [`JsonApiConfig::session_provider`].

#![doc(html_root_url = "https://docs.rs/jsonapi-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::JsonApiConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::*;
