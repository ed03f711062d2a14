//! Layered configuration loading.
//!
//! Later layers override earlier ones: defaults, then a file, then
//! environment variables.

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::{ConfigError, IdLocation, JsonApiConfig, LogFormat};

/// Prefix of the override variables unless another one is given.
pub const DEFAULT_ENV_PREFIX: &str = "JSONAPI";

/// Loads a [`JsonApiConfig`] layer by layer.
///
/// ```no_run
/// use jsonapi_config::ConfigLoader;
///
/// # fn main() -> Result<(), jsonapi_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("jsonapi.toml")?
///     .with_dotenv()?
///     .with_env_prefix("JSONAPI")
///     .load()?;
/// # let _ = config;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: JsonApiConfig,
    env_prefix: Option<String>,
    file_loaded: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: JsonApiConfig::default(),
            env_prefix: None,
            file_loaded: false,
        }
    }

    /// Resets to the defaults.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = JsonApiConfig::default();
        self
    }

    /// Starts from [`JsonApiConfig::development`].
    ///
    /// ```
    /// use jsonapi_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = JsonApiConfig::development();
        self
    }

    /// Starts from [`JsonApiConfig::production`].
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = JsonApiConfig::production();
        self
    }

    /// Loads a `.toml` or `.json` file.
    ///
    /// The file replaces the configuration so far. Fields it does not set
    /// take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, unreadable, has an
    /// unknown extension, or does not parse. Unknown fields fail too.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let file_config = Self::parse_file(&content, path)?;
        self.config = file_config;
        self.file_loaded = true;
        tracing::debug!(path = %path.display(), "configuration file loaded");

        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    ///
    /// # Errors
    ///
    /// See [`with_file`](Self::with_file).
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration text in `format`, `"toml"` or `"json"`.
    ///
    /// ```
    /// use jsonapi_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [server]
    ///     http_addr = "127.0.0.1:3000"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown format or a parse failure.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Enables overrides from variables named `PREFIX__SECTION__KEY`, e.g.
    /// `JSONAPI__SERVER__HTTP_ADDR` or `JSONAPI__TELEMETRY__LOGGING__LEVEL`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Enables overrides with [`DEFAULT_ENV_PREFIX`].
    #[must_use]
    pub fn with_default_env(self) -> Self {
        self.with_env_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Loads `.env` from the current directory or its parents, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Dotenv`] if a file is found but malformed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "dotenv file loaded"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }
        Ok(self)
    }

    /// Loads a specific dotenv file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Dotenv`] if the file is missing or malformed.
    pub fn with_dotenv_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        dotenvy::from_path(path.as_ref())?;
        Ok(self)
    }

    /// Whether a file was loaded.
    pub fn file_loaded(&self) -> bool {
        self.file_loaded
    }

    /// Applies the environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an override does not parse or the result
    /// is invalid.
    pub fn load(mut self) -> Result<JsonApiConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration as it is, without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> JsonApiConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<JsonApiConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let mut vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();
        vars.sort();

        for (key, value) in vars {
            self.apply_env_var(&key, &value, prefix)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(rest) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            // Another variable sharing the prefix, e.g. JSONAPI_HOME.
            return Ok(());
        };

        let parts: Vec<&str> = rest.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                config.server.shutdown_timeout_secs = parse_number(key, value)?;
            }
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                config.server.request_timeout_ms = parse_number(key, value)?;
            }
            ["SERVER", "MAX_BODY_BYTES"] => {
                config.server.max_body_bytes = parse_number(key, value)?;
            }

            ["TELEMETRY", "SERVICE_NAME"] => config.telemetry.service_name = value.to_string(),
            ["TELEMETRY", "ENVIRONMENT"] => config.telemetry.environment = value.to_string(),
            ["TELEMETRY", "METRICS_ENABLED"] => {
                config.telemetry.metrics_enabled = parse_flag(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                config.telemetry.logging.enabled = parse_flag(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => config.telemetry.logging.level = value.to_string(),
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "LOGGING", "ANSI_ENABLED"] => {
                config.telemetry.logging.ansi_enabled = parse_flag(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "INCLUDE_LOCATION"] => {
                config.telemetry.logging.include_location = parse_flag(key, value)?;
            }

            ["CORS", "ENABLED"] => config.cors.enabled = parse_flag(key, value)?,
            ["CORS", "ORIGIN"] => config.cors.origin = value.to_string(),
            ["CORS", "METHODS"] => config.cors.methods = parse_list(value),
            ["CORS", "HEADERS"] => config.cors.headers = parse_list(value),
            ["CORS", "EXPOSE_HEADERS"] => config.cors.expose_headers = parse_list(value),
            ["CORS", "MAX_AGE_SECS"] => config.cors.max_age_secs = parse_number(key, value)?,
            ["CORS", "CREDENTIAL"] => config.cors.credential = parse_flag(key, value)?,

            ["SESSION", "ENABLED"] => config.session.enabled = parse_flag(key, value)?,
            ["SESSION", "ID_LOCATION"] => {
                config.session.id_location = match value.to_lowercase().as_str() {
                    "cookie" => IdLocation::Cookie,
                    "header" => IdLocation::Header,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'cookie' or 'header'",
                        ))
                    }
                };
            }
            ["SESSION", "NAME"] => config.session.name = value.to_string(),
            ["SESSION", "TTL_SECS"] => config.session.ttl_secs = parse_number(key, value)?,
            ["SESSION", "SECURE"] => config.session.secure = parse_flag(key, value)?,
            ["SESSION", "AUTO_REFRESH"] => config.session.auto_refresh = parse_flag(key, value)?,

            _ => {
                return Err(ConfigError::env_parse_error(key, "unknown configuration key"));
            }
        }

        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

// Comma separated, blanks dropped.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loader_defaults() {
        let config = ConfigLoader::new().with_defaults().load().unwrap();
        assert_eq!(config, JsonApiConfig::default());
    }

    #[test]
    fn test_loader_with_production() {
        let config = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(config.telemetry.logging.format, LogFormat::Json);
        assert!(config.session.secure);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"server": {"http_addr": "127.0.0.1:3000"}, "cors": {"enabled": true}}"#;

        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:3000");
        assert!(config.cors.enabled);
        assert_eq!(config.server.max_body_bytes, 4 << 20);
    }

    #[test]
    fn test_loader_with_string_unknown_format() {
        let err = ConfigLoader::new().with_string("", "yaml").unwrap_err();
        assert!(err.to_string().contains("yaml"));
    }

    #[test]
    fn test_loader_rejects_unknown_fields() {
        let err = ConfigLoader::new()
            .with_string("[server]\nmax_connections = 10\n", "toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::TomlError(_)));
    }

    #[test]
    fn test_loader_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [server]
            request_timeout_ms = 1500

            [session]
            enabled = true
            id_location = "header"
            name = "X-Session"
            "#
        )
        .unwrap();

        let loader = ConfigLoader::new().with_file(file.path()).unwrap();
        assert!(loader.file_loaded());

        let config = loader.load().unwrap();
        assert_eq!(config.server.request_timeout_ms, 1500);
        assert_eq!(config.session.id_location, IdLocation::Header);
        assert_eq!(config.session.name, "X-Session");
    }

    #[test]
    fn test_loader_with_file_bad_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = ConfigLoader::new().with_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let err = ConfigLoader::new()
            .with_file("/nonexistent/jsonapi.toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let loader = ConfigLoader::new()
            .with_optional_file("/nonexistent/jsonapi.toml")
            .unwrap();
        assert!(!loader.file_loaded());
        assert_eq!(loader.load().unwrap().server.http_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_loader_validates() {
        let err = ConfigLoader::new()
            .with_string("[server]\nmax_body_bytes = 0\n", "toml")
            .unwrap()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("Off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("GET, POST,,"), vec!["GET", "POST"]);
        assert!(parse_list(" ").is_empty());
    }

    // Process environment is shared between tests, so overrides are
    // exercised through apply_env_var.

    #[test]
    fn test_apply_env_var_server() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__SERVER__HTTP_ADDR", "127.0.0.1:9000", "TEST").unwrap();
        loader.apply_env_var("TEST__SERVER__MAX_BODY_BYTES", "1024", "TEST").unwrap();
        assert_eq!(loader.config.server.http_addr, "127.0.0.1:9000");
        assert_eq!(loader.config.server.max_body_bytes, 1024);
    }

    #[test]
    fn test_apply_env_var_telemetry() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__TELEMETRY__SERVICE_NAME", "orders", "TEST").unwrap();
        loader.apply_env_var("TEST__TELEMETRY__METRICS_ENABLED", "no", "TEST").unwrap();
        loader.apply_env_var("TEST__TELEMETRY__LOGGING__FORMAT", "Pretty", "TEST").unwrap();
        assert_eq!(loader.config.telemetry.service_name, "orders");
        assert!(!loader.config.telemetry.metrics_enabled);
        assert_eq!(loader.config.telemetry.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_apply_env_var_cors_and_session() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__CORS__ENABLED", "1", "TEST").unwrap();
        loader.apply_env_var("TEST__CORS__METHODS", "GET,POST", "TEST").unwrap();
        loader.apply_env_var("TEST__SESSION__ID_LOCATION", "header", "TEST").unwrap();
        loader.apply_env_var("TEST__SESSION__TTL_SECS", "60", "TEST").unwrap();

        let config = loader.load_unvalidated();
        assert!(config.cors.enabled);
        assert_eq!(config.cors.methods, vec!["GET", "POST"]);
        assert_eq!(config.session.id_location, IdLocation::Header);
        assert_eq!(config.session.ttl_secs, 60);
    }

    #[test]
    fn test_apply_env_var_errors() {
        let mut loader = ConfigLoader::new();
        assert!(loader
            .apply_env_var("TEST__SERVER__SHUTDOWN_TIMEOUT_SECS", "soon", "TEST")
            .is_err());
        assert!(loader.apply_env_var("TEST__SESSION__SECURE", "maybe", "TEST").is_err());
        assert!(loader.apply_env_var("TEST__SERVER__PORT", "80", "TEST").is_err());

        // Not an override at all.
        assert!(loader.apply_env_var("TEST_HOME", "/srv", "TEST").is_ok());
    }

    #[test]
    fn test_with_dotenv_file_missing() {
        let err = ConfigLoader::new()
            .with_dotenv_file("/nonexistent/.env")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Dotenv(_)));
    }
}
