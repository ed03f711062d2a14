//! # jsonapi
//!
//! Handlers which speak a small JSON envelope protocol:
//!
//! ```text
//! success:  {"data": <value>}
//! failure:  {"errors": [{"code": "<app code>", "detail": "<message>"}]}
//! ```
//!
//! A handler is an async function returning `Result<Reply, Error>`. The
//! envelope writer turns the result into the response: the status comes from
//! the [`ApiError`](core::ApiError), redirects get a `Location` header and
//! as-is errors bypass the envelope. Middlewares wrap handlers, a
//! [`ServeMux`](server::ServeMux) routes paths to them and the
//! [`Server`](server::Server) runs them on hyper.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use jsonapi::prelude::*;
//!
//! struct Greeter;
//!
//! impl HandlerSet for Greeter {
//!     fn handlers(&self) -> Vec<(&'static str, Handler)> {
//!         vec![(
//!             "SayHello",
//!             Handler::typed(|_: Context, name: String| async move {
//!                 Ok::<_, Error>(format!("hello, {name}"))
//!             }),
//!         )]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), jsonapi::ServeError> {
//!     let config = ConfigLoader::new()
//!         .with_optional_file("jsonapi.toml")?
//!         .with_default_env()
//!         .load()?;
//!
//!     let mut mux = ServeMux::new();
//!     register_all(&mut mux, "/api", &Greeter, Some(convert_camel_to_snake));
//!
//!     jsonapi::serve(&config, mux).await
//! }
//! ```
//!
//! The client side lives in [`client`]:
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), jsonapi::client::CallError> {
//! use jsonapi::client::ep;
//! use jsonapi::core::Context;
//! use reqwest::Method;
//!
//! let mut greeting = String::new();
//! ep(Method::POST, "http://127.0.0.1:8080/api/say_hello")
//!     .call(&Context::new(), Some(&"world"), &mut greeting)
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/jsonapi/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use jsonapi_core::Handler;
use jsonapi_middleware::stages::cors;
use jsonapi_middleware::{session, Middleware};

pub use jsonapi_client as client;
pub use jsonapi_config as config;
pub use jsonapi_core as core;
pub use jsonapi_middleware as middleware;
pub use jsonapi_server as server;
pub use jsonapi_telemetry as telemetry;

/// Key the configured session middleware attaches sessions under.
pub const SESSION_KEY: &str = "session";

/// Errors of [`serve`].
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// The configuration cannot be loaded.
    #[error(transparent)]
    Config(#[from] jsonapi_config::ConfigError),

    /// Logging cannot be set up.
    #[error(transparent)]
    Telemetry(#[from] jsonapi_telemetry::TelemetryError),

    /// The server failed.
    #[error(transparent)]
    Server(#[from] jsonapi_server::ServerError),
}

/// Wraps `handler` in the middlewares `config` enables.
///
/// The session middleware runs inside CORS, so preflight headers are added
/// even when loading the session fails. Sessions are read back with
/// `get_session(req, SESSION_KEY)`.
pub fn app(config: &jsonapi_config::JsonApiConfig, handler: impl Into<Handler>) -> Handler {
    let mut handler = handler.into();

    if let Some(provider) = config.session_provider() {
        handler = session(provider, SESSION_KEY).wrap(handler);
    }
    if let Some(option) = config.cors_option() {
        handler = cors(option).wrap(handler);
    }
    handler
}

/// Sets up telemetry, then serves `handler` with the configured
/// middlewares until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns [`ServeError`] if telemetry cannot be initialized or the server
/// fails to bind or run.
pub async fn serve(
    config: &jsonapi_config::JsonApiConfig,
    handler: impl Into<Handler>,
) -> Result<(), ServeError> {
    config.validate()?;
    jsonapi_telemetry::init_telemetry(&config.telemetry_config())?;

    let server = jsonapi_server::Server::new(config.server_config(), app(config, handler));
    tracing::info!(addr = %config.server.http_addr, "starting jsonapi server");
    server.run().await?;
    Ok(())
}

/// Prelude module for convenient imports.
///
/// ```rust
/// use jsonapi::prelude::*;
///
/// let h = Handler::new(|_, _| async { Ok(Reply::from("ok")) });
/// # let _ = h;
/// ```
pub mod prelude {
    pub use jsonapi_core::{
        convert_camel_to_snake, register_all, ApiError, Context, DynRequest, Error, Handler,
        HandlerResult, HandlerSet, Mux, Reply, Request, E400, E401, E403, E404, E500,
    };

    pub use jsonapi_middleware::session::get_session;
    pub use jsonapi_middleware::{Chain, FnMiddleware, Middleware};

    pub use jsonapi_server::{ServeMux, Server, ShutdownSignal};

    pub use jsonapi_config::{ConfigLoader, JsonApiConfig};
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonapi_config::JsonApiConfig;
    use jsonapi_core::{Reply, E400};
    use jsonapi_middleware::get_session;
    use jsonapi_test::TestClient;
    use serde_json::json;

    fn counter() -> Handler {
        Handler::new(|_, req| async move {
            let Some(sess) = get_session(req.as_ref(), SESSION_KEY) else {
                return Err(E400.set_data("no session").into());
            };
            let mut sess = sess.lock();
            let n = sess.get("n").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
            sess.set("n", n.into());
            sess.save()?;
            Ok(Reply::json(&n))
        })
    }

    #[tokio::test]
    async fn test_app_without_middlewares() {
        let client = TestClient::new(app(&JsonApiConfig::default(), counter()));
        let response = client.get("/").send().await;
        response.assert_error(&E400.set_data("no session"));
        assert!(response.header("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_app_with_cors_and_session() {
        let mut config = JsonApiConfig::default();
        config.cors.enabled = true;
        config.cors.origin = "https://example.com".to_string();
        config.session.enabled = true;

        let client = TestClient::new(app(&config, counter()));
        let first = client.get("/").send().await;
        first
            .assert_header("access-control-allow-origin", "https://example.com")
            .assert_data(&json!(1));

        let set_cookie = first.header_str("set-cookie").unwrap();
        let pair = set_cookie.split(';').next().unwrap();
        let (name, value) = pair.split_once('=').unwrap();
        assert_eq!(name, "JSONAPISESSID");

        client
            .get("/")
            .cookie(name, value)
            .send()
            .await
            .assert_data(&json!(2));
    }
}
