//! Endpoints: how the request of one API is built.

use std::fmt;
use std::sync::{Arc, OnceLock};

use jsonapi_core::Context;
use reqwest::Method;
use serde_json::Value;

use crate::encoder::default_encoder;
use crate::error::CallError;
use crate::sender::{default_parser, Caller, Sender};

type MakeRequest =
    dyn Fn(&Context, Option<&Value>) -> Result<reqwest::Request, CallError> + Send + Sync;

/// Builds the request of an API from the call parameter.
///
/// Write your own endpoint when the API needs more than a JSON body, e.g. a
/// signature computed over the encoded body:
///
/// ```
/// use jsonapi_client::{sorted_encoder, CallError, Endpoint};
/// use reqwest::Method;
///
/// let signed = Endpoint::new(|_ctx, param| {
///     let body = match param {
///         Some(p) => sorted_encoder().encode(p).map_err(CallError::Client)?,
///         None => Vec::new(),
///     };
///     let url = reqwest::Url::parse("http://127.0.0.1:8080/api/order")
///         .map_err(CallError::client)?;
///     let mut req = reqwest::Request::new(Method::POST, url);
///     req.headers_mut().insert("x-body-len", body.len().into());
///     *req.body_mut() = Some(body.into());
///     Ok(req)
/// });
/// # let _ = signed;
/// ```
#[derive(Clone)]
pub struct Endpoint(Arc<MakeRequest>);

impl Endpoint {
    /// Creates an endpoint from a request building function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context, Option<&Value>) -> Result<reqwest::Request, CallError>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(f))
    }

    /// Builds the request for `param`.
    ///
    /// # Errors
    ///
    /// Returns whatever the building function fails with.
    pub fn request(
        &self,
        ctx: &Context,
        param: Option<&Value>,
    ) -> Result<reqwest::Request, CallError> {
        (self.0)(ctx, param)
    }

    /// Returns an endpoint passing every built request through `f`, e.g. to
    /// add an auth header.
    #[must_use]
    pub fn with<F>(&self, f: F) -> Self
    where
        F: Fn(reqwest::Request) -> Result<reqwest::Request, CallError> + Send + Sync + 'static,
    {
        let inner = self.clone();
        Self::new(move |ctx, param| f(inner.request(ctx, param)?))
    }

    /// Sends the requests with `client`, or with a shared default client.
    #[must_use]
    pub fn send_by(&self, client: Option<reqwest::Client>) -> Sender {
        Sender::new(self.clone(), client.unwrap_or_else(default_client))
    }

    /// Shortcut of `send_by(None).parse_with(default_parser())`.
    #[must_use]
    pub fn default_caller(&self) -> Caller {
        self.send_by(None).parse_with(default_parser())
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint").finish_non_exhaustive()
    }
}

/// Creates an endpoint with the default encoder.
pub fn new_ep(method: Method, url: impl Into<String>) -> Endpoint {
    default_encoder().endpoint(method, url)
}

/// Creates a caller suitable for servers built with jsonapi:
///
/// - a parameter is sent as JSON with `Content-Type: application/json`,
/// - the request goes through the shared default client,
/// - the response is parsed by [`default_parser`].
///
/// ```no_run
/// # async fn run() -> Result<(), jsonapi_client::CallError> {
/// use jsonapi_client::ep;
/// use jsonapi_core::Context;
/// use reqwest::Method;
///
/// let mut greeting = String::new();
/// ep(Method::POST, "http://127.0.0.1:8080/api/greet")
///     .call(&Context::new(), Some(&"world"), &mut greeting)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub fn ep(method: Method, url: impl Into<String>) -> Caller {
    new_ep(method, url).default_caller()
}

pub(crate) fn default_client() -> reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(reqwest::Client::new).clone()
}
