//! Call logging.
//!
//! A [`LogProvider`] receives the request, the reply and the error of each
//! call. [`log_in`] runs it for every call, [`log_err_in`] only for failed
//! ones. The bundled providers emit their line through `tracing` under the
//! `jsonapi::access` target, at `warn` for failed calls and `info` otherwise.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use jsonapi_core::{Error, Handler, Reply, TransportRequest};
use serde::Serialize;

use crate::middleware::Middleware;

/// Target of the records emitted by the bundled providers.
pub const LOG_TARGET: &str = "jsonapi::access";

/// Receives the outcome of a call. `reply` is [`Reply::Empty`] when the call
/// failed.
pub type LogProvider = Arc<dyn Fn(&TransportRequest, &Reply, Option<&Error>) + Send + Sync>;

/// The logging middleware.
#[derive(Clone)]
pub struct LogIn {
    provider: LogProvider,
    errors_only: bool,
}

impl LogIn {
    /// Logs every call with `provider`.
    #[must_use]
    pub fn new(provider: LogProvider) -> Self {
        Self {
            provider,
            errors_only: false,
        }
    }

    /// Restricts logging to failed calls.
    #[must_use]
    pub fn errors_only(mut self) -> Self {
        self.errors_only = true;
        self
    }
}

impl fmt::Debug for LogIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogIn")
            .field("errors_only", &self.errors_only)
            .finish_non_exhaustive()
    }
}

impl Middleware for LogIn {
    fn name(&self) -> &'static str {
        if self.errors_only {
            "log_err_in"
        } else {
            "log_in"
        }
    }

    fn wrap(&self, next: Handler) -> Handler {
        let this = self.clone();
        Handler::new(move |ctx, req| {
            let next = next.clone();
            let this = this.clone();
            async move {
                let result = next.call(ctx, Arc::clone(&req)).await;
                match &result {
                    Ok(reply) if !this.errors_only => (this.provider)(req.req(), reply, None),
                    Ok(_) => {}
                    Err(e) => (this.provider)(req.req(), &Reply::Empty, Some(e)),
                }
                result
            }
        })
    }
}

/// Logs every call.
#[must_use]
pub fn log_in(provider: LogProvider) -> LogIn {
    LogIn::new(provider)
}

/// Logs failed calls only.
#[must_use]
pub fn log_err_in(provider: LogProvider) -> LogIn {
    LogIn::new(provider).errors_only()
}

fn emit(line: &str, failed: bool) {
    if failed {
        tracing::warn!(target: LOG_TARGET, "{line}");
    } else {
        tracing::info!(target: LOG_TARGET, "{line}");
    }
}

fn error_text(err: Option<&Error>) -> String {
    err.map_or_else(|| "ok".to_string(), Error::log_message)
}

/// Logs the error message, preferring the origin of structured errors.
#[must_use]
pub fn simple_format() -> LogProvider {
    Arc::new(|_req, _reply, err| emit(&error_text(err), err.is_some()))
}

/// Logs `"<url>: <error>"`, preferring the origin of structured errors.
#[must_use]
pub fn basic_format() -> LogProvider {
    Arc::new(|req, _reply, err| {
        emit(&format!("{}: {}", req.uri(), error_text(err)), err.is_some());
    })
}

/// Logs a [`JsonLog`] line.
#[must_use]
pub fn json_format() -> LogProvider {
    Arc::new(|req, reply, err| {
        let entry = JsonLog::new(req, reply, err);
        match serde_json::to_string(&entry) {
            Ok(line) => emit(&line, err.is_some()),
            Err(e) => tracing::error!(target: LOG_TARGET, error = %e, "failed to encode log entry"),
        }
    })
}

/// Everything [`json_format`] logs about a call.
#[derive(Debug, Serialize)]
pub struct JsonLog<'a> {
    /// Request method.
    pub request_method: String,
    /// Full request URI.
    pub request_url: String,
    /// Request headers; values which are not visible ASCII are skipped.
    pub request_header: BTreeMap<String, Vec<String>>,
    /// `Host` header, or the URI authority.
    pub request_host: String,
    /// Peer address, empty when unknown.
    pub request_remote_addr: String,
    /// Request cookies.
    pub cookies: BTreeMap<String, String>,
    /// The reply.
    pub reply_data: &'a Reply,
    /// The error, origin preferred.
    pub reply_error: Option<String>,
}

impl<'a> JsonLog<'a> {
    /// Collects the entry.
    #[must_use]
    pub fn new(req: &TransportRequest, reply: &'a Reply, err: Option<&Error>) -> Self {
        let mut request_header: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in req.headers() {
            if let Ok(v) = value.to_str() {
                request_header
                    .entry(name.as_str().to_string())
                    .or_default()
                    .push(v.to_string());
            }
        }

        Self {
            request_method: req.method().to_string(),
            request_url: req.uri().to_string(),
            request_header,
            request_host: req.host().unwrap_or_default().to_string(),
            request_remote_addr: req.remote_addr().map(|a| a.to_string()).unwrap_or_default(),
            cookies: req
                .cookies()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            reply_data: reply,
            reply_error: err.map(Error::log_message),
        }
    }
}
