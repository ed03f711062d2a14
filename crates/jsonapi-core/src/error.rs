//! Error types for jsonapi handlers.
//!
//! Handlers fail with an [`Error`], which is one of three things:
//!
//! - [`Error::Api`] wraps an [`ApiError`], a structured client-facing error that
//!   carries an HTTP status, a message, an application error code and (for
//!   301~303) a redirect location.
//! - [`Error::AsIs`] carries a [`Reply`] that must be written to the client
//!   verbatim, skipping the envelope.
//! - [`Error::Other`] is any other failure. It is always reported to the client
//!   as an opaque `500` with only its message exposed.
//!
//! # Templates
//!
//! [`ApiError`] values are immutable. Predefined templates such as [`E404`] can
//! be specialized per call site without affecting other callers, because every
//! setter returns a new value:
//!
//! ```
//! use jsonapi_core::{E404, ApiError};
//!
//! let err = E404.set_data("User not found").set_code("no-user");
//! assert_eq!(err.code(), 404);
//! assert_eq!(err.data(), "User not found");
//! assert_eq!(E404.data(), "Resource not found");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handler::Reply;

/// A diagnostic error attached to an [`ApiError`]. Never sent to clients.
pub type Origin = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// A structured error which maps to an HTTP status and the `errors` envelope.
///
/// Two codes are special:
///
/// - `200` ([`APPERR`]) reports an application-level error with a normal status.
/// - `-1` ([`ASIS`]) marks the reply as raw output, see [`Error::AsIs`].
#[derive(Clone, Debug)]
pub struct ApiError {
    code: i32,
    message: Cow<'static, str>,
    location: Cow<'static, str>,
    err_code: Cow<'static, str>,
    origin: Option<Origin>,
}

impl ApiError {
    /// Creates a template with a status code and a default message.
    #[must_use]
    pub const fn new(code: i32, message: &'static str) -> Self {
        Self {
            code,
            message: Cow::Borrowed(message),
            location: Cow::Borrowed(""),
            err_code: Cow::Borrowed(""),
            origin: None,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// Returns the user defined error message.
    #[must_use]
    pub fn data(&self) -> &str {
        &self.message
    }

    /// Returns the redirect location, empty unless set on a 301~303 error.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Returns the application defined error code.
    #[must_use]
    pub fn err_code(&self) -> &str {
        &self.err_code
    }

    /// Returns the wrapped origin error, if any.
    #[must_use]
    pub fn origin(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.origin.as_deref()
    }

    /// Returns a new error with the message or the redirect location replaced.
    ///
    /// For 301, 302 and 303 the data is a URL and becomes the redirect
    /// location; for every other code it becomes the message.
    ///
    /// ```
    /// use jsonapi_core::{E302, E400};
    ///
    /// assert_eq!(E302.set_data("/login").location(), "/login");
    /// assert_eq!(E400.set_data("bad id").data(), "bad id");
    /// ```
    #[must_use]
    pub fn set_data(&self, data: impl Into<String>) -> Self {
        let mut ret = self.clone();
        if (301..=303).contains(&self.code) {
            ret.location = Cow::Owned(data.into());
        } else {
            ret.message = Cow::Owned(data.into());
        }
        ret
    }

    /// Returns a new error with the application defined error code replaced.
    #[must_use]
    pub fn set_code(&self, code: impl Into<String>) -> Self {
        let mut ret = self.clone();
        ret.err_code = Cow::Owned(code.into());
        ret
    }

    /// Returns a new error which preserves `err` as its origin.
    #[must_use]
    pub fn set_origin(&self, err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        let mut ret = self.clone();
        ret.origin = Some(Arc::from(err.into()));
        ret
    }

    /// Tells if two errors represent the same kind of error.
    ///
    /// Every client visible field is compared; the origin is ignored.
    #[must_use]
    pub fn equal_to(&self, other: &ApiError) -> bool {
        self.code == other.code
            && self.message == other.message
            && self.location == other.location
            && self.err_code == other.err_code
    }

    /// Returns `true` for a 301~303 error that has a redirect location.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (301..=303).contains(&self.code) && !self.location.is_empty()
    }

    /// Like `Display`, with the origin error appended when present.
    #[must_use]
    pub fn full_message(&self) -> String {
        match &self.origin {
            Some(origin) => format!("{self}: {origin}"),
            None => self.to_string(),
        }
    }

    /// Converts this error into its wire representation.
    #[must_use]
    pub fn to_err_obj(&self) -> ErrObj {
        ErrObj {
            code: self.err_code.to_string(),
            detail: self.message.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if !self.location.is_empty() {
            write!(f, ": {}", self.location)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.origin
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl PartialEq for ApiError {
    fn eq(&self, other: &Self) -> bool {
        self.equal_to(other)
    }
}

impl Eq for ApiError {}

// Predefined templates. Call `set_data` / `set_code` to specialize them:
//
//     return Err(E404.set_data("User not found").into());
//
// There's no need to use E500 for internal failures; any other error is
// reported as 500 already.

/// Unknown error (code 0).
pub const EUNKNOWN: ApiError = ApiError::new(0, "Unknown error");
/// 301 Moved Permanently.
pub const E301: ApiError = ApiError::new(301, "Resource has been moved permanently");
/// 302 Found.
pub const E302: ApiError = ApiError::new(302, "Resource has been found at another location");
/// 303 See Other.
pub const E303: ApiError = ApiError::new(303, "See other");
/// 304 Not Modified.
pub const E304: ApiError = ApiError::new(304, "Not modified");
/// 307 Temporary Redirect.
pub const E307: ApiError = ApiError::new(
    307,
    "Resource has been moved to another location temporarily",
);
/// 400 Bad Request.
pub const E400: ApiError = ApiError::new(400, "Error parsing request");
/// 401 Unauthorized.
pub const E401: ApiError = ApiError::new(
    401,
    "You have to be authorized before accessing this resource",
);
/// 403 Forbidden.
pub const E403: ApiError = ApiError::new(403, "You have no right to access this resource");
/// 404 Not Found.
pub const E404: ApiError = ApiError::new(404, "Resource not found");
/// 408 Request Timeout.
pub const E408: ApiError = ApiError::new(408, "Request timeout");
/// 409 Conflict.
pub const E409: ApiError = ApiError::new(409, "Conflict");
/// 410 Gone.
pub const E410: ApiError = ApiError::new(410, "Gone");
/// 413 Payload Too Large.
pub const E413: ApiError = ApiError::new(413, "Request entity too large");
/// 415 Unsupported Media Type.
pub const E415: ApiError = ApiError::new(415, "Unsupported media type");
/// 418 I'm a teapot.
pub const E418: ApiError = ApiError::new(418, "I'm a teapot");
/// 426 Upgrade Required.
pub const E426: ApiError = ApiError::new(426, "Upgrade required");
/// 429 Too Many Requests.
pub const E429: ApiError = ApiError::new(429, "Too many requests");
/// 500 Internal Server Error.
pub const E500: ApiError = ApiError::new(500, "Internal server error");
/// 501 Not Implemented.
pub const E501: ApiError = ApiError::new(501, "Not implemented");
/// 502 Bad Gateway.
pub const E502: ApiError = ApiError::new(502, "Bad gateway");
/// 503 Service Unavailable.
pub const E503: ApiError = ApiError::new(503, "Service unavailable");
/// 504 Gateway Timeout.
pub const E504: ApiError = ApiError::new(504, "Gateway timeout");

/// Application defined error, replied with status 200.
pub const APPERR: ApiError = ApiError::new(200, "");

/// Marks a reply that must be written as-is, without the envelope.
///
/// Use [`Error::as_is`] to return the raw payload together with this marker.
/// The status code and any headers must be set by the handler itself.
pub const ASIS: ApiError = ApiError::new(-1, "");

/// The error type returned by handlers and middlewares.
#[derive(Debug, Error)]
pub enum Error {
    /// A structured, client facing error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Raw output which bypasses the envelope.
    #[error("{}", ASIS)]
    AsIs(Reply),

    /// Any other failure, reported to clients as 500.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates a generic error from a message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::Other(anyhow::Error::msg(message))
    }

    /// Creates a generic error from another error type.
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(anyhow::Error::new(err))
    }

    /// Creates an as-is reply, see [`ASIS`].
    pub fn as_is(reply: impl Into<Reply>) -> Self {
        Self::AsIs(reply.into())
    }

    /// Returns the [`ApiError`] if this is a structured error.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` if this error requests raw output.
    #[must_use]
    pub fn is_as_is(&self) -> bool {
        match self {
            Self::AsIs(_) => true,
            Self::Api(e) => e.equal_to(&ASIS),
            Self::Other(_) => false,
        }
    }

    /// Returns `true` if this is a structured error equal to `template`.
    #[must_use]
    pub fn is(&self, template: &ApiError) -> bool {
        self.api_error().is_some_and(|e| e.equal_to(template))
    }

    /// Returns the error to report in logs: the origin of a structured error
    /// when it has one, this error otherwise.
    #[must_use]
    pub fn log_message(&self) -> String {
        match self {
            Self::Api(e) => e
                .origin()
                .map_or_else(|| e.to_string(), ToString::to_string),
            _ => self.to_string(),
        }
    }
}

/// Wraps `origin` into `template` and returns it as a failed result.
///
/// ```
/// use jsonapi_core::{failed, E400, HandlerResult};
///
/// fn parse(id: &str) -> HandlerResult {
///     match id.parse::<u64>() {
///         Ok(id) => Ok(id.to_string().into()),
///         Err(e) => failed(e, E400.set_data("invalid id")),
///     }
/// }
///
/// let err = parse("x").unwrap_err();
/// assert!(err.is(&E400.set_data("invalid id")));
/// ```
pub fn failed<T>(
    origin: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    template: ApiError,
) -> Result<T, Error> {
    Err(Error::Api(template.set_origin(origin)))
}

/// Wire representation of an error inside the `errors` array.
///
/// For an [`ApiError`], `code` is its application error code and `detail` is
/// its message. For other errors only `detail` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrObj {
    /// Application defined error code.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    /// Human readable message.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

impl ErrObj {
    /// Builds the wire object for a generic error.
    #[must_use]
    pub fn from_message(detail: impl Into<String>) -> Self {
        Self {
            code: String::new(),
            detail: detail.into(),
        }
    }

    /// Converts a decoded error object back into an [`Error`].
    ///
    /// An [`ApiError`] (code 0) is returned if `code` is set, a generic error
    /// with `detail` as its message otherwise.
    #[must_use]
    pub fn as_error(&self) -> Error {
        if self.code.is_empty() {
            return Error::msg(self.detail.clone());
        }

        Error::Api(ApiError {
            code: 0,
            message: Cow::Owned(self.detail.clone()),
            location: Cow::Borrowed(""),
            err_code: Cow::Owned(self.code.clone()),
            origin: None,
        })
    }
}

/// Failure to decode the request payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The request carries no body.
    #[error("request body is empty")]
    Empty,

    /// The body is not valid JSON for the requested type.
    #[error("malformed request body: {0}")]
    Malformed(#[from] serde_json::Error),
}
