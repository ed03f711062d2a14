//! Test error types.

use std::fmt;

/// Errors of building test requests or reading test responses.
#[derive(Debug)]
pub enum TestError {
    /// The request cannot be built.
    RequestBuild(String),
    /// The body is not what was asked for.
    BodyRead(String),
    /// JSON encoding or decoding failed.
    Json(serde_json::Error),
    /// A header name or value is invalid.
    InvalidHeader(String),
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestBuild(msg) => write!(f, "request build error: {msg}"),
            Self::BodyRead(msg) => write!(f, "body read error: {msg}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
            Self::InvalidHeader(msg) => write!(f, "invalid header: {msg}"),
        }
    }
}

impl std::error::Error for TestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TestError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
