//! Errors of outbound calls.

use jsonapi_core::{ApiError, CancelReason};
use thiserror::Error;

/// A boxed error carried as the origin of a [`CallError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a call failed.
#[derive(Debug, Error)]
pub enum CallError {
    /// The response could not be parsed. Happens after the request was sent.
    #[error("cannot parse response from api server: {0}")]
    Format(#[source] BoxError),

    /// Something went wrong on this side: the request could not be built,
    /// or the returned data does not fit the result type.
    #[error("there's something wrong at client side: {0}")]
    Client(#[source] BoxError),

    /// The request could not be delivered.
    #[error("failed to send request: {0}")]
    Send(#[from] reqwest::Error),

    /// The call context ended before a response arrived.
    #[error("call {0}")]
    Canceled(CancelReason),

    /// The server replied with an error object.
    #[error(transparent)]
    Api(jsonapi_core::Error),
}

impl CallError {
    /// Creates a [`CallError::Format`].
    pub fn format(origin: impl Into<BoxError>) -> Self {
        Self::Format(origin.into())
    }

    /// Creates a [`CallError::Client`].
    pub fn client(origin: impl Into<BoxError>) -> Self {
        Self::Client(origin.into())
    }

    /// Returns the server error if it carried an application code.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => e.api_error(),
            _ => None,
        }
    }

    /// Returns `true` for [`CallError::Format`].
    #[must_use]
    pub const fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }

    /// Returns `true` for [`CallError::Client`].
    #[must_use]
    pub const fn is_client(&self) -> bool {
        matches!(self, Self::Client(_))
    }
}
