//! Server errors.

use thiserror::Error;

/// Errors which stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be created.
    #[error("bind error: {0}")]
    Bind(String),

    /// An I/O failure outside of a single connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
