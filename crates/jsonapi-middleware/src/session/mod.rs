//! Sessions.
//!
//! The [`session`] middleware asks a [`SessionProvider`] for the session of
//! each request and attaches it under a key. Handlers read it back with
//! [`get_session`]:
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use jsonapi_core::{Handler, Reply};
//! use jsonapi_middleware::session::{
//!     get_session, session, InCookieSimple, MemoryStore, StoreProvider,
//! };
//! use jsonapi_middleware::Middleware;
//!
//! let provider = StoreProvider::new(
//!     Arc::new(InCookieSimple::new("sid")),
//!     Arc::new(MemoryStore::new()),
//!     Duration::from_secs(3600),
//! );
//!
//! let h = session(Arc::new(provider), "session").wrap(Handler::new(|_, req| async move {
//!     if let Some(sess) = get_session(req.as_ref(), "session") {
//!         let mut sess = sess.lock();
//!         sess.set("visited", true.into());
//!         sess.save()?;
//!     }
//!     Ok(Reply::Empty)
//! }));
//! # let _ = h;
//! ```
//!
//! Session data is not meant to be shared between calls. The handle is
//! locked for the duration of each access.

mod id;
mod memory;
mod store;

use std::collections::HashMap;
use std::sync::Arc;

use jsonapi_core::{Error, Handler, Request};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error as ThisError;

use crate::middleware::Middleware;

pub use id::{Encrypter, IdHandler, InCookie, InCookieSimple, InHeader};
pub use memory::MemoryStore;
pub use store::{Store, StoreProvider};

/// Errors of session providers and stores.
#[derive(Debug, ThisError)]
pub enum SessionError {
    /// No session is stored under the id.
    #[error("session not exists: {0}")]
    NotFound(String),

    /// The session timed out.
    #[error("session expired: {0}")]
    Expired(String),

    /// The session id sent by the client cannot be decoded.
    #[error("invalid session id: {0}")]
    InvalidId(String),

    /// Any other storage failure.
    #[error("session store failure: {0}")]
    Store(String),
}

impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        Error::other(e)
    }
}

/// A stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalData {
    /// The value.
    pub val: Value,
    /// Whether the value is removed when read.
    pub once: bool,
}

/// The content of a session.
pub type SessionValues = HashMap<String, InternalData>;

/// Access to the data of one session.
pub trait SessionData: Send {
    /// The session id.
    fn id(&self) -> &str;

    /// Deletes a value.
    fn unset(&mut self, key: &str);

    /// Sets a value.
    fn set(&mut self, key: &str, val: Value);

    /// Sets a value that can be read once.
    fn set_once(&mut self, key: &str, val: Value);

    /// Reads a value. Values set with [`set_once`](Self::set_once) are
    /// removed.
    fn get(&mut self, key: &str) -> Option<Value>;

    /// Writes the data back and passes the id to the client.
    fn save(&mut self) -> Result<(), SessionError>;

    /// Abandons the session.
    fn discard(&mut self) -> Result<(), SessionError>;
}

/// Allocates sessions. Implementations must be thread-safe.
pub trait SessionProvider: Send + Sync {
    /// Returns the session of `req`, creating one if needed.
    fn get(&self, req: &dyn Request) -> Result<Box<dyn SessionData>, SessionError>;

    /// Deletes outdated sessions. No-op by default.
    fn gc(&self) {}
}

/// A session attached to a request.
pub type SessionHandle = Arc<Mutex<Box<dyn SessionData>>>;

/// Attaches the session of each request under a key.
#[derive(Clone)]
pub struct SessionMiddleware {
    provider: Arc<dyn SessionProvider>,
    key: Arc<str>,
}

impl std::fmt::Debug for SessionMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMiddleware")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl Middleware for SessionMiddleware {
    fn name(&self) -> &'static str {
        "session"
    }

    fn wrap(&self, next: Handler) -> Handler {
        let this = self.clone();
        Handler::new(move |ctx, req| {
            let next = next.clone();
            let this = this.clone();
            async move {
                let req = match this.provider.get(req.as_ref()) {
                    Ok(data) => {
                        let handle: SessionHandle = Arc::new(Mutex::new(data));
                        req.with_value(&this.key, handle)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, key = %this.key, "failed to load session");
                        req
                    }
                };
                next.call(ctx, req).await
            }
        })
    }
}

/// Creates the session middleware.
///
/// A provider failure is logged and the call proceeds without a session.
pub fn session(provider: Arc<dyn SessionProvider>, key: &str) -> SessionMiddleware {
    SessionMiddleware {
        provider,
        key: Arc::from(key),
    }
}

/// Returns the session attached under `key`.
pub fn get_session(req: &dyn Request, key: &str) -> Option<SessionHandle> {
    req.req().value::<Mutex<Box<dyn SessionData>>>(key)
}
