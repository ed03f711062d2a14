//! Store-backed sessions.

use std::sync::Arc;
use std::time::Duration;

use jsonapi_core::{Request, ResponseWriter};
use serde_json::Value;

use super::id::IdHandler;
use super::{InternalData, SessionData, SessionError, SessionProvider, SessionValues};

/// Persists session data.
pub trait Store: Send + Sync {
    /// Allocates a new session id, valid for `ttl` after each use.
    fn create(&self, ttl: Duration) -> Result<String, SessionError>;

    /// Loads session data. Refreshes the expiry.
    fn get(&self, id: &str) -> Result<SessionValues, SessionError>;

    /// Replaces session data. Refreshes the expiry.
    fn set(&self, id: &str, data: SessionValues) -> Result<(), SessionError>;

    /// Deletes a session.
    fn unset(&self, id: &str) -> Result<(), SessionError>;

    /// Deletes expired sessions. No-op by default.
    fn gc(&self) {}
}

/// A [`SessionProvider`] keeping data in a [`Store`] and the id on the
/// client through an [`IdHandler`].
#[derive(Clone)]
pub struct StoreProvider {
    id_handler: Arc<dyn IdHandler>,
    store: Arc<dyn Store>,
    ttl: Duration,
}

impl StoreProvider {
    /// Creates the provider. New sessions live for `ttl` after last use.
    pub fn new(id_handler: Arc<dyn IdHandler>, store: Arc<dyn Store>, ttl: Duration) -> Self {
        Self {
            id_handler,
            store,
            ttl,
        }
    }

    fn load(&self, req: &dyn Request) -> Result<StoreSession, SessionError> {
        let known = self.id_handler.get(req).filter(|id| !id.is_empty());

        let (id, data) = match known {
            Some(id) => match self.store.get(&id) {
                Ok(data) => (id, data),
                Err(SessionError::NotFound(_) | SessionError::Expired(_)) => {
                    tracing::debug!("client session is gone, starting a new one");
                    self.fresh()?
                }
                Err(e) => return Err(e),
            },
            None => self.fresh()?,
        };

        Ok(StoreSession {
            id,
            data,
            store: Arc::clone(&self.store),
            id_handler: Arc::clone(&self.id_handler),
            resp: req.resp().clone(),
        })
    }

    fn fresh(&self) -> Result<(String, SessionValues), SessionError> {
        let id = self.store.create(self.ttl)?;
        let data = self.store.get(&id)?;
        Ok((id, data))
    }
}

impl std::fmt::Debug for StoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreProvider")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionProvider for StoreProvider {
    fn get(&self, req: &dyn Request) -> Result<Box<dyn SessionData>, SessionError> {
        let result = self.load(req);
        self.gc();
        Ok(Box::new(result?))
    }

    fn gc(&self) {
        self.store.gc();
    }
}

struct StoreSession {
    id: String,
    data: SessionValues,
    store: Arc<dyn Store>,
    id_handler: Arc<dyn IdHandler>,
    resp: ResponseWriter,
}

impl SessionData for StoreSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn unset(&mut self, key: &str) {
        self.data.remove(key);
    }

    fn set(&mut self, key: &str, val: Value) {
        self.data
            .insert(key.to_string(), InternalData { val, once: false });
    }

    fn set_once(&mut self, key: &str, val: Value) {
        self.data
            .insert(key.to_string(), InternalData { val, once: true });
    }

    fn get(&mut self, key: &str) -> Option<Value> {
        let once = self.data.get(key)?.once;
        if once {
            return self.data.remove(key).map(|d| d.val);
        }
        self.data.get(key).map(|d| d.val.clone())
    }

    fn save(&mut self) -> Result<(), SessionError> {
        self.store.set(&self.id, self.data.clone())?;
        self.id_handler.set(&self.resp, &self.id)
    }

    fn discard(&mut self) -> Result<(), SessionError> {
        self.store.unset(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{InCookieSimple, InHeader, MemoryStore};
    use bytes::Bytes;
    use http::{header, HeaderValue, Method, Uri};
    use jsonapi_core::{from_http, DynRequest, TransportRequest};
    use serde_json::json;

    fn request(headers: &[(&'static str, &str)]) -> (DynRequest, ResponseWriter) {
        let mut req = TransportRequest::new(Method::GET, Uri::from_static("/"));
        for (k, v) in headers {
            req = req.with_header(*k, HeaderValue::from_str(v).unwrap());
        }
        let w = ResponseWriter::new();
        (from_http(w.clone(), req, Bytes::new()), w)
    }

    fn provider(store: Arc<MemoryStore>) -> StoreProvider {
        StoreProvider::new(Arc::new(InHeader::new("x-session")), store, Duration::from_secs(60))
    }

    #[test]
    fn test_new_session_then_reuse() {
        let store = Arc::new(MemoryStore::new());
        let p = provider(Arc::clone(&store));

        let (req, w) = request(&[]);
        let mut sess = p.get(req.as_ref()).unwrap();
        sess.set("user", json!("alice"));
        sess.save().unwrap();

        let id = w.header("x-session").unwrap().to_str().unwrap().to_string();
        assert_eq!(id, sess.id());

        let (req, _) = request(&[("x-session", id.as_str())]);
        let mut again = p.get(req.as_ref()).unwrap();
        assert_eq!(again.id(), id);
        assert_eq!(again.get("user"), Some(json!("alice")));
    }

    #[test]
    fn test_once_values() {
        let store = Arc::new(MemoryStore::new());
        let p = provider(Arc::clone(&store));

        let (req, w) = request(&[]);
        let mut sess = p.get(req.as_ref()).unwrap();
        sess.set_once("flash", json!("saved!"));
        sess.save().unwrap();
        let id = w.header("x-session").unwrap().to_str().unwrap().to_string();

        let (req, _) = request(&[("x-session", id.as_str())]);
        let mut sess = p.get(req.as_ref()).unwrap();
        assert_eq!(sess.get("flash"), Some(json!("saved!")));
        assert_eq!(sess.get("flash"), None);
        sess.save().unwrap();

        let (req, _) = request(&[("x-session", id.as_str())]);
        let mut sess = p.get(req.as_ref()).unwrap();
        assert_eq!(sess.get("flash"), None);
    }

    #[test]
    fn test_unknown_id_starts_fresh() {
        let p = provider(Arc::new(MemoryStore::new()));
        let (req, _) = request(&[("x-session", "forged")]);
        let sess = p.get(req.as_ref()).unwrap();
        assert_ne!(sess.id(), "forged");
    }

    #[test]
    fn test_discard() {
        let store = Arc::new(MemoryStore::new());
        let p = provider(Arc::clone(&store));

        let (req, _) = request(&[]);
        let mut sess = p.get(req.as_ref()).unwrap();
        let id = sess.id().to_string();
        sess.discard().unwrap();

        assert!(matches!(store.get(&id), Err(SessionError::NotFound(_))));
        assert!(matches!(sess.save(), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_cookie_id_handler() {
        let p = StoreProvider::new(
            Arc::new(InCookieSimple::new("sid")),
            Arc::new(MemoryStore::new()),
            Duration::from_secs(60),
        );

        let (req, w) = request(&[]);
        let mut sess = p.get(req.as_ref()).unwrap();
        sess.save().unwrap();

        let cookie = w.header(header::SET_COOKIE).unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with(&format!("sid={}", sess.id())));
        assert!(cookie.contains("HttpOnly"));
    }
}
