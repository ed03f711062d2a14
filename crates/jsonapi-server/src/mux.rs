//! A minimal path multiplexer.
//!
//! Patterns are either exact paths (`/api/user`) or subtrees ending in a
//! slash (`/static/`), which match every path below them. The longest
//! matching pattern wins. Paths matching nothing are answered with
//! [`E404`].
//!
//! ```
//! use jsonapi_core::{Handler, Mux, Reply};
//! use jsonapi_server::ServeMux;
//!
//! let mut mux = ServeMux::new();
//! mux.handle("/api/", Handler::new(|_, _| async { Ok(Reply::from("any")) }));
//! mux.handle("/api/user", Handler::new(|_, _| async { Ok(Reply::from("user")) }));
//!
//! assert_eq!(mux.lookup("/api/user").map(|(p, _)| p), Some("/api/user"));
//! assert_eq!(mux.lookup("/api/user/1").map(|(p, _)| p), Some("/api/"));
//! assert!(mux.lookup("/other").is_none());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use jsonapi_core::{Handler, Mux, E404};

/// Maps URL paths to handlers.
#[derive(Clone)]
pub struct ServeMux {
    exact: HashMap<String, Handler>,
    // Longest first.
    subtrees: Vec<(String, Handler)>,
    not_found: Handler,
}

impl ServeMux {
    /// Creates an empty mux.
    #[must_use]
    pub fn new() -> Self {
        Self {
            exact: HashMap::new(),
            subtrees: Vec::new(),
            not_found: Handler::new(|_, _| async { Err(E404.into()) }),
        }
    }

    /// Replaces the handler used when nothing matches.
    #[must_use]
    pub fn with_not_found(mut self, handler: Handler) -> Self {
        self.not_found = handler;
        self
    }

    /// Finds the handler for `path` together with the pattern it matched.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<(&str, &Handler)> {
        if let Some((pattern, h)) = self.exact.get_key_value(path) {
            return Some((pattern.as_str(), h));
        }
        self.subtrees
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(prefix, h)| (prefix.as_str(), h))
    }

    /// Number of registered patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exact.len() + self.subtrees.len()
    }

    /// Returns `true` if no pattern is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Turns the mux into a handler dispatching on the request path.
    #[must_use]
    pub fn into_handler(self) -> Handler {
        let mux = Arc::new(self);
        Handler::new(move |ctx, req| {
            let mux = Arc::clone(&mux);
            async move {
                let path = req.req().path().to_string();
                let handler = match mux.lookup(&path) {
                    Some((pattern, h)) => {
                        tracing::debug!(path = %path, pattern = %pattern, "dispatching");
                        h.clone()
                    }
                    None => {
                        tracing::debug!(path = %path, "no pattern matched");
                        mux.not_found.clone()
                    }
                };
                handler.call(ctx, req).await
            }
        })
    }
}

impl Mux for ServeMux {
    fn handle(&mut self, pattern: &str, handler: Handler) {
        if pattern.is_empty() {
            tracing::warn!("ignoring handler registered with an empty pattern");
            return;
        }

        if pattern.ends_with('/') {
            if let Some(slot) = self.subtrees.iter_mut().find(|(p, _)| p == pattern) {
                tracing::warn!(pattern = %pattern, "pattern registered twice, replacing");
                slot.1 = handler;
                return;
            }
            self.subtrees.push((pattern.to_string(), handler));
            self.subtrees.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        } else if self.exact.insert(pattern.to_string(), handler).is_some() {
            tracing::warn!(pattern = %pattern, "pattern registered twice, replacing");
        }
    }
}

impl Default for ServeMux {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ServeMux> for Handler {
    fn from(mux: ServeMux) -> Self {
        mux.into_handler()
    }
}

impl fmt::Debug for ServeMux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut patterns: Vec<&str> = self.exact.keys().map(String::as_str).collect();
        patterns.extend(self.subtrees.iter().map(|(p, _)| p.as_str()));
        patterns.sort_unstable();
        f.debug_struct("ServeMux").field("patterns", &patterns).finish()
    }
}
