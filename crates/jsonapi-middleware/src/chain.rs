//! Immutable middleware chains.
//!
//! A [`Chain`] never changes once built. [`Chain::with`] returns a new chain
//! that points to the old one as its parent, so a common base can be
//! extended in several directions without the branches seeing each other:
//!
//! ```
//! use jsonapi_core::Handler;
//! use jsonapi_middleware::{Chain, FnMiddleware};
//!
//! let base = Chain::new(FnMiddleware::new("auth", |h: Handler| h));
//! let public = base.with(FnMiddleware::new("cors", |h: Handler| h));
//! let admin = base.with(FnMiddleware::new("totp", |h: Handler| h));
//!
//! assert_eq!(public.names(), ["cors", "auth"]);
//! assert_eq!(admin.names(), ["totp", "auth"]);
//! assert_eq!(base.names(), ["auth"]);
//! ```
//!
//! # Order
//!
//! The middleware attached last wraps outermost. For `Chain::new(m1).with(m2)`
//! a call runs `m2` pre, `m1` pre, the handler, `m1` post, then `m2` post.

use std::fmt;
use std::sync::Arc;

use jsonapi_core::{apis_of, register, Api, Handler, HandlerSet, Mux, NameConverter};

use crate::middleware::Middleware;

/// An immutable, shareable list of middlewares.
#[derive(Clone)]
pub struct Chain {
    middleware: Arc<dyn Middleware>,
    parent: Option<Arc<Chain>>,
}

impl Chain {
    /// Starts a chain with one middleware.
    pub fn new(m: impl Middleware) -> Self {
        Self {
            middleware: Arc::new(m),
            parent: None,
        }
    }

    /// Returns a new chain with `m` attached outside of this one.
    #[must_use]
    pub fn with(&self, m: impl Middleware) -> Self {
        Self {
            middleware: Arc::new(m),
            parent: Some(Arc::new(self.clone())),
        }
    }

    fn layers(&self) -> Vec<&Chain> {
        let mut ret = Vec::new();
        let mut cur = Some(self);
        while let Some(c) = cur {
            ret.push(c);
            cur = c.parent.as_deref();
        }
        ret
    }

    /// Wraps `handler` with every middleware of the chain.
    #[must_use]
    pub fn then(&self, handler: Handler) -> Handler {
        self.layers()
            .into_iter()
            .rev()
            .fold(handler, |h, layer| layer.middleware.wrap(h))
    }

    /// Names of the middlewares, outermost first.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.layers()
            .into_iter()
            .map(|c| c.middleware.name())
            .collect()
    }

    /// Number of middlewares.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers().len()
    }

    /// Always `false`, a chain holds at least one middleware.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Wraps each API with the chain, then registers it to `mux`.
    pub fn register<M: Mux + ?Sized>(&self, mux: &mut M, apis: Vec<Api>) {
        let wrapped = apis
            .into_iter()
            .map(|api| Api {
                handler: self.then(api.handler),
                pattern: api.pattern,
            })
            .collect();
        register(mux, wrapped);
    }

    /// Like [`jsonapi_core::register_all`], with every handler wrapped.
    pub fn register_all<M, S>(
        &self,
        mux: &mut M,
        prefix: &str,
        set: &S,
        converter: Option<NameConverter>,
    ) where
        M: Mux + ?Sized,
        S: HandlerSet + ?Sized,
    {
        self.register(mux, apis_of(prefix, set, converter));
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("names", &self.names()).finish()
    }
}
