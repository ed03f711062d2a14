//! The middleware trait.
//!
//! A middleware turns a [`Handler`] into another handler. The returned
//! handler usually runs some code, delegates to the wrapped one, then runs
//! more code on the way out:
//!
//! ```
//! use jsonapi_core::Handler;
//! use jsonapi_middleware::Middleware;
//!
//! fn timing(next: Handler) -> Handler {
//!     Handler::new(move |ctx, req| {
//!         let next = next.clone();
//!         async move {
//!             let started = std::time::Instant::now();
//!             let result = next.call(ctx, req).await;
//!             tracing::debug!(elapsed = ?started.elapsed(), "handled");
//!             result
//!         }
//!     })
//! }
//!
//! // Plain functions are middlewares too.
//! let _ = timing.wrap(Handler::new(|_, _| async { Ok(().into()) }));
//! ```
//!
//! Middlewares hold no per-call state. Whatever they need (secrets, stores,
//! providers) is captured when they are built and only read afterwards.

use std::fmt;

use jsonapi_core::Handler;

/// A transformation from one handler to another.
pub trait Middleware: Send + Sync + 'static {
    /// Returns a name used in logs and [`Chain::names`](crate::Chain::names).
    fn name(&self) -> &'static str {
        "anonymous"
    }

    /// Wraps `next`.
    fn wrap(&self, next: Handler) -> Handler;
}

impl<F> Middleware for F
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    fn wrap(&self, next: Handler) -> Handler {
        self(next)
    }
}

/// A closure middleware with a name.
///
/// ```
/// use jsonapi_middleware::{FnMiddleware, Middleware};
///
/// let noop = FnMiddleware::new("noop", |h| h);
/// assert_eq!(noop.name(), "noop");
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    /// Creates a named middleware from a closure.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn wrap(&self, next: Handler) -> Handler {
        (self.func)(next)
    }
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use jsonapi_core::{from_http, Context, Reply, ResponseWriter, TransportRequest};

    fn suffix(next: Handler) -> Handler {
        Handler::new(move |ctx, req| {
            let next = next.clone();
            async move {
                let reply = next.call(ctx, req).await?;
                match reply {
                    Reply::Text(t) => Ok(Reply::Text(t + "!")),
                    other => Ok(other),
                }
            }
        })
    }

    #[tokio::test]
    async fn test_fn_is_middleware() {
        let h = suffix.wrap(Handler::new(|_, _| async { Ok(Reply::from("hi")) }));
        let req = from_http(
            ResponseWriter::new(),
            TransportRequest::new(http::Method::GET, http::Uri::from_static("/")),
            Bytes::new(),
        );

        let reply = h.call(Context::new(), req).await.unwrap();
        assert!(matches!(reply, Reply::Text(t) if t == "hi!"));
        assert_eq!(suffix.name(), "anonymous");
    }

    #[test]
    fn test_fn_middleware_name() {
        let m = FnMiddleware::new("suffix", suffix);
        assert_eq!(m.name(), "suffix");
        assert!(format!("{m:?}").contains("suffix"));
    }
}
