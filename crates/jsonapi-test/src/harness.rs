//! Calling handlers directly, without the envelope.
//!
//! A [`Test`] runs a handler, optionally wrapped in middlewares, and hands
//! back exactly what it returned. Combined with [`assert_error`] this checks
//! the error path of a handler without parsing any JSON:
//!
//! ```
//! # tokio_test::block_on(async {
//! use jsonapi_core::{Handler, Reply, E400};
//! use jsonapi_test::{assert_error, Test};
//!
//! let echo = Handler::new(|_, req| async move {
//!     let name: String = req.decode().map_err(|e| E400.set_origin(e))?;
//!     Ok(Reply::from(name))
//! });
//!
//! let result = Test::new(echo).use_data(&42).await;
//! assert_error(&E400, result);
//! # });
//! ```

use std::sync::Arc;

use jsonapi_core::{
    from_http, ApiError, Context, DynRequest, Error, Handler, HandlerResult, ResponseWriter,
};
use jsonapi_middleware::Middleware;
use serde::Serialize;

use crate::request::{new_request, TestRequest};

/// A middleware replacing the request before the handler sees it.
pub fn modify<F>(f: F) -> impl Middleware
where
    F: Fn(DynRequest) -> DynRequest + Send + Sync + 'static,
{
    let f = Arc::new(f);
    move |next: Handler| {
        let f = Arc::clone(&f);
        Handler::new(move |ctx, req| {
            let (f, next) = (Arc::clone(&f), next.clone());
            async move { next.call(ctx, f(req)).await }
        })
    }
}

/// A middleware observing the request and the result after the handler ran.
pub fn monitor<F>(f: F) -> impl Middleware
where
    F: Fn(&DynRequest, &HandlerResult) + Send + Sync + 'static,
{
    let f = Arc::new(f);
    move |next: Handler| {
        let f = Arc::clone(&f);
        Handler::new(move |ctx, req: DynRequest| {
            let (f, next) = (Arc::clone(&f), next.clone());
            async move {
                let result = next.call(ctx, Arc::clone(&req)).await;
                f(&req, &result);
                result
            }
        })
    }
}

/// A handler under test.
#[derive(Debug, Clone)]
pub struct Test {
    handler: Handler,
}

impl Test {
    /// Wraps `handler`.
    pub fn new(handler: impl Into<Handler>) -> Self {
        Self {
            handler: handler.into(),
        }
    }

    /// Wraps the handler in `m`.
    ///
    /// The middleware attached last runs first: with
    /// `Test::new(h).with(m1).with(m2)` a call goes m2, m1, h, m1, m2.
    #[must_use]
    pub fn with(self, m: impl Middleware) -> Self {
        Self {
            handler: m.wrap(self.handler),
        }
    }

    /// Runs the handler with `req`.
    pub async fn use_request(&self, req: TestRequest) -> HandlerResult {
        self.use_request_with(Context::new(), req).await.0
    }

    /// Runs the handler with `req` under `ctx`, returning the writer too so
    /// headers set along the way can be inspected.
    pub async fn use_request_with(
        &self,
        ctx: Context,
        req: TestRequest,
    ) -> (HandlerResult, ResponseWriter) {
        let w = ResponseWriter::new();
        let q = from_http(w.clone(), req.req, req.payload);
        let result = self.handler.call(ctx, q).await;
        (result, w)
    }

    /// Runs the handler with `data` as JSON body of a `POST /`.
    pub async fn use_data<T: Serialize + ?Sized>(&self, data: &T) -> HandlerResult {
        self.use_request(new_request(http::Method::POST, "/", data)).await
    }

    /// The wrapped handler.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

/// Checks that a handler failed with `expect`, returning the error.
///
/// # Panics
///
/// Panics if the handler returned data, or an error which is not an
/// [`ApiError`] equal to `expect` (the origin is not compared).
#[track_caller]
pub fn assert_error(expect: &ApiError, result: HandlerResult) -> ApiError {
    match result {
        Ok(reply) => panic!("handler in error state should not return any data, got {reply:?}"),
        Err(Error::Api(e)) => {
            assert!(expect.equal_to(&e), "error should be {expect}, got {e}");
            e
        }
        Err(other) => panic!("handler in error state should return api errors, got {other:?}"),
    }
}
