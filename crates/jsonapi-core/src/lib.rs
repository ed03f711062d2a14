//! # jsonapi-core
//!
//! Core types of the jsonapi toolkit: a thin JSON-API layer over plain HTTP.
//!
//! - [`Handler`] - an async `(Context, DynRequest) -> HandlerResult` function
//! - [`Request`] - the per-call capability bundle (decode, transport request,
//!   response writer, attached values)
//! - [`ApiError`] - structured errors mapped to HTTP status codes, with
//!   predefined templates such as [`E404`]
//! - [`Error`] - what handlers fail with
//! - [`Context`] - per-call context with request id, deadline and cancellation
//! - [`Envelope`] - the `{"data":...}` / `{"errors":[...]}` wire shape
//! - [`register`] / [`register_all`] - binding handlers to URL patterns
//!
//! # Example
//!
//! ```
//! use jsonapi_core::{Context, Handler, Reply, E404};
//!
//! # tokio_test::block_on(async {
//! let handler = Handler::new(|_ctx, req| async move {
//!     if req.req().path() == "/hello" {
//!         Ok(Reply::from("world"))
//!     } else {
//!         Err(E404.into())
//!     }
//! });
//!
//! let req = http::Request::get("/hello").body(String::new()).unwrap();
//! let resp = handler.serve(Context::new(), req).await;
//! assert_eq!(resp.status(), 200);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/jsonapi-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
pub mod cookie;
mod envelope;
mod error;
mod handler;
mod register;
mod request;

pub use context::{CancelReason, CancelToken, Context, RequestId};
pub use cookie::{Cookies, SameSite, SetCookie};
pub use envelope::{resolve_location, write_result, Envelope, CONTENT_TYPE_JSON, MARSHAL_FAILURE};
pub use error::{
    failed, ApiError, DecodeError, ErrObj, Error, Origin, APPERR, ASIS, E301, E302, E303, E304,
    E307, E400, E401, E403, E404, E408, E409, E410, E413, E415, E418, E426, E429, E500, E501,
    E502, E503, E504, EUNKNOWN,
};
pub use handler::{BoxFuture, Handler, HandlerResult, Reply};
pub use register::{
    apis_of, convert_camel_to_slash, convert_camel_to_snake, register, register_all, Api,
    HandlerSet, Mux, NameConverter,
};
pub use request::{
    from_http, wrap_request, wrap_response, AnyValue, DynRequest, RemoteAddr, Request,
    ResponseWriter, TransportRequest,
};
