//! # jsonapi-test
//!
//! Helpers for testing jsonapi handlers and middlewares.
//!
//! Two levels are covered:
//!
//! - [`Test`] calls a handler directly and returns its raw result, so
//!   [`assert_error`] can check the exact [`ApiError`](jsonapi_core::ApiError).
//!   [`modify`] and [`monitor`] build middlewares which tamper with the
//!   request or peek at the result.
//! - [`TestClient`] serves requests through the envelope writer in memory,
//!   without binding a port, and returns a [`TestResponse`].
//!
//! ```
//! # tokio_test::block_on(async {
//! use jsonapi_core::{Context, Error, Handler};
//! use jsonapi_test::{Test, TestClient};
//! use serde_json::json;
//!
//! let double = Handler::typed(|_: Context, n: i64| async move { Ok::<_, Error>(n * 2) });
//!
//! let result = Test::new(double.clone()).use_data(&21).await;
//! assert!(result.is_ok());
//!
//! TestClient::new(double)
//!     .post("/double")
//!     .json(&21)
//!     .send()
//!     .await
//!     .assert_data(&json!(42));
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/jsonapi-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod harness;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use harness::{assert_error, modify, monitor, Test};
pub use request::{new_request, TestRequest, TestRequestBuilder};
pub use response::TestResponse;
