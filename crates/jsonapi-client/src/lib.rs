//! # jsonapi-client
//!
//! Calls remote APIs which speak the jsonapi envelope.
//!
//! A call is assembled from three parts:
//!
//! - an [`Endpoint`] builds the request, usually through an [`Encoder`],
//! - a [`Sender`] delivers it with a `reqwest` client,
//! - a [`Parser`] turns the response into data or an error.
//!
//! [`ep`] wires the defaults together; [`Builder`] shares custom parts
//! between many endpoints.
//!
//! ## Example
//!
//! ```no_run
//! # async fn run() -> Result<(), jsonapi_client::CallError> {
//! use jsonapi_client::ep;
//! use jsonapi_core::Context;
//! use reqwest::Method;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct Query { id: u64 }
//!
//! #[derive(Default, Deserialize)]
//! struct User { name: String }
//!
//! let get_user = ep(Method::POST, "http://127.0.0.1:8080/api/get_user").typed::<Query, User>();
//! let user = get_user.call(&Context::new(), &Query { id: 1 }).await?;
//! println!("{}", user.name);
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/jsonapi-client/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod builder;
pub mod encoder;
pub mod endpoint;
pub mod error;
pub mod sender;

pub use builder::{Builder, Maker};
pub use encoder::{default_encoder, sorted_encoder, Encoder};
pub use endpoint::{ep, new_ep, Endpoint};
pub use error::{BoxError, CallError};
pub use sender::{default_parser, typed, Caller, Parser, Sender, TypedCaller};
