//! # jsonapi-server
//!
//! Serves jsonapi handlers over HTTP.
//!
//! - [`ServeMux`]: exact and subtree path patterns, usable with
//!   [`jsonapi_core::register`] and middleware chains
//! - [`Server`]: HTTP/1 via hyper, one [`Context`](jsonapi_core::Context)
//!   per request with the request timeout as its deadline
//! - [`ShutdownSignal`]: graceful shutdown which also cancels running calls
//!
//! ## Example
//!
//! ```rust,ignore
//! use jsonapi_core::{Handler, Mux, Reply};
//! use jsonapi_server::{ServeMux, Server, ShutdownSignal};
//!
//! let mut mux = ServeMux::new();
//! mux.handle("/ping", Handler::new(|_, _| async { Ok(Reply::from("pong")) }));
//!
//! let server = Server::builder().http_addr("127.0.0.1:8080").handler(mux).build();
//! let shutdown = ShutdownSignal::new();
//! server.run_with_shutdown(shutdown).await?;
//! ```

#![doc(html_root_url = "https://docs.rs/jsonapi-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod mux;
pub mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::ServerError;
pub use mux::ServeMux;
pub use server::{HttpResponse, Server, ServerBuilder};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
