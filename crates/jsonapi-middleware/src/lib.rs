//! # jsonapi middleware
//!
//! Middlewares wrap [`Handler`](jsonapi_core::Handler)s to add behaviour
//! around API calls: authentication, CORS, logging, caching headers and
//! sessions.
//!
//! Middlewares are combined with an immutable [`Chain`]. The middleware
//! attached last wraps outermost:
//!
//! ```text
//! Chain::new(m1).with(m2).then(h)
//!
//! request → m2 → m1 → h
//!                      ↓
//! reply   ← m2 ← m1 ←──┘
//! ```
//!
//! ## Example
//!
//! ```
//! use jsonapi_core::{Handler, Reply};
//! use jsonapi_middleware::stages::{cors_any, last_modified, log_err_in, simple_format};
//! use jsonapi_middleware::Chain;
//!
//! let chain = Chain::new(last_modified())
//!     .with(cors_any())
//!     .with(log_err_in(simple_format()));
//! assert_eq!(chain.names(), ["log_err_in", "cors", "last_modified"]);
//!
//! let handler = chain.then(Handler::new(|_, _| async { Ok(Reply::from("hello")) }));
//! # let _ = handler;
//! ```

#![doc(html_root_url = "https://docs.rs/jsonapi-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod middleware;
pub mod session;
pub mod stages;

pub use chain::Chain;
pub use middleware::{FnMiddleware, Middleware};
pub use session::{get_session, session, SessionData, SessionError, SessionHandle, SessionProvider};
