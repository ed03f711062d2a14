//! Handler and reply types.
//!
//! A [`Handler`] is an async function `(Context, DynRequest) -> HandlerResult`.
//! It is reference counted and cheap to clone, so middlewares can capture the
//! handler they wrap and still hand copies out freely.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{failed, Error, E400};
use crate::request::{DynRequest, ResponseWriter};
use crate::Context;

/// An owned, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler returns.
pub type HandlerResult = Result<Reply, Error>;

type HandlerFn = dyn Fn(Context, DynRequest) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// A type-erased request handler.
///
/// # Example
///
/// ```
/// use jsonapi_core::{Handler, Reply};
///
/// let hello = Handler::new(|_ctx, _req| async move { Ok(Reply::from("hello")) });
/// # let _ = hello;
/// ```
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    /// Wraps an async function into a handler.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, DynRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self(Arc::new(move |ctx, req| Box::pin(f(ctx, req))))
    }

    /// Wraps a function taking a decoded payload and returning a
    /// serializable value.
    ///
    /// A request without a body decodes as JSON `null`, so `()` and `Option`
    /// inputs accept empty requests. Any other decode failure is returned as
    /// [`E400`] with the decode error as origin.
    ///
    /// ```
    /// use jsonapi_core::{Context, Error, Handler};
    /// use serde::{Deserialize, Serialize};
    ///
    /// #[derive(Deserialize)]
    /// struct Greet { name: String }
    ///
    /// #[derive(Serialize)]
    /// struct Greeting { message: String }
    ///
    /// let h = Handler::typed(|_ctx: Context, input: Greet| async move {
    ///     Ok::<_, Error>(Greeting { message: format!("hello, {}", input.name) })
    /// });
    /// # let _ = h;
    /// ```
    pub fn typed<F, Fut, I, O>(f: F) -> Self
    where
        F: Fn(Context, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, Error>> + Send + 'static,
        I: DeserializeOwned + Send + 'static,
        O: Serialize,
    {
        let f = Arc::new(f);
        Self::new(move |ctx, req: DynRequest| {
            let f = Arc::clone(&f);
            async move {
                let input: I = if req.payload().is_empty() {
                    match serde_json::from_value(Value::Null) {
                        Ok(v) => v,
                        Err(e) => return failed(e, E400),
                    }
                } else {
                    match req.decode() {
                        Ok(v) => v,
                        Err(e) => return failed(e, E400),
                    }
                };
                let output = f(ctx, input).await?;
                Ok(Reply::json(&output))
            }
        })
    }

    /// Invokes the handler.
    pub fn call(&self, ctx: Context, req: DynRequest) -> BoxFuture<'static, HandlerResult> {
        (self.0)(ctx, req)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").finish_non_exhaustive()
    }
}

/// The data a handler produced.
///
/// On success it becomes the `data` member of the envelope. With the as-is
/// marker it is written to the body verbatim instead.
#[derive(Debug, Clone, Default)]
pub enum Reply {
    /// No data, encoded as `null`.
    #[default]
    Empty,
    /// A string.
    Text(String),
    /// Raw bytes, encoded as a base64 string inside the envelope.
    Bytes(Bytes),
    /// Any JSON value.
    Json(Value),
    /// A value that failed to serialize. Encoding it always fails.
    Unserializable(Arc<serde_json::Error>),
}

impl Reply {
    /// Serializes `value` into a reply.
    ///
    /// Serialization errors are kept and surface when the envelope is
    /// written, which reports them as a 500.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => Self::Json(v),
            Err(e) => Self::Unserializable(Arc::new(e)),
        }
    }

    /// Creates a text reply from anything displayable.
    pub fn display(value: impl fmt::Display) -> Self {
        Self::Text(value.to_string())
    }

    /// Returns `true` for [`Reply::Empty`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Writes the reply to `w` without any envelope.
    ///
    /// Text and bytes are written verbatim, JSON values as their compact
    /// text form. Nothing is written for an empty or unserializable reply.
    pub fn write_raw(&self, w: &ResponseWriter) {
        match self {
            Self::Text(t) => w.write(t.as_bytes()),
            Self::Bytes(b) => w.write(b),
            Self::Json(Value::String(s)) => w.write(s.as_bytes()),
            Self::Json(v) => w.write(v.to_string().as_bytes()),
            Self::Empty | Self::Unserializable(_) => {}
        }
    }
}

impl Serialize for Reply {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_unit(),
            Self::Text(t) => serializer.serialize_str(t),
            Self::Bytes(b) => serializer.serialize_str(&BASE64_STANDARD.encode(b)),
            Self::Json(v) => v.serialize(serializer),
            Self::Unserializable(e) => Err(S::Error::custom(e)),
        }
    }
}

impl From<()> for Reply {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

impl From<String> for Reply {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Reply {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Bytes> for Reply {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for Reply {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}
