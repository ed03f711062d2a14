//! Request body encoders.
//!
//! An [`Encoder`] turns the call parameter into bytes and builds the
//! [`Endpoint`] of an API. The default encoder writes plain JSON;
//! [`sorted_encoder`] writes every object with its keys sorted, which is
//! handy when the body has to be signed.
//!
//! ```
//! use jsonapi_client::sorted_encoder;
//! use serde_json::json;
//!
//! let buf = sorted_encoder().encode(&json!({"b": 1, "a": {"d": 2, "c": 3}})).unwrap();
//! assert_eq!(buf, br#"{"a":{"c":3,"d":2},"b":1}"#);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::endpoint::Endpoint;
use crate::error::{BoxError, CallError};

type EncodeFn = dyn Fn(&Value) -> Result<Vec<u8>, BoxError> + Send + Sync;

/// Encodes call parameters.
#[derive(Clone)]
pub struct Encoder(Arc<EncodeFn>);

impl Encoder {
    /// Creates an encoder from a function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Vec<u8>, BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Encodes `value`.
    ///
    /// # Errors
    ///
    /// Returns whatever the encoding function fails with.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, BoxError> {
        (self.0)(value)
    }

    /// Creates an endpoint sending the encoded parameter as its body.
    ///
    /// When a parameter is given it is encoded and `Content-Type` is set to
    /// `application/json`. Without a parameter the request has no body.
    pub fn endpoint(&self, method: Method, url: impl Into<String>) -> Endpoint {
        let encoder = self.clone();
        let url = url.into();

        Endpoint::new(move |_ctx, param| {
            let target = reqwest::Url::parse(&url).map_err(CallError::client)?;
            let mut req = reqwest::Request::new(method.clone(), target);

            if let Some(param) = param {
                let body = encoder.encode(param).map_err(CallError::Client)?;
                *req.body_mut() = Some(body.into());
                req.headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            Ok(req)
        })
    }
}

impl Default for Encoder {
    fn default() -> Self {
        default_encoder()
    }
}

impl fmt::Debug for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoder").finish_non_exhaustive()
    }
}

/// Plain JSON.
#[must_use]
pub fn default_encoder() -> Encoder {
    Encoder::new(|v| serde_json::to_vec(v).map_err(Into::into))
}

/// JSON with the keys of every object in ascending order.
#[must_use]
pub fn sorted_encoder() -> Encoder {
    Encoder::new(|v| serde_json::to_vec(&Sorted(v)).map_err(Into::into))
}

struct Sorted<'a>(&'a Value);

impl Serialize for Sorted<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let sorted: BTreeMap<&String, Sorted<'_>> =
                    map.iter().map(|(k, v)| (k, Sorted(v))).collect();
                sorted.serialize(serializer)
            }
            Value::Array(items) => serializer.collect_seq(items.iter().map(Sorted)),
            other => other.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonapi_core::Context;
    use serde_json::json;

    #[test]
    fn test_sorted_nested() {
        let v = json!({"z": [{"y": 1, "x": 2}], "a": null});
        let buf = sorted_encoder().encode(&v).unwrap();
        assert_eq!(buf, br#"{"a":null,"z":[{"x":2,"y":1}]}"#);
    }

    #[test]
    fn test_endpoint_with_param() {
        let ep = default_encoder().endpoint(Method::POST, "http://127.0.0.1:1/api/echo");
        let req = ep.request(&Context::new(), Some(&json!({"a": 1}))).unwrap();

        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.url().path(), "/api/echo");
        assert_eq!(req.headers().get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(req.body().and_then(reqwest::Body::as_bytes), Some(&br#"{"a":1}"#[..]));
    }

    #[test]
    fn test_endpoint_without_param() {
        let ep = default_encoder().endpoint(Method::GET, "http://127.0.0.1:1/api/list");
        let req = ep.request(&Context::new(), None).unwrap();

        assert!(req.body().is_none());
        assert!(req.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_bad_url_is_client_error() {
        let ep = default_encoder().endpoint(Method::GET, "not a url");
        let err = ep.request(&Context::new(), None).unwrap_err();
        assert!(err.is_client());
    }

    #[test]
    fn test_encoder_failure_is_client_error() {
        let failing = Encoder::new(|_| Err("unsupported".into()));
        let ep = failing.endpoint(Method::POST, "http://127.0.0.1:1/");
        let err = ep.request(&Context::new(), Some(&json!(1))).unwrap_err();
        assert!(err.is_client());
        assert!(err.to_string().ends_with("unsupported"));
    }
}
