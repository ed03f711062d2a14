//! CORS (Cross-Origin Resource Sharing) headers.
//!
//! Headers are written after the inner handler returns, replacing whatever
//! the handler set.
//!
//! A request is treated as a preflight when it is an `OPTIONS` request that
//! carries both `Access-Control-Request-Method` and
//! `Access-Control-Request-Headers`. Other requests only get the simple
//! headers: `Access-Control-Allow-Origin`, `Access-Control-Allow-Credentials`
//! when enabled and `Access-Control-Max-Age` when positive.
//!
//! ```
//! use jsonapi_middleware::stages::{cors, CorsOption};
//!
//! let m = cors(CorsOption {
//!     origin: "https://app.example.com".into(),
//!     methods: vec!["GET".into(), "POST".into()],
//!     credential: true,
//!     ..CorsOption::default()
//! });
//! # let _ = m;
//! ```

use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, HeaderValue, Method};
use jsonapi_core::{Handler, TransportRequest};

use crate::middleware::Middleware;
use crate::stages::header::apply;

/// CORS header names.
pub mod headers {
    /// `Access-Control-Allow-Origin` header.
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Methods` header.
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Allow-Headers` header.
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    /// `Access-Control-Allow-Credentials` header.
    pub const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
    /// `Access-Control-Max-Age` header.
    pub const MAX_AGE: &str = "access-control-max-age";
    /// `Access-Control-Expose-Headers` header.
    pub const EXPOSE_HEADERS: &str = "access-control-expose-headers";
    /// `Access-Control-Request-Method` header (preflight).
    pub const REQUEST_METHOD: &str = "access-control-request-method";
    /// `Access-Control-Request-Headers` header (preflight).
    pub const REQUEST_HEADERS: &str = "access-control-request-headers";
}

/// CORS settings.
#[derive(Debug, Clone, Default)]
pub struct CorsOption {
    /// Value of `Access-Control-Allow-Origin`.
    pub origin: String,
    /// Headers exposed to scripts.
    pub expose_headers: Vec<String>,
    /// Allowed request headers. The requested ones are echoed when empty.
    pub headers: Vec<String>,
    /// How long a preflight result may be cached. Zero omits the header.
    pub max_age: Duration,
    /// Whether credentials are allowed.
    pub credential: bool,
    /// Allowed methods. The requested one is echoed when empty.
    pub methods: Vec<String>,
}

/// The CORS middleware.
#[derive(Debug, Clone)]
pub struct Cors {
    option: Arc<CorsOption>,
}

impl Cors {
    /// Creates the middleware.
    #[must_use]
    pub fn new(option: CorsOption) -> Self {
        Self {
            option: Arc::new(option),
        }
    }

    fn simple_headers(&self, out: &mut HeaderMap) {
        let opt = &self.option;
        insert(out, headers::ALLOW_ORIGIN, &opt.origin);
        if opt.credential {
            insert(out, headers::ALLOW_CREDENTIALS, "true");
        }
        if opt.max_age.as_secs() > 0 {
            insert(out, headers::MAX_AGE, &opt.max_age.as_secs().to_string());
        }
    }

    /// Computes the headers to send for `req`.
    #[must_use]
    pub fn headers_for(&self, req: &TransportRequest) -> HeaderMap {
        let mut out = HeaderMap::new();
        self.simple_headers(&mut out);

        let requested_method = req.header(headers::REQUEST_METHOD);
        let requested_headers = req.header(headers::REQUEST_HEADERS);
        let (Some(method), Some(hdrs)) = (requested_method, requested_headers) else {
            return out;
        };
        if *req.method() != Method::OPTIONS {
            return out;
        }

        let opt = &self.option;
        let methods = if opt.methods.is_empty() {
            method.to_string()
        } else {
            opt.methods.join(", ")
        };
        insert(&mut out, headers::ALLOW_METHODS, &methods);

        let allowed = if opt.headers.is_empty() {
            hdrs.to_string()
        } else {
            opt.headers.join(", ")
        };
        insert(&mut out, headers::ALLOW_HEADERS, &allowed);

        if !opt.expose_headers.is_empty() {
            insert(&mut out, headers::EXPOSE_HEADERS, &opt.expose_headers.join(", "));
        }
        out
    }
}

fn insert(out: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            out.insert(name, v);
        }
        Err(e) => tracing::warn!(header = name, error = %e, "invalid CORS header value"),
    }
}

impl Middleware for Cors {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn wrap(&self, next: Handler) -> Handler {
        let cors = self.clone();
        Handler::new(move |ctx, req| {
            let next = next.clone();
            let cors = cors.clone();
            async move {
                let result = next.call(ctx, Arc::clone(&req)).await;
                apply(req.resp(), &cors.headers_for(req.req()));
                result
            }
        })
    }
}

/// Creates a CORS middleware.
#[must_use]
pub fn cors(option: CorsOption) -> Cors {
    Cors::new(option)
}

/// Allows every origin, without credentials.
#[must_use]
pub fn cors_any() -> Cors {
    cors(CorsOption {
        origin: "*".to_string(),
        ..CorsOption::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::Uri;
    use jsonapi_core::{from_http, Context, Reply, ResponseWriter};

    fn preflight() -> TransportRequest {
        TransportRequest::new(Method::OPTIONS, Uri::from_static("/api"))
            .with_header(headers::REQUEST_METHOD, HeaderValue::from_static("PUT"))
            .with_header(headers::REQUEST_HEADERS, HeaderValue::from_static("x-token"))
    }

    fn get(h: &HeaderMap, name: &str) -> Option<String> {
        h.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
    }

    #[test]
    fn test_simple_request() {
        let c = cors(CorsOption {
            origin: "https://a.example".into(),
            credential: true,
            max_age: Duration::from_secs(600),
            methods: vec!["GET".into()],
            ..CorsOption::default()
        });
        let h = c.headers_for(&TransportRequest::new(Method::GET, Uri::from_static("/")));

        assert_eq!(get(&h, headers::ALLOW_ORIGIN).as_deref(), Some("https://a.example"));
        assert_eq!(get(&h, headers::ALLOW_CREDENTIALS).as_deref(), Some("true"));
        assert_eq!(get(&h, headers::MAX_AGE).as_deref(), Some("600"));
        assert!(h.get(headers::ALLOW_METHODS).is_none());
    }

    #[test]
    fn test_options_without_request_headers_is_simple() {
        let req = TransportRequest::new(Method::OPTIONS, Uri::from_static("/"))
            .with_header(headers::REQUEST_METHOD, HeaderValue::from_static("PUT"));
        let h = cors_any().headers_for(&req);
        assert_eq!(get(&h, headers::ALLOW_ORIGIN).as_deref(), Some("*"));
        assert!(h.get(headers::ALLOW_METHODS).is_none());
        assert!(h.get(headers::ALLOW_CREDENTIALS).is_none());
        assert!(h.get(headers::MAX_AGE).is_none());
    }

    #[test]
    fn test_preflight_echoes_request() {
        let h = cors_any().headers_for(&preflight());
        assert_eq!(get(&h, headers::ALLOW_METHODS).as_deref(), Some("PUT"));
        assert_eq!(get(&h, headers::ALLOW_HEADERS).as_deref(), Some("x-token"));
        assert_eq!(get(&h, headers::ALLOW_ORIGIN).as_deref(), Some("*"));
    }

    #[test]
    fn test_preflight_uses_configured_lists() {
        let c = cors(CorsOption {
            origin: "*".into(),
            methods: vec!["GET".into(), "POST".into()],
            headers: vec!["x-a".into(), "x-b".into()],
            expose_headers: vec!["x-total".into()],
            ..CorsOption::default()
        });
        let h = c.headers_for(&preflight());
        assert_eq!(get(&h, headers::ALLOW_METHODS).as_deref(), Some("GET, POST"));
        assert_eq!(get(&h, headers::ALLOW_HEADERS).as_deref(), Some("x-a, x-b"));
        assert_eq!(get(&h, headers::EXPOSE_HEADERS).as_deref(), Some("x-total"));
    }

    #[tokio::test]
    async fn test_headers_written_after_call() {
        let h = cors_any().wrap(Handler::new(|_, req| async move {
            assert!(req.resp().header(headers::ALLOW_ORIGIN).is_none());
            Ok(Reply::Empty)
        }));
        let w = ResponseWriter::new();
        let req = from_http(
            w.clone(),
            TransportRequest::new(Method::GET, Uri::from_static("/")),
            Bytes::new(),
        );
        h.call(Context::new(), req).await.unwrap();
        assert_eq!(w.header(headers::ALLOW_ORIGIN), Some(HeaderValue::from_static("*")));
    }
}
