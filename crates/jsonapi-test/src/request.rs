//! Test request building.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use jsonapi_core::{from_http, DynRequest, ResponseWriter, TransportRequest, CONTENT_TYPE_JSON};
use serde::Serialize;

use crate::error::TestError;

/// A request head and its body, ready to be served.
#[derive(Debug, Clone)]
pub struct TestRequest {
    /// The transport request.
    pub req: TransportRequest,
    /// Request body.
    pub payload: Bytes,
}

impl TestRequest {
    /// Creates a GET request builder.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Creates a POST request builder.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Creates a PUT request builder.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Creates a DELETE request builder.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }

    /// Creates an OPTIONS request builder.
    pub fn options(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::OPTIONS, uri)
    }

    /// Converts into a handler request with a fresh response writer.
    #[must_use]
    pub fn into_dyn(self) -> DynRequest {
        from_http(ResponseWriter::new(), self.req, self.payload)
    }

    /// Converts to an `http` request, e.g. for [`Handler::serve`](jsonapi_core::Handler::serve).
    pub fn into_http_request(
        self,
    ) -> Result<http::Request<http_body_util::Full<Bytes>>, TestError> {
        let mut builder = http::Request::builder()
            .method(self.req.method().clone())
            .uri(self.req.uri().clone());

        for (name, value) in self.req.headers() {
            builder = builder.header(name, value);
        }

        builder
            .body(http_body_util::Full::new(self.payload))
            .map_err(|e| TestError::RequestBuild(e.to_string()))
    }
}

/// Creates a request whose body is `data` encoded as JSON.
///
/// ```
/// use http::Method;
/// use jsonapi_test::new_request;
///
/// let req = new_request(Method::POST, "/api/greet", &"world");
/// assert_eq!(req.payload.as_ref(), b"\"world\"");
/// assert_eq!(req.req.header("content-type"), Some("application/json"));
/// ```
///
/// # Panics
///
/// Panics if `target` is not a valid request target or `data` cannot be
/// encoded.
pub fn new_request<T: Serialize + ?Sized>(method: Method, target: &str, data: &T) -> TestRequest {
    TestRequestBuilder::new(method, target)
        .json(data)
        .build()
        .unwrap_or_else(|e| panic!("cannot build test request: {e}"))
}

/// Builder of [`TestRequest`]s.
///
/// Errors are kept until [`build`](Self::build) so calls can be chained.
#[must_use]
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    body: Option<Bytes>,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a new request builder.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            headers: HeaderMap::new(),
            remote_addr: None,
            body: None,
            error: None,
        }
    }

    /// Sets a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = match HeaderName::try_from(name.as_ref()) {
            Ok(n) => n,
            Err(e) => return self.fail(TestError::InvalidHeader(e.to_string())),
        };
        let value = match HeaderValue::try_from(value.as_ref()) {
            Ok(v) => v,
            Err(e) => return self.fail(TestError::InvalidHeader(e.to_string())),
        };
        self.headers.insert(name, value);
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Adds a cookie to the Cookie header.
    pub fn cookie(self, name: &str, value: &str) -> Self {
        let pair = format!("{name}={value}");
        let joined = match self.headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{existing}; {pair}"),
            None => pair,
        };
        self.header(header::COOKIE.as_str(), joined)
    }

    /// Sets the remote address seen by the handler.
    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the body as JSON, along with `Content-Type: application/json`.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.body = Some(Bytes::from(bytes));
                self.content_type(CONTENT_TYPE_JSON)
            }
            Err(e) => self.fail(TestError::Json(e)),
        }
    }

    /// Sets the body as a url-encoded form.
    pub fn form<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_urlencoded::to_string(value) {
            Ok(encoded) => {
                self.body = Some(Bytes::from(encoded));
                self.content_type("application/x-www-form-urlencoded")
            }
            Err(e) => self.fail(TestError::RequestBuild(e.to_string())),
        }
    }

    /// Builds the request.
    pub fn build(self) -> Result<TestRequest, TestError> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let uri: Uri = self
            .uri
            .parse()
            .map_err(|e| TestError::RequestBuild(format!("invalid URI: {e}")))?;

        let mut req = TransportRequest::new(self.method, uri);
        *req.headers_mut() = self.headers;
        if let Some(addr) = self.remote_addr {
            req = req.with_remote_addr(addr);
        }

        Ok(TestRequest {
            req,
            payload: self.body.unwrap_or_default(),
        })
    }

    fn fail(mut self, err: TestError) -> Self {
        self.error.get_or_insert(err);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_request() {
        let request = new_request(Method::PUT, "/users/1?full=1", &json!({"name": "Alice"}));

        assert_eq!(request.req.method(), Method::PUT);
        assert_eq!(request.req.path(), "/users/1");
        assert_eq!(request.req.header("content-type"), Some("application/json"));
        assert_eq!(request.payload.as_ref(), b"{\"name\":\"Alice\"}");
    }

    #[test]
    fn test_header_and_cookie() {
        let request = TestRequest::get("/users")
            .header("X-Auth-Token", "secret")
            .cookie("a", "1")
            .cookie("b", "2")
            .build()
            .unwrap();

        assert_eq!(request.req.header("x-auth-token"), Some("secret"));
        assert_eq!(request.req.cookie("b").as_deref(), Some("2"));
        assert!(request.payload.is_empty());
    }

    #[test]
    fn test_invalid_header_is_deferred() {
        let err = TestRequest::get("/")
            .header("bad header", "x")
            .body("kept going")
            .build()
            .unwrap_err();
        assert!(matches!(err, TestError::InvalidHeader(_)));
    }

    #[test]
    fn test_invalid_uri() {
        let err = TestRequest::get("http://[::1").build().unwrap_err();
        assert!(matches!(err, TestError::RequestBuild(_)));
    }

    #[test]
    fn test_form_body() {
        let request = TestRequest::post("/login")
            .form(&[("user", "alice"), ("pass", "a b")])
            .build()
            .unwrap();

        assert_eq!(request.payload.as_ref(), b"user=alice&pass=a+b");
        assert_eq!(
            request.req.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_remote_addr() {
        let addr: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        let request = TestRequest::get("/").remote_addr(addr).build().unwrap();
        assert_eq!(request.req.remote_addr(), Some(addr));
    }

    #[test]
    fn test_into_http_request() {
        let request = TestRequest::post("/users")
            .header("X-Test", "value")
            .body("raw")
            .build()
            .unwrap();

        let http_request = request.into_http_request().unwrap();
        assert_eq!(http_request.method(), Method::POST);
        assert_eq!(http_request.uri().path(), "/users");
        assert_eq!(http_request.headers().get("X-Test").unwrap(), "value");
    }
}
