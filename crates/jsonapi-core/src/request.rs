//! The per-call request capability bundle.
//!
//! Handlers receive a [`DynRequest`], which gives them:
//!
//! - the raw payload and typed decoding of it (`decode`)
//! - the transport request head, see [`TransportRequest`]
//! - the response writer, see [`ResponseWriter`]
//! - a way to attach a key/value pair for inner handlers (`with_value`)
//!
//! Middlewares replace exactly one capability with [`wrap_request`] or
//! [`wrap_response`] and keep everything else.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{AsHeaderName, HeaderMap, HeaderValue, IntoHeaderName};
use http::{Method, StatusCode, Uri, Version};
use http_body_util::Full;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use crate::cookie::Cookies;
use crate::error::DecodeError;

/// A value attached to a request.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// Connection info inserted into request extensions by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

/// The transport request head, plus values attached by middlewares.
#[derive(Clone)]
pub struct TransportRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    values: Arc<HashMap<String, AnyValue>>,
}

impl TransportRequest {
    /// Creates a request head without headers.
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            remote_addr: None,
            values: Arc::default(),
        }
    }

    /// Copies the head of an `http` request. The remote address is read
    /// from the [`RemoteAddr`] extension when present.
    #[must_use]
    pub fn from_parts(parts: &http::request::Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            version: parts.version,
            headers: parts.headers.clone(),
            remote_addr: parts.extensions.get::<RemoteAddr>().map(|r| r.0),
            values: Arc::default(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the remote address.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Returns a copy with `value` attached under `key`.
    #[must_use]
    pub fn with_value(&self, key: impl Into<String>, value: AnyValue) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value);
        Self {
            values: Arc::new(values),
            ..self.clone()
        }
    }

    /// Returns the value attached under `key`, if it has type `T`.
    #[must_use]
    pub fn value<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.values
            .get(key)
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Request target.
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Path component of the target.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// HTTP version.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// All headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// First value of a header, if it is valid UTF-8.
    #[must_use]
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Host` header, or the authority of an absolute target.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.header(http::header::HOST)
            .or_else(|| self.uri.authority().map(http::uri::Authority::as_str))
    }

    /// Peer address, when the transport knows it.
    #[must_use]
    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Parses the `Cookie` headers.
    #[must_use]
    pub fn cookies(&self) -> Cookies {
        Cookies::from_headers(&self.headers)
    }

    /// Value of one cookie.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies().get(name).map(ToString::to_string)
    }
}

impl fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("remote_addr", &self.remote_addr)
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Default)]
struct ResponseState {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    committed: bool,
}

/// A shared, buffered response.
///
/// Clones write to the same response. Headers can be changed until the
/// response is committed by the first [`write_header`](Self::write_header)
/// or [`write`](Self::write); later header changes and status codes are
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct ResponseWriter {
    state: Arc<Mutex<ResponseState>>,
}

impl ResponseWriter {
    /// Creates an empty, uncommitted response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the first value of a response header.
    #[must_use]
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<HeaderValue> {
        self.state.lock().headers.get(name).cloned()
    }

    /// Returns a snapshot of the response headers.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        self.state.lock().headers.clone()
    }

    /// Replaces a response header.
    pub fn set_header<K: IntoHeaderName>(&self, name: K, value: HeaderValue) {
        let mut state = self.state.lock();
        if state.committed {
            tracing::debug!("header change after response was committed ignored");
            return;
        }
        state.headers.insert(name, value);
    }

    /// Adds a response header.
    pub fn append_header<K: IntoHeaderName>(&self, name: K, value: HeaderValue) {
        let mut state = self.state.lock();
        if state.committed {
            tracing::debug!("header change after response was committed ignored");
            return;
        }
        state.headers.append(name, value);
    }

    /// Removes a response header.
    pub fn remove_header<K: AsHeaderName>(&self, name: K) {
        let mut state = self.state.lock();
        if state.committed {
            tracing::debug!("header change after response was committed ignored");
            return;
        }
        state.headers.remove(name);
    }

    /// Sends the status line. Only the first call has an effect.
    pub fn write_header(&self, status: StatusCode) {
        let mut state = self.state.lock();
        if state.committed {
            tracing::debug!(status = status.as_u16(), "superfluous write_header call");
            return;
        }
        state.status = Some(status);
        state.committed = true;
    }

    /// Appends to the body, committing the response with `200 OK` if it
    /// was not committed yet.
    pub fn write(&self, data: &[u8]) {
        let mut state = self.state.lock();
        if !state.committed {
            state.status = Some(state.status.unwrap_or(StatusCode::OK));
            state.committed = true;
        }
        state.body.extend_from_slice(data);
    }

    /// Returns the committed status, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.state.lock().status
    }

    /// Returns `true` once the status line was sent.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.state.lock().committed
    }

    /// Returns a copy of the body written so far.
    #[must_use]
    pub fn body(&self) -> Bytes {
        Bytes::copy_from_slice(&self.state.lock().body)
    }

    /// Builds the `http` response. An uncommitted response is sent as
    /// `200 OK`.
    #[must_use]
    pub fn to_response(&self) -> http::Response<Full<Bytes>> {
        let state = self.state.lock();
        let mut resp = http::Response::new(Full::new(Bytes::copy_from_slice(&state.body)));
        *resp.status_mut() = state.status.unwrap_or(StatusCode::OK);
        *resp.headers_mut() = state.headers.clone();
        resp
    }
}

/// The request capability bundle handed to handlers.
///
/// A request belongs to exactly one call. Implementations only need to be
/// `Send + Sync` so calls can move between runtime threads.
pub trait Request: Send + Sync {
    /// The request body, fully read.
    fn payload(&self) -> &Bytes;

    /// The transport request head.
    fn req(&self) -> &TransportRequest;

    /// The response writer.
    fn resp(&self) -> &ResponseWriter;

    /// Returns a request which carries `value` under `key`, keeping every
    /// other capability of this one.
    fn with_value(&self, key: &str, value: AnyValue) -> DynRequest;
}

/// A shared request.
pub type DynRequest = Arc<dyn Request>;

impl dyn Request {
    /// Decodes the JSON payload.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Empty`] if there is no body, [`DecodeError::Malformed`]
    /// if it is not valid JSON for `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        let payload = self.payload();
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(serde_json::from_slice(payload)?)
    }

    /// Returns the value attached under `key`, if it has type `T`.
    pub fn value<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.req().value(key)
    }
}

#[derive(Debug)]
struct HttpRequest {
    req: TransportRequest,
    resp: ResponseWriter,
    payload: Bytes,
}

impl Request for HttpRequest {
    fn payload(&self) -> &Bytes {
        &self.payload
    }

    fn req(&self) -> &TransportRequest {
        &self.req
    }

    fn resp(&self) -> &ResponseWriter {
        &self.resp
    }

    fn with_value(&self, key: &str, value: AnyValue) -> DynRequest {
        Arc::new(Self {
            req: self.req.with_value(key, value),
            resp: self.resp.clone(),
            payload: self.payload.clone(),
        })
    }
}

/// Creates the default request from a transport request, its writer and
/// the body.
pub fn from_http(resp: ResponseWriter, req: TransportRequest, payload: Bytes) -> DynRequest {
    Arc::new(HttpRequest { req, resp, payload })
}

struct RequestOverride {
    inner: DynRequest,
    req: TransportRequest,
}

impl Request for RequestOverride {
    fn payload(&self) -> &Bytes {
        self.inner.payload()
    }

    fn req(&self) -> &TransportRequest {
        &self.req
    }

    fn resp(&self) -> &ResponseWriter {
        self.inner.resp()
    }

    fn with_value(&self, key: &str, value: AnyValue) -> DynRequest {
        wrap_request(Arc::clone(&self.inner), self.req.with_value(key, value))
    }
}

/// Replaces the transport request of `q`.
pub fn wrap_request(q: DynRequest, req: TransportRequest) -> DynRequest {
    Arc::new(RequestOverride { inner: q, req })
}

struct ResponseOverride {
    inner: DynRequest,
    resp: ResponseWriter,
}

impl Request for ResponseOverride {
    fn payload(&self) -> &Bytes {
        self.inner.payload()
    }

    fn req(&self) -> &TransportRequest {
        self.inner.req()
    }

    fn resp(&self) -> &ResponseWriter {
        &self.resp
    }

    fn with_value(&self, key: &str, value: AnyValue) -> DynRequest {
        wrap_response(self.inner.with_value(key, value), self.resp.clone())
    }
}

/// Replaces the response writer of `q`.
pub fn wrap_response(q: DynRequest, resp: ResponseWriter) -> DynRequest {
    Arc::new(ResponseOverride { inner: q, resp })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header;
    use serde::Deserialize;

    fn request(body: &'static str) -> DynRequest {
        let req = TransportRequest::new(Method::POST, Uri::from_static("/api/echo?x=1"));
        from_http(ResponseWriter::new(), req, Bytes::from_static(body.as_bytes()))
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Echo {
        msg: String,
    }

    #[test]
    fn test_decode() {
        let q = request(r#"{"msg":"hi"}"#);
        let echo: Echo = q.decode().unwrap();
        assert_eq!(echo.msg, "hi");
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(request("").decode::<Echo>(), Err(DecodeError::Empty)));
        assert!(matches!(
            request("{oops").decode::<Echo>(),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_with_value_does_not_touch_original() {
        let q = request("");
        let q2 = q.with_value("user", Arc::new(42_u32));

        assert_eq!(q2.value::<u32>("user").as_deref(), Some(&42));
        assert!(q.value::<u32>("user").is_none());
        assert!(q2.value::<String>("user").is_none());
    }

    #[test]
    fn test_wrap_request_keeps_other_capabilities() {
        let q = request(r#"{"msg":"hi"}"#);
        let replaced = TransportRequest::new(Method::GET, Uri::from_static("/other"));
        let q2 = wrap_request(Arc::clone(&q), replaced);

        assert_eq!(q2.req().path(), "/other");
        assert_eq!(q2.decode::<Echo>().unwrap().msg, "hi");
        q2.resp().write(b"x");
        assert_eq!(q.resp().body(), Bytes::from_static(b"x"));

        let q3 = q2.with_value("k", Arc::new("v".to_string()));
        assert_eq!(q3.req().path(), "/other");
        assert_eq!(q3.value::<String>("k").as_deref().map(String::as_str), Some("v"));
    }

    #[test]
    fn test_wrap_response_keeps_other_capabilities() {
        let q = request(r#"{"msg":"hi"}"#);
        let w = ResponseWriter::new();
        let q2 = wrap_response(Arc::clone(&q), w.clone());

        q2.resp().write(b"captured");
        assert_eq!(w.body(), Bytes::from_static(b"captured"));
        assert!(q.resp().body().is_empty());

        let q3 = q2.with_value("k", Arc::new(1_i64));
        q3.resp().write(b"!");
        assert_eq!(w.body(), Bytes::from_static(b"captured!"));
        assert_eq!(q3.value::<i64>("k").as_deref(), Some(&1));
        assert_eq!(q3.req().path(), "/api/echo");
    }

    #[test]
    fn test_writer_commit_rules() {
        let w = ResponseWriter::new();
        w.set_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        w.write_header(StatusCode::CREATED);
        w.write_header(StatusCode::NOT_FOUND);
        w.set_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        assert_eq!(w.status(), Some(StatusCode::CREATED));
        assert_eq!(
            w.header(header::CONTENT_TYPE),
            Some(HeaderValue::from_static("text/plain"))
        );
    }

    #[test]
    fn test_write_commits_ok() {
        let w = ResponseWriter::new();
        assert!(!w.is_committed());
        w.write(b"a");
        w.write(b"b");
        assert!(w.is_committed());
        assert_eq!(w.status(), Some(StatusCode::OK));

        let resp = w.to_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn test_transport_request_accessors() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let req = TransportRequest::new(Method::GET, Uri::from_static("/a"))
            .with_header(header::HOST, HeaderValue::from_static("example.com"))
            .with_header(header::COOKIE, HeaderValue::from_static("sid=1"))
            .with_remote_addr(addr);

        assert_eq!(req.host(), Some("example.com"));
        assert_eq!(req.remote_addr(), Some(addr));
        assert_eq!(req.cookie("sid").as_deref(), Some("1"));
        assert_eq!(req.cookie("none"), None);
    }

    #[test]
    fn test_from_parts_reads_remote_addr() {
        let addr: SocketAddr = "10.0.0.1:1234".parse().unwrap();
        let mut http_req = http::Request::new(());
        http_req.extensions_mut().insert(RemoteAddr(addr));
        let (parts, ()) = http_req.into_parts();

        let req = TransportRequest::from_parts(&parts);
        assert_eq!(req.remote_addr(), Some(addr));
        assert_eq!(*req.method(), Method::GET);
    }
}
