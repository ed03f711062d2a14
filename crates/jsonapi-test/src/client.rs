//! Serving requests in memory.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use jsonapi_core::{Context, Handler};
use serde::Serialize;

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::TestResponse;

/// Serves requests through a handler and the envelope writer, without a
/// socket.
///
/// ```
/// # tokio_test::block_on(async {
/// use jsonapi_core::{Handler, Reply};
/// use jsonapi_test::TestClient;
/// use serde_json::json;
///
/// let client = TestClient::new(Handler::new(|_, _| async { Ok(Reply::from("pong")) }));
///
/// client.get("/ping").send().await.assert_data(&json!("pong"));
/// # });
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct TestClient {
    handler: Handler,
    default_headers: Vec<(String, String)>,
    remote_addr: SocketAddr,
    timeout: Option<Duration>,
}

impl TestClient {
    /// Creates a client serving with `handler`, e.g. a `ServeMux`.
    pub fn new(handler: impl Into<Handler>) -> Self {
        Self {
            handler: handler.into(),
            default_headers: Vec::new(),
            remote_addr: SocketAddr::from(([127, 0, 0, 1], 40000)),
            timeout: None,
        }
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Sets the peer address the handler sees. Defaults to `127.0.0.1:40000`.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = addr;
        self
    }

    /// Gives every call a deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Creates a GET request builder.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Creates a POST request builder.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Creates a PUT request builder.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Creates a DELETE request builder.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Creates an OPTIONS request builder.
    pub fn options(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::OPTIONS, uri)
    }

    /// Creates a request builder with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        let mut builder = TestRequestBuilder::new(method, uri).remote_addr(self.remote_addr);
        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }
        TestClientRequest {
            client: self,
            builder,
        }
    }

    /// Serves a built request.
    pub async fn serve(&self, request: TestRequest) -> TestResponse {
        let ctx = match self.timeout {
            Some(timeout) => Context::new().with_timeout(timeout),
            None => Context::new(),
        };
        let w = self
            .handler
            .serve_transport(ctx, request.req, request.payload)
            .await;
        TestResponse::from_writer(&w)
    }
}

/// A request builder bound to a [`TestClient`].
#[must_use]
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl TestClientRequest<'_> {
    /// Sets a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Adds a cookie.
    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.cookie(name, value);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets the body as JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built, see [`try_send`](Self::try_send).
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(resp) => resp,
            Err(e) => panic!("cannot build test request: {e}"),
        }
    }

    /// Sends the request, failing if it cannot be built.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        Ok(self.client.serve(request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{header, HeaderValue, StatusCode};
    use jsonapi_core::{Error, Reply, E400, E401, E503};
    use serde_json::json;

    fn echo() -> Handler {
        Handler::new(|_, req| async move {
            let body: Option<serde_json::Value> = if req.payload().is_empty() {
                None
            } else {
                Some(req.decode().map_err(|e| E400.set_origin(e))?)
            };
            Ok(Reply::from(json!({
                "method": req.req().method().as_str(),
                "path": req.req().path(),
                "remote": req.req().remote_addr().map(|a| a.ip().to_string()),
                "body": body,
            })))
        })
    }

    #[tokio::test]
    async fn test_echo_through_envelope() {
        let client = TestClient::new(echo());
        let response = client.post("/items").json(&json!({"a": 1})).send().await;

        response
            .assert_status(StatusCode::OK)
            .assert_header("content-type", "application/json")
            .assert_data(&json!({
                "method": "POST",
                "path": "/items",
                "remote": "127.0.0.1",
                "body": {"a": 1},
            }));
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let client = TestClient::new(echo());
        let response = client.put("/items").body("{oops").send().await;
        response.assert_error(&E400);
        assert_eq!(
            response.text().unwrap(),
            "{\"errors\":[{\"detail\":\"Error parsing request\"}]}\n"
        );
    }

    #[tokio::test]
    async fn test_default_headers() {
        let client = TestClient::new(Handler::new(|_, req| async move {
            match req.req().header("x-auth-token") {
                Some("letmein") => Ok(Reply::from("welcome")),
                _ => Err(E401.set_code("auth").into()),
            }
        }));

        client.get("/").send().await.assert_error(&E401.set_code("auth"));

        let authed = client.clone().with_default_header("X-Auth-Token", "letmein");
        authed.get("/").send().await.assert_data(&json!("welcome"));
    }

    #[tokio::test]
    async fn test_as_is_reply() {
        let client = TestClient::new(Handler::new(|_, req| async move {
            req.resp()
                .set_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
            req.resp().write_header(StatusCode::ACCEPTED);
            Err::<Reply, _>(Error::as_is("raw text"))
        }));

        let response = client.delete("/").send().await;
        response.assert_status(StatusCode::ACCEPTED);
        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(response.text().unwrap(), "raw text");
    }

    #[tokio::test]
    async fn test_timeout_suppresses_response() {
        let client = TestClient::new(Handler::new(|ctx, _| async move {
            ctx.done().await;
            Err(E503.into())
        }))
        .with_timeout(Duration::from_millis(20));

        let response = client.get("/slow").send().await;
        assert!(response.body().is_empty());
    }

    #[tokio::test]
    async fn test_try_send_reports_build_errors() {
        let client = TestClient::new(echo());
        let err = client.get("/").header("bad header", "x").try_send().await.unwrap_err();
        assert!(matches!(err, TestError::InvalidHeader(_)));
    }
}
