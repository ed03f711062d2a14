//! End-to-end tests: middleware chains served through the envelope.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use jsonapi_core::{Context, Error, Handler, Reply, ResponseWriter, TransportRequest, E304};
use jsonapi_middleware::session::{get_session, session, InHeader, MemoryStore, StoreProvider};
use jsonapi_middleware::stages::{
    cors_any, force_header, last_modified, log_in, metrics_stage, simple_format, totp_in_header,
    E403_TOTP,
};
use jsonapi_middleware::{Chain, Middleware};
use parking_lot::Mutex;
use serde_json::json;

const SECRET: [u8; 10] = [0xca, 0xfe, 0xba, 0xbe, 0xde, 0xad, 0xbe, 0xef, 0x4b, 0x1d];

async fn serve(h: &Handler, req: TransportRequest) -> ResponseWriter {
    h.serve_transport(Context::new(), req, Bytes::new()).await
}

fn get(path: &'static str) -> TransportRequest {
    TransportRequest::new(Method::GET, path.parse().unwrap())
}

fn body(w: &ResponseWriter) -> serde_json::Value {
    serde_json::from_slice(&w.body()).unwrap()
}

fn marker(buf: Arc<Mutex<String>>, mark: char) -> impl Middleware {
    move |next: Handler| {
        let buf = Arc::clone(&buf);
        Handler::new(move |ctx, req| {
            let next = next.clone();
            let buf = Arc::clone(&buf);
            async move {
                buf.lock().push(mark);
                let result = next.call(ctx, req).await;
                buf.lock().push(mark);
                result
            }
        })
    }
}

#[tokio::test]
async fn test_chain_order_through_envelope() {
    let buf = Arc::new(Mutex::new(String::new()));
    let inner = Arc::clone(&buf);
    let h = Chain::new(marker(Arc::clone(&buf), '1'))
        .with(marker(Arc::clone(&buf), '2'))
        .then(Handler::new(move |_, _| {
            let inner = Arc::clone(&inner);
            async move {
                inner.lock().push('3');
                Ok(Reply::from("done"))
            }
        }));

    let w = serve(&h, get("/")).await;
    assert_eq!(buf.lock().as_str(), "21312");
    assert_eq!(body(&w), json!({"data": "done"}));
}

#[tokio::test]
async fn test_not_modified_reply() {
    let h = Chain::new(last_modified())
        .with(cors_any())
        .then(Handler::new(|_, req| async move {
            req.resp().set_header(
                header::LAST_MODIFIED,
                HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
            );
            Ok(Reply::json(&json!({"id": 1})))
        }));

    let req = get("/item").with_header(
        header::IF_MODIFIED_SINCE,
        HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
    );
    let w = serve(&h, req).await;

    assert_eq!(w.status(), Some(StatusCode::NOT_MODIFIED));
    assert_eq!(
        body(&w),
        json!({"errors": [{"detail": E304.data()}]})
    );
    assert_eq!(
        w.header("access-control-allow-origin"),
        Some(HeaderValue::from_static("*"))
    );
}

#[tokio::test]
async fn test_totp_rejects_before_handler() {
    let called = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&called);
    let h = Chain::new(totp_in_header(SECRET, "x-otp")).then(Handler::new(move |_, _| {
        let flag = Arc::clone(&flag);
        async move {
            *flag.lock() = true;
            Ok(Reply::Empty)
        }
    }));

    let w = serve(&h, get("/admin").with_header("x-otp", HeaderValue::from_static("000000"))).await;

    assert!(!*called.lock());
    assert_eq!(w.status(), Some(StatusCode::FORBIDDEN));
    assert_eq!(
        body(&w),
        json!({"errors": [{"detail": E403_TOTP.data()}]})
    );
}

#[tokio::test]
async fn test_session_survives_requests() {
    let provider = StoreProvider::new(
        Arc::new(InHeader::new("x-session")),
        Arc::new(MemoryStore::new()),
        Duration::from_secs(60),
    );
    let h = Chain::new(session(Arc::new(provider), "sess")).then(Handler::new(|_, req| async move {
        let sess = get_session(req.as_ref(), "sess").ok_or_else(|| Error::msg("no session"))?;
        let mut sess = sess.lock();
        let count = sess.get("count").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
        sess.set("count", json!(count));
        sess.save()?;
        Ok(Reply::json(&count))
    }));

    let w = serve(&h, get("/count")).await;
    assert_eq!(body(&w), json!({"data": 1}));
    let id = w.header("x-session").unwrap();

    let w = serve(&h, get("/count").with_header("x-session", id.clone())).await;
    assert_eq!(body(&w), json!({"data": 2}));
    assert_eq!(w.header("x-session"), Some(id));
}

#[tokio::test]
async fn test_observing_stages_keep_results() {
    let mut headers = HeaderMap::new();
    headers.insert("x-api", HeaderValue::from_static("v1"));

    let h = Chain::new(metrics_stage())
        .with(log_in(simple_format()))
        .with(force_header(headers))
        .then(Handler::new(|_, _| async {
            Err(jsonapi_core::E404.set_code("user").set_data("no such user").into())
        }));

    let w = serve(&h, get("/user")).await;
    assert_eq!(w.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(w.header("x-api"), Some(HeaderValue::from_static("v1")));
    assert_eq!(
        body(&w),
        json!({"errors": [{"code": "user", "detail": "no such user"}]})
    );
}
