//! End-to-end behaviour of the envelope protocol.

use bytes::Bytes;
use http::{header, HeaderValue, Method, StatusCode};
use jsonapi_core::{
    ApiError, Context, Error, Handler, HandlerResult, Reply, ResponseWriter, TransportRequest,
    APPERR, ASIS, E301, E302, E303, E400, E404, E500,
};
use proptest::prelude::*;
use serde_json::json;

fn handler_returning(result: impl Fn() -> HandlerResult + Send + Sync + 'static) -> Handler {
    Handler::new(move |_ctx, _req| {
        let r = result();
        async move { r }
    })
}

async fn serve(h: &Handler, path: &str) -> ResponseWriter {
    let req = TransportRequest::new(Method::POST, path.parse().unwrap());
    h.serve_transport(Context::new(), req, Bytes::new()).await
}

fn body(w: &ResponseWriter) -> String {
    String::from_utf8(w.body().to_vec()).unwrap()
}

#[tokio::test]
async fn test_success_is_wrapped_in_data() {
    let h = handler_returning(|| Ok(Reply::json(&json!({"id": 1, "name": "a"}))));
    let w = serve(&h, "/").await;

    assert_eq!(w.status(), Some(StatusCode::OK));
    assert_eq!(body(&w), "{\"data\":{\"id\":1,\"name\":\"a\"}}\n");
    assert_eq!(
        w.header(header::CONTENT_TYPE),
        Some(HeaderValue::from_static("application/json"))
    );
}

#[tokio::test]
async fn test_empty_reply_is_null_data() {
    let h = handler_returning(|| Ok(Reply::Empty));
    let w = serve(&h, "/").await;
    assert_eq!(body(&w), "{\"data\":null}\n");
}

#[tokio::test]
async fn test_generic_error_is_500() {
    let h = handler_returning(|| Err(Error::msg("my error")));
    let w = serve(&h, "/").await;

    assert_eq!(w.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(body(&w), "{\"errors\":[{\"detail\":\"my error\"}]}\n");
}

#[tokio::test]
async fn test_api_error_uses_its_status() {
    let h = handler_returning(|| Err(E404.set_code("qq").set_data("my error").into()));
    let w = serve(&h, "/").await;

    assert_eq!(w.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(
        body(&w),
        "{\"errors\":[{\"code\":\"qq\",\"detail\":\"my error\"}]}\n"
    );
}

#[tokio::test]
async fn test_origin_is_never_sent() {
    let h = handler_returning(|| Err(E400.set_origin("secret database detail").into()));
    let w = serve(&h, "/").await;

    assert_eq!(w.status(), Some(StatusCode::BAD_REQUEST));
    assert!(!body(&w).contains("secret"));
}

#[tokio::test]
async fn test_apperr_replies_200_with_errors() {
    let h = handler_returning(|| Err(APPERR.set_code("quota").set_data("over quota").into()));
    let w = serve(&h, "/").await;

    assert_eq!(w.status(), Some(StatusCode::OK));
    assert_eq!(
        body(&w),
        "{\"errors\":[{\"code\":\"quota\",\"detail\":\"over quota\"}]}\n"
    );
}

#[tokio::test]
async fn test_redirects_have_no_body() {
    for (template, status) in [
        (E301, StatusCode::MOVED_PERMANENTLY),
        (E302, StatusCode::FOUND),
        (E303, StatusCode::SEE_OTHER),
    ] {
        let h = handler_returning(move || {
            Err(template.set_data("http://example.com/next").into())
        });
        let w = serve(&h, "/").await;

        assert_eq!(w.status(), Some(status));
        assert_eq!(
            w.header(header::LOCATION),
            Some(HeaderValue::from_static("http://example.com/next"))
        );
        assert!(w.body().is_empty());
    }
}

#[tokio::test]
async fn test_relative_redirect_resolves_against_path() {
    let h = handler_returning(|| Err(E302.set_data("login").into()));
    let w = serve(&h, "/api/user/profile").await;

    assert_eq!(
        w.header(header::LOCATION),
        Some(HeaderValue::from_static("/api/user/login"))
    );
}

#[tokio::test]
async fn test_redirect_to_unsendable_location_is_500() {
    let h = handler_returning(|| Err(E302.set_data("/next\r\nX-Injected: 1").into()));
    let w = serve(&h, "/").await;

    assert_eq!(w.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert!(w.header(header::LOCATION).is_none());
    assert_eq!(
        body(&w),
        "{\"errors\":[{\"detail\":\"Internal server error\"}]}\n"
    );
}

#[tokio::test]
async fn test_redirect_code_without_location_is_an_error() {
    let h = handler_returning(|| Err(E301.into()));
    let w = serve(&h, "/").await;

    assert_eq!(w.status(), Some(StatusCode::MOVED_PERMANENTLY));
    assert!(w.header(header::LOCATION).is_none());
    assert_eq!(
        body(&w),
        "{\"errors\":[{\"detail\":\"Resource has been moved permanently\"}]}\n"
    );
}

#[tokio::test]
async fn test_marshal_failure_is_500() {
    let h = handler_returning(|| {
        let mut bad = std::collections::HashMap::new();
        bad.insert((1, 2), "tuple keys are not JSON");
        Ok(Reply::json(&bad))
    });
    let w = serve(&h, "/").await;

    assert_eq!(w.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(
        body(&w),
        "{\"errors\":[{\"detail\":\"Failed to marshal data\"}]}\n"
    );
}

#[tokio::test]
async fn test_as_is_writes_raw_bytes() {
    let h = handler_returning(|| Err(Error::as_is("hello")));
    let w = serve(&h, "/").await;

    assert_eq!(body(&w), "hello");
    assert_eq!(w.status(), Some(StatusCode::OK));
}

#[tokio::test]
async fn test_as_is_respects_handler_status_and_headers() {
    let h = Handler::new(|_ctx, req| async move {
        let w = req.resp();
        w.set_header(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
        w.write_header(StatusCode::ACCEPTED);
        Err(Error::as_is(vec![b'a', b',', b'b']))
    });
    let w = serve(&h, "/").await;

    assert_eq!(w.status(), Some(StatusCode::ACCEPTED));
    assert_eq!(w.header(header::CONTENT_TYPE), Some(HeaderValue::from_static("text/csv")));
    assert_eq!(body(&w), "a,b");
}

#[tokio::test]
async fn test_bare_as_is_marker_writes_nothing() {
    let h = Handler::new(|_ctx, req| async move {
        req.resp().write(b"streamed by handler");
        Err(Error::from(ASIS))
    });
    let w = serve(&h, "/").await;
    assert_eq!(body(&w), "streamed by handler");
}

#[tokio::test]
async fn test_canceled_call_writes_nothing() {
    let h = Handler::new(|ctx: Context, _req| async move {
        ctx.cancel_token().cancel();
        Ok(Reply::from("too late"))
    });
    let req = TransportRequest::new(Method::GET, "/".parse().unwrap());
    let w = h.serve_transport(Context::new(), req, Bytes::new()).await;

    assert!(!w.is_committed());
    assert!(w.body().is_empty());
}

#[tokio::test]
async fn test_serve_reads_body() {
    let h = Handler::new(|_ctx, req| async move {
        let v: serde_json::Value = req.decode().map_err(|e| E400.set_origin(e))?;
        Ok(Reply::Json(v))
    });

    let req = http::Request::post("/echo")
        .body(http_body_util::Full::new(Bytes::from_static(b"{\"a\":[1,2]}")))
        .unwrap();
    let resp = h.serve(Context::new(), req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = http_body_util::BodyExt::collect(resp.into_body())
        .await
        .unwrap()
        .to_bytes();
    assert_eq!(&bytes[..], b"{\"data\":{\"a\":[1,2]}}\n");
}

fn template() -> impl Strategy<Value = ApiError> {
    prop_oneof![Just(E400), Just(E404), Just(E500), Just(APPERR)]
}

proptest! {
    #[test]
    fn prop_equality_ignores_only_origin(
        t in template(),
        d1 in "[a-z]{0,4}",
        d2 in "[a-z]{0,4}",
        c1 in "[a-z]{0,4}",
        c2 in "[a-z]{0,4}",
    ) {
        let a = t.set_data(d1.clone()).set_code(c1.clone()).set_origin("a");
        let b = t.set_data(d2.clone()).set_code(c2.clone()).set_origin("b");
        prop_assert_eq!(a.equal_to(&b), d1 == d2 && c1 == c2);
    }
}
