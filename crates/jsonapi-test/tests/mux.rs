//! A small service served in memory: a mux, a middleware chain and a
//! session store.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use jsonapi_core::{
    register_all, convert_camel_to_snake, Context, Error, Handler, HandlerSet, Reply, E404,
};
use jsonapi_middleware::session::{get_session, session, InHeader, MemoryStore, StoreProvider};
use jsonapi_middleware::stages::cors_any;
use jsonapi_middleware::Chain;
use jsonapi_server::ServeMux;
use jsonapi_test::{assert_error, Test, TestClient};
use serde_json::json;

struct Counter;

impl HandlerSet for Counter {
    fn handlers(&self) -> Vec<(&'static str, Handler)> {
        vec![
            (
                "Visit",
                Handler::new(|_, req| async move {
                    let Some(sess) = get_session(req.as_ref(), "session") else {
                        return Err(Error::msg("no session"));
                    };
                    let mut sess = sess.lock();
                    let visits = sess.get("visits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
                    sess.set("visits", visits.into());
                    sess.save()?;
                    Ok(Reply::json(&visits))
                }),
            ),
            (
                "GetItem",
                Handler::typed(|_: Context, id: u32| async move {
                    match id {
                        1 => Ok(json!({"id": 1, "name": "apple"})),
                        _ => Err(Error::from(E404.set_data("no such item"))),
                    }
                }),
            ),
        ]
    }
}

fn service() -> ServeMux {
    let provider = StoreProvider::new(
        Arc::new(InHeader::new("x-session")),
        Arc::new(MemoryStore::new()),
        Duration::from_secs(60),
    );
    let chain = Chain::new(session(Arc::new(provider), "session")).with(cors_any());

    let mut mux = ServeMux::new();
    chain.register_all(&mut mux, "/api", &Counter, Some(convert_camel_to_snake));
    mux
}

#[tokio::test]
async fn test_session_survives_between_requests() {
    let client = TestClient::new(service());

    let first = client.post("/api/visit").send().await;
    first
        .assert_status(StatusCode::OK)
        .assert_header("access-control-allow-origin", "*")
        .assert_data(&json!(1));
    let sid = first.header_str("x-session").unwrap().to_string();

    let second = client.post("/api/visit").header("x-session", &sid).send().await;
    second.assert_data(&json!(2));
}

#[tokio::test]
async fn test_typed_handler_errors() {
    let client = TestClient::new(service());

    client
        .post("/api/get_item")
        .json(&1)
        .send()
        .await
        .assert_data(&json!({"id": 1, "name": "apple"}));

    let missing = client.post("/api/get_item").json(&7).send().await;
    missing.assert_error(&E404.set_data("no such item"));

    client.get("/api/nothing").send().await.assert_error(&E404);
}

#[tokio::test]
async fn test_harness_on_mux() {
    let result = Test::new(service()).use_data(&1).await;
    // POST / is not routed.
    assert_error(&E404, result);
}
