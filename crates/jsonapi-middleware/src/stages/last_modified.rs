//! Conditional replies based on `Last-Modified`.

use std::sync::Arc;
use std::time::SystemTime;

use http::{header, HeaderValue};
use jsonapi_core::{Handler, E304};

use crate::middleware::Middleware;

/// Answers `304 Not Modified` when the client copy is current.
///
/// The handler states the modification time of its data by setting the
/// `Last-Modified` response header. After a successful call, if the request
/// carries an `If-Modified-Since` that is not older than it, the reply is
/// replaced by [`E304`]. A `Date` header is added when the handler set none.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastModified;

fn parse_date(value: Option<&str>) -> Option<SystemTime> {
    value.and_then(|v| httpdate::parse_http_date(v).ok())
}

impl Middleware for LastModified {
    fn name(&self) -> &'static str {
        "last_modified"
    }

    fn wrap(&self, next: Handler) -> Handler {
        Handler::new(move |ctx, req| {
            let next = next.clone();
            async move {
                let reply = next.call(ctx, Arc::clone(&req)).await?;

                let w = req.resp();
                let has = w
                    .header(header::LAST_MODIFIED)
                    .and_then(|v| parse_date(v.to_str().ok()));
                let Some(has) = has else {
                    return Ok(reply);
                };

                if w.header(header::DATE).is_none() {
                    let now = httpdate::fmt_http_date(SystemTime::now());
                    if let Ok(v) = HeaderValue::from_str(&now) {
                        w.set_header(header::DATE, v);
                    }
                }

                match parse_date(req.req().header(header::IF_MODIFIED_SINCE)) {
                    Some(want) if has <= want => Err(E304.into()),
                    _ => Ok(reply),
                }
            }
        })
    }
}

/// Creates the middleware.
#[must_use]
pub fn last_modified() -> LastModified {
    LastModified
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Method, Uri};
    use jsonapi_core::{from_http, Context, HandlerResult, Reply, ResponseWriter, TransportRequest};

    const MODIFIED: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

    fn handler(lm: Option<&'static str>) -> Handler {
        last_modified().wrap(Handler::new(move |_, req| async move {
            if let Some(lm) = lm {
                req.resp()
                    .set_header(header::LAST_MODIFIED, HeaderValue::from_static(lm));
            }
            Ok(Reply::from("fresh"))
        }))
    }

    async fn call(h: &Handler, since: Option<&'static str>) -> (HandlerResult, ResponseWriter) {
        let mut req = TransportRequest::new(Method::GET, Uri::from_static("/"));
        if let Some(since) = since {
            req = req.with_header(header::IF_MODIFIED_SINCE, HeaderValue::from_static(since));
        }
        let w = ResponseWriter::new();
        let result = h
            .call(Context::new(), from_http(w.clone(), req, Bytes::new()))
            .await;
        (result, w)
    }

    #[tokio::test]
    async fn test_not_modified() {
        let (result, w) = call(&handler(Some(MODIFIED)), Some(MODIFIED)).await;
        assert!(result.unwrap_err().is(&E304));
        assert!(w.header(header::DATE).is_some());

        let (result, _) =
            call(&handler(Some(MODIFIED)), Some("Thu, 22 Oct 2015 07:28:00 GMT")).await;
        assert!(result.unwrap_err().is(&E304));
    }

    #[tokio::test]
    async fn test_modified_since() {
        let (result, _) =
            call(&handler(Some(MODIFIED)), Some("Tue, 20 Oct 2015 07:28:00 GMT")).await;
        assert!(matches!(result, Ok(Reply::Text(t)) if t == "fresh"));
    }

    #[tokio::test]
    async fn test_unparseable_dates_pass_through() {
        let (result, w) = call(&handler(None), Some(MODIFIED)).await;
        assert!(result.is_ok());
        assert!(w.header(header::DATE).is_none());

        let (result, _) = call(&handler(Some(MODIFIED)), Some("yesterday")).await;
        assert!(result.is_ok());

        let (result, _) = call(&handler(Some(MODIFIED)), None).await;
        assert!(result.is_ok());
    }
}
