//! The response envelope protocol.
//!
//! [`Handler::serve`] turns a handler into a transport-level service:
//!
//! 1. `Content-Type: application/json` is set before the handler runs, so the
//!    handler may still override it.
//! 2. The handler is called with the per-call [`Context`] and a fresh request.
//! 3. If the context was canceled meanwhile, nothing is written.
//! 4. Otherwise the result is written as `{"data":...}` or
//!    `{"errors":[...]}`, as a redirect, or as-is.
//!
//! Every body is followed by a newline.

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrObj, Error, ASIS, E500};
use crate::handler::{Handler, HandlerResult, Reply};
use crate::request::{from_http, ResponseWriter, TransportRequest};
use crate::Context;

/// Content type of every envelope.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Message of the error reported when the success data cannot be encoded.
pub const MARSHAL_FAILURE: &str = "Failed to marshal data";

/// Wire shape of a response, as seen by clients.
///
/// Exactly one of the members is present in a server response. `errors`
/// always holds a single element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Failure details.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrObj>,
}

#[derive(Serialize)]
struct DataEnvelope<'a> {
    data: &'a Reply,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    errors: [ErrObj; 1],
}

impl Handler {
    /// Serves an `http` request through the envelope protocol.
    ///
    /// The body is read to the end before the handler runs. A body which
    /// fails to read is logged and treated as empty.
    pub async fn serve<B>(&self, ctx: Context, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: http_body::Body + Send,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = req.into_parts();
        let payload = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read request body");
                Bytes::new()
            }
        };

        self.serve_transport(ctx, TransportRequest::from_parts(&parts), payload)
            .await
            .to_response()
    }

    /// Serves an already read request and returns the written response.
    pub async fn serve_transport(
        &self,
        ctx: Context,
        req: TransportRequest,
        payload: Bytes,
    ) -> ResponseWriter {
        let w = ResponseWriter::new();
        w.set_header(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));

        let path = req.path().to_string();
        let q = from_http(w.clone(), req, payload);
        let result = self.call(ctx.clone(), q).await;

        if let Some(reason) = ctx.err() {
            tracing::debug!(
                request_id = %ctx.request_id(),
                reason = %reason,
                "call canceled, response suppressed"
            );
            return w;
        }

        write_result(&w, &path, result);
        w
    }
}

/// Writes a handler result to `w`.
///
/// `path` is the request path, used to resolve relative redirect locations.
pub fn write_result(w: &ResponseWriter, path: &str, result: HandlerResult) {
    let err = match result {
        Ok(reply) => match serde_json::to_vec(&DataEnvelope { data: &reply }) {
            Ok(mut buf) => {
                buf.push(b'\n');
                w.write(&buf);
                return;
            }
            Err(e) => Error::Api(E500.set_data(MARSHAL_FAILURE).set_origin(e)),
        },
        Err(e) => e,
    };

    match err {
        Error::AsIs(reply) => reply.write_raw(w),
        Error::Api(e) if e.equal_to(&ASIS) => {}
        Error::Api(e) if e.is_redirect() => {
            redirect(w, path, e.code(), e.location());
        }
        Error::Api(e) => {
            w.write_header(status_of(e.code()));
            write_errors(w, e.to_err_obj());
        }
        Error::Other(e) => {
            w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
            write_errors(w, ErrObj::from_message(e.to_string()));
        }
    }
}

fn write_errors(w: &ResponseWriter, obj: ErrObj) {
    match serde_json::to_vec(&ErrorEnvelope { errors: [obj] }) {
        Ok(mut buf) => {
            buf.push(b'\n');
            w.write(&buf);
        }
        Err(e) => tracing::error!(error = %e, "failed to encode error envelope"),
    }
}

fn status_of(code: i32) -> StatusCode {
    u16::try_from(code)
        .ok()
        .and_then(|c| StatusCode::from_u16(c).ok())
        .unwrap_or_else(|| {
            tracing::warn!(code, "invalid status code in error, replying 500");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

// A target which cannot go into a header is reported as a 500 envelope.
fn redirect(w: &ResponseWriter, path: &str, code: i32, location: &str) {
    let location = resolve_location(path, location);
    match HeaderValue::from_str(&location) {
        Ok(v) => {
            w.set_header(header::LOCATION, v);
            w.write_header(status_of(code));
        }
        Err(e) => {
            tracing::warn!(error = %e, location = ?location, "invalid redirect location");
            w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
            write_errors(w, E500.set_origin(e).to_err_obj());
        }
    }
}

/// Resolves a redirect target against the request path.
///
/// Targets with a scheme are used verbatim. Other targets are made absolute
/// (relative ones against the directory of `path`) and cleaned of `.` and
/// `..` segments. Non-ASCII bytes are percent-encoded.
#[must_use]
pub fn resolve_location(path: &str, location: &str) -> String {
    if has_scheme(location) {
        return escape_non_ascii(location);
    }

    let (target, query) = match location.find(|c: char| c == '?' || c == '#') {
        Some(i) => location.split_at(i),
        None => (location, ""),
    };

    let mut full = if target.starts_with('/') {
        target.to_string()
    } else {
        let dir = path.rfind('/').map_or("/", |i| &path[..=i]);
        let dir = if dir.starts_with('/') { dir.to_string() } else { format!("/{dir}") };
        format!("{dir}{target}")
    };

    let trailing = full.ends_with('/') || target.is_empty();
    full = clean_path(&full);
    if trailing && !full.ends_with('/') {
        full.push('/');
    }

    escape_non_ascii(&(full + query))
}

fn has_scheme(s: &str) -> bool {
    let Some(i) = s.find(':') else {
        return false;
    };
    let scheme = &s[..i];
    !scheme.is_empty()
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn clean_path(p: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for seg in p.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            s => stack.push(s),
        }
    }
    format!("/{}", stack.join("/"))
}

fn escape_non_ascii(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii() {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
