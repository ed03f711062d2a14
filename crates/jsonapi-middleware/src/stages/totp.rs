//! Time-based one-time password authentication.
//!
//! Codes follow RFC 4226 (HOTP) over 30-second time frames. Only the current
//! and the previous frame are accepted.
//!
//! ```
//! use jsonapi_middleware::stages::totp_in_header;
//!
//! let secret = [0xca, 0xfe, 0xba, 0xbe, 0xde, 0xad, 0xbe, 0xef, 0x4b, 0x1d];
//! let m = totp_in_header(secret, "X-OTP-CODE");
//! assert_eq!(m.hotp(0), "323633");
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use http::{header, Method};
use jsonapi_core::{ApiError, Error, Handler, Request};
use sha1::Sha1;

use crate::middleware::Middleware;

/// Default header carrying the code.
pub const DEFAULT_OTP_HEADER: &str = "X-OTP-CODE";

/// Length of a time frame in seconds.
pub const TIME_STEP: u64 = 30;

/// Error returned when authentication fails.
pub const E403_TOTP: ApiError = ApiError::new(403, "failed to auth with TOTP");

/// Extracts the code from a request.
pub type CodeSource = Arc<dyn Fn(&dyn Request) -> String + Send + Sync>;

/// Builds the error of a failed authentication.
pub type FailHandler = Arc<dyn Fn(&dyn Request) -> Error + Send + Sync>;

/// Rejects calls that do not carry a valid TOTP code.
#[derive(Clone)]
pub struct TotpMiddleware {
    /// 80-bit binary secret.
    pub secret: [u8; 10],
    /// Number of digits of a code. Values below 6 count as 6.
    pub digit: usize,
    /// Where to read the code, the [`DEFAULT_OTP_HEADER`] header when `None`.
    pub get_code: Option<CodeSource>,
    /// The error to return, [`E403_TOTP`] when `None`.
    pub failed: Option<FailHandler>,
}

impl TotpMiddleware {
    /// Creates the middleware with the default code source and failure.
    #[must_use]
    pub fn new(secret: [u8; 10]) -> Self {
        Self {
            secret,
            digit: 6,
            get_code: None,
            failed: None,
        }
    }

    /// Computes the HOTP code for `counter`.
    #[must_use]
    pub fn hotp(&self, counter: i64) -> String {
        let digit = self.digit.max(6);

        let Ok(mut mac) = Hmac::<Sha1>::new_from_slice(&self.secret) else {
            return String::new();
        };
        mac.update(&counter.to_be_bytes());
        let hs = mac.finalize().into_bytes();

        let offset = usize::from(hs[19] & 0x0f);
        let snum = u32::from_be_bytes([hs[offset], hs[offset + 1], hs[offset + 2], hs[offset + 3]])
            & 0x7fff_ffff;

        let code = snum.to_string();
        if code.len() < digit {
            format!("{code:0>digit$}")
        } else {
            code[code.len() - digit..].to_string()
        }
    }

    /// Checks `code` against the frame containing `unix_secs` and the one
    /// before it.
    #[must_use]
    pub fn verify_at(&self, code: &str, unix_secs: u64) -> bool {
        let frame = i64::try_from(unix_secs / TIME_STEP).unwrap_or(i64::MAX);
        self.hotp(frame) == code || self.hotp(frame - 1) == code
    }

    /// Checks `code` against the current time.
    #[must_use]
    pub fn verify(&self, code: &str) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.verify_at(code, now)
    }
}

impl fmt::Debug for TotpMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TotpMiddleware")
            .field("digit", &self.digit)
            .finish_non_exhaustive()
    }
}

impl Middleware for TotpMiddleware {
    fn name(&self) -> &'static str {
        "totp"
    }

    fn wrap(&self, next: Handler) -> Handler {
        let mut totp = self.clone();
        let get_code = totp
            .get_code
            .take()
            .unwrap_or_else(|| otp_code_by_header(DEFAULT_OTP_HEADER));
        let failed: FailHandler = totp
            .failed
            .take()
            .unwrap_or_else(|| Arc::new(|_: &dyn Request| Error::Api(E403_TOTP)));
        let totp = Arc::new(totp);

        Handler::new(move |ctx, req| {
            let next = next.clone();
            let totp = Arc::clone(&totp);
            let get_code = Arc::clone(&get_code);
            let failed = Arc::clone(&failed);
            async move {
                if !totp.verify(&get_code(req.as_ref())) {
                    tracing::debug!(path = %req.req().path(), "TOTP verification failed");
                    return Err(failed(req.as_ref()));
                }
                next.call(ctx, req).await
            }
        })
    }
}

/// Reads the code from a request header.
#[must_use]
pub fn otp_code_by_header(key: &str) -> CodeSource {
    let key = key.to_string();
    Arc::new(move |req| req.req().header(key.as_str()).unwrap_or_default().to_string())
}

/// Reads the code from a url-encoded `POST`, `PUT` or `PATCH` body.
#[must_use]
pub fn otp_code_by_form(key: &str) -> CodeSource {
    let key = key.to_string();
    Arc::new(move |req| {
        let q = req.req();
        if !matches!(*q.method(), Method::POST | Method::PUT | Method::PATCH) {
            return String::new();
        }
        let is_form = q
            .header(header::CONTENT_TYPE)
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if !is_form {
            return String::new();
        }

        serde_urlencoded::from_bytes::<Vec<(String, String)>>(req.payload())
            .ok()
            .and_then(|pairs| pairs.into_iter().find(|(k, _)| *k == key))
            .map(|(_, v)| v)
            .unwrap_or_default()
    })
}

/// TOTP with the code in header `key`.
#[must_use]
pub fn totp_in_header(secret: [u8; 10], key: &str) -> TotpMiddleware {
    TotpMiddleware {
        get_code: Some(otp_code_by_header(key)),
        ..TotpMiddleware::new(secret)
    }
}

/// TOTP with the code in form field `key`.
#[must_use]
pub fn totp_in_form(secret: [u8; 10], key: &str) -> TotpMiddleware {
    TotpMiddleware {
        get_code: Some(otp_code_by_form(key)),
        ..TotpMiddleware::new(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderValue, Uri};
    use jsonapi_core::{from_http, Context, Reply, ResponseWriter, TransportRequest};

    const SECRET: [u8; 10] = [0xca, 0xfe, 0xba, 0xbe, 0xde, 0xad, 0xbe, 0xef, 0x4b, 0x1d];

    #[test]
    fn test_hotp_vectors() {
        let m = TotpMiddleware::new(SECRET);
        assert_eq!(m.hotp(0), "323633");
        assert_eq!(m.hotp(1), "178548");
        assert_eq!(m.hotp(16), "000635");
    }

    #[test]
    fn test_default_failure_is_e403() {
        assert!(E403_TOTP.equal_to(&jsonapi_core::E403.set_data("failed to auth with TOTP")));
    }

    #[test]
    fn test_hotp_digit_clamped() {
        let m = TotpMiddleware {
            digit: 4,
            ..TotpMiddleware::new(SECRET)
        };
        assert_eq!(m.hotp(0).len(), 6);

        let m = TotpMiddleware {
            digit: 12,
            ..TotpMiddleware::new(SECRET)
        };
        let code = m.hotp(0);
        assert_eq!(code.len(), 12);
        assert!(code.ends_with("323633"));
    }

    #[test]
    fn test_verify_windows() {
        let m = TotpMiddleware::new(SECRET);
        let now = 16 * TIME_STEP + 5;
        assert!(m.verify_at(&m.hotp(16), now));
        assert!(m.verify_at(&m.hotp(15), now));
        assert!(!m.verify_at(&m.hotp(14), now));
        assert!(!m.verify_at(&m.hotp(17), now));
    }

    fn ok_handler() -> Handler {
        Handler::new(|_, _| async { Ok(Reply::from("secret stuff")) })
    }

    #[tokio::test]
    async fn test_header_code() {
        let m = totp_in_header(SECRET, "x-otp");
        let h = m.wrap(ok_handler());

        let code = HeaderValue::from_str(&{
            let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
            m.hotp(i64::try_from(now / TIME_STEP).unwrap())
        })
        .unwrap();
        let good =
            TransportRequest::new(Method::GET, Uri::from_static("/")).with_header("x-otp", code);
        let req = from_http(ResponseWriter::new(), good, Bytes::new());
        assert!(h.call(Context::new(), req).await.is_ok());

        let missing = TransportRequest::new(Method::GET, Uri::from_static("/"));
        let req = from_http(ResponseWriter::new(), missing, Bytes::new());
        let err = h.call(Context::new(), req).await.unwrap_err();
        assert!(err.is(&E403_TOTP));
    }

    #[tokio::test]
    async fn test_custom_failure() {
        let m = TotpMiddleware {
            failed: Some(Arc::new(|_: &dyn Request| Error::msg("nope"))),
            ..TotpMiddleware::new(SECRET)
        };
        let h = m.wrap(ok_handler());
        let req = from_http(
            ResponseWriter::new(),
            TransportRequest::new(Method::GET, Uri::from_static("/")),
            Bytes::new(),
        );
        let err = h.call(Context::new(), req).await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn test_code_by_form() {
        let source = otp_code_by_form("otp");
        let post = TransportRequest::new(Method::POST, Uri::from_static("/")).with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let req = from_http(
            ResponseWriter::new(),
            post.clone(),
            Bytes::from_static(b"user=a&otp=123456"),
        );
        assert_eq!(source(req.as_ref()), "123456");

        let get = TransportRequest::new(Method::GET, Uri::from_static("/"));
        let req = from_http(ResponseWriter::new(), get, Bytes::from_static(b"otp=123456"));
        assert_eq!(source(req.as_ref()), "");
    }
}
