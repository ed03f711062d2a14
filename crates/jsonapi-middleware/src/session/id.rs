//! Passing session ids between server and client.

use std::sync::Arc;
use std::time::Duration;

use http::{header, HeaderValue};
use jsonapi_core::cookie::{expiry_after, max_http_date};
use jsonapi_core::{Request, ResponseWriter, SetCookie};

use super::SessionError;

/// Reads the session id sent by the client and hands new ids to it.
pub trait IdHandler: Send + Sync {
    /// Returns the id carried by `req`, if any.
    fn get(&self, req: &dyn Request) -> Option<String>;

    /// Passes `id` to the client.
    fn set(&self, resp: &ResponseWriter, id: &str) -> Result<(), SessionError>;
}

/// Encrypts session ids before they reach the client.
pub trait Encrypter: Send + Sync {
    /// Encrypts an id.
    fn encrypt(&self, id: &str) -> String;

    /// Decrypts what [`encrypt`](Self::encrypt) produced.
    fn decrypt(&self, data: &str) -> Result<String, SessionError>;
}

fn set_cookie(resp: &ResponseWriter, cookie: &SetCookie) -> Result<(), SessionError> {
    let value = cookie
        .to_header_value()
        .ok_or_else(|| SessionError::InvalidId(cookie.value().to_string()))?;
    resp.append_header(header::SET_COOKIE, value);
    Ok(())
}

/// Keeps the id in an http-only session cookie.
#[derive(Debug, Clone)]
pub struct InCookieSimple {
    key: String,
}

impl InCookieSimple {
    /// Uses the cookie named `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl IdHandler for InCookieSimple {
    fn get(&self, req: &dyn Request) -> Option<String> {
        req.req().cookie(&self.key)
    }

    fn set(&self, resp: &ResponseWriter, id: &str) -> Result<(), SessionError> {
        set_cookie(resp, &SetCookie::new(&self.key, id).http_only(true))
    }
}

/// Keeps the id in a request and response header.
#[derive(Debug, Clone)]
pub struct InHeader {
    name: String,
}

impl InHeader {
    /// Uses the header `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl IdHandler for InHeader {
    fn get(&self, req: &dyn Request) -> Option<String> {
        req.req().header(self.name.as_str()).map(str::to_string)
    }

    fn set(&self, resp: &ResponseWriter, id: &str) -> Result<(), SessionError> {
        let name = header::HeaderName::from_bytes(self.name.as_bytes())
            .map_err(|e| SessionError::Store(format!("invalid header name {}: {e}", self.name)))?;
        let value =
            HeaderValue::from_str(id).map_err(|_| SessionError::InvalidId(id.to_string()))?;
        resp.set_header(name, value);
        Ok(())
    }
}

/// Keeps the id in a cookie with more control over its lifetime.
#[derive(Clone, Default)]
pub struct InCookie {
    /// Cookie name.
    pub key: String,
    /// Encrypts the id when set.
    pub encrypter: Option<Arc<dyn Encrypter>>,
    /// Lifetime of the cookie. Zero makes an http-only cookie that lasts
    /// until the browser closes.
    pub ttl: Duration,
    /// Pushes the expiry back on each access. Ignored when `ttl` is zero.
    pub auto_refresh: bool,
    /// Sets the `Secure` flag.
    pub secure: bool,
}

impl InCookie {
    /// Uses the cookie named `key`, without encryption or expiry.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for InCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InCookie")
            .field("key", &self.key)
            .field("encrypted", &self.encrypter.is_some())
            .field("ttl", &self.ttl)
            .field("auto_refresh", &self.auto_refresh)
            .field("secure", &self.secure)
            .finish()
    }
}

impl IdHandler for InCookie {
    fn get(&self, req: &dyn Request) -> Option<String> {
        let raw = req.req().cookie(&self.key)?;
        let id = match &self.encrypter {
            Some(enc) => match enc.decrypt(&raw) {
                Ok(id) => id,
                Err(e) => {
                    tracing::debug!(error = %e, "cannot decrypt session id");
                    return None;
                }
            },
            None => raw.clone(),
        };

        if self.auto_refresh && !self.ttl.is_zero() {
            let cookie = SetCookie::new(&self.key, raw)
                .expires(expiry_after(self.ttl).unwrap_or_else(max_http_date))
                .secure(self.secure);
            if let Err(e) = set_cookie(req.resp(), &cookie) {
                tracing::warn!(error = %e, "failed to refresh session cookie");
            }
        }

        Some(id)
    }

    fn set(&self, resp: &ResponseWriter, id: &str) -> Result<(), SessionError> {
        let value = self
            .encrypter
            .as_ref()
            .map_or_else(|| id.to_string(), |enc| enc.encrypt(id));

        let mut cookie = SetCookie::new(&self.key, value).secure(self.secure);
        cookie = if self.ttl.is_zero() {
            cookie.http_only(true)
        } else {
            cookie.expires(expiry_after(self.ttl).unwrap_or_else(max_http_date))
        };
        set_cookie(resp, &cookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Method, Uri};
    use jsonapi_core::{from_http, DynRequest, TransportRequest};

    struct Reverse;

    impl Encrypter for Reverse {
        fn encrypt(&self, id: &str) -> String {
            id.chars().rev().collect()
        }

        fn decrypt(&self, data: &str) -> Result<String, SessionError> {
            if data.starts_with('!') {
                return Err(SessionError::InvalidId(data.to_string()));
            }
            Ok(data.chars().rev().collect())
        }
    }

    fn with_cookie(cookie: &str) -> (DynRequest, ResponseWriter) {
        let req = TransportRequest::new(Method::GET, Uri::from_static("/"))
            .with_header(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        let w = ResponseWriter::new();
        (from_http(w.clone(), req, Bytes::new()), w)
    }

    fn set_cookie_header(w: &ResponseWriter) -> String {
        w.header(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default()
    }

    #[test]
    fn test_in_cookie_simple() {
        let h = InCookieSimple::new("sid");
        let (req, _) = with_cookie("a=1; sid=xyz");
        assert_eq!(h.get(req.as_ref()).as_deref(), Some("xyz"));

        let w = ResponseWriter::new();
        h.set(&w, "new").unwrap();
        assert_eq!(set_cookie_header(&w), "sid=new; HttpOnly");
    }

    #[test]
    fn test_in_header() {
        let h = InHeader::new("x-sid");
        let req = TransportRequest::new(Method::GET, Uri::from_static("/"))
            .with_header("x-sid", HeaderValue::from_static("abc"));
        let req = from_http(ResponseWriter::new(), req, Bytes::new());
        assert_eq!(h.get(req.as_ref()).as_deref(), Some("abc"));

        let w = ResponseWriter::new();
        h.set(&w, "def").unwrap();
        assert_eq!(w.header("x-sid"), Some(HeaderValue::from_static("def")));
    }

    #[test]
    fn test_in_cookie_encrypts() {
        let h = InCookie {
            encrypter: Some(Arc::new(Reverse)),
            ..InCookie::new("sid")
        };
        let (req, w) = with_cookie("sid=cba");
        assert_eq!(h.get(req.as_ref()).as_deref(), Some("abc"));
        assert!(w.header(header::SET_COOKIE).is_none());

        let w = ResponseWriter::new();
        h.set(&w, "abc").unwrap();
        assert_eq!(set_cookie_header(&w), "sid=cba; HttpOnly");

        let (req, _) = with_cookie("sid=!bad");
        assert!(h.get(req.as_ref()).is_none());
    }

    #[test]
    fn test_in_cookie_ttl() {
        let h = InCookie {
            ttl: Duration::from_secs(3600),
            auto_refresh: true,
            secure: true,
            ..InCookie::new("sid")
        };

        let w = ResponseWriter::new();
        h.set(&w, "abc").unwrap();
        let c = set_cookie_header(&w);
        assert!(c.starts_with("sid=abc; Expires="));
        assert!(c.contains("Secure"));
        assert!(!c.contains("HttpOnly"));

        let (req, w) = with_cookie("sid=abc");
        assert_eq!(h.get(req.as_ref()).as_deref(), Some("abc"));
        assert!(set_cookie_header(&w).contains("Expires="));
    }

    #[test]
    fn test_in_cookie_huge_ttl_expires_in_year_9999() {
        let h = InCookie {
            ttl: Duration::from_secs(400_000_000_000),
            auto_refresh: true,
            ..InCookie::new("sid")
        };

        let w = ResponseWriter::new();
        h.set(&w, "abc").unwrap();
        assert_eq!(
            set_cookie_header(&w),
            "sid=abc; Expires=Fri, 31 Dec 9999 23:59:59 GMT"
        );

        let (req, w) = with_cookie("sid=abc");
        assert_eq!(h.get(req.as_ref()).as_deref(), Some("abc"));
        assert!(set_cookie_header(&w).contains("9999"));
    }
}
