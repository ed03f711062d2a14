//! Test response wrapper.

use std::fmt;

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use jsonapi_core::{ApiError, Envelope, ErrObj, ResponseWriter};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TestError;

/// A served response with helpers for assertions.
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Creates a response from raw parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Captures what was written to `w`. An uncommitted writer counts as
    /// `200 OK`.
    pub fn from_writer(w: &ResponseWriter) -> Self {
        Self::new(w.status().unwrap_or(StatusCode::OK), w.headers(), w.body())
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns true if the status is successful (2xx).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns a reference to the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value by name.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the Content-Type header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        serde_json::from_slice(&self.body).map_err(TestError::Json)
    }

    /// Deserializes the body as a JSON value.
    pub fn json_value(&self) -> Result<Value, TestError> {
        self.json()
    }

    /// Decodes the `{"data":...,"errors":[...]}` envelope.
    pub fn envelope(&self) -> Result<Envelope, TestError> {
        self.json()
    }

    /// Decodes the `data` member into `T`.
    ///
    /// Fails if the response carries errors or no data.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        let envelope = self.envelope()?;
        if let Some(obj) = envelope.errors.first() {
            return Err(TestError::BodyRead(format!("response carries an error: {}", obj.detail)));
        }
        let data = envelope
            .data
            .ok_or_else(|| TestError::BodyRead("response carries no data".to_string()))?;
        Ok(serde_json::from_value(data)?)
    }

    /// The first element of `errors`, if any.
    pub fn error(&self) -> Result<Option<ErrObj>, TestError> {
        Ok(self.envelope()?.errors.into_iter().next())
    }

    /// Asserts that the status code equals the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    #[track_caller]
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "expected status {}, got {} with body {:?}",
            expected, self.status, self.body
        );
        self
    }

    /// Asserts that a header exists with the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the header doesn't exist or doesn't match.
    #[track_caller]
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let expected = expected.as_ref();
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("header '{name}' not found"));
        assert_eq!(actual, expected, "header '{name}': expected '{expected}', got '{actual}'");
        self
    }

    /// Asserts that the JSON body matches the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON or doesn't match.
    #[track_caller]
    pub fn assert_json_eq(&self, expected: &Value) -> &Self {
        let actual = self
            .json_value()
            .unwrap_or_else(|e| panic!("body should be valid JSON: {e}"));
        assert_eq!(&actual, expected, "JSON body mismatch");
        self
    }

    /// Asserts a successful envelope whose `data` equals `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the envelope carries errors or other data.
    #[track_caller]
    pub fn assert_data(&self, expected: &Value) -> &Self {
        let envelope = self
            .envelope()
            .unwrap_or_else(|e| panic!("body should be an envelope: {e}"));
        assert!(envelope.errors.is_empty(), "unexpected errors: {:?}", envelope.errors);
        assert_eq!(envelope.data.as_ref(), Some(expected), "data mismatch");
        self
    }

    /// Asserts the status and the error object written for `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the status or the error object differs.
    #[track_caller]
    pub fn assert_error(&self, expected: &ApiError) -> &Self {
        if let Ok(status) = u16::try_from(expected.code()) {
            if let Ok(status) = StatusCode::from_u16(status) {
                self.assert_status(status);
            }
        }
        let actual = self
            .error()
            .unwrap_or_else(|e| panic!("body should be an envelope: {e}"))
            .unwrap_or_else(|| panic!("expected error {expected}, got no errors"));
        assert_eq!(actual, expected.to_err_obj(), "error object mismatch");
        self
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}
