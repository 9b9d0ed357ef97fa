//! Test response wrapper.

use crate::error::TestError;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A dispatched response with helpers for assertions.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Wraps an HTTP response.
    pub fn from_http(response: http::Response<Bytes>) -> Self {
        let (parts, body) = response.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
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

    /// Returns the headers.
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

    /// Returns the `Content-Type` header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as UTF-8 text.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("Invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        serde_json::from_slice(&self.body).map_err(TestError::Json)
    }

    /// Deserializes the body as a JSON value.
    pub fn json_value(&self) -> Result<Value, TestError> {
        self.json()
    }

    /// The envelope's `status` field: `success`, `redirect` or `error`.
    pub fn envelope_status(&self) -> Result<String, TestError> {
        self.envelope_str("status")
    }

    /// The envelope's `message` field.
    pub fn message(&self) -> Result<String, TestError> {
        self.envelope_str("message")
    }

    fn envelope_str(&self, key: &str) -> Result<String, TestError> {
        self.json_value()?
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TestError::BodyRead(format!("envelope has no string '{key}'")))
    }

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {expected}, got {}: {}",
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts the status code as a u16.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status_code(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status.as_u16(),
            expected,
            "Expected status {expected}, got {}: {}",
            self.status.as_u16(),
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts that a header exists with the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the header doesn't exist or doesn't match.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let expected = expected.as_ref();
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("Header '{name}' not found"));
        assert_eq!(actual, expected, "Header '{name}': expected '{expected}', got '{actual}'");
        self
    }

    /// Asserts that a header is absent.
    ///
    /// # Panics
    ///
    /// Panics if the header is present.
    pub fn assert_no_header(&self, name: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        assert!(self.header(name).is_none(), "Header '{name}' unexpectedly present");
        self
    }

    /// Asserts the envelope's `message`.
    ///
    /// # Panics
    ///
    /// Panics if the body is not an envelope or the message differs.
    pub fn assert_message(&self, expected: impl AsRef<str>) -> &Self {
        let actual = self
            .message()
            .unwrap_or_else(|e| panic!("no envelope message: {e}"));
        assert_eq!(actual, expected.as_ref());
        self
    }
}
