//! Captured response.

use std::fmt;

use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use sextant_core::HeaderList;

use crate::error::TestError;

/// A response captured from the application, with helpers for assertions.
///
/// Headers are kept exactly as the application sent them: in order, with
/// duplicates.
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderList,
    body: Bytes,
}

impl TestResponse {
    /// Creates a test response from raw parts.
    pub fn new(status: StatusCode, headers: HeaderList, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns true if the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the status is 4xx.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// Returns true if the status is 5xx.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Returns the headers in the order they were sent.
    #[must_use]
    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        let name = name.as_ref();
        self.headers
            .iter()
            .find(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Returns the first header with the given name as a string.
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// Returns every value of a header, in order.
    pub fn header_all(&self, name: impl AsRef<str>) -> Vec<&str> {
        let name = name.as_ref();
        self.headers
            .iter()
            .filter(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
            .filter_map(|(_, value)| value.to_str().ok())
            .collect()
    }

    /// Returns the Content-Type header value.
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Returns the Content-Length header value.
    pub fn content_length(&self) -> Option<u64> {
        self.header_str(header::CONTENT_LENGTH.as_str())
            .and_then(|v| v.parse().ok())
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<String, TestError> {
        Ok(String::from_utf8(self.body.to_vec())?)
    }

    /// Deserializes the body as JSON.
    ///
    /// ```ignore
    /// let response = client.get("/").send()?;
    /// let body: serde_json::Value = response.json()?;
    /// assert_eq!(body["mock"], "example");
    /// ```
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Deserializes the body as a JSON Value.
    pub fn json_value(&self) -> Result<serde_json::Value, TestError> {
        self.json()
    }

    // Assertion methods

    /// Asserts that the status code equals the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {}, got {}",
            expected, self.status
        );
        self
    }

    /// Asserts that the status code equals the expected u16 value.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status_code(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status.as_u16(),
            expected,
            "Expected status {}, got {}",
            expected,
            self.status.as_u16()
        );
        self
    }

    /// Asserts that the response is successful (2xx).
    ///
    /// # Panics
    ///
    /// Panics if the status is not 2xx.
    pub fn assert_success(&self) -> &Self {
        assert!(
            self.is_success(),
            "Expected success status, got {}",
            self.status
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
            .unwrap_or_else(|| panic!("Header '{}' not found", name));
        assert_eq!(
            actual, expected,
            "Header '{}': expected '{}', got '{}'",
            name, expected, actual
        );
        self
    }

    /// Asserts that the Content-Type header starts with `expected`.
    ///
    /// # Panics
    ///
    /// Panics if Content-Type is missing or doesn't match.
    pub fn assert_content_type(&self, expected: impl AsRef<str>) -> &Self {
        let expected = expected.as_ref();
        let actual = self
            .content_type()
            .unwrap_or_else(|| panic!("Content-Type header not found"));
        assert!(
            actual.starts_with(expected),
            "Content-Type: expected '{}', got '{}'",
            expected,
            actual
        );
        self
    }

    /// Asserts that the body equals the expected string.
    ///
    /// # Panics
    ///
    /// Panics if the body is not UTF-8 or doesn't match.
    pub fn assert_body_eq(&self, expected: impl AsRef<str>) -> &Self {
        let body = String::from_utf8_lossy(&self.body);
        assert_eq!(body, expected.as_ref(), "Body mismatch");
        self
    }

    /// Asserts that the JSON body matches the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON or doesn't match.
    pub fn assert_json_eq(&self, expected: &serde_json::Value) -> &Self {
        match self.json_value() {
            Ok(actual) => assert_eq!(&actual, expected, "JSON body mismatch"),
            Err(err) => panic!("Body should be valid JSON: {err}"),
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderName;
    use serde_json::json;

    fn response(status: StatusCode, body: &'static str) -> TestResponse {
        TestResponse::new(
            status,
            vec![
                (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
                (HeaderName::from_static("set-cookie"), HeaderValue::from_static("a=1")),
                (HeaderName::from_static("set-cookie"), HeaderValue::from_static("b=2")),
                (header::CONTENT_LENGTH, HeaderValue::from_static("16")),
            ],
            Bytes::from_static(body.as_bytes()),
        )
    }

    #[test]
    fn test_status_helpers() {
        let ok = response(StatusCode::OK, "{}");
        assert!(ok.is_success());
        assert!(!ok.is_client_error());

        let missing = response(StatusCode::NOT_FOUND, "{}");
        assert!(missing.is_client_error());
        assert_eq!(missing.status_code(), 404);

        assert!(response(StatusCode::BAD_GATEWAY, "{}").is_server_error());
    }

    #[test]
    fn test_headers_keep_order_and_duplicates() {
        let response = response(StatusCode::OK, "{}");
        assert_eq!(response.header_str("Content-Type"), Some("application/json"));
        assert_eq!(response.header_all("set-cookie"), vec!["a=1", "b=2"]);
        assert_eq!(response.content_length(), Some(16));
        assert_eq!(response.headers()[1].0, "set-cookie");
    }

    #[test]
    fn test_json_body() {
        let response = response(StatusCode::OK, r#"{"mock":"example"}"#);
        assert_eq!(response.json_value().unwrap(), json!({"mock": "example"}));
        response
            .assert_status(StatusCode::OK)
            .assert_content_type("application/json")
            .assert_json_eq(&json!({"mock": "example"}));
    }

    #[test]
    fn test_invalid_utf8() {
        let response = TestResponse::new(StatusCode::OK, Vec::new(), Bytes::from_static(&[0xff]));
        assert!(matches!(response.text(), Err(TestError::Utf8(_))));
    }

    #[test]
    #[should_panic(expected = "Expected status 201 Created, got 200 OK")]
    fn test_assert_status_panics() {
        response(StatusCode::OK, "{}").assert_status(StatusCode::CREATED);
    }
}
