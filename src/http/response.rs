//! HTTP response returned by a transport and served by the gateway.
//!
//! Responses are cheap to clone (the body is a [`Bytes`] buffer), which is
//! what lets one cached or shared response be handed to every waiter.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Headers, StatusCode};
use crate::error::GatewayError;

/// A received HTTP response.
///
/// # Examples
///
/// ```
/// use rgate::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::OK)
///     .header("Content-Type", "application/json")
///     .body(r#"{"minutes":25}"#);
///
/// assert!(response.is_success());
/// assert_eq!(response.value().unwrap()["minutes"], 25);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the whole header map.
    #[must_use]
    pub fn headers_from(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the response body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns `true` if the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the `Content-Type` header, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// Returns `true` if the `Content-Type` declares a JSON body.
    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
    }

    /// Returns the raw body bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body as JSON into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Decode`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        serde_json::from_slice(&self.body).map_err(GatewayError::decode)
    }

    /// Decodes the body by content type: JSON bodies are parsed, anything
    /// else is returned as a JSON string. An empty body decodes to `null`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Decode`] if a JSON-typed body does not parse.
    pub fn value(&self) -> Result<Value, GatewayError> {
        if self.body.is_empty() {
            return Ok(Value::Null);
        }
        if self.is_json() {
            self.json()
        } else {
            Ok(Value::String(self.text()))
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn json_content_type_is_parsed() {
        let r = Response::new(StatusCode::OK)
            .header("Content-Type", "application/json; charset=utf-8")
            .body(r#"{"a":[1,2]}"#);
        assert_eq!(r.value().unwrap(), serde_json::json!({"a": [1, 2]}));
    }

    #[test]
    fn other_content_types_become_strings() {
        let r = Response::new(StatusCode::OK)
            .header("Content-Type", "text/plain")
            .body("pong");
        assert_eq!(r.value().unwrap(), Value::String("pong".into()));
    }

    #[test]
    fn empty_body_is_null() {
        let r = Response::new(StatusCode::NO_CONTENT).header("Content-Type", "application/json");
        assert_eq!(r.value().unwrap(), Value::Null);
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let r = Response::new(StatusCode::OK)
            .header("Content-Type", "application/json")
            .body("{not json");
        let err = r.value().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn typed_json() {
        #[derive(serde::Deserialize)]
        struct Session {
            minutes: u32,
        }
        let r = Response::new(StatusCode::OK).body(r#"{"minutes":50}"#);
        let s: Session = r.json().unwrap();
        assert_eq!(s.minutes, 50);
    }
}
