//! Outgoing HTTP request handed to a [`Transport`](crate::transport::Transport).

use bytes::Bytes;

use super::{Headers, Method};

/// A fully resolved outgoing request: absolute URL, merged headers, and an
/// already-serialized body.
///
/// The gateway builds one per logical call and clones it for every retry
/// attempt; the body is a [`Bytes`] buffer so clones are cheap.
///
/// # Examples
///
/// ```
/// use rgate::http::{Method, Request};
///
/// let request = Request::new(Method::Post, "https://api.example.com/tasks")
///     .header("Content-Type", "application/json")
///     .body_bytes(r#"{"title":"read"}"#);
///
/// assert_eq!(request.method(), &Method::Post);
/// assert_eq!(request.url(), "https://api.example.com/tasks");
/// assert_eq!(request.headers().get("content-type"), Some("application/json"));
/// assert_eq!(request.body().map(|b| b.len()), Some(16));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    url: String,
    headers: Headers,
    body: Option<Bytes>,
}

impl Request {
    /// Creates a request with no headers and no body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    /// Appends a request header. Multiple calls with the same name are additive.
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

    /// Sets the request body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the absolute request URL, including the canonical query string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the serialized body, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_is_bare() {
        let req = Request::new(Method::Get, "/api/sessions");
        assert_eq!(req.url(), "/api/sessions");
        assert!(req.headers().is_empty());
        assert!(req.body().is_none());
    }

    #[test]
    fn headers_from_replaces_existing() {
        let mut headers = Headers::new();
        headers.insert("Accept", "application/json");
        let req = Request::new(Method::Get, "/")
            .header("X-Old", "1")
            .headers_from(headers);
        assert!(!req.headers().contains("x-old"));
        assert_eq!(req.headers().get("accept"), Some("application/json"));
    }

    #[test]
    fn clones_share_body_buffer() {
        let req = Request::new(Method::Put, "/x").body_bytes(vec![1u8, 2, 3]);
        let copy = req.clone();
        assert_eq!(
            req.body().map(|b| b.as_ptr()),
            copy.body().map(|b| b.as_ptr())
        );
    }
}
