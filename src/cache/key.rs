//! Cache and deduplication key derivation.

use std::fmt;

use serde_json::Value;
use url::form_urlencoded;

use crate::http::Method;

/// Identity of a logical request, shared by the response cache and the
/// in-flight registry.
///
/// Two requests get equal keys iff they have the same normalized method,
/// the same path, the same query parameters (in any order), and, for
/// body-carrying methods, JSON bodies that are equal after sorting object
/// keys.
///
/// # Examples
///
/// ```
/// use rgate::cache::CacheKey;
/// use rgate::http::Method;
/// use serde_json::json;
///
/// let a = CacheKey::derive(&Method::Post, "/x", &[], Some(&json!({"a": 1, "b": 2})));
/// let b = CacheKey::derive(&Method::Post, "/x", &[], Some(&json!({"b": 2, "a": 1})));
/// assert_eq!(a, b);
///
/// let q = CacheKey::derive(&Method::Get, "/tasks?page=2&done=false", &[], None);
/// assert_eq!(q.to_string(), "GET /tasks?done=false&page=2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: Method,
    path: String,
    query: String,
    body: Option<String>,
}

impl CacheKey {
    /// Derives the key for `method path` with extra query `params` and an
    /// optional JSON `body`.
    ///
    /// Query parameters already present in `path` are merged with `params`,
    /// then stably sorted by name so repeated names keep their relative order.
    /// The body only contributes for methods that carry one.
    pub fn derive(
        method: &Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> Self {
        let (path, inline_query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };

        let mut pairs: Vec<(String, String)> = inline_query
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        pairs.extend(params.iter().cloned());
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter())
            .finish();

        let body = body
            .filter(|_| method.has_body())
            .map(canonical_json);

        Self {
            method: method.clone(),
            path: path.to_owned(),
            query,
            body,
        }
    }

    /// Returns the normalized method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the path without its query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the canonical, percent-encoded query string (may be empty).
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Returns the canonical body serialization, if the key has one.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Returns the request target: path plus canonical query.
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if let Some(body) = &self.body {
            write!(f, " {body}")?;
        }
        Ok(())
    }
}

/// Serializes `value` with object keys sorted at every depth.
///
/// `serde_json::Map` ordering depends on the `preserve_order` feature, which
/// any crate in the build can switch on, so sorting is done here explicitly.
pub(crate) fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Serializing a string to JSON cannot fail.
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
