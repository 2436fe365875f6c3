//! Header list attached to outgoing requests and received responses.
//!
//! Names compare case-insensitively (RFC 9110 §5.1); entries keep the order
//! they were added in.

/// Ordered `(name, value)` pairs; a name may repeat.
///
/// The gateway layers its configured default headers under per-call headers
/// with [`set`](Self::set), so a per-call `Content-Type` replaces the default
/// rather than appearing twice.
///
/// # Examples
///
/// ```
/// use rgate::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "application/json");
/// headers.set("content-type", "text/plain");
/// headers.insert("Accept", "a");
/// headers.insert("Accept", "b");
///
/// assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
/// let all: Vec<_> = headers.get_all("accept").collect();
/// assert_eq!(all, vec!["a", "b"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Adds an entry, keeping any existing values for `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Replaces every value for `name` with a single `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.inner.push((name, value.into()));
    }

    /// Applies every entry of `other` on top of `self` with [`set`](Self::set)
    /// semantics: names present in `other` replace those in `self`.
    pub fn overlay(&mut self, other: &Headers) {
        for name in other.names() {
            self.remove(name);
        }
        self.inner.extend(other.inner.iter().cloned());
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Drops every entry named `name`; returns whether any existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let count = self.inner.len();
        self.inner.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        count != self.inner.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of entries, counting repeated names separately.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.iter().map(|(k, _)| k.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
