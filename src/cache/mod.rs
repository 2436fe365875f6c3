//! Response cache: TTL-bounded storage of successful read responses.
//!
//! Entries are keyed by [`CacheKey`] and expire lazily: an expired entry is
//! never served and is removed the next time it is looked up. Timing uses
//! [`tokio::time::Instant`], so tests can drive expiry with a paused clock.
//!
//! Cache contents are owned by the gateway; callers interact with them only
//! through gateway calls and [`Invalidation`] hints.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::http::Response;

mod key;

pub use key::CacheKey;

/// A cached response and its freshness window.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    response: Response,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) < self.ttl
    }
}

/// Selects cache entries to drop after a mutation.
///
/// Hints are supplied by the caller; the gateway never infers which entries
/// a write affects.
///
/// # Examples
///
/// ```
/// use rgate::cache::{CacheKey, Invalidation};
/// use rgate::http::Method;
///
/// let key = CacheKey::derive(&Method::Get, "/pages/42/content?page_size=5", &[], None);
///
/// assert!(Invalidation::path("/pages/42").matches(&key));
/// assert!(!Invalidation::path("/pages/4").matches(&key));
/// assert!(Invalidation::pattern("page_size").matches(&key));
/// assert!(Invalidation::from(key.clone()).matches(&key));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Exactly this key.
    Key(CacheKey),
    /// Every key whose path is this path or lies beneath it, any query.
    Path(String),
    /// Every key whose rendered form contains this text.
    Pattern(String),
}

impl Invalidation {
    /// Shorthand for [`Invalidation::Path`]; a trailing `/` is ignored.
    pub fn path(path: impl Into<String>) -> Self {
        let mut path = path.into();
        while path.len() > 1 && path.ends_with('/') {
            path.pop();
        }
        Self::Path(path)
    }

    /// Shorthand for [`Invalidation::Pattern`].
    pub fn pattern(text: impl Into<String>) -> Self {
        Self::Pattern(text.into())
    }

    /// Returns `true` if `key` is selected by this hint.
    pub fn matches(&self, key: &CacheKey) -> bool {
        match self {
            Self::Key(k) => k == key,
            Self::Path(p) => match key.path().strip_prefix(p.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/') || p == "/",
                None => false,
            },
            Self::Pattern(text) => key.to_string().contains(text.as_str()),
        }
    }
}

impl From<CacheKey> for Invalidation {
    fn from(key: CacheKey) -> Self {
        Self::Key(key)
    }
}

/// TTL map from [`CacheKey`] to [`Response`].
#[derive(Debug, Default)]
pub(crate) struct ResponseCache {
    entries: HashMap<CacheKey, CacheEntry>,
}

impl ResponseCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh response for `key`, evicting it if it has expired.
    pub(crate) fn get(&mut self, key: &CacheKey) -> Option<Response> {
        let entry = self.entries.get(key)?;
        if entry.is_fresh(Instant::now()) {
            return Some(entry.response.clone());
        }
        self.entries.remove(key);
        None
    }

    /// Stores `response` under `key` with a fresh TTL. A zero TTL stores nothing.
    pub(crate) fn insert(&mut self, key: CacheKey, response: Response, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        self.entries.insert(
            key,
            CacheEntry {
                response,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Removes every entry selected by `hint`; returns how many were removed.
    pub(crate) fn invalidate(&mut self, hint: &Invalidation) -> usize {
        if let Invalidation::Key(key) = hint {
            return usize::from(self.entries.remove(key).is_some());
        }
        let before = self.entries.len();
        self.entries.retain(|key, _| !hint.matches(key));
        before - self.entries.len()
    }

    /// Drops every entry; returns how many were removed.
    pub(crate) fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    /// Number of stored entries, expired ones included until they are looked up.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, StatusCode};

    fn key(path: &str) -> CacheKey {
        CacheKey::derive(&Method::Get, path, &[], None)
    }

    fn ok(body: &'static str) -> Response {
        Response::new(StatusCode::OK).body(body)
    }

    #[tokio::test(start_paused = true)]
    async fn serves_until_ttl_then_evicts() {
        let mut cache = ResponseCache::new();
        cache.insert(key("/a"), ok("one"), Duration::from_secs(30));

        tokio::time::advance(Duration::from_millis(29_999)).await;
        assert_eq!(cache.get(&key("/a")).map(|r| r.text()), Some("one".into()));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get(&key("/a")).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reinsert_refreshes_ttl() {
        let mut cache = ResponseCache::new();
        cache.insert(key("/a"), ok("one"), Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.insert(key("/a"), ok("two"), Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get(&key("/a")).map(|r| r.text()), Some("two".into()));
    }

    #[tokio::test]
    async fn zero_ttl_is_not_stored() {
        let mut cache = ResponseCache::new();
        cache.insert(key("/a"), ok("x"), Duration::ZERO);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn invalidate_by_key_path_and_pattern() {
        let mut cache = ResponseCache::new();
        let ttl = Duration::from_secs(60);
        for path in ["/pages/1", "/pages/1/content?page_size=5", "/pages/12", "/search?q=x"] {
            cache.insert(key(path), ok("x"), ttl);
        }

        assert_eq!(cache.invalidate(&Invalidation::Key(key("/nope"))), 0);
        assert_eq!(cache.invalidate(&Invalidation::path("/pages/1/")), 2);
        assert!(cache.get(&key("/pages/12")).is_some());

        assert_eq!(cache.invalidate(&Invalidation::pattern("q=x")), 1);
        assert_eq!(cache.invalidate(&Invalidation::Key(key("/pages/12"))), 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn root_path_matches_everything() {
        assert!(Invalidation::path("/").matches(&key("/anything/at/all")));
    }

    #[tokio::test]
    async fn clear_reports_count() {
        let mut cache = ResponseCache::new();
        cache.insert(key("/a"), ok("x"), Duration::from_secs(1));
        cache.insert(key("/b"), ok("x"), Duration::from_secs(1));
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.len(), 0);
    }
}
