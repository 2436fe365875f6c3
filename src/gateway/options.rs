use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::cache::Invalidation;
use crate::error::GatewayError;
use crate::http::Headers;

/// Per-call options for [`Gateway::request`](super::Gateway::request) and
/// its convenience forms.
///
/// | Option       | Applies to | Default                                  |
/// |--------------|------------|------------------------------------------|
/// | `ttl`        | reads      | the gateway's `default_ttl`; zero disables caching |
/// | `param`      | all        | none                                     |
/// | `header`     | all        | none (gateway default headers still apply) |
/// | `signal`     | all        | none                                     |
/// | `skip_cache` | reads      | `false`                                  |
/// | `idempotent` | writes     | `false` (writes are not retried)         |
/// | `dedupe`     | writes     | `false` (identical writes are not collapsed) |
/// | `invalidate` | writes     | none                                     |
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rgate::{Invalidation, RequestOptions};
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let read = RequestOptions::new()
///     .param("page_size", "20")
///     .ttl(Duration::from_secs(60))
///     .signal(token.clone());
///
/// let write = RequestOptions::new()
///     .idempotent()
///     .invalidate(Invalidation::path("/api/todos"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub(crate) ttl: Option<Duration>,
    pub(crate) params: Vec<(String, String)>,
    pub(crate) headers: Headers,
    pub(crate) body: Option<Value>,
    pub(crate) signal: Option<CancellationToken>,
    pub(crate) skip_cache: bool,
    pub(crate) idempotent: bool,
    pub(crate) dedupe: bool,
    pub(crate) invalidate: Vec<Invalidation>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the cache lifetime of this read.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Adds a query parameter. Order does not affect the cache key.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    /// Adds a request header. Headers are not part of the cache key.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Attaches a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Serialization`] if `body` cannot be represented
    /// as JSON (e.g. a map with non-string keys).
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, GatewayError> {
        self.body = Some(serde_json::to_value(body).map_err(GatewayError::serialization)?);
        Ok(self)
    }

    /// Attaches an already-built JSON body.
    #[must_use]
    pub fn json_value(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Cancellation signal for this caller.
    #[must_use]
    pub fn signal(mut self, token: CancellationToken) -> Self {
        self.signal = Some(token);
        self
    }

    /// Ignores any cached response and fetches fresh; the result is still cached.
    #[must_use]
    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    /// Marks a write as safe to retry.
    #[must_use]
    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    /// Lets identical concurrent writes share one call.
    #[must_use]
    pub fn dedupe(mut self) -> Self {
        self.dedupe = true;
        self
    }

    /// Cache entries to drop once this write succeeds.
    #[must_use]
    pub fn invalidate(mut self, hint: impl Into<Invalidation>) -> Self {
        self.invalidate.push(hint.into());
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}
