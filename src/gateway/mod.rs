//! The request gateway: one entry point for every outgoing HTTP call.
//!
//! A [`Gateway`] sits in front of a [`Transport`] and adds:
//!
//! - **Caching**: successful GET/HEAD responses are kept for a TTL and served
//!   without touching the network while fresh.
//! - **Deduplication**: concurrent identical reads share one physical call;
//!   every caller receives the same response or the same error.
//! - **Retry**: retryable failures are retried with exponential backoff and
//!   jitter, bounded per attempt by the configured timeout.
//! - **Cancellation**: each caller may pass a [`CancellationToken`]; a
//!   shared call is only aborted once its last waiter has gone.
//!
//! ## Request flow
//!
//! ```text
//! read:   key ─► cache hit? ─► return
//!                    │ miss
//!                    ▼
//!              in-flight? ─► attach
//!                    │ none
//!                    ▼
//!              start call (retry loop) ─► store in cache ─► resolve waiters
//!
//! write:  key ─► (dedupe? attach/start : start) ─► on success apply invalidation hints
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{CacheKey, Invalidation, ResponseCache};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::{Method, Request, Response};
use crate::transport::{ReqwestTransport, Transport};

mod in_flight;
mod options;

use in_flight::{InFlight, SharedCall};
pub use options::RequestOptions;

/// Read-only counters describing a gateway's shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayStats {
    /// Entries in the response cache, including expired ones not yet looked up.
    pub cached_entries: usize,
    /// Calls currently in flight.
    pub in_flight: usize,
}

/// A caching, deduplicating, retrying front for a [`Transport`].
///
/// Cloning is cheap and clones share one cache and one in-flight registry.
/// Separately constructed gateways share nothing.
///
/// # Examples
///
/// ```rust,no_run
/// use rgate::{Gateway, GatewayConfig, Invalidation, RequestOptions};
/// use serde_json::json;
///
/// # async fn run() -> Result<(), rgate::GatewayError> {
/// let config = GatewayConfig::default().with_base_url("https://study.example.com");
/// let gateway = Gateway::new(config)?;
///
/// // Cached for the default TTL; concurrent identical calls share one request.
/// let sessions = gateway.get("/api/sessions", RequestOptions::new()).await?;
/// println!("{}", sessions.text());
///
/// // Writes are never cached; this one drops the cached session list on success.
/// gateway
///     .post(
///         "/api/sessions",
///         &json!({ "minutes": 25 }),
///         RequestOptions::new().invalidate(Invalidation::path("/api/sessions")),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Gateway<T = ReqwestTransport> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Gateway<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    transport: T,
    config: GatewayConfig,
    state: Mutex<State>,
}

// Cache and in-flight registry share one lock so a completing call can store
// its response and retire its flight in a single step.
struct State {
    cache: ResponseCache,
    in_flight: InFlight,
}

impl State {
    fn invalidate(&mut self, hint: &Invalidation) -> usize {
        let removed = self.cache.invalidate(hint);
        let detached = self.in_flight.detach(hint);
        debug!(?hint, removed, detached, "cache invalidated");
        removed
    }
}

impl Gateway<ReqwestTransport> {
    /// Creates a gateway over a fresh [`ReqwestTransport`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `config` is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;
        Ok(Self::with_transport(config, ReqwestTransport::new()?))
    }
}

impl<T: Transport + 'static> Gateway<T> {
    /// Creates a gateway over `transport`.
    pub fn with_transport(config: GatewayConfig, transport: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                state: Mutex::new(State {
                    cache: ResponseCache::new(),
                    in_flight: InFlight::default(),
                }),
            }),
        }
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Returns the configuration this gateway was built with.
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// Issues `method path` through the cache, dedup, and retry layers.
    ///
    /// Cacheable methods (GET, HEAD) take the read path; everything else takes
    /// the write path. See the [module docs](self) for the flow.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`]; retryable failures only surface once attempts
    /// are exhausted.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Response, GatewayError> {
        if options.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }

        let key = self.key_for(&method, path, &options);
        let request = self.build_request(&key, &options);

        if method.is_cacheable() {
            self.read(key, request, options).await
        } else {
            self.write(key, request, options).await
        }
    }

    /// `GET path`.
    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<Response, GatewayError> {
        self.request(Method::Get, path, options).await
    }

    /// `GET path`, decoding the JSON body into `R`.
    pub async fn get_json<R: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<R, GatewayError> {
        self.get(path, options).await?.json()
    }

    /// `POST path` with a JSON `body`.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<Response, GatewayError> {
        self.request(Method::Post, path, options.json(body)?).await
    }

    /// `PUT path` with a JSON `body`.
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<Response, GatewayError> {
        self.request(Method::Put, path, options.json(body)?).await
    }

    /// `PATCH path` with a JSON `body`.
    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<Response, GatewayError> {
        self.request(Method::Patch, path, options.json(body)?).await
    }

    /// `DELETE path`.
    pub async fn delete(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Response, GatewayError> {
        self.request(Method::Delete, path, options).await
    }

    /// Derives the cache/dedup key a call with these arguments would use.
    pub fn key_for(&self, method: &Method, path: &str, options: &RequestOptions) -> CacheKey {
        CacheKey::derive(method, path, &options.params, options.body.as_ref())
    }

    /// Drops the cache entries selected by `hint`; returns how many were removed.
    ///
    /// Matching reads still in flight are detached: later callers start a
    /// fresh request, and the detached response is not cached.
    pub fn invalidate(&self, hint: impl Into<Invalidation>) -> usize {
        self.state().invalidate(&hint.into())
    }

    /// Drops every cache entry and detaches every in-flight request; returns
    /// how many entries were removed.
    pub fn clear_cache(&self) -> usize {
        let mut state = self.state();
        state.in_flight.detach_all();
        state.cache.clear()
    }

    /// Current sizes of the cache and in-flight registry.
    pub fn stats(&self) -> GatewayStats {
        let state = self.state();
        GatewayStats {
            cached_entries: state.cache.len(),
            in_flight: state.in_flight.len(),
        }
    }

    async fn read(
        &self,
        key: CacheKey,
        request: Request,
        options: RequestOptions,
    ) -> Result<Response, GatewayError> {
        if !options.skip_cache {
            if let Some(hit) = self.state().cache.get(&key) {
                debug!(%key, "cache hit");
                return Ok(hit);
            }
        }

        let ttl = options.ttl.unwrap_or(self.inner.config.default_ttl);
        let call = self.join_or_start(key, request, true, Some(ttl));
        wait(call, options.signal.as_ref()).await
    }

    async fn write(
        &self,
        key: CacheKey,
        request: Request,
        options: RequestOptions,
    ) -> Result<Response, GatewayError> {
        let retry = options.idempotent;
        let result = if options.dedupe {
            let call = self.join_or_start(key, request, retry, None);
            wait(call, options.signal.as_ref()).await
        } else {
            let inner = Arc::clone(&self.inner);
            let call = async move { inner.execute(&request, retry).await };
            wait(call, options.signal.as_ref()).await
        };

        if result.is_ok() && !options.invalidate.is_empty() {
            let mut state = self.state();
            for hint in &options.invalidate {
                state.invalidate(hint);
            }
        }

        result
    }

    /// Attaches to the in-flight call for `key`, or registers a new one.
    ///
    /// The registry lookup and registration happen under one lock, so two
    /// callers can never both start a call for the same key.
    fn join_or_start(
        &self,
        key: CacheKey,
        request: Request,
        retry: bool,
        cache_ttl: Option<Duration>,
    ) -> SharedCall {
        let mut state = self.state();
        if let Some(call) = state.in_flight.join(&key) {
            debug!(%key, "joining in-flight request");
            return call;
        }

        let id = state.in_flight.next_id();
        let guard = FlightGuard {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            id,
            armed: true,
        };
        let call = async move {
            let result = guard.inner.execute(&request, retry).await;
            let store = match (&result, cache_ttl) {
                (Ok(response), Some(ttl)) => Some((response, ttl)),
                _ => None,
            };
            guard.complete(store);
            result
        }
        .boxed()
        .shared();

        debug!(%key, "starting request");
        state.in_flight.register(key, id, &call);
        call
    }

    fn build_request(&self, key: &CacheKey, options: &RequestOptions) -> Request {
        let config = &self.inner.config;
        let url = format!("{}{}", config.base_url, key.target());

        let mut headers = config.headers();
        headers.overlay(&options.headers);

        let mut request = Request::new(key.method().clone(), url).headers_from(headers);
        if let (Some(body), true) = (&options.body, key.method().has_body()) {
            request = request.body_bytes(body.to_string());
        }
        request
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.lock_state()
    }
}

impl<T> Inner<T> {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        // State is only ever mutated in short, non-panicking sections.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport> Inner<T> {
    /// Runs the retry protocol for one logical call.
    async fn execute(&self, request: &Request, retry: bool) -> Result<Response, GatewayError> {
        let policy = &self.config.retry;
        let max_attempts = if retry { policy.max_attempts.max(1) } else { 1 };
        let mut attempt = 1;

        loop {
            match self.attempt(request).await {
                Ok(response) => {
                    if attempt > 1 {
                        debug!(url = request.url(), attempt, "request recovered after retry");
                    }
                    return Ok(response);
                }
                Err(err) if attempt < max_attempts && policy.is_retryable(&err) => {
                    let delay = policy.backoff(attempt);
                    warn!(
                        method = %request.method(),
                        url = request.url(),
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One bounded exchange; non-2xx responses become [`GatewayError::Http`].
    async fn attempt(&self, request: &Request) -> Result<Response, GatewayError> {
        let timeout = self.config.timeout;
        let exchange = self.transport.send(request.clone());
        let response = match tokio::time::timeout(timeout, exchange).await {
            Err(_elapsed) => {
                return Err(GatewayError::Timeout {
                    url: request.url().to_owned(),
                    after: timeout,
                });
            }
            Ok(Err(err)) => return Err(GatewayError::from_transport(request.url(), err, timeout)),
            Ok(Ok(response)) => response,
        };

        if response.is_success() {
            Ok(response)
        } else {
            Err(GatewayError::Http {
                url: request.url().to_owned(),
                status: response.status(),
                body: response.bytes().clone(),
            })
        }
    }
}

/// Retires a flight from the registry when its call finishes or is dropped.
struct FlightGuard<T> {
    inner: Arc<Inner<T>>,
    key: CacheKey,
    id: u64,
    armed: bool,
}

impl<T> FlightGuard<T> {
    /// Retires the flight and, unless it was detached, stores the response,
    /// all under one lock.
    fn complete(mut self, store: Option<(&Response, Duration)>) {
        self.armed = false;
        let mut state = self.inner.lock_state();
        let current = state.in_flight.finish(&self.key, self.id);
        match store {
            Some((response, ttl)) if current => {
                state.cache.insert(self.key.clone(), response.clone(), ttl);
            }
            Some(_) => debug!(key = %self.key, "not caching response of detached request"),
            None => {}
        }
    }
}

impl<T> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.lock_state().in_flight.finish(&self.key, self.id);
            debug!(key = %self.key, "in-flight request abandoned by all waiters");
        }
    }
}

/// Awaits `call` unless `signal` fires first.
///
/// Giving up drops this caller's handle; the exchange itself is only
/// dropped when no other handle remains.
async fn wait<F>(call: F, signal: Option<&CancellationToken>) -> Result<Response, GatewayError>
where
    F: std::future::Future<Output = Result<Response, GatewayError>>,
{
    match signal {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(GatewayError::Cancelled),
            result = call => result,
        },
        None => call.await,
    }
}
