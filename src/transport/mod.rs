//! Transports: the network I/O seam underneath the gateway.
//!
//! A [`Transport`] performs exactly one physical HTTP exchange per call. The
//! gateway layers caching, deduplication, timeouts and retries on top, so
//! implementations should do none of those themselves.
//!
//! ## Core types
//!
//! - [`Transport`]: trait implemented by every transport.
//! - [`TransportError`]: failures a transport can report.
//! - [`ReqwestTransport`]: production transport over `reqwest`.
//! - [`LoggerTransport`]: decorator that logs each physical call.

use std::{future::Future, pin::Pin};

use thiserror::Error;

use crate::http::{Request, Response};

mod client;
mod logger;
#[cfg(test)]
pub(crate) mod mock;

pub use client::ReqwestTransport;
pub use logger::LoggerTransport;

/// Boxed error used as the cause of transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The pinned, `Send` future returned by [`Transport::send`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Response, TransportError>> + Send + 'a>>;

/// Errors a transport can report for a single exchange.
///
/// A non-2xx status is **not** an error at this layer; the transport returns
/// the [`Response`] and the gateway decides what the status means.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(#[source] BoxError),

    #[error("request timed out")]
    Timeout,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to read response body: {0}")]
    Body(#[source] BoxError),
}

/// The HTTP fetch primitive consumed by the gateway.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync`; one transport is shared by
///   every in-flight call of a gateway.
/// - Dropping the returned future **must** abort the exchange; this is how
///   cancellation reaches the network.
///
/// # Examples
///
/// ```rust,no_run
/// use rgate::http::{Request, Response, StatusCode};
/// use rgate::transport::{Transport, TransportFuture};
///
/// struct Always200;
///
/// impl Transport for Always200 {
///     fn send(&self, _request: Request) -> TransportFuture<'_> {
///         Box::pin(async { Ok(Response::new(StatusCode::OK)) })
///     }
/// }
/// ```
pub trait Transport: Send + Sync {
    /// Performs one exchange.
    fn send(&self, request: Request) -> TransportFuture<'_>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, request: Request) -> TransportFuture<'_> {
        (**self).send(request)
    }
}
