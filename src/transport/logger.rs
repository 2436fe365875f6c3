use tokio::time::Instant;

use super::{Transport, TransportFuture};
use crate::http::Request;

/// Transport decorator that logs each physical call's method, URL, status,
/// and duration.
///
/// Emits a single `tracing::info!` line after the inner transport completes,
/// in the format:
///
/// ```text
/// METHOD url - STATUS (duration)
/// ```
///
/// Transport failures are logged at `warn` instead. Because it sits under the
/// gateway, cache hits and joined waiters never show up here; every line is
/// one real exchange, retries included.
///
/// # Examples
///
/// ```rust,no_run
/// use rgate::{Gateway, GatewayConfig};
/// use rgate::transport::{LoggerTransport, ReqwestTransport};
///
/// # fn main() -> Result<(), rgate::GatewayError> {
/// let transport = LoggerTransport::new(ReqwestTransport::new()?);
/// let gateway = Gateway::with_transport(GatewayConfig::default(), transport);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LoggerTransport<T> {
    inner: T,
}

impl<T> LoggerTransport<T> {
    /// Wraps `inner`.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Returns the wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport> Transport for LoggerTransport<T> {
    fn send(&self, request: Request) -> TransportFuture<'_> {
        Box::pin(async move {
            let start = Instant::now();
            let method = request.method().clone();
            let url = request.url().to_owned();

            let result = self.inner.send(request).await;

            let duration = start.elapsed();
            match &result {
                Ok(response) => {
                    tracing::info!("{} {} - {} ({:?})", method, url, response.status(), duration);
                }
                Err(e) => {
                    tracing::warn!(%method, %url, error = %e, ?duration, "transport failure");
                }
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, Response, StatusCode};
    use crate::transport::TransportError;
    use crate::transport::mock::MockTransport;

    #[tokio::test]
    async fn passes_responses_through() {
        let transport = LoggerTransport::new(MockTransport::new(|_, _| {
            Ok(Response::new(StatusCode::ACCEPTED).body("queued"))
        }));

        let response = transport
            .send(Request::new(Method::Post, "/jobs"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.text(), "queued");
        assert_eq!(transport.inner().calls(), 1);
    }

    #[tokio::test]
    async fn passes_errors_through() {
        let transport = LoggerTransport::new(MockTransport::new(|_, _| {
            Err(TransportError::Connect("refused".into()))
        }));

        let err = transport
            .send(Request::new(Method::Get, "/down"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Connect(_)));
    }
}
