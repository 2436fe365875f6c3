//! Production transport over [`reqwest`].

use bytes::Bytes;

use super::{Transport, TransportError, TransportFuture};
use crate::error::GatewayError;
use crate::http::{Headers, Request, Response, StatusCode};

/// A [`Transport`] backed by a pooled [`reqwest::Client`].
///
/// The client is built without its own request timeout; the gateway bounds
/// every attempt itself so that a timeout can be classified and retried.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport with a default connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing client, e.g. one configured with proxies or custom roots.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn exchange(&self, request: Request) -> Result<Response, TransportError> {
        let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let mut builder = self.client.request(method, request.url());
        for (name, value) in request.headers().iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(classify)?;

        let status = StatusCode::from(response.status().as_u16());
        let mut headers = Headers::with_capacity(response.headers().len());
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str(), value);
            }
        }

        let body: Bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(Box::new(e)))?;

        Ok(Response::new(status).headers_from(headers).body(body))
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: Request) -> TransportFuture<'_> {
        Box::pin(self.exchange(request))
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else {
        TransportError::Connect(Box::new(err))
    }
}
