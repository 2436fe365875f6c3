//! Errors surfaced by the gateway.
//!
//! Every waiter of a shared call receives its own copy of the same error, so
//! [`GatewayError`] is `Clone` and keeps its causes behind [`Arc`].

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::http::StatusCode;
use crate::transport::TransportError;

/// Errors returned from [`Gateway`](crate::Gateway) calls.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The connection could not be established or broke mid-request.
    #[error("network error calling {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: Arc<TransportError>,
    },

    /// An attempt did not complete within the configured timeout.
    #[error("request to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    /// The server answered with a non-2xx status that was not retried, or
    /// kept failing until attempts ran out.
    #[error("HTTP {status} from {url}")]
    Http {
        url: String,
        status: StatusCode,
        body: Bytes,
    },

    /// The caller's cancellation signal fired before the call resolved.
    #[error("request cancelled")]
    Cancelled,

    /// The request body could not be serialized for key derivation.
    #[error("failed to serialize request body: {0}")]
    Serialization(#[source] Arc<serde_json::Error>),

    /// The response body could not be read or decoded.
    #[error("malformed response: {0}")]
    Decode(#[source] Arc<dyn StdError + Send + Sync>),

    /// The transport refused to build the request (bad URL, bad header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The gateway or its transport could not be constructed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Flat classification of a [`GatewayError`], convenient for matching
/// without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Timeout,
    Http,
    Cancelled,
    Serialization,
    Decode,
    InvalidRequest,
    Config,
}

impl GatewayError {
    pub(crate) fn decode(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Decode(Arc::new(err))
    }

    pub(crate) fn serialization(err: serde_json::Error) -> Self {
        Self::Serialization(Arc::new(err))
    }

    /// Maps a transport failure for `url` onto the gateway taxonomy.
    pub(crate) fn from_transport(url: &str, err: TransportError, after: Duration) -> Self {
        match err {
            TransportError::Timeout => Self::Timeout {
                url: url.to_owned(),
                after,
            },
            TransportError::InvalidRequest(reason) => Self::InvalidRequest(reason),
            TransportError::Body(source) => Self::Decode(Arc::from(source)),
            err @ TransportError::Connect(_) => Self::Network {
                url: url.to_owned(),
                source: Arc::new(err),
            },
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Http { .. } => ErrorKind::Http,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Decode(_) => ErrorKind::Decode,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Returns the HTTP status for [`GatewayError::Http`].
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if this is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
