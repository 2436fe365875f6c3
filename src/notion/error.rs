use serde_json::Value;
use thiserror::Error;

use crate::error::GatewayError;

const NETWORK_MESSAGE: &str = "Network error - please check your connection";

/// Status used for calls that never got an HTTP answer.
pub const NO_RESPONSE: u16 = 0;

/// Status used when the caller abandoned the call.
pub const CLIENT_CLOSED: u16 = 499;

/// A failed Notion call, carrying what the proxy reported.
///
/// `status` is the HTTP status, [`NO_RESPONSE`] for network failures and
/// timeouts, or [`CLIENT_CLOSED`] after cancellation. `details` is the
/// decoded error body when the proxy sent JSON, otherwise `null`.
#[derive(Debug, Clone, Error)]
#[error("{message} (status {status})")]
pub struct NotionError {
    pub message: String,
    pub status: u16,
    pub details: Value,
    #[source]
    source: Option<GatewayError>,
}

impl NotionError {
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
            details: Value::Null,
            source: None,
        }
    }

    /// A 400 raised before any call is made.
    pub(crate) fn missing(what: &str) -> Self {
        Self::new(format!("{what} is required"), 400)
    }

    /// A message suitable for showing to an end user.
    pub fn user_message(&self) -> &str {
        match self.status {
            401 => "Please log in to access Notion",
            403 => "You don't have permission to access this Notion content",
            404 => "Page or database not found in Notion",
            429 => "Too many requests - please wait a moment",
            502 => "Notion API is temporarily unavailable",
            NO_RESPONSE => NETWORK_MESSAGE,
            _ => &self.message,
        }
    }

    /// The gateway failure this error was built from, if any.
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        self.source.as_ref()
    }
}

impl From<GatewayError> for NotionError {
    fn from(err: GatewayError) -> Self {
        let (message, status, details) = match &err {
            GatewayError::Http { status, body, .. } => {
                let details: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
                let message = details
                    .get("error")
                    .and_then(Value::as_str)
                    .map_or_else(|| format!("Request failed: {}", status.as_u16()), str::to_owned);
                (message, status.as_u16(), details)
            }
            GatewayError::Network { .. } | GatewayError::Timeout { .. } => {
                (NETWORK_MESSAGE.to_owned(), NO_RESPONSE, Value::Null)
            }
            GatewayError::Cancelled => ("Request cancelled".to_owned(), CLIENT_CLOSED, Value::Null),
            GatewayError::Decode(_) => (err.to_string(), 502, Value::Null),
            GatewayError::Serialization(_)
            | GatewayError::InvalidRequest(_)
            | GatewayError::Config(_) => (err.to_string(), 400, Value::Null),
        };
        Self {
            message,
            status,
            details,
            source: Some(err),
        }
    }
}
