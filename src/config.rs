//! Gateway configuration.
//!
//! [`GatewayConfig`] carries every recognized option with a documented
//! default. It can be built in code, or loaded in layers with
//! [`GatewayConfig::load`]:
//!
//! 1. `config/gateway.{toml,json,yaml}` (optional)
//! 2. `RGATE__*` environment variables, `__` separating nested keys
//!    (e.g. `RGATE__RETRY__MAX_ATTEMPTS=2`,
//!    `RGATE__RETRY__RETRYABLE_STATUSES=502,503`)
//!
//! Durations are expressed in milliseconds in every external source.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::http::Headers;
use crate::retry::RetryPolicy;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a [`Gateway`](crate::Gateway).
///
/// | Field             | External name  | Default                              |
/// |-------------------|----------------|--------------------------------------|
/// | `base_url`        | `base_url`     | `""` (paths are used as-is)          |
/// | `timeout`         | `timeout_ms`   | 10 s per attempt                     |
/// | `default_ttl`     | `ttl_ms`       | 30 s                                 |
/// | `retry`           | `retry.*`      | see [`RetryPolicy`]                  |
/// | `default_headers` | `default_headers` | `Content-Type: application/json`  |
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rgate::{GatewayConfig, RetryPolicy};
///
/// let config = GatewayConfig::default()
///     .with_base_url("https://study.example.com")
///     .with_default_ttl(Duration::from_secs(60))
///     .with_retry(RetryPolicy::none());
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.retry.max_attempts, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Prefix joined in front of every request path.
    pub base_url: String,
    /// Bound on each individual attempt.
    #[serde(rename = "timeout_ms", deserialize_with = "duration_ms::deserialize")]
    pub timeout: Duration,
    /// Cache lifetime for reads that do not override it.
    #[serde(rename = "ttl_ms", deserialize_with = "duration_ms::deserialize")]
    pub default_ttl: Duration,
    pub retry: RetryPolicy,
    /// Headers sent with every request; per-call headers replace same-named ones.
    pub default_headers: BTreeMap<String, String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(10),
            default_ttl: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            default_headers: BTreeMap::from([(
                "Content-Type".to_owned(),
                "application/json".to_owned(),
            )]),
        }
    }
}

impl GatewayConfig {
    /// Loads `config/gateway.*` (if present) overlaid with `RGATE__*`
    /// environment variables, then validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] on unreadable or mistyped sources and
    /// [`ConfigError::Invalid`] if [`validate`](Self::validate) fails.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = ::config::Config::builder()
            .add_source(::config::File::with_name("config/gateway").required(false))
            .add_source(
                ::config::Environment::with_prefix("RGATE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("retry.retryable_statuses"),
            );
        Self::from_builder(builder)
    }

    /// Loads a single configuration file; the format is taken from its extension.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ::config::Config::builder().add_source(::config::File::from(path.as_ref()));
        Self::from_builder(builder)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let builder = ::config::Config::builder()
            .add_source(::config::File::from_str(toml, ::config::FileFormat::Toml));
        Self::from_builder(builder)
    }

    fn from_builder(
        builder: ::config::ConfigBuilder<::config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the gateway relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be greater than zero".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        let multiplier = self.retry.backoff_multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "retry.backoff_multiplier must be >= 1.0, got {multiplier}"
            )));
        }
        if self.retry.jitter_min > self.retry.jitter_max {
            return Err(ConfigError::Invalid(
                "retry.jitter_min_ms must not exceed retry.jitter_max_ms".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub(crate) fn headers(&self) -> Headers {
        self.default_headers.iter().collect()
    }
}

/// Deserializes a [`Duration`] from an integer number of milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StatusCode;

    #[test]
    fn defaults_are_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.default_ttl, Duration::from_secs(30));
        assert_eq!(config.headers().get("content-type"), Some("application/json"));
    }

    #[test]
    fn toml_overrides_selected_fields() {
        let config = GatewayConfig::from_toml_str(
            r#"
            base_url = "http://localhost:3000"
            ttl_ms = 5000

            [retry]
            max_attempts = 2
            base_delay_ms = 250
            retryable_statuses = [429, 503]
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.default_ttl, Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.retry.backoff_multiplier, 2.0);
        assert_eq!(
            config.retry.retryable_statuses,
            vec![StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE]
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = GatewayConfig::from_toml_str("timeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = GatewayConfig::from_toml_str("[retry]\nbackoff_multiplier = 0.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = GatewayConfig::from_toml_str("[retry]\nmax_attempts = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn mistyped_values_fail_to_load() {
        let err = GatewayConfig::from_toml_str(r#"ttl_ms = "soon""#).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
