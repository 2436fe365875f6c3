//! Retry policy: how many attempts, how long to wait between them, and
//! which failures are worth another attempt.
//!
//! The delay before attempt `n + 1` is
//!
//! ```text
//! min(base_delay * backoff_multiplier^(n - 1), max_delay) + jitter
//! ```
//!
//! where `jitter` is drawn uniformly from `[jitter_min, jitter_max]`.

use std::time::Duration;

use serde::Deserialize;

use crate::config::duration_ms;
use crate::error::GatewayError;
use crate::http::StatusCode;

/// How failed attempts are retried.
///
/// | Setting              | Default                    |
/// |----------------------|----------------------------|
/// | `max_attempts`       | 4                          |
/// | `base_delay`         | 1 s                        |
/// | `backoff_multiplier` | 2.0                        |
/// | `max_delay`          | 10 s                       |
/// | jitter               | 0 – 100 ms                 |
/// | `retryable_statuses` | 500, 502, 503, 504         |
/// | `retry_on_timeout`   | `true`                     |
/// | `retry_on_network`   | `true`                     |
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rgate::RetryPolicy;
///
/// let policy = RetryPolicy::default()
///     .with_base_delay(Duration::from_millis(100))
///     .without_jitter();
///
/// assert_eq!(policy.backoff(1), Duration::from_millis(100));
/// assert_eq!(policy.backoff(2), Duration::from_millis(200));
/// assert_eq!(policy.backoff(3), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first; `1` disables retries.
    pub max_attempts: u32,
    #[serde(rename = "base_delay_ms", deserialize_with = "duration_ms::deserialize")]
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    #[serde(rename = "max_delay_ms", deserialize_with = "duration_ms::deserialize")]
    pub max_delay: Duration,
    #[serde(rename = "jitter_min_ms", deserialize_with = "duration_ms::deserialize")]
    pub jitter_min: Duration,
    #[serde(rename = "jitter_max_ms", deserialize_with = "duration_ms::deserialize")]
    pub jitter_max: Duration,
    pub retryable_statuses: Vec<StatusCode>,
    pub retry_on_timeout: bool,
    pub retry_on_network: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            jitter_min: Duration::ZERO,
            jitter_max: Duration::from_millis(100),
            retryable_statuses: vec![
                StatusCode::INTERNAL_SERVER_ERROR,
                StatusCode::BAD_GATEWAY,
                StatusCode::SERVICE_UNAVAILABLE,
                StatusCode::GATEWAY_TIMEOUT,
            ],
            retry_on_timeout: true,
            retry_on_network: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Sets the jitter bounds; they are swapped if given in the wrong order.
    #[must_use]
    pub fn with_jitter(mut self, min: Duration, max: Duration) -> Self {
        self.jitter_min = min.min(max);
        self.jitter_max = max.max(min);
        self
    }

    #[must_use]
    pub fn without_jitter(self) -> Self {
        self.with_jitter(Duration::ZERO, Duration::ZERO)
    }

    #[must_use]
    pub fn with_retryable_statuses(
        mut self,
        statuses: impl IntoIterator<Item = StatusCode>,
    ) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Returns `true` if `error` may be retried by this policy.
    ///
    /// Client errors, malformed responses, invalid requests and
    /// cancellation are always terminal.
    pub fn is_retryable(&self, error: &GatewayError) -> bool {
        match error {
            GatewayError::Network { .. } => self.retry_on_network,
            GatewayError::Timeout { .. } => self.retry_on_timeout,
            GatewayError::Http { status, .. } => self.retryable_statuses.contains(status),
            GatewayError::Cancelled
            | GatewayError::Serialization(_)
            | GatewayError::Decode(_)
            | GatewayError::InvalidRequest(_)
            | GatewayError::Config(_) => false,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based), jitter included.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff(attempt) + self.jitter()
    }

    /// Delay without jitter: `min(base * multiplier^(attempt-1), max_delay)`.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn jitter(&self) -> Duration {
        let lo = duration_nanos(self.jitter_min);
        let hi = duration_nanos(self.jitter_max);
        if hi <= lo {
            return Duration::from_nanos(lo);
        }
        Duration::from_nanos(fastrand::u64(lo..=hi))
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn http(status: StatusCode) -> GatewayError {
        GatewayError::Http {
            url: "/x".into(),
            status,
            body: Bytes::new(),
        }
    }

    #[test]
    fn exponential_progression_is_capped() {
        let policy = RetryPolicy::default().without_jitter();
        let delays: Vec<_> = (1..=6).map(|n| policy.backoff(n).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10_000, 10_000]);
    }

    #[test]
    fn huge_attempt_numbers_saturate_at_cap() {
        let policy = RetryPolicy::default().without_jitter();
        assert_eq!(policy.backoff(u32::MAX), policy.max_delay);
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let policy = RetryPolicy::default()
            .with_base_delay(Duration::from_millis(100))
            .with_jitter(Duration::from_millis(20), Duration::from_millis(5));
        assert_eq!(policy.jitter_min, Duration::from_millis(5));
        for _ in 0..200 {
            let d = policy.backoff(1);
            assert!(d >= Duration::from_millis(105) && d <= Duration::from_millis(120), "{d:?}");
        }
    }

    #[test]
    fn delays_never_decrease_beyond_jitter_width() {
        let policy = RetryPolicy::default()
            .with_base_delay(Duration::from_millis(50))
            .with_jitter(Duration::ZERO, Duration::from_millis(10));
        for n in 1..6 {
            let width = policy.jitter_max - policy.jitter_min;
            assert!(policy.backoff(n + 1) + width >= policy.backoff(n));
        }
    }

    #[test]
    fn classification() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(&http(StatusCode::SERVICE_UNAVAILABLE)));
        assert!(!policy.is_retryable(&http(StatusCode::NOT_FOUND)));
        assert!(!policy.is_retryable(&http(StatusCode::TOO_MANY_REQUESTS)));
        assert!(policy.is_retryable(&GatewayError::Timeout {
            url: "/x".into(),
            after: Duration::from_secs(1),
        }));
        assert!(!policy.is_retryable(&GatewayError::Cancelled));
        assert!(!policy.is_retryable(&GatewayError::InvalidRequest("bad".into())));
    }

    #[test]
    fn switches_disable_classes() {
        let policy = RetryPolicy {
            retry_on_timeout: false,
            ..RetryPolicy::default()
        };
        assert!(!policy.is_retryable(&GatewayError::Timeout {
            url: "/x".into(),
            after: Duration::from_secs(1),
        }));
    }
}
