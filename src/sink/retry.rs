//! Retry logic with exponential backoff for sink sends.
//!
//! When a send fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - network trouble or 5xx, may succeed on retry
//! - [`FailureType::RateLimited`] - HTTP 429, waits for the server's hint
//! - [`FailureType::Permanent`] - bad request, bad credentials, encoding errors
//!
//! [`RetryPolicy`] then decides whether and when to try again.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument, warn};

use super::SinkError;

/// Default maximum attempts (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to computed delays (500ms).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Upper bound on a server-provided Retry-After (5 minutes).
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Classification of send failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    Transient,
    /// Failure that won't succeed regardless of retries.
    Permanent,
    /// Server rate limiting (HTTP 429).
    RateLimited,
}

/// Decision on whether to retry a failed send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Attempt number of the retry (1-indexed, so the first retry is 2).
        attempt: u32,
    },
    /// Give up.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Retry configuration with exponential backoff.
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt-1), max_delay) + jitter
/// ```
///
/// A server-provided Retry-After replaces the computed delay (capped at
/// [`MAX_RETRY_AFTER`]).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
    jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings. `max_attempts` is at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
            jitter: MAX_JITTER,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, 1.0)
    }

    /// Fast policy without jitter, for tests against mock servers.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            jitter: Duration::ZERO,
            ..Self::new(max_attempts, Duration::ZERO, Duration::ZERO, 1.0)
        }
    }

    /// Returns the maximum number of attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides whether to retry after `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(
        &self,
        failure_type: FailureType,
        attempt: u32,
        retry_after: Option<Duration>,
    ) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = match retry_after {
            Some(hint) if hint > MAX_RETRY_AFTER => {
                warn!(
                    hint_secs = hint.as_secs(),
                    max_secs = MAX_RETRY_AFTER.as_secs(),
                    "Retry-After exceeds maximum, capping"
                );
                MAX_RETRY_AFTER
            }
            Some(hint) => hint,
            None => self.calculate_delay(attempt),
        };

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * f64::from(self.backoff_multiplier).powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64) + self.calculate_jitter()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
        Duration::from_millis(jitter_ms)
    }
}

/// Classifies a sink error for retry decisions.
#[must_use]
pub fn classify_error(error: &SinkError) -> FailureType {
    match error {
        SinkError::HttpStatus { status, .. } => classify_http_status(*status),
        SinkError::Timeout { .. } | SinkError::Network { .. } => FailureType::Transient,
        SinkError::Unauthorized { .. }
        | SinkError::Encode(_)
        | SinkError::Decode { .. }
        | SinkError::Client(_) => FailureType::Permanent,
    }
}

#[allow(clippy::match_same_arms)]
fn classify_http_status(status: u16) -> FailureType {
    match status {
        408 => FailureType::Transient,
        429 => FailureType::RateLimited,
        status if (400..500).contains(&status) => FailureType::Permanent,
        status if (500..600).contains(&status) => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

/// Parses a Retry-After header: integer seconds, fractional seconds, or an HTTP-date.
///
/// Returns `None` for negative, unparseable or past values.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            debug!(header_value, "invalid Retry-After value, ignoring");
            return None;
        }
        return Some(Duration::from_secs_f64(seconds.min(MAX_RETRY_AFTER.as_secs_f64())));
    }

    let datetime = httpdate::parse_http_date(header_value).ok()?;
    datetime
        .duration_since(std::time::SystemTime::now())
        .ok()
        .map(|d| d.min(MAX_RETRY_AFTER))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(32));
    }

    #[test]
    fn test_max_attempts_minimum_is_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO, 2.0).max_attempts(), 1);
    }

    #[test]
    fn test_permanent_failure_is_not_retried() {
        let decision = RetryPolicy::default().should_retry(FailureType::Permanent, 1, None);
        assert!(matches!(decision, RetryDecision::DoNotRetry { .. }));
    }

    #[test]
    fn test_transient_failure_retries_until_exhausted() {
        let policy = RetryPolicy::immediate(3);
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 1, None),
            RetryDecision::Retry { attempt: 2, .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 2, None),
            RetryDecision::Retry { attempt: 3, .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 3, None),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            jitter: Duration::ZERO,
            ..RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(4), 2.0)
        };
        assert_eq!(policy.calculate_delay(1), Duration::from_secs(1));
        assert_eq!(policy.calculate_delay(2), Duration::from_secs(2));
        assert_eq!(policy.calculate_delay(3), Duration::from_secs(4));
        assert_eq!(policy.calculate_delay(6), Duration::from_secs(4));
    }

    #[test]
    fn test_jitter_stays_within_bound() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(32), 2.0);
        let delay = policy.calculate_delay(1);
        assert!(delay >= Duration::from_secs(1));
        assert!(delay <= Duration::from_millis(1500));
    }

    #[test]
    fn test_retry_after_hint_overrides_backoff() {
        let decision = RetryPolicy::default().should_retry(
            FailureType::RateLimited,
            1,
            Some(Duration::from_millis(750)),
        );
        assert_eq!(
            decision,
            RetryDecision::Retry {
                delay: Duration::from_millis(750),
                attempt: 2
            }
        );
    }

    #[test]
    fn test_retry_after_hint_is_capped() {
        let decision = RetryPolicy::default().should_retry(
            FailureType::RateLimited,
            1,
            Some(Duration::from_secs(3600)),
        );
        assert_eq!(
            decision,
            RetryDecision::Retry {
                delay: MAX_RETRY_AFTER,
                attempt: 2
            }
        );
    }

    #[test]
    fn test_classify_http_status() {
        assert_eq!(classify_http_status(429), FailureType::RateLimited);
        assert_eq!(classify_http_status(500), FailureType::Transient);
        assert_eq!(classify_http_status(502), FailureType::Transient);
        assert_eq!(classify_http_status(408), FailureType::Transient);
        assert_eq!(classify_http_status(400), FailureType::Permanent);
        assert_eq!(classify_http_status(413), FailureType::Permanent);
    }

    #[test]
    fn test_classify_unauthorized_is_permanent() {
        let error = SinkError::http_status("u", 401, None);
        assert_eq!(classify_error(&error), FailureType::Permanent);
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 0.25 "), Some(Duration::from_millis(250)));
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn test_parse_retry_after_caps_large_values() {
        assert_eq!(parse_retry_after("86400"), Some(MAX_RETRY_AFTER));
    }

    #[test]
    fn test_parse_retry_after_past_http_date() {
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
