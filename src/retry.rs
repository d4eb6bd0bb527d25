//! Retry policy for the transport layer.
//!
//! The policy is an opaque pass-through shape: the client never inspects it,
//! the sender hands it to the transport executor which applies it before a
//! single logical outcome is reported. Only recoverable transport failures
//! (code 503) and server-side 5xx responses are retry-eligible; 4xx responses
//! are terminal and never retried.

use crate::error::RequestError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transport retry configuration.
///
/// `max_attempts` counts the total number of attempts, including the first
/// one; `max_attempts: 1` (the effective default when no policy is set)
/// disables retries entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total number of attempts, including the initial one.
    pub max_attempts: u32,
    /// HTTP status codes eligible for retry. 4xx codes listed here are
    /// ignored: status-based retry never applies below 500.
    pub retryable_status_codes: Vec<u16>,
    /// Base delay between attempts in milliseconds (doubled per attempt).
    pub base_delay_ms: u64,
    /// Upper bound for the computed delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retryable_status_codes: vec![500, 502, 503, 504],
            base_delay_ms: 100,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with a given attempt budget and default conditions.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Decides whether a failed attempt should be retried.
    ///
    /// `attempt` is the zero-based index of the attempt that just failed.
    /// Recoverable transport failures always qualify; HTTP status failures
    /// qualify when the status is a listed 5xx. A generic 500 carrying a
    /// transport `original_code` is a non-recoverable transport failure and
    /// is never retried.
    pub fn should_retry(&self, error: &RequestError, attempt: u32) -> bool {
        if attempt + 1 >= self.max_attempts {
            return false;
        }
        if error.original_code.is_some() {
            return error.code == 503;
        }
        error.code >= 500 && self.retryable_status_codes.contains(&error.code)
    }

    /// Computes the delay before the next attempt (exponential, capped).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt);
        let delay = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.retryable_status_codes, vec![500, 502, 503, 504]);
    }

    #[test]
    fn test_recoverable_transport_failure_is_retried() {
        let policy = RetryPolicy::default();
        let err = RequestError::from_transport("socket hang up", Some("ECONNRESET"));
        assert!(policy.should_retry(&err, 0));
    }

    #[test]
    fn test_fatal_transport_failure_is_not_retried() {
        let policy = RetryPolicy::default();
        let err = RequestError::from_transport("dns failure", Some("ENOTFOUND"));
        assert!(!policy.should_retry(&err, 0));
    }

    #[test]
    fn test_server_error_status_is_retried() {
        let policy = RetryPolicy::default();
        let err = RequestError::new("Error in http response (status: 502)", 502);
        assert!(policy.should_retry(&err, 0));
        assert!(policy.should_retry(&err, 1));
    }

    #[test]
    fn test_client_error_status_is_never_retried() {
        let policy = RetryPolicy {
            // 4xx entries are ignored even when configured
            retryable_status_codes: vec![404, 500],
            ..RetryPolicy::default()
        };
        let err = RequestError::new("Error in http response (status: 404)", 404);
        assert!(!policy.should_retry(&err, 0));
    }

    #[test]
    fn test_attempt_budget_is_honored() {
        let policy = RetryPolicy::with_max_attempts(2);
        let err = RequestError::new("Error in http response (status: 503)", 503);
        assert!(policy.should_retry(&err, 0));
        assert!(!policy.should_retry(&err, 1));
    }

    #[test]
    fn test_delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy {
            base_delay_ms: 100,
            max_delay_ms: 350,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(350));
    }

    #[test]
    fn test_policy_serializes_with_camel_case_keys() {
        let policy = RetryPolicy::with_max_attempts(2);
        let value = serde_json::to_value(&policy).unwrap();
        assert_eq!(value["maxAttempts"], 2);
        assert!(value["retryableStatusCodes"].is_array());
    }
}
