use crate::error::Result;
use crate::retry::RetryPolicy;
use tracing::{debug, error, warn};

use super::builder::Sender;

impl Sender {
    /// Runs `operation` until it succeeds, the policy declines, or the
    /// attempt budget runs out. Without a policy the operation runs once and
    /// its outcome is final.
    pub(crate) async fn execute_with_retry<T, F, Fut>(
        &self,
        policy: Option<&RetryPolicy>,
        operation: F,
    ) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(response) => {
                    debug!(attempt = attempt + 1, "Request attempt succeeded");
                    return Ok(response);
                }
                Err(e) => {
                    let should_retry = policy.is_some_and(|p| p.should_retry(&e, attempt));

                    if should_retry {
                        // should_retry implies a policy is present
                        let delay = policy.map(|p| p.delay_for(attempt)).unwrap_or_default();
                        warn!(
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            code = e.code,
                            original_code = ?e.original_code,
                            "Request attempt failed, retrying after delay"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    } else {
                        error!(
                            attempt = attempt + 1,
                            error = %e,
                            code = e.code,
                            original_code = ?e.original_code,
                            "Request failed, not retrying"
                        );
                        return Err(e);
                    }
                }
            }
        }
    }
}
