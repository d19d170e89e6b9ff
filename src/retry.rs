//! Bounded retry of failed session attempts.
//!
//! Each attempt handed in here is a complete session lifecycle (login,
//! operation body, logout), so a retry always runs against a fresh login.
//! Only failures classified transient are retried; everything else
//! propagates unchanged after the first attempt.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::AutomationError;
use crate::metrics;

/// Retry policy for logged-in operations.
///
/// The registry offers no idempotency tokens, so the bound stays small by
/// default: one retry, no backoff. Both knobs are configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first (1 means 2 total attempts).
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: None,
        }
    }
}

/// Runs attempts under a [`RetryPolicy`].
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Execute `attempt`, retrying transient failures up to the policy bound
    /// when `retry_on_failure` is set. With it unset the attempt runs
    /// exactly once and its error propagates unchanged.
    pub async fn invoke<T, F, Fut>(
        &self,
        retry_on_failure: bool,
        attempt: F,
    ) -> Result<T, AutomationError>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, AutomationError>> + Send,
        T: Send,
    {
        if !retry_on_failure {
            return attempt().await;
        }

        let mut failures = 0;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    failures += 1;
                    if !err.is_transient() || failures > self.policy.max_retries {
                        return Err(err);
                    }
                    warn!(
                        error = %err,
                        failed_attempts = failures,
                        "registry operation failed, retrying with a fresh session"
                    );
                    metrics::record_retry();
                    if let Some(delay) = self.policy.delay {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}
