//! Timeout, retry and cancellation around a [`ReviewBackend`].

use std::sync::Arc;
use std::time::Duration;

use super::{BackendError, ReviewBackend};
use crate::cancel::CancelToken;
use crate::prompt::ReviewRequest;

/// Initial backoff delay between retries.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(10);

/// Maximum backoff delay between retries.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// When and how long to wait before re-submitting a failed request.
///
/// Timeouts and rate limits are retried with exponential backoff until
/// `max_attempts` calls were made. Server errors get a single retry.
/// Credential and request errors are never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls allowed, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let backoff = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(retry));
        backoff.min(self.max_backoff)
    }

    /// Whether `err` on call number `attempt` (1-based) warrants another call.
    fn should_retry(&self, err: &BackendError, attempt: u32, server_retried: bool) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        match err {
            BackendError::Timeout(_) | BackendError::RateLimited(_) => true,
            BackendError::ServerError(_) => !server_retried,
            BackendError::InvalidCredential(_) | BackendError::Request(_) | BackendError::Cancelled => {
                false
            }
        }
    }
}

/// Submits review requests to a backend.
#[derive(Clone)]
pub struct ReviewClient {
    backend: Arc<dyn ReviewBackend>,
    model: String,
    policy: RetryPolicy,
    timeout: Duration,
}

impl ReviewClient {
    pub fn new(
        backend: Arc<dyn ReviewBackend>,
        model: impl Into<String>,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            policy,
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Submit `request`, retrying per policy, until text comes back, a
    /// non-retryable error occurs, or `cancel` fires.
    pub async fn submit(
        &self,
        request: &ReviewRequest,
        cancel: &CancelToken,
    ) -> Result<String, BackendError> {
        let mut attempt = 0;
        let mut server_retried = false;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(BackendError::Cancelled);
            }

            let call = tokio::time::timeout(self.timeout, self.backend.complete(&self.model, request));
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BackendError::Cancelled),
                r = call => r.unwrap_or_else(|_| {
                    Err(BackendError::Timeout(format!("no response within {}s", self.timeout.as_secs_f32())))
                }),
            };

            let err = match result {
                Ok(text) => return Ok(text),
                Err(err) => err,
            };

            if !self.policy.should_retry(&err, attempt, server_retried) {
                if attempt > 1 {
                    tracing::warn!(attempt, error = %err, "giving up on review request");
                }
                return Err(err);
            }
            if matches!(err, BackendError::ServerError(_)) {
                server_retried = true;
            }

            let backoff = self.policy.backoff(attempt - 1);
            tracing::warn!(
                attempt,
                max_attempts = self.policy.max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                kind = err.kind(),
                "retrying review request"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BackendError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}
