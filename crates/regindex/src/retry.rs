//! Fixed-delay retry for upstream requests.
//!
//! Upstream listings are retried with a constant delay and, by default, no
//! attempt limit. Per-item requests use [`RetryConfig::single_attempt`].

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};

use crate::collect::progress::{CollectProgress, ProgressCallback, emit};

/// Delay between attempts when nothing else is configured.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(20);

/// Configuration for retry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay between attempts.
    pub delay: Duration,
    /// Maximum number of retries after the first attempt. `None` retries
    /// until the operation succeeds or fails with a non-retryable error.
    pub max_retries: Option<usize>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RETRY_DELAY,
            max_retries: None,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(delay: Duration, max_retries: Option<usize>) -> Self {
        Self { delay, max_retries }
    }

    /// One attempt, no retries.
    #[must_use]
    pub fn single_attempt() -> Self {
        Self {
            delay: Duration::ZERO,
            max_retries: Some(0),
        }
    }

    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.max_retries.is_none()
    }

    /// Build a constant backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_retries.unwrap_or(usize::MAX))
    }
}

/// Execute an operation, retrying retryable failures with a fixed delay.
///
/// Every scheduled retry is logged and reported as
/// [`CollectProgress::RetryScheduled`]. Errors rejected by `is_retryable`
/// are returned immediately.
pub async fn with_retry<T, E, F, Fut, IsRetryable>(
    mut operation: F,
    is_retryable: IsRetryable,
    config: &RetryConfig,
    resource: &str,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
    IsRetryable: Fn(&E) -> bool + Send + Sync + 'static,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(config.clone().into_backoff())
        .notify(|err, dur| {
            let current_attempt = attempt.load(Ordering::SeqCst);
            let message = short_error_message(err);
            tracing::warn!(
                resource,
                attempt = current_attempt,
                retry_in_secs = dur.as_secs(),
                error = %message,
                "Upstream request failed, retrying"
            );
            emit(
                on_progress,
                CollectProgress::RetryScheduled {
                    resource: resource.to_string(),
                    attempt: current_attempt,
                    retry_after_ms: dur.as_millis() as u64,
                    error: message,
                },
            );
        })
        .when(is_retryable)
        .await
}

/// First line of an error's display form.
pub fn short_error_message(err: &dyn std::error::Error) -> String {
    let full = err.to_string();
    full.lines().next().unwrap_or_default().to_string()
}
