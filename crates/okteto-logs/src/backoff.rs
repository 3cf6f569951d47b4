//! Capped exponential backoff for long-lived streaming operations

use std::future::Future;
use std::time::Duration;

use okteto_api::ApiError;
use thiserror::Error;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

const MIN_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Exponent cap, 2^10 is already far above MAX_DELAY
const MAX_EXPONENT: u32 = 10;

/// Stand-in deadline for timeouts too large to add to the clock
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Why the retry loop stopped without the operation succeeding
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RetryError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Errors produced by a retried operation
pub trait RetryableError: std::fmt::Display {
    /// `Some` when the error reports a cancellation or deadline, which stops
    /// the retry loop instead of triggering another attempt
    fn interruption(&self) -> Option<RetryError> {
        None
    }
}

impl RetryableError for ApiError {
    fn interruption(&self) -> Option<RetryError> {
        self.is_cancelled().then_some(RetryError::Cancelled)
    }
}

impl RetryableError for RetryError {
    fn interruption(&self) -> Option<RetryError> {
        Some(*self)
    }
}

/// Delay before retry number `attempt`: `(2^attempt - 1) * 500ms`,
/// clamped to `[500ms, 30s]`
pub fn calculate_exponential_backoff(attempt: u32) -> Duration {
    let exponent = attempt.min(MAX_EXPONENT);
    let delay = MIN_DELAY * ((1u32 << exponent) - 1);
    delay.clamp(MIN_DELAY, MAX_DELAY)
}

/// Run `operation` until it succeeds, retrying failures with exponential
/// backoff for at most `timeout`.
///
/// Each attempt gets a token that is cancelled when `cancel` is, or when the
/// timeout elapses. Operation errors are only logged: once the timeout is
/// reached the result is [`RetryError::DeadlineExceeded`], and cancelling
/// `cancel` yields [`RetryError::Cancelled`].
pub async fn stream_with_backoff<F, Fut, E>(
    cancel: &CancellationToken,
    timeout: Duration,
    mut operation: F,
    description: &str,
) -> Result<(), RetryError>
where
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: RetryableError,
{
    if cancel.is_cancelled() {
        return Err(RetryError::Cancelled);
    }
    if timeout.is_zero() {
        return Err(RetryError::DeadlineExceeded);
    }

    let now = Instant::now();
    let deadline = now
        .checked_add(timeout)
        .unwrap_or_else(|| now + FAR_FUTURE);
    let attempt_cancel = cancel.child_token();
    let _guard = attempt_cancel.clone().drop_guard();
    let mut attempt: u32 = 0;

    loop {
        if Instant::now() >= deadline {
            tracing::info!("{description}: giving up after {timeout:?}");
            return Err(RetryError::DeadlineExceeded);
        }

        let result = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = sleep_until(deadline) => {
                tracing::info!("{description}: giving up after {timeout:?}");
                return Err(RetryError::DeadlineExceeded);
            }
            result = operation(attempt_cancel.clone()) => result,
        };

        let err = match result {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if let Some(interruption) = err.interruption() {
            return Err(interruption);
        }

        attempt = attempt.saturating_add(1);
        let delay = calculate_exponential_backoff(attempt);
        tracing::debug!(attempt, ?delay, "{description} failed: {err}");

        tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = sleep_until(deadline) => {
                tracing::info!("{description}: giving up after {timeout:?}");
                return Err(RetryError::DeadlineExceeded);
            }
            _ = sleep(delay) => {}
        }
    }
}
