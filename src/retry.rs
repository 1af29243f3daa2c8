//! Fixed-delay retry wrapper for transient request failures.
//!
//! Unlike a backoff schedule, the delay here is a single fixed duration: the
//! remote API enforces its quota per time window, and page requests are
//! already spaced by the batch scheduler, so a short constant pause between
//! attempts is enough to ride out transient failures without distorting the
//! dispatch pattern.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::FetchError;

/// Default number of retries after the initial attempt.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default pause between attempts (250ms).
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Retries an asynchronous operation a bounded number of times with a fixed delay.
///
/// Makes up to `retries + 1` total attempts, so `retries == 0` means exactly
/// one attempt with no retry. The first success is returned immediately; if
/// the final attempt fails, that last failure is returned unchanged.
///
/// # Arguments
///
/// * `op` - Closure producing a fresh future per attempt
/// * `retries` - Number of retries after the initial attempt
/// * `delay` - Fixed pause between attempts
///
/// # Errors
///
/// Returns the error from the last attempt once the retry budget is exhausted.
pub async fn retry<F, Fut, T>(mut op: F, retries: u32, delay: Duration) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    for attempt in 0..retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                debug!(
                    attempt = attempt + 1,
                    max_attempts = retries + 1,
                    delay_ms = delay.as_millis(),
                    %error,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    // Final attempt: its failure is the caller's to handle.
    op().await
}
