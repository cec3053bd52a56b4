//! Fixed-delay retry for broker connection setup

use std::future::Future;
use std::time::Duration;

use crate::Result;

/// Run `operation` up to `attempts` times, sleeping `delay` between tries
///
/// Returns the first success, or the last error once attempts run out.
/// `attempts` of zero is treated as one.
pub async fn retry_fixed<F, Fut, T>(
    operation_name: &str,
    attempts: u32,
    delay: Duration,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation = operation_name, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt >= attempts => {
                tracing::error!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Giving up after {} attempts",
                    attempts
                );
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_secs = delay.as_secs_f64(),
                    error = %err,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
