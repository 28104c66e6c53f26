//! Bounded retry for transient tool failures.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `op` up to `attempts` times, sleeping `delay` between failures.
///
/// `retryable` decides whether an error is worth another attempt; the last
/// error is returned once attempts run out.
pub async fn with_retries<T, E, F, Fut, R>(
    label: &str,
    attempts: u32,
    delay: Duration,
    retryable: R,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < attempts && retryable(&err) => {
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying",
                    label,
                    attempt + 1,
                    attempts,
                    err
                );
                attempt += 1;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(err) => return Err(err),
        }
    }
}
