use anyhow::{Error, Result, anyhow};
use chrono::{Duration as ChronoDuration, NaiveTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// # Returns
/// Either the successful result or the error after all attempts
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) if attempt > retries => return Err(err.into()),
            Err(err) => {
                debug!("Attempt {attempt}/{retries} failed: {err}. Retrying...");
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// Seconds from now until the next `hour:minute` UTC.
pub fn seconds_until(hour: u32, minute: u32) -> Result<u64> {
    let target_time = NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| anyhow!("Invalid time of day {hour:02}:{minute:02}"))?;
    let now = Utc::now();
    let mut target = now.date_naive().and_time(target_time).and_utc();
    if target <= now {
        target += ChronoDuration::days(1);
    }
    Ok((target - now).num_seconds().max(1) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_seconds_until_is_within_a_day() {
        let secs = seconds_until(18, 0).unwrap();
        assert!(secs >= 1 && secs <= 24 * 60 * 60);
    }

    #[test]
    fn test_seconds_until_rejects_invalid_time() {
        assert!(seconds_until(25, 0).is_err());
    }

    #[tokio::test]
    async fn test_with_retry_returns_first_success() {
        let calls = AtomicUsize::new(0);
        let result = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, reqwest::Error>(42) }
            },
            3,
            1,
        )
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
