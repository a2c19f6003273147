use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;

/// True for timeouts, connection drops, 5xx and 429 — failures worth a
/// second attempt. 4xx other than 429 means the request itself is wrong.
pub fn is_retryable_error(err: &anyhow::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("timeout")
        || msg.contains("timed out")
        || msg.contains("connection")
        || msg.contains("429")
        || msg.contains("500")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("504")
        || msg.contains("server error")
        || msg.contains("broken pipe")
        || msg.contains("reset by peer")
}

/// Exactly one retry with a fixed backoff. Non-retryable errors return
/// immediately so the caller can move on to the next provider.
pub async fn retry_once<F, Fut, T>(backoff: Duration, label: &str, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    match operation().await {
        Ok(val) => Ok(val),
        Err(e) => {
            if !is_retryable_error(&e) {
                return Err(e);
            }
            log::warn!("{} failed, retrying in {}s: {}", label, backoff.as_secs(), e);
            sleep(backoff).await;
            operation().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_exactly_once_on_timeout() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = retry_once(Duration::from_secs(2), "fake", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("operation timed out")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = retry_once(Duration::from_secs(2), "fake", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("HTTP 404 not found")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_attempt_can_succeed() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = retry_once(Duration::from_secs(2), "fake", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(anyhow::anyhow!("connection reset by peer"))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_429_is_retryable_other_4xx_not() {
        assert!(is_retryable_error(&anyhow::anyhow!("HTTP 429 too many requests")));
        assert!(!is_retryable_error(&anyhow::anyhow!("HTTP 403 forbidden")));
    }
}
