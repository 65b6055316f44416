use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Result of polling a source until it yields something or the budget runs out.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    /// The source returned at least one item.
    Replied(Vec<T>),
    /// Every poll within the budget came back empty.
    TimedOut,
}

/// Poll `fetch` at a fixed `interval` until it returns a non-empty batch or
/// `budget` has elapsed since the first poll.
///
/// The source is always polled at least once, and once more at the deadline
/// when the last sleep ends on it. Errors from `fetch` end polling immediately.
pub async fn poll_with_timeout<T, E, F, Fut>(
    interval: Duration,
    budget: Duration,
    mut fetch: F,
) -> Result<PollOutcome<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let deadline = Instant::now() + budget;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let batch = fetch().await?;
        if !batch.is_empty() {
            tracing::trace!(attempts, items = batch.len(), "Poll returned items");
            return Ok(PollOutcome::Replied(batch));
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::debug!(attempts, budget_ms = budget.as_millis() as u64, "Poll budget exhausted");
            return Ok(PollOutcome::TimedOut);
        }

        // Fixed interval, clipped so the final poll lands on the deadline.
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_returns_first_non_empty_batch() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let outcome = poll_with_timeout(Duration::from_millis(5), Duration::from_secs(2), || {
            let n = counter.fetch_add(1, Ordering::Relaxed);
            async move {
                if n < 2 {
                    Ok::<_, String>(Vec::new())
                } else {
                    Ok(vec!["reply"])
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(outcome, PollOutcome::Replied(vec!["reply"]));
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_times_out_when_always_empty() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let started = std::time::Instant::now();
        let outcome = poll_with_timeout(Duration::from_millis(10), Duration::from_millis(50), || {
            counter.fetch_add(1, Ordering::Relaxed);
            async { Ok::<Vec<u8>, String>(Vec::new()) }
        })
        .await
        .unwrap();
        assert_eq!(outcome, PollOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(calls.load(Ordering::Relaxed) >= 2);
    }

    #[tokio::test]
    async fn test_zero_budget_polls_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let outcome = poll_with_timeout(Duration::from_millis(10), Duration::ZERO, || {
            counter.fetch_add(1, Ordering::Relaxed);
            async { Ok::<Vec<u8>, String>(Vec::new()) }
        })
        .await
        .unwrap();
        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_error_stops_polling() {
        let result = poll_with_timeout(Duration::from_millis(1), Duration::from_secs(1), || async {
            Err::<Vec<u8>, _>("boom".to_string())
        })
        .await;
        assert_eq!(result, Err("boom".to_string()));
    }
}
