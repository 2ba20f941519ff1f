//! Async testing utilities.
//!
//! Timeout wrappers and polling helpers for tests that drive invokers and
//! streams.

use std::future::Future;
use std::time::Duration;

use futures::{Stream, StreamExt};

/// Default timeout for async operations in tests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `future`, failing the test if it takes longer than `timeout`.
///
/// # Panics
///
/// Panics if the future does not complete within the timeout.
pub async fn with_timeout<T, F>(timeout: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(value) => value,
        Err(_) => panic!("future still pending after {timeout:?}"),
    }
}

/// Run a future with [`DEFAULT_TIMEOUT`].
pub async fn with_default_timeout<T, F>(future: F) -> T
where
    F: Future<Output = T>,
{
    with_timeout(DEFAULT_TIMEOUT, future).await
}

/// Assert that a future does not complete within `timeout`.
///
/// # Panics
///
/// Panics if the future completes before the timeout.
pub async fn assert_times_out<T, F>(timeout: Duration, future: F)
where
    F: Future<Output = T>,
{
    if tokio::time::timeout(timeout, future).await.is_ok() {
        panic!("future finished before {timeout:?} elapsed");
    }
}

/// Check `condition` once per `interval` until it holds.
///
/// # Panics
///
/// Panics if the condition is not met within the timeout.
pub async fn wait_for<F>(timeout: Duration, interval: Duration, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    let mut ticks = tokio::time::interval(interval);
    loop {
        ticks.tick().await;
        if condition() {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition still false after {timeout:?}"
        );
    }
}

/// Drain a stream with [`DEFAULT_TIMEOUT`].
///
/// # Panics
///
/// Panics if the stream does not end in time.
pub async fn collect_stream<S, T>(stream: S) -> Vec<T>
where
    S: Stream<Item = T>,
{
    with_default_timeout(stream.collect()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(Duration::from_secs(1), async { 42 }).await;
        assert_eq!(result, 42);
    }

    #[tokio::test]
    #[should_panic(expected = "still pending")]
    async fn test_with_timeout_failure() {
        with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
        })
        .await;
    }

    #[tokio::test]
    async fn test_assert_times_out() {
        assert_times_out(Duration::from_millis(10), futures::future::pending::<()>()).await;
    }

    #[tokio::test]
    async fn test_wait_for() {
        let counter = Arc::new(AtomicUsize::new(0));
        let writer = Arc::clone(&counter);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.store(5, Ordering::SeqCst);
        });

        wait_for(Duration::from_secs(1), Duration::from_millis(5), || {
            counter.load(Ordering::SeqCst) >= 5
        })
        .await;
    }

    #[tokio::test]
    async fn test_collect_stream() {
        let items = collect_stream(futures::stream::iter(1..=3)).await;
        assert_eq!(items, vec![1, 2, 3]);
    }
}
