//! Polling assertions for background loops.

use std::{future::Future, time::Duration};

use tokio::time::{Instant, sleep};

/// Default polling interval for [`assert_eventually`].
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls `condition` until it returns true or `timeout` expires.
///
/// Returns whether the condition held before the deadline. The condition is
/// checked one final time after the deadline so a slow last tick still counts.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use cowallet_test_utils::assert_eventually;
///
/// # async fn example(store_has_job: impl Fn() -> bool) {
/// let drained = assert_eventually(Duration::from_secs(2), || !store_has_job()).await;
/// assert!(drained, "job runner should drain the queue");
/// # }
/// ```
pub async fn assert_eventually<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    poll_until(timeout, || {
        let held = condition();
        async move { held }
    })
    .await
}

/// Async variant of [`assert_eventually`] for conditions that must await.
pub async fn poll_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition().await {
            return true;
        }
        sleep(DEFAULT_POLL_INTERVAL).await;
    }
    condition().await
}
