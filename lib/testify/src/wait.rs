use std::time::Duration;

use tokio::time::{sleep, timeout};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const MIN_PAUSE: Duration = Duration::from_millis(5);
const MAX_PAUSE: Duration = Duration::from_millis(500);

/// Polls `condition` until it holds, pausing a little longer after every
/// miss. Panics if it doesn't hold within `limit`.
pub async fn wait_for_within<F>(limit: Duration, mut condition: F)
where
    F: AsyncFnMut() -> bool,
{
    let poll = async {
        let mut pause = MIN_PAUSE;
        while !condition().await {
            sleep(pause).await;
            pause = (pause * 2).min(MAX_PAUSE);
        }
    };

    if timeout(limit, poll).await.is_err() {
        panic!("condition not met within {limit:?}");
    }
}

/// `wait_for_within` five seconds.
pub async fn wait_for<F>(condition: F)
where
    F: AsyncFnMut() -> bool,
{
    wait_for_within(DEFAULT_TIMEOUT, condition).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn polls_until_true() {
        let calls = AtomicUsize::new(0);

        wait_for(async || calls.fetch_add(1, Ordering::SeqCst) >= 3).await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    #[should_panic(expected = "condition not met")]
    async fn panics_after_limit() {
        wait_for_within(Duration::from_millis(50), async || false).await;
    }
}
