//! Time-bounded predicate loops with cancellation

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Checks that the condition becomes true within the given period.
///
/// The condition is evaluated with `poll_interval` spacing, starting one
/// interval after the call. Returns `true` as soon as an evaluation passes,
/// `false` once the deadline elapses or the token fires — when waiting for a
/// positive event, cancellation means it never happened.
pub async fn eventually<F, Fut>(
    token: &CancellationToken,
    mut condition: F,
    timeout: Duration,
    poll_interval: Duration,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        tokio::select! {
            _ = token.cancelled() => return false,
            _ = sleep(poll_interval) => {
                if condition().await {
                    return true;
                }
            }
        }
    }

    false
}

/// Checks that the condition holds for the entire period.
///
/// Returns `false` the moment an evaluation fails, `true` once the deadline
/// elapses without a refutation. Cancellation also returns `true`: the caller
/// asked to stop and no refutation had been observed yet.
pub async fn consistently<F, Fut>(
    token: &CancellationToken,
    mut condition: F,
    timeout: Duration,
    poll_interval: Duration,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        tokio::select! {
            _ = token.cancelled() => return true,
            _ = sleep(poll_interval) => {
                if !condition().await {
                    return false;
                }
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TICK: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn test_eventually_succeeds_after_retries() {
        let token = CancellationToken::new();
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = attempts.clone();
        let ok = eventually(
            &token,
            move || {
                let counter = counter.clone();
                async move { counter.fetch_add(1, Ordering::SeqCst) + 1 >= 3 }
            },
            Duration::from_secs(2),
            TICK,
        )
        .await;

        assert!(ok);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_eventually_times_out() {
        let token = CancellationToken::new();
        let ok = eventually(&token, || async { false }, Duration::from_millis(60), TICK).await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_eventually_cancellation_is_failure() {
        let token = CancellationToken::new();

        let cancel = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(30)).await;
            cancel.cancel();
        });

        let start = Instant::now();
        let ok = eventually(&token, || async { false }, Duration::from_secs(10), TICK).await;

        assert!(!ok);
        // The poller must notice the cancellation within one interval.
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_consistently_holds() {
        let token = CancellationToken::new();
        let ok = consistently(&token, || async { true }, Duration::from_millis(60), TICK).await;
        assert!(ok);
    }

    #[tokio::test]
    async fn test_consistently_refuted() {
        let token = CancellationToken::new();
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = attempts.clone();
        let ok = consistently(
            &token,
            move || {
                let counter = counter.clone();
                async move { counter.fetch_add(1, Ordering::SeqCst) + 1 < 2 }
            },
            Duration::from_secs(10),
            TICK,
        )
        .await;

        assert!(!ok);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_consistently_cancellation_is_success() {
        let token = CancellationToken::new();

        let cancel = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(30)).await;
            cancel.cancel();
        });

        let ok = consistently(&token, || async { true }, Duration::from_secs(10), TICK).await;
        assert!(ok);
    }

    #[tokio::test]
    async fn test_eventually_then_consistently_duality() {
        // A condition that is eventually-and-forever true passes both loops.
        let token = CancellationToken::new();
        let flipped = Arc::new(AtomicUsize::new(0));

        let counter = flipped.clone();
        let became_true = eventually(
            &token,
            move || {
                let counter = counter.clone();
                async move { counter.fetch_add(1, Ordering::SeqCst) >= 2 }
            },
            Duration::from_secs(2),
            TICK,
        )
        .await;
        assert!(became_true);

        let stays_true =
            consistently(&token, || async { true }, Duration::from_millis(60), TICK).await;
        assert!(stays_true);
    }
}
