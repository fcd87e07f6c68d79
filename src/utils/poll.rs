use crate::errors::{BookingError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Interval used by element waits unless a caller picks its own.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run `check` until it yields a value or `deadline` has elapsed.
///
/// The first check runs immediately and its value is returned as soon as
/// one appears. Between attempts the poll sleeps `interval` (clamped to the
/// time left), and a final attempt is made at the deadline itself. On expiry
/// the error names `what` was being awaited.
pub async fn poll<T, F, Fut>(
    what: &str,
    interval: Duration,
    deadline: Duration,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = Instant::now();
    loop {
        if let Some(value) = check().await {
            return Ok(value);
        }

        let elapsed = start.elapsed();
        if elapsed >= deadline {
            return Err(BookingError::TimeoutError(format!(
                "{} ({} ms)",
                what,
                deadline.as_millis()
            )));
        }

        tokio::time::sleep(interval.min(deadline - elapsed)).await;
    }
}

/// [`poll`] for checks that only answer yes or no.
pub async fn poll_until<F, Fut>(
    what: &str,
    interval: Duration,
    deadline: Duration,
    mut predicate: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    poll(what, interval, deadline, || {
        let ready = predicate();
        async move { ready.await.then_some(()) }
    })
    .await
}

/// Fixed pause that lets the site finish an animation or re-render.
pub async fn settle(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
