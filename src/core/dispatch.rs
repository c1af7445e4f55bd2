//! Rate and concurrency gate in front of the remote classifier.
//!
//! Windows arrive far more often than the classifier should be called. The
//! dispatcher lets at most one call run at a time and refuses to start a new
//! call until `min_interval` has passed since the previous one started.
//! Refused attempts are reported as `Ok(None)`, which callers treat as "no
//! update this cycle" rather than a failure.

use crate::core::windowing::Window;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Default spacing between classifier calls.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(600);

/// Wraps a remote call with an at-most-one-in-flight, minimum-interval gate.
pub struct ThrottledDispatcher<F> {
    min_interval: Duration,
    remote_call: F,
    in_flight: AtomicBool,
    /// Start of the last accepted call
    last_call: Mutex<Option<Instant>>,
}

/// Clears the in-flight flag when the call finishes, fails, or the awaiting
/// task is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<F> ThrottledDispatcher<F> {
    /// Create a dispatcher around `remote_call`.
    pub fn new(min_interval: Duration, remote_call: F) -> Self {
        Self {
            min_interval,
            remote_call,
            in_flight: AtomicBool::new(false),
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Whether a remote call is currently running.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Try to send `window` to the remote call.
    ///
    /// Returns `Ok(None)` without calling anything if a call is in flight or
    /// the previous call started less than `min_interval` ago. Errors from
    /// the remote call are returned unchanged and never retried.
    pub async fn attempt<Fut, T, E>(&self, window: Window) -> Result<Option<T>, E>
    where
        F: Fn(Window) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Dispatch skipped: call in flight");
            return Ok(None);
        }
        let guard = InFlightGuard(&self.in_flight);

        let now = Instant::now();
        {
            let mut last_call = self.last_call.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(last) = *last_call {
                if now.duration_since(last) < self.min_interval {
                    tracing::debug!("Dispatch skipped: within minimum interval");
                    return Ok(None);
                }
            }
            *last_call = Some(now);
        }

        let result = (self.remote_call)(window).await;
        drop(guard);
        result.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::Sample;
    use crate::core::windowing::WINDOW_SIZE;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn window() -> Window {
        Window::from_samples(vec![Sample([0.0; 6]); WINDOW_SIZE]).unwrap()
    }

    fn counting_call(
        calls: Arc<AtomicUsize>,
    ) -> impl Fn(Window) -> std::future::Ready<Result<usize, String>> {
        move |_w| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(Ok(n))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_attempt_within_interval_is_skipped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher =
            ThrottledDispatcher::new(Duration::from_millis(600), counting_call(calls.clone()));

        assert_eq!(dispatcher.attempt(window()).await, Ok(Some(1)));
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(dispatcher.attempt(window()).await, Ok(None));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_after_interval_is_accepted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher =
            ThrottledDispatcher::new(Duration::from_millis(600), counting_call(calls.clone()));

        assert_eq!(dispatcher.attempt(window()).await, Ok(Some(1)));
        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(dispatcher.attempt(window()).await, Ok(Some(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_call_blocks_second_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let counter = calls.clone();
        let gate = release.clone();
        let dispatcher = Arc::new(ThrottledDispatcher::new(Duration::ZERO, move |_w: Window| {
            let counter = counter.clone();
            let gate = gate.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                gate.notified().await;
                Ok::<_, String>("done")
            }
        }));

        let first = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.attempt(window()).await }
        });
        while !dispatcher.is_in_flight() {
            tokio::task::yield_now().await;
        }

        // well past any interval, still rejected while the first call runs
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(dispatcher.attempt(window()).await, Ok(None));

        release.notify_one();
        assert_eq!(first.await.unwrap(), Ok(Some("done")));
        assert!(!dispatcher.is_in_flight());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_propagates_and_clears_flag() {
        let dispatcher = ThrottledDispatcher::new(Duration::from_millis(600), |_w: Window| async {
            Err::<(), _>("timed out".to_string())
        });

        assert_eq!(dispatcher.attempt(window()).await, Err("timed out".to_string()));
        assert!(!dispatcher.is_in_flight());

        // the failed call still counts as the last call start
        assert_eq!(dispatcher.attempt(window()).await, Ok(None));
        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(dispatcher.attempt(window()).await, Err("timed out".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_attempt_releases_flag() {
        let dispatcher = ThrottledDispatcher::new(Duration::ZERO, |_w: Window| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, String>(())
        });

        let cancelled =
            tokio::time::timeout(Duration::from_millis(10), dispatcher.attempt(window())).await;
        assert!(cancelled.is_err());
        assert!(!dispatcher.is_in_flight());
    }
}
