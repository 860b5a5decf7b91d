use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::Checkpoint;
use crate::model::{CheckParams, CheckResponse};
use crate::Result;

/// Width of the first-tick window as a fraction of the interval; 2 spreads
/// a 24h interval over 18h..=30h.
pub const STAGGER_DIVISOR: u32 = 2;

// tokio rejects a zero period
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Random delay centered on `interval`, spanning `interval / divisor`.
///
/// A `divisor` of zero disables the jitter.
pub fn random_stagger(interval: Duration, divisor: u32) -> Duration {
    if divisor == 0 {
        return interval;
    }
    let spread = interval / divisor;
    let spread_nanos = u64::try_from(spread.as_nanos()).unwrap_or(u64::MAX);
    if spread_nanos == 0 {
        return interval;
    }

    let offset = rand::rng().random_range(0..=spread_nanos);
    interval - spread / 2 + Duration::from_nanos(offset)
}

/// Control handle for a running interval check.
///
/// Dropping the handle does not stop the schedule; call [`Self::stop`].
#[derive(Debug, Clone)]
pub struct IntervalHandle {
    stop: CancellationToken,
    done: CancellationToken,
}

impl IntervalHandle {
    pub(crate) fn new() -> Self {
        Self {
            stop: CancellationToken::new(),
            done: CancellationToken::new(),
        }
    }

    /// Handle for a schedule that never runs
    pub fn inert() -> Self {
        let handle = Self::new();
        handle.done.cancel();
        handle
    }

    /// Stop all future ticks. Safe to call any number of times.
    ///
    /// A check already in flight finishes (or times out) but its result is
    /// not delivered.
    pub fn stop(&self) {
        if !self.stop.is_cancelled() {
            tracing::debug!("Stopping checkpoint schedule");
        }
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Wait until the schedule's task has exited
    pub async fn stopped(&self) {
        self.done.cancelled().await;
    }
}

impl Checkpoint {
    /// Run `check` every `interval` until the returned handle is stopped.
    ///
    /// The first check waits a [`random_stagger`] so that installations
    /// started together do not poll together. Results, including errors,
    /// are passed to `callback` one at a time in tick order.
    pub fn check_interval<F>(
        &self,
        params: CheckParams,
        interval: Duration,
        callback: F,
    ) -> IntervalHandle
    where
        F: FnMut(Result<CheckResponse>) + Send + 'static,
    {
        if self.is_disabled() {
            return IntervalHandle::inert();
        }

        let handle = IntervalHandle::new();
        spawn_detached(self.clone().run_interval(params, interval, callback, handle.clone()));
        handle
    }

    pub(crate) async fn run_interval<F>(
        self,
        params: CheckParams,
        interval: Duration,
        mut callback: F,
        handle: IntervalHandle,
    ) where
        F: FnMut(Result<CheckResponse>) + Send + 'static,
    {
        let _done = handle.done.clone().drop_guard();

        let stagger = random_stagger(interval, STAGGER_DIVISOR);
        tracing::debug!(
            "Checking {} every {:?}, first check in {:?}",
            params.product,
            interval,
            stagger
        );

        tokio::select! {
            biased;
            () = handle.stop.cancelled() => return,
            () = tokio::time::sleep(stagger) => {}
        }

        let mut ticker = tokio::time::interval_at(Instant::now(), interval.max(MIN_PERIOD));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = handle.stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = self.check(&params).await;
            if handle.stop.is_cancelled() {
                break;
            }
            callback(result);
        }

        tracing::debug!("Checkpoint schedule for {} stopped", params.product);
    }
}

/// Run `work` in the background without blocking the caller: on the
/// current tokio runtime when there is one, otherwise on a dedicated thread
/// with its own runtime.
pub(crate) fn spawn_detached<F>(work: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(runtime) = tokio::runtime::Handle::try_current() {
        runtime.spawn(work);
        return;
    }

    let spawned = std::thread::Builder::new()
        .name("checkpoint".to_string())
        .spawn(move || {
            match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime.block_on(work),
                Err(e) => tracing::debug!("Failed to start checkpoint runtime: {}", e),
            }
        });

    if let Err(e) = spawned {
        tracing::debug!("Failed to spawn checkpoint thread: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckpointConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_random_stagger_bounds() {
        let interval = Duration::from_secs(24 * 60 * 60);
        let min = Duration::from_secs(18 * 60 * 60);
        let max = Duration::from_secs(30 * 60 * 60);

        for _ in 0..1000 {
            let out = random_stagger(interval, 2);
            assert!(out >= min && out <= max, "out of range: {out:?}");
        }
    }

    #[test]
    fn test_random_stagger_narrower_divisor() {
        let interval = Duration::from_secs(100);

        for _ in 0..1000 {
            let out = random_stagger(interval, 10);
            assert!(out >= Duration::from_secs(95) && out <= Duration::from_secs(105));
        }
    }

    #[test]
    fn test_random_stagger_degenerate_inputs() {
        let interval = Duration::from_secs(60);
        assert_eq!(random_stagger(interval, 0), interval);
        assert_eq!(random_stagger(Duration::ZERO, 2), Duration::ZERO);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let handle = IntervalHandle::new();
        assert!(!handle.is_stopped());

        handle.stop();
        handle.stop();

        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn test_inert_handle_is_already_done() {
        let handle = IntervalHandle::inert();

        tokio::time::timeout(Duration::from_millis(50), handle.stopped())
            .await
            .unwrap();
        handle.stop();
        assert!(handle.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_schedule_never_calls_back() {
        let client = Checkpoint::new(CheckpointConfig::disabled()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let handle = client.check_interval(
            CheckParams::new("test", "1.0"),
            Duration::from_millis(500),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.stop();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_stagger_exits_loop() {
        let client = Checkpoint::new(
            CheckpointConfig::default().with_endpoint("http://127.0.0.1:9"),
        )
        .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let handle = client.check_interval(
            CheckParams::new("test", "1.0"),
            Duration::from_secs(24 * 60 * 60),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_secs(60)).await;
        handle.stop();
        handle.stopped().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
