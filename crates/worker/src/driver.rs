//! Shared driver for the periodic background loops.

use std::{future::Future, time::Duration};

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, info};

use crate::error::{BlockingTaskSnafu, Result};

/// Runs a redb write section on the blocking pool, inside the caller's span.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let span = Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(work)).await.context(BlockingTaskSnafu)?
}

/// Delay schedule of a periodic loop.
///
/// Healthy loops wait `tick`. Consecutive failures follow an exponential
/// schedule starting at `tick` and capped at `max`; a success starts the
/// schedule over.
struct Pacing {
    tick: Duration,
    max: Duration,
    failures: u32,
    delays: ExponentialBackoff,
}

impl Pacing {
    fn new(tick: Duration, max: Duration) -> Self {
        let max = max.max(tick);
        Self { tick, max, failures: 0, delays: Self::schedule(tick, max) }
    }

    fn schedule(tick: Duration, max: Duration) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(tick)
            .with_max_delay(max)
            .without_max_times()
            .build()
    }

    /// Records a pass outcome and returns the delay before the next pass.
    fn after(&mut self, succeeded: bool) -> Duration {
        if succeeded {
            if self.failures > 0 {
                self.failures = 0;
                self.delays = Self::schedule(self.tick, self.max);
            }
            return self.tick;
        }
        self.failures = self.failures.saturating_add(1);
        self.delays.next().unwrap_or(self.max)
    }
}

/// Runs `cycle` every `tick` until `cancel` fires.
///
/// `cycle` reports whether the pass succeeded; failed passes stretch the
/// delay exponentially up to `max_backoff`. A cycle in progress when the
/// token fires is dropped at its next await point.
pub(crate) async fn run_periodic<F, Fut>(
    name: &'static str,
    tick: Duration,
    max_backoff: Duration,
    cancel: CancellationToken,
    mut cycle: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let mut pacing = Pacing::new(tick, max_backoff);
    info!(task = name, tick_ms = tick.as_millis() as u64, "Background task started");

    loop {
        let succeeded = tokio::select! {
            () = cancel.cancelled() => break,
            succeeded = cycle() => succeeded,
        };

        let delay = pacing.after(succeeded);
        if pacing.failures > 0 {
            debug!(
                task = name,
                failures = pacing.failures,
                delay_ms = delay.as_millis() as u64,
                "Backing off"
            );
        }

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {},
        }
    }

    info!(task = name, "Background task stopped");
}
