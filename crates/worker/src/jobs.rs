//! Sync job runner.
//!
//! Each tick lists the live jobs and runs one sync pass per job with bounded
//! concurrency. Jobs are keyed by vault, so a tick never runs two passes for
//! the same vault, and the next tick starts only after every pass of this
//! one has finished. Jobs are not removed after a pass: a vault keeps being
//! synced every tick until its job's TTL lapses.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use cowallet_state::JobStore;
use cowallet_store::StorageEngine;
use cowallet_types::config::SyncConfig;
use futures::{StreamExt, stream};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    driver::run_periodic,
    error::{Result, StateSnafu, StoreSnafu},
    sync::SyncEngine,
};

/// Default number of vaults synced at once.
const DEFAULT_CONCURRENCY: usize = 10;

/// Default maximum jobs drained per tick.
const DEFAULT_DRAIN_LIMIT: usize = 1000;

/// Default interval between ticks.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Default backoff ceiling.
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobCycle {
    /// Jobs drained.
    pub jobs: usize,
    /// Passes that failed.
    pub failed: usize,
}

/// Drains the job queue into the sync engine.
#[derive(bon::Builder)]
pub struct JobRunner {
    /// Store holding the job queue.
    store: StorageEngine,
    /// Engine running the passes.
    engine: Arc<SyncEngine>,
    /// Passes in flight at once.
    #[builder(default = DEFAULT_CONCURRENCY)]
    concurrency: usize,
    /// Jobs drained per tick.
    #[builder(default = DEFAULT_DRAIN_LIMIT)]
    drain_limit: usize,
    /// Interval between ticks.
    #[builder(default = DEFAULT_INTERVAL)]
    interval: Duration,
    /// Backoff ceiling after failed ticks.
    #[builder(default = DEFAULT_MAX_BACKOFF)]
    max_backoff: Duration,
}

impl JobRunner {
    /// Creates a runner from configuration.
    pub fn from_config(store: StorageEngine, engine: Arc<SyncEngine>, config: &SyncConfig) -> Self {
        Self {
            store,
            engine,
            concurrency: config.concurrency,
            drain_limit: config.job_drain_limit,
            interval: config.tick,
            max_backoff: config.max_backoff,
        }
    }

    /// Runs one tick.
    ///
    /// A failed pass is logged and counted; it never stops the other passes.
    ///
    /// # Errors
    ///
    /// Returns an error only if the queue itself cannot be read.
    pub async fn run_cycle(&self) -> Result<JobCycle> {
        let jobs = {
            let read = self.store.begin_read().context(StoreSnafu)?;
            JobStore::list(&read, self.drain_limit).context(StateSnafu)?
        };
        if jobs.is_empty() {
            debug!("No pending sync jobs");
            return Ok(JobCycle::default());
        }

        let failed = AtomicUsize::new(0);
        stream::iter(&jobs)
            .for_each_concurrent(self.concurrency.max(1), |(vault_id, job)| {
                let failed = &failed;
                async move {
                    let address = match job.address() {
                        Ok(address) => address,
                        Err(e) => {
                            warn!(vault = %vault_id, error = %e, "Skipping job with invalid vault");
                            failed.fetch_add(1, Ordering::Relaxed);
                            return;
                        },
                    };
                    if let Err(e) = self.engine.sync_vault(&address).await {
                        warn!(
                            vault = %vault_id,
                            user = %job.user,
                            error = %e,
                            code = %e.code(),
                            "Sync pass failed"
                        );
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
            .await;

        let cycle = JobCycle { jobs: jobs.len(), failed: failed.into_inner() };
        debug!(jobs = cycle.jobs, failed = cycle.failed, "Job cycle complete");
        Ok(cycle)
    }

    /// Starts the runner as a background task stopped by `cancel`.
    pub fn start(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let runner = &self;
            run_periodic("sync_jobs", self.interval, self.max_backoff, cancel, move || async move {
                match runner.run_cycle().await {
                    Ok(cycle) => cycle.failed == 0,
                    Err(e) => {
                        warn!(error = %e, "Failed to drain sync jobs");
                        false
                    },
                }
            })
            .await;
        })
    }
}
