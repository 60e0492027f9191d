//! Store maintenance tasks.
//!
//! - [`TtlReclaimer`] physically removes expired jobs. Expired entries are
//!   already invisible to readers; reclamation only frees their space.
//! - [`Compactor`] compacts the database file when no transaction is live.

use std::time::Duration;

use cowallet_state::JobStore;
use cowallet_store::StorageEngine;
use cowallet_types::config::StorageConfig;
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    driver::{blocking, run_periodic},
    error::{Result, StateSnafu, StoreSnafu},
};

/// Default interval between reclamation cycles.
const DEFAULT_RECLAIM_INTERVAL: Duration = Duration::from_secs(60);

/// Default maximum entries removed per cycle.
const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default interval between compactions.
const DEFAULT_COMPACT_INTERVAL: Duration = Duration::from_secs(3600);

/// Removes expired jobs in batches.
#[derive(Clone, bon::Builder)]
pub struct TtlReclaimer {
    /// Store to reclaim.
    store: StorageEngine,
    /// Interval between cycles.
    #[builder(default = DEFAULT_RECLAIM_INTERVAL)]
    interval: Duration,
    /// Maximum entries removed per cycle.
    #[builder(default = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
}

impl TtlReclaimer {
    /// Creates a reclaimer from configuration.
    pub fn from_config(store: StorageEngine, config: &StorageConfig) -> Self {
        Self { store, interval: config.ttl_gc_interval, batch_size: config.ttl_gc_batch_size }
    }

    /// Runs a single cycle. Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write transaction fails.
    pub fn run_cycle(&self) -> Result<usize> {
        let mut txn = self.store.begin_write().context(StoreSnafu)?;
        let removed = JobStore::purge_expired(&mut txn, self.batch_size).context(StateSnafu)?;
        if removed == 0 {
            txn.discard().context(StoreSnafu)?;
            debug!("No expired jobs to reclaim");
            return Ok(0);
        }
        txn.commit().context(StoreSnafu)?;
        info!(removed, "Reclaimed expired jobs");
        Ok(removed)
    }

    /// Starts the reclaimer as a background task stopped by `cancel`.
    pub fn start(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let reclaimer = &self;
            run_periodic("ttl_reclaim", self.interval, self.interval, cancel, move || async move {
                let reclaimer = reclaimer.clone();
                match blocking(move || reclaimer.run_cycle()).await {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(error = %e, "Job reclamation failed");
                        false
                    },
                }
            })
            .await;
        })
    }
}

/// Compacts the database file.
#[derive(Clone, bon::Builder)]
pub struct Compactor {
    /// Store to compact.
    store: StorageEngine,
    /// Interval between compactions.
    #[builder(default = DEFAULT_COMPACT_INTERVAL)]
    interval: Duration,
}

impl Compactor {
    /// Creates a compactor from configuration.
    pub fn from_config(store: StorageEngine, config: &StorageConfig) -> Self {
        Self { store, interval: config.compact_interval }
    }

    /// Runs a single compaction. Returns whether the file was compacted.
    ///
    /// # Errors
    ///
    /// Returns an error if compaction fails for a reason other than a live
    /// transaction.
    pub fn run_cycle(&self) -> Result<bool> {
        let compacted = self.store.compact().context(StoreSnafu)?;
        if compacted {
            info!("Database compacted");
        } else {
            debug!("Compaction skipped");
        }
        Ok(compacted)
    }

    /// Starts the compactor as a background task stopped by `cancel`.
    ///
    /// The first compaction runs one interval after start.
    pub fn start(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(self.interval) => {},
            }
            let compactor = &self;
            run_periodic("compaction", self.interval, self.interval, cancel, move || async move {
                let compactor = compactor.clone();
                match blocking(move || compactor.run_cycle()).await {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(error = %e, "Compaction failed");
                        false
                    },
                }
            })
            .await;
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use cowallet_test_utils::{
        TestDir,
        fixtures::{user, vault},
    };

    use super::*;

    #[test]
    fn test_reclaimer_removes_only_expired_jobs() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let mut txn = engine.begin_write().unwrap();
        JobStore::enqueue(&mut txn, user(1), &vault(&[1], 1), Duration::from_millis(1)).unwrap();
        JobStore::enqueue(&mut txn, user(2), &vault(&[2], 1), Duration::from_secs(3600)).unwrap();
        txn.commit().unwrap();

        // Let the short job lapse against the wall clock.
        std::thread::sleep(Duration::from_millis(20));

        let reclaimer = TtlReclaimer::builder().store(engine.clone()).build();
        assert_eq!(reclaimer.run_cycle().unwrap(), 1);
        assert_eq!(reclaimer.run_cycle().unwrap(), 0);

        let read = engine.begin_read().unwrap();
        assert_eq!(JobStore::list(&read, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_compactor_on_file_store() {
        let dir = TestDir::new();
        let engine = StorageEngine::open(dir.store_path()).unwrap();
        let compactor = Compactor::builder().store(engine).build();
        compactor.run_cycle().unwrap();
    }
}
