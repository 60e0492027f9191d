//! Sync job queue.
//!
//! A job is keyed by vault identity and written with a TTL, so enqueuing a
//! vault that already has a live job overwrites it instead of adding a
//! second one. Jobs are never deleted by the runner; they lapse when their
//! TTL elapses and the reclamation task removes them.

use std::time::Duration;

use cowallet_store::{KeyFamily, ReadableStore, Scan, WriteTxn};
use cowallet_types::{Job, UserId, VaultAddress, VaultId, encode_record};
use snafu::ResultExt;

use crate::{
    error::{CodecSnafu, Result, StoreSnafu},
    keys::StateKeys,
    record,
};

/// Job queue operations.
pub struct JobStore;

impl JobStore {
    /// Upserts the job for `address`, live for `ttl`.
    pub fn enqueue(
        txn: &mut WriteTxn,
        user: UserId,
        address: &VaultAddress,
        ttl: Duration,
    ) -> Result<Job> {
        let job = Job {
            created_at: txn.now(),
            user,
            members: address.members().to_vec(),
            threshold: address.threshold(),
        };
        let bytes = encode_record(&job).context(CodecSnafu)?;
        txn.set_with_ttl(&StateKeys::job(address.vault_id())?, &bytes, ttl).context(StoreSnafu)?;
        Ok(job)
    }

    /// Returns the live job for a vault.
    pub fn get(store: &impl ReadableStore, vault_id: VaultId) -> Result<Option<Job>> {
        record::get(store, &StateKeys::job(vault_id)?)
    }

    /// Lists up to `limit` live jobs, ordered by vault id.
    pub fn list(store: &impl ReadableStore, limit: usize) -> Result<Vec<(VaultId, Job)>> {
        let prefix = KeyFamily::Job.prefix();
        let entries = store.scan(&Scan::prefix(&prefix).limit(limit)).context(StoreSnafu)?;
        entries
            .iter()
            .map(|entry| Ok((StateKeys::parse_job(&entry.key)?, record::decode(entry)?)))
            .collect()
    }

    /// Physically removes up to `limit` expired jobs.
    pub fn purge_expired(txn: &mut WriteTxn, limit: usize) -> Result<usize> {
        txn.purge_expired(&KeyFamily::Job.prefix(), limit).context(StoreSnafu)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use chrono::TimeDelta;
    use cowallet_store::StorageEngine;
    use cowallet_test_utils::fixtures::{at, user, vault};

    use super::*;

    #[test]
    fn test_enqueue_twice_keeps_one_job() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let address = vault(&[1, 2], 2);

        for (who, seconds) in [(1, 0), (2, 10)] {
            let mut txn = engine.begin_write().unwrap().as_of(at(seconds));
            JobStore::enqueue(&mut txn, user(who), &address, Duration::from_secs(300)).unwrap();
            txn.commit().unwrap();
        }

        let read = engine.begin_read().unwrap().as_of(at(20));
        let jobs = JobStore::list(&read, 100).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].0, address.vault_id());
        assert_eq!(jobs[0].1.user, user(2));
        assert_eq!(jobs[0].1.address().unwrap(), address);
    }

    #[test]
    fn test_jobs_lapse_after_ttl() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let mut txn = engine.begin_write().unwrap().as_of(at(0));
        JobStore::enqueue(&mut txn, user(1), &vault(&[1], 1), Duration::from_secs(60)).unwrap();
        JobStore::enqueue(&mut txn, user(1), &vault(&[2], 1), Duration::from_secs(600)).unwrap();
        txn.commit().unwrap();

        let later = at(0) + TimeDelta::seconds(120);
        let read = engine.begin_read().unwrap().as_of(later);
        assert_eq!(JobStore::list(&read, 100).unwrap().len(), 1);
        assert!(JobStore::get(&read, vault(&[1], 1).vault_id()).unwrap().is_none());
        drop(read);

        let mut txn = engine.begin_write().unwrap().as_of(later);
        assert_eq!(JobStore::purge_expired(&mut txn, 10).unwrap(), 1);
        txn.commit().unwrap();
    }

    #[test]
    fn test_list_respects_limit() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let mut txn = engine.begin_write().unwrap();
        for n in 1..=5 {
            JobStore::enqueue(&mut txn, user(n), &vault(&[n], 1), Duration::from_secs(60)).unwrap();
        }
        txn.commit().unwrap();

        let read = engine.begin_read().unwrap();
        assert_eq!(JobStore::list(&read, 3).unwrap().len(), 3);
    }
}
