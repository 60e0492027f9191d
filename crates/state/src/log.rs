//! Outbox entries.
//!
//! Logs are keyed by a sequence drawn from [`LOG_SEQUENCE`] inside the
//! appending transaction, so they drain in creation order. A second append
//! with the same trace id is refused: the trace id is remembered under the
//! property family for as long as the store lives, including after the log
//! itself has been submitted and removed. Guards are never reclaimed, so the
//! property family grows by one entry per appended log.

use chrono::{DateTime, Utc};
use cowallet_store::{KeyFamily, ReadableStore, Scan, WriteTxn};
use cowallet_types::Log;
use snafu::ResultExt;
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{Result, StoreSnafu},
    keys::StateKeys,
    property::{LOG_SEQUENCE, PropertyStore},
    record,
};

/// Outbox storage operations.
pub struct LogStore;

impl LogStore {
    fn trace_property(trace_id: Uuid) -> String {
        format!("log-trace:{trace_id}")
    }

    /// Appends an entry unless one with `trace_id` was ever appended.
    ///
    /// Returns the new entry, or `None` for a repeated trace id.
    pub fn append(txn: &mut WriteTxn, trace_id: Uuid, payload: Vec<u8>) -> Result<Option<Log>> {
        let now = txn.now();
        Self::append_at(txn, trace_id, payload, now)
    }

    /// Like [`append`](Self::append), stamping the entry with `created_at`.
    pub fn append_at(
        txn: &mut WriteTxn,
        trace_id: Uuid,
        payload: Vec<u8>,
        created_at: DateTime<Utc>,
    ) -> Result<Option<Log>> {
        let guard = Self::trace_property(trace_id);
        if PropertyStore::get_u64(&*txn, &guard)? != 0 {
            debug!(%trace_id, "Outbox entry already appended");
            return Ok(None);
        }

        let seq = PropertyStore::next_sequence(txn, LOG_SEQUENCE)?;
        let log = Log { seq, created_at, trace_id, payload };
        record::put(txn, &StateKeys::log(seq)?, &log)?;
        PropertyStore::set_u64(txn, &guard, seq)?;
        Ok(Some(log))
    }

    /// Lists up to `limit` entries, oldest first.
    pub fn list(store: &impl ReadableStore, limit: usize) -> Result<Vec<Log>> {
        let prefix = KeyFamily::Log.prefix();
        let entries = store.scan(&Scan::prefix(&prefix).limit(limit)).context(StoreSnafu)?;
        entries.iter().map(record::decode).collect()
    }

    /// Returns an entry by sequence.
    pub fn get(store: &impl ReadableStore, seq: u64) -> Result<Option<Log>> {
        record::get(store, &StateKeys::log(seq)?)
    }

    /// Deletes an entry. Returns whether it existed.
    pub fn remove(txn: &mut WriteTxn, seq: u64) -> Result<bool> {
        txn.delete(&StateKeys::log(seq)?).context(StoreSnafu)
    }
}
