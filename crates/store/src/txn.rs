//! Read and write transactions with prefix scans and per-entry expiry.
//!
//! Values are stored behind an eight-byte header holding the entry's expiry
//! as big-endian milliseconds since the Unix epoch, `0` meaning never.
//! Expired entries are invisible to `get` and `scan` from the moment their
//! deadline passes; [`WriteTxn::purge_expired`] reclaims them physically.

use std::{ops::Bound, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use redb::{AccessGuard, ReadableTable};
use snafu::ResultExt;

use crate::{
    error::{CommitSnafu, CorruptEntrySnafu, Result, StorageSnafu, TableSnafu},
    tables::Tables,
};

const EXPIRY_HEADER_LEN: usize = 8;
const NEVER: u64 = 0;

/// A decoded key/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Full key, including the family prefix.
    pub key: Vec<u8>,
    /// Payload without the expiry header.
    pub value: Vec<u8>,
    /// Expiry deadline, if the entry was written with a TTL.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Parameters of a prefix scan.
///
/// Forward scans start at `seek` (inclusive) or the start of the prefix.
/// Reverse scans start strictly below `seek` or at the end of the prefix.
/// Iteration stops when keys no longer share the prefix or `limit` entries
/// have been returned.
#[derive(Debug, Clone, Copy)]
pub struct Scan<'a> {
    prefix: &'a [u8],
    seek: Option<&'a [u8]>,
    reverse: bool,
    limit: usize,
}

impl<'a> Scan<'a> {
    /// Scans every key starting with `prefix`, ascending.
    pub fn prefix(prefix: &'a [u8]) -> Self {
        Self { prefix, seek: None, reverse: false, limit: usize::MAX }
    }

    /// Positions the scan at `key`.
    #[must_use]
    pub fn seek(mut self, key: &'a [u8]) -> Self {
        self.seek = Some(key);
        self
    }

    /// Iterates in descending key order.
    #[must_use]
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Returns at most `limit` live entries.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Lower (inclusive) and upper (exclusive, `None` = unbounded) key bounds.
    fn bounds(&self) -> (Vec<u8>, Option<Vec<u8>>) {
        let prefix_end = prefix_end(self.prefix);
        match (self.seek, self.reverse) {
            (Some(seek), false) => (self.prefix.max(seek).to_vec(), prefix_end),
            (Some(seek), true) => {
                let upper = match prefix_end {
                    Some(end) if end.as_slice() < seek => end,
                    _ => seek.to_vec(),
                };
                (self.prefix.to_vec(), Some(upper))
            },
            (None, _) => (self.prefix.to_vec(), prefix_end),
        }
    }
}

/// Smallest key greater than every key starting with `prefix`.
///
/// Returns `None` when no such key exists (empty prefix or all `0xFF`).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

fn millis(at: DateTime<Utc>) -> u64 {
    u64::try_from(at.timestamp_millis()).unwrap_or(0)
}

fn encode_value(expires_at: u64, payload: &[u8]) -> Vec<u8> {
    let mut value = Vec::with_capacity(EXPIRY_HEADER_LEN + payload.len());
    value.extend_from_slice(&expires_at.to_be_bytes());
    value.extend_from_slice(payload);
    value
}

fn decode_value<'v>(key: &[u8], value: &'v [u8]) -> Result<(u64, &'v [u8])> {
    if value.len() < EXPIRY_HEADER_LEN {
        return CorruptEntrySnafu {
            key: hex::encode(key),
            reason: format!("value has {} bytes, expiry header needs 8", value.len()),
        }
        .fail();
    }
    let (header, payload) = value.split_at(EXPIRY_HEADER_LEN);
    let mut bytes = [0u8; EXPIRY_HEADER_LEN];
    bytes.copy_from_slice(header);
    Ok((u64::from_be_bytes(bytes), payload))
}

fn is_expired(expires_at: u64, now_ms: u64) -> bool {
    expires_at != NEVER && expires_at <= now_ms
}

fn expiry_time(expires_at: u64) -> Option<DateTime<Utc>> {
    if expires_at == NEVER {
        return None;
    }
    i64::try_from(expires_at).ok().and_then(DateTime::from_timestamp_millis)
}

fn get_from<T>(table: &T, key: &[u8], now_ms: u64) -> Result<Option<Vec<u8>>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let Some(guard) = table.get(key).context(StorageSnafu)? else {
        return Ok(None);
    };
    let (expires_at, payload) = decode_value(key, guard.value())?;
    if is_expired(expires_at, now_ms) {
        return Ok(None);
    }
    Ok(Some(payload.to_vec()))
}

fn scan_from<T>(
    table: &T,
    scan: &Scan<'_>,
    now_ms: u64,
    include_expired: bool,
) -> Result<Vec<Entry>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    if scan.limit == 0 {
        return Ok(Vec::new());
    }
    let (lower, upper) = scan.bounds();
    let upper_bound = match &upper {
        Some(end) => Bound::Excluded(end.as_slice()),
        None => Bound::Unbounded,
    };
    if upper.as_deref().is_some_and(|end| lower.as_slice() >= end) {
        return Ok(Vec::new());
    }

    let range = table
        .range::<&[u8]>((Bound::Included(lower.as_slice()), upper_bound))
        .context(StorageSnafu)?;
    if scan.reverse {
        collect_entries(range.rev(), scan, now_ms, include_expired)
    } else {
        collect_entries(range, scan, now_ms, include_expired)
    }
}

type RawItem<'a> = std::result::Result<
    (AccessGuard<'a, &'static [u8]>, AccessGuard<'a, &'static [u8]>),
    redb::StorageError,
>;

fn collect_entries<'a>(
    iter: impl Iterator<Item = RawItem<'a>>,
    scan: &Scan<'_>,
    now_ms: u64,
    include_expired: bool,
) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for item in iter {
        let (key, value) = item.context(StorageSnafu)?;
        let key = key.value();
        if !key.starts_with(scan.prefix) {
            break;
        }
        let (expires_at, payload) = decode_value(key, value.value())?;
        if !include_expired && is_expired(expires_at, now_ms) {
            continue;
        }
        entries.push(Entry {
            key: key.to_vec(),
            value: payload.to_vec(),
            expires_at: expiry_time(expires_at),
        });
        if entries.len() >= scan.limit {
            break;
        }
    }
    Ok(entries)
}

/// Read access shared by read and write transactions.
pub trait ReadableStore {
    /// The clock reading used for expiry checks in this transaction.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the live payload stored at `key`.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read fails or the entry is corrupt.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Returns the live entries matching `scan`.
    ///
    /// # Errors
    ///
    /// Returns a store error if iteration fails or an entry is corrupt.
    fn scan(&self, scan: &Scan<'_>) -> Result<Vec<Entry>>;

    /// Whether a live entry exists at `key`.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read fails.
    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// A read-only snapshot of the store. Never blocks the writer.
pub struct ReadTxn {
    txn: redb::ReadTransaction,
    now: DateTime<Utc>,
}

impl ReadTxn {
    pub(crate) fn new(txn: redb::ReadTransaction) -> Self {
        Self { txn, now: Utc::now() }
    }

    /// Evaluates expiry as of `now` instead of the wall clock.
    #[must_use]
    pub fn as_of(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    fn table(&self) -> Result<redb::ReadOnlyTable<&'static [u8], &'static [u8]>> {
        self.txn.open_table(Tables::ENTRIES).context(TableSnafu)
    }
}

impl ReadableStore for ReadTxn {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        get_from(&self.table()?, key, millis(self.now))
    }

    fn scan(&self, scan: &Scan<'_>) -> Result<Vec<Entry>> {
        scan_from(&self.table()?, scan, millis(self.now), false)
    }
}

/// An exclusive write transaction. Dropping it without [`commit`](Self::commit)
/// discards every change.
pub struct WriteTxn {
    txn: redb::WriteTransaction,
    now: DateTime<Utc>,
}

impl WriteTxn {
    pub(crate) fn new(txn: redb::WriteTransaction) -> Self {
        Self { txn, now: Utc::now() }
    }

    /// Evaluates and stamps expiry as of `now` instead of the wall clock.
    #[must_use]
    pub fn as_of(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    fn table(&self) -> Result<redb::Table<'_, &'static [u8], &'static [u8]>> {
        self.txn.open_table(Tables::ENTRIES).context(TableSnafu)
    }

    fn insert(&mut self, key: &[u8], expires_at: u64, payload: &[u8]) -> Result<()> {
        let value = encode_value(expires_at, payload);
        self.table()?.insert(key, value.as_slice()).context(StorageSnafu)?;
        Ok(())
    }

    /// Stores `value` at `key` with no expiry.
    ///
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.insert(key, NEVER, value)
    }

    /// Stores `value` at `key`, unreadable once `ttl` has elapsed.
    ///
    /// A zero TTL stores an entry that is already expired.
    ///
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    pub fn set_with_ttl(&mut self, key: &[u8], value: &[u8], ttl: Duration) -> Result<()> {
        let deadline = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| self.now.checked_add_signed(ttl))
            .map_or(u64::MAX, millis);
        self.insert(key, deadline.max(1), value)
    }

    /// Removes `key`. Returns whether a live entry was removed.
    ///
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let now_ms = millis(self.now);
        let mut table = self.table()?;
        let Some(previous) = table.remove(key).context(StorageSnafu)? else {
            return Ok(false);
        };
        let (expires_at, _) = decode_value(key, previous.value())?;
        Ok(!is_expired(expires_at, now_ms))
    }

    /// Physically deletes up to `limit` expired entries under `prefix`.
    ///
    /// Returns the number of entries deleted.
    ///
    /// # Errors
    ///
    /// Returns a store error if iteration or deletion fails.
    pub fn purge_expired(&mut self, prefix: &[u8], limit: usize) -> Result<usize> {
        let now_ms = millis(self.now);
        let mut expired: Vec<Vec<u8>> = Vec::new();
        if limit > 0 {
            let table = self.table()?;
            let upper = prefix_end(prefix);
            let upper_bound = match &upper {
                Some(end) => Bound::Excluded(end.as_slice()),
                None => Bound::Unbounded,
            };
            let range =
                table.range::<&[u8]>((Bound::Included(prefix), upper_bound)).context(StorageSnafu)?;
            for item in range {
                let (key, value) = item.context(StorageSnafu)?;
                let key = key.value();
                let (expires_at, _) = decode_value(key, value.value())?;
                if is_expired(expires_at, now_ms) {
                    expired.push(key.to_vec());
                    if expired.len() >= limit {
                        break;
                    }
                }
            }
        }

        let mut table = self.table()?;
        for key in &expired {
            table.remove(key.as_slice()).context(StorageSnafu)?;
        }
        Ok(expired.len())
    }

    /// Commits every change made in this transaction.
    ///
    /// # Errors
    ///
    /// Returns a store error if the commit fails; no change is applied.
    pub fn commit(self) -> Result<()> {
        self.txn.commit().context(CommitSnafu)
    }

    /// Discards every change made in this transaction.
    ///
    /// # Errors
    ///
    /// Returns a store error if the rollback fails.
    pub fn discard(self) -> Result<()> {
        self.txn.abort().context(StorageSnafu)
    }
}

impl ReadableStore for WriteTxn {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        get_from(&self.table()?, key, millis(self.now))
    }

    fn scan(&self, scan: &Scan<'_>) -> Result<Vec<Entry>> {
        scan_from(&self.table()?, scan, millis(self.now), false)
    }
}
