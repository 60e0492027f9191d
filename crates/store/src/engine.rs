//! redb storage engine wrapper.
//!
//! Provides a thin wrapper around redb with:
//! - Database lifecycle management (file-backed or in-memory)
//! - Transaction constructors returning [`ReadTxn`] / [`WriteTxn`]
//! - Best-effort compaction

use std::{path::Path, sync::Arc};

use parking_lot::RwLock;
use redb::{Database, backends::InMemoryBackend};
use snafu::ResultExt;
use tracing::debug;

use crate::{
    error::{CommitSnafu, CompactionSnafu, OpenSnafu, Result, TableSnafu, TransactionSnafu},
    tables::Tables,
    txn::{ReadTxn, WriteTxn},
};

/// Storage engine backed by redb.
///
/// A single process owns the database. redb serializes writers, so at most
/// one [`WriteTxn`] is live at a time; readers see a consistent snapshot and
/// never block the writer. Clones share the same database handle.
#[derive(Clone)]
pub struct StorageEngine {
    db: Arc<RwLock<Database>>,
}

#[allow(clippy::result_large_err)]
impl StorageEngine {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = Database::create(path).context(OpenSnafu { path: path.display().to_string() })?;
        Self::initialize(db)
    }

    /// Create a new in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .context(OpenSnafu { path: ":memory:" })?;
        Self::initialize(db)
    }

    fn initialize(db: Database) -> Result<Self> {
        // Create the table up front so read transactions never miss it.
        let txn = db.begin_write().context(TransactionSnafu)?;
        txn.open_table(Tables::ENTRIES).context(TableSnafu)?;
        txn.commit().context(CommitSnafu)?;
        Ok(Self { db: Arc::new(RwLock::new(db)) })
    }

    /// Begin a read-only transaction.
    pub fn begin_read(&self) -> Result<ReadTxn> {
        let txn = self.db.read().begin_read().context(TransactionSnafu)?;
        Ok(ReadTxn::new(txn))
    }

    /// Begin a write transaction, waiting for any live writer to finish.
    pub fn begin_write(&self) -> Result<WriteTxn> {
        let txn = self.db.read().begin_write().context(TransactionSnafu)?;
        Ok(WriteTxn::new(txn))
    }

    /// Compacts the database file.
    ///
    /// Returns `Ok(false)` without doing anything when a transaction is live.
    pub fn compact(&self) -> Result<bool> {
        let Some(mut db) = self.db.try_write() else {
            debug!("Skipping compaction (transaction starting)");
            return Ok(false);
        };
        match db.compact() {
            Ok(compacted) => Ok(compacted),
            Err(redb::CompactionError::TransactionInProgress) => {
                debug!("Skipping compaction (transaction in progress)");
                Ok(false)
            },
            Err(source) => Err(source).context(CompactionSnafu),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use cowallet_test_utils::TestDir;

    use super::*;
    use crate::txn::ReadableStore;

    #[test]
    fn test_open_in_memory() {
        let engine = StorageEngine::open_in_memory().expect("should open");
        let _read = engine.begin_read().expect("should begin read");
        let _write = engine.begin_write().expect("should begin write");
    }

    #[test]
    fn test_write_and_read() {
        let engine = StorageEngine::open_in_memory().expect("should open");

        {
            let mut txn = engine.begin_write().expect("should begin write");
            txn.set(b"test_key", b"test_value").expect("set");
            txn.commit().expect("commit");
        }

        let txn = engine.begin_read().expect("should begin read");
        assert_eq!(txn.get(b"test_key").expect("get"), Some(b"test_value".to_vec()));
    }

    #[test]
    fn test_reopen_file_keeps_data() {
        let dir = TestDir::new();
        let path = dir.join("store.redb");
        {
            let engine = StorageEngine::open(&path).expect("open");
            let mut txn = engine.begin_write().expect("write");
            txn.set(b"k", b"v").expect("set");
            txn.commit().expect("commit");
        }

        let engine = StorageEngine::open(&path).expect("reopen");
        let txn = engine.begin_read().expect("read");
        assert_eq!(txn.get(b"k").expect("get"), Some(b"v".to_vec()));
    }

    #[test]
    fn test_compact_skips_while_reader_is_live() {
        let dir = TestDir::new();
        let engine = StorageEngine::open(dir.join("store.redb")).expect("open");
        let reader = engine.begin_read().expect("read");
        assert!(!engine.compact().expect("compact"));
        drop(reader);
        engine.compact().expect("compact after reader dropped");
    }
}
