//! Store error types.

use cowallet_types::ErrorCode;
use snafu::Snafu;

/// Result type for store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Errors raised by the store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    /// The database file could not be opened or created.
    #[snafu(display("Failed to open database at {path}: {source}"))]
    Open {
        /// Database path, or `:memory:`.
        path: String,
        /// Underlying redb error.
        source: redb::DatabaseError,
    },

    /// A transaction could not begin.
    #[snafu(display("Failed to begin transaction: {source}"))]
    Transaction {
        /// Underlying redb error.
        source: redb::TransactionError,
    },

    /// The entries table could not be opened.
    #[snafu(display("Failed to open table: {source}"))]
    Table {
        /// Underlying redb error.
        source: redb::TableError,
    },

    /// A read, write, or iteration failed.
    #[snafu(display("Storage operation failed: {source}"))]
    Storage {
        /// Underlying redb error.
        source: redb::StorageError,
    },

    /// The transaction could not commit.
    #[snafu(display("Failed to commit transaction: {source}"))]
    Commit {
        /// Underlying redb error.
        source: redb::CommitError,
    },

    /// Compaction failed.
    #[snafu(display("Compaction failed: {source}"))]
    Compaction {
        /// Underlying redb error.
        source: redb::CompactionError,
    },

    /// A stored value is shorter than its expiry header.
    #[snafu(display("Corrupt entry at key {key}: {reason}"))]
    CorruptEntry {
        /// Hex-encoded key.
        key: String,
        /// What was wrong.
        reason: String,
    },
}

impl StoreError {
    /// Error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Open { .. } => ErrorCode::StorageDatabaseOpen,
            Self::Transaction { .. } | Self::Commit { .. } => ErrorCode::StorageTransaction,
            Self::Table { .. } | Self::Storage { .. } => ErrorCode::StorageTableOperation,
            Self::Compaction { .. } => ErrorCode::StorageCompaction,
            Self::CorruptEntry { .. } => ErrorCode::StorageCorruption,
        }
    }
}
