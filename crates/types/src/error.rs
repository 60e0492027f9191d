//! Error code catalogue shared by every crate.
//!
//! Each crate defines its own snafu error enum and maps each variant to an
//! [`ErrorCode`]. The code carries a numeric identifier, an [`ErrorKind`]
//! used by the background loops to decide what to do next, and a suggested
//! recovery action for operators.

use core::fmt;

/// How callers should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The thing asked for does not exist. Often a valid initial state.
    NotFound,
    /// Collaborator or storage hiccup; the pass is retried on the next tick.
    Transient,
    /// Malformed member set, threshold, key, or payload; rejected outright.
    InvalidInput,
    /// A required resource ran out (no funding output for the outbox).
    Exhausted,
    /// Invariant violation or encoding bug.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not_found",
            Self::Transient => "transient",
            Self::InvalidInput => "invalid_input",
            Self::Exhausted => "exhausted",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Machine-readable error codes.
///
/// | Range       | Domain      | Examples                                    |
/// |-------------|-------------|---------------------------------------------|
/// | 1000–1099   | Storage     | Database open, transaction, table ops       |
/// | 1100–1199   | Storage     | Corruption, key and record encoding         |
/// | 2000–2099   | Ledger      | Unavailable, rejected, not found            |
/// | 3000–3099   | Application | Invalid address, command, argument          |
/// | 3100–3199   | Application | Funding exhausted, config, internal         |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // --- Storage errors (1000–1199) ---
    /// Database file could not be opened.
    StorageDatabaseOpen = 1000,
    /// Transaction begin or commit failed.
    StorageTransaction = 1001,
    /// Table operation failed.
    StorageTableOperation = 1002,
    /// Compaction could not run.
    StorageCompaction = 1003,
    /// Stored bytes are structurally invalid.
    StorageCorruption = 1100,
    /// A key could not be encoded.
    StorageKeyEncoding = 1101,
    /// A stored key could not be decoded.
    StorageKeyDecoding = 1102,
    /// A record could not be serialized or deserialized.
    StorageSerialization = 1103,

    // --- Ledger errors (2000–2099) ---
    /// Ledger could not be reached or timed out.
    LedgerUnavailable = 2000,
    /// Ledger rejected the request.
    LedgerRejected = 2001,
    /// Ledger has no record of the requested object.
    LedgerNotFound = 2002,

    // --- Application errors (3000–3199) ---
    /// Member set or threshold is invalid.
    AppInvalidAddress = 3000,
    /// Relayed command payload is malformed or unknown.
    AppInvalidCommand = 3001,
    /// Request argument is invalid.
    AppInvalidArgument = 3002,
    /// No unspent output available to fund an outbox submission.
    AppFundingExhausted = 3100,
    /// Configuration error.
    AppConfig = 3101,
    /// Internal error (unexpected state, invariant violation).
    AppInternal = 3102,
}

impl ErrorCode {
    /// Returns the numeric code value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Converts a numeric code to an `ErrorCode`, returning `None` for unknown values.
    #[must_use]
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1000 => Some(Self::StorageDatabaseOpen),
            1001 => Some(Self::StorageTransaction),
            1002 => Some(Self::StorageTableOperation),
            1003 => Some(Self::StorageCompaction),
            1100 => Some(Self::StorageCorruption),
            1101 => Some(Self::StorageKeyEncoding),
            1102 => Some(Self::StorageKeyDecoding),
            1103 => Some(Self::StorageSerialization),
            2000 => Some(Self::LedgerUnavailable),
            2001 => Some(Self::LedgerRejected),
            2002 => Some(Self::LedgerNotFound),
            3000 => Some(Self::AppInvalidAddress),
            3001 => Some(Self::AppInvalidCommand),
            3002 => Some(Self::AppInvalidArgument),
            3100 => Some(Self::AppFundingExhausted),
            3101 => Some(Self::AppConfig),
            3102 => Some(Self::AppInternal),
            _ => None,
        }
    }

    /// Reaction class for this code.
    #[must_use]
    pub const fn kind(self) -> ErrorKind {
        match self {
            Self::StorageTransaction
            | Self::StorageTableOperation
            | Self::StorageCompaction
            | Self::LedgerUnavailable => ErrorKind::Transient,
            Self::LedgerNotFound => ErrorKind::NotFound,
            Self::StorageKeyDecoding
            | Self::LedgerRejected
            | Self::AppInvalidAddress
            | Self::AppInvalidCommand
            | Self::AppInvalidArgument => ErrorKind::InvalidInput,
            Self::AppFundingExhausted => ErrorKind::Exhausted,
            Self::StorageDatabaseOpen
            | Self::StorageCorruption
            | Self::StorageKeyEncoding
            | Self::StorageSerialization
            | Self::AppConfig
            | Self::AppInternal => ErrorKind::Internal,
        }
    }

    /// Whether this error is retryable.
    ///
    /// Retryable errors may succeed on a later tick without operator action.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }

    /// Suggested recovery action for this error code.
    #[must_use]
    pub const fn suggested_action(self) -> &'static str {
        match self {
            Self::StorageDatabaseOpen => {
                "Verify the database path exists with correct permissions and is not opened by another process."
            },
            Self::StorageTransaction => {
                "Retried on the next tick. Persistent failures indicate disk pressure or a stuck writer."
            },
            Self::StorageTableOperation => "Retried on the next tick. Check disk health if it persists.",
            Self::StorageCompaction => {
                "Compaction is best-effort and retried on its next interval. No action needed unless the file keeps growing."
            },
            Self::StorageCorruption => {
                "Restore the database from backup. Report the corrupted key for analysis."
            },
            Self::StorageKeyEncoding => {
                "A value has no key representation (for example a timestamp beyond 2262). Report as an issue."
            },
            Self::StorageKeyDecoding => {
                "A key or payload did not match its expected layout. Inspect the offending entry."
            },
            Self::StorageSerialization => {
                "Record schema mismatch. Check for a downgrade across a schema version bump."
            },
            Self::LedgerUnavailable => {
                "Retried on the next tick with backoff. Check connectivity to the ledger."
            },
            Self::LedgerRejected => "Inspect the rejected request. Retrying unchanged will not help.",
            Self::LedgerNotFound => "Expected for first lookups. Treat as absence.",
            Self::AppInvalidAddress => "Fix the member set or threshold and resubmit.",
            Self::AppInvalidCommand => {
                "The relayed memo was not a valid command. It is skipped and the cursor advances."
            },
            Self::AppInvalidArgument => "Fix the request parameters and resubmit.",
            Self::AppFundingExhausted => {
                "Top up the service vault with spendable outputs. The outbox resumes on the next tick."
            },
            Self::AppConfig => "Fix the configuration value and restart the service.",
            Self::AppInternal => {
                "Unexpected state or invariant violation. Collect context and report as an issue."
            },
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    const ALL: &[ErrorCode] = &[
        ErrorCode::StorageDatabaseOpen,
        ErrorCode::StorageTransaction,
        ErrorCode::StorageTableOperation,
        ErrorCode::StorageCompaction,
        ErrorCode::StorageCorruption,
        ErrorCode::StorageKeyEncoding,
        ErrorCode::StorageKeyDecoding,
        ErrorCode::StorageSerialization,
        ErrorCode::LedgerUnavailable,
        ErrorCode::LedgerRejected,
        ErrorCode::LedgerNotFound,
        ErrorCode::AppInvalidAddress,
        ErrorCode::AppInvalidCommand,
        ErrorCode::AppInvalidArgument,
        ErrorCode::AppFundingExhausted,
        ErrorCode::AppConfig,
        ErrorCode::AppInternal,
    ];

    #[test]
    fn test_codes_round_trip_through_u16() {
        for code in ALL {
            assert_eq!(ErrorCode::from_u16(code.as_u16()), Some(*code));
            assert!(!code.suggested_action().is_empty());
        }
        assert_eq!(ErrorCode::from_u16(9999), None);
    }

    #[test]
    fn test_exhaustion_is_distinct_from_transient() {
        assert_eq!(ErrorCode::AppFundingExhausted.kind(), ErrorKind::Exhausted);
        assert!(!ErrorCode::AppFundingExhausted.is_retryable());
        assert!(ErrorCode::LedgerUnavailable.is_retryable());
    }

    #[test]
    fn test_display_is_numeric() {
        assert_eq!(ErrorCode::LedgerNotFound.to_string(), "2002");
        assert_eq!(ErrorKind::InvalidInput.to_string(), "invalid_input");
    }
}
