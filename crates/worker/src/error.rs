//! Worker error types.

use cowallet_ledger::LedgerError;
use cowallet_state::StateError;
use cowallet_store::StoreError;
use cowallet_types::{AddressError, ErrorCode, ErrorKind, KeyError};
use snafu::Snafu;

/// Result type for worker operations.
pub type Result<T, E = WorkerError> = std::result::Result<T, E>;

/// Errors raised by the background loops and the backend facade.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WorkerError {
    /// Transaction begin or commit failed.
    #[snafu(display("Store error: {source}"))]
    Store {
        /// Store error.
        source: StoreError,
    },

    /// A data access operation failed.
    #[snafu(display("State error: {source}"))]
    State {
        /// State error.
        source: StateError,
    },

    /// A ledger call failed.
    #[snafu(display("Ledger error during {operation}: {source}"))]
    Ledger {
        /// Ledger operation that failed.
        operation: &'static str,
        /// Ledger error.
        source: LedgerError,
    },

    /// A member set and threshold do not form a valid vault.
    #[snafu(display("Invalid vault address: {source}"))]
    InvalidAddress {
        /// Validation error.
        source: AddressError,
    },

    /// A relayed command payload could not be decoded.
    #[snafu(display("Invalid command payload: {source}"))]
    InvalidCommand {
        /// Decode error.
        source: KeyError,
    },

    /// A request argument is out of range.
    #[snafu(display("Invalid argument: {message}"))]
    InvalidArgument {
        /// What was wrong.
        message: String,
    },

    /// No unspent own output is left to fund an outbox submission.
    #[snafu(display("No unspent output to fund submissions from offset {offset}"))]
    FundingExhausted {
        /// Spend offset the search started at.
        offset: u64,
    },

    /// A store section offloaded to the blocking pool panicked or was
    /// cancelled.
    #[snafu(display("Blocking store task failed: {source}"))]
    BlockingTask {
        /// Join error.
        source: tokio::task::JoinError,
    },
}

impl WorkerError {
    /// Error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Store { source } => source.code(),
            Self::State { source } => source.code(),
            Self::Ledger { source, .. } => source.code(),
            Self::InvalidAddress { .. } => ErrorCode::AppInvalidAddress,
            Self::InvalidCommand { .. } => ErrorCode::AppInvalidCommand,
            Self::InvalidArgument { .. } => ErrorCode::AppInvalidArgument,
            Self::FundingExhausted { .. } => ErrorCode::AppFundingExhausted,
            Self::BlockingTask { .. } => ErrorCode::AppInternal,
        }
    }

    /// Reaction class for this error.
    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }
}
