//! Ledger client errors.

use cowallet_types::ErrorCode;
use snafu::Snafu;

/// Result type for ledger operations.
pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

/// Errors reported by a [`LedgerClient`](crate::LedgerClient).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LedgerError {
    /// The ledger has no record of the requested object.
    #[snafu(display("{what} not found"))]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// The ledger could not be reached or did not answer in time.
    #[snafu(display("Ledger unavailable: {message}"))]
    Unavailable {
        /// Transport or server detail.
        message: String,
    },

    /// The ledger refused the request.
    #[snafu(display("Ledger rejected request: {message}"))]
    Rejected {
        /// Reason given by the ledger.
        message: String,
    },
}

impl LedgerError {
    /// Error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::LedgerNotFound,
            Self::Unavailable { .. } => ErrorCode::LedgerUnavailable,
            Self::Rejected { .. } => ErrorCode::LedgerRejected,
        }
    }

    /// Whether this is an absence rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}
