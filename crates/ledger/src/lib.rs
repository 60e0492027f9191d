//! Boundary to the external ledger.
//!
//! The backend never talks to the ledger directly. Every read and write goes
//! through [`LedgerClient`], so the sync engine and the outbox can run
//! against the real network client in production and against
//! [`MockLedger`] in tests.

#![deny(unsafe_code)]

mod client;
mod error;
mod mock;
mod types;

pub use client::LedgerClient;
pub use error::{LedgerError, Result};
pub use mock::MockLedger;
pub use types::{
    Output, OutputQuery, OutputState, SignedTransaction, SpendingRequest, TransactionDraft,
    TransactionRecord,
};
