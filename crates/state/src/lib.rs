//! Data access for the cowallet backend.
//!
//! This crate sits on the indexed store (`cowallet-store`) and gives every
//! key family a typed interface:
//!
//! - Vault records and the user → vault membership index
//! - Snapshots with by-vault and by-vault-asset time indexes
//! - Renewals and the vault expiry they determine
//! - The TTL-bounded sync job queue
//! - Outbox logs and the properties holding service cursors
//! - Address book entries and remarks
//!
//! Every operation takes either a read view ([`ReadableStore`]) or a live
//! [`WriteTxn`]; callers decide the transaction boundaries.
//!
//! [`ReadableStore`]: cowallet_store::ReadableStore
//! [`WriteTxn`]: cowallet_store::WriteTxn

#![deny(unsafe_code)]

mod address;
mod error;
mod job;
mod keys;
mod log;
pub mod property;
mod record;
mod remark;
mod renew;
mod snapshot;
mod vault;

pub use address::AddressStore;
pub use error::{Result, StateError};
pub use job::JobStore;
pub use keys::StateKeys;
pub use log::LogStore;
pub use property::PropertyStore;
pub use remark::RemarkStore;
pub use renew::RenewStore;
pub use snapshot::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT, SnapshotQuery, SnapshotStore};
pub use vault::VaultStore;
