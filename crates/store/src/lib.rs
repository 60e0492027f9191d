//! Indexed store for the cowallet backend.
//!
//! This crate provides:
//! - A redb-backed transactional ordered key-value store
//! - Single-byte key families, each independently range-scannable
//! - Forward and reverse prefix scans with seek and limit
//! - Per-entry expiry enforced on read, with explicit reclamation

#![deny(unsafe_code)]

mod engine;
mod error;
mod tables;
mod txn;

pub use engine::StorageEngine;
pub use error::{Result, StoreError};
pub use tables::{KeyFamily, Tables};
pub use txn::{Entry, ReadTxn, ReadableStore, Scan, WriteTxn, prefix_end};
