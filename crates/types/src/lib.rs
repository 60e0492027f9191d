//! Core types for the cowallet backend.
//!
//! This crate provides the foundational types used throughout the workspace:
//! - Identifiers (`UserId`, `AssetId`, `VaultId`) and vault addresses
//! - Stored entity records with a versioned JSON envelope
//! - The order-preserving key codec used by every index
//! - Relayed system commands
//! - The error code catalogue and configuration types

#![deny(unsafe_code)]

pub mod address;
pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod ids;
pub mod key;
pub mod records;

// Re-export commonly used types at crate root
pub use address::{AddressError, VaultAddress};
pub use codec::{CodecError, Record, decode_record, encode_record};
pub use command::SystemCommand;
pub use error::{ErrorCode, ErrorKind};
pub use ids::{AssetId, UserId, VaultId};
pub use key::{KeyError, KeyPart, decode_key, decode_values, encode_key, encode_values};
pub use records::{Address, Asset, Job, Log, Remark, Renew, Snapshot, Vault};

impl KeyError {
    /// Error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::TimestampOutOfRange { .. } => ErrorCode::StorageKeyEncoding,
            _ => ErrorCode::StorageKeyDecoding,
        }
    }
}

impl CodecError {
    /// Error code for this error.
    pub fn code(&self) -> ErrorCode {
        ErrorCode::StorageSerialization
    }
}

impl AddressError {
    /// Error code for this error.
    pub fn code(&self) -> ErrorCode {
        ErrorCode::AppInvalidAddress
    }
}
