//! State layer error types.

use cowallet_store::StoreError;
use cowallet_types::{AddressError, CodecError, ErrorCode, KeyError};
use snafu::Snafu;

/// Result type for state operations.
pub type Result<T, E = StateError> = std::result::Result<T, E>;

/// Errors raised by the data access layer.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StateError {
    /// Underlying store failure.
    #[snafu(display("Store error: {source}"))]
    Store {
        /// Store error.
        source: StoreError,
    },

    /// A key could not be built or parsed.
    #[snafu(display("Key error: {source}"))]
    Key {
        /// Key codec error.
        source: KeyError,
    },

    /// A record could not be serialized or deserialized.
    #[snafu(display("Record error: {source}"))]
    Codec {
        /// Record codec error.
        source: CodecError,
    },

    /// A stored member set and threshold do not form a valid address.
    #[snafu(display("Invalid stored address: {source}"))]
    Address {
        /// Address validation error.
        source: AddressError,
    },

    /// A stored property is not an 8-byte big-endian integer.
    #[snafu(display("Property {name} has {len} bytes, expected 8"))]
    CorruptProperty {
        /// Property name.
        name: String,
        /// Stored length.
        len: usize,
    },

    /// An index entry points at a missing primary record.
    #[snafu(display("Dangling {index} entry for {id}"))]
    DanglingIndex {
        /// Index family name.
        index: &'static str,
        /// Identifier the entry points at.
        id: String,
    },
}

impl StateError {
    /// Error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Store { source } => source.code(),
            Self::Key { source } => source.code(),
            Self::Codec { source } => source.code(),
            Self::Address { .. } | Self::CorruptProperty { .. } | Self::DanglingIndex { .. } => {
                ErrorCode::StorageCorruption
            },
        }
    }
}
