//! Versioned record serialization.
//!
//! Every stored entity is JSON with an extra `"v"` member holding the record
//! type's schema version:
//!
//! ```json
//! {"v":1,"members":["..."],"threshold":2,"offset":17,...}
//! ```
//!
//! Compatibility rules:
//! - Decoding accepts any stored version up to the type's current
//!   [`Record::VERSION`]; newer versions are rejected rather than silently
//!   truncated.
//! - Unknown members are ignored, so a field removed in a later version does
//!   not break older readers.
//! - A field added in a later version must carry `#[serde(default)]` so
//!   records written before it existed still decode.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use snafu::{ResultExt, Snafu, ensure};

/// Name of the envelope member carrying the schema version.
pub const VERSION_FIELD: &str = "v";

/// A JSON record stored under one key family.
pub trait Record: Serialize + DeserializeOwned {
    /// Human-readable record type name, used in errors and logs.
    const KIND: &'static str;

    /// Current schema version written by [`encode_record`].
    const VERSION: u16 = 1;
}

/// Error type for record codec operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CodecError {
    /// Encoding failed.
    #[snafu(display("Encoding {kind} failed: {source}"))]
    Encode {
        /// Record type name.
        kind: &'static str,
        /// The underlying serde_json error.
        source: serde_json::Error,
    },

    /// Decoding failed.
    #[snafu(display("Decoding {kind} failed: {source}"))]
    Decode {
        /// Record type name.
        kind: &'static str,
        /// The underlying serde_json error.
        source: serde_json::Error,
    },

    /// The stored bytes are not a versioned JSON object.
    #[snafu(display("{kind} record has no version envelope"))]
    MissingEnvelope {
        /// Record type name.
        kind: &'static str,
    },

    /// The stored record was written by a newer schema.
    #[snafu(display("{kind} record version {found} is newer than supported {supported}"))]
    UnsupportedVersion {
        /// Record type name.
        kind: &'static str,
        /// Version found in storage.
        found: u64,
        /// Highest version this build understands.
        supported: u16,
    },
}

/// Encodes a record with its version envelope.
///
/// # Errors
///
/// Returns `CodecError::Encode` if serialization fails, or
/// `CodecError::MissingEnvelope` if the record does not serialize to an object.
pub fn encode_record<T: Record>(record: &T) -> Result<Vec<u8>, CodecError> {
    let value = serde_json::to_value(record).context(EncodeSnafu { kind: T::KIND })?;
    let Value::Object(fields) = value else {
        return MissingEnvelopeSnafu { kind: T::KIND }.fail();
    };

    let mut envelope = Map::with_capacity(fields.len() + 1);
    envelope.insert(VERSION_FIELD.to_string(), Value::from(T::VERSION));
    envelope.extend(fields);
    serde_json::to_vec(&Value::Object(envelope)).context(EncodeSnafu { kind: T::KIND })
}

/// Decodes a record, checking its version envelope.
///
/// # Errors
///
/// Returns `CodecError::Decode` for invalid JSON or mismatched fields,
/// `CodecError::MissingEnvelope` if the version member is absent, and
/// `CodecError::UnsupportedVersion` for records newer than this build.
pub fn decode_record<T: Record>(bytes: &[u8]) -> Result<T, CodecError> {
    let mut value: Value = serde_json::from_slice(bytes).context(DecodeSnafu { kind: T::KIND })?;
    let found = value
        .as_object_mut()
        .and_then(|fields| fields.remove(VERSION_FIELD))
        .and_then(|version| version.as_u64())
        .ok_or(CodecError::MissingEnvelope { kind: T::KIND })?;
    ensure!(
        found <= u64::from(T::VERSION),
        UnsupportedVersionSnafu { kind: T::KIND, found, supported: T::VERSION }
    );
    serde_json::from_value(value).context(DecodeSnafu { kind: T::KIND })
}
