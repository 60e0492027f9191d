//! Order-preserving binary key codec.
//!
//! Every index key in the store is a one-byte family prefix followed by a
//! tuple of typed values. The encoding keeps lexicographic byte order equal
//! to tuple order, so prefix and range scans over the raw bytes walk the
//! index in its intended order.
//!
//! ## Layout per value type
//!
//! | Type                    | Encoding                                          |
//! |-------------------------|---------------------------------------------------|
//! | `u8`/`u16`/`u32`/`u64`  | big-endian, fixed width                           |
//! | `i64`                   | big-endian with the sign bit flipped              |
//! | `bool`                  | one byte, `0` or `1`                              |
//! | `Uuid`, `UserId`, `AssetId` | 16 raw bytes                                  |
//! | `VaultId`               | 32 raw bytes                                      |
//! | `DateTime<Utc>`         | nanoseconds since the epoch, as `i64`             |
//! | `String`                | bytes with `0x00` escaped to `0x00 0xFF`, terminated by `0x00 0x01` |
//! | `Decimal`, `Vec<T>`     | payload-only encodings, not order-preserving      |
//!
//! Tuples of up to six values encode as the concatenation of their parts.
//!
//! Decoding is total: malformed bytes (wrong prefix, truncation, invalid
//! UTF-8, trailing data) return [`KeyError`]. Payloads decoded with this
//! codec may come from the ledger, so no input can cause a panic.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use snafu::{ResultExt, Snafu, ensure};
use uuid::Uuid;

use crate::ids::{AssetId, UserId, VAULT_ID_LENGTH, VaultId};

const STRING_ESCAPE: u8 = 0x00;
const STRING_ESCAPED_NUL: u8 = 0xFF;
const STRING_TERMINATOR: u8 = 0x01;

/// Maximum number of items accepted when decoding a length-prefixed list.
const MAX_LIST_ITEMS: usize = 1024;

/// Key encoding and decoding errors.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum KeyError {
    /// Key does not start with the expected family prefix.
    #[snafu(display("key prefix mismatch: expected {expected:02x?}"))]
    PrefixMismatch {
        /// Expected prefix bytes.
        expected: Vec<u8>,
    },

    /// Input ended before a value was complete.
    #[snafu(display("truncated key: {what} needs {needed} bytes, {remaining} remaining"))]
    Truncated {
        /// Value type being decoded.
        what: &'static str,
        /// Bytes needed.
        needed: usize,
        /// Bytes left in the input.
        remaining: usize,
    },

    /// Bytes remained after the last value was decoded.
    #[snafu(display("{count} trailing bytes after key"))]
    TrailingBytes {
        /// Number of unconsumed bytes.
        count: usize,
    },

    /// A string segment was not terminated or used an invalid escape.
    #[snafu(display("malformed string segment"))]
    MalformedString,

    /// A string segment was not valid UTF-8.
    #[snafu(display("string segment is not UTF-8: {source}"))]
    InvalidUtf8 {
        /// Underlying UTF-8 error.
        source: std::string::FromUtf8Error,
    },

    /// A value was syntactically complete but semantically invalid.
    #[snafu(display("invalid {what}: {message}"))]
    InvalidValue {
        /// Value type being decoded or encoded.
        what: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// A timestamp cannot be represented as `i64` nanoseconds.
    #[snafu(display("timestamp {timestamp} is outside the encodable range"))]
    TimestampOutOfRange {
        /// The offending timestamp.
        timestamp: DateTime<Utc>,
    },
}

/// A value that can be appended to or read from an ordered key.
pub trait KeyPart: Sized {
    /// Appends the encoded value to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if the value has no representation in the
    /// encoding (for example a timestamp beyond the year 2262).
    fn encode_part(&self, out: &mut Vec<u8>) -> Result<(), KeyError>;

    /// Reads one value from the front of `input`, advancing it.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if `input` does not start with a valid encoding.
    fn decode_part(input: &mut &[u8]) -> Result<Self, KeyError>;
}

/// Encodes `values` behind `prefix`.
///
/// # Errors
///
/// Returns [`KeyError`] if any value cannot be encoded.
pub fn encode_key<T: KeyPart>(prefix: &[u8], values: &T) -> Result<Vec<u8>, KeyError> {
    let mut out = Vec::with_capacity(prefix.len() + 32);
    out.extend_from_slice(prefix);
    values.encode_part(&mut out)?;
    Ok(out)
}

/// Decodes a key produced by [`encode_key`] with the same prefix and types.
///
/// The whole key must be consumed.
///
/// # Errors
///
/// Returns [`KeyError`] if the prefix differs, a value is malformed, or bytes
/// remain after the last value.
pub fn decode_key<T: KeyPart>(key: &[u8], prefix: &[u8]) -> Result<T, KeyError> {
    let mut input = key.strip_prefix(prefix).ok_or_else(|| KeyError::PrefixMismatch {
        expected: prefix.to_vec(),
    })?;
    let values = T::decode_part(&mut input)?;
    ensure!(input.is_empty(), TrailingBytesSnafu { count: input.len() });
    Ok(values)
}

/// Encodes a value with no prefix. Used for opaque payloads such as memos.
///
/// # Errors
///
/// Returns [`KeyError`] if any value cannot be encoded.
pub fn encode_values<T: KeyPart>(values: &T) -> Result<Vec<u8>, KeyError> {
    encode_key(&[], values)
}

/// Decodes a payload produced by [`encode_values`].
///
/// # Errors
///
/// Returns [`KeyError`] on malformed or trailing input.
pub fn decode_values<T: KeyPart>(bytes: &[u8]) -> Result<T, KeyError> {
    decode_key(bytes, &[])
}

fn take<'a>(input: &mut &'a [u8], needed: usize, what: &'static str) -> Result<&'a [u8], KeyError> {
    ensure!(input.len() >= needed, TruncatedSnafu { what, needed, remaining: input.len() });
    let (head, tail) = input.split_at(needed);
    *input = tail;
    Ok(head)
}

fn take_array<const N: usize>(input: &mut &[u8], what: &'static str) -> Result<[u8; N], KeyError> {
    let mut array = [0u8; N];
    array.copy_from_slice(take(input, N, what)?);
    Ok(array)
}

macro_rules! impl_unsigned {
    ($($ty:ty),*) => {
        $(
            impl KeyPart for $ty {
                fn encode_part(&self, out: &mut Vec<u8>) -> Result<(), KeyError> {
                    out.extend_from_slice(&self.to_be_bytes());
                    Ok(())
                }

                fn decode_part(input: &mut &[u8]) -> Result<Self, KeyError> {
                    Ok(<$ty>::from_be_bytes(take_array(input, stringify!($ty))?))
                }
            }
        )*
    };
}

impl_unsigned!(u8, u16, u32, u64);

impl KeyPart for i64 {
    fn encode_part(&self, out: &mut Vec<u8>) -> Result<(), KeyError> {
        let flipped = (*self as u64) ^ (1 << 63);
        out.extend_from_slice(&flipped.to_be_bytes());
        Ok(())
    }

    fn decode_part(input: &mut &[u8]) -> Result<Self, KeyError> {
        let raw = u64::from_be_bytes(take_array(input, "i64")?);
        Ok((raw ^ (1 << 63)) as i64)
    }
}

impl KeyPart for bool {
    fn encode_part(&self, out: &mut Vec<u8>) -> Result<(), KeyError> {
        out.push(u8::from(*self));
        Ok(())
    }

    fn decode_part(input: &mut &[u8]) -> Result<Self, KeyError> {
        match take(input, 1, "bool")?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => InvalidValueSnafu { what: "bool", message: format!("byte {other:#04x}") }.fail(),
        }
    }
}

impl KeyPart for Uuid {
    fn encode_part(&self, out: &mut Vec<u8>) -> Result<(), KeyError> {
        out.extend_from_slice(self.as_bytes());
        Ok(())
    }

    fn decode_part(input: &mut &[u8]) -> Result<Self, KeyError> {
        Ok(Uuid::from_bytes(take_array(input, "uuid")?))
    }
}

impl KeyPart for UserId {
    fn encode_part(&self, out: &mut Vec<u8>) -> Result<(), KeyError> {
        self.value().encode_part(out)
    }

    fn decode_part(input: &mut &[u8]) -> Result<Self, KeyError> {
        Uuid::decode_part(input).map(Self::new)
    }
}

impl KeyPart for AssetId {
    fn encode_part(&self, out: &mut Vec<u8>) -> Result<(), KeyError> {
        self.value().encode_part(out)
    }

    fn decode_part(input: &mut &[u8]) -> Result<Self, KeyError> {
        Uuid::decode_part(input).map(Self::new)
    }
}

impl KeyPart for VaultId {
    fn encode_part(&self, out: &mut Vec<u8>) -> Result<(), KeyError> {
        out.extend_from_slice(self.as_bytes());
        Ok(())
    }

    fn decode_part(input: &mut &[u8]) -> Result<Self, KeyError> {
        Ok(Self::new(take_array::<VAULT_ID_LENGTH>(input, "vault id")?))
    }
}

impl KeyPart for DateTime<Utc> {
    fn encode_part(&self, out: &mut Vec<u8>) -> Result<(), KeyError> {
        let nanos = self
            .timestamp_nanos_opt()
            .ok_or_else(|| KeyError::TimestampOutOfRange { timestamp: *self })?;
        nanos.encode_part(out)
    }

    fn decode_part(input: &mut &[u8]) -> Result<Self, KeyError> {
        i64::decode_part(input).map(DateTime::from_timestamp_nanos)
    }
}

impl KeyPart for String {
    fn encode_part(&self, out: &mut Vec<u8>) -> Result<(), KeyError> {
        for &byte in self.as_bytes() {
            out.push(byte);
            if byte == STRING_ESCAPE {
                out.push(STRING_ESCAPED_NUL);
            }
        }
        out.extend_from_slice(&[STRING_ESCAPE, STRING_TERMINATOR]);
        Ok(())
    }

    fn decode_part(input: &mut &[u8]) -> Result<Self, KeyError> {
        let mut bytes = Vec::new();
        let mut rest = *input;
        loop {
            let (&byte, tail) = rest.split_first().ok_or(KeyError::MalformedString)?;
            rest = tail;
            if byte != STRING_ESCAPE {
                bytes.push(byte);
                continue;
            }
            let (&marker, tail) = rest.split_first().ok_or(KeyError::MalformedString)?;
            rest = tail;
            match marker {
                STRING_ESCAPED_NUL => bytes.push(STRING_ESCAPE),
                STRING_TERMINATOR => break,
                _ => return Err(KeyError::MalformedString),
            }
        }
        *input = rest;
        String::from_utf8(bytes).context(InvalidUtf8Snafu)
    }
}

/// Decimals travel in command payloads only. The textual form round-trips
/// exactly but does not sort numerically.
impl KeyPart for Decimal {
    fn encode_part(&self, out: &mut Vec<u8>) -> Result<(), KeyError> {
        self.normalize().to_string().encode_part(out)
    }

    fn decode_part(input: &mut &[u8]) -> Result<Self, KeyError> {
        let text = String::decode_part(input)?;
        text.parse::<Decimal>()
            .map_err(|e| KeyError::InvalidValue { what: "decimal", message: e.to_string() })
    }
}

/// Length-prefixed list for payloads. Not order-preserving.
impl<T: KeyPart> KeyPart for Vec<T> {
    fn encode_part(&self, out: &mut Vec<u8>) -> Result<(), KeyError> {
        let len = u16::try_from(self.len()).map_err(|_| KeyError::InvalidValue {
            what: "list",
            message: format!("{} items exceeds u16", self.len()),
        })?;
        len.encode_part(out)?;
        self.iter().try_for_each(|item| item.encode_part(out))
    }

    fn decode_part(input: &mut &[u8]) -> Result<Self, KeyError> {
        let len = usize::from(u16::decode_part(input)?);
        ensure!(
            len <= MAX_LIST_ITEMS,
            InvalidValueSnafu { what: "list", message: format!("{len} items exceeds {MAX_LIST_ITEMS}") }
        );
        (0..len).map(|_| T::decode_part(input)).collect()
    }
}

macro_rules! impl_tuple {
    ($($name:ident),+) => {
        impl<$($name: KeyPart),+> KeyPart for ($($name,)+) {
            #[allow(non_snake_case)]
            fn encode_part(&self, out: &mut Vec<u8>) -> Result<(), KeyError> {
                let ($($name,)+) = self;
                $($name.encode_part(out)?;)+
                Ok(())
            }

            fn decode_part(input: &mut &[u8]) -> Result<Self, KeyError> {
                Ok(($($name::decode_part(input)?,)+))
            }
        }
    };
}

impl_tuple!(A);
impl_tuple!(A, B);
impl_tuple!(A, B, C);
impl_tuple!(A, B, C, D);
impl_tuple!(A, B, C, D, E);
impl_tuple!(A, B, C, D, E, F);
