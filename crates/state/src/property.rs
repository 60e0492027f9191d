//! Named scalar properties.
//!
//! Properties hold the service's own cursors and counters as 8-byte
//! big-endian integers. A missing property reads as zero.

use cowallet_store::{ReadableStore, WriteTxn};
use snafu::{ResultExt, ensure};

use crate::{
    error::{CorruptPropertySnafu, Result, StoreSnafu},
    keys::StateKeys,
};

/// Next unread position in the service vault's own output stream.
pub const OUTPUT_OFFSET: &str = "output_offset";
/// Position past the last own output spent to fund an outbox submission.
pub const SPEND_OFFSET: &str = "spend_offset";
/// Last outbox sequence handed out.
pub const LOG_SEQUENCE: &str = "log_sequence";

/// Property storage operations.
pub struct PropertyStore;

impl PropertyStore {
    /// Reads a property, zero when absent.
    pub fn get_u64(store: &impl ReadableStore, name: &str) -> Result<u64> {
        let Some(bytes) = store.get(&StateKeys::property(name)?).context(StoreSnafu)? else {
            return Ok(0);
        };
        ensure!(bytes.len() == 8, CorruptPropertySnafu { name, len: bytes.len() });
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes);
        Ok(u64::from_be_bytes(buf))
    }

    /// Writes a property.
    pub fn set_u64(txn: &mut WriteTxn, name: &str, value: u64) -> Result<()> {
        txn.set(&StateKeys::property(name)?, &value.to_be_bytes()).context(StoreSnafu)
    }

    /// Increments a counter property and returns the new value.
    pub fn next_sequence(txn: &mut WriteTxn, name: &str) -> Result<u64> {
        let next = Self::get_u64(&*txn, name)?.saturating_add(1);
        Self::set_u64(txn, name, next)?;
        Ok(next)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use cowallet_store::StorageEngine;

    use super::*;
    use crate::error::StateError;

    #[test]
    fn test_missing_property_is_zero() {
        let engine = StorageEngine::open_in_memory().unwrap();
        assert_eq!(PropertyStore::get_u64(&engine.begin_read().unwrap(), OUTPUT_OFFSET).unwrap(), 0);
    }

    #[test]
    fn test_sequence_counts_up() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let mut txn = engine.begin_write().unwrap();
        assert_eq!(PropertyStore::next_sequence(&mut txn, LOG_SEQUENCE).unwrap(), 1);
        assert_eq!(PropertyStore::next_sequence(&mut txn, LOG_SEQUENCE).unwrap(), 2);
        PropertyStore::set_u64(&mut txn, SPEND_OFFSET, 77).unwrap();
        txn.commit().unwrap();

        let read = engine.begin_read().unwrap();
        assert_eq!(PropertyStore::get_u64(&read, LOG_SEQUENCE).unwrap(), 2);
        assert_eq!(PropertyStore::get_u64(&read, SPEND_OFFSET).unwrap(), 77);
    }

    #[test]
    fn test_wrong_width_is_corrupt() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let mut txn = engine.begin_write().unwrap();
        txn.set(&StateKeys::property(OUTPUT_OFFSET).unwrap(), b"abc").unwrap();
        let err = PropertyStore::get_u64(&txn, OUTPUT_OFFSET).unwrap_err();
        assert!(matches!(err, StateError::CorruptProperty { len: 3, .. }));
    }
}
