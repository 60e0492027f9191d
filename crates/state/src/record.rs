//! Typed record reads and writes over raw store entries.

use cowallet_store::{Entry, ReadableStore, WriteTxn};
use cowallet_types::{Record, decode_record, encode_record};
use snafu::ResultExt;

use crate::error::{CodecSnafu, Result, StoreSnafu};

pub(crate) fn get<T: Record>(store: &impl ReadableStore, key: &[u8]) -> Result<Option<T>> {
    match store.get(key).context(StoreSnafu)? {
        Some(bytes) => decode_record(&bytes).map(Some).context(CodecSnafu),
        None => Ok(None),
    }
}

pub(crate) fn put<T: Record>(txn: &mut WriteTxn, key: &[u8], record: &T) -> Result<()> {
    let bytes = encode_record(record).context(CodecSnafu)?;
    txn.set(key, &bytes).context(StoreSnafu)
}

pub(crate) fn decode<T: Record>(entry: &Entry) -> Result<T> {
    decode_record(&entry.value).context(CodecSnafu)
}
