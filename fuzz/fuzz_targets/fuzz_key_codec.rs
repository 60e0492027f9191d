//! Fuzz target for the order-preserving key codec.
//!
//! Decoding arbitrary bytes as any key layout must return an error rather
//! than panic, and every successful decode must survive a re-encode.

#![no_main]

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use cowallet_types::{AssetId, KeyPart, UserId, VaultAddress, VaultId, decode_values, encode_values};
use libfuzzer_sys::fuzz_target;
use uuid::Uuid;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };

    match selector % 6 {
        0 => round_trip::<(u64,)>(payload),
        1 => round_trip::<(String, i64)>(payload),
        2 => round_trip::<(VaultId, DateTime<Utc>, Uuid)>(payload),
        3 => round_trip::<(VaultId, AssetId, DateTime<Utc>, Uuid)>(payload),
        4 => round_trip::<(UserId, VaultId)>(payload),
        _ => round_trip::<(VaultAddress, bool)>(payload),
    }
});

fn round_trip<T: KeyPart + PartialEq + Debug>(payload: &[u8]) {
    if let Ok(values) = decode_values::<T>(payload) {
        let encoded = encode_values(&values).expect("decoded values re-encode");
        let again = decode_values::<T>(&encoded).expect("re-encoded values decode");
        assert_eq!(again, values, "key round trip mismatch");
    }
}
