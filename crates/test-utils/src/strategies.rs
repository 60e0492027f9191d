//! Proptest strategies for cowallet domain types.
//!
//! Strategies produce well-formed domain values while exploring edge cases
//! through random variation.
//!
//! # Usage
//!
//! ```no_run
//! use cowallet_test_utils::strategies;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn my_property(address in strategies::arb_vault_address()) {
//!         prop_assert!(address.threshold() >= 1);
//!     }
//! }
//! ```

use chrono::{DateTime, Utc};
use cowallet_types::{AssetId, UserId, VaultAddress};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Generates a user from a small id space so member sets overlap.
pub fn arb_user_id() -> impl Strategy<Value = UserId> {
    (1u128..64).prop_map(|n| UserId::new(Uuid::from_u128(n)))
}

/// Generates one of four assets.
pub fn arb_asset_id() -> impl Strategy<Value = AssetId> {
    (1u128..=4).prop_map(|n| AssetId::new(Uuid::from_u128(0xa55e_7000_0000 + n)))
}

/// Generates a valid vault address with 1-5 members and a fitting threshold.
pub fn arb_vault_address() -> impl Strategy<Value = VaultAddress> {
    proptest::collection::btree_set(arb_user_id(), 1..=5).prop_flat_map(|members| {
        let count = members.len() as u8;
        (Just(members), 1..=count).prop_map(|(members, threshold)| {
            VaultAddress::new(members, threshold)
                .unwrap_or_else(|_| VaultAddress::single(UserId::new(Uuid::from_u128(1))))
        })
    })
}

/// Generates a positive amount with up to eight decimal places.
pub fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..=1_000_000_000_000).prop_map(|units| Decimal::new(units, 8))
}

/// Generates a timestamp between 2020 and 2030 with nanosecond precision.
pub fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (1_577_836_800i64..1_893_456_000, 0u32..1_000_000_000).prop_map(|(secs, nanos)| {
        DateTime::from_timestamp(secs, nanos).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    })
}
