//! Deterministic domain values for tests.

// Fixtures are built from constants known to be valid.
#![allow(clippy::expect_used)]

use chrono::{DateTime, TimeZone, Utc};
use cowallet_types::{AssetId, UserId, VaultAddress};
use rust_decimal::Decimal;
use uuid::Uuid;

/// User `n`, a UUID whose value is `n`.
#[must_use]
pub fn user(n: u128) -> UserId {
    UserId::new(Uuid::from_u128(n))
}

/// Asset `n`, a UUID whose value is `0xa55e_7000_0000 + n`.
#[must_use]
pub fn asset(n: u128) -> AssetId {
    AssetId::new(Uuid::from_u128(0xa55e_7000_0000 + n))
}

/// Address of a vault owned by users `members` with the given threshold.
///
/// # Panics
///
/// Panics if the member set or threshold is invalid.
#[must_use]
pub fn vault(members: &[u128], threshold: u8) -> VaultAddress {
    VaultAddress::new(members.iter().copied().map(user), threshold).expect("valid fixture vault")
}

/// Parses a decimal literal.
///
/// # Panics
///
/// Panics if `value` is not a decimal.
#[must_use]
pub fn amount(value: &str) -> Decimal {
    value.parse().expect("valid fixture amount")
}

/// A fixed point in time: 2024-01-01T00:00:00Z plus `seconds`.
///
/// # Panics
///
/// Panics if the result is out of range.
#[must_use]
pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid base time")
        + chrono::TimeDelta::seconds(seconds)
}
