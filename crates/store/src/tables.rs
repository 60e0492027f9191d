//! Table definition and key families.
//!
//! Every entity lives in one ordered table. Keys start with a single-byte
//! family prefix, so each family is independently range-scannable and the
//! families never interleave.
//!
//! | Family                 | Prefix | Key layout after the prefix                         |
//! |------------------------|--------|-----------------------------------------------------|
//! | `Vault`                | `v`    | `vault_id`                                          |
//! | `VaultMember`          | `m`    | `user_id, vault_id`                                 |
//! | `Job`                  | `j`    | `vault_id` (TTL)                                    |
//! | `Snapshot`             | `s`    | `snapshot_id`                                       |
//! | `SnapshotByVault`      | `t`    | `vault_id, created_at, snapshot_id`                 |
//! | `SnapshotByVaultAsset` | `u`    | `vault_id, asset_id, created_at, snapshot_id`       |
//! | `Renew`                | `r`    | `renew_id`                                          |
//! | `RenewByVault`         | `w`    | `vault_id, created_at, renew_id`                    |
//! | `Address`              | `a`    | `user_id, vault_id`                                 |
//! | `Remark`               | `k`    | `user_id, vault_id`                                 |
//! | `Property`             | `p`    | `name`                                              |
//! | `Log`                  | `l`    | `seq`                                               |

use cowallet_types::{KeyError, KeyPart, decode_key, encode_key};
use redb::TableDefinition;

/// Table definitions for the store.
pub struct Tables;

impl Tables {
    /// All entries: family-prefixed key → `[expires_at:8BE][payload]`.
    pub const ENTRIES: TableDefinition<'static, &'static [u8], &'static [u8]> =
        TableDefinition::new("entries");
}

/// Single-byte key family prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyFamily {
    /// Canonical vault records.
    Vault = b'v',
    /// Membership index: user → vaults.
    VaultMember = b'm',
    /// Pending sync jobs.
    Job = b'j',
    /// Snapshot primary records.
    Snapshot = b's',
    /// Snapshots by vault and time.
    SnapshotByVault = b't',
    /// Snapshots by vault, asset, and time.
    SnapshotByVaultAsset = b'u',
    /// Renewal primary records.
    Renew = b'r',
    /// Renewals by vault and time.
    RenewByVault = b'w',
    /// Address book entries.
    Address = b'a',
    /// Vault display names.
    Remark = b'k',
    /// Named scalar properties (cursors, sequences).
    Property = b'p',
    /// Outbox entries.
    Log = b'l',
}

impl KeyFamily {
    /// Every family, in prefix order.
    pub const ALL: [KeyFamily; 12] = [
        Self::Address,
        Self::Job,
        Self::Remark,
        Self::Log,
        Self::VaultMember,
        Self::Property,
        Self::Renew,
        Self::Snapshot,
        Self::SnapshotByVault,
        Self::SnapshotByVaultAsset,
        Self::Vault,
        Self::RenewByVault,
    ];

    /// The family's key prefix.
    #[inline]
    pub const fn prefix(self) -> [u8; 1] {
        [self as u8]
    }

    /// Whether entries of this family are written with a TTL.
    pub const fn expires(self) -> bool {
        matches!(self, Self::Job)
    }

    /// Encodes `values` under this family.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if a value cannot be encoded.
    pub fn key<T: KeyPart>(self, values: &T) -> Result<Vec<u8>, KeyError> {
        encode_key(&self.prefix(), values)
    }

    /// Decodes a key of this family.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if the key belongs to another family or is malformed.
    pub fn decode<T: KeyPart>(self, key: &[u8]) -> Result<T, KeyError> {
        decode_key(key, &self.prefix())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_prefixes_are_unique_and_sorted() {
        let prefixes: Vec<u8> = KeyFamily::ALL.iter().map(|f| f.prefix()[0]).collect();
        let unique: HashSet<u8> = prefixes.iter().copied().collect();
        assert_eq!(unique.len(), KeyFamily::ALL.len());
        assert!(prefixes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_family_key_round_trip() {
        let key = KeyFamily::Log.key(&(42u64,)).unwrap();
        assert_eq!(key[0], b'l');
        let (seq,): (u64,) = KeyFamily::Log.decode(&key).unwrap();
        assert_eq!(seq, 42);
        assert!(KeyFamily::Vault.decode::<(u64,)>(&key).is_err());
    }

    #[test]
    fn test_only_jobs_expire() {
        let expiring: Vec<_> = KeyFamily::ALL.iter().filter(|f| f.expires()).collect();
        assert_eq!(expiring, vec![&KeyFamily::Job]);
    }
}
