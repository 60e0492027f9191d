//! Key builders for every key family.
//!
//! Primary keys hold the record; index keys carry the primary id as their
//! last component and store an empty value, so an index scan decodes the id
//! from the key and fetches the record from its primary family.

use chrono::{DateTime, Utc};
use cowallet_store::KeyFamily;
use cowallet_types::{AssetId, UserId, VaultId};
use snafu::ResultExt;
use uuid::Uuid;

use crate::error::{KeySnafu, Result};

/// Key pattern generators for stored entities.
pub struct StateKeys;

impl StateKeys {
    // ========================================================================
    // Vaults
    // ========================================================================

    /// Pattern: `v | vault_id`
    pub fn vault(vault_id: VaultId) -> Result<Vec<u8>> {
        KeyFamily::Vault.key(&(vault_id,)).context(KeySnafu)
    }

    /// Pattern: `m | user_id | vault_id`
    pub fn vault_member(user: UserId, vault_id: VaultId) -> Result<Vec<u8>> {
        KeyFamily::VaultMember.key(&(user, vault_id)).context(KeySnafu)
    }

    /// Prefix of every membership entry of `user`.
    pub fn vault_member_prefix(user: UserId) -> Result<Vec<u8>> {
        KeyFamily::VaultMember.key(&(user,)).context(KeySnafu)
    }

    /// Parses a membership key.
    pub fn parse_vault_member(key: &[u8]) -> Result<(UserId, VaultId)> {
        KeyFamily::VaultMember.decode(key).context(KeySnafu)
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    /// Pattern: `j | vault_id`
    pub fn job(vault_id: VaultId) -> Result<Vec<u8>> {
        KeyFamily::Job.key(&(vault_id,)).context(KeySnafu)
    }

    /// Parses a job key.
    pub fn parse_job(key: &[u8]) -> Result<VaultId> {
        KeyFamily::Job.decode::<(VaultId,)>(key).map(|(id,)| id).context(KeySnafu)
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Pattern: `s | snapshot_id`
    pub fn snapshot(id: Uuid) -> Result<Vec<u8>> {
        KeyFamily::Snapshot.key(&(id,)).context(KeySnafu)
    }

    /// Pattern: `t | vault_id | created_at | snapshot_id`
    pub fn snapshot_by_vault(vault_id: VaultId, at: DateTime<Utc>, id: Uuid) -> Result<Vec<u8>> {
        KeyFamily::SnapshotByVault.key(&(vault_id, at, id)).context(KeySnafu)
    }

    /// Pattern: `u | vault_id | asset_id | created_at | snapshot_id`
    pub fn snapshot_by_vault_asset(
        vault_id: VaultId,
        asset: AssetId,
        at: DateTime<Utc>,
        id: Uuid,
    ) -> Result<Vec<u8>> {
        KeyFamily::SnapshotByVaultAsset.key(&(vault_id, asset, at, id)).context(KeySnafu)
    }

    // ========================================================================
    // Renewals
    // ========================================================================

    /// Pattern: `r | renew_id`
    pub fn renew(id: Uuid) -> Result<Vec<u8>> {
        KeyFamily::Renew.key(&(id,)).context(KeySnafu)
    }

    /// Pattern: `w | vault_id | created_at | renew_id`
    pub fn renew_by_vault(vault_id: VaultId, at: DateTime<Utc>, id: Uuid) -> Result<Vec<u8>> {
        KeyFamily::RenewByVault.key(&(vault_id, at, id)).context(KeySnafu)
    }

    /// Prefix of every renewal index entry of `vault_id`.
    pub fn renew_by_vault_prefix(vault_id: VaultId) -> Result<Vec<u8>> {
        KeyFamily::RenewByVault.key(&(vault_id,)).context(KeySnafu)
    }

    /// Parses a renewal index key.
    pub fn parse_renew_by_vault(key: &[u8]) -> Result<(VaultId, DateTime<Utc>, Uuid)> {
        KeyFamily::RenewByVault.decode(key).context(KeySnafu)
    }

    // ========================================================================
    // Annotations
    // ========================================================================

    /// Pattern: `a | user_id | vault_id`
    pub fn address(user: UserId, vault_id: VaultId) -> Result<Vec<u8>> {
        KeyFamily::Address.key(&(user, vault_id)).context(KeySnafu)
    }

    /// Prefix of every address book entry of `user`.
    pub fn address_prefix(user: UserId) -> Result<Vec<u8>> {
        KeyFamily::Address.key(&(user,)).context(KeySnafu)
    }

    /// Pattern: `k | user_id | vault_id`
    pub fn remark(user: UserId, vault_id: VaultId) -> Result<Vec<u8>> {
        KeyFamily::Remark.key(&(user, vault_id)).context(KeySnafu)
    }

    // ========================================================================
    // Properties and outbox
    // ========================================================================

    /// Pattern: `p | name`
    pub fn property(name: &str) -> Result<Vec<u8>> {
        KeyFamily::Property.key(&(name.to_string(),)).context(KeySnafu)
    }

    /// Pattern: `l | seq`
    pub fn log(seq: u64) -> Result<Vec<u8>> {
        KeyFamily::Log.key(&(seq,)).context(KeySnafu)
    }

    /// Parses an outbox key.
    pub fn parse_log(key: &[u8]) -> Result<u64> {
        KeyFamily::Log.decode::<(u64,)>(key).map(|(seq,)| seq).context(KeySnafu)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use cowallet_test_utils::fixtures::{asset, at, user, vault};

    use super::*;

    #[test]
    fn test_membership_key_round_trip() {
        let vault_id = vault(&[1, 2], 2).vault_id();
        let key = StateKeys::vault_member(user(1), vault_id).unwrap();
        assert!(key.starts_with(&StateKeys::vault_member_prefix(user(1)).unwrap()));
        assert_eq!(StateKeys::parse_vault_member(&key).unwrap(), (user(1), vault_id));
    }

    #[test]
    fn test_snapshot_index_keys_order_by_time() {
        let vault_id = vault(&[1], 1).vault_id();
        let early = StateKeys::snapshot_by_vault(vault_id, at(0), Uuid::from_u128(9)).unwrap();
        let late = StateKeys::snapshot_by_vault(vault_id, at(1), Uuid::from_u128(1)).unwrap();
        assert!(early < late);

        let a = StateKeys::snapshot_by_vault_asset(vault_id, asset(1), at(5), Uuid::nil()).unwrap();
        let b = StateKeys::snapshot_by_vault_asset(vault_id, asset(2), at(0), Uuid::nil()).unwrap();
        assert!(a < b, "asset groups before time");
    }

    #[test]
    fn test_log_keys_order_by_sequence() {
        let two = StateKeys::log(2).unwrap();
        let ten = StateKeys::log(10).unwrap();
        assert!(two < ten);
        assert_eq!(StateKeys::parse_log(&ten).unwrap(), 10);
    }

    #[test]
    fn test_parse_rejects_foreign_family() {
        let key = StateKeys::log(1).unwrap();
        assert!(StateKeys::parse_job(&key).is_err());
    }
}
