//! Per-user vault display names.

use cowallet_store::{ReadableStore, WriteTxn};
use cowallet_types::{Remark, UserId, VaultAddress, VaultId};

use crate::{error::Result, keys::StateKeys, record};

/// Remark operations.
pub struct RemarkStore;

impl RemarkStore {
    /// Upserts `user`'s display name for `address`.
    pub fn save(
        txn: &mut WriteTxn,
        user: UserId,
        address: &VaultAddress,
        name: impl Into<String>,
    ) -> Result<Remark> {
        let remark = Remark {
            user_id: user,
            members: address.members().to_vec(),
            threshold: address.threshold(),
            name: name.into(),
            updated_at: txn.now(),
        };
        record::put(txn, &StateKeys::remark(user, address.vault_id())?, &remark)?;
        Ok(remark)
    }

    /// Returns the stored remark.
    pub fn get(store: &impl ReadableStore, user: UserId, vault_id: VaultId) -> Result<Option<Remark>> {
        record::get(store, &StateKeys::remark(user, vault_id)?)
    }

    /// The display name, empty when none was set.
    pub fn name(store: &impl ReadableStore, user: UserId, vault_id: VaultId) -> Result<String> {
        Ok(Self::get(store, user, vault_id)?.map(|remark| remark.name).unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use cowallet_store::StorageEngine;
    use cowallet_test_utils::fixtures::{at, user, vault};

    use super::*;

    #[test]
    fn test_remark_is_per_user() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let shared = vault(&[1, 2], 2);

        let mut txn = engine.begin_write().unwrap().as_of(at(10));
        let saved = RemarkStore::save(&mut txn, user(1), &shared, "savings").unwrap();
        txn.commit().unwrap();
        assert_eq!(saved.updated_at, at(10));

        let read = engine.begin_read().unwrap();
        assert_eq!(RemarkStore::name(&read, user(1), shared.vault_id()).unwrap(), "savings");
        assert_eq!(RemarkStore::name(&read, user(2), shared.vault_id()).unwrap(), "");
    }
}
