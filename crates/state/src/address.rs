//! Per-user address book entries.

use cowallet_store::{ReadableStore, Scan, WriteTxn};
use cowallet_types::{Address, UserId, VaultAddress, VaultId};
use snafu::ResultExt;

use crate::{
    error::{Result, StoreSnafu},
    keys::StateKeys,
    record,
};

/// Address book operations.
pub struct AddressStore;

impl AddressStore {
    /// Upserts `user`'s label for `address`.
    pub fn save(
        txn: &mut WriteTxn,
        user: UserId,
        address: &VaultAddress,
        label: impl Into<String>,
    ) -> Result<Address> {
        let entry = Address {
            user_id: user,
            members: address.members().to_vec(),
            threshold: address.threshold(),
            label: label.into(),
            updated_at: txn.now(),
        };
        record::put(txn, &StateKeys::address(user, address.vault_id())?, &entry)?;
        Ok(entry)
    }

    /// Removes an entry. Returns whether it existed.
    pub fn delete(txn: &mut WriteTxn, user: UserId, vault_id: VaultId) -> Result<bool> {
        txn.delete(&StateKeys::address(user, vault_id)?).context(StoreSnafu)
    }

    /// Returns one entry.
    pub fn get(store: &impl ReadableStore, user: UserId, vault_id: VaultId) -> Result<Option<Address>> {
        record::get(store, &StateKeys::address(user, vault_id)?)
    }

    /// Lists `user`'s address book, ordered by vault id.
    pub fn list(store: &impl ReadableStore, user: UserId) -> Result<Vec<Address>> {
        let prefix = StateKeys::address_prefix(user)?;
        let entries = store.scan(&Scan::prefix(&prefix)).context(StoreSnafu)?;
        entries.iter().map(record::decode).collect()
    }
}
