//! Vault records and the membership index.

use cowallet_store::{ReadableStore, Scan, WriteTxn};
use cowallet_types::{UserId, Vault, VaultAddress, VaultId};
use snafu::ResultExt;
use tracing::debug;

use crate::{
    error::{AddressSnafu, DanglingIndexSnafu, Result, StoreSnafu},
    keys::StateKeys,
    record,
};

/// Vault storage operations.
pub struct VaultStore;

impl VaultStore {
    /// Returns the stored vault, or the zero-value vault if none exists.
    pub fn find(store: &impl ReadableStore, address: &VaultAddress) -> Result<Vault> {
        Ok(Self::get(store, address.vault_id())?.unwrap_or_else(|| Vault::empty(address)))
    }

    /// Returns the stored vault, if any.
    pub fn get(store: &impl ReadableStore, vault_id: VaultId) -> Result<Option<Vault>> {
        record::get(store, &StateKeys::vault(vault_id)?)
    }

    /// Writes the vault, creating its membership entries on first save.
    pub fn save(txn: &mut WriteTxn, vault: &Vault) -> Result<()> {
        let address = vault.address().context(AddressSnafu)?;
        let key = StateKeys::vault(address.vault_id())?;
        let created = !txn.contains(&key).context(StoreSnafu)?;
        record::put(txn, &key, vault)?;
        if created {
            Self::write_memberships(txn, &address)?;
        }
        Ok(())
    }

    /// Writes the vault and its membership entries only if it does not exist.
    ///
    /// Returns whether the vault was created.
    pub fn save_if_not_exist(txn: &mut WriteTxn, vault: &Vault) -> Result<bool> {
        let address = vault.address().context(AddressSnafu)?;
        let key = StateKeys::vault(address.vault_id())?;
        if txn.contains(&key).context(StoreSnafu)? {
            return Ok(false);
        }
        record::put(txn, &key, vault)?;
        Self::write_memberships(txn, &address)?;
        Ok(true)
    }

    fn write_memberships(txn: &mut WriteTxn, address: &VaultAddress) -> Result<()> {
        let vault_id = address.vault_id();
        for member in address.members() {
            txn.set(&StateKeys::vault_member(*member, vault_id)?, &[]).context(StoreSnafu)?;
        }
        debug!(vault = %vault_id, members = address.members().len(), "Created vault");
        Ok(())
    }

    /// Lists every vault `user` is a member of, ordered by vault id.
    pub fn list_for_user(store: &impl ReadableStore, user: UserId) -> Result<Vec<Vault>> {
        let prefix = StateKeys::vault_member_prefix(user)?;
        let entries = store.scan(&Scan::prefix(&prefix)).context(StoreSnafu)?;

        let mut vaults = Vec::with_capacity(entries.len());
        for entry in entries {
            let (_, vault_id) = StateKeys::parse_vault_member(&entry.key)?;
            let vault = Self::get(store, vault_id)?.ok_or_else(|| {
                DanglingIndexSnafu { index: "vault membership", id: vault_id.to_string() }.build()
            })?;
            vaults.push(vault);
        }
        Ok(vaults)
    }
}
