//! Renewal records, time-ordered per vault.

use chrono::{DateTime, Utc};
use cowallet_store::{ReadableStore, Scan, WriteTxn};
use cowallet_types::{Renew, VaultAddress, VaultId};
use snafu::ResultExt;
use uuid::Uuid;

use crate::{
    error::{AddressSnafu, DanglingIndexSnafu, Result, StoreSnafu},
    keys::StateKeys,
    record,
};

/// Renewal storage operations.
pub struct RenewStore;

impl RenewStore {
    /// Saves a renewal and its by-vault index entry.
    pub fn save(txn: &mut WriteTxn, renew: &Renew) -> Result<()> {
        let address = VaultAddress::new(renew.members.iter().copied(), renew.threshold)
            .context(AddressSnafu)?;
        record::put(txn, &StateKeys::renew(renew.id)?, renew)?;
        let index = StateKeys::renew_by_vault(address.vault_id(), renew.created_at, renew.id)?;
        txn.set(&index, &[]).context(StoreSnafu)
    }

    /// Returns a renewal by id.
    pub fn get(store: &impl ReadableStore, id: Uuid) -> Result<Option<Renew>> {
        record::get(store, &StateKeys::renew(id)?)
    }

    /// Lists a vault's renewals newest first.
    pub fn list(store: &impl ReadableStore, vault_id: VaultId, limit: usize) -> Result<Vec<Renew>> {
        let prefix = StateKeys::renew_by_vault_prefix(vault_id)?;
        let entries = store.scan(&Scan::prefix(&prefix).reverse().limit(limit)).context(StoreSnafu)?;

        let mut renews = Vec::with_capacity(entries.len());
        for entry in entries {
            let (_, _, id) = StateKeys::parse_renew_by_vault(&entry.key)?;
            let renew = Self::get(store, id)?
                .ok_or_else(|| DanglingIndexSnafu { index: "renew", id: id.to_string() }.build())?;
            renews.push(renew);
        }
        Ok(renews)
    }

    /// The most recent renewal of a vault.
    pub fn latest(store: &impl ReadableStore, vault_id: VaultId) -> Result<Option<Renew>> {
        Ok(Self::list(store, vault_id, 1)?.into_iter().next())
    }

    /// The vault's expiry: the end of its most recent renewal.
    pub fn expiry(store: &impl ReadableStore, vault_id: VaultId) -> Result<Option<DateTime<Utc>>> {
        Ok(Self::latest(store, vault_id)?.map(|renew| renew.to))
    }
}
