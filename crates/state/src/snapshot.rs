//! Snapshot records and their two time-ordered indexes.
//!
//! Snapshots are append-only. Saving one writes the primary record plus an
//! entry in the by-vault index and the by-vault-asset index; both entries
//! carry the snapshot id in their key and hold no payload.

use chrono::{DateTime, Utc};
use cowallet_store::{KeyFamily, ReadableStore, Scan, WriteTxn};
use cowallet_types::{AssetId, Snapshot, VaultId};
use snafu::ResultExt;
use uuid::Uuid;

use crate::{
    error::{DanglingIndexSnafu, KeySnafu, Result, StoreSnafu},
    keys::StateKeys,
    record,
};

/// Page size used when the caller passes 0.
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Largest page a listing returns.
pub const MAX_LIST_LIMIT: usize = 100;

/// Parameters of a backward snapshot listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotQuery {
    /// Restrict to one asset.
    pub asset: Option<AssetId>,
    /// Only snapshots created strictly before this time.
    pub before: Option<DateTime<Utc>>,
    /// Page size; 0 means [`DEFAULT_LIST_LIMIT`], capped at [`MAX_LIST_LIMIT`].
    pub limit: usize,
}

impl SnapshotQuery {
    /// Effective page size.
    pub fn effective_limit(&self) -> usize {
        match self.limit {
            0 => DEFAULT_LIST_LIMIT,
            n => n.min(MAX_LIST_LIMIT),
        }
    }
}

/// Snapshot storage operations.
pub struct SnapshotStore;

impl SnapshotStore {
    /// Saves a snapshot and its index entries.
    ///
    /// Returns `false` without writing if a snapshot with the same id exists.
    pub fn save(txn: &mut WriteTxn, vault_id: VaultId, snapshot: &Snapshot) -> Result<bool> {
        let key = StateKeys::snapshot(snapshot.id)?;
        if txn.contains(&key).context(StoreSnafu)? {
            return Ok(false);
        }
        record::put(txn, &key, snapshot)?;

        let by_vault = StateKeys::snapshot_by_vault(vault_id, snapshot.created_at, snapshot.id)?;
        txn.set(&by_vault, &[]).context(StoreSnafu)?;
        let by_asset = StateKeys::snapshot_by_vault_asset(
            vault_id,
            snapshot.asset_id,
            snapshot.created_at,
            snapshot.id,
        )?;
        txn.set(&by_asset, &[]).context(StoreSnafu)?;
        Ok(true)
    }

    /// Returns a snapshot by id.
    pub fn get(store: &impl ReadableStore, id: Uuid) -> Result<Option<Snapshot>> {
        record::get(store, &StateKeys::snapshot(id)?)
    }

    /// Lists a vault's snapshots newest first.
    pub fn list(
        store: &impl ReadableStore,
        vault_id: VaultId,
        query: &SnapshotQuery,
    ) -> Result<Vec<Snapshot>> {
        let (family, prefix, seek) = match query.asset {
            Some(asset) => {
                let family = KeyFamily::SnapshotByVaultAsset;
                let prefix = family.key(&(vault_id, asset)).context(KeySnafu)?;
                let seek = query
                    .before
                    .map(|before| family.key(&(vault_id, asset, before)))
                    .transpose()
                    .context(KeySnafu)?;
                (family, prefix, seek)
            },
            None => {
                let family = KeyFamily::SnapshotByVault;
                let prefix = family.key(&(vault_id,)).context(KeySnafu)?;
                let seek = query
                    .before
                    .map(|before| family.key(&(vault_id, before)))
                    .transpose()
                    .context(KeySnafu)?;
                (family, prefix, seek)
            },
        };

        let mut scan = Scan::prefix(&prefix).reverse().limit(query.effective_limit());
        if let Some(seek) = &seek {
            scan = scan.seek(seek);
        }
        let entries = store.scan(&scan).context(StoreSnafu)?;

        let mut snapshots = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = match family {
                KeyFamily::SnapshotByVaultAsset => {
                    family.decode::<(VaultId, AssetId, DateTime<Utc>, Uuid)>(&entry.key).map(|k| k.3)
                },
                _ => family.decode::<(VaultId, DateTime<Utc>, Uuid)>(&entry.key).map(|k| k.2),
            }
            .context(KeySnafu)?;
            let snapshot = Self::get(store, id)?
                .ok_or_else(|| DanglingIndexSnafu { index: "snapshot", id: id.to_string() }.build())?;
            snapshots.push(snapshot);
        }
        Ok(snapshots)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use cowallet_store::StorageEngine;
    use cowallet_test_utils::fixtures::{amount, asset, at, vault};

    use super::*;

    fn snapshot(id: u128, asset_n: u128, seconds: i64) -> Snapshot {
        Snapshot {
            id: Uuid::from_u128(id),
            created_at: at(seconds),
            asset_id: asset(asset_n),
            amount: amount("1"),
            opponent: String::new(),
            memo: String::new(),
            transaction_hash: format!("tx{id}"),
            output_index: 0,
        }
    }

    fn seeded() -> (StorageEngine, VaultId) {
        let engine = StorageEngine::open_in_memory().unwrap();
        let vault_id = vault(&[1, 2], 2).vault_id();
        let other = vault(&[3], 1).vault_id();
        let mut txn = engine.begin_write().unwrap();
        for (id, asset_n, seconds) in [(1, 1, 10), (2, 2, 20), (3, 1, 30), (4, 2, 40)] {
            assert!(SnapshotStore::save(&mut txn, vault_id, &snapshot(id, asset_n, seconds)).unwrap());
        }
        SnapshotStore::save(&mut txn, other, &snapshot(99, 1, 25)).unwrap();
        txn.commit().unwrap();
        (engine, vault_id)
    }

    fn ids(snapshots: &[Snapshot]) -> Vec<u128> {
        snapshots.iter().map(|s| s.id.as_u128()).collect()
    }

    #[test]
    fn test_list_newest_first() {
        let (engine, vault_id) = seeded();
        let read = engine.begin_read().unwrap();
        let all = SnapshotStore::list(&read, vault_id, &SnapshotQuery::default()).unwrap();
        assert_eq!(ids(&all), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_list_before_is_exclusive() {
        let (engine, vault_id) = seeded();
        let read = engine.begin_read().unwrap();
        let query = SnapshotQuery { before: Some(at(30)), ..SnapshotQuery::default() };
        assert_eq!(ids(&SnapshotStore::list(&read, vault_id, &query).unwrap()), vec![2, 1]);
    }

    #[test]
    fn test_asset_filter_is_subset() {
        let (engine, vault_id) = seeded();
        let read = engine.begin_read().unwrap();
        let query = SnapshotQuery { asset: Some(asset(1)), ..SnapshotQuery::default() };
        let filtered = SnapshotStore::list(&read, vault_id, &query).unwrap();
        assert_eq!(ids(&filtered), vec![3, 1]);

        let query = SnapshotQuery { asset: Some(asset(2)), before: Some(at(40)), limit: 5 };
        assert_eq!(ids(&SnapshotStore::list(&read, vault_id, &query).unwrap()), vec![2]);
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(SnapshotQuery::default().effective_limit(), DEFAULT_LIST_LIMIT);
        assert_eq!(SnapshotQuery { limit: 500, ..Default::default() }.effective_limit(), 100);

        let (engine, vault_id) = seeded();
        let read = engine.begin_read().unwrap();
        let query = SnapshotQuery { limit: 2, ..SnapshotQuery::default() };
        assert_eq!(ids(&SnapshotStore::list(&read, vault_id, &query).unwrap()), vec![4, 3]);
    }

    #[test]
    fn test_duplicate_save_is_ignored() {
        let (engine, vault_id) = seeded();
        let mut txn = engine.begin_write().unwrap();
        let mut changed = snapshot(1, 1, 10);
        changed.amount = amount("999");
        assert!(!SnapshotStore::save(&mut txn, vault_id, &changed).unwrap());
        txn.commit().unwrap();

        let read = engine.begin_read().unwrap();
        let stored = SnapshotStore::get(&read, Uuid::from_u128(1)).unwrap().unwrap();
        assert_eq!(stored.amount, amount("1"));
    }
}
