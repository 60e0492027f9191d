//! Read and write surface offered to the request layer.
//!
//! [`Backend`] wraps the store with the operations a request handler needs:
//! vault and snapshot listings, sync scheduling bounded by the vault's paid
//! window, per-user metadata, and address book changes, which are relayed
//! through the outbox rather than written directly.

use std::time::Duration;

use chrono::{DateTime, Utc};
use cowallet_state::{
    AddressStore, JobStore, LogStore, RemarkStore, RenewStore, SnapshotQuery, SnapshotStore,
    VaultStore,
};
use cowallet_store::{ReadableStore, StorageEngine};
use cowallet_types::{
    Address, Job, Log, Remark, Renew, Snapshot, SystemCommand, UserId, Vault, VaultAddress,
    config::SyncConfig,
};
use snafu::{OptionExt, ResultExt};
use tracing::debug;
use uuid::Uuid;

use crate::error::{InvalidArgumentSnafu, InvalidCommandSnafu, Result, StateSnafu, StoreSnafu};

/// Store-backed operations behind the request layer.
///
/// Methods are synchronous and do store I/O; async callers run them on the
/// blocking pool.
#[derive(Clone)]
pub struct Backend {
    store: StorageEngine,
    job_ttl: Duration,
}

impl Backend {
    /// Creates a backend whose sync jobs live at most `job_ttl`.
    pub fn new(store: StorageEngine, job_ttl: Duration) -> Self {
        Self { store, job_ttl }
    }

    /// Creates a backend from the sync configuration.
    pub fn from_config(store: StorageEngine, config: &SyncConfig) -> Self {
        Self::new(store, config.job_ttl)
    }

    /// The vault at `address`, or an empty vault when it was never synced.
    pub fn find_vault(&self, address: &VaultAddress) -> Result<Vault> {
        let read = self.store.begin_read().context(StoreSnafu)?;
        VaultStore::find(&read, address).context(StateSnafu)
    }

    /// Every synced vault `user` belongs to.
    pub fn list_vaults(&self, user: UserId) -> Result<Vec<Vault>> {
        let read = self.store.begin_read().context(StoreSnafu)?;
        VaultStore::list_for_user(&read, user).context(StateSnafu)
    }

    /// End of the vault's paid window, if it was ever renewed.
    pub fn vault_expiry(&self, address: &VaultAddress) -> Result<Option<DateTime<Utc>>> {
        let read = self.store.begin_read().context(StoreSnafu)?;
        RenewStore::expiry(&read, address.vault_id()).context(StateSnafu)
    }

    /// The vault's renewals, newest first.
    pub fn list_renews(&self, address: &VaultAddress, limit: usize) -> Result<Vec<Renew>> {
        let read = self.store.begin_read().context(StoreSnafu)?;
        RenewStore::list(&read, address.vault_id(), limit).context(StateSnafu)
    }

    /// A page of the vault's snapshots, newest first.
    pub fn list_snapshots(
        &self,
        address: &VaultAddress,
        query: &SnapshotQuery,
    ) -> Result<Vec<Snapshot>> {
        let read = self.store.begin_read().context(StoreSnafu)?;
        SnapshotStore::list(&read, address.vault_id(), query).context(StateSnafu)
    }

    /// Schedules sync passes for a vault until its job lapses.
    ///
    /// The job lives for the configured TTL or until the vault's paid window
    /// ends, whichever comes first. Returns `None` without writing when the
    /// vault was never renewed or its window has ended by `now`.
    pub fn enqueue_sync(
        &self,
        user: UserId,
        address: &VaultAddress,
        now: DateTime<Utc>,
    ) -> Result<Option<Job>> {
        let mut txn = self.store.begin_write().context(StoreSnafu)?.as_of(now);
        let vault_id = address.vault_id();
        let Some(expiry) = RenewStore::expiry(&txn, vault_id).context(StateSnafu)? else {
            debug!(vault = %vault_id, "Not enqueuing sync for unpaid vault");
            return Ok(None);
        };
        let Some(remaining) = (expiry - txn.now()).to_std().ok().filter(|left| !left.is_zero())
        else {
            debug!(vault = %vault_id, %expiry, "Not enqueuing sync for expired vault");
            return Ok(None);
        };

        let job = JobStore::enqueue(&mut txn, user, address, self.job_ttl.min(remaining))
            .context(StateSnafu)?;
        txn.commit().context(StoreSnafu)?;
        Ok(Some(job))
    }

    /// Sets `user`'s display name for a vault.
    pub fn save_remark(
        &self,
        user: UserId,
        address: &VaultAddress,
        name: impl Into<String>,
    ) -> Result<Remark> {
        let mut txn = self.store.begin_write().context(StoreSnafu)?;
        let remark = RemarkStore::save(&mut txn, user, address, name).context(StateSnafu)?;
        txn.commit().context(StoreSnafu)?;
        Ok(remark)
    }

    /// `user`'s display name for a vault, empty when unset.
    pub fn remark_name(&self, user: UserId, address: &VaultAddress) -> Result<String> {
        let read = self.store.begin_read().context(StoreSnafu)?;
        RemarkStore::name(&read, user, address.vault_id()).context(StateSnafu)
    }

    /// `user`'s address book.
    pub fn list_addresses(&self, user: UserId) -> Result<Vec<Address>> {
        let read = self.store.begin_read().context(StoreSnafu)?;
        AddressStore::list(&read, user).context(StateSnafu)
    }

    /// Queues an address book upsert; it applies once relayed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty label.
    pub fn request_add_address(
        &self,
        user: UserId,
        address: &VaultAddress,
        label: impl Into<String>,
    ) -> Result<Log> {
        let label = label.into();
        if label.trim().is_empty() {
            return InvalidArgumentSnafu { message: "address label must not be empty" }.fail();
        }
        self.relay(SystemCommand::AddAddress { user, address: address.clone(), label })
    }

    /// Queues an address book removal; it applies once relayed.
    pub fn request_remove_address(&self, user: UserId, address: &VaultAddress) -> Result<Log> {
        self.relay(SystemCommand::RemoveAddress { user, address: address.clone() })
    }

    fn relay(&self, command: SystemCommand) -> Result<Log> {
        let payload = command.encode().context(InvalidCommandSnafu)?;
        let trace_id = Uuid::new_v4();
        let mut txn = self.store.begin_write().context(StoreSnafu)?;
        let log = LogStore::append(&mut txn, trace_id, payload)
            .context(StateSnafu)?
            .context(InvalidArgumentSnafu { message: format!("trace id {trace_id} reused") })?;
        txn.commit().context(StoreSnafu)?;
        debug!(seq = log.seq, action = command.action(), "Queued system command");
        Ok(log)
    }
}
