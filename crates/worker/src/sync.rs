//! Ledger-to-vault synchronization.
//!
//! One pass folds a vault's new ledger outputs into its stored state:
//!
//! 1. Page through the vault's output stream from the stored offset until a
//!    short page.
//! 2. Record a snapshot for every output that is not change paid back to
//!    the vault itself, and an outbound snapshot for every distinct spending
//!    request behind a spent output.
//! 3. Rebuild the asset totals from the live (unspent or signed) outputs.
//! 4. Commit snapshots, assets, and the new offset in one transaction.
//!
//! The new offset is the lowest live sequence or the position past the
//! highest spent sequence, whichever is lower. Every live output therefore
//! sits at or above the offset and is seen again on the next pass, which is
//! what lets the totals be recomputed instead of accumulated. The offset
//! never moves backwards.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use cowallet_ledger::{LedgerClient, Output, OutputQuery, OutputState, SpendingRequest};
use cowallet_state::{SnapshotStore, VaultStore};
use cowallet_store::{ReadableStore, StorageEngine};
use cowallet_types::{Asset, AssetId, Snapshot, VaultAddress, config::MAX_PAGE_SIZE};
use rust_decimal::Decimal;
use snafu::ResultExt;
use tracing::{Instrument, debug, info, info_span};

use crate::{
    driver::blocking,
    error::{LedgerSnafu, Result, StateSnafu, StoreSnafu},
};

/// Result of one sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Offset stored after the pass.
    pub offset: u64,
    /// Outputs read from the ledger.
    pub outputs: usize,
    /// Snapshots written for the first time.
    pub snapshots: usize,
    /// Whether the pass committed anything.
    pub written: bool,
}

/// Accumulated state of one pass.
#[derive(Debug, Default)]
struct Pass {
    assets: BTreeMap<AssetId, Asset>,
    snapshots: Vec<Snapshot>,
    seen_requests: HashSet<String>,
    lowest_live: u64,
    past_spent: u64,
    outputs: usize,
}

/// Folds ledger outputs into vault state.
pub struct SyncEngine {
    store: StorageEngine,
    ledger: Arc<dyn LedgerClient>,
    page_size: usize,
}

impl SyncEngine {
    /// Creates an engine reading `page_size` outputs per ledger call.
    pub fn new(store: StorageEngine, ledger: Arc<dyn LedgerClient>, page_size: usize) -> Self {
        Self { store, ledger, page_size: page_size.clamp(1, MAX_PAGE_SIZE) }
    }

    /// Runs one sync pass for `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if a ledger call or the commit fails. Nothing is
    /// written in that case and the next pass starts from the same offset.
    pub async fn sync_vault(&self, address: &VaultAddress) -> Result<SyncOutcome> {
        let span = info_span!("sync_vault", vault = %address.vault_id());
        self.run_pass(address).instrument(span).await
    }

    async fn run_pass(&self, address: &VaultAddress) -> Result<SyncOutcome> {
        let stored = {
            let read = self.store.begin_read().context(StoreSnafu)?;
            VaultStore::find(&read, address).context(StateSnafu)?
        };

        let mut pass = Pass::default();
        let mut walked = stored.offset;
        loop {
            let query = OutputQuery::for_address(address).offset(walked).limit(self.page_size);
            let outputs = self
                .ledger
                .list_outputs(&query)
                .await
                .context(LedgerSnafu { operation: "list_outputs" })?;

            for output in &outputs {
                walked = walked.max(output.sequence.saturating_add(1));
                self.fold(&mut pass, address, output).await?;
            }
            pass.outputs += outputs.len();

            if outputs.len() < self.page_size {
                break;
            }
        }

        let offset = next_offset(pass.past_spent, pass.lowest_live, walked).max(stored.offset);
        let assets: Vec<Asset> = pass.assets.into_values().collect();

        // Network calls are done; everything below is one transaction.
        let store = self.store.clone();
        let vault_id = address.vault_id();
        let outputs = pass.outputs;
        let snapshots = pass.snapshots;
        blocking(move || {
            let mut txn = store.begin_write().context(StoreSnafu)?;
            let mut created = 0;
            for snapshot in &snapshots {
                if SnapshotStore::save(&mut txn, vault_id, snapshot).context(StateSnafu)? {
                    created += 1;
                }
            }

            if created == 0 && offset == stored.offset && assets == stored.assets {
                txn.discard().context(StoreSnafu)?;
                debug!(offset, outputs, "Vault unchanged");
                return Ok(SyncOutcome { offset, outputs, snapshots: 0, written: false });
            }

            let mut vault = stored;
            vault.assets = assets;
            vault.offset = offset;
            vault.updated_at = txn.now();
            VaultStore::save(&mut txn, &vault).context(StateSnafu)?;
            txn.commit().context(StoreSnafu)?;

            info!(offset, outputs, snapshots = created, "Vault synced");
            Ok(SyncOutcome { offset, outputs, snapshots: created, written: true })
        })
        .await
    }

    async fn fold(&self, pass: &mut Pass, address: &VaultAddress, output: &Output) -> Result<()> {
        let change = output.output_index > 0 && output.sender().as_ref() == Some(address);
        if !change {
            pass.snapshots.push(inbound_snapshot(output));
        }

        if output.state == OutputState::Spent {
            if pass.seen_requests.insert(output.signed_by.clone()) {
                let request = self.spending_request(&output.signed_by).await?;
                pass.snapshots.push(outbound_snapshot(&request));
            }
            pass.past_spent = pass.past_spent.max(output.sequence.saturating_add(1));
            return Ok(());
        }

        let asset = pass
            .assets
            .entry(output.asset_id)
            .or_insert_with(|| Asset::empty(output.asset_id, output.chain_hash.clone()));
        asset.balance += output.amount;
        match output.state {
            OutputState::Unspent => asset.unspent += output.amount,
            OutputState::Signed => {
                asset.signed += output.amount;
                if !asset.requests.contains(&output.signed_by) {
                    asset.requests.push(output.signed_by.clone());
                }
            },
            OutputState::Spent => {},
        }

        pass.lowest_live = match pass.lowest_live {
            0 => output.sequence,
            lowest => lowest.min(output.sequence),
        };
        Ok(())
    }

    /// Resolves the request behind a spent output, pricing it from the
    /// spending transaction's first output when the ledger reports zero.
    async fn spending_request(&self, signer_ref: &str) -> Result<SpendingRequest> {
        let mut request = self
            .ledger
            .read_spending_request(signer_ref)
            .await
            .context(LedgerSnafu { operation: "read_spending_request" })?;

        if request.amount.is_zero() {
            let paid = self
                .ledger
                .read_output(&request.transaction_hash, 0)
                .await
                .context(LedgerSnafu { operation: "read_output" })?;
            request.amount = paid.amount;
        }
        Ok(request)
    }
}

/// The offset a pass leaves behind.
///
/// `past_spent` is one past the highest spent sequence and `lowest_live` the
/// lowest unspent or signed sequence; zero means the pass saw none of that
/// kind. With neither, the pass saw nothing and the walk position stands.
pub(crate) fn next_offset(past_spent: u64, lowest_live: u64, walked: u64) -> u64 {
    match (past_spent, lowest_live) {
        (0, 0) => walked,
        (spent, 0) => spent,
        (0, live) => live,
        (spent, live) => spent.min(live),
    }
}

fn memo_text(bytes: Option<Vec<u8>>) -> String {
    bytes.map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default()
}

fn inbound_snapshot(output: &Output) -> Snapshot {
    Snapshot {
        id: output.output_id,
        created_at: output.created_at,
        asset_id: output.asset_id,
        amount: output.amount,
        opponent: output.sender().map(|sender| sender.to_string()).unwrap_or_default(),
        memo: memo_text(output.memo()),
        transaction_hash: output.transaction_hash.clone(),
        output_index: output.output_index,
    }
}

fn outbound_snapshot(request: &SpendingRequest) -> Snapshot {
    Snapshot {
        id: request.request_id,
        created_at: request.created_at,
        asset_id: request.asset_id,
        amount: Decimal::ZERO - request.amount,
        opponent: String::new(),
        memo: memo_text(request.memo()),
        transaction_hash: request.transaction_hash.clone(),
        output_index: 0,
    }
}
