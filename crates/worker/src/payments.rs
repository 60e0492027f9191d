//! Own-output watcher.
//!
//! Reads the service vault's output stream and reacts to two kinds of
//! output 0:
//!
//! - **Relayed commands**: outputs the service sent to itself through the
//!   outbox. The memo is a [`SystemCommand`], applied here.
//! - **Payments**: outputs in the billing asset whose memo is a vault
//!   address. The payment buys a renewal, queued as a `RenewVault` command
//!   in the outbox; it takes effect when the relay comes back.
//!
//! Each output is handled once: its id is remembered under the property
//! family, since the ledger re-sequences an output when the outbox later
//! spends it and the stream shows it again.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use cowallet_ledger::{LedgerClient, Output, OutputQuery};
use cowallet_state::{AddressStore, LogStore, PropertyStore, RenewStore, property::OUTPUT_OFFSET};
use cowallet_store::{StorageEngine, WriteTxn};
use cowallet_types::{
    ErrorKind, Renew, SystemCommand, VaultAddress,
    config::{BillingConfig, MAX_PAGE_SIZE},
};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    driver::{blocking, run_periodic},
    error::{
        InvalidArgumentSnafu, InvalidCommandSnafu, LedgerSnafu, Result, StateSnafu, StoreSnafu,
    },
};

/// Default interval between ticks.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Default backoff ceiling.
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Trace id of the renewal bought by a payment output.
///
/// Derived from the output id so handling the same payment twice queues the
/// same log and the ledger deduplicates the same submission.
pub fn renewal_trace_id(output_id: Uuid) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, output_id.as_bytes())
}

/// Marker recording that an own output was handled.
///
/// Markers are never removed: an output can be re-sequenced whenever the
/// outbox spends it, which may be long after it arrived. The property family
/// grows by one entry per own output 0 for the life of the store.
fn seen_property(output_id: Uuid) -> String {
    format!("output-seen:{output_id}")
}

/// Watches the service vault's own outputs.
#[derive(bon::Builder)]
pub struct PaymentWatcher {
    /// Store receiving the effects.
    store: StorageEngine,
    /// Ledger holding the service vault.
    ledger: Arc<dyn LedgerClient>,
    /// Renewal pricing.
    billing: BillingConfig,
    /// Outputs read per tick.
    #[builder(default = MAX_PAGE_SIZE)]
    page_size: usize,
    /// Interval between ticks.
    #[builder(default = DEFAULT_INTERVAL)]
    interval: Duration,
    /// Backoff ceiling after failed ticks.
    #[builder(default = DEFAULT_MAX_BACKOFF)]
    max_backoff: Duration,
}

impl PaymentWatcher {
    /// Runs one tick. Returns the number of outputs read.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger or the store fails; the output offset
    /// is left where it was.
    pub async fn run_cycle(&self) -> Result<usize> {
        let offset = {
            let read = self.store.begin_read().context(StoreSnafu)?;
            PropertyStore::get_u64(&read, OUTPUT_OFFSET).context(StateSnafu)?
        };
        let own = VaultAddress::single(self.ledger.client_id());
        let query = OutputQuery::for_address(&own).offset(offset).limit(self.page_size);
        let outputs = self
            .ledger
            .list_outputs(&query)
            .await
            .context(LedgerSnafu { operation: "list_outputs" })?;
        if outputs.is_empty() {
            debug!(offset, "No new own outputs");
            return Ok(0);
        }

        let store = self.store.clone();
        let billing = self.billing.clone();
        let count = outputs.len();
        let next = blocking(move || {
            let mut txn = store.begin_write().context(StoreSnafu)?;
            let mut next = offset;
            for output in &outputs {
                handle_output(&mut txn, &billing, &own, output)?;
                next = next.max(output.sequence.saturating_add(1));
            }
            PropertyStore::set_u64(&mut txn, OUTPUT_OFFSET, next).context(StateSnafu)?;
            txn.commit().context(StoreSnafu)?;
            Ok(next)
        })
        .await?;

        info!(count, offset = next, "Own outputs processed");
        Ok(count)
    }

    /// Starts the watcher as a background task stopped by `cancel`.
    pub fn start(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let watcher = &self;
            run_periodic("own_outputs", self.interval, self.max_backoff, cancel, move || async move {
                match watcher.run_cycle().await {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(error = %e, code = %e.code(), "Own output pass failed");
                        false
                    },
                }
            })
            .await;
        })
    }
}

fn handle_output(
    txn: &mut WriteTxn,
    billing: &BillingConfig,
    own: &VaultAddress,
    output: &Output,
) -> Result<()> {
    if output.output_index != 0 {
        return Ok(());
    }
    let seen = seen_property(output.output_id);
    if PropertyStore::get_u64(&*txn, &seen).context(StateSnafu)? != 0 {
        return Ok(());
    }
    PropertyStore::set_u64(txn, &seen, output.sequence.max(1)).context(StateSnafu)?;

    if output.sender().as_ref() == Some(own) {
        let payload = output.memo().unwrap_or_default();
        let applied = SystemCommand::decode(&payload)
            .context(InvalidCommandSnafu)
            .and_then(|command| apply_command(txn, output, &command));
        match applied {
            Ok(()) => {},
            // One bad memo must not wedge the stream.
            Err(e) if e.kind() == ErrorKind::InvalidInput => {
                warn!(seq = output.sequence, error = %e, "Skipping relayed output");
            },
            Err(e) => return Err(e),
        }
        return Ok(());
    }

    handle_payment(txn, billing, output)
}

fn handle_payment(txn: &mut WriteTxn, billing: &BillingConfig, output: &Output) -> Result<()> {
    if output.asset_id != billing.pay_asset_id {
        debug!(seq = output.sequence, asset = %output.asset_id, "Ignoring non-billing asset");
        return Ok(());
    }
    let Some(vault) = output
        .memo()
        .and_then(|memo| String::from_utf8(memo).ok())
        .and_then(|text| text.trim().parse::<VaultAddress>().ok())
    else {
        debug!(seq = output.sequence, "Ignoring payment without vault memo");
        return Ok(());
    };

    let period = billing.period_for(output.amount);
    if period <= 0 {
        debug!(seq = output.sequence, amount = %output.amount, "Payment too small to renew");
        return Ok(());
    }

    let command = SystemCommand::RenewVault {
        vault: vault.clone(),
        period,
        payer: output.sender().map(|sender| sender.to_string()).unwrap_or_default(),
        asset: output.asset_id,
        amount: output.amount,
        paid_at: output.created_at,
    };
    let payload = command.encode().context(InvalidCommandSnafu)?;
    let trace_id = renewal_trace_id(output.output_id);
    let queued =
        LogStore::append_at(txn, trace_id, payload, output.created_at).context(StateSnafu)?;
    if queued.is_some() {
        info!(vault = %vault.vault_id(), period, %trace_id, "Renewal queued");
    }
    Ok(())
}

/// Applies a relayed command carried by `output`.
///
/// # Errors
///
/// Returns `InvalidArgument` for a renewal whose window cannot be
/// represented, and storage errors otherwise.
pub fn apply_command(txn: &mut WriteTxn, output: &Output, command: &SystemCommand) -> Result<()> {
    match command {
        SystemCommand::RenewVault { vault, period, payer, asset, amount, paid_at } => {
            let vault_id = vault.vault_id();
            if RenewStore::get(&*txn, output.request_id).context(StateSnafu)?.is_some() {
                return Ok(());
            }
            let latest = RenewStore::latest(&*txn, vault_id).context(StateSnafu)?;
            if latest.as_ref().is_some_and(|renew| renew.sequence >= output.sequence) {
                debug!(vault = %vault_id, seq = output.sequence, "Renewal already applied");
                return Ok(());
            }

            let previous = latest.map_or(DateTime::<Utc>::UNIX_EPOCH, |renew| renew.to);
            let from = previous.max(*paid_at);
            let to = TimeDelta::try_seconds(*period)
                .and_then(|granted| from.checked_add_signed(granted))
                .ok_or_else(|| {
                    InvalidArgumentSnafu { message: format!("renewal period {period} out of range") }
                        .build()
                })?;

            let renew = Renew {
                id: output.request_id,
                sequence: output.sequence,
                created_at: output.created_at,
                members: vault.members().to_vec(),
                threshold: vault.threshold(),
                sender: payer.clone(),
                asset: *asset,
                amount: *amount,
                period: *period,
                from,
                to,
            };
            RenewStore::save(txn, &renew).context(StateSnafu)?;
            info!(vault = %vault_id, %from, %to, "Vault renewed");
        },
        SystemCommand::AddAddress { user, address, label } => {
            AddressStore::save(txn, *user, address, label.clone()).context(StateSnafu)?;
            debug!(%user, vault = %address.vault_id(), "Address saved");
        },
        SystemCommand::RemoveAddress { user, address } => {
            AddressStore::delete(txn, *user, address.vault_id()).context(StateSnafu)?;
            debug!(%user, vault = %address.vault_id(), "Address removed");
        },
    }
    Ok(())
}
