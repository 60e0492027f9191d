//! Outbox poller.
//!
//! Turns each pending log into a ledger transaction from the service's own
//! vault back to itself, carrying the log's payload as memo and its trace id
//! as the ledger's idempotency key. A log moves through
//! `pending -> submitted -> deleted`:
//!
//! - If the ledger already knows the trace id, the log is deleted without
//!   resubmitting.
//! - Otherwise the next unspent own output at or after the spend offset
//!   funds the transaction, which is signed and submitted.
//! - After the ledger accepts it, the log is deleted and the spend offset
//!   advanced in one transaction.
//!
//! A crash between submission and deletion leaves the log in place; the
//! next pass finds the trace id on the ledger and only deletes it.

use std::{sync::Arc, time::Duration};

use cowallet_ledger::{LedgerClient, OutputQuery, OutputState, TransactionDraft};
use cowallet_state::{LogStore, PropertyStore, property::SPEND_OFFSET};
use cowallet_store::StorageEngine;
use cowallet_types::{ErrorKind, Log, VaultAddress, config::OutboxConfig};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    driver::{blocking, run_periodic},
    error::{FundingExhaustedSnafu, LedgerSnafu, Result, StateSnafu, StoreSnafu},
};

/// Default logs handled per tick.
const DEFAULT_BATCH_SIZE: usize = 100;

/// Default interval between ticks.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Default backoff ceiling.
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How a log left the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Submitted by this pass.
    Submitted,
    /// Found on the ledger from an earlier attempt.
    AlreadySubmitted,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutboxCycle {
    /// Logs delivered and deleted.
    pub delivered: usize,
    /// Logs left for a later tick after a failure.
    pub failed: usize,
}

/// Delivers outbox logs to the ledger.
#[derive(bon::Builder)]
pub struct OutboxPoller {
    /// Store holding the outbox.
    store: StorageEngine,
    /// Ledger receiving the transactions.
    ledger: Arc<dyn LedgerClient>,
    /// Logs handled per tick.
    #[builder(default = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
    /// Interval between ticks.
    #[builder(default = DEFAULT_INTERVAL)]
    interval: Duration,
    /// Backoff ceiling after failed ticks.
    #[builder(default = DEFAULT_MAX_BACKOFF)]
    max_backoff: Duration,
}

impl OutboxPoller {
    /// Creates a poller from configuration.
    pub fn from_config(
        store: StorageEngine,
        ledger: Arc<dyn LedgerClient>,
        config: &OutboxConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            batch_size: config.batch_size,
            interval: config.tick,
            max_backoff: config.max_backoff,
        }
    }

    /// Runs one tick over the oldest pending logs.
    ///
    /// A failed log is logged and left for the next tick while the others
    /// proceed.
    ///
    /// # Errors
    ///
    /// Returns [`FundingExhausted`](crate::WorkerError::FundingExhausted)
    /// when no own output can fund a submission; the pass stops there
    /// without side effects. Also returns an error if the outbox cannot be
    /// read.
    pub async fn run_cycle(&self) -> Result<OutboxCycle> {
        let logs = {
            let read = self.store.begin_read().context(StoreSnafu)?;
            LogStore::list(&read, self.batch_size).context(StateSnafu)?
        };
        if logs.is_empty() {
            debug!("Outbox empty");
            return Ok(OutboxCycle::default());
        }

        let mut cycle = OutboxCycle::default();
        for log in &logs {
            let span = info_span!("outbox_log", seq = log.seq, trace_id = %log.trace_id);
            match self.deliver(log).instrument(span).await {
                Ok(_) => cycle.delivered += 1,
                Err(e) if e.kind() == ErrorKind::Exhausted => {
                    warn!(seq = log.seq, error = %e, "Outbox starved of funding");
                    return Err(e);
                },
                Err(e) => {
                    warn!(seq = log.seq, error = %e, code = %e.code(), "Outbox delivery failed");
                    cycle.failed += 1;
                },
            }
        }
        Ok(cycle)
    }

    /// Delivers one log and removes it from the outbox.
    ///
    /// # Errors
    ///
    /// Returns an error if a ledger call or the commit fails; the log stays
    /// pending.
    pub async fn deliver(&self, log: &Log) -> Result<Delivery> {
        match self.ledger.read_transaction(log.trace_id).await {
            Ok(record) => {
                debug!(hash = %record.transaction_hash, "Transaction already on ledger");
                let store = self.store.clone();
                let seq = log.seq;
                blocking(move || {
                    let mut txn = store.begin_write().context(StoreSnafu)?;
                    LogStore::remove(&mut txn, seq).context(StateSnafu)?;
                    txn.commit().context(StoreSnafu)
                })
                .await?;
                return Ok(Delivery::AlreadySubmitted);
            },
            Err(e) if e.is_not_found() => {},
            Err(source) => return Err(source).context(LedgerSnafu { operation: "read_transaction" }),
        }

        let offset = {
            let read = self.store.begin_read().context(StoreSnafu)?;
            PropertyStore::get_u64(&read, SPEND_OFFSET).context(StateSnafu)?
        };
        let own = VaultAddress::single(self.ledger.client_id());
        let query =
            OutputQuery::for_address(&own).offset(offset).limit(1).state(OutputState::Unspent);
        let funding = self
            .ledger
            .list_outputs(&query)
            .await
            .context(LedgerSnafu { operation: "list_outputs" })?;
        let Some(input) = funding.into_iter().next() else {
            return FundingExhaustedSnafu { offset }.fail();
        };

        let next_offset = offset.max(input.sequence.saturating_add(1));
        let draft = TransactionDraft {
            request_id: log.trace_id,
            inputs: vec![input],
            hint: log.trace_id,
            memo: log.payload.clone(),
        };
        let signed = self
            .ledger
            .sign_transaction(&draft)
            .await
            .context(LedgerSnafu { operation: "sign_transaction" })?;
        let record = self
            .ledger
            .submit_transaction(log.trace_id, &signed)
            .await
            .context(LedgerSnafu { operation: "submit_transaction" })?;

        let store = self.store.clone();
        let seq = log.seq;
        blocking(move || {
            let mut txn = store.begin_write().context(StoreSnafu)?;
            LogStore::remove(&mut txn, seq).context(StateSnafu)?;
            PropertyStore::set_u64(&mut txn, SPEND_OFFSET, next_offset).context(StateSnafu)?;
            txn.commit().context(StoreSnafu)
        })
        .await?;

        info!(hash = %record.transaction_hash, spend_offset = next_offset, "Outbox log submitted");
        Ok(Delivery::Submitted)
    }

    /// Starts the poller as a background task stopped by `cancel`.
    pub fn start(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let poller = &self;
            run_periodic("outbox", self.interval, self.max_backoff, cancel, move || async move {
                match poller.run_cycle().await {
                    Ok(cycle) => cycle.failed == 0,
                    Err(e) => {
                        warn!(error = %e, code = %e.code(), "Outbox pass aborted");
                        false
                    },
                }
            })
            .await;
        })
    }
}
