//! In-memory ledger for tests.
//!
//! [`MockLedger`] keeps outputs, spending requests, and accepted
//! transactions in memory and behaves like the real ledger where the backend
//! depends on it:
//!
//! - **Re-sequencing**: every state change moves an output to the end of its
//!   owner's stream
//! - **Idempotent submission**: a request id is accepted once; resubmitting
//!   returns the first record and changes nothing
//! - **Relay**: a submitted transaction pays its inputs back to the service's
//!   own vault with the draft's memo, the way the service relays commands
//!   to itself
//! - **Failure injection**: the next `n` calls fail with
//!   [`LedgerError::Unavailable`](crate::LedgerError::Unavailable)

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use cowallet_types::{AssetId, UserId, VaultAddress};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use snafu::ensure;
use tracing::debug;
use uuid::Uuid;

use crate::{
    client::LedgerClient,
    error::{NotFoundSnafu, RejectedSnafu, Result, UnavailableSnafu},
    types::{
        Output, OutputQuery, OutputState, SignedTransaction, SpendingRequest, TransactionDraft,
        TransactionRecord,
    },
};

/// Recipient and amount of a signed, not yet spent request.
#[derive(Debug, Clone)]
struct PendingSpend {
    recipient: VaultAddress,
    amount: Decimal,
}

#[derive(Debug)]
struct MockState {
    now: DateTime<Utc>,
    last_sequence: u64,
    outputs: Vec<Output>,
    requests: HashMap<String, SpendingRequest>,
    pending: HashMap<String, PendingSpend>,
    drafts: HashMap<Uuid, (TransactionDraft, SignedTransaction)>,
    transactions: HashMap<Uuid, TransactionRecord>,
}

impl MockState {
    fn next_sequence(&mut self) -> u64 {
        self.last_sequence += 1;
        self.last_sequence
    }

    fn output_mut(&mut self, output_id: Uuid) -> Option<&mut Output> {
        self.outputs.iter_mut().find(|output| output.output_id == output_id)
    }

    /// Moves an output to `state` and to the end of its stream.
    fn transition(&mut self, output_id: Uuid, state: OutputState, signed_by: &str) {
        let sequence = self.next_sequence();
        let now = self.now;
        if let Some(output) = self.output_mut(output_id) {
            output.state = state;
            output.signed_by = signed_by.to_string();
            output.sequence = sequence;
            output.updated_at = now;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn create_output(
        &mut self,
        owner: &VaultAddress,
        sender: Option<&VaultAddress>,
        asset_id: AssetId,
        amount: Decimal,
        memo: &[u8],
        request_id: Uuid,
        transaction_hash: String,
        output_index: u8,
    ) -> Output {
        let output = Output {
            output_id: Uuid::new_v4(),
            request_id,
            transaction_hash,
            output_index,
            asset_id,
            chain_hash: hash_hex(asset_id.as_bytes()),
            amount,
            members: owner.members().to_vec(),
            threshold: owner.threshold(),
            senders: sender.map(|s| s.members().to_vec()).unwrap_or_default(),
            senders_threshold: sender.map_or(0, VaultAddress::threshold),
            extra: hex::encode(memo),
            state: OutputState::Unspent,
            sequence: self.next_sequence(),
            signed_by: String::new(),
            created_at: self.now,
            updated_at: self.now,
        };
        self.outputs.push(output.clone());
        output
    }
}

fn hash_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// A controllable ledger held in memory.
#[derive(Debug)]
pub struct MockLedger {
    client_id: UserId,
    state: Mutex<MockState>,
    unavailable_count: AtomicUsize,
    submit_count: AtomicUsize,
    list_count: AtomicUsize,
}

impl MockLedger {
    /// Creates an empty ledger whose service identity is `client_id`.
    ///
    /// The clock starts at 2024-01-01T00:00:00Z.
    pub fn new(client_id: UserId) -> Self {
        let now = DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default();
        Self {
            client_id,
            state: Mutex::new(MockState {
                now,
                last_sequence: 0,
                outputs: Vec::new(),
                requests: HashMap::new(),
                pending: HashMap::new(),
                drafts: HashMap::new(),
                transactions: HashMap::new(),
            }),
            unavailable_count: AtomicUsize::new(0),
            submit_count: AtomicUsize::new(0),
            list_count: AtomicUsize::new(0),
        }
    }

    /// The service's own single-member vault.
    pub fn service_address(&self) -> VaultAddress {
        VaultAddress::single(self.client_id)
    }

    /// Current ledger time.
    pub fn now(&self) -> DateTime<Utc> {
        self.state.lock().now
    }

    /// Moves the ledger clock forward.
    pub fn advance(&self, by: TimeDelta) {
        let mut state = self.state.lock();
        state.now += by;
    }

    /// Sets the ledger clock.
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.state.lock().now = now;
    }

    /// Credits `to` from outside any vault.
    pub fn deposit(&self, to: &VaultAddress, asset_id: AssetId, amount: Decimal) -> Output {
        self.transfer(to, None, asset_id, amount, &[])
    }

    /// Credits `to` from the vault `from`, carrying `memo`.
    pub fn transfer(
        &self,
        to: &VaultAddress,
        from: Option<&VaultAddress>,
        asset_id: AssetId,
        amount: Decimal,
        memo: &[u8],
    ) -> Output {
        let mut state = self.state.lock();
        let request_id = Uuid::new_v4();
        let hash = hash_hex(request_id.as_bytes());
        state.create_output(to, from, asset_id, amount, memo, request_id, hash, 0)
    }

    /// Creates change: output 1 of a transaction `vault` sent, paid back to itself.
    pub fn change(&self, vault: &VaultAddress, asset_id: AssetId, amount: Decimal) -> Output {
        let mut state = self.state.lock();
        let request_id = Uuid::new_v4();
        let hash = hash_hex(request_id.as_bytes());
        state.create_output(vault, Some(vault), asset_id, amount, &[], request_id, hash, 1)
    }

    /// Signs `outputs` into a request paying `amount` to `recipient`.
    ///
    /// Returns the signer reference recorded on the outputs.
    pub fn sign(&self, outputs: &[Uuid], recipient: &VaultAddress, amount: Decimal) -> String {
        let mut state = self.state.lock();
        let request_id = Uuid::new_v4();
        let signer_ref = format!("sig-{}", request_id.simple());
        let asset_id = outputs
            .first()
            .and_then(|id| state.outputs.iter().find(|o| o.output_id == *id))
            .map(|o| o.asset_id)
            .unwrap_or_default();

        for id in outputs {
            state.transition(*id, OutputState::Signed, &signer_ref);
        }
        let request = SpendingRequest {
            request_id,
            created_at: state.now,
            asset_id,
            amount,
            transaction_hash: hash_hex(signer_ref.as_bytes()),
            extra: String::new(),
        };
        state.requests.insert(signer_ref.clone(), request);
        state.pending.insert(signer_ref.clone(), PendingSpend { recipient: recipient.clone(), amount });
        signer_ref
    }

    /// Confirms a signed request: its outputs become spent and the
    /// recipient receives output 0 of the spending transaction.
    pub fn spend(&self, signer_ref: &str) {
        let mut state = self.state.lock();
        let ids: Vec<Uuid> = state
            .outputs
            .iter()
            .filter(|o| o.signed_by == signer_ref && o.state == OutputState::Signed)
            .map(|o| o.output_id)
            .collect();
        let Some(owner) = ids
            .first()
            .and_then(|id| state.outputs.iter().find(|o| o.output_id == *id))
            .and_then(|o| VaultAddress::new(o.members.iter().copied(), o.threshold).ok())
        else {
            return;
        };
        for id in &ids {
            state.transition(*id, OutputState::Spent, signer_ref);
        }

        let (Some(pending), Some(request)) =
            (state.pending.remove(signer_ref), state.requests.get(signer_ref).cloned())
        else {
            return;
        };
        state.create_output(
            &pending.recipient,
            Some(&owner),
            request.asset_id,
            pending.amount,
            &[],
            request.request_id,
            request.transaction_hash,
            0,
        );
    }

    /// Clears the amount the ledger reports for a request, as it does for
    /// requests it has not priced.
    pub fn unprice(&self, signer_ref: &str) {
        if let Some(request) = self.state.lock().requests.get_mut(signer_ref) {
            request.amount = Decimal::ZERO;
        }
    }

    /// Returns an output by id.
    pub fn output(&self, output_id: Uuid) -> Option<Output> {
        self.state.lock().outputs.iter().find(|o| o.output_id == output_id).cloned()
    }

    /// Every output owned by `address`, in stream order.
    pub fn outputs_of(&self, address: &VaultAddress) -> Vec<Output> {
        let state = self.state.lock();
        let mut outputs: Vec<Output> = state
            .outputs
            .iter()
            .filter(|o| o.members == address.members() && o.threshold == address.threshold())
            .cloned()
            .collect();
        outputs.sort_by_key(|o| o.sequence);
        outputs
    }

    /// Number of accepted transactions.
    pub fn transaction_count(&self) -> usize {
        self.state.lock().transactions.len()
    }

    /// Number of submissions that took effect.
    pub fn submit_count(&self) -> usize {
        self.submit_count.load(Ordering::SeqCst)
    }

    /// Number of `list_outputs` calls served.
    pub fn list_count(&self) -> usize {
        self.list_count.load(Ordering::SeqCst)
    }

    /// Fails the next `count` calls with [`LedgerError::Unavailable`](crate::LedgerError::Unavailable).
    pub fn inject_unavailable(&self, count: usize) {
        self.unavailable_count.store(count, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        let injected = self
            .unavailable_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        ensure!(!injected, UnavailableSnafu { message: "injected failure" });
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn client_id(&self) -> UserId {
        self.client_id
    }

    async fn list_outputs(&self, query: &OutputQuery) -> Result<Vec<Output>> {
        self.check_available()?;
        self.list_count.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        let mut outputs: Vec<Output> = state
            .outputs
            .iter()
            .filter(|o| o.members == query.members && o.threshold == query.threshold)
            .filter(|o| o.sequence >= query.offset)
            .filter(|o| query.state.is_none_or(|s| o.state == s))
            .cloned()
            .collect();
        outputs.sort_by_key(|o| o.sequence);
        outputs.truncate(query.limit);
        Ok(outputs)
    }

    async fn read_spending_request(&self, signer_ref: &str) -> Result<SpendingRequest> {
        self.check_available()?;
        self.state
            .lock()
            .requests
            .get(signer_ref)
            .cloned()
            .ok_or_else(|| NotFoundSnafu { what: format!("request {signer_ref}") }.build())
    }

    async fn read_output(&self, transaction_hash: &str, index: u8) -> Result<Output> {
        self.check_available()?;
        self.state
            .lock()
            .outputs
            .iter()
            .find(|o| o.transaction_hash == transaction_hash && o.output_index == index)
            .cloned()
            .ok_or_else(|| NotFoundSnafu { what: format!("output {transaction_hash}:{index}") }.build())
    }

    async fn read_transaction(&self, request_id: Uuid) -> Result<TransactionRecord> {
        self.check_available()?;
        self.state
            .lock()
            .transactions
            .get(&request_id)
            .cloned()
            .ok_or_else(|| NotFoundSnafu { what: format!("transaction {request_id}") }.build())
    }

    async fn sign_transaction(&self, draft: &TransactionDraft) -> Result<SignedTransaction> {
        self.check_available()?;
        ensure!(!draft.inputs.is_empty(), RejectedSnafu { message: "transaction has no inputs" });

        let mut state = self.state.lock();
        for input in &draft.inputs {
            let stored = state.outputs.iter().find(|o| o.output_id == input.output_id);
            let spendable = stored.is_some_and(|o| {
                o.state == OutputState::Unspent && o.members == [self.client_id] && o.threshold == 1
            });
            ensure!(
                spendable,
                RejectedSnafu { message: format!("input {} is not spendable", input.output_id) }
            );
        }

        let mut preimage = draft.request_id.as_bytes().to_vec();
        preimage.extend_from_slice(draft.hint.as_bytes());
        preimage.extend_from_slice(&draft.memo);
        for input in &draft.inputs {
            preimage.extend_from_slice(input.output_id.as_bytes());
        }
        let signed = SignedTransaction { request_id: draft.request_id, raw: hash_hex(&preimage) };
        state.drafts.insert(draft.request_id, (draft.clone(), signed.clone()));
        Ok(signed)
    }

    async fn submit_transaction(
        &self,
        request_id: Uuid,
        transaction: &SignedTransaction,
    ) -> Result<TransactionRecord> {
        self.check_available()?;
        let mut state = self.state.lock();
        if let Some(existing) = state.transactions.get(&request_id) {
            debug!(%request_id, "Duplicate submission");
            return Ok(existing.clone());
        }

        let draft = match state.drafts.get(&request_id) {
            Some((draft, signed)) if signed == transaction => draft.clone(),
            _ => {
                return RejectedSnafu { message: format!("unknown transaction {request_id}") }
                    .fail();
            },
        };
        for input in &draft.inputs {
            let unspent = state
                .outputs
                .iter()
                .any(|o| o.output_id == input.output_id && o.state == OutputState::Unspent);
            ensure!(
                unspent,
                RejectedSnafu { message: format!("input {} already spent", input.output_id) }
            );
        }

        let transaction_hash = hash_hex(transaction.raw.as_bytes());
        let signer_ref = format!("tx-{}", request_id.simple());
        let total: Decimal = draft.inputs.iter().map(|i| i.amount).sum();
        let asset_id = draft.inputs.first().map(|i| i.asset_id).unwrap_or_default();
        for input in &draft.inputs {
            state.transition(input.output_id, OutputState::Spent, &signer_ref);
        }
        let request = SpendingRequest {
            request_id,
            created_at: state.now,
            asset_id,
            amount: total,
            transaction_hash: transaction_hash.clone(),
            extra: hex::encode(&draft.memo),
        };
        state.requests.insert(signer_ref, request);

        let service = VaultAddress::single(self.client_id);
        state.create_output(
            &service,
            Some(&service),
            asset_id,
            total,
            &draft.memo,
            request_id,
            transaction_hash.clone(),
            0,
        );

        let record = TransactionRecord { request_id, transaction_hash, created_at: state.now };
        state.transactions.insert(request_id, record.clone());
        self.submit_count.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use cowallet_test_utils::fixtures::{amount, asset, user, vault};

    use super::*;

    fn ledger() -> MockLedger {
        MockLedger::new(user(900))
    }

    #[tokio::test]
    async fn test_list_outputs_pages_by_sequence() {
        let ledger = ledger();
        let address = vault(&[1, 2], 2);
        for n in 1..=5 {
            ledger.deposit(&address, asset(1), Decimal::from(n));
        }
        ledger.deposit(&vault(&[3], 1), asset(1), amount("7"));

        let first = ledger.list_outputs(&OutputQuery::for_address(&address).limit(2)).await.unwrap();
        assert_eq!(first.len(), 2);
        let next = first[1].sequence + 1;
        let rest =
            ledger.list_outputs(&OutputQuery::for_address(&address).offset(next)).await.unwrap();
        assert_eq!(rest.len(), 3);
        assert!(rest.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[tokio::test]
    async fn test_spend_resequences_and_pays_recipient() {
        let ledger = ledger();
        let address = vault(&[1, 2], 2);
        let payee = vault(&[8], 1);
        let output = ledger.deposit(&address, asset(1), amount("100"));

        let signer_ref = ledger.sign(&[output.output_id], &payee, amount("100"));
        let signed = ledger.output(output.output_id).unwrap();
        assert_eq!(signed.state, OutputState::Signed);
        assert!(signed.sequence > output.sequence);

        ledger.spend(&signer_ref);
        let spent = ledger.output(output.output_id).unwrap();
        assert_eq!(spent.state, OutputState::Spent);
        assert!(spent.sequence > signed.sequence);

        let request = ledger.read_spending_request(&signer_ref).await.unwrap();
        let paid = ledger.read_output(&request.transaction_hash, 0).await.unwrap();
        assert_eq!(paid.amount, amount("100"));
        assert_eq!(paid.sender(), Some(address));
    }

    #[tokio::test]
    async fn test_submission_is_idempotent() {
        let ledger = ledger();
        let service = ledger.service_address();
        let funding = ledger.deposit(&service, asset(1), amount("1"));
        let request_id = Uuid::from_u128(42);

        let draft = TransactionDraft {
            request_id,
            inputs: vec![funding.clone()],
            hint: request_id,
            memo: b"relay".to_vec(),
        };
        let signed = ledger.sign_transaction(&draft).await.unwrap();
        let first = ledger.submit_transaction(request_id, &signed).await.unwrap();
        let second = ledger.submit_transaction(request_id, &signed).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger.submit_count(), 1);
        assert_eq!(ledger.read_transaction(request_id).await.unwrap(), first);

        let relay = ledger.outputs_of(&service).into_iter().last().unwrap();
        assert_eq!(relay.memo().unwrap(), b"relay");
        assert_eq!(relay.sender(), Some(service));
        assert_eq!(relay.request_id, request_id);
    }

    #[tokio::test]
    async fn test_injected_failures_are_transient() {
        let ledger = ledger();
        ledger.inject_unavailable(2);
        let query = OutputQuery::for_address(&vault(&[1], 1));
        assert!(ledger.list_outputs(&query).await.unwrap_err().is_retryable());
        assert!(ledger.list_outputs(&query).await.is_err());
        assert!(ledger.list_outputs(&query).await.is_ok());
        assert!(ledger.read_transaction(Uuid::nil()).await.unwrap_err().is_not_found());
    }
}
