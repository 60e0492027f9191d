//! Wire types exchanged with the ledger.

use chrono::{DateTime, Utc};
use cowallet_types::{AssetId, UserId, VaultAddress};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputState {
    /// Spendable.
    Unspent,
    /// Part of a signed transaction that has not been confirmed yet.
    Signed,
    /// Consumed by a confirmed transaction.
    Spent,
}

/// A unit of value held by a member set.
///
/// The ledger assigns `sequence` from a global counter and reassigns it
/// whenever the output changes state, so a vault's stream is ordered by the
/// last change, not by creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Ledger-assigned output id.
    pub output_id: Uuid,
    /// Request id of the transaction that created the output.
    pub request_id: Uuid,
    /// Hash of the creating transaction.
    pub transaction_hash: String,
    /// Position within the creating transaction.
    pub output_index: u8,
    /// Asset held.
    pub asset_id: AssetId,
    /// Chain-level asset hash.
    pub chain_hash: String,
    /// Amount held.
    pub amount: Decimal,
    /// Owning members.
    pub members: Vec<UserId>,
    /// Owning threshold.
    pub threshold: u8,
    /// Members of the sending vault, empty for external deposits.
    #[serde(default)]
    pub senders: Vec<UserId>,
    /// Threshold of the sending vault.
    #[serde(default)]
    pub senders_threshold: u8,
    /// Hex-encoded memo.
    #[serde(default)]
    pub extra: String,
    /// Current state.
    pub state: OutputState,
    /// Position in the owner's stream.
    pub sequence: u64,
    /// Signer reference of the spending request, empty while unspent.
    #[serde(default)]
    pub signed_by: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
}

impl Output {
    /// Decoded memo bytes; `None` if `extra` is not valid hex.
    pub fn memo(&self) -> Option<Vec<u8>> {
        hex::decode(&self.extra).ok()
    }

    /// Address of the sending vault, if the output records one.
    pub fn sender(&self) -> Option<VaultAddress> {
        if self.senders.is_empty() {
            return None;
        }
        VaultAddress::new(self.senders.iter().copied(), self.senders_threshold).ok()
    }
}

/// Filter for [`LedgerClient::list_outputs`](crate::LedgerClient::list_outputs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputQuery {
    /// Owning members.
    pub members: Vec<UserId>,
    /// Owning threshold.
    pub threshold: u8,
    /// Lowest sequence returned.
    pub offset: u64,
    /// Maximum outputs returned.
    pub limit: usize,
    /// Restrict to one state.
    pub state: Option<OutputState>,
}

impl OutputQuery {
    /// Every output of `address`, from the start of its stream.
    pub fn for_address(address: &VaultAddress) -> Self {
        Self {
            members: address.members().to_vec(),
            threshold: address.threshold(),
            offset: 0,
            limit: 500,
            state: None,
        }
    }

    /// Starts at `offset`.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Returns at most `limit` outputs.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Returns only outputs in `state`.
    #[must_use]
    pub fn state(mut self, state: OutputState) -> Self {
        self.state = Some(state);
        self
    }
}

/// The request behind a signed or spent output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingRequest {
    /// Request id chosen by the spender.
    pub request_id: Uuid,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Asset spent.
    pub asset_id: AssetId,
    /// Amount sent to the receivers. Zero when the ledger did not price it.
    pub amount: Decimal,
    /// Hash of the spending transaction.
    pub transaction_hash: String,
    /// Hex-encoded memo.
    #[serde(default)]
    pub extra: String,
}

impl SpendingRequest {
    /// Decoded memo bytes; `None` if `extra` is not valid hex.
    pub fn memo(&self) -> Option<Vec<u8>> {
        hex::decode(&self.extra).ok()
    }
}

/// A transaction to be signed with the service's key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    /// Ledger idempotency key.
    pub request_id: Uuid,
    /// Outputs consumed.
    pub inputs: Vec<Output>,
    /// Hint carried in the transaction.
    pub hint: Uuid,
    /// Memo carried in the transaction.
    pub memo: Vec<u8>,
}

/// A signed, not yet submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Ledger idempotency key.
    pub request_id: Uuid,
    /// Hex-encoded raw transaction.
    pub raw: String,
}

/// A transaction the ledger has accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Ledger idempotency key.
    pub request_id: Uuid,
    /// Transaction hash.
    pub transaction_hash: String,
    /// Acceptance time.
    pub created_at: DateTime<Utc>,
}
