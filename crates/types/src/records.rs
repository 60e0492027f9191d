//! Stored entity records.
//!
//! Each record lives under its own key family and serializes through
//! [`encode_record`](crate::encode_record) with a version envelope.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    address::{AddressError, VaultAddress},
    codec::Record,
    ids::{AssetId, UserId},
};

/// Per-asset totals derived from a vault's live outputs.
///
/// Recomputed from scratch on every sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset identifier.
    pub id: AssetId,
    /// Chain-level asset hash as reported by the ledger.
    pub chain_hash: String,
    /// Unspent plus signed amount.
    pub balance: Decimal,
    /// Amount in unspent outputs.
    pub unspent: Decimal,
    /// Amount locked in signed, not yet spent outputs.
    pub signed: Decimal,
    /// Signer references of in-flight spends, in first-seen order.
    #[serde(default)]
    pub requests: Vec<String>,
}

impl Asset {
    /// An asset with all totals at zero.
    pub fn empty(id: AssetId, chain_hash: impl Into<String>) -> Self {
        Self {
            id,
            chain_hash: chain_hash.into(),
            balance: Decimal::ZERO,
            unspent: Decimal::ZERO,
            signed: Decimal::ZERO,
            requests: Vec::new(),
        }
    }
}

/// Canonical per-vault state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    /// Sorted members.
    pub members: Vec<UserId>,
    /// Signing threshold.
    pub threshold: u8,
    /// Next unconsumed position in the vault's output stream.
    pub offset: u64,
    /// Current per-asset totals, ordered by asset id.
    #[serde(default)]
    pub assets: Vec<Asset>,
    /// Time of the last merge that changed this record.
    pub updated_at: DateTime<Utc>,
}

impl Vault {
    /// The zero-value vault: offset 0, no assets, never updated.
    pub fn empty(address: &VaultAddress) -> Self {
        Self {
            members: address.members().to_vec(),
            threshold: address.threshold(),
            offset: 0,
            assets: Vec::new(),
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Rebuilds the address from the stored members and threshold.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] if the stored record is inconsistent.
    pub fn address(&self) -> Result<VaultAddress, AddressError> {
        VaultAddress::new(self.members.iter().copied(), self.threshold)
    }

    /// Looks up an asset by id.
    pub fn asset(&self, id: AssetId) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.id == id)
    }
}

impl Record for Vault {
    const KIND: &'static str = "vault";
}

/// An immutable movement of value into (positive) or out of (negative) a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Ledger-assigned identifier.
    pub id: Uuid,
    /// Ledger time of the movement.
    pub created_at: DateTime<Utc>,
    /// Asset moved.
    pub asset_id: AssetId,
    /// Signed amount.
    pub amount: Decimal,
    /// Counterparty address, empty when unknown.
    #[serde(default)]
    pub opponent: String,
    /// Memo attached to the transaction.
    #[serde(default)]
    pub memo: String,
    /// Ledger transaction hash.
    pub transaction_hash: String,
    /// Output index within the transaction.
    pub output_index: u8,
}

impl Record for Snapshot {
    const KIND: &'static str = "snapshot";
}

/// A subscription-extending payment and the window it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renew {
    /// Identifier (the relayed command's request id).
    pub id: Uuid,
    /// Ledger sequence at which the renewal was observed.
    pub sequence: u64,
    /// Ledger time of the relayed command.
    pub created_at: DateTime<Utc>,
    /// Members of the renewed vault.
    pub members: Vec<UserId>,
    /// Threshold of the renewed vault.
    pub threshold: u8,
    /// Payer reference.
    pub sender: String,
    /// Payment asset.
    pub asset: AssetId,
    /// Payment amount.
    pub amount: Decimal,
    /// Seconds granted.
    pub period: i64,
    /// Start of the granted window.
    pub from: DateTime<Utc>,
    /// End of the granted window; the vault's expiry.
    pub to: DateTime<Utc>,
}

impl Record for Renew {
    const KIND: &'static str = "renew";
}

/// A pending sync request for one vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Time of the latest enqueue.
    pub created_at: DateTime<Utc>,
    /// User whose request scheduled the job.
    pub user: UserId,
    /// Members of the vault to sync.
    pub members: Vec<UserId>,
    /// Threshold of the vault to sync.
    pub threshold: u8,
}

impl Job {
    /// Rebuilds the target vault address.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] if the stored record is inconsistent.
    pub fn address(&self) -> Result<VaultAddress, AddressError> {
        VaultAddress::new(self.members.iter().copied(), self.threshold)
    }
}

impl Record for Job {
    const KIND: &'static str = "job";
}

/// An outbound action awaiting submission to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Position in the outbox; entries drain in ascending order.
    pub seq: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Ledger idempotency key for the submission.
    pub trace_id: Uuid,
    /// Encoded [`SystemCommand`](crate::SystemCommand).
    #[serde(with = "hex::serde")]
    pub payload: Vec<u8>,
}

impl Record for Log {
    const KIND: &'static str = "log";
}

/// A user's label for a vault in their address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Owner of the address book entry.
    pub user_id: UserId,
    /// Members of the labelled vault.
    pub members: Vec<UserId>,
    /// Threshold of the labelled vault.
    pub threshold: u8,
    /// User-chosen label.
    pub label: String,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl Record for Address {
    const KIND: &'static str = "address";
}

/// A user's display name for a vault they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remark {
    /// Owner of the remark.
    pub user_id: UserId,
    /// Members of the named vault.
    pub members: Vec<UserId>,
    /// Threshold of the named vault.
    pub threshold: u8,
    /// Display name.
    pub name: String,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl Record for Remark {
    const KIND: &'static str = "remark";
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::codec::{decode_record, encode_record};

    fn address() -> VaultAddress {
        VaultAddress::new([UserId::new(Uuid::from_u128(1)), UserId::new(Uuid::from_u128(2))], 2)
            .unwrap()
    }

    #[test]
    fn test_empty_vault_is_zero_value() {
        let vault = Vault::empty(&address());
        assert_eq!(vault.offset, 0);
        assert!(vault.assets.is_empty());
        assert_eq!(vault.address().unwrap(), address());
    }

    #[test]
    fn test_amounts_serialize_as_strings() {
        let mut asset = Asset::empty(AssetId::new(Uuid::from_u128(9)), "hash");
        asset.balance = "100.5".parse().unwrap();
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["balance"], "100.5");
    }

    #[test]
    fn test_vault_without_assets_field_decodes() {
        let vault = Vault::empty(&address());
        let mut json = serde_json::to_value(&vault).unwrap();
        json.as_object_mut().unwrap().remove("assets");
        json.as_object_mut().unwrap().insert("v".into(), 1.into());
        let decoded: Vault = decode_record(&serde_json::to_vec(&json).unwrap()).unwrap();
        assert_eq!(decoded, vault);
    }

    #[test]
    fn test_log_payload_is_hex() {
        let log = Log {
            seq: 1,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            trace_id: Uuid::nil(),
            payload: vec![0x01, 0xab],
        };
        let bytes = encode_record(&log).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["payload"], "01ab");
        assert_eq!(decode_record::<Log>(&bytes).unwrap(), log);
    }
}
