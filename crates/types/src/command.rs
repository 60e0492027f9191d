//! System commands relayed through the service's own vault.
//!
//! A command is written to the outbox as an encoded payload, submitted to the
//! ledger as the memo of a transaction back to the service itself, and applied
//! when the own-output watcher sees that transaction arrive. The payload is the
//! key codec encoding of `(action: u8, args...)`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    address::VaultAddress,
    ids::{AssetId, UserId},
    key::{KeyError, KeyPart},
};

/// Action byte for [`SystemCommand::RenewVault`].
pub const ACTION_RENEW_VAULT: u8 = 1;
/// Action byte for [`SystemCommand::AddAddress`].
pub const ACTION_ADD_ADDRESS: u8 = 2;
/// Action byte for [`SystemCommand::RemoveAddress`].
pub const ACTION_REMOVE_ADDRESS: u8 = 3;

/// A state change the service relays through the ledger before applying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemCommand {
    /// Extend a vault's subscription by `period` seconds.
    RenewVault {
        /// Vault being renewed.
        vault: VaultAddress,
        /// Seconds granted.
        period: i64,
        /// Payer reference.
        payer: String,
        /// Payment asset.
        asset: AssetId,
        /// Payment amount.
        amount: Decimal,
        /// Ledger time of the payment output; the renewal window starts here
        /// at the earliest.
        paid_at: DateTime<Utc>,
    },
    /// Add or relabel an address book entry.
    AddAddress {
        /// Owner of the address book.
        user: UserId,
        /// Vault being labelled.
        address: VaultAddress,
        /// Label.
        label: String,
    },
    /// Remove an address book entry.
    RemoveAddress {
        /// Owner of the address book.
        user: UserId,
        /// Vault being removed.
        address: VaultAddress,
    },
}

impl SystemCommand {
    /// The action byte written at the front of the payload.
    pub const fn action(&self) -> u8 {
        match self {
            Self::RenewVault { .. } => ACTION_RENEW_VAULT,
            Self::AddAddress { .. } => ACTION_ADD_ADDRESS,
            Self::RemoveAddress { .. } => ACTION_REMOVE_ADDRESS,
        }
    }

    /// Encodes the command as an outbox payload.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if a field cannot be encoded.
    pub fn encode(&self) -> Result<Vec<u8>, KeyError> {
        let mut out = Vec::with_capacity(64);
        self.encode_part(&mut out)?;
        Ok(out)
    }

    /// Decodes a payload received from the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] for unknown actions, malformed arguments, or
    /// trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, KeyError> {
        let mut input = bytes;
        let command = Self::decode_part(&mut input)?;
        if !input.is_empty() {
            return Err(KeyError::TrailingBytes { count: input.len() });
        }
        Ok(command)
    }
}

impl KeyPart for SystemCommand {
    fn encode_part(&self, out: &mut Vec<u8>) -> Result<(), KeyError> {
        self.action().encode_part(out)?;
        match self {
            Self::RenewVault { vault, period, payer, asset, amount, paid_at } => {
                (vault.clone(), *period, payer.clone(), *asset, *amount, *paid_at).encode_part(out)
            },
            Self::AddAddress { user, address, label } => {
                (*user, address.clone(), label.clone()).encode_part(out)
            },
            Self::RemoveAddress { user, address } => (*user, address.clone()).encode_part(out),
        }
    }

    fn decode_part(input: &mut &[u8]) -> Result<Self, KeyError> {
        match u8::decode_part(input)? {
            ACTION_RENEW_VAULT => {
                let (vault, period, payer, asset, amount, paid_at) = KeyPart::decode_part(input)?;
                Ok(Self::RenewVault { vault, period, payer, asset, amount, paid_at })
            },
            ACTION_ADD_ADDRESS => {
                let (user, address, label) = KeyPart::decode_part(input)?;
                Ok(Self::AddAddress { user, address, label })
            },
            ACTION_REMOVE_ADDRESS => {
                let (user, address) = KeyPart::decode_part(input)?;
                Ok(Self::RemoveAddress { user, address })
            },
            other => Err(KeyError::InvalidValue {
                what: "command action",
                message: format!("unknown action {other}"),
            }),
        }
    }
}
