//! Identifier types.
//!
//! Users and assets are identified by UUIDs issued by the ledger. Vaults are
//! identified by a SHA-256 digest of their member set and threshold, see
//! [`VaultAddress::vault_id`](crate::VaultAddress::vault_id).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] for type-safe identifiers.
///
/// Each generated type provides:
/// - Standard derives: Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord
/// - Serde with `#[serde(transparent)]` so the wire form is the plain UUID string
/// - `From<Uuid>` and `Into<Uuid>` conversions
/// - `Display` and `FromStr` in hyphenated UUID form
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new identifier from a raw UUID.
            #[inline]
            pub const fn new(value: Uuid) -> Self {
                Self(value)
            }

            /// Returns the raw UUID.
            #[inline]
            pub const fn value(self) -> Uuid {
                self.0
            }

            /// Returns the raw UUID bytes.
            #[inline]
            pub const fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl From<Uuid> for $name {
            #[inline]
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                s.parse::<Uuid>().map(Self)
            }
        }
    };
}

define_uuid_id!(
    /// Identifier of a ledger user (wallet member, payer, or the service itself).
    UserId
);

define_uuid_id!(
    /// Identifier of a ledger asset.
    AssetId
);

/// Length of a [`VaultId`] in bytes.
pub const VAULT_ID_LENGTH: usize = 32;

/// Stable digest identifying a vault by its member set and threshold.
///
/// Serializes as a lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VaultId([u8; VAULT_ID_LENGTH]);

impl VaultId {
    /// Creates a vault identifier from raw digest bytes.
    #[inline]
    pub const fn new(bytes: [u8; VAULT_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; VAULT_ID_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VaultId({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl std::str::FromStr for VaultId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; VAULT_ID_LENGTH];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for VaultId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VaultId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_display_is_plain_uuid() {
        let raw = Uuid::parse_str("3c1f0b2a-7d4e-4c55-9b1f-2f6f7a4e9d10").unwrap();
        let id = UserId::new(raw);
        assert_eq!(id.to_string(), "3c1f0b2a-7d4e-4c55-9b1f-2f6f7a4e9d10");
        assert_eq!(id.to_string().parse::<UserId>().unwrap(), id);
    }

    #[test]
    fn test_asset_id_serializes_transparently() {
        let raw = Uuid::parse_str("965e5c6e-434c-3fa9-b780-c50f43cd955c").unwrap();
        let json = serde_json::to_string(&AssetId::new(raw)).unwrap();
        assert_eq!(json, "\"965e5c6e-434c-3fa9-b780-c50f43cd955c\"");
    }

    #[test]
    fn test_vault_id_hex_round_trip() {
        let id = VaultId::new([0xab; VAULT_ID_LENGTH]);
        let text = id.to_string();
        assert_eq!(text.len(), 64);
        assert_eq!(text.parse::<VaultId>().unwrap(), id);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(serde_json::from_str::<VaultId>(&json).unwrap(), id);
    }

    #[test]
    fn test_vault_id_rejects_short_hex() {
        assert!("abcd".parse::<VaultId>().is_err());
    }
}
