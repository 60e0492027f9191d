//! Vault addresses: a sorted member set plus a signing threshold.
//!
//! The textual form is `MIX` followed by base58 of
//! `version | threshold | member count | member UUIDs | checksum`, where the
//! checksum is the first four bytes of SHA-256 over everything before it.

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use snafu::{Snafu, ensure};
use uuid::Uuid;

use crate::{
    ids::{UserId, VAULT_ID_LENGTH, VaultId},
    key::{KeyError, KeyPart},
};

/// Prefix of the textual address form.
pub const ADDRESS_PREFIX: &str = "MIX";

/// Maximum number of members in a vault.
pub const MAX_MEMBERS: usize = 64;

const ADDRESS_VERSION: u8 = 2;
const CHECKSUM_LENGTH: usize = 4;

/// Vault address validation and parsing errors.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum AddressError {
    /// Member set is empty or larger than [`MAX_MEMBERS`].
    #[snafu(display("vault must have 1..={MAX_MEMBERS} members, got {count}"))]
    MemberCount {
        /// Number of members supplied.
        count: usize,
    },

    /// The same user appears twice in the member set.
    #[snafu(display("duplicate vault member {member}"))]
    DuplicateMember {
        /// The repeated member.
        member: UserId,
    },

    /// Threshold is zero or larger than the member count.
    #[snafu(display("threshold {threshold} is invalid for {members} members"))]
    InvalidThreshold {
        /// Threshold supplied.
        threshold: u8,
        /// Number of members.
        members: usize,
    },

    /// Textual address could not be parsed.
    #[snafu(display("malformed vault address: {message}"))]
    Malformed {
        /// Description of the problem.
        message: String,
    },
}

/// A validated (members, threshold) pair identifying a vault.
///
/// Members are kept sorted and unique, so two addresses built from the same
/// set in any order compare equal and share a [`VaultId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VaultAddress {
    members: Vec<UserId>,
    threshold: u8,
}

impl VaultAddress {
    /// Builds and validates an address.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] if the member set is empty, too large, has
    /// duplicates, or the threshold is outside `1..=members`.
    pub fn new(
        members: impl IntoIterator<Item = UserId>,
        threshold: u8,
    ) -> Result<Self, AddressError> {
        let members: Vec<UserId> = members.into_iter().collect();
        let count = members.len();
        ensure!((1..=MAX_MEMBERS).contains(&count), MemberCountSnafu { count });

        let mut seen = BTreeSet::new();
        for member in &members {
            ensure!(seen.insert(*member), DuplicateMemberSnafu { member: *member });
        }
        ensure!(
            threshold >= 1 && usize::from(threshold) <= count,
            InvalidThresholdSnafu { threshold, members: count }
        );

        Ok(Self { members: seen.into_iter().collect(), threshold })
    }

    /// Address of a single-member, threshold-1 vault.
    pub fn single(user: UserId) -> Self {
        Self { members: vec![user], threshold: 1 }
    }

    /// Sorted, unique members.
    pub fn members(&self) -> &[UserId] {
        &self.members
    }

    /// Signing threshold.
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Whether `user` is one of the members.
    pub fn contains(&self, user: UserId) -> bool {
        self.members.binary_search(&user).is_ok()
    }

    /// Stable digest of the sorted members and threshold.
    pub fn vault_id(&self) -> VaultId {
        let mut hasher = Sha256::new();
        for member in &self.members {
            hasher.update(member.to_string().as_bytes());
        }
        hasher.update([self.threshold]);
        let mut bytes = [0u8; VAULT_ID_LENGTH];
        bytes.copy_from_slice(&hasher.finalize());
        VaultId::new(bytes)
    }

    fn to_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(3 + self.members.len() * 16 + CHECKSUM_LENGTH);
        payload.push(ADDRESS_VERSION);
        payload.push(self.threshold);
        // MAX_MEMBERS fits in a byte.
        payload.push(self.members.len() as u8);
        for member in &self.members {
            payload.extend_from_slice(member.as_bytes());
        }
        let checksum = Sha256::digest(&payload);
        payload.extend_from_slice(&checksum[..CHECKSUM_LENGTH]);
        payload
    }

    fn from_payload(payload: &[u8]) -> Result<Self, AddressError> {
        let malformed = |message: &str| AddressError::Malformed { message: message.to_string() };

        ensure!(payload.len() > 3 + CHECKSUM_LENGTH, MalformedSnafu { message: "too short" });
        let (body, checksum) = payload.split_at(payload.len() - CHECKSUM_LENGTH);
        if Sha256::digest(body)[..CHECKSUM_LENGTH] != *checksum {
            return Err(malformed("checksum mismatch"));
        }
        if body[0] != ADDRESS_VERSION {
            return Err(malformed("unsupported version"));
        }
        let threshold = body[1];
        let count = usize::from(body[2]);
        let members = &body[3..];
        if members.len() != count * 16 {
            return Err(malformed("member count does not match length"));
        }

        let members = members.chunks_exact(16).map(|chunk| {
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(chunk);
            UserId::new(Uuid::from_bytes(bytes))
        });
        Self::new(members, threshold)
    }
}

impl fmt::Display for VaultAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ADDRESS_PREFIX}{}", bs58::encode(self.to_payload()).into_string())
    }
}

impl FromStr for VaultAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or_else(|| AddressError::Malformed { message: "missing MIX prefix".to_string() })?;
        let payload = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| AddressError::Malformed { message: e.to_string() })?;
        Self::from_payload(&payload)
    }
}

impl Serialize for VaultAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VaultAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl KeyPart for VaultAddress {
    fn encode_part(&self, out: &mut Vec<u8>) -> Result<(), KeyError> {
        self.threshold.encode_part(out)?;
        self.members.encode_part(out)
    }

    fn decode_part(input: &mut &[u8]) -> Result<Self, KeyError> {
        let threshold = u8::decode_part(input)?;
        let members = Vec::<UserId>::decode_part(input)?;
        Self::new(members, threshold)
            .map_err(|e| KeyError::InvalidValue { what: "vault address", message: e.to_string() })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::key::{decode_values, encode_values};

    fn user(n: u128) -> UserId {
        UserId::new(Uuid::from_u128(n))
    }

    #[test]
    fn test_members_are_sorted_and_order_independent() {
        let a = VaultAddress::new([user(3), user(1), user(2)], 2).unwrap();
        let b = VaultAddress::new([user(1), user(2), user(3)], 2).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.vault_id(), b.vault_id());
        assert_eq!(a.members(), &[user(1), user(2), user(3)]);
    }

    #[test]
    fn test_threshold_changes_vault_id() {
        let a = VaultAddress::new([user(1), user(2)], 1).unwrap();
        let b = VaultAddress::new([user(1), user(2)], 2).unwrap();
        assert_ne!(a.vault_id(), b.vault_id());
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(VaultAddress::new([], 1).unwrap_err(), AddressError::MemberCount { count: 0 });
        assert_eq!(
            VaultAddress::new([user(1), user(1)], 1).unwrap_err(),
            AddressError::DuplicateMember { member: user(1) }
        );
        assert_eq!(
            VaultAddress::new([user(1), user(2)], 3).unwrap_err(),
            AddressError::InvalidThreshold { threshold: 3, members: 2 }
        );
        assert!(VaultAddress::new([user(1)], 0).is_err());
        assert!(VaultAddress::new((0..65).map(user), 1).is_err());
    }

    #[test]
    fn test_text_round_trip() {
        let address = VaultAddress::new([user(10), user(20)], 2).unwrap();
        let text = address.to_string();
        assert!(text.starts_with("MIX"));
        assert_eq!(text.parse::<VaultAddress>().unwrap(), address);
    }

    #[test]
    fn test_parse_rejects_corrupted_checksum() {
        let address = VaultAddress::single(user(7));
        let mut payload = address.to_payload();
        let last = payload.len() - 1;
        payload[last] ^= 0xff;
        let text = format!("MIX{}", bs58::encode(payload).into_string());
        assert!(matches!(text.parse::<VaultAddress>(), Err(AddressError::Malformed { .. })));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<VaultAddress>().is_err());
        assert!("MIX".parse::<VaultAddress>().is_err());
        assert!("MIX0OIl".parse::<VaultAddress>().is_err());
        assert!("XIM2abc".parse::<VaultAddress>().is_err());
    }

    #[test]
    fn test_key_payload_round_trip_revalidates() {
        let address = VaultAddress::new([user(1), user(2)], 1).unwrap();
        let bytes = encode_values(&(address.clone(),)).unwrap();
        let (decoded,): (VaultAddress,) = decode_values(&bytes).unwrap();
        assert_eq!(decoded, address);

        // Threshold above member count is rejected on decode.
        let mut bad = bytes.clone();
        bad[0] = 9;
        assert!(decode_values::<(VaultAddress,)>(&bad).is_err());
    }
}
