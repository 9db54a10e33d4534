use std::{fmt, str::FromStr};

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Scheme flag prepended to an Ed25519 public key before hashing it into an address.
const ED25519_FLAG: u8 = 0x00;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseIdError {
    #[error("invalid hex: {0}")]
    Hex(String),
    #[error("expected 32 bytes, got {0}")]
    Length(usize),
}

fn parse_hex32(s: &str) -> Result<[u8; 32], ParseIdError> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| ParseIdError::Hex(format!("{e}")))?;
    if bytes.len() != 32 {
        return Err(ParseIdError::Length(bytes.len()));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

// Both identifiers travel as `0x`-prefixed hex in JSON and on the command line.
macro_rules! hex_id {
    ($name:ident) => {
        impl $name {
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_hex32(s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Account address. The all-zero value is the null address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 32]);

hex_id!(Address);

impl Address {
    pub const ZERO: Address = Address([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// SHA-256(flag || public key).
    pub fn from_public_key(pk: &VerifyingKey) -> Self {
        let mut hasher = Sha256::new();
        hasher.update([ED25519_FLAG]);
        hasher.update(pk.as_bytes());
        Address(hasher.finalize().into())
    }
}

/// Identity of an object (coin or capability) held by the chain.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 32]);

hex_id!(ObjectId);

impl ObjectId {
    /// Object ids are derived from the creating transaction digest and a per-transaction counter.
    pub fn derive(tx_digest: &[u8; 32], index: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"object");
        hasher.update(tx_digest);
        hasher.update(index.to_le_bytes());
        ObjectId(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    #[test]
    fn address_hex_round_trips_with_and_without_prefix() {
        let addr = Address::new([0xab; 32]);
        let text = addr.to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(text.parse::<Address>().unwrap(), addr);
        assert_eq!(text[2..].parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn rejects_short_and_malformed_input() {
        assert_eq!("0x1234".parse::<Address>(), Err(ParseIdError::Length(2)));
        assert!(matches!("zz".parse::<Address>(), Err(ParseIdError::Hex(_))));
    }

    #[test]
    fn derived_address_is_stable_and_non_zero() {
        let sk = SigningKey::from_bytes(&[7u8; 32]);
        let a = Address::from_public_key(&sk.verifying_key());
        let b = Address::from_public_key(&sk.verifying_key());
        assert_eq!(a, b);
        assert!(!a.is_zero());
        assert!(Address::ZERO.is_zero());
    }

    #[test]
    fn object_ids_differ_per_index() {
        let digest = [3u8; 32];
        assert_ne!(ObjectId::derive(&digest, 0), ObjectId::derive(&digest, 1));
    }

    #[test]
    fn serializes_as_hex_string() {
        let addr = Address::new([1u8; 32]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{addr}\""));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
