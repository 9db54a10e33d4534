use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::events::TokenEvent;
use crate::host::{Address, ObjectId};
use crate::ledger::ErrorKind;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TxStatus {
    Success,
    Failure {
        /// Abort class for ledger failures; host-level failures carry none.
        kind: Option<ErrorKind>,
        reason: String,
    },
}

impl TxStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TxStatus::Success)
    }

    fn commitment(&self) -> Vec<u8> {
        match self {
            TxStatus::Success => b"success".to_vec(),
            TxStatus::Failure { kind, reason } => {
                let mut buf = Vec::new();
                buf.extend_from_slice(b"failure");
                if let Some(kind) = kind {
                    buf.extend_from_slice(&kind.code().to_le_bytes());
                }
                buf.extend_from_slice(reason.as_bytes());
                buf
            }
        }
    }
}

/// Outcome of one submitted call. Receipts form a hash chain through `previous`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxReceipt {
    pub sequence: u64,
    #[serde(with = "serde_hex32")]
    pub digest: [u8; 32],
    pub sender: Address,
    pub call: String,
    pub status: TxStatus,
    pub events: Vec<TokenEvent>,
    pub created: Vec<ObjectId>,
    #[serde(with = "serde_hex32")]
    pub state_root: [u8; 32],
    #[serde(with = "serde_hex32::option")]
    pub previous: Option<[u8; 32]>,
}

impl TxReceipt {
    /// Hash binding the receipt to its predecessor.
    pub fn commitment(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.sequence.to_le_bytes());
        hasher.update(self.digest);
        hasher.update(self.sender.as_bytes());
        hasher.update(self.call.as_bytes());
        hasher.update(self.status.commitment());
        hasher.update((self.events.len() as u64).to_le_bytes());
        for event in &self.events {
            // TokenEvent only holds strings, integers and addresses; encoding cannot fail.
            if let Ok(bytes) = serde_json::to_vec(event) {
                hasher.update(bytes);
            }
        }
        for id in &self.created {
            hasher.update(id.as_bytes());
        }
        hasher.update(self.state_root);
        if let Some(prev) = &self.previous {
            hasher.update(prev);
        }
        hasher.finalize().into()
    }
}

/// Digest identifying a transaction: sequence, sender and the call's JSON encoding.
pub fn tx_digest(sequence: u64, sender: &Address, call_json: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"tx");
    hasher.update(sequence.to_le_bytes());
    hasher.update(sender.as_bytes());
    hasher.update(call_json);
    hasher.finalize().into()
}

/// Check that every receipt commits to the one before it.
pub fn verify_chain(receipts: &[TxReceipt]) -> Result<(), u64> {
    let mut previous = None;
    for receipt in receipts {
        if receipt.previous != previous {
            return Err(receipt.sequence);
        }
        previous = Some(receipt.commitment());
    }
    Ok(())
}

pub(crate) mod serde_hex32 {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|b: Vec<u8>| D::Error::custom(format!("expected 32 bytes, got {}", b.len())))
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(value: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(bytes) => super::serialize(bytes, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
        where
            D: Deserializer<'de>,
        {
            #[derive(Deserialize)]
            struct Wrapper(#[serde(with = "super")] [u8; 32]);

            let wrapped: Option<Wrapper> = Option::deserialize(deserializer)?;
            Ok(wrapped.map(|Wrapper(bytes)| bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(sequence: u64, previous: Option<[u8; 32]>) -> TxReceipt {
        TxReceipt {
            sequence,
            digest: [sequence as u8; 32],
            sender: Address::new([1u8; 32]),
            call: "burn".into(),
            status: TxStatus::Success,
            events: vec![TokenEvent::Burned {
                from: Address::new([1u8; 32]),
                amount: 5,
            }],
            created: vec![],
            state_root: [7u8; 32],
            previous,
        }
    }

    #[test]
    fn commitment_changes_with_status() {
        let ok = receipt(0, None);
        let mut failed = ok.clone();
        failed.status = TxStatus::Failure {
            kind: Some(ErrorKind::NotOwner),
            reason: "nope".into(),
        };
        assert_ne!(ok.commitment(), failed.commitment());
    }

    #[test]
    fn hash_chain_detects_a_broken_link() {
        let first = receipt(0, None);
        let second = receipt(1, Some(first.commitment()));
        let third = receipt(2, Some([0u8; 32]));
        assert_eq!(verify_chain(&[first.clone(), second.clone()]), Ok(()));
        assert_eq!(verify_chain(&[first, second, third]), Err(2));
    }

    #[test]
    fn receipt_json_uses_hex_digests() {
        let r = receipt(3, Some([0xaa; 32]));
        let value = serde_json::to_value(&r).unwrap();
        assert_eq!(value["digest"], hex::encode([3u8; 32]));
        assert_eq!(value["previous"], hex::encode([0xaa; 32]));
        let back: TxReceipt = serde_json::from_value(value).unwrap();
        assert_eq!(back, r);

        let genesis = receipt(0, None);
        let value = serde_json::to_value(&genesis).unwrap();
        assert!(value["previous"].is_null());
        let back: TxReceipt = serde_json::from_value(value).unwrap();
        assert_eq!(back.previous, None);
    }

    #[test]
    fn digest_depends_on_sender() {
        let a = tx_digest(0, &Address::new([1u8; 32]), b"{}");
        let b = tx_digest(0, &Address::new([2u8; 32]), b"{}");
        assert_ne!(a, b);
    }
}
