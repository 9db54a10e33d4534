//! Entry points of the NOS token, as data.
//!
//! A [`TokenCall`] names one operation and its arguments; [`dispatch`] loads
//! the objects it refers to from the chain state and runs it against the
//! registry. Calls may arrive signed ([`SignedCall`]), in which case the
//! sender is derived from the signing key.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::host::{Address, ChainError, ChainState, ObjectId, TxContext};
use crate::ledger::{self, Amount, GenesisParams, Registry, TokenMetadata};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum TokenCall {
    Genesis {
        metadata: TokenMetadata,
        creator_supply: Amount,
        pool_supply: Amount,
    },
    TransferOwnership {
        new_owner: Address,
    },
    Distribute {
        recipient: Address,
        amount: Amount,
    },
    Deposit {
        coin: ObjectId,
    },
    AddMinter {
        minter: Address,
    },
    RemoveMinter {
        minter: Address,
    },
    MintFromPool {
        caller: Address,
        recipient: Address,
        amount: Amount,
    },
    Burn {
        coin: ObjectId,
    },
    Transfer {
        coin: ObjectId,
        recipient: Address,
    },
    Split {
        coin: ObjectId,
        amount: Amount,
    },
    Join {
        coin: ObjectId,
        other: ObjectId,
    },
    TransferWithFee {
        coin: ObjectId,
        recipient: Address,
    },
    BatchTransfer {
        coin: ObjectId,
        recipients: Vec<Address>,
        amounts: Vec<Amount>,
    },
    SetTransferFee {
        bps: u64,
    },
    SetFeeRecipient {
        recipient: Address,
    },
    SetPause {
        paused: bool,
        reason: String,
    },
    MintWithFee {
        caller: Address,
        recipient: Address,
        amount: Amount,
        fee_bps: u64,
        fee_recipient: Address,
    },
    TransferFromPool {
        recipient: Address,
        amount: Amount,
    },
}

impl TokenCall {
    pub fn genesis(params: GenesisParams) -> Self {
        TokenCall::Genesis {
            metadata: params.metadata,
            creator_supply: params.creator_supply,
            pool_supply: params.pool_supply,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TokenCall::Genesis { .. } => "genesis",
            TokenCall::TransferOwnership { .. } => "transfer_ownership",
            TokenCall::Distribute { .. } => "distribute",
            TokenCall::Deposit { .. } => "deposit",
            TokenCall::AddMinter { .. } => "add_minter",
            TokenCall::RemoveMinter { .. } => "remove_minter",
            TokenCall::MintFromPool { .. } => "mint_from_pool",
            TokenCall::Burn { .. } => "burn",
            TokenCall::Transfer { .. } => "transfer",
            TokenCall::Split { .. } => "split",
            TokenCall::Join { .. } => "join",
            TokenCall::TransferWithFee { .. } => "transfer_with_fee",
            TokenCall::BatchTransfer { .. } => "batch_transfer",
            TokenCall::SetTransferFee { .. } => "set_transfer_fee",
            TokenCall::SetFeeRecipient { .. } => "set_fee_recipient",
            TokenCall::SetPause { .. } => "set_pause",
            TokenCall::MintWithFee { .. } => "mint_with_fee",
            TokenCall::TransferFromPool { .. } => "transfer_from_pool",
        }
    }
}

/// Run `call` against `state`. Effects land partly in `state` and partly in
/// the context outbox; the caller is responsible for rolling `state` back
/// when this returns an error.
pub fn dispatch(state: &mut ChainState, call: &TokenCall, ctx: &mut TxContext) -> Result<(), ChainError> {
    let sender = ctx.sender();
    match call {
        TokenCall::Genesis {
            metadata,
            creator_supply,
            pool_supply,
        } => {
            if state.registry.is_some() {
                return Err(ChainError::AlreadyInitialized);
            }
            let params = GenesisParams {
                metadata: metadata.clone(),
                creator_supply: *creator_supply,
                pool_supply: *pool_supply,
            };
            let (registry, cap) = Registry::genesis(params, ctx)?;
            state.registry = Some(registry);
            state.owner_cap = Some(cap);
        }
        TokenCall::TransferOwnership { new_owner } => {
            state.cap_mut()?.transfer_ownership(*new_owner, ctx)?;
        }
        TokenCall::Distribute { recipient, amount } => {
            let (registry, cap) = state.registry_and_cap()?;
            registry.distribute(cap, *recipient, *amount, ctx)?;
        }
        TokenCall::Deposit { coin } => {
            let coin = state.take_coin(coin, &sender)?;
            let (registry, cap) = state.registry_and_cap()?;
            registry.deposit(cap, coin, ctx)?;
        }
        TokenCall::AddMinter { minter } => {
            let (registry, cap) = state.registry_and_cap()?;
            registry.add_minter(cap, *minter, ctx)?;
        }
        TokenCall::RemoveMinter { minter } => {
            let (registry, cap) = state.registry_and_cap()?;
            registry.remove_minter(cap, *minter, ctx)?;
        }
        TokenCall::MintFromPool {
            caller,
            recipient,
            amount,
        } => {
            state
                .registry_mut()?
                .mint_from_pool(*caller, *recipient, *amount, ctx)?;
        }
        TokenCall::Burn { coin } => {
            let coin = state.take_coin(coin, &sender)?;
            state.registry_mut()?.burn(coin, ctx)?;
        }
        TokenCall::Transfer { coin, recipient } => {
            let coin = state.take_coin(coin, &sender)?;
            ledger::transfer(coin, *recipient, ctx)?;
        }
        TokenCall::Split { coin, amount } => {
            let mut coin = state.take_coin(coin, &sender)?;
            ledger::split(&mut coin, *amount, ctx)?;
            ctx.transfer(coin, sender);
        }
        TokenCall::Join { coin, other } => {
            if coin == other {
                return Err(ChainError::DuplicateInput(*coin));
            }
            let mut target = state.take_coin(coin, &sender)?;
            let other = state.take_coin(other, &sender)?;
            ledger::join(&mut target, other)?;
            ctx.transfer(target, sender);
        }
        TokenCall::TransferWithFee { coin, recipient } => {
            let coin = state.take_coin(coin, &sender)?;
            state
                .registry_mut()?
                .transfer_with_fee(coin, *recipient, ctx)?;
        }
        TokenCall::BatchTransfer {
            coin,
            recipients,
            amounts,
        } => {
            let coin = state.take_coin(coin, &sender)?;
            state
                .registry_mut()?
                .batch_transfer(coin, recipients, amounts, ctx)?;
        }
        TokenCall::SetTransferFee { bps } => {
            let (registry, cap) = state.registry_and_cap()?;
            registry.set_transfer_fee(cap, *bps, ctx)?;
        }
        TokenCall::SetFeeRecipient { recipient } => {
            let (registry, cap) = state.registry_and_cap()?;
            registry.set_fee_recipient(cap, *recipient, ctx)?;
        }
        TokenCall::SetPause { paused, reason } => {
            let (registry, cap) = state.registry_and_cap()?;
            registry.set_pause(cap, *paused, reason.clone(), ctx)?;
        }
        TokenCall::MintWithFee {
            caller,
            recipient,
            amount,
            fee_bps,
            fee_recipient,
        } => {
            state.registry_mut()?.mint_with_fee(
                *caller,
                *recipient,
                *amount,
                *fee_bps,
                *fee_recipient,
                ctx,
            )?;
        }
        TokenCall::TransferFromPool { recipient, amount } => {
            state
                .registry_mut()?
                .transfer_from_pool(*recipient, *amount, ctx)?;
        }
    }
    Ok(())
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("public key is not a valid ed25519 point")]
    MalformedKey,
    #[error("malformed signature")]
    MalformedSignature,
    #[error("signature does not match the call")]
    InvalidSignature,
    #[error("call encoding failed: {0}")]
    Encoding(String),
}

/// A call authenticated by an Ed25519 key. The nonce makes otherwise
/// identical calls distinct so the chain can refuse replays.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedCall {
    pub call: TokenCall,
    pub nonce: u64,
    #[serde(with = "crate::receipts::serde_hex32")]
    pub public_key: [u8; 32],
    #[serde(with = "serde_sig")]
    pub signature: [u8; 64],
}

impl SignedCall {
    pub fn sign(call: TokenCall, nonce: u64, key: &SigningKey) -> Result<Self, SignatureError> {
        let payload = signing_payload(&call, nonce)?;
        let signature = key.sign(&payload);
        Ok(Self {
            call,
            nonce,
            public_key: key.verifying_key().to_bytes(),
            signature: signature.to_bytes(),
        })
    }

    /// Check the signature and return the address it speaks for.
    pub fn verify(&self) -> Result<Address, SignatureError> {
        let key = VerifyingKey::from_bytes(&self.public_key).map_err(|_| SignatureError::MalformedKey)?;
        let signature = Signature::from_slice(&self.signature).map_err(|_| SignatureError::MalformedSignature)?;
        let payload = signing_payload(&self.call, self.nonce)?;
        key.verify_strict(&payload, &signature)
            .map_err(|_| SignatureError::InvalidSignature)?;
        Ok(Address::from_public_key(&key))
    }

    /// Replay-protection key.
    pub fn digest(&self) -> Result<[u8; 32], SignatureError> {
        let payload = signing_payload(&self.call, self.nonce)?;
        let mut hasher = Sha256::new();
        hasher.update(&payload);
        hasher.update(self.public_key);
        Ok(hasher.finalize().into())
    }
}

fn signing_payload(call: &TokenCall, nonce: u64) -> Result<Vec<u8>, SignatureError> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"nos-call");
    buf.extend_from_slice(&nonce.to_le_bytes());
    let encoded = serde_json::to_vec(call).map_err(|e| SignatureError::Encoding(e.to_string()))?;
    buf.extend(encoded);
    Ok(buf)
}

mod serde_sig {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 64], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 64], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|b: Vec<u8>| D::Error::custom(format!("expected 64 bytes, got {}", b.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    #[test]
    fn signed_call_recovers_sender() {
        let sk = key(5);
        let call = TokenCall::SetTransferFee { bps: 100 };
        let signed = SignedCall::sign(call, 1, &sk).unwrap();
        assert_eq!(
            signed.verify().unwrap(),
            Address::from_public_key(&sk.verifying_key())
        );
    }

    #[test]
    fn tampered_call_is_rejected() {
        let sk = key(5);
        let mut signed = SignedCall::sign(TokenCall::SetTransferFee { bps: 100 }, 1, &sk).unwrap();
        signed.call = TokenCall::SetTransferFee { bps: 10_000 };
        assert_eq!(signed.verify(), Err(SignatureError::InvalidSignature));
    }

    #[test]
    fn nonce_changes_digest() {
        let sk = key(5);
        let call = TokenCall::AddMinter {
            minter: Address::new([3u8; 32]),
        };
        let a = SignedCall::sign(call.clone(), 1, &sk).unwrap();
        let b = SignedCall::sign(call, 2, &sk).unwrap();
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn signed_call_survives_json() {
        let sk = key(8);
        let signed = SignedCall::sign(
            TokenCall::BatchTransfer {
                coin: ObjectId::new([1u8; 32]),
                recipients: vec![Address::new([2u8; 32])],
                amounts: vec![10],
            },
            99,
            &sk,
        )
        .unwrap();
        let json = serde_json::to_string(&signed).unwrap();
        assert!(json.contains("\"call\":\"batch_transfer\""));
        let back: SignedCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back.verify().unwrap(), signed.verify().unwrap());
    }
}
