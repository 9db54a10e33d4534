use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::contracts::{self, SignatureError, SignedCall, TokenCall};
use crate::events::{EventRecord, TokenEvent};
use crate::host::{Address, Coin, ObjectId, TxContext, TxEffects};
use crate::ledger::{Amount, GenesisParams, LedgerError, OwnerCap, Registry};
use crate::receipts::{tx_digest, TxReceipt, TxStatus};

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("token has not been initialized")]
    NotInitialized,
    #[error("token is already initialized")]
    AlreadyInitialized,
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),
    #[error("object {id} is owned by {owner}, not {sender}")]
    NotObjectOwner {
        id: ObjectId,
        owner: Address,
        sender: Address,
    },
    #[error("object {0} passed more than once")]
    DuplicateInput(ObjectId),
    #[error("call was already executed")]
    DuplicateCall,
    #[error("signature rejected: {0}")]
    Signature(#[from] SignatureError),
    #[error("supply conservation violated: coins and pool hold {held}, circulating supply is {circulating}")]
    ConservationViolated { held: u128, circulating: u128 },
    #[error("corrupt chain state: {0}")]
    CorruptState(String),
    #[error("chain lock poisoned")]
    LockPoisoned,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnedCoin {
    pub owner: Address,
    pub coin: Coin,
}

/// Objects a transaction can touch. Cloned before every call and restored
/// if the call fails.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChainState {
    pub(crate) registry: Option<Registry>,
    pub(crate) owner_cap: Option<OwnerCap>,
    pub(crate) coins: BTreeMap<ObjectId, OwnedCoin>,
}

impl ChainState {
    /// Remove a coin from the store so a call can consume it.
    pub(crate) fn take_coin(&mut self, id: &ObjectId, sender: &Address) -> Result<Coin, ChainError> {
        let owned = self.coins.get(id).ok_or(ChainError::ObjectNotFound(*id))?;
        if owned.owner != *sender {
            return Err(ChainError::NotObjectOwner {
                id: *id,
                owner: owned.owner,
                sender: *sender,
            });
        }
        self.coins
            .remove(id)
            .map(|owned| owned.coin)
            .ok_or(ChainError::ObjectNotFound(*id))
    }

    pub(crate) fn registry_mut(&mut self) -> Result<&mut Registry, ChainError> {
        self.registry.as_mut().ok_or(ChainError::NotInitialized)
    }

    pub(crate) fn cap_mut(&mut self) -> Result<&mut OwnerCap, ChainError> {
        self.owner_cap.as_mut().ok_or(ChainError::NotInitialized)
    }

    pub(crate) fn registry_and_cap(&mut self) -> Result<(&mut Registry, &OwnerCap), ChainError> {
        match (self.registry.as_mut(), self.owner_cap.as_ref()) {
            (Some(registry), Some(cap)) => Ok((registry, cap)),
            _ => Err(ChainError::NotInitialized),
        }
    }
}

/// In-memory host for the token: owns coins by address, applies each call
/// all-or-nothing, and keeps the event log and receipt chain.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Chain {
    state: ChainState,
    events: Vec<EventRecord>,
    receipts: Vec<TxReceipt>,
    seen_calls: BTreeSet<String>,
    next_sequence: u64,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn genesis(&mut self, creator: Address, params: GenesisParams) -> Result<TxReceipt, ChainError> {
        self.submit(creator, TokenCall::genesis(params))
    }

    /// Verify the signature, refuse replays, then execute as the signer.
    pub fn submit_signed(&mut self, signed: &SignedCall) -> Result<TxReceipt, ChainError> {
        let sender = signed.verify()?;
        let key = hex::encode(signed.digest()?);
        if self.seen_calls.contains(&key) {
            return Err(ChainError::DuplicateCall);
        }
        let receipt = self.submit(sender, signed.call.clone())?;
        self.seen_calls.insert(key);
        Ok(receipt)
    }

    /// Execute `call` on behalf of `sender`. On any failure the object state
    /// is restored to what it was before the call and a failure receipt is
    /// recorded.
    pub fn submit(&mut self, sender: Address, call: TokenCall) -> Result<TxReceipt, ChainError> {
        let call_json = serde_json::to_vec(&call)?;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let digest = tx_digest(sequence, &sender, &call_json);

        let snapshot = self.state.clone();
        let mut ctx = TxContext::new(sender, digest);
        let outcome = contracts::dispatch(&mut self.state, &call, &mut ctx)
            .and_then(|()| self.apply_effects(ctx.into_effects()));

        match outcome {
            Ok(effects) => {
                for (index, event) in effects.events.iter().enumerate() {
                    debug!(sequence, index, event = event.name(), "event");
                    self.events.push(EventRecord {
                        tx_sequence: sequence,
                        index: index as u32,
                        event: event.clone(),
                    });
                }
                info!(sequence, call = call.name(), %sender, events = effects.events.len(), "committed");
                Ok(self.seal(
                    sequence,
                    digest,
                    sender,
                    &call,
                    TxStatus::Success,
                    effects.events,
                    effects.created,
                ))
            }
            Err(err) => {
                self.state = snapshot;
                warn!(sequence, call = call.name(), %sender, error = %err, "aborted");
                let kind = match &err {
                    ChainError::Ledger(e) => Some(e.kind()),
                    _ => None,
                };
                self.seal(
                    sequence,
                    digest,
                    sender,
                    &call,
                    TxStatus::Failure {
                        kind,
                        reason: err.to_string(),
                    },
                    Vec::new(),
                    Vec::new(),
                );
                Err(err)
            }
        }
    }

    fn apply_effects(&mut self, mut effects: TxEffects) -> Result<TxEffects, ChainError> {
        for (owner, coin) in effects.transfers.drain(..) {
            self.state.coins.insert(coin.id(), OwnedCoin { owner, coin });
        }
        self.check_conservation()?;
        Ok(effects)
    }

    fn seal(
        &mut self,
        sequence: u64,
        digest: [u8; 32],
        sender: Address,
        call: &TokenCall,
        status: TxStatus,
        events: Vec<TokenEvent>,
        created: Vec<ObjectId>,
    ) -> TxReceipt {
        let receipt = TxReceipt {
            sequence,
            digest,
            sender,
            call: call.name().to_string(),
            status,
            events,
            created,
            state_root: self.state_root(),
            previous: self.receipts.last().map(TxReceipt::commitment),
        };
        self.receipts.push(receipt.clone());
        receipt
    }

    // ---------------------------------------------------------------------
    // queries
    // ---------------------------------------------------------------------

    pub fn is_initialized(&self) -> bool {
        self.state.registry.is_some()
    }

    pub fn registry(&self) -> Result<&Registry, ChainError> {
        self.state.registry.as_ref().ok_or(ChainError::NotInitialized)
    }

    pub fn owner_cap(&self) -> Result<&OwnerCap, ChainError> {
        self.state.owner_cap.as_ref().ok_or(ChainError::NotInitialized)
    }

    pub fn coin(&self, id: &ObjectId) -> Option<&OwnedCoin> {
        self.state.coins.get(id)
    }

    pub fn coins_of<'a>(&'a self, owner: &'a Address) -> impl Iterator<Item = &'a Coin> + 'a {
        self.state
            .coins
            .values()
            .filter(move |owned| owned.owner == *owner)
            .map(|owned| &owned.coin)
    }

    pub fn balance_of(&self, owner: &Address) -> Amount {
        // bounded by the total supply, which fits in u64
        self.coins_of(owner).map(Coin::value).sum()
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn receipts(&self) -> &[TxReceipt] {
        &self.receipts
    }

    pub fn check_conservation(&self) -> Result<(), ChainError> {
        let Some(registry) = &self.state.registry else {
            return Ok(());
        };
        let coins: u128 = self
            .state
            .coins
            .values()
            .map(|owned| u128::from(owned.coin.value()))
            .sum();
        let held = coins + u128::from(registry.pool_balance());
        let circulating = match registry.check_supply() {
            Ok(circulating) => u128::from(circulating),
            Err(_) => {
                return Err(ChainError::CorruptState(format!(
                    "{} burned but only {} minted",
                    registry.total_burned(),
                    registry.total_minted()
                )))
            }
        };
        if held != circulating {
            return Err(ChainError::ConservationViolated { held, circulating });
        }
        Ok(())
    }

    pub fn state_root(&self) -> [u8; 32] {
        compute_state_root(&self.state)
    }

    // ---------------------------------------------------------------------
    // persistence
    // ---------------------------------------------------------------------

    pub fn load(path: &Path) -> Result<Self, ChainError> {
        let bytes = fs::read(path)?;
        let chain: Chain = serde_json::from_slice(&bytes)?;
        chain.check_conservation()?;
        Ok(chain)
    }

    pub fn load_or_new(path: &Path) -> Result<Self, ChainError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Write to a sibling temp file, then rename over `path`.
    pub fn save(&self, path: &Path) -> Result<(), ChainError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn compute_state_root(state: &ChainState) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::new();
    if let Some(registry) = &state.registry {
        let mut hasher = Sha256::new();
        hasher.update(b"registry");
        hasher.update(registry.total_minted().to_le_bytes());
        hasher.update(registry.total_burned().to_le_bytes());
        hasher.update(registry.pool_balance().to_le_bytes());
        hasher.update(registry.transfer_fee_bps().to_le_bytes());
        hasher.update(registry.fee_recipient().as_bytes());
        hasher.update([registry.is_paused() as u8]);
        let reason = registry.pause_reason().unwrap_or_default();
        hasher.update((reason.len() as u64).to_le_bytes());
        hasher.update(reason.as_bytes());
        let metadata = registry.metadata();
        for field in [&metadata.name, &metadata.symbol, &metadata.description] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update([metadata.decimals]);
        let icon = metadata.icon_url.as_deref().unwrap_or_default();
        hasher.update((icon.len() as u64).to_le_bytes());
        hasher.update(icon.as_bytes());
        hasher.update(registry.total_fees_collected().to_le_bytes());
        for minter in registry.minters() {
            hasher.update(minter.as_bytes());
        }
        leaves.push(hasher.finalize().into());
    }
    if let Some(cap) = &state.owner_cap {
        let mut hasher = Sha256::new();
        hasher.update(b"cap");
        hasher.update(cap.id().as_bytes());
        hasher.update(cap.owner().as_bytes());
        leaves.push(hasher.finalize().into());
    }
    for (id, owned) in &state.coins {
        let mut hasher = Sha256::new();
        hasher.update(b"coin");
        hasher.update(id.as_bytes());
        hasher.update(owned.owner.as_bytes());
        hasher.update(owned.coin.value().to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    build_merkle(leaves)
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"nos-chain-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            if chunk.len() == 2 {
                hasher.update(chunk[1]);
            } else {
                hasher.update(chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}
