use crate::events::TokenEvent;
use crate::host::{Address, Coin, ObjectId};

/// Per-transaction execution context: who is calling, fresh object ids,
/// and the outbox of coin transfers and events the chain applies on commit.
#[derive(Debug)]
pub struct TxContext {
    sender: Address,
    digest: [u8; 32],
    ids_created: u64,
    created: Vec<ObjectId>,
    transfers: Vec<(Address, Coin)>,
    events: Vec<TokenEvent>,
}

/// Everything a successful transaction leaves behind.
#[derive(Debug, Default)]
pub struct TxEffects {
    pub created: Vec<ObjectId>,
    pub transfers: Vec<(Address, Coin)>,
    pub events: Vec<TokenEvent>,
}

impl TxContext {
    pub fn new(sender: Address, digest: [u8; 32]) -> Self {
        Self {
            sender,
            digest,
            ids_created: 0,
            created: Vec::new(),
            transfers: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn fresh_id(&mut self) -> ObjectId {
        let id = ObjectId::derive(&self.digest, self.ids_created);
        self.ids_created += 1;
        self.created.push(id);
        id
    }

    /// Hand `coin` to `recipient` once the transaction commits.
    pub fn transfer(&mut self, coin: Coin, recipient: Address) {
        self.transfers.push((recipient, coin));
    }

    pub fn emit(&mut self, event: TokenEvent) {
        self.events.push(event);
    }

    pub fn transfers(&self) -> &[(Address, Coin)] {
        &self.transfers
    }

    pub fn events(&self) -> &[TokenEvent] {
        &self.events
    }

    pub fn into_effects(self) -> TxEffects {
        TxEffects {
            created: self.created,
            transfers: self.transfers,
            events: self.events,
        }
    }
}
