//! NOS token ledger.
//!
//! A fixed-supply fungible token with an owner-controlled distribution pool,
//! optional transfer fees, a minter allow-list and a pause switch, running on
//! a small in-memory object host that applies each call atomically.

pub mod config;
pub mod contracts;
pub mod events;
pub mod host;
pub mod ledger;
pub mod receipts;

pub use config::{ConfigError, GenesisConfig};
pub use contracts::{SignatureError, SignedCall, TokenCall};
pub use events::{EventRecord, TokenEvent};
pub use host::{Address, Chain, ChainError, Coin, ObjectId, SharedChain, TxContext};
pub use ledger::{Amount, ErrorKind, GenesisParams, LedgerError, OwnerCap, Registry, TokenMetadata};
pub use receipts::{TxReceipt, TxStatus};
