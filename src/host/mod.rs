//! Object host the token runs on: addresses, coins, per-call context and
//! the chain that owns everything between calls.

mod address;
mod chain;
mod coin;
mod context;
mod shared;

pub use address::{Address, ObjectId, ParseIdError};
pub use chain::{Chain, ChainError, ChainState, OwnedCoin};
pub use coin::Coin;
pub use context::{TxContext, TxEffects};
pub use shared::SharedChain;
