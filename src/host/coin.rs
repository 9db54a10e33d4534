use serde::{Deserialize, Serialize};

use crate::host::{ObjectId, TxContext};
use crate::ledger::{Amount, LedgerError, LedgerResult};

/// A unit of NOS value. Coins come into existence only through genesis,
/// pool withdrawals and `split`, so the total of all coins plus the pool
/// always equals the circulating supply.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coin {
    id: ObjectId,
    value: Amount,
}

impl Coin {
    pub(crate) fn mint(value: Amount, ctx: &mut TxContext) -> Self {
        Self {
            id: ctx.fresh_id(),
            value,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn value(&self) -> Amount {
        self.value
    }

    /// Take `amount` out of this coin into a new coin.
    pub fn split(&mut self, amount: Amount, ctx: &mut TxContext) -> LedgerResult<Coin> {
        if amount > self.value {
            return Err(LedgerError::InsufficientBalance {
                have: self.value,
                need: amount,
            });
        }
        self.value -= amount;
        Ok(Coin::mint(amount, ctx))
    }

    /// Merge `other` into this coin; `other` ceases to exist.
    pub fn join(&mut self, other: Coin) -> LedgerResult<()> {
        self.value = self
            .value
            .checked_add(other.value)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Destroy the coin and hand back its value.
    pub(crate) fn into_value(self) -> Amount {
        self.value
    }
}
