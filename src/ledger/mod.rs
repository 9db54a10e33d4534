//! Supply accounting and fee distribution for the NOS token.
//!
//! The [`Registry`] holds every piece of mutable token state. Operations take
//! the coins they consume by value and push the coins they produce onto the
//! [`TxContext`] outbox; the chain decides whether those effects commit.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::TokenEvent;
use crate::host::{Address, Coin, ObjectId, TxContext};

mod error;
mod fees;

pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use fees::{
    calculate_fee, ensure_valid_bps, FeeSchedule, FeeSplit, DEFAULT_FEE_BPS, MAX_FEE_BPS,
};

pub type Amount = u64;

pub const DECIMALS: u8 = 9;
pub const NOS_SCALE: Amount = 1_000_000_000; // 1 NOS = 1e9 minimal units

/// Largest decimals value whose scale `10^d` fits in a `u64`.
pub const MAX_DECIMALS: u8 = 19;

pub const CREATOR_SUPPLY_TOKENS: u64 = 10_000_000_000;
pub const POOL_SUPPLY_TOKENS: u64 = 100_000_000;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub description: String,
    pub icon_url: Option<String>,
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self {
            name: "NOS".into(),
            symbol: "NOS".into(),
            decimals: DECIMALS,
            description: "NOS fixed-supply token".into(),
            icon_url: None,
        }
    }
}

impl TokenMetadata {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(LedgerError::InvalidMetadata("symbol must not be empty".into()));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(LedgerError::InvalidMetadata(format!(
                "decimals is {}, at most {MAX_DECIMALS} is supported",
                self.decimals
            )));
        }
        Ok(())
    }

    /// Render a base-unit amount with the token's decimal places.
    pub fn format_amount(&self, amount: Amount) -> String {
        let scale = match 10u128.checked_pow(u32::from(self.decimals)) {
            Some(scale) if self.decimals > 0 => scale,
            _ => return format!("{amount} {}", self.symbol),
        };
        let whole = u128::from(amount) / scale;
        let frac = u128::from(amount) % scale;
        format!(
            "{whole}.{frac:0width$} {}",
            self.symbol,
            width = self.decimals as usize
        )
    }
}

/// Inputs to genesis, in base units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenesisParams {
    pub metadata: TokenMetadata,
    pub creator_supply: Amount,
    pub pool_supply: Amount,
}

impl Default for GenesisParams {
    fn default() -> Self {
        Self {
            metadata: TokenMetadata::default(),
            creator_supply: CREATOR_SUPPLY_TOKENS * NOS_SCALE,
            pool_supply: POOL_SUPPLY_TOKENS * NOS_SCALE,
        }
    }
}

/// The single owner credential. Whoever `owner` names may run the gated
/// operations; there is never more than one.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerCap {
    id: ObjectId,
    owner: Address,
}

impl OwnerCap {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    fn ensure_holder(&self, ctx: &TxContext) -> LedgerResult<()> {
        if ctx.sender() != self.owner {
            return Err(LedgerError::NotOwner {
                caller: ctx.sender(),
            });
        }
        Ok(())
    }

    pub fn transfer_ownership(&mut self, new_owner: Address, ctx: &mut TxContext) -> LedgerResult<()> {
        self.ensure_holder(ctx)?;
        if new_owner.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        let previous_owner = self.owner;
        self.owner = new_owner;
        debug!(%previous_owner, %new_owner, "ownership transferred");
        ctx.emit(TokenEvent::OwnershipTransferred {
            previous_owner,
            new_owner,
        });
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registry {
    metadata: TokenMetadata,
    total_minted: Amount,
    total_burned: Amount,
    pool: Amount,
    authorized_minters: Vec<Address>,
    transfer_fee_bps: u64,
    fee_recipient: Address,
    is_paused: bool,
    pause_reason: Option<String>,
    total_fees_collected: Amount,
}

impl Registry {
    /// Mint the whole supply: the creator share goes to the sender as one
    /// coin, the rest stays in the pool. Nothing else ever mints.
    pub fn genesis(params: GenesisParams, ctx: &mut TxContext) -> LedgerResult<(Registry, OwnerCap)> {
        let creator = ctx.sender();
        if creator.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        params.metadata.validate()?;
        let total = params
            .creator_supply
            .checked_add(params.pool_supply)
            .ok_or(LedgerError::Overflow)?;

        let cap = OwnerCap {
            id: ctx.fresh_id(),
            owner: creator,
        };
        let registry = Registry {
            metadata: params.metadata,
            total_minted: total,
            total_burned: 0,
            pool: params.pool_supply,
            authorized_minters: Vec::new(),
            transfer_fee_bps: DEFAULT_FEE_BPS,
            fee_recipient: creator,
            is_paused: false,
            pause_reason: None,
            total_fees_collected: 0,
        };
        if params.creator_supply > 0 {
            let coin = Coin::mint(params.creator_supply, ctx);
            ctx.transfer(coin, creator);
        }
        debug!(%creator, total, pool = params.pool_supply, "genesis");
        ctx.emit(TokenEvent::Genesis {
            creator,
            creator_supply: params.creator_supply,
            pool_supply: params.pool_supply,
        });
        Ok((registry, cap))
    }

    fn ensure_not_paused(&self) -> LedgerResult<()> {
        if self.is_paused {
            return Err(LedgerError::Paused);
        }
        Ok(())
    }

    fn ensure_minter(&self, caller: Address) -> LedgerResult<()> {
        if !self.is_minter(&caller) {
            return Err(LedgerError::Unauthorized { caller });
        }
        Ok(())
    }

    fn ensure_pool_covers(&self, amount: Amount) -> LedgerResult<()> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        if amount > self.pool {
            return Err(LedgerError::InsufficientBalance {
                have: self.pool,
                need: amount,
            });
        }
        Ok(())
    }

    fn withdraw(&mut self, amount: Amount, ctx: &mut TxContext) -> LedgerResult<Coin> {
        self.pool = self.pool.checked_sub(amount).ok_or(LedgerError::InsufficientBalance {
            have: self.pool,
            need: amount,
        })?;
        Ok(Coin::mint(amount, ctx))
    }

    fn record_fee(&mut self, fee: Amount) -> LedgerResult<()> {
        self.total_fees_collected = self
            .total_fees_collected
            .checked_add(fee)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // owner-gated
    // ---------------------------------------------------------------------

    pub fn distribute(
        &mut self,
        cap: &OwnerCap,
        recipient: Address,
        amount: Amount,
        ctx: &mut TxContext,
    ) -> LedgerResult<()> {
        cap.ensure_holder(ctx)?;
        if recipient.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        self.ensure_pool_covers(amount)?;
        let coin = self.withdraw(amount, ctx)?;
        ctx.transfer(coin, recipient);
        debug!(%recipient, amount, pool = self.pool, "pool distributed");
        ctx.emit(TokenEvent::PoolDistributed { recipient, amount });
        Ok(())
    }

    pub fn deposit(&mut self, cap: &OwnerCap, coin: Coin, ctx: &mut TxContext) -> LedgerResult<()> {
        cap.ensure_holder(ctx)?;
        let amount = coin.into_value();
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        self.pool = self.pool.checked_add(amount).ok_or(LedgerError::Overflow)?;
        debug!(amount, pool = self.pool, "pool deposit");
        ctx.emit(TokenEvent::PoolDeposited {
            from: ctx.sender(),
            amount,
        });
        Ok(())
    }

    pub fn add_minter(&mut self, cap: &OwnerCap, minter: Address, ctx: &mut TxContext) -> LedgerResult<()> {
        cap.ensure_holder(ctx)?;
        if self.is_minter(&minter) {
            return Ok(());
        }
        self.authorized_minters.push(minter);
        debug!(%minter, "minter added");
        ctx.emit(TokenEvent::MinterAdded { minter });
        Ok(())
    }

    pub fn remove_minter(
        &mut self,
        cap: &OwnerCap,
        minter: Address,
        ctx: &mut TxContext,
    ) -> LedgerResult<()> {
        cap.ensure_holder(ctx)?;
        if let Some(idx) = self.authorized_minters.iter().position(|m| *m == minter) {
            self.authorized_minters.remove(idx);
            debug!(%minter, "minter removed");
            ctx.emit(TokenEvent::MinterRemoved { minter });
        }
        Ok(())
    }

    pub fn set_transfer_fee(&mut self, cap: &OwnerCap, bps: u64, ctx: &mut TxContext) -> LedgerResult<()> {
        cap.ensure_holder(ctx)?;
        ensure_valid_bps(bps)?;
        let old_bps = self.transfer_fee_bps;
        self.transfer_fee_bps = bps;
        ctx.emit(TokenEvent::TransferFeeUpdated {
            old_bps,
            new_bps: bps,
        });
        Ok(())
    }

    pub fn set_fee_recipient(
        &mut self,
        cap: &OwnerCap,
        recipient: Address,
        ctx: &mut TxContext,
    ) -> LedgerResult<()> {
        cap.ensure_holder(ctx)?;
        let old_recipient = self.fee_recipient;
        self.fee_recipient = recipient;
        ctx.emit(TokenEvent::FeeRecipientUpdated {
            old_recipient,
            new_recipient: recipient,
        });
        Ok(())
    }

    pub fn set_pause(
        &mut self,
        cap: &OwnerCap,
        paused: bool,
        reason: String,
        ctx: &mut TxContext,
    ) -> LedgerResult<()> {
        cap.ensure_holder(ctx)?;
        self.is_paused = paused;
        self.pause_reason = Some(reason.clone());
        debug!(paused, %reason, "pause state changed");
        ctx.emit(TokenEvent::PauseStateChanged {
            paused,
            reason,
            by: ctx.sender(),
        });
        Ok(())
    }

    // ---------------------------------------------------------------------
    // minter-gated; `caller` is supplied by the invoker, not read from ctx
    // ---------------------------------------------------------------------

    pub fn mint_from_pool(
        &mut self,
        caller: Address,
        recipient: Address,
        amount: Amount,
        ctx: &mut TxContext,
    ) -> LedgerResult<()> {
        if recipient.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        self.ensure_pool_covers(amount)?;
        self.ensure_minter(caller)?;
        let coin = self.withdraw(amount, ctx)?;
        ctx.transfer(coin, recipient);
        debug!(%caller, %recipient, amount, "minted from pool");
        ctx.emit(TokenEvent::Minted {
            minter: caller,
            recipient,
            amount,
            fee: 0,
        });
        Ok(())
    }

    /// Withdraw `amount` from the pool, sending `amount - fee` to `recipient`.
    /// The fee share leaves the pool only when it is non-zero and has a
    /// non-null destination; otherwise it stays put.
    pub fn mint_with_fee(
        &mut self,
        caller: Address,
        recipient: Address,
        amount: Amount,
        fee_bps: u64,
        fee_recipient: Address,
        ctx: &mut TxContext,
    ) -> LedgerResult<FeeSplit> {
        self.ensure_not_paused()?;
        if recipient.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        ensure_valid_bps(fee_bps)?;
        self.ensure_minter(caller)?;

        let split = FeeSplit::compute(amount, fee_bps)?;
        self.ensure_pool_covers(amount)?;

        let coin = self.withdraw(split.transfer_amount, ctx)?;
        ctx.transfer(coin, recipient);
        if split.fee > 0 && !fee_recipient.is_zero() {
            let fee_coin = self.withdraw(split.fee, ctx)?;
            ctx.transfer(fee_coin, fee_recipient);
            self.record_fee(split.fee)?;
            ctx.emit(TokenEvent::FeeCollected {
                from: caller,
                recipient: fee_recipient,
                amount: split.fee,
            });
        }
        debug!(%caller, %recipient, amount, fee = split.fee, "minted from pool with fee");
        ctx.emit(TokenEvent::Minted {
            minter: caller,
            recipient,
            amount: split.transfer_amount,
            fee: split.fee,
        });
        Ok(split)
    }

    // ---------------------------------------------------------------------
    // ungated
    // ---------------------------------------------------------------------

    /// Move pool value to `recipient`. Carries no access control and is not
    /// pause-gated: any caller may drain the pool through it.
    pub fn transfer_from_pool(
        &mut self,
        recipient: Address,
        amount: Amount,
        ctx: &mut TxContext,
    ) -> LedgerResult<()> {
        self.ensure_pool_covers(amount)?;
        let coin = self.withdraw(amount, ctx)?;
        ctx.transfer(coin, recipient);
        debug!(%recipient, amount, caller = %ctx.sender(), "transfer from pool");
        ctx.emit(TokenEvent::Transfer {
            from: ctx.sender(),
            to: recipient,
            amount,
            fee: 0,
        });
        Ok(())
    }

    pub fn burn(&mut self, coin: Coin, ctx: &mut TxContext) -> LedgerResult<Amount> {
        let amount = coin.into_value();
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let total_burned = self
            .total_burned
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        if total_burned > self.total_minted {
            return Err(LedgerError::Overflow);
        }
        self.total_burned = total_burned;
        debug!(amount, total_burned, "burned");
        ctx.emit(TokenEvent::Burned {
            from: ctx.sender(),
            amount,
        });
        Ok(amount)
    }

    pub fn transfer_with_fee(
        &mut self,
        mut coin: Coin,
        recipient: Address,
        ctx: &mut TxContext,
    ) -> LedgerResult<FeeSplit> {
        self.ensure_not_paused()?;
        if recipient.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        let split = FeeSplit::compute(coin.value(), self.transfer_fee_bps)?;
        let from = ctx.sender();
        if split.fee > 0 {
            let fee_coin = coin.split(split.fee, ctx)?;
            ctx.transfer(fee_coin, self.fee_recipient);
            self.record_fee(split.fee)?;
            ctx.emit(TokenEvent::FeeCollected {
                from,
                recipient: self.fee_recipient,
                amount: split.fee,
            });
        }
        ctx.transfer(coin, recipient);
        debug!(%from, %recipient, amount = split.transfer_amount, fee = split.fee, "transfer with fee");
        ctx.emit(TokenEvent::Transfer {
            from,
            to: recipient,
            amount: split.transfer_amount,
            fee: split.fee,
        });
        Ok(split)
    }

    /// Pay each recipient its amount out of `coin`, returning the remainder
    /// to the sender. Every pair is validated before anything is split, so a
    /// bad entry anywhere in the list leaves no partial payout behind.
    pub fn batch_transfer(
        &mut self,
        mut coin: Coin,
        recipients: &[Address],
        amounts: &[Amount],
        ctx: &mut TxContext,
    ) -> LedgerResult<Amount> {
        self.ensure_not_paused()?;
        if recipients.len() != amounts.len() {
            return Err(LedgerError::LengthMismatch {
                recipients: recipients.len(),
                amounts: amounts.len(),
            });
        }

        let mut remaining = coin.value();
        for (recipient, &amount) in recipients.iter().zip(amounts) {
            if recipient.is_zero() {
                return Err(LedgerError::ZeroAddress);
            }
            if amount == 0 {
                return Err(LedgerError::ZeroAmount);
            }
            if amount > remaining {
                return Err(LedgerError::InsufficientBalance {
                    have: remaining,
                    need: amount,
                });
            }
            remaining -= amount;
        }

        let from = ctx.sender();
        for (&recipient, &amount) in recipients.iter().zip(amounts) {
            let part = coin.split(amount, ctx)?;
            ctx.transfer(part, recipient);
            ctx.emit(TokenEvent::Transfer {
                from,
                to: recipient,
                amount,
                fee: 0,
            });
        }

        let remainder = coin.value();
        if remainder > 0 {
            ctx.transfer(coin, from);
        }
        debug!(%from, recipients = recipients.len(), remainder, "batch transfer");
        Ok(remainder)
    }

    // ---------------------------------------------------------------------
    // queries
    // ---------------------------------------------------------------------

    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    pub fn total_minted(&self) -> Amount {
        self.total_minted
    }

    pub fn total_burned(&self) -> Amount {
        self.total_burned
    }

    /// Minted minus burned. A registry whose burns exceed its mints is
    /// corrupt; [`Registry::check_supply`] reports that case.
    pub fn circulating_supply(&self) -> Amount {
        self.total_minted.saturating_sub(self.total_burned)
    }

    pub(crate) fn check_supply(&self) -> LedgerResult<Amount> {
        self.total_minted
            .checked_sub(self.total_burned)
            .ok_or(LedgerError::InsufficientBalance {
                have: self.total_minted,
                need: self.total_burned,
            })
    }

    pub fn pool_balance(&self) -> Amount {
        self.pool
    }

    pub fn transfer_fee_bps(&self) -> u64 {
        self.transfer_fee_bps
    }

    pub fn fee_recipient(&self) -> Address {
        self.fee_recipient
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            transfer_fee_bps: self.transfer_fee_bps,
            fee_recipient: self.fee_recipient,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn pause_reason(&self) -> Option<&str> {
        self.pause_reason.as_deref()
    }

    pub fn is_minter(&self, address: &Address) -> bool {
        self.authorized_minters.iter().any(|m| m == address)
    }

    pub fn minters(&self) -> &[Address] {
        &self.authorized_minters
    }

    pub fn total_fees_collected(&self) -> Amount {
        self.total_fees_collected
    }

    /// Fee the current schedule would take from `amount`.
    pub fn calculate_fee(&self, amount: Amount) -> Amount {
        calculate_fee(amount, self.transfer_fee_bps)
    }
}

/// Hand a coin to `recipient` without touching the registry: no fee, no pause gate.
pub fn transfer(coin: Coin, recipient: Address, ctx: &mut TxContext) -> LedgerResult<()> {
    if recipient.is_zero() {
        return Err(LedgerError::ZeroAddress);
    }
    let amount = coin.value();
    let from = ctx.sender();
    ctx.transfer(coin, recipient);
    ctx.emit(TokenEvent::Transfer {
        from,
        to: recipient,
        amount,
        fee: 0,
    });
    Ok(())
}

/// Split `amount` off `coin` into a new coin owned by the sender.
pub fn split(coin: &mut Coin, amount: Amount, ctx: &mut TxContext) -> LedgerResult<ObjectId> {
    let part = coin.split(amount, ctx)?;
    let id = part.id();
    let sender = ctx.sender();
    ctx.transfer(part, sender);
    Ok(id)
}

pub fn join(coin: &mut Coin, other: Coin) -> LedgerResult<()> {
    coin.join(other)
}
