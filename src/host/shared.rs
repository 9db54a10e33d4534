use std::sync::{Arc, Mutex, MutexGuard};

use crate::contracts::{SignedCall, TokenCall};
use crate::host::{Address, Chain, ChainError};
use crate::receipts::TxReceipt;

/// Chain handle that can be cloned across threads. Every call holds the lock
/// for its whole execution, so submissions are applied one at a time.
#[derive(Clone, Debug, Default)]
pub struct SharedChain {
    inner: Arc<Mutex<Chain>>,
}

impl SharedChain {
    pub fn new(chain: Chain) -> Self {
        Self {
            inner: Arc::new(Mutex::new(chain)),
        }
    }

    pub fn submit(&self, sender: Address, call: TokenCall) -> Result<TxReceipt, ChainError> {
        self.lock()?.submit(sender, call)
    }

    pub fn submit_signed(&self, signed: &SignedCall) -> Result<TxReceipt, ChainError> {
        self.lock()?.submit_signed(signed)
    }

    pub fn read<R>(&self, f: impl FnOnce(&Chain) -> R) -> Result<R, ChainError> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Chain>, ChainError> {
        self.inner.lock().map_err(|_| ChainError::LockPoisoned)
    }
}
