use serde::{Deserialize, Serialize};

use crate::host::Address;
use crate::ledger::Amount;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{caller} does not hold the owner capability")]
    NotOwner { caller: Address },
    #[error("{caller} is not an authorized minter")]
    Unauthorized { caller: Address },
    #[error("fee of {bps} bps exceeds the maximum of {max} bps")]
    FeeTooHigh { bps: u64, max: u64 },
    #[error("{recipients} recipients but {amounts} amounts")]
    LengthMismatch { recipients: usize, amounts: usize },
    #[error("token transfers are paused")]
    Paused,
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Amount, need: Amount },
    #[error("zero amount not allowed")]
    ZeroAmount,
    #[error("null address not allowed")]
    ZeroAddress,
    #[error("arithmetic overflow")]
    Overflow,
    #[error("invalid token metadata: {0}")]
    InvalidMetadata(String),
}

/// The three abort classes token callers observe. Several distinct failures
/// share a class: pause, fee bound and length checks all report `NotOwner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotOwner,
    InsufficientBalance,
    ZeroAddress,
}

impl ErrorKind {
    pub fn code(self) -> u64 {
        match self {
            ErrorKind::NotOwner => 0,
            ErrorKind::InsufficientBalance => 1,
            ErrorKind::ZeroAddress => 2,
        }
    }
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NotOwner { .. }
            | LedgerError::Unauthorized { .. }
            | LedgerError::FeeTooHigh { .. }
            | LedgerError::LengthMismatch { .. }
            | LedgerError::Paused
            | LedgerError::InvalidMetadata(_) => ErrorKind::NotOwner,
            LedgerError::InsufficientBalance { .. }
            | LedgerError::ZeroAmount
            | LedgerError::Overflow => ErrorKind::InsufficientBalance,
            LedgerError::ZeroAddress => ErrorKind::ZeroAddress,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_errors_collapse_onto_three_codes() {
        let caller = Address::new([1u8; 32]);
        assert_eq!(LedgerError::NotOwner { caller }.kind().code(), 0);
        assert_eq!(LedgerError::Unauthorized { caller }.kind(), ErrorKind::NotOwner);
        assert_eq!(LedgerError::Paused.kind(), ErrorKind::NotOwner);
        assert_eq!(LedgerError::ZeroAmount.kind().code(), 1);
        assert_eq!(
            LedgerError::InsufficientBalance { have: 1, need: 2 }.kind(),
            ErrorKind::InsufficientBalance
        );
        assert_eq!(LedgerError::ZeroAddress.kind().code(), 2);
    }
}
