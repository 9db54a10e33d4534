use serde::{Deserialize, Serialize};

use crate::ledger::{Amount, LedgerError, LedgerResult};

/// 10_000 bps = 100%.
pub const MAX_FEE_BPS: u64 = 10_000;

pub const DEFAULT_FEE_BPS: u64 = 0;

/// floor(amount * bps / 10_000), computed in 128 bits so any u64 amount is safe.
pub fn calculate_fee(amount: Amount, bps: u64) -> Amount {
    let fee = u128::from(amount) * u128::from(bps) / u128::from(MAX_FEE_BPS);
    Amount::try_from(fee).unwrap_or(Amount::MAX)
}

pub fn ensure_valid_bps(bps: u64) -> LedgerResult<()> {
    if bps > MAX_FEE_BPS {
        return Err(LedgerError::FeeTooHigh {
            bps,
            max: MAX_FEE_BPS,
        });
    }
    Ok(())
}

/// An amount divided into the part the recipient gets and the fee.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeSplit {
    pub transfer_amount: Amount,
    pub fee: Amount,
}

impl FeeSplit {
    pub fn compute(amount: Amount, bps: u64) -> LedgerResult<Self> {
        ensure_valid_bps(bps)?;
        let fee = calculate_fee(amount, bps);
        let transfer_amount = amount.checked_sub(fee).ok_or(LedgerError::Overflow)?;
        Ok(Self {
            transfer_amount,
            fee,
        })
    }
}

/// Current transfer fee settings of the registry.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeSchedule {
    pub transfer_fee_bps: u64,
    pub fee_recipient: crate::host::Address,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn one_percent_of_ten_thousand() {
        let split = FeeSplit::compute(10_000, 100).unwrap();
        assert_eq!(split.fee, 100);
        assert_eq!(split.transfer_amount, 9_900);
    }

    #[test]
    fn full_fee_leaves_nothing_to_transfer() {
        let split = FeeSplit::compute(12_345, MAX_FEE_BPS).unwrap();
        assert_eq!(split.fee, 12_345);
        assert_eq!(split.transfer_amount, 0);
    }

    #[test]
    fn rejects_bps_above_maximum() {
        assert_eq!(
            FeeSplit::compute(1, MAX_FEE_BPS + 1),
            Err(LedgerError::FeeTooHigh {
                bps: 10_001,
                max: MAX_FEE_BPS
            })
        );
    }

    #[test]
    fn rounds_down() {
        assert_eq!(calculate_fee(99, 100), 0);
        assert_eq!(calculate_fee(199, 100), 1);
    }

    #[test]
    fn does_not_overflow_near_u64_max() {
        // 1e19 * 1e4 exceeds u64; the widened product does not.
        assert_eq!(calculate_fee(10_000_000_000_000_000_000, 10_000), 10_000_000_000_000_000_000);
        assert_eq!(calculate_fee(u64::MAX, 5_000), u64::MAX / 2);
    }

    proptest! {
        #[test]
        fn split_is_exact(amount in any::<u64>(), bps in 0u64..=MAX_FEE_BPS) {
            let split = FeeSplit::compute(amount, bps).unwrap();
            prop_assert_eq!(split.transfer_amount + split.fee, amount);
            let expected = (amount as u128 * bps as u128 / 10_000) as u64;
            prop_assert_eq!(split.fee, expected);
        }
    }
}
