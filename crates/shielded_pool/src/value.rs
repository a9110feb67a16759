//! Amounts and per-asset balances.
//!
//! Amounts are unsigned integers bounded by a configurable bit width
//! ([`Params::amount_bits`](crate::Params::amount_bits)). The bound keeps
//! every sum the predicate forms well inside `u128`, which is what a circuit
//! range check does for field elements: without it a large enough amount
//! would wrap around and fake conservation.

use core::iter;

use ff::PrimeField as _;
use pasta_curves::Fp;

use crate::reward::SCALE;

/// Errors from amount arithmetic.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ValueError {
    /// The amount does not fit the configured width.
    #[error("amount {value} does not fit in {bits} bits")]
    OutOfRange {
        /// The rejected amount.
        value: u128,
        /// The configured width.
        bits: u32,
    },

    /// A sum or product left the `u128` range.
    #[error("amount arithmetic overflowed")]
    Overflow,
}

/// A non-negative amount of a single asset.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Value(u128);

impl Value {
    /// The zero amount (padding notes and lines carry it).
    pub const ZERO: Self = Self(0);

    /// Whether this amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Whether this amount is `< 2^bits`.
    #[must_use]
    pub const fn fits(self, bits: u32) -> bool {
        bits >= u128::BITS || self.0 >> bits == 0
    }

    /// Range check against `2^bits`.
    pub const fn check_range(self, bits: u32) -> Result<Self, ValueError> {
        if self.fits(bits) {
            Ok(self)
        } else {
            Err(ValueError::OutOfRange {
                value: self.0,
                bits,
            })
        }
    }

    /// Checked addition.
    pub fn checked_add(self, rhs: Self) -> Result<Self, ValueError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(ValueError::Overflow)
    }

    /// The amount as a field element (for hashing).
    #[must_use]
    pub fn to_field(self) -> Fp {
        Fp::from_u128(self.0)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self(u128::from(value))
    }
}

impl From<u128> for Value {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl From<Value> for u128 {
    fn from(value: Value) -> Self {
        value.0
    }
}

impl iter::Sum<Value> for Option<Value> {
    /// Checked sum; `None` on overflow.
    fn sum<I: Iterator<Item = Value>>(mut iter: I) -> Self {
        iter.try_fold(Value::ZERO, |acc, value| acc.checked_add(value).ok())
    }
}

/// Running two-sided balance of one asset inside a transaction.
///
/// Credits are value entering the transaction (spent notes, public deposits);
/// debits are value leaving it (created notes, withdrawals, fees). Both sides
/// also count sub-unit reward residue, released by spent notes and carried
/// by created ones.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Balance {
    /// Value entering the transaction.
    pub credit: Value,
    /// Value leaving the transaction.
    pub debit: Value,
    /// Residue released by spent notes, in `1 / SCALE` units.
    pub released: u128,
    /// Residue carried by created notes, in `1 / SCALE` units.
    pub carried: u128,
}

/// Why a [`Balance`] does not settle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Imbalance {
    /// Debits exceed credits, or a whole unit of credit is left over.
    Value,
    /// Credits cover the debited value but not the residue carried on.
    Residue,
    /// A side left the `u128` range in `1 / SCALE` units.
    Overflow,
}

impl Balance {
    /// Adds `value` to the credit side.
    pub fn credit(&mut self, value: Value) -> Result<(), ValueError> {
        self.credit = self.credit.checked_add(value)?;
        Ok(())
    }

    /// Adds `value` to the debit side.
    pub fn debit(&mut self, value: Value) -> Result<(), ValueError> {
        self.debit = self.debit.checked_add(value)?;
        Ok(())
    }

    /// Adds residue left over by a spent note's accrual.
    pub fn release(&mut self, remainder: u128) -> Result<(), ValueError> {
        self.released = self
            .released
            .checked_add(remainder)
            .ok_or(ValueError::Overflow)?;
        Ok(())
    }

    /// Adds residue carried by a created note.
    pub fn carry(&mut self, remainder: u128) -> Result<(), ValueError> {
        self.carried = self
            .carried
            .checked_add(remainder)
            .ok_or(ValueError::Overflow)?;
        Ok(())
    }

    /// Settles both sides in `1 / SCALE` units.
    ///
    /// Released residue may pay for whole units of debit. Less than one
    /// unit of it may go unclaimed; anything more is value destroyed.
    pub fn settle(&self) -> Result<(), Imbalance> {
        let inflow = fixed_point(self.credit, self.released)?;
        let outflow = fixed_point(self.debit, self.carried)?;
        let debited = fixed_point(self.debit, 0)?;
        match inflow.checked_sub(outflow) {
            Some(unclaimed) if unclaimed < SCALE => Ok(()),
            None if debited <= inflow => Err(Imbalance::Residue),
            Some(_) | None => Err(Imbalance::Value),
        }
    }
}

/// `value · SCALE + residue`.
fn fixed_point(value: Value, residue: u128) -> Result<u128, Imbalance> {
    value
        .0
        .checked_mul(SCALE)
        .and_then(|scaled| scaled.checked_add(residue))
        .ok_or(Imbalance::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_check_boundary() {
        let max = Value::from(u64::MAX);
        assert_eq!(max.check_range(64), Ok(max));
        let over = Value::from(u128::from(u64::MAX) + 1);
        assert_eq!(
            over.check_range(64),
            Err(ValueError::OutOfRange {
                value: u128::from(u64::MAX) + 1,
                bits: 64
            })
        );
        assert!(Value::from(u128::MAX).fits(128));
    }

    #[test]
    fn checked_sum_detects_overflow() {
        let fine: Option<Value> = [Value::from(1u64), Value::from(2u64)].into_iter().sum();
        assert_eq!(fine, Some(Value::from(3u64)));

        let overflow: Option<Value> = [Value::from(u128::MAX), Value::from(1u64)]
            .into_iter()
            .sum();
        assert_eq!(overflow, None);
    }

    #[test]
    fn balance_tracks_both_sides() {
        let mut balance = Balance::default();
        balance.credit(Value::from(50u64)).unwrap();
        balance.credit(Value::from(30u64)).unwrap();
        balance.debit(Value::from(70u64)).unwrap();
        assert_eq!(balance.settle(), Err(Imbalance::Value));
        balance.debit(Value::from(10u64)).unwrap();
        assert_eq!(balance.settle(), Ok(()));
        balance.debit(Value::from(1u64)).unwrap();
        assert_eq!(balance.settle(), Err(Imbalance::Value));
    }

    /// Two residues of 0.7 pay for one more unit and leave 0.4 to carry.
    #[test]
    fn residue_settles_in_fixed_point() {
        let mut balance = Balance::default();
        balance.credit(Value::from(10u64)).unwrap();
        balance.release(700_000_000).unwrap();
        balance.release(700_000_000).unwrap();
        balance.debit(Value::from(11u64)).unwrap();
        balance.carry(400_000_000).unwrap();
        assert_eq!(balance.settle(), Ok(()));

        balance.carry(1).unwrap();
        assert_eq!(balance.settle(), Err(Imbalance::Residue));

        let mut unclaimed = Balance::default();
        unclaimed.credit(Value::from(10u64)).unwrap();
        unclaimed.release(999_999_999).unwrap();
        unclaimed.debit(Value::from(10u64)).unwrap();
        assert_eq!(unclaimed.settle(), Ok(()));
        unclaimed.release(1).unwrap();
        assert_eq!(unclaimed.settle(), Err(Imbalance::Value));
    }
}
