//! Reward accrual.
//!
//! Every asset has a global reward accumulator: a fixed-point counter of
//! reward earned per unit of deposited value since genesis, scaled by
//! [`SCALE`]. A note snapshots the accumulator when it is created and, when
//! spent, redeems
//!
//! $$\text{value} = \text{amount} + \left\lfloor
//!   \frac{\text{amount}\cdot(\text{global} - \text{snapshot}) + r}{\text{SCALE}}
//! \right\rfloor$$
//!
//! where $r < \text{SCALE}$ is the sub-unit residue the note committed to,
//! left over from an earlier re-snapshot. Everything is integer arithmetic, so
//! the same inputs give the same value on every platform.

use alloc::collections::BTreeMap;

use ff::PrimeField as _;
use pasta_curves::Fp;

use crate::{constants::REWARD_SCALE, primitives::AssetId, value::Value};

/// Fixed-point precision of accumulators.
pub const SCALE: u128 = REWARD_SCALE;

/// Errors from reward arithmetic.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum RewardError {
    /// The note claims a snapshot the accumulator has not reached yet.
    #[error("snapshot {snapshot} is ahead of the global accumulator {global}")]
    SnapshotAhead {
        /// The note's snapshot.
        snapshot: u128,
        /// The global accumulator.
        global: u128,
    },

    /// A residue must be a strict fraction of one unit.
    #[error("remainder {0} is not below the reward scale")]
    RemainderOutOfRange(u128),

    /// Accrual left the `u128` range.
    #[error("reward arithmetic overflowed")]
    Overflow,

    /// Rewards cannot be distributed over an empty supply.
    #[error("cannot distribute rewards over zero supply")]
    EmptySupply,

    /// Accumulators only move forward.
    #[error("accumulator update would decrease the value from {current} to {proposed}")]
    Regression {
        /// The value currently recorded.
        current: u128,
        /// The rejected value.
        proposed: u128,
    },
}

/// A per-asset reward accumulator, in units of `1 / SCALE` reward per unit
/// of value.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Accumulator(u128);

impl Accumulator {
    /// The genesis accumulator.
    pub const ZERO: Self = Self(0);

    /// Advances the accumulator by distributing `reward` over `supply`:
    /// `acc' = acc + ⌊reward · SCALE / supply⌋`.
    pub fn distribute(self, reward: Value, supply: Value) -> Result<Self, RewardError> {
        if supply.is_zero() {
            return Err(RewardError::EmptySupply);
        }
        let delta = u128::from(reward)
            .checked_mul(SCALE)
            .ok_or(RewardError::Overflow)?
            .div_euclid(u128::from(supply));
        self.0
            .checked_add(delta)
            .map(Self)
            .ok_or(RewardError::Overflow)
    }

    /// The accumulator as a field element (for hashing and public inputs).
    #[must_use]
    pub fn to_field(self) -> Fp {
        Fp::from_u128(self.0)
    }
}

impl From<u128> for Accumulator {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl From<Accumulator> for u128 {
    fn from(acc: Accumulator) -> Self {
        acc.0
    }
}

/// The outcome of [`accrue`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Accrual {
    /// Redeemable value, never below the note amount.
    pub value: Value,
    /// New sub-unit residue, `< SCALE`.
    pub remainder: u128,
}

/// Computes the value redeemable from `amount` snapshotted at `snapshot`
/// once the accumulator has reached `global`.
///
/// Monotone in `global`. With `global == snapshot` and `remainder == 0`
/// the result is exactly `amount`.
pub fn accrue(
    amount: Value,
    global: Accumulator,
    snapshot: Accumulator,
    remainder: u128,
) -> Result<Accrual, RewardError> {
    if snapshot > global {
        return Err(RewardError::SnapshotAhead {
            snapshot: snapshot.0,
            global: global.0,
        });
    }
    if remainder >= SCALE {
        return Err(RewardError::RemainderOutOfRange(remainder));
    }

    let numerator = u128::from(amount)
        .checked_mul(global.0 - snapshot.0)
        .and_then(|growth| growth.checked_add(remainder))
        .ok_or(RewardError::Overflow)?;
    let value = amount
        .checked_add(Value::from(numerator.div_euclid(SCALE)))
        .map_err(|_err| RewardError::Overflow)?;

    Ok(Accrual {
        value,
        remainder: numerator.rem_euclid(SCALE),
    })
}

/// Payout of a winning mining deployment at `rate` (in `1 / SCALE` units):
/// `amount + ⌊amount · rate / SCALE⌋`.
pub fn payout(amount: Value, rate: Accumulator) -> Result<Value, RewardError> {
    accrue(amount, rate, Accumulator::ZERO, 0).map(|accrual| accrual.value)
}

/// The current accumulator of every asset.
///
/// Assets that were never distributed to sit at [`Accumulator::ZERO`].
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Accumulators(BTreeMap<AssetId, Accumulator>);

impl Accumulators {
    /// The current accumulator of `asset`.
    #[must_use]
    pub fn get(&self, asset: AssetId) -> Accumulator {
        self.0.get(&asset).copied().unwrap_or_default()
    }

    /// Moves `asset` to `proposed`; rejects any decrease.
    pub fn advance(&mut self, asset: AssetId, proposed: Accumulator) -> Result<(), RewardError> {
        let current = self.get(asset);
        if proposed < current {
            return Err(RewardError::Regression {
                current: current.0,
                proposed: proposed.0,
            });
        }
        self.0.insert(asset, proposed);
        tracing::debug!(
            asset = %hex::encode(<[u8; 32]>::from(asset)),
            accumulator = proposed.0,
            "reward accumulator advanced"
        );
        Ok(())
    }

    /// Distributes `reward` over `supply` of `asset`.
    pub fn distribute(
        &mut self,
        asset: AssetId,
        reward: Value,
        supply: Value,
    ) -> Result<Accumulator, RewardError> {
        let next = self.get(asset).distribute(reward, supply)?;
        self.advance(asset, next)?;
        Ok(next)
    }
}
