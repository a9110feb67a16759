//! One-hot asset routing.
//!
//! Every line of a transaction names the roster slot it settles against.
//! In an arithmetic circuit this is a one-hot selector vector: exactly one
//! slot is chosen and the chosen slot's asset must equal the line's. Here
//! the selector collapses to an index, checked three ways: the slot exists,
//! it carries the line's asset, and no other slot carries that asset (so
//! value cannot be split across two balances of the same asset).
//!
//! Alongside value, each slot tracks the sub-unit reward residue its inputs
//! release and its outputs carry on, and settles in `1 / SCALE` units.

use alloc::{vec, vec::Vec};

use super::ValidityError;
use crate::{
    primitives::AssetId,
    value::{Balance, Imbalance, Value, ValueError},
};

/// Per-slot conservation balances over a roster of assets.
#[derive(Clone, Debug)]
pub(super) struct Roster<'statement> {
    assets: &'statement [AssetId],
    balances: Vec<Balance>,
}

impl<'statement> Roster<'statement> {
    pub(super) fn new(assets: &'statement [AssetId]) -> Self {
        Self {
            assets,
            balances: vec![Balance::default(); assets.len()],
        }
    }

    /// Resolves the one-hot selection of `slot` for `asset`.
    pub(super) fn route(&self, slot: usize, asset: AssetId) -> Result<usize, ValidityError> {
        let claimed = *self.assets.get(slot).ok_or(ValidityError::SlotOutOfRange {
            slot,
            slots: self.assets.len(),
        })?;
        if claimed != asset {
            return Err(ValidityError::AssetMismatch { slot });
        }
        if self.assets.iter().filter(|&&held| held == asset).count() != 1 {
            return Err(ValidityError::NotOneHot { slot });
        }
        Ok(slot)
    }

    pub(super) fn credit(
        &mut self,
        slot: usize,
        asset: AssetId,
        value: Value,
    ) -> Result<(), ValidityError> {
        self.balance(slot, asset)?.credit(value)?;
        Ok(())
    }

    pub(super) fn debit(
        &mut self,
        slot: usize,
        asset: AssetId,
        value: Value,
    ) -> Result<(), ValidityError> {
        self.balance(slot, asset)?.debit(value)?;
        Ok(())
    }

    /// An input's accrual left `remainder` unpaid.
    pub(super) fn release(
        &mut self,
        slot: usize,
        asset: AssetId,
        remainder: u128,
    ) -> Result<(), ValidityError> {
        self.balance(slot, asset)?.release(remainder)?;
        Ok(())
    }

    /// An output carries `remainder` forward.
    pub(super) fn carry(
        &mut self,
        slot: usize,
        asset: AssetId,
        remainder: u128,
    ) -> Result<(), ValidityError> {
        self.balance(slot, asset)?.carry(remainder)?;
        Ok(())
    }

    /// Every slot must settle.
    pub(super) fn conserve(&self) -> Result<(), ValidityError> {
        self.balances
            .iter()
            .enumerate()
            .try_for_each(|(slot, balance)| settle(balance, slot))
    }

    fn balance(&mut self, slot: usize, asset: AssetId) -> Result<&mut Balance, ValidityError> {
        let routed = self.route(slot, asset)?;
        let slots = self.balances.len();
        self.balances
            .get_mut(routed)
            .ok_or(ValidityError::SlotOutOfRange { slot, slots })
    }
}

/// Settles the balance of roster slot `slot`.
pub(super) fn settle(balance: &Balance, slot: usize) -> Result<(), ValidityError> {
    balance.settle().map_err(|imbalance| match imbalance {
        Imbalance::Value => ValidityError::Conservation { slot },
        Imbalance::Residue => ValidityError::ResidueOverdrawn { slot },
        Imbalance::Overflow => ValueError::Overflow.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_checks() {
        let usdc = AssetId::derive(b"usdc");
        let sol = AssetId::derive(b"sol");

        let assets = [usdc, sol];
        let roster = Roster::new(&assets);
        assert_eq!(roster.route(1, sol), Ok(1));
        assert_eq!(
            roster.route(2, sol),
            Err(ValidityError::SlotOutOfRange { slot: 2, slots: 2 })
        );
        assert_eq!(
            roster.route(0, sol),
            Err(ValidityError::AssetMismatch { slot: 0 })
        );

        let duplicated = [usdc, usdc];
        let doubled = Roster::new(&duplicated);
        assert_eq!(
            doubled.route(0, usdc),
            Err(ValidityError::NotOneHot { slot: 0 })
        );
    }

    #[test]
    fn conservation_per_slot() {
        let usdc = AssetId::derive(b"usdc");
        let sol = AssetId::derive(b"sol");
        let assets = [usdc, sol];
        let mut roster = Roster::new(&assets);

        roster.credit(0, usdc, Value::from(10u64)).unwrap();
        roster.debit(0, usdc, Value::from(10u64)).unwrap();
        assert_eq!(roster.conserve(), Ok(()));

        roster.credit(1, sol, Value::from(1u64)).unwrap();
        assert_eq!(roster.conserve(), Err(ValidityError::Conservation { slot: 1 }));
    }

    #[test]
    fn residue_is_budgeted_per_slot() {
        let usdc = AssetId::derive(b"usdc");
        let sol = AssetId::derive(b"sol");
        let assets = [usdc, sol];
        let mut roster = Roster::new(&assets);

        roster.release(0, usdc, 400).unwrap();
        roster.release(0, usdc, 300).unwrap();
        roster.carry(0, usdc, 700).unwrap();
        assert_eq!(roster.conserve(), Ok(()));

        roster.carry(1, sol, 1).unwrap();
        assert_eq!(
            roster.conserve(),
            Err(ValidityError::ResidueOverdrawn { slot: 1 })
        );
        assert_eq!(
            roster.carry(0, sol, 1),
            Err(ValidityError::AssetMismatch { slot: 0 })
        );
    }
}
