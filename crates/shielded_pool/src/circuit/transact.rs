//! The transaction validity predicate.

use super::{
    Circuit, TransactStatement, TransactWitness, ValidityError, check_distinct, check_len,
    check_spend, check_version, reward_line, roster::Roster,
};
use crate::{
    constants::TRANSACT_CIRCUIT_ID,
    params::{Params, Shape},
    reward::{self, RewardError},
    value::Value,
};

/// Spends `shape.inputs` notes and creates `shape.outputs` notes across the
/// roster, conserving value per roster slot:
///
/// $$\sum \text{inputs} + \sum \text{deposits} =
///   \sum \text{outputs} + \sum \text{withdrawals} + \sum \text{fees}$$
///
/// Inputs count at their accrued value; outputs must snapshot the current
/// accumulator of their asset. Reward residue left over by the inputs may be
/// carried into output remainders, never created. The parameters' fee is the
/// sum of the public-line fees.
#[derive(Clone, Copy, Debug)]
pub struct TransactCircuit {
    /// Fixed dimensions.
    pub shape: Shape,
    /// Amounts must be `< 2^amount_bits`.
    pub amount_bits: u32,
}

impl TransactCircuit {
    /// The predicate for a pool configured with `params`.
    #[must_use]
    pub const fn new(params: &Params) -> Self {
        Self {
            shape: params.shape,
            amount_bits: params.amount_bits,
        }
    }

    fn check_shape(
        &self,
        statement: &TransactStatement,
        witness: &TransactWitness,
    ) -> Result<(), ValidityError> {
        let shape = &self.shape;
        check_len("nullifiers", shape.inputs, statement.nullifiers.len())?;
        check_len("inputs", shape.inputs, witness.inputs.len())?;
        check_len("commitments", shape.outputs, statement.commitments.len())?;
        check_len("outputs", shape.outputs, witness.outputs.len())?;
        check_len("reward lines", shape.reward_lines, statement.reward_lines.len())?;
        check_len("public lines", shape.public_lines, statement.public_lines.len())?;
        check_len("public slots", shape.public_lines, witness.public_slots.len())?;
        check_len("roster", shape.roster_slots, statement.roster.len())
    }
}

impl Circuit for TransactCircuit {
    const ID: &'static [u8] = TRANSACT_CIRCUIT_ID;

    type Statement = TransactStatement;
    type Witness = TransactWitness;

    fn check(
        &self,
        statement: &TransactStatement,
        witness: &TransactWitness,
    ) -> Result<(), ValidityError> {
        self.check_shape(statement, witness)?;
        if witness.params.hash() != statement.params_hash {
            return Err(ValidityError::ParamsMismatch);
        }
        let fees: Option<Value> = statement.public_lines.iter().map(|line| line.fee).sum();
        if fees != Some(witness.params.fee) {
            return Err(ValidityError::FeeMismatch);
        }
        check_distinct(&statement.nullifiers)?;

        let mut roster = Roster::new(&statement.roster);

        for (index, (input, &nullifier)) in witness
            .inputs
            .iter()
            .zip(&statement.nullifiers)
            .enumerate()
        {
            let note = &input.spend.note;
            check_spend(
                &input.spend,
                index,
                nullifier,
                statement.commitment_root,
                statement.nullifier_root,
                self.amount_bits,
            )?;
            if note.amount.is_zero() {
                roster.credit(input.slot, note.asset, Value::ZERO)?;
            } else {
                let global = reward_line(&statement.reward_lines, note.asset, index)?;
                let accrual = note.value_at(global)?;
                roster.credit(input.slot, note.asset, accrual.value)?;
                roster.release(input.slot, note.asset, accrual.remainder)?;
            }
        }

        for (index, (output, &commitment)) in witness
            .outputs
            .iter()
            .zip(&statement.commitments)
            .enumerate()
        {
            let note = &output.note;
            check_version(note.version)?;
            note.amount.check_range(self.amount_bits)?;
            if note.remainder >= reward::SCALE {
                return Err(RewardError::RemainderOutOfRange(note.remainder).into());
            }
            if note.commitment() != commitment {
                return Err(ValidityError::CommitmentMismatch(index));
            }
            if !note.amount.is_zero()
                && reward_line(&statement.reward_lines, note.asset, index)? != note.snapshot
            {
                return Err(ValidityError::SnapshotMismatch(index));
            }
            roster.debit(output.slot, note.asset, note.amount)?;
            roster.carry(output.slot, note.asset, note.remainder)?;
        }

        for (line, &slot) in statement.public_lines.iter().zip(&witness.public_slots) {
            for amount in [line.deposit, line.withdrawal, line.fee] {
                amount.check_range(self.amount_bits)?;
            }
            if line.is_empty() {
                continue;
            }
            roster.credit(slot, line.asset, line.deposit)?;
            roster.debit(slot, line.asset, line.withdrawal)?;
            roster.debit(slot, line.asset, line.fee)?;
        }

        roster.conserve()
    }
}

#[cfg(test)]
mod tests {
    use ff::Field as _;
    use pasta_curves::Fp;

    use super::*;
    use crate::{
        circuit::{
            PublicLine, RewardLine, TransactParams,
            testing::{Fixture, usdc},
        },
        error::{Classify as _, ErrorClass},
        note::Nullifier,
        reward::{Accumulator, SCALE},
    };

    /// Half a unit of reward per unit of value.
    const HALF: u128 = 500_000_000;

    /// Inputs 50 + 30 against outputs 70 + 10 balance exactly.
    #[test]
    fn balanced_transaction_accepted() {
        let mut fx = Fixture::new(0);
        let (statement, witness) = fx.transaction(&[50, 30], &[70, 10]);
        assert_eq!(fx.transact_circuit().check(&statement, &witness), Ok(()));
    }

    /// Outputs 71 + 10 create one unit from nothing.
    #[test]
    fn inflation_rejected() {
        let mut fx = Fixture::new(1);
        let (statement, witness) = fx.transaction(&[50, 30], &[71, 10]);
        let err = fx.transact_circuit().check(&statement, &witness).unwrap_err();
        assert_eq!(err, ValidityError::Conservation { slot: 0 });
        assert_eq!(err.class(), ErrorClass::Soundness);
    }

    /// Withdrawal plus fee balance the missing output value.
    #[test]
    fn public_lines_count_towards_conservation() {
        let mut fx = Fixture::new(2);
        let (mut statement, mut witness) = fx.transaction(&[50, 30], &[60, 10]);
        statement.public_lines[0] = PublicLine {
            asset: usdc(),
            deposit: Value::ZERO,
            withdrawal: Value::from(8u64),
            fee: Value::from(2u64),
        };
        witness.public_slots[0] = 0;
        witness.params.fee = Value::from(2u64);
        statement.params_hash = witness.params.hash();
        assert_eq!(fx.transact_circuit().check(&statement, &witness), Ok(()));

        statement.public_lines[0].withdrawal = Value::from(9u64);
        assert_eq!(
            fx.transact_circuit().check(&statement, &witness),
            Err(ValidityError::Conservation { slot: 0 })
        );
    }

    /// The fee in the signed parameters must be what the lines pay.
    #[test]
    fn fee_is_bound_to_public_lines() {
        let mut fx = Fixture::new(10);
        let (mut statement, mut witness) = fx.transaction(&[50, 30], &[70, 10]);
        witness.params.fee = Value::from(999u64);
        statement.params_hash = witness.params.hash();
        let err = fx.transact_circuit().check(&statement, &witness).unwrap_err();
        assert_eq!(err, ValidityError::FeeMismatch);
        assert_eq!(err.class(), ErrorClass::Soundness);
    }

    /// A note re-snapshotted halfway keeps its sub-unit residue: one unit
    /// at half a unit of reward per unit, spent at a full unit, is worth 2.
    #[test]
    fn rebased_note_keeps_its_value() {
        let mut fx = Fixture::new(11);
        let original = fx.note(1);
        let rebased = original
            .rebase(Accumulator::from(HALF), &mut fx.rng)
            .unwrap();
        assert_eq!(rebased.amount, Value::from(1u64));
        assert_eq!(rebased.remainder, HALF);

        fx.accumulator = Accumulator::from(SCALE);
        let padding = fx.note(0);
        let (statement, witness) = fx.transact(&[rebased, padding], &[2, 0]);
        assert_eq!(fx.transact_circuit().check(&statement, &witness), Ok(()));

        let (direct, direct_witness) = fx.transact(&[original, padding], &[2, 0]);
        assert_eq!(fx.transact_circuit().check(&direct, &direct_witness), Ok(()));
    }

    /// Outputs may carry the residue the inputs left over, and no more.
    #[test]
    fn residue_is_carried_not_created() {
        let mut fx = Fixture::new(12);
        let rebased = fx
            .note(1)
            .rebase(Accumulator::from(HALF), &mut fx.rng)
            .unwrap();
        fx.accumulator = Accumulator::from(HALF);
        let padding = fx.note(0);
        let (mut statement, mut witness) = fx.transact(&[rebased, padding], &[1, 0]);
        let circuit = fx.transact_circuit();

        let mut carry = |remainder: u128| {
            let output = &mut witness.outputs[0].note;
            *output = output.with_remainder(remainder);
            statement.commitments[0] = output.commitment();
            circuit.check(&statement, &witness)
        };
        assert_eq!(carry(HALF), Ok(()));
        let err = carry(HALF + 1).unwrap_err();
        assert_eq!(err, ValidityError::ResidueOverdrawn { slot: 0 });
        assert_eq!(err.class(), ErrorClass::Soundness);
        assert_eq!(
            carry(SCALE),
            Err(ValidityError::Reward(RewardError::RemainderOutOfRange(SCALE)))
        );
    }

    #[test]
    fn shape_must_match() {
        let mut fx = Fixture::new(3);
        let (mut statement, witness) = fx.transaction(&[50, 30], &[70, 10]);
        statement.commitments.pop();
        let err = fx.transact_circuit().check(&statement, &witness).unwrap_err();
        assert_eq!(
            err,
            ValidityError::ShapeMismatch {
                field: "commitments",
                expected: 2,
                actual: 1
            }
        );
        assert_eq!(err.class(), ErrorClass::Malformed);
    }

    #[test]
    fn routing_is_enforced() {
        let mut fx = Fixture::new(4);
        let (statement, mut witness) = fx.transaction(&[50, 30], &[70, 10]);

        witness.outputs[1].slot = 1;
        assert_eq!(
            fx.transact_circuit().check(&statement, &witness),
            Err(ValidityError::AssetMismatch { slot: 1 })
        );

        witness.outputs[1].slot = 2;
        assert_eq!(
            fx.transact_circuit().check(&statement, &witness),
            Err(ValidityError::SlotOutOfRange { slot: 2, slots: 2 })
        );

        let mut doubled = statement;
        doubled.roster[1] = usdc();
        witness.outputs[1].slot = 0;
        assert_eq!(
            fx.transact_circuit().check(&doubled, &witness),
            Err(ValidityError::NotOneHot { slot: 0 })
        );
    }

    #[test]
    fn bound_values_are_checked() {
        let mut fx = Fixture::new(5);
        let (statement, witness) = fx.transaction(&[50, 30], &[70, 10]);
        let circuit = fx.transact_circuit();

        let mut wrong_nf = statement.clone();
        wrong_nf.nullifiers[1] = Nullifier::from(Fp::ONE);
        assert_eq!(
            circuit.check(&wrong_nf, &witness),
            Err(ValidityError::NullifierMismatch(1))
        );

        let mut wrong_cm = statement.clone();
        wrong_cm.commitments[0] = wrong_cm.commitments[1];
        assert_eq!(
            circuit.check(&wrong_cm, &witness),
            Err(ValidityError::CommitmentMismatch(0))
        );

        let mut wrong_params = witness.clone();
        wrong_params.params = TransactParams {
            deadline: 99,
            ..witness.params
        };
        assert_eq!(
            circuit.check(&statement, &wrong_params),
            Err(ValidityError::ParamsMismatch)
        );

        let mut duplicated = statement.clone();
        duplicated.nullifiers[1] = duplicated.nullifiers[0];
        let err = circuit.check(&duplicated, &witness).unwrap_err();
        assert_eq!(err, ValidityError::DuplicateNullifier(1));
        assert_eq!(err.class(), ErrorClass::DoubleSpend);
    }

    /// Roots other than the ones the witnesses were taken against fail
    /// membership or non-membership.
    #[test]
    fn roots_are_checked() {
        let mut fx = Fixture::new(6);
        let (statement, witness) = fx.transaction(&[50, 30], &[70, 10]);
        let circuit = fx.transact_circuit();

        let mut wrong_cm_root = statement.clone();
        fx.append_note(5);
        wrong_cm_root.commitment_root = fx.commitments.root();
        assert_eq!(
            circuit.check(&wrong_cm_root, &witness),
            Err(ValidityError::MembershipFailed(0))
        );

        fx.nullifiers.insert(Nullifier::from(Fp::from(3u64))).unwrap();
        let mut wrong_nf_root = statement;
        wrong_nf_root.nullifier_root = fx.nullifiers.root();
        assert_eq!(
            circuit.check(&wrong_nf_root, &witness),
            Err(ValidityError::NonMembershipFailed(0))
        );
    }

    /// A spent nullifier cannot be proven absent.
    #[test]
    fn spent_input_rejected() {
        let mut fx = Fixture::new(7);
        let (mut statement, witness) = fx.transaction(&[50, 30], &[70, 10]);
        let spent = statement.nullifiers[0];
        fx.nullifiers.insert(spent).unwrap();
        assert!(fx.nullifiers.low_leaf(spent).is_err());
        statement.nullifier_root = fx.nullifiers.root();
        assert_eq!(
            fx.transact_circuit().check(&statement, &witness),
            Err(ValidityError::NonMembershipFailed(0))
        );
    }

    #[test]
    fn foreign_owner_rejected() {
        let mut fx = Fixture::new(8);
        let (statement, mut witness) = fx.transaction(&[50, 30], &[70, 10]);
        witness.inputs[0].spend.authority = Fixture::authority(99);
        assert_eq!(
            fx.transact_circuit().check(&statement, &witness),
            Err(ValidityError::OwnerMismatch(0))
        );
    }

    #[test]
    fn amounts_are_range_checked() {
        let mut fx = Fixture::new(9);
        let (mut statement, witness) = fx.transaction(&[50, 30], &[70, 10]);
        statement.public_lines[1].deposit = Value::from(1u128 << 64);
        let err = fx.transact_circuit().check(&statement, &witness).unwrap_err();
        assert!(matches!(err, ValidityError::Value(_)));
        assert_eq!(err.class(), ErrorClass::Malformed);
    }

    /// With a 10% accumulator growth the 50 + 30 inputs are worth 88.
    #[test]
    fn inputs_accrue_rewards() {
        let mut fx = Fixture::new(10);
        fx.accumulator = Accumulator::from(100_000_000);
        let (statement, witness) = fx.transaction(&[50, 30], &[80, 8]);
        assert_eq!(fx.transact_circuit().check(&statement, &witness), Ok(()));

        let mut stale_line = statement;
        stale_line.reward_lines[0] = RewardLine {
            asset: usdc(),
            accumulator: Accumulator::ZERO,
        };
        assert_eq!(
            fx.transact_circuit().check(&stale_line, &witness),
            Err(ValidityError::SnapshotMismatch(0))
        );
    }
}
