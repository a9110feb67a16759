//! Deploy and claim predicates of the mining extension.

use super::{
    Circuit, ClaimStatement, ClaimWitness, DeployStatement, DeployWitness, ValidityError,
    check_distinct, check_len, check_spend, check_version, roster::settle,
};
use crate::{
    constants::{CLAIM_CIRCUIT_ID, DEPLOY_CIRCUIT_ID, MINING_BLOCKS},
    note::{Commitment, Note},
    params::Params,
    primitives::AssetId,
    reward::{self, Accumulator, RewardError},
    tree::{verify_membership, verify_non_membership},
    value::Balance,
};

/// Checks a note created by a mining predicate: current version, in range,
/// of the round's asset and snapshotted at its current accumulator.
///
/// `index` is the note's position among the predicate's outputs.
fn check_mining_output(
    note: &Note,
    index: usize,
    asset: AssetId,
    accumulator: Accumulator,
    amount_bits: u32,
) -> Result<(), ValidityError> {
    check_version(note.version)?;
    note.amount.check_range(amount_bits)?;
    if note.asset != asset {
        return Err(ValidityError::ForeignAsset(index));
    }
    if !note.amount.is_zero() && note.snapshot != accumulator {
        return Err(ValidityError::SnapshotMismatch(index));
    }
    if note.remainder >= reward::SCALE {
        return Err(RewardError::RemainderOutOfRange(note.remainder).into());
    }
    Ok(())
}

/// Spends `inputs` notes of the round's asset into a hidden deployment and a
/// change note:
///
/// $$\sum \text{inputs} = \text{deployment} + \text{change} + \text{fee}$$
///
/// The deployment is output `0` and the change output `1`. The inputs'
/// reward residue settles in `1 / SCALE` units against the change.
#[derive(Clone, Copy, Debug)]
pub struct DeployCircuit {
    /// Number of input slots.
    pub inputs: usize,
    /// Amounts must be `< 2^amount_bits`.
    pub amount_bits: u32,
}

impl DeployCircuit {
    /// The predicate for a pool configured with `params`.
    #[must_use]
    pub const fn new(params: &Params) -> Self {
        Self {
            inputs: params.deploy_inputs,
            amount_bits: params.amount_bits,
        }
    }
}

impl Circuit for DeployCircuit {
    const ID: &'static [u8] = DEPLOY_CIRCUIT_ID;

    type Statement = DeployStatement;
    type Witness = DeployWitness;

    fn check(
        &self,
        statement: &DeployStatement,
        witness: &DeployWitness,
    ) -> Result<(), ValidityError> {
        check_len("nullifiers", self.inputs, statement.nullifiers.len())?;
        check_len("inputs", self.inputs, witness.inputs.len())?;
        check_distinct(&statement.nullifiers)?;

        let mut balance = Balance::default();
        for (index, (spend, &nullifier)) in
            witness.inputs.iter().zip(&statement.nullifiers).enumerate()
        {
            check_spend(
                spend,
                index,
                nullifier,
                statement.commitment_root,
                statement.nullifier_root,
                self.amount_bits,
            )?;
            let note = &spend.note;
            if note.amount.is_zero() {
                continue;
            }
            if note.asset != statement.asset {
                return Err(ValidityError::ForeignAsset(index));
            }
            let accrual = note.value_at(statement.accumulator)?;
            balance.credit(accrual.value)?;
            balance.release(accrual.remainder)?;
        }

        let deployment = &witness.deployment;
        if deployment.round != statement.round {
            return Err(ValidityError::RoundMismatch);
        }
        deployment.amount.check_range(self.amount_bits)?;
        if deployment.commitment() != statement.deployment {
            return Err(ValidityError::CommitmentMismatch(0));
        }

        let change = &witness.change;
        check_mining_output(
            change,
            1,
            statement.asset,
            statement.accumulator,
            self.amount_bits,
        )?;
        if change.commitment() != statement.change {
            return Err(ValidityError::CommitmentMismatch(1));
        }
        statement.fee.check_range(self.amount_bits)?;

        balance.debit(deployment.amount)?;
        balance.debit(change.amount)?;
        balance.debit(statement.fee)?;
        balance.carry(change.remainder)?;
        settle(&balance, 0)
    }
}

/// Reveals a deployment that selected the round's winning block and mints
/// its payout:
///
/// $$\text{reward} = \text{amount} + \lfloor \text{amount} \cdot \text{rate} / \text{SCALE} \rfloor$$
///
/// Membership is proven against the round's frozen snapshot root, so
/// deployments made after the freeze cannot claim.
#[derive(Clone, Copy, Debug)]
pub struct ClaimCircuit {
    /// Amounts must be `< 2^amount_bits`.
    pub amount_bits: u32,
}

impl ClaimCircuit {
    /// The predicate for a pool configured with `params`.
    #[must_use]
    pub const fn new(params: &Params) -> Self {
        Self {
            amount_bits: params.amount_bits,
        }
    }
}

impl Circuit for ClaimCircuit {
    const ID: &'static [u8] = CLAIM_CIRCUIT_ID;

    type Statement = ClaimStatement;
    type Witness = ClaimWitness;

    fn check(
        &self,
        statement: &ClaimStatement,
        witness: &ClaimWitness,
    ) -> Result<(), ValidityError> {
        let block = statement.winning_block;
        if usize::from(block) >= MINING_BLOCKS {
            return Err(ValidityError::WinningBlockOutOfRange(block));
        }

        let deployment = &witness.deployment;
        if deployment.round != statement.round {
            return Err(ValidityError::RoundMismatch);
        }
        if witness.authority.public_key() != deployment.owner {
            return Err(ValidityError::OwnerMismatch(0));
        }
        deployment.amount.check_range(self.amount_bits)?;

        let dcm = Commitment::from(deployment.commitment());
        if !verify_membership(
            statement.snapshot_root,
            dcm,
            witness.position,
            &witness.membership,
        ) {
            return Err(ValidityError::MembershipFailed(0));
        }

        let nullifier = deployment.nullifier(&witness.authority.nullifier_key(), witness.position);
        if nullifier != statement.nullifier {
            return Err(ValidityError::NullifierMismatch(0));
        }
        if !verify_non_membership(statement.nullifier_root, nullifier, &witness.non_membership) {
            return Err(ValidityError::NonMembershipFailed(0));
        }

        if !deployment.mask.contains(block) {
            return Err(ValidityError::NotAWinner(block));
        }

        let reward = &witness.reward;
        check_mining_output(
            reward,
            0,
            statement.asset,
            statement.accumulator,
            self.amount_bits,
        )?;
        if reward.remainder != 0 {
            return Err(ValidityError::ResidueOverdrawn { slot: 0 });
        }
        if reward.amount != reward::payout(deployment.amount, statement.reward_rate)? {
            return Err(ValidityError::PayoutMismatch);
        }
        if reward.commitment() != statement.reward {
            return Err(ValidityError::CommitmentMismatch(0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use pasta_curves::Fp;

    use super::*;
    use crate::{
        circuit::{
            SpendWitness,
            testing::{AMOUNT_BITS, Fixture, sol, usdc},
        },
        error::{Classify as _, ErrorClass},
        mining::{BlockMask, Deployment},
        note::Nullifier,
        value::Value,
    };

    const ROUND: u64 = 5;
    const RATE: u128 = 500_000_000;

    fn deploy_circuit() -> DeployCircuit {
        DeployCircuit {
            inputs: 2,
            amount_bits: AMOUNT_BITS,
        }
    }

    const CLAIM: ClaimCircuit = ClaimCircuit {
        amount_bits: AMOUNT_BITS,
    };

    /// Deploys `amount` selecting `blocks` from fresh notes of `inputs`,
    /// returning change `change` and paying `fee`.
    fn deploy(
        fx: &mut Fixture,
        inputs: &[u64],
        amount: u64,
        blocks: &[u8],
        change: u64,
        fee: u64,
    ) -> (DeployStatement, DeployWitness) {
        let notes: Vec<_> = inputs.iter().map(|&value| fx.append_note(value)).collect();
        let spends: Vec<SpendWitness> = notes
            .into_iter()
            .map(|(note, position)| fx.spend(note, position))
            .collect();
        let nk = fx.authority.nullifier_key();
        let owner = fx.authority.public_key();
        let deployment = Deployment::new(
            ROUND,
            Value::from(amount),
            BlockMask::from_blocks(blocks).unwrap(),
            owner,
            &mut fx.rng,
        );
        let change = Note::new(usdc(), Value::from(change), owner, fx.accumulator, &mut fx.rng);
        let statement = DeployStatement {
            commitment_root: fx.commitments.root(),
            nullifier_root: fx.nullifiers.root(),
            nullifiers: spends
                .iter()
                .map(|spend| spend.note.nullifier(&nk, spend.position))
                .collect(),
            round: ROUND,
            asset: usdc(),
            accumulator: fx.accumulator,
            deployment: deployment.commitment(),
            change: change.commitment(),
            fee: Value::from(fee),
        };
        let witness = DeployWitness {
            inputs: spends,
            deployment,
            change,
        };
        (statement, witness)
    }

    /// Commits `deployment`, freezes at the resulting root and builds the
    /// claim for `winning_block`.
    fn claim(
        fx: &mut Fixture,
        deployment: Deployment,
        winning_block: u8,
    ) -> (ClaimStatement, ClaimWitness) {
        let (snapshot_root, position) = fx
            .commitments
            .append(deployment.commitment().into())
            .unwrap();
        let nullifier = deployment.nullifier(&fx.authority.nullifier_key(), position);
        let rate = Accumulator::from(RATE);
        let reward = Note::new(
            usdc(),
            reward::payout(deployment.amount, rate).unwrap(),
            fx.authority.public_key(),
            fx.accumulator,
            &mut fx.rng,
        );
        let statement = ClaimStatement {
            snapshot_root,
            nullifier_root: fx.nullifiers.root(),
            nullifier,
            round: ROUND,
            winning_block,
            reward_rate: rate,
            asset: usdc(),
            accumulator: fx.accumulator,
            reward: reward.commitment(),
        };
        let witness = ClaimWitness {
            deployment,
            authority: fx.authority,
            position,
            membership: fx
                .commitments
                .prove_membership(deployment.commitment().into(), position)
                .unwrap(),
            non_membership: fx.nullifiers.low_leaf(nullifier).unwrap(),
            reward,
        };
        (statement, witness)
    }

    #[test]
    fn deploy_conserves_value() {
        let mut fx = Fixture::new(20);
        let (statement, witness) = deploy(&mut fx, &[600, 450], 1000, &[1], 40, 10);
        assert_eq!(deploy_circuit().check(&statement, &witness), Ok(()));

        let (greedy, greedy_witness) = deploy(&mut fx, &[600, 450], 1000, &[1], 41, 10);
        assert_eq!(
            deploy_circuit().check(&greedy, &greedy_witness),
            Err(ValidityError::Conservation { slot: 0 })
        );
    }

    #[test]
    fn deploy_binds_round_and_commitments() {
        let mut fx = Fixture::new(21);
        let (statement, witness) = deploy(&mut fx, &[600, 450], 1000, &[1], 40, 10);

        let mut other_round = witness.clone();
        other_round.deployment.round = ROUND + 1;
        assert_eq!(
            deploy_circuit().check(&statement, &other_round),
            Err(ValidityError::RoundMismatch)
        );

        let mut other_mask = witness.clone();
        other_mask.deployment.mask = BlockMask::from_blocks(&[2]).unwrap();
        assert_eq!(
            deploy_circuit().check(&statement, &other_mask),
            Err(ValidityError::CommitmentMismatch(0))
        );

        let mut other_change = statement.clone();
        other_change.change = Commitment::from(statement.deployment);
        assert_eq!(
            deploy_circuit().check(&other_change, &witness),
            Err(ValidityError::CommitmentMismatch(1))
        );
    }

    /// Only notes of the round's asset may fund a deployment.
    #[test]
    fn deploy_rejects_foreign_asset() {
        let mut fx = Fixture::new(22);
        let (mut statement, witness) = deploy(&mut fx, &[600, 450], 1000, &[1], 40, 10);
        statement.asset = sol();
        let err = deploy_circuit().check(&statement, &witness).unwrap_err();
        assert_eq!(err, ValidityError::ForeignAsset(0));
        assert_eq!(err.class(), ErrorClass::Soundness);
    }

    /// At a thousandth of a unit per unit, 600 and 450 leave 1.05 units of
    /// residue: one more unit of change plus 0.05 carried on.
    #[test]
    fn deploy_change_absorbs_residue() {
        const CARRIED: u128 = 50_000_000;
        let mut fx = Fixture::new(26);
        fx.accumulator = Accumulator::from(1_000_000);
        let (mut statement, mut witness) = deploy(&mut fx, &[600, 450], 1000, &[1], 41, 10);

        let mut carry = |remainder: u128| {
            witness.change = witness.change.with_remainder(remainder);
            statement.change = witness.change.commitment();
            deploy_circuit().check(&statement, &witness)
        };
        assert_eq!(carry(CARRIED), Ok(()));
        let err = carry(CARRIED + 1).unwrap_err();
        assert_eq!(err, ValidityError::ResidueOverdrawn { slot: 0 });
        assert_eq!(err.class(), ErrorClass::Soundness);

        let (short, short_witness) = deploy(&mut fx, &[600, 450], 1000, &[1], 40, 10);
        assert_eq!(
            deploy_circuit().check(&short, &short_witness),
            Err(ValidityError::Conservation { slot: 0 })
        );
    }

    /// Deploy 1000 in round 5 selecting block 1: the claim pays out when
    /// block 1 wins and fails when block 2 wins.
    #[test]
    fn claim_requires_winning_block() {
        let mut fx = Fixture::new(23);
        let (_, witness) = deploy(&mut fx, &[600, 450], 1000, &[1], 40, 10);

        let (statement, claim_witness) = claim(&mut fx, witness.deployment, 1);
        assert_eq!(CLAIM.check(&statement, &claim_witness), Ok(()));
        assert_eq!(claim_witness.reward.amount, Value::from(1500u64));

        let losing = ClaimStatement {
            winning_block: 2,
            ..statement.clone()
        };
        assert_eq!(
            CLAIM.check(&losing, &claim_witness),
            Err(ValidityError::NotAWinner(2))
        );

        let out_of_range = ClaimStatement {
            winning_block: 25,
            ..statement
        };
        assert_eq!(
            CLAIM.check(&out_of_range, &claim_witness),
            Err(ValidityError::WinningBlockOutOfRange(25))
        );
    }

    #[test]
    fn claim_pays_exactly_the_payout() {
        let mut fx = Fixture::new(24);
        let (_, witness) = deploy(&mut fx, &[600, 450], 1000, &[1, 2], 40, 10);
        let (mut statement, mut claim_witness) = claim(&mut fx, witness.deployment, 2);

        let exact = claim_witness.reward;
        claim_witness.reward.amount = Value::from(1501u64);
        statement.reward = claim_witness.reward.commitment();
        assert_eq!(
            CLAIM.check(&statement, &claim_witness),
            Err(ValidityError::PayoutMismatch)
        );

        claim_witness.reward = exact.with_remainder(1);
        statement.reward = claim_witness.reward.commitment();
        assert_eq!(
            CLAIM.check(&statement, &claim_witness),
            Err(ValidityError::ResidueOverdrawn { slot: 0 })
        );
    }

    /// A deployment appended after the freeze is not under the snapshot.
    #[test]
    fn claim_is_bound_to_snapshot() {
        let mut fx = Fixture::new(25);
        let (_, witness) = deploy(&mut fx, &[600, 450], 1000, &[1], 40, 10);
        let snapshot = fx.commitments.root();
        let (mut statement, claim_witness) = claim(&mut fx, witness.deployment, 1);
        statement.snapshot_root = snapshot;
        assert_eq!(
            CLAIM.check(&statement, &claim_witness),
            Err(ValidityError::MembershipFailed(0))
        );
    }

    /// Once the claim nullifier is in the tree the claim cannot be repeated.
    #[test]
    fn double_claim_rejected() {
        let mut fx = Fixture::new(26);
        let (_, witness) = deploy(&mut fx, &[600, 450], 1000, &[1], 40, 10);
        let (mut statement, claim_witness) = claim(&mut fx, witness.deployment, 1);

        fx.nullifiers.insert(statement.nullifier).unwrap();
        statement.nullifier_root = fx.nullifiers.root();
        assert_eq!(
            CLAIM.check(&statement, &claim_witness),
            Err(ValidityError::NonMembershipFailed(0))
        );

        let mut forged = statement;
        forged.nullifier = Nullifier::from(Fp::from(7u64));
        assert_eq!(
            CLAIM.check(&forged, &claim_witness),
            Err(ValidityError::NullifierMismatch(0))
        );
    }

    #[test]
    fn claim_requires_owner() {
        let mut fx = Fixture::new(27);
        let (_, witness) = deploy(&mut fx, &[600, 450], 1000, &[1], 40, 10);
        let (statement, mut claim_witness) = claim(&mut fx, witness.deployment, 1);
        claim_witness.authority = Fixture::authority(99);
        assert_eq!(
            CLAIM.check(&statement, &claim_witness),
            Err(ValidityError::OwnerMismatch(0))
        );
    }
}
