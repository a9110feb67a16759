//! Public statements.
//!
//! A statement is everything the verifier sees. Its
//! [`public_inputs`](Statement::public_inputs) flatten it into the ordered
//! field elements the proof transcript binds; any change to a single
//! element invalidates the proof.

use alloc::vec::Vec;

use pasta_curves::Fp;

use super::Statement;
use crate::{
    constants::TRANSACT_PARAMS_PERSONALIZATION,
    mining::DeploymentCommitment,
    note::{Commitment, Nullifier},
    primitives::{AssetId, CommitmentRoot, DomainHasher, NullifierRoot},
    reward::Accumulator,
    value::Value,
};

/// The accumulator value a transaction accrues against for one asset.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RewardLine {
    /// The asset.
    pub asset: AssetId,
    /// Its global accumulator.
    pub accumulator: Accumulator,
}

impl RewardLine {
    /// The zero padding line.
    pub const PADDING: Self = Self {
        asset: AssetId::ZERO,
        accumulator: Accumulator::ZERO,
    };
}

/// Public value entering or leaving the pool for one asset.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PublicLine {
    /// The asset.
    pub asset: AssetId,
    /// Value deposited into the pool.
    pub deposit: Value,
    /// Value withdrawn to the recipient.
    pub withdrawal: Value,
    /// Value paid to the relayer.
    pub fee: Value,
}

impl PublicLine {
    /// The zero padding line.
    pub const PADDING: Self = Self {
        asset: AssetId::ZERO,
        deposit: Value::ZERO,
        withdrawal: Value::ZERO,
        fee: Value::ZERO,
    };

    /// Whether the line moves no value (padding).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.deposit.is_zero() && self.withdrawal.is_zero() && self.fee.is_zero()
    }
}

/// External parameters a transaction commits to without the predicate
/// interpreting them.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransactParams {
    /// Withdrawal recipient address.
    pub recipient: [u8; 32],
    /// Relayer address.
    pub relayer: [u8; 32],
    /// Relayer fee as quoted to the relayer.
    pub fee: Value,
    /// Last slot or height at which the transaction may land.
    pub deadline: u64,
}

impl TransactParams {
    /// `H("Pool-TxParams", recipient || relayer || fee || deadline)`.
    #[must_use]
    pub fn hash(&self) -> TransactParamsHash {
        TransactParamsHash(
            DomainHasher::new(TRANSACT_PARAMS_PERSONALIZATION)
                .bytes(&self.recipient)
                .bytes(&self.relayer)
                .u128(self.fee.into())
                .u64(self.deadline)
                .finalize(),
        )
    }
}

field_element! {
    /// Hash of the [`TransactParams`], bound by the proof transcript.
    pub struct TransactParamsHash;
}

/// Public statement of the transaction predicate.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransactStatement {
    /// Commitment accumulator root the inputs are members of.
    pub commitment_root: CommitmentRoot,
    /// Nullifier tree root the nullifiers are absent from.
    pub nullifier_root: NullifierRoot,
    /// One nullifier per input slot.
    pub nullifiers: Vec<Nullifier>,
    /// One commitment per output slot.
    pub commitments: Vec<Commitment>,
    /// Accumulators accrued against and snapshotted by outputs.
    pub reward_lines: Vec<RewardLine>,
    /// Public deposits, withdrawals and fees.
    pub public_lines: Vec<PublicLine>,
    /// Asset of each conservation slot.
    pub roster: Vec<AssetId>,
    /// Hash of the external parameters.
    pub params_hash: TransactParamsHash,
}

impl Statement for TransactStatement {
    fn public_inputs(&self) -> Vec<Fp> {
        let mut inputs = alloc::vec![self.commitment_root.into(), self.nullifier_root.into()];
        inputs.extend(self.nullifiers.iter().map(|&nf| Fp::from(nf)));
        inputs.extend(self.commitments.iter().map(|&cm| Fp::from(cm)));
        for line in &self.reward_lines {
            inputs.extend([line.asset.into(), line.accumulator.to_field()]);
        }
        for line in &self.public_lines {
            inputs.extend([
                line.asset.into(),
                line.deposit.to_field(),
                line.withdrawal.to_field(),
                line.fee.to_field(),
            ]);
        }
        inputs.extend(self.roster.iter().map(|&asset| Fp::from(asset)));
        inputs.push(self.params_hash.into());
        inputs
    }
}

/// Public statement of the mining deploy predicate.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeployStatement {
    /// Commitment accumulator root the inputs are members of.
    pub commitment_root: CommitmentRoot,
    /// Nullifier tree root the nullifiers are absent from.
    pub nullifier_root: NullifierRoot,
    /// One nullifier per input slot.
    pub nullifiers: Vec<Nullifier>,
    /// Round being deployed to.
    pub round: u64,
    /// The round's asset.
    pub asset: AssetId,
    /// Current accumulator of `asset`.
    pub accumulator: Accumulator,
    /// The published deployment.
    pub deployment: DeploymentCommitment,
    /// Commitment of the change note.
    pub change: Commitment,
    /// Public fee.
    pub fee: Value,
}

impl Statement for DeployStatement {
    fn public_inputs(&self) -> Vec<Fp> {
        let mut inputs = alloc::vec![self.commitment_root.into(), self.nullifier_root.into()];
        inputs.extend(self.nullifiers.iter().map(|&nf| Fp::from(nf)));
        inputs.extend([
            Fp::from(self.round),
            self.asset.into(),
            self.accumulator.to_field(),
            self.deployment.into(),
            self.change.into(),
            self.fee.to_field(),
        ]);
        inputs
    }
}

/// Public statement of the mining claim predicate.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClaimStatement {
    /// The round's frozen commitment root.
    pub snapshot_root: CommitmentRoot,
    /// Nullifier tree root the claim nullifier is absent from.
    pub nullifier_root: NullifierRoot,
    /// Claim nullifier of the deployment.
    pub nullifier: Nullifier,
    /// Round claimed from.
    pub round: u64,
    /// The round's winning block.
    pub winning_block: u8,
    /// The round's payout rate.
    pub reward_rate: Accumulator,
    /// The round's asset.
    pub asset: AssetId,
    /// Current accumulator of `asset`.
    pub accumulator: Accumulator,
    /// Commitment of the reward note.
    pub reward: Commitment,
}

impl Statement for ClaimStatement {
    fn public_inputs(&self) -> Vec<Fp> {
        alloc::vec![
            self.snapshot_root.into(),
            self.nullifier_root.into(),
            self.nullifier.into(),
            Fp::from(self.round),
            Fp::from(u64::from(self.winning_block)),
            self.reward_rate.to_field(),
            self.asset.into(),
            self.accumulator.to_field(),
            self.reward.into(),
        ]
    }
}
