//! Validity predicates.
//!
//! Three predicates decide which state transitions the pool accepts:
//!
//! - **[`TransactCircuit`]**: spend up to `nIn` notes and create up to
//!   `nOut` notes across the roster's assets, with public deposits,
//!   withdrawals and fees, conserving value per asset.
//! - **[`DeployCircuit`]**: spend notes of a mining round's asset into a
//!   hidden [`Deployment`](crate::mining::Deployment) plus change.
//! - **[`ClaimCircuit`]**: reveal a winning deployment from a frozen round
//!   and mint its payout.
//!
//! Each is a [`Circuit`]: a public [`Statement`], a private witness and a
//! `check` that either accepts or names the first violated constraint as a
//! [`ValidityError`]. The constraints an arithmetic circuit would enforce
//! become ordinary branches; the set of checks is the same.
//!
//! ## Spending a note
//!
//! Shared by transactions and deployments. For input `i`:
//!
//! 1. `pk(ask) = note.owner`
//! 2. $nf_i = H(nk(nsk), cm, position)$ equals `nullifiers[i]`
//! 3. if `amount > 0`: $cm \in$ `commitment_root` and $nf_i \notin$
//!    `nullifier_root`
//! 4. value accrues against the single reward line of the note's asset
//!
//! Zero-amount inputs are padding and skip step 3. Their nullifiers are
//! still bound, so padding is indistinguishable from real spends.

use alloc::{collections::BTreeSet, vec::Vec};

use pasta_curves::Fp;

use crate::{
    constants::NOTE_VERSION,
    error::{Classify, ErrorClass},
    mining::MiningError,
    note::Nullifier,
    primitives::{AssetId, CommitmentRoot, NullifierRoot},
    reward::{Accumulator, RewardError},
    tree::{verify_membership, verify_non_membership},
    value::ValueError,
};

mod header;
mod mining;
mod roster;
mod transact;
mod witnesses;

pub use header::{
    ClaimStatement, DeployStatement, PublicLine, RewardLine, TransactParams, TransactParamsHash,
    TransactStatement,
};
pub use mining::{ClaimCircuit, DeployCircuit};
pub use transact::TransactCircuit;
pub use witnesses::{
    ClaimWitness, DeployWitness, InputWitness, OutputWitness, SpendWitness, TransactWitness,
};

/// A public statement.
pub trait Statement {
    /// The statement as the ordered field elements a proof binds.
    fn public_inputs(&self) -> Vec<Fp>;
}

/// A validity predicate over a public statement and a private witness.
pub trait Circuit {
    /// Proof transcript domain.
    const ID: &'static [u8];

    /// Public part.
    type Statement: Statement;

    /// Private part.
    type Witness;

    /// Accepts iff `witness` satisfies the predicate for `statement`.
    fn check(&self, statement: &Self::Statement, witness: &Self::Witness)
    -> Result<(), ValidityError>;
}

/// The first constraint a witness violates.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ValidityError {
    /// A statement or witness vector does not match the circuit shape.
    #[error("{field} has {actual} entries, expected {expected}")]
    ShapeMismatch {
        /// The offending vector.
        field: &'static str,
        /// Required length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// Only the current note version is accepted.
    #[error("unsupported note version {0}")]
    UnsupportedVersion(u8),

    /// A non-zero input lacks its membership or non-membership path.
    #[error("input {0} is missing a merkle witness")]
    MissingWitness(usize),

    /// An amount outside the configured range, or a sum overflow.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// A mining field outside its domain.
    #[error(transparent)]
    Mining(#[from] MiningError),

    /// The same nullifier is spent twice in one statement.
    #[error("nullifier at position {0} repeats an earlier one")]
    DuplicateNullifier(usize),

    /// A line claims a slot that does not exist.
    #[error("roster slot {slot} does not exist ({slots} slots)")]
    SlotOutOfRange {
        /// Claimed slot.
        slot: usize,
        /// Roster length.
        slots: usize,
    },

    /// A line's asset differs from its slot's asset.
    #[error("asset does not match roster slot {slot}")]
    AssetMismatch {
        /// Claimed slot.
        slot: usize,
    },

    /// A slot's asset appears more than once in the roster.
    #[error("asset of roster slot {slot} is not unique")]
    NotOneHot {
        /// Claimed slot.
        slot: usize,
    },

    /// Inputs and deposits differ from outputs, withdrawals and fees.
    #[error("value is not conserved in roster slot {slot}")]
    Conservation {
        /// The unbalanced slot.
        slot: usize,
    },

    /// Outputs carry more reward residue than the inputs released.
    #[error("outputs of roster slot {slot} carry unreleased reward residue")]
    ResidueOverdrawn {
        /// The overdrawn slot.
        slot: usize,
    },

    /// `pk(ask)` differs from the note's owner.
    #[error("input {0} is not owned by the spend authority")]
    OwnerMismatch(usize),

    /// A recomputed nullifier differs from the statement.
    #[error("nullifier {0} does not match its input")]
    NullifierMismatch(usize),

    /// A recomputed commitment differs from the statement.
    #[error("commitment {0} does not match its output")]
    CommitmentMismatch(usize),

    /// The commitment is not in the accumulator under the root.
    #[error("input {0} is not a member of the commitment root")]
    MembershipFailed(usize),

    /// The nullifier is not provably absent under the root.
    #[error("input {0} has no valid non-membership witness")]
    NonMembershipFailed(usize),

    /// No reward line, or more than one, for the asset.
    #[error("no unique reward line for the asset of entry {0}")]
    RewardLine(usize),

    /// A mining input or output is not of the round's asset.
    #[error("entry {0} is not of the round's asset")]
    ForeignAsset(usize),

    /// An output's snapshot differs from its asset's reward line.
    #[error("output {0} does not snapshot the current accumulator")]
    SnapshotMismatch(usize),

    /// Accrual failed.
    #[error(transparent)]
    Reward(#[from] RewardError),

    /// The witness parameters do not hash to the statement's.
    #[error("transaction parameters do not match their hash")]
    ParamsMismatch,

    /// The parameters' fee differs from the sum of public-line fees.
    #[error("transaction fee does not match the public lines")]
    FeeMismatch,

    /// The deployment belongs to another round.
    #[error("deployment is for another round")]
    RoundMismatch,

    /// The winning block is outside `0..25`.
    #[error("winning block {0} is out of range")]
    WinningBlockOutOfRange(u8),

    /// The deployment did not select the winning block.
    #[error("deployment did not select block {0}")]
    NotAWinner(u8),

    /// The reward note does not pay exactly the payout.
    #[error("reward note does not match the payout")]
    PayoutMismatch,
}

impl Classify for ValidityError {
    fn class(&self) -> ErrorClass {
        match *self {
            Self::ShapeMismatch { .. }
            | Self::UnsupportedVersion(_)
            | Self::MissingWitness(_)
            | Self::Value(_)
            | Self::Mining(_)
            | Self::SlotOutOfRange { .. }
            | Self::WinningBlockOutOfRange(_) => ErrorClass::Malformed,
            Self::DuplicateNullifier(_) => ErrorClass::DoubleSpend,
            Self::AssetMismatch { .. }
            | Self::NotOneHot { .. }
            | Self::Conservation { .. }
            | Self::ResidueOverdrawn { .. }
            | Self::OwnerMismatch(_)
            | Self::NullifierMismatch(_)
            | Self::CommitmentMismatch(_)
            | Self::MembershipFailed(_)
            | Self::NonMembershipFailed(_)
            | Self::RewardLine(_)
            | Self::ForeignAsset(_)
            | Self::SnapshotMismatch(_)
            | Self::Reward(_)
            | Self::ParamsMismatch
            | Self::FeeMismatch
            | Self::RoundMismatch
            | Self::NotAWinner(_)
            | Self::PayoutMismatch => ErrorClass::Soundness,
        }
    }
}

// =============================================================================
// Shared constraints
// =============================================================================

/// Requires `actual == expected` for a named vector.
const fn check_len(
    field: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), ValidityError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ValidityError::ShapeMismatch {
            field,
            expected,
            actual,
        })
    }
}

const fn check_version(version: u8) -> Result<(), ValidityError> {
    if version == NOTE_VERSION {
        Ok(())
    } else {
        Err(ValidityError::UnsupportedVersion(version))
    }
}

/// Rejects a nullifier list with repeats.
fn check_distinct(nullifiers: &[Nullifier]) -> Result<(), ValidityError> {
    let mut seen = BTreeSet::new();
    for (index, nf) in nullifiers.iter().enumerate() {
        if !seen.insert(*nf) {
            return Err(ValidityError::DuplicateNullifier(index));
        }
    }
    Ok(())
}

/// Checks steps 1–3 of spending input `index` against `nullifier`.
fn check_spend(
    spend: &SpendWitness,
    index: usize,
    nullifier: Nullifier,
    commitment_root: CommitmentRoot,
    nullifier_root: NullifierRoot,
    amount_bits: u32,
) -> Result<(), ValidityError> {
    let note = &spend.note;
    check_version(note.version)?;
    note.amount.check_range(amount_bits)?;

    if spend.authority.public_key() != note.owner {
        return Err(ValidityError::OwnerMismatch(index));
    }

    let cm = note.commitment();
    if note.nullifier(&spend.authority.nullifier_key(), spend.position) != nullifier {
        return Err(ValidityError::NullifierMismatch(index));
    }

    if note.amount.is_zero() {
        return Ok(());
    }

    let membership = spend
        .membership
        .as_ref()
        .ok_or(ValidityError::MissingWitness(index))?;
    if !verify_membership(commitment_root, cm, spend.position, membership) {
        return Err(ValidityError::MembershipFailed(index));
    }

    let low = spend
        .non_membership
        .as_ref()
        .ok_or(ValidityError::MissingWitness(index))?;
    if !verify_non_membership(nullifier_root, nullifier, low) {
        return Err(ValidityError::NonMembershipFailed(index));
    }
    Ok(())
}

/// The accumulator of the single reward line carrying `asset`.
fn reward_line(
    lines: &[RewardLine],
    asset: AssetId,
    index: usize,
) -> Result<Accumulator, ValidityError> {
    let mut matching = lines.iter().filter(|line| line.asset == asset);
    match (matching.next(), matching.next()) {
        (Some(line), None) => Ok(line.accumulator),
        (Some(_), Some(_)) | (None, _) => Err(ValidityError::RewardLine(index)),
    }
}

#[cfg(test)]
pub(crate) mod testing;
