//! Private mining: commit/reveal deployments.
//!
//! A miner **deploys** an amount to a round by spending notes and publishing
//! a [`DeploymentCommitment`] that hides which of the
//! [`MINING_BLOCKS`] blocks it selected. When the round is frozen the
//! settlement layer publishes a winning block and a reward rate; a deployment
//! whose mask selects the winning block **claims** a reward note.
//!
//! Deployment commitments are appended to the same accumulator as note
//! commitments but hashed under their own personalization, so a deployment
//! can never be spent as a note nor a note claimed as a deployment.
//!
//! ```text
//!   (none) --deploy--> Deployed --claim--> Claimed
//!                          \
//!                           `--round closed--> Expired
//! ```
//!
//! Expiry is bookkeeping only: nothing on the ledger stops a late claim
//! except the round no longer being frozen.

use bitvec::{order::Lsb0, view::BitView as _};
use pasta_curves::Fp;
use rand::{CryptoRng, RngCore};

use crate::{
    constants::{DEPLOYMENT_COMMITMENT_PERSONALIZATION, MINING_BLOCKS},
    error::{Classify, ErrorClass},
    keys::{NullifierKey, PublicKey},
    note::{Blinding, Commitment, Nullifier},
    primitives::{AssetId, CommitmentRoot, DomainHasher},
    reward::Accumulator,
    value::Value,
};

/// Errors from mining bookkeeping.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum MiningError {
    /// Masks must select at least one block and only blocks `0..25`.
    #[error("block mask {0:#x} is empty or selects blocks beyond 24")]
    InvalidMask(u32),

    /// Block indices are `0..25`.
    #[error("block {0} is out of range")]
    BlockOutOfRange(u8),

    /// The deployment is not in a state that allows the transition.
    #[error("deployment cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// Current status.
        from: DeploymentStatus,
        /// Requested status.
        to: DeploymentStatus,
    },

    /// The round does not exist.
    #[error("round {0} is unknown")]
    UnknownRound(u64),

    /// A round with this id already exists.
    #[error("round {0} already exists")]
    RoundExists(u64),

    /// The round is not accepting deployments.
    #[error("round {0} is not open")]
    RoundNotOpen(u64),

    /// The round has no winning block yet, or is closed.
    #[error("round {0} is not frozen")]
    RoundNotFrozen(u64),
}

impl Classify for MiningError {
    fn class(&self) -> ErrorClass {
        match *self {
            Self::RoundNotOpen(_) | Self::RoundNotFrozen(_) => ErrorClass::Stale,
            Self::InvalidMask(_)
            | Self::BlockOutOfRange(_)
            | Self::InvalidTransition { .. }
            | Self::UnknownRound(_)
            | Self::RoundExists(_) => ErrorClass::Malformed,
        }
    }
}

// =============================================================================
// Block mask
// =============================================================================

/// A private selection of blocks: bit `b` set means block `b` is selected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockMask(u32);

impl BlockMask {
    /// All blocks selected.
    pub const FULL: Self = Self((1 << MINING_BLOCKS) - 1);

    /// Validates a raw 25-bit mask.
    pub const fn new(bits: u32) -> Result<Self, MiningError> {
        if bits == 0 || bits > Self::FULL.0 {
            return Err(MiningError::InvalidMask(bits));
        }
        Ok(Self(bits))
    }

    /// A mask selecting exactly `blocks`.
    pub fn from_blocks(blocks: &[u8]) -> Result<Self, MiningError> {
        let mut bits = 0u32;
        for &block in blocks {
            if usize::from(block) >= MINING_BLOCKS {
                return Err(MiningError::BlockOutOfRange(block));
            }
            bits |= 1 << block;
        }
        Self::new(bits)
    }

    /// Whether `block` is selected.
    #[must_use]
    pub fn contains(self, block: u8) -> bool {
        self.0
            .view_bits::<Lsb0>()
            .get(..MINING_BLOCKS)
            .and_then(|bits| bits.get(usize::from(block)))
            .is_some_and(|bit| *bit)
    }

    /// The selected blocks in ascending order.
    pub fn blocks(self) -> impl Iterator<Item = u8> {
        let bits = self.0;
        (0u8..)
            .take(MINING_BLOCKS)
            .filter(move |&block| Self(bits).contains(block))
    }

    /// Number of selected blocks.
    #[must_use]
    pub fn count(self) -> usize {
        self.0.view_bits::<Lsb0>().count_ones()
    }
}

impl From<BlockMask> for u32 {
    fn from(mask: BlockMask) -> Self {
        mask.0
    }
}

// =============================================================================
// Deployment
// =============================================================================

/// A deployment of `amount` to round `round`, selecting `mask`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Deployment {
    /// Round identifier.
    pub round: u64,
    /// Deployed amount.
    pub amount: Value,
    /// Private block selection.
    pub mask: BlockMask,
    /// Public key allowed to claim.
    pub owner: PublicKey,
    /// Hiding randomness.
    pub blinding: Blinding,
}

impl Deployment {
    /// A deployment with a fresh blinding.
    pub fn new(
        round: u64,
        amount: Value,
        mask: BlockMask,
        owner: PublicKey,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Self {
        Self {
            round,
            amount,
            mask,
            owner,
            blinding: Blinding::random(rng),
        }
    }

    /// `dcm = H("Pool-MineCommit", round || amount || mask || pk || blinding)`.
    #[must_use]
    pub fn commitment(&self) -> DeploymentCommitment {
        DeploymentCommitment(
            DomainHasher::new(DEPLOYMENT_COMMITMENT_PERSONALIZATION)
                .u64(self.round)
                .u128(self.amount.into())
                .u32(self.mask.0)
                .field(&self.owner.into())
                .field(&self.blinding.into())
                .finalize(),
        )
    }

    /// The claim nullifier of this deployment committed at `position`.
    #[must_use]
    pub fn nullifier(&self, nk: &NullifierKey, position: u64) -> Nullifier {
        Nullifier::derive(nk, self.commitment().into(), position)
    }
}

field_element! {
    /// A deployment commitment: a leaf of the commitment accumulator under
    /// the mining domain.
    pub struct DeploymentCommitment;
}

impl From<DeploymentCommitment> for Commitment {
    /// The accumulator leaf the deployment occupies.
    fn from(dcm: DeploymentCommitment) -> Self {
        Self::from(Fp::from(dcm))
    }
}

// =============================================================================
// Deployment lifecycle
// =============================================================================

/// Lifecycle of a deployment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeploymentStatus {
    /// Committed, not yet claimed.
    Deployed,
    /// Reward claimed (terminal).
    Claimed,
    /// Round closed before a claim (terminal).
    Expired,
}

/// Off-chain record of a deployment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeploymentRecord {
    round: u64,
    commitment: DeploymentCommitment,
    position: u64,
    status: DeploymentStatus,
}

impl DeploymentRecord {
    /// A freshly deployed record.
    #[must_use]
    pub const fn new(round: u64, commitment: DeploymentCommitment, position: u64) -> Self {
        Self {
            round,
            commitment,
            position,
            status: DeploymentStatus::Deployed,
        }
    }

    /// Round identifier.
    #[must_use]
    pub const fn round(&self) -> u64 {
        self.round
    }

    /// The published commitment.
    #[must_use]
    pub const fn commitment(&self) -> DeploymentCommitment {
        self.commitment
    }

    /// Leaf index in the accumulator.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> DeploymentStatus {
        self.status
    }

    /// `Deployed -> Claimed`.
    pub fn claim(&mut self) -> Result<(), MiningError> {
        self.transition(DeploymentStatus::Claimed)
    }

    /// `Deployed -> Expired`.
    pub fn expire(&mut self) -> Result<(), MiningError> {
        self.transition(DeploymentStatus::Expired)
    }

    fn transition(&mut self, to: DeploymentStatus) -> Result<(), MiningError> {
        match self.status {
            DeploymentStatus::Deployed => {
                self.status = to;
                Ok(())
            }
            DeploymentStatus::Claimed | DeploymentStatus::Expired => {
                Err(MiningError::InvalidTransition {
                    from: self.status,
                    to,
                })
            }
        }
    }
}

// =============================================================================
// Rounds
// =============================================================================

/// Outcome published when a round is frozen.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RoundOutcome {
    /// Commitment root at freeze time; claims prove membership against it.
    pub snapshot: CommitmentRoot,
    /// The winning block, `0..25`.
    pub winning_block: u8,
    /// Payout rate in `1 / SCALE` units.
    pub reward_rate: Accumulator,
}

/// Round lifecycle: `Open -> Frozen -> Closed`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RoundState {
    /// Accepting deployments.
    Open,
    /// Accepting claims against the outcome.
    Frozen(RoundOutcome),
    /// Done; unclaimed deployments are expired.
    Closed,
}

/// A mining round of one asset.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Round {
    /// Round identifier.
    pub id: u64,
    /// Asset deployed and paid out.
    pub asset: AssetId,
    /// Lifecycle state.
    pub state: RoundState,
}

impl Round {
    /// An open round.
    #[must_use]
    pub const fn open(id: u64, asset: AssetId) -> Self {
        Self {
            id,
            asset,
            state: RoundState::Open,
        }
    }

    /// `Open -> Frozen`.
    pub fn freeze(&mut self, outcome: RoundOutcome) -> Result<(), MiningError> {
        if usize::from(outcome.winning_block) >= MINING_BLOCKS {
            return Err(MiningError::BlockOutOfRange(outcome.winning_block));
        }
        match self.state {
            RoundState::Open => {
                self.state = RoundState::Frozen(outcome);
                Ok(())
            }
            RoundState::Frozen(_) | RoundState::Closed => Err(MiningError::RoundNotOpen(self.id)),
        }
    }

    /// `Frozen -> Closed`.
    pub fn close(&mut self) -> Result<(), MiningError> {
        match self.state {
            RoundState::Frozen(_) => {
                self.state = RoundState::Closed;
                Ok(())
            }
            RoundState::Open | RoundState::Closed => Err(MiningError::RoundNotFrozen(self.id)),
        }
    }

    /// The outcome, if frozen.
    pub const fn outcome(&self) -> Result<RoundOutcome, MiningError> {
        match self.state {
            RoundState::Frozen(outcome) => Ok(outcome),
            RoundState::Open | RoundState::Closed => Err(MiningError::RoundNotFrozen(self.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use ff::Field as _;
    use rand::{SeedableRng as _, rngs::StdRng};

    use super::*;
    use crate::{constants::NOTE_VERSION, keys::SpendingKey, note::Note};

    #[test]
    fn mask_bounds() {
        assert_eq!(BlockMask::new(0), Err(MiningError::InvalidMask(0)));
        assert_eq!(
            BlockMask::new(1 << 25),
            Err(MiningError::InvalidMask(1 << 25))
        );
        assert_eq!(BlockMask::new(1 << 24).map(u32::from), Ok(1 << 24));
        assert_eq!(BlockMask::FULL.count(), 25);
        assert_eq!(
            BlockMask::from_blocks(&[25]),
            Err(MiningError::BlockOutOfRange(25))
        );
    }

    #[test]
    fn mask_selects_blocks() {
        let mask = BlockMask::from_blocks(&[1, 7, 24]).unwrap();
        assert!(mask.contains(1));
        assert!(mask.contains(24));
        assert!(!mask.contains(2));
        assert!(!mask.contains(30));
        assert_eq!(mask.blocks().collect::<Vec<_>>(), [1, 7, 24]);
        assert_eq!(mask.count(), 3);
    }

    /// A deployment and a note over the same field values never share a
    /// commitment.
    #[test]
    fn deployment_domain_is_separate() {
        let mut rng = StdRng::seed_from_u64(0);
        let owner = SpendingKey::from([3u8; 32]).spend_authority().public_key();
        let deployment = Deployment::new(
            5,
            Value::from(1000u64),
            BlockMask::from_blocks(&[1]).unwrap(),
            owner,
            &mut rng,
        );
        let note = Note {
            version: NOTE_VERSION,
            asset: AssetId::from(Fp::from(5u64)),
            amount: deployment.amount,
            owner,
            blinding: deployment.blinding,
            snapshot: Accumulator::ZERO,
            remainder: 0,
        };
        assert_ne!(Commitment::from(deployment.commitment()), note.commitment());

        let other_mask = Deployment {
            mask: BlockMask::from_blocks(&[2]).unwrap(),
            ..deployment
        };
        assert_ne!(other_mask.commitment(), deployment.commitment());
        assert_ne!(
            Deployment {
                owner: PublicKey::from(Fp::ONE),
                ..deployment
            }
            .commitment(),
            deployment.commitment()
        );
    }

    #[test]
    fn record_transitions() {
        let mut record = DeploymentRecord::new(5, DeploymentCommitment::ZERO, 0);
        assert_eq!(record.status(), DeploymentStatus::Deployed);
        record.claim().unwrap();
        assert_eq!(
            record.claim(),
            Err(MiningError::InvalidTransition {
                from: DeploymentStatus::Claimed,
                to: DeploymentStatus::Claimed
            })
        );
        assert!(record.expire().is_err());

        let mut unclaimed = DeploymentRecord::new(5, DeploymentCommitment::ZERO, 1);
        unclaimed.expire().unwrap();
        assert_eq!(unclaimed.status(), DeploymentStatus::Expired);
        assert!(unclaimed.claim().is_err());
    }

    #[test]
    fn round_transitions() {
        let mut round = Round::open(5, AssetId::derive(b"ore"));
        assert_eq!(round.outcome(), Err(MiningError::RoundNotFrozen(5)));
        assert_eq!(round.close(), Err(MiningError::RoundNotFrozen(5)));

        let outcome = RoundOutcome {
            snapshot: CommitmentRoot::ZERO,
            winning_block: 25,
            reward_rate: Accumulator::ZERO,
        };
        assert_eq!(round.freeze(outcome), Err(MiningError::BlockOutOfRange(25)));

        let valid = RoundOutcome {
            winning_block: 1,
            ..outcome
        };
        round.freeze(valid).unwrap();
        assert_eq!(round.outcome(), Ok(valid));
        assert_eq!(round.freeze(valid), Err(MiningError::RoundNotOpen(5)));
        round.close().unwrap();
        assert_eq!(round.state, RoundState::Closed);
    }
}
