use alloc::vec::Vec;

use super::header::TransactParams;
use crate::{
    keys::SpendAuthority,
    mining::Deployment,
    note::Note,
    tree::{LowLeafWitness, MerklePath},
};

// =============================================================================
// Circuit witnesses (prover-side)
// =============================================================================

/// Private witness for spending one note.
///
/// The membership and non-membership paths are only consulted for notes
/// with a non-zero amount; zero-amount padding notes still bind their
/// nullifier.
#[derive(Clone, Debug)]
pub struct SpendWitness {
    /// The note being spent.
    pub note: Note,
    /// `(ask, nsk)` of the note's owner.
    pub authority: SpendAuthority,
    /// Leaf index of the note's commitment.
    pub position: u64,
    /// Path of the commitment under the statement's commitment root.
    pub membership: Option<MerklePath>,
    /// Low leaf bracketing the nullifier under the statement's nullifier
    /// root.
    pub non_membership: Option<LowLeafWitness>,
}

/// A spent note and the roster slot its value is credited to.
#[derive(Clone, Debug)]
pub struct InputWitness {
    /// The spend.
    pub spend: SpendWitness,
    /// Roster slot.
    pub slot: usize,
}

/// A created note and the roster slot its value is debited from.
#[derive(Clone, Copy, Debug)]
pub struct OutputWitness {
    /// The created note.
    pub note: Note,
    /// Roster slot.
    pub slot: usize,
}

/// Private witness for the transaction predicate.
#[derive(Clone, Debug)]
pub struct TransactWitness {
    /// One per input slot.
    pub inputs: Vec<InputWitness>,
    /// One per output slot.
    pub outputs: Vec<OutputWitness>,
    /// Roster slot of each public line; ignored for empty lines.
    pub public_slots: Vec<usize>,
    /// Preimage of the statement's parameter hash.
    pub params: TransactParams,
}

/// Private witness for the deploy predicate.
#[derive(Clone, Debug)]
pub struct DeployWitness {
    /// One per input slot, all of the round's asset.
    pub inputs: Vec<SpendWitness>,
    /// The hidden deployment.
    pub deployment: Deployment,
    /// Change returned to the miner.
    pub change: Note,
}

/// Private witness for the claim predicate.
#[derive(Clone, Debug)]
pub struct ClaimWitness {
    /// The deployment being claimed.
    pub deployment: Deployment,
    /// `(ask, nsk)` of the deployment's owner.
    pub authority: SpendAuthority,
    /// Leaf index of the deployment commitment.
    pub position: u64,
    /// Path of the deployment under the round's snapshot root.
    pub membership: MerklePath,
    /// Low leaf bracketing the claim nullifier.
    pub non_membership: LowLeafWitness,
    /// The reward note created.
    pub reward: Note,
}
