//! Pool configuration.
//!
//! Everything that is fixed for the lifetime of a pool but not by the
//! protocol: tree height, amount width, how many recent roots the settlement
//! side accepts, the nullifier batch size and the transaction shape. Both
//! provers and the ledger must use the same [`Params`].

use crate::constants::{DEFAULT_AMOUNT_BITS, DEFAULT_TREE_HEIGHT, MAX_AMOUNT_BITS, MAX_TREE_HEIGHT};

/// Errors from [`Params::validate`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ParamsError {
    /// Heights outside `1..=63`.
    #[error("tree height {0} is out of range")]
    TreeHeight(u8),

    /// Amount widths outside `1..=120`.
    #[error("amount width of {0} bits is out of range")]
    AmountBits(u32),

    /// The root history must hold at least the current root.
    #[error("root history must not be empty")]
    RootHistory,

    /// Batches must hold at least one nullifier.
    #[error("nullifier batch size must not be zero")]
    NullifierBatch,

    /// A transaction needs at least one input, output and roster slot.
    #[error("transaction shape has an empty dimension")]
    Shape,

    /// Deployments spend one or two notes.
    #[error("deploy input count {0} is not 1 or 2")]
    DeployInputs(usize),
}

/// Fixed dimensions of the transaction predicate.
///
/// Statements and witnesses must match these exactly; unused positions are
/// zero padding.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shape {
    /// Spent notes.
    pub inputs: usize,
    /// Created notes.
    pub outputs: usize,
    /// Per-asset reward accumulator lines.
    pub reward_lines: usize,
    /// Public deposit / withdrawal / fee lines.
    pub public_lines: usize,
    /// Asset roster slots.
    pub roster_slots: usize,
}

impl Default for Shape {
    fn default() -> Self {
        Self {
            inputs: 2,
            outputs: 2,
            reward_lines: 2,
            public_lines: 2,
            roster_slots: 2,
        }
    }
}

/// Pool parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Params {
    /// Height of both trees.
    pub tree_height: u8,
    /// Amounts must be `< 2^amount_bits`.
    pub amount_bits: u32,
    /// Number of recent roots (current included) accepted per tree.
    pub root_history: usize,
    /// Maximum nullifiers inserted per flush.
    pub nullifier_batch: usize,
    /// Transaction predicate dimensions.
    pub shape: Shape,
    /// Notes spent by a mining deployment.
    pub deploy_inputs: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            tree_height: DEFAULT_TREE_HEIGHT,
            amount_bits: DEFAULT_AMOUNT_BITS,
            root_history: 32,
            nullifier_batch: 16,
            shape: Shape::default(),
            deploy_inputs: 2,
        }
    }
}

impl Params {
    /// Checks every field against its supported range.
    pub const fn validate(&self) -> Result<(), ParamsError> {
        if self.tree_height == 0 || self.tree_height > MAX_TREE_HEIGHT {
            return Err(ParamsError::TreeHeight(self.tree_height));
        }
        if self.amount_bits == 0 || self.amount_bits > MAX_AMOUNT_BITS {
            return Err(ParamsError::AmountBits(self.amount_bits));
        }
        if self.root_history == 0 {
            return Err(ParamsError::RootHistory);
        }
        if self.nullifier_batch == 0 {
            return Err(ParamsError::NullifierBatch);
        }
        if self.shape.inputs == 0 || self.shape.outputs == 0 || self.shape.roster_slots == 0 {
            return Err(ParamsError::Shape);
        }
        if self.deploy_inputs == 0 || self.deploy_inputs > 2 {
            return Err(ParamsError::DeployInputs(self.deploy_inputs));
        }
        Ok(())
    }
}
