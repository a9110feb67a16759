//! Proof request construction.
//!
//! A wallet describes what it wants (notes to spend, notes to create,
//! public value movements) and the builder turns that into a statement and
//! witness of the fixed circuit shape, reading roots, paths and
//! accumulators from a [`StateView`]:
//!
//! - **Padding**: missing inputs are zero-amount notes owned by a throwaway
//!   key, missing outputs zero-amount notes, missing lines the padding
//!   line. Padding is indistinguishable from real spends in the statement.
//! - **Routing**: the roster lists each asset the request touches once, in
//!   first-use order; every note and public line is routed to its asset's
//!   slot. Reward lines carry the current accumulator of the same assets.
//! - **Outputs**: fresh blindings, snapshot at the current accumulator.
//!   An output may carry reward residue the inputs of its asset release;
//!   deployment change carries all of it, up to one unit.
//!
//! The builder does not check conservation; [`prove`](crate::proof::prove)
//! runs the predicate before proving.

use alloc::vec::Vec;

use rand::{CryptoRng, RngCore};

use crate::{
    circuit::{
        ClaimStatement, ClaimWitness, DeployStatement, DeployWitness, InputWitness,
        OutputWitness, PublicLine, RewardLine, SpendWitness, TransactParams, TransactStatement,
        TransactWitness,
    },
    error::{Classify, ErrorClass},
    keys::{PublicKey, SpendAuthority, SpendingKey},
    mining::{BlockMask, Deployment, MiningError, Round, RoundState},
    note::{Commitment, Note, Nullifier},
    params::Params,
    primitives::{AssetId, CommitmentRoot, NullifierRoot},
    reward::{self, Accumulator, RewardError},
    tree::{LowLeafWitness, MerklePath, TreeError},
    value::{Balance, Value, ValueError},
};

/// Errors during request construction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum BuildError {
    /// More entries than the circuit shape has room for.
    #[error("{field} has {len} entries, at most {max} fit")]
    TooMany {
        /// The offending request field.
        field: &'static str,
        /// Requested entries.
        len: usize,
        /// Available slots.
        max: usize,
    },

    /// The request touches more assets than there are roster slots or
    /// reward lines.
    #[error("request touches {assets} assets, at most {max} fit")]
    TooManyAssets {
        /// Distinct assets.
        assets: usize,
        /// Available slots.
        max: usize,
    },

    /// The request touches no asset at all.
    #[error("request is empty")]
    Empty,

    /// The inputs do not cover the deployment and fee.
    #[error("inputs do not cover the deployment and fee")]
    Insufficient,

    /// A path or low leaf could not be produced.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// The round does not accept the request.
    #[error(transparent)]
    Mining(#[from] MiningError),

    /// Accrual or payout failed.
    #[error(transparent)]
    Reward(#[from] RewardError),

    /// An amount sum overflowed.
    #[error(transparent)]
    Value(#[from] ValueError),
}

impl Classify for BuildError {
    fn class(&self) -> ErrorClass {
        match *self {
            Self::Tree(ref err) => err.class(),
            Self::Mining(ref err) => err.class(),
            Self::TooMany { .. }
            | Self::TooManyAssets { .. }
            | Self::Empty
            | Self::Insufficient
            | Self::Reward(_)
            | Self::Value(_) => ErrorClass::Malformed,
        }
    }
}

/// Read access to the state a proof is built against.
///
/// Every value must come from the same state; a view that mixes roots
/// from two states produces a statement that fails verification.
pub trait StateView {
    /// Pool configuration.
    fn params(&self) -> Params;

    /// Current commitment accumulator root.
    fn commitment_root(&self) -> CommitmentRoot;

    /// Current nullifier tree root.
    fn nullifier_root(&self) -> NullifierRoot;

    /// Membership path of `leaf` at `position` under the current root.
    fn membership(&self, leaf: Commitment, position: u64) -> Result<MerklePath, BuildError>;

    /// Non-membership witness of `nullifier` under the current root.
    fn low_leaf(&self, nullifier: Nullifier) -> Result<LowLeafWitness, BuildError>;

    /// Current reward accumulator of `asset`.
    fn accumulator(&self, asset: AssetId) -> Accumulator;

    /// The mining round `id`.
    fn round(&self, id: u64) -> Result<Round, BuildError>;

    /// Membership path of `leaf` at `position` under the snapshot root of
    /// frozen round `round`.
    fn snapshot_membership(
        &self,
        round: u64,
        leaf: Commitment,
        position: u64,
    ) -> Result<MerklePath, BuildError>;
}

/// A note the requester can spend.
#[derive(Clone, Copy, Debug)]
pub struct SpendableNote {
    /// The note.
    pub note: Note,
    /// Its leaf index.
    pub position: u64,
    /// The owner's spend secrets.
    pub authority: SpendAuthority,
}

/// A note to create.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OutputSpec {
    /// Asset.
    pub asset: AssetId,
    /// Amount.
    pub amount: Value,
    /// Recipient.
    pub owner: PublicKey,
    /// Reward residue to carry, in `1 / SCALE` units.
    pub remainder: u128,
}

/// A transaction proof request.
#[derive(Clone, Debug)]
pub struct TransactionRequest {
    /// Notes to spend.
    pub inputs: Vec<SpendableNote>,
    /// Notes to create.
    pub outputs: Vec<OutputSpec>,
    /// Public deposits, withdrawals and fees.
    pub public_lines: Vec<PublicLine>,
    /// External parameters bound by hash.
    pub params: TransactParams,
}

/// A mining deployment request.
#[derive(Clone, Debug)]
pub struct DeployRequest {
    /// Round to deploy to.
    pub round: u64,
    /// Notes of the round's asset to spend.
    pub inputs: Vec<SpendableNote>,
    /// Amount deployed.
    pub amount: Value,
    /// Selected blocks.
    pub mask: BlockMask,
    /// Owner of the deployment and of the change.
    pub owner: PublicKey,
    /// Public fee.
    pub fee: Value,
}

/// A mining claim request.
#[derive(Clone, Copy, Debug)]
pub struct ClaimRequest {
    /// The deployment being claimed.
    pub deployment: Deployment,
    /// Its leaf index.
    pub position: u64,
    /// The deployment owner's spend secrets.
    pub authority: SpendAuthority,
    /// Owner of the reward note.
    pub recipient: PublicKey,
}

fn check_fits(field: &'static str, len: usize, max: usize) -> Result<(), BuildError> {
    if len > max {
        return Err(BuildError::TooMany { field, len, max });
    }
    Ok(())
}

/// Spend witness for `input`; zero-amount notes carry no tree witnesses.
fn spend_witness(
    view: &impl StateView,
    input: &SpendableNote,
) -> Result<(SpendWitness, Nullifier), BuildError> {
    let note = input.note;
    let nullifier = note.nullifier(&input.authority.nullifier_key(), input.position);
    let (membership, non_membership) = if note.amount.is_zero() {
        (None, None)
    } else {
        (
            Some(view.membership(note.commitment(), input.position)?),
            Some(view.low_leaf(nullifier)?),
        )
    };
    let witness = SpendWitness {
        note,
        authority: input.authority,
        position: input.position,
        membership,
        non_membership,
    };
    Ok((witness, nullifier))
}

/// A zero-amount input of `asset` owned by a fresh key.
fn padding_input(asset: AssetId, rng: &mut (impl RngCore + CryptoRng)) -> SpendableNote {
    let authority = SpendingKey::random(rng).spend_authority();
    SpendableNote {
        note: Note::new(
            asset,
            Value::ZERO,
            authority.public_key(),
            Accumulator::ZERO,
            rng,
        ),
        position: 0,
        authority,
    }
}

/// Distinct assets of a request in first-use order.
#[derive(Debug, Default)]
struct Roster(Vec<AssetId>);

impl Roster {
    fn add(&mut self, asset: AssetId) {
        if !self.0.contains(&asset) {
            self.0.push(asset);
        }
    }

    fn slot(&self, asset: AssetId) -> usize {
        self.0.iter().position(|&held| held == asset).unwrap_or(0)
    }

    fn first(&self) -> Result<AssetId, BuildError> {
        self.0.first().copied().ok_or(BuildError::Empty)
    }
}

/// What `funded` leaves after `spent`, as a change amount and the residue
/// the change carries.
fn split_change(funded: &Balance, spent: Value) -> Result<(Value, u128), BuildError> {
    let scaled = |value: Value| {
        u128::from(value)
            .checked_mul(reward::SCALE)
            .ok_or(ValueError::Overflow)
    };
    let left = scaled(funded.credit)?
        .checked_add(funded.released)
        .ok_or(ValueError::Overflow)?
        .checked_sub(scaled(spent)?)
        .ok_or(BuildError::Insufficient)?;
    Ok((
        Value::from(left.div_euclid(reward::SCALE)),
        left.rem_euclid(reward::SCALE),
    ))
}

/// Builds the statement and witness of a transaction.
pub fn build_transaction(
    view: &impl StateView,
    request: &TransactionRequest,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<(TransactStatement, TransactWitness), BuildError> {
    let shape = view.params().shape;
    check_fits("inputs", request.inputs.len(), shape.inputs)?;
    check_fits("outputs", request.outputs.len(), shape.outputs)?;
    check_fits("public lines", request.public_lines.len(), shape.public_lines)?;

    let mut roster = Roster::default();
    for input in &request.inputs {
        roster.add(input.note.asset);
    }
    for output in &request.outputs {
        roster.add(output.asset);
    }
    for line in request.public_lines.iter().filter(|line| !line.is_empty()) {
        roster.add(line.asset);
    }
    let max = shape.roster_slots.min(shape.reward_lines);
    if roster.0.len() > max {
        return Err(BuildError::TooManyAssets {
            assets: roster.0.len(),
            max,
        });
    }
    let padding_asset = roster.first()?;

    let mut inputs = Vec::with_capacity(shape.inputs);
    let mut nullifiers = Vec::with_capacity(shape.inputs);
    let padding_inputs = shape.inputs.saturating_sub(request.inputs.len());
    let spendable = request
        .inputs
        .iter()
        .copied()
        .chain((0..padding_inputs).map(|_| padding_input(padding_asset, rng)))
        .collect::<Vec<_>>();
    for input in &spendable {
        let (spend, nullifier) = spend_witness(view, input)?;
        inputs.push(InputWitness {
            spend,
            slot: roster.slot(input.note.asset),
        });
        nullifiers.push(nullifier);
    }

    let padding_owner = SpendingKey::random(rng).spend_authority().public_key();
    let padding_outputs = shape.outputs.saturating_sub(request.outputs.len());
    let specs = request
        .outputs
        .iter()
        .copied()
        .chain((0..padding_outputs).map(|_| OutputSpec {
            asset: padding_asset,
            amount: Value::ZERO,
            owner: padding_owner,
            remainder: 0,
        }))
        .collect::<Vec<_>>();
    let outputs = specs
        .iter()
        .map(|spec| OutputWitness {
            note: Note::new(
                spec.asset,
                spec.amount,
                spec.owner,
                view.accumulator(spec.asset),
                rng,
            )
            .with_remainder(spec.remainder),
            slot: roster.slot(spec.asset),
        })
        .collect::<Vec<_>>();

    let mut public_lines = request.public_lines.clone();
    public_lines.resize(shape.public_lines, PublicLine::PADDING);
    let public_slots = public_lines
        .iter()
        .map(|line| roster.slot(line.asset))
        .collect();

    let mut reward_lines = roster
        .0
        .iter()
        .map(|&asset| RewardLine {
            asset,
            accumulator: view.accumulator(asset),
        })
        .collect::<Vec<_>>();
    reward_lines.resize(shape.reward_lines, RewardLine::PADDING);

    let mut assets = roster.0;
    assets.resize(shape.roster_slots, AssetId::ZERO);

    let statement = TransactStatement {
        commitment_root: view.commitment_root(),
        nullifier_root: view.nullifier_root(),
        nullifiers,
        commitments: outputs.iter().map(|output| output.note.commitment()).collect(),
        reward_lines,
        public_lines,
        roster: assets,
        params_hash: request.params.hash(),
    };
    let witness = TransactWitness {
        inputs,
        outputs,
        public_slots,
        params: request.params,
    };
    Ok((statement, witness))
}

/// Builds the statement and witness of a mining deployment.
///
/// The change is what the accrued inputs leave after the deployment and
/// fee, and carries their reward residue.
pub fn build_deploy(
    view: &impl StateView,
    request: &DeployRequest,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<(DeployStatement, DeployWitness), BuildError> {
    let round = view.round(request.round)?;
    if round.state != RoundState::Open {
        return Err(MiningError::RoundNotOpen(round.id).into());
    }
    let params = view.params();
    check_fits("inputs", request.inputs.len(), params.deploy_inputs)?;

    let accumulator = view.accumulator(round.asset);
    let mut funded = Balance::default();
    for input in &request.inputs {
        let note = &input.note;
        if note.amount.is_zero() {
            continue;
        }
        let accrual = note.value_at(accumulator)?;
        funded.credit(accrual.value)?;
        funded.release(accrual.remainder)?;
    }
    let spent = request.amount.checked_add(request.fee)?;
    let (change_amount, change_remainder) = split_change(&funded, spent)?;

    let padding = params.deploy_inputs.saturating_sub(request.inputs.len());
    let spendable = request
        .inputs
        .iter()
        .copied()
        .chain((0..padding).map(|_| padding_input(round.asset, rng)))
        .collect::<Vec<_>>();
    let mut inputs = Vec::with_capacity(spendable.len());
    let mut nullifiers = Vec::with_capacity(spendable.len());
    for input in &spendable {
        let (spend, nullifier) = spend_witness(view, input)?;
        inputs.push(spend);
        nullifiers.push(nullifier);
    }

    let deployment = Deployment::new(round.id, request.amount, request.mask, request.owner, rng);
    let change = Note::new(round.asset, change_amount, request.owner, accumulator, rng)
        .with_remainder(change_remainder);

    let statement = DeployStatement {
        commitment_root: view.commitment_root(),
        nullifier_root: view.nullifier_root(),
        nullifiers,
        round: round.id,
        asset: round.asset,
        accumulator,
        deployment: deployment.commitment(),
        change: change.commitment(),
        fee: request.fee,
    };
    let witness = DeployWitness {
        inputs,
        deployment,
        change,
    };
    Ok((statement, witness))
}

/// Builds the statement and witness of a mining claim against the round's
/// frozen outcome.
pub fn build_claim(
    view: &impl StateView,
    request: &ClaimRequest,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<(ClaimStatement, ClaimWitness), BuildError> {
    let deployment = request.deployment;
    let round = view.round(deployment.round)?;
    let outcome = round.outcome()?;

    let membership =
        view.snapshot_membership(round.id, deployment.commitment().into(), request.position)?;
    let nullifier = deployment.nullifier(&request.authority.nullifier_key(), request.position);
    let non_membership = view.low_leaf(nullifier)?;

    let accumulator = view.accumulator(round.asset);
    let payout = reward::payout(deployment.amount, outcome.reward_rate)?;
    let reward = Note::new(round.asset, payout, request.recipient, accumulator, rng);

    let statement = ClaimStatement {
        snapshot_root: outcome.snapshot,
        nullifier_root: view.nullifier_root(),
        nullifier,
        round: round.id,
        winning_block: outcome.winning_block,
        reward_rate: outcome.reward_rate,
        asset: round.asset,
        accumulator,
        reward: reward.commitment(),
    };
    let witness = ClaimWitness {
        deployment,
        authority: request.authority,
        position: request.position,
        membership,
        non_membership,
        reward,
    };
    Ok((statement, witness))
}
