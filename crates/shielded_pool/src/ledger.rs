//! Settlement-side state and sequencer.
//!
//! The [`Ledger`] owns both trees, the recent-root history, the per-asset
//! reward accumulators and the mining rounds. It is the single writer:
//! every mutation goes through `&mut self`, while provers read a consistent
//! root pair through its [`StateView`] implementation and build proofs
//! concurrently.
//!
//! ## Submission
//!
//! Every `submit_*` runs the same pipeline and stops at the first failure:
//!
//! 1. verify the proof against its statement
//! 2. check the statement shape against [`Params`]; for transactions, the
//!    submitted [`TransactParams`] must hash to the statement's and their
//!    fee must be the sum of the public-line fees
//! 3. the statement's roots must be current or within the root history
//!    (else [`ErrorClass::Stale`])
//! 4. the statement's accumulators must be current (else
//!    [`ErrorClass::Stale`])
//! 5. no nullifier may be in the tree or pending (else
//!    [`ErrorClass::DoubleSpend`])
//! 6. append the new commitments
//! 7. buffer the nullifiers for the next [`flush`](Ledger::flush)
//!
//! Nothing is mutated before step 6, and step 6 cannot fail once the
//! capacity check has passed, so a rejected submission leaves no trace.
//!
//! Step 5 checks the *current* tree and pending set, so a nullifier inserted
//! after the root a proof was built against is still caught.

use alloc::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    vec::Vec,
};

use crate::{
    builder::{BuildError, StateView},
    circuit::{
        ClaimCircuit, ClaimStatement, DeployCircuit, DeployStatement, TransactCircuit,
        TransactParams, TransactStatement,
    },
    error::{Classify, ErrorClass},
    mining::{DeploymentRecord, MiningError, Round, RoundOutcome, RoundState},
    note::{Commitment, Nullifier},
    params::{Params, ParamsError},
    primitives::{AssetId, CommitmentRoot, NullifierRoot},
    proof::{Artifact, ProofError},
    reward::{Accumulator, Accumulators, RewardError},
    tree::{CommitmentTree, LowLeafWitness, MerklePath, NullifierTree, TreeError},
    value::Value,
};

/// Errors from ledger operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum LedgerError {
    /// The configuration is out of range.
    #[error(transparent)]
    Params(#[from] ParamsError),

    /// The proof does not verify.
    #[error(transparent)]
    Proof(#[from] ProofError),

    /// A statement vector does not match the configured shape.
    #[error("statement {field} has {actual} entries, expected {expected}")]
    Shape {
        /// The offending vector.
        field: &'static str,
        /// Configured length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// The commitment root is neither current nor recent.
    #[error("commitment root is not current or recent")]
    UnknownCommitmentRoot,

    /// The nullifier root is neither current nor recent.
    #[error("nullifier root is not current or recent")]
    UnknownNullifierRoot,

    /// An accumulator in the statement is not the current one.
    #[error("statement accrues against an outdated reward accumulator")]
    StaleAccumulator,

    /// A nullifier is already in the tree.
    #[error("nullifier is already spent")]
    Spent(Nullifier),

    /// A nullifier is already buffered for insertion.
    #[error("nullifier is already pending")]
    Pending(Nullifier),

    /// The submitted parameters do not hash to the statement's.
    #[error("transaction parameters do not match the proven hash")]
    ParamsMismatch,

    /// The parameters' fee is not what the public lines pay.
    #[error("transaction fee does not match the public lines")]
    FeeMismatch,

    /// The statement disagrees with the round's asset or outcome.
    #[error("statement does not match round {0}")]
    RoundMismatch(u64),

    /// A tree operation failed.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// A round operation failed.
    #[error(transparent)]
    Mining(#[from] MiningError),

    /// An accumulator update failed.
    #[error(transparent)]
    Reward(#[from] RewardError),
}

impl Classify for LedgerError {
    fn class(&self) -> ErrorClass {
        match *self {
            Self::Proof(ref err) => err.class(),
            Self::Tree(ref err) => err.class(),
            Self::Mining(ref err) => err.class(),
            Self::UnknownCommitmentRoot | Self::UnknownNullifierRoot | Self::StaleAccumulator => {
                ErrorClass::Stale
            }
            Self::Spent(_) | Self::Pending(_) => ErrorClass::DoubleSpend,
            Self::ParamsMismatch | Self::FeeMismatch => ErrorClass::Soundness,
            Self::Params(_) | Self::Shape { .. } | Self::RoundMismatch(_) | Self::Reward(_) => {
                ErrorClass::Malformed
            }
        }
    }
}

/// The most recent roots of one tree, newest last.
#[derive(Clone, Debug)]
struct RootHistory<R> {
    roots: VecDeque<R>,
    capacity: usize,
}

impl<R: Copy + PartialEq> RootHistory<R> {
    fn new(capacity: usize, current: R) -> Self {
        let mut roots = VecDeque::with_capacity(capacity);
        roots.push_back(current);
        Self { roots, capacity }
    }

    fn push(&mut self, root: R) {
        if self.roots.back() == Some(&root) {
            return;
        }
        if self.roots.len() >= self.capacity {
            self.roots.pop_front();
        }
        self.roots.push_back(root);
    }

    fn contains(&self, root: R) -> bool {
        self.roots.contains(&root)
    }
}

/// The pool's settlement state.
#[derive(Clone, Debug)]
pub struct Ledger {
    params: Params,
    commitments: CommitmentTree,
    nullifiers: NullifierTree,
    commitment_roots: RootHistory<CommitmentRoot>,
    nullifier_roots: RootHistory<NullifierRoot>,
    accumulators: Accumulators,
    rounds: BTreeMap<u64, Round>,
    /// Commitment tree size at each frozen round's snapshot.
    snapshots: BTreeMap<u64, u64>,
    pending: Vec<Nullifier>,
    pending_set: BTreeSet<Nullifier>,
}

impl Ledger {
    /// An empty ledger.
    pub fn new(params: Params) -> Result<Self, LedgerError> {
        params.validate()?;
        let commitments = CommitmentTree::new(params.tree_height)?;
        let nullifiers = NullifierTree::new(params.tree_height)?;
        Ok(Self {
            commitment_roots: RootHistory::new(params.root_history, commitments.root()),
            nullifier_roots: RootHistory::new(params.root_history, nullifiers.root()),
            params,
            commitments,
            nullifiers,
            accumulators: Accumulators::default(),
            rounds: BTreeMap::new(),
            snapshots: BTreeMap::new(),
            pending: Vec::new(),
            pending_set: BTreeSet::new(),
        })
    }

    /// The commitment accumulator.
    #[must_use]
    pub const fn commitments(&self) -> &CommitmentTree {
        &self.commitments
    }

    /// The nullifier tree.
    #[must_use]
    pub const fn nullifiers(&self) -> &NullifierTree {
        &self.nullifiers
    }

    /// Nullifiers accepted but not yet inserted, oldest first.
    #[must_use]
    pub fn pending(&self) -> &[Nullifier] {
        &self.pending
    }

    /// Whether `root` is the current commitment root or a recent one.
    #[must_use]
    pub fn is_known_commitment_root(&self, root: CommitmentRoot) -> bool {
        self.commitment_roots.contains(root)
    }

    /// Whether `root` is the current nullifier root or a recent one.
    #[must_use]
    pub fn is_known_nullifier_root(&self, root: NullifierRoot) -> bool {
        self.nullifier_roots.contains(root)
    }

    // -------------------------------------------------------------------------
    // Submissions
    // -------------------------------------------------------------------------

    /// Accepts a transaction executed with `params`; returns the leaf index
    /// of each output.
    pub fn submit_transact(
        &mut self,
        artifact: &Artifact<TransactStatement>,
        params: &TransactParams,
    ) -> Result<Vec<u64>, LedgerError> {
        let result = self.accept_transact(artifact, params);
        log_outcome("transact", &result);
        result
    }

    fn accept_transact(
        &mut self,
        artifact: &Artifact<TransactStatement>,
        params: &TransactParams,
    ) -> Result<Vec<u64>, LedgerError> {
        artifact.verify::<TransactCircuit>()?;
        let statement = &artifact.statement;
        let shape = self.params.shape;
        check_len("nullifiers", shape.inputs, statement.nullifiers.len())?;
        check_len("commitments", shape.outputs, statement.commitments.len())?;
        check_len("reward lines", shape.reward_lines, statement.reward_lines.len())?;
        check_len("public lines", shape.public_lines, statement.public_lines.len())?;
        check_len("roster", shape.roster_slots, statement.roster.len())?;
        if params.hash() != statement.params_hash {
            return Err(LedgerError::ParamsMismatch);
        }
        let fees: Option<Value> = statement.public_lines.iter().map(|line| line.fee).sum();
        if fees != Some(params.fee) {
            return Err(LedgerError::FeeMismatch);
        }

        self.check_roots(statement.commitment_root, statement.nullifier_root)?;
        for line in &statement.reward_lines {
            self.check_accumulator(line.asset, line.accumulator)?;
        }
        self.check_unspent(&statement.nullifiers)?;
        self.check_capacity(statement.commitments.len(), statement.nullifiers.len())?;

        for line in statement.public_lines.iter().filter(|line| !line.is_empty()) {
            tracing::info!(
                asset = %hex::encode(<[u8; 32]>::from(line.asset)),
                deposit = u128::from(line.deposit),
                withdrawal = u128::from(line.withdrawal),
                fee = u128::from(line.fee),
                "public value movement"
            );
        }
        let positions = self.append(&statement.commitments)?;
        self.buffer(&statement.nullifiers);
        Ok(positions)
    }

    /// Accepts a mining deployment; returns the record the miner tracks it
    /// with.
    pub fn submit_deploy(
        &mut self,
        artifact: &Artifact<DeployStatement>,
    ) -> Result<DeploymentRecord, LedgerError> {
        let result = self.accept_deploy(artifact);
        log_outcome("deploy", &result);
        result
    }

    fn accept_deploy(
        &mut self,
        artifact: &Artifact<DeployStatement>,
    ) -> Result<DeploymentRecord, LedgerError> {
        artifact.verify::<DeployCircuit>()?;
        let statement = &artifact.statement;
        check_len(
            "nullifiers",
            self.params.deploy_inputs,
            statement.nullifiers.len(),
        )?;

        let round = self.find_round(statement.round)?;
        match round.state {
            RoundState::Open => {}
            RoundState::Frozen(_) | RoundState::Closed => {
                return Err(MiningError::RoundNotOpen(round.id).into());
            }
        }
        if statement.asset != round.asset {
            return Err(LedgerError::RoundMismatch(round.id));
        }

        self.check_roots(statement.commitment_root, statement.nullifier_root)?;
        self.check_accumulator(statement.asset, statement.accumulator)?;
        self.check_unspent(&statement.nullifiers)?;
        self.check_capacity(2, statement.nullifiers.len())?;

        let positions = self.append(&[statement.deployment.into(), statement.change])?;
        self.buffer(&statement.nullifiers);
        let position = positions.first().copied().unwrap_or_default();
        Ok(DeploymentRecord::new(
            round.id,
            statement.deployment,
            position,
        ))
    }

    /// Accepts a mining claim; returns the leaf index of the reward note.
    pub fn submit_claim(
        &mut self,
        artifact: &Artifact<ClaimStatement>,
    ) -> Result<u64, LedgerError> {
        let result = self.accept_claim(artifact);
        log_outcome("claim", &result);
        result
    }

    fn accept_claim(&mut self, artifact: &Artifact<ClaimStatement>) -> Result<u64, LedgerError> {
        artifact.verify::<ClaimCircuit>()?;
        let statement = &artifact.statement;

        let round = self.find_round(statement.round)?;
        let outcome = round.outcome()?;
        if statement.asset != round.asset
            || statement.snapshot_root != outcome.snapshot
            || statement.winning_block != outcome.winning_block
            || statement.reward_rate != outcome.reward_rate
        {
            return Err(LedgerError::RoundMismatch(round.id));
        }

        if !self.is_known_nullifier_root(statement.nullifier_root) {
            return Err(LedgerError::UnknownNullifierRoot);
        }
        self.check_accumulator(statement.asset, statement.accumulator)?;
        let nullifiers = [statement.nullifier];
        self.check_unspent(&nullifiers)?;
        self.check_capacity(1, 1)?;

        let positions = self.append(&[statement.reward])?;
        self.buffer(&nullifiers);
        Ok(positions.first().copied().unwrap_or_default())
    }

    /// Inserts up to `nullifier_batch` pending nullifiers, oldest first, as
    /// one batch; returns how many were inserted.
    pub fn flush(&mut self) -> Result<usize, LedgerError> {
        let count = self.pending.len().min(self.params.nullifier_batch);
        if count == 0 {
            return Ok(0);
        }
        let batch = self.pending.get(..count).unwrap_or_default();
        self.nullifiers
            .batch_insert(batch, self.params.nullifier_batch)?;
        for nullifier in self.pending.drain(..count) {
            self.pending_set.remove(&nullifier);
        }
        let root = self.nullifiers.root();
        self.nullifier_roots.push(root);
        tracing::info!(
            count,
            remaining = self.pending.len(),
            root = %hex::encode(<[u8; 32]>::from(root)),
            "nullifier batch flushed"
        );
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Rewards and rounds
    // -------------------------------------------------------------------------

    /// Distributes `reward` over `supply` of `asset`.
    pub fn distribute(
        &mut self,
        asset: AssetId,
        reward: Value,
        supply: Value,
    ) -> Result<Accumulator, LedgerError> {
        let accumulator = self.accumulators.distribute(asset, reward, supply)?;
        tracing::info!(
            asset = %hex::encode(<[u8; 32]>::from(asset)),
            reward = u128::from(reward),
            supply = u128::from(supply),
            "rewards distributed"
        );
        Ok(accumulator)
    }

    /// Opens mining round `id` for `asset`.
    pub fn open_round(&mut self, id: u64, asset: AssetId) -> Result<(), LedgerError> {
        if self.rounds.contains_key(&id) {
            return Err(MiningError::RoundExists(id).into());
        }
        self.rounds.insert(id, Round::open(id, asset));
        tracing::info!(round = id, "mining round opened");
        Ok(())
    }

    /// Freezes round `id` at the current commitment root with the
    /// settlement layer's outcome.
    pub fn freeze_round(
        &mut self,
        id: u64,
        winning_block: u8,
        reward_rate: Accumulator,
    ) -> Result<RoundOutcome, LedgerError> {
        let outcome = RoundOutcome {
            snapshot: self.commitments.root(),
            winning_block,
            reward_rate,
        };
        self.rounds
            .get_mut(&id)
            .ok_or(MiningError::UnknownRound(id))?
            .freeze(outcome)?;
        self.snapshots.insert(id, self.commitments.leaf_count());
        tracing::info!(round = id, winning_block, "mining round frozen");
        Ok(outcome)
    }

    /// Closes round `id`; its unclaimed deployments are expired.
    pub fn close_round(&mut self, id: u64) -> Result<(), LedgerError> {
        self.rounds
            .get_mut(&id)
            .ok_or(MiningError::UnknownRound(id))?
            .close()?;
        self.snapshots.remove(&id);
        tracing::info!(round = id, "mining round closed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Checks
    // -------------------------------------------------------------------------

    fn find_round(&self, id: u64) -> Result<Round, MiningError> {
        self.rounds
            .get(&id)
            .copied()
            .ok_or(MiningError::UnknownRound(id))
    }

    fn check_roots(
        &self,
        commitment_root: CommitmentRoot,
        nullifier_root: NullifierRoot,
    ) -> Result<(), LedgerError> {
        if !self.is_known_commitment_root(commitment_root) {
            return Err(LedgerError::UnknownCommitmentRoot);
        }
        if !self.is_known_nullifier_root(nullifier_root) {
            return Err(LedgerError::UnknownNullifierRoot);
        }
        Ok(())
    }

    fn check_accumulator(&self, asset: AssetId, claimed: Accumulator) -> Result<(), LedgerError> {
        if self.accumulators.get(asset) != claimed {
            return Err(LedgerError::StaleAccumulator);
        }
        Ok(())
    }

    fn check_unspent(&self, nullifiers: &[Nullifier]) -> Result<(), LedgerError> {
        for &nullifier in nullifiers {
            if self.nullifiers.contains(nullifier) {
                return Err(LedgerError::Spent(nullifier));
            }
            if self.pending_set.contains(&nullifier) {
                return Err(LedgerError::Pending(nullifier));
            }
        }
        Ok(())
    }

    /// Both trees must have room for the submission.
    fn check_capacity(&self, leaves: usize, nullifiers: usize) -> Result<(), LedgerError> {
        let capacity = 1u64
            .checked_shl(u32::from(self.params.tree_height))
            .unwrap_or(u64::MAX);
        let fits = |used: u64, extra: usize| {
            u64::try_from(extra)
                .ok()
                .and_then(|extra| used.checked_add(extra))
                .is_some_and(|total| total <= capacity)
        };
        let queued = u64::try_from(self.pending.len()).unwrap_or(u64::MAX);
        if !fits(self.commitments.leaf_count(), leaves)
            || !fits(
                self.nullifiers.next_free_index().saturating_add(queued),
                nullifiers,
            )
        {
            return Err(TreeError::Full { capacity }.into());
        }
        Ok(())
    }

    fn append(&mut self, leaves: &[Commitment]) -> Result<Vec<u64>, LedgerError> {
        let positions = leaves
            .iter()
            .map(|&leaf| self.commitments.append(leaf).map(|(_, position)| position))
            .collect::<Result<Vec<_>, _>>()?;
        self.commitment_roots.push(self.commitments.root());
        Ok(positions)
    }

    fn buffer(&mut self, nullifiers: &[Nullifier]) {
        for &nullifier in nullifiers {
            self.pending_set.insert(nullifier);
            self.pending.push(nullifier);
        }
    }
}

fn check_len(field: &'static str, expected: usize, actual: usize) -> Result<(), LedgerError> {
    if expected == actual {
        Ok(())
    } else {
        Err(LedgerError::Shape {
            field,
            expected,
            actual,
        })
    }
}

fn log_outcome<T>(kind: &'static str, result: &Result<T, LedgerError>) {
    match *result {
        Ok(_) => tracing::info!(kind, "submission accepted"),
        Err(ref err) => tracing::warn!(
            kind,
            class = err.class().as_str(),
            retryable = err.is_retryable(),
            %err,
            "submission rejected"
        ),
    }
}

impl StateView for Ledger {
    fn params(&self) -> Params {
        self.params
    }

    fn commitment_root(&self) -> CommitmentRoot {
        self.commitments.root()
    }

    fn nullifier_root(&self) -> NullifierRoot {
        self.nullifiers.root()
    }

    fn membership(&self, leaf: Commitment, position: u64) -> Result<MerklePath, BuildError> {
        Ok(self.commitments.prove_membership(leaf, position)?)
    }

    fn low_leaf(&self, nullifier: Nullifier) -> Result<LowLeafWitness, BuildError> {
        Ok(self.nullifiers.low_leaf(nullifier)?)
    }

    fn accumulator(&self, asset: AssetId) -> Accumulator {
        self.accumulators.get(asset)
    }

    fn round(&self, id: u64) -> Result<Round, BuildError> {
        Ok(self.find_round(id)?)
    }

    fn snapshot_membership(
        &self,
        round: u64,
        leaf: Commitment,
        position: u64,
    ) -> Result<MerklePath, BuildError> {
        let size = *self
            .snapshots
            .get(&round)
            .ok_or(MiningError::RoundNotFrozen(round))?;
        Ok(self.commitments.prove_membership_at(leaf, position, size)?)
    }
}
