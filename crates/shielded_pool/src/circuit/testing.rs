//! Shared fixtures for predicate tests: one owner, a small pair of trees and
//! helpers that build satisfying statements.

use alloc::vec::Vec;

use rand::{SeedableRng as _, rngs::StdRng};

use super::{
    InputWitness, OutputWitness, PublicLine, RewardLine, SpendWitness, TransactCircuit,
    TransactParams, TransactStatement, TransactWitness,
};
use crate::{
    keys::{SpendAuthority, SpendingKey},
    note::Note,
    params::Shape,
    primitives::AssetId,
    reward::Accumulator,
    tree::{CommitmentTree, NullifierTree},
    value::Value,
};

pub(crate) const HEIGHT: u8 = 8;
pub(crate) const AMOUNT_BITS: u32 = 64;

pub(crate) fn usdc() -> AssetId {
    AssetId::derive(b"usdc")
}

pub(crate) fn sol() -> AssetId {
    AssetId::derive(b"sol")
}

pub(crate) struct Fixture {
    pub rng: StdRng,
    pub authority: SpendAuthority,
    pub commitments: CommitmentTree,
    pub nullifiers: NullifierTree,
    /// Current accumulator of [`usdc`]; [`sol`] stays at zero.
    pub accumulator: Accumulator,
}

impl Fixture {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            authority: Self::authority(seed),
            commitments: CommitmentTree::new(HEIGHT).unwrap(),
            nullifiers: NullifierTree::new(HEIGHT).unwrap(),
            accumulator: Accumulator::ZERO,
        }
    }

    pub fn authority(seed: u64) -> SpendAuthority {
        SpendingKey::random(&mut StdRng::seed_from_u64(seed.wrapping_add(1000))).spend_authority()
    }

    pub fn transact_circuit(&self) -> TransactCircuit {
        TransactCircuit {
            shape: Shape::default(),
            amount_bits: AMOUNT_BITS,
        }
    }

    /// A fresh usdc note of ours snapshotted at zero.
    pub fn note(&mut self, amount: u64) -> Note {
        Note::new(
            usdc(),
            Value::from(amount),
            self.authority.public_key(),
            Accumulator::ZERO,
            &mut self.rng,
        )
    }

    /// Appends a fresh usdc note snapshotted at zero.
    pub fn append_note(&mut self, amount: u64) -> (Note, u64) {
        let note = self.note(amount);
        let (_, position) = self.commitments.append(note.commitment()).unwrap();
        (note, position)
    }

    /// A complete spend witness against the current roots.
    pub fn spend(&self, note: Note, position: u64) -> SpendWitness {
        let nf = note.nullifier(&self.authority.nullifier_key(), position);
        SpendWitness {
            note,
            authority: self.authority,
            position,
            membership: Some(
                self.commitments
                    .prove_membership(note.commitment(), position)
                    .unwrap(),
            ),
            non_membership: Some(self.nullifiers.low_leaf(nf).unwrap()),
        }
    }

    /// A satisfying usdc transaction spending fresh notes of `inputs` and
    /// creating notes of `outputs`, with empty public lines.
    pub fn transaction(
        &mut self,
        inputs: &[u64],
        outputs: &[u64],
    ) -> (TransactStatement, TransactWitness) {
        let notes: Vec<_> = inputs.iter().map(|&amount| self.note(amount)).collect();
        self.transact(&notes, outputs)
    }

    /// As [`Self::transaction`], spending the given `notes`.
    pub fn transact(
        &mut self,
        notes: &[Note],
        outputs: &[u64],
    ) -> (TransactStatement, TransactWitness) {
        let positions: Vec<_> = notes
            .iter()
            .map(|note| self.commitments.append(note.commitment()).unwrap().1)
            .collect();
        let spends: Vec<_> = notes
            .iter()
            .zip(positions)
            .map(|(&note, position)| InputWitness {
                spend: self.spend(note, position),
                slot: 0,
            })
            .collect();
        let nk = self.authority.nullifier_key();
        let nullifiers = spends
            .iter()
            .map(|input| input.spend.note.nullifier(&nk, input.spend.position))
            .collect();

        let created: Vec<_> = outputs
            .iter()
            .map(|&amount| OutputWitness {
                note: Note::new(
                    usdc(),
                    Value::from(amount),
                    self.authority.public_key(),
                    self.accumulator,
                    &mut self.rng,
                ),
                slot: 0,
            })
            .collect();
        let commitments = created.iter().map(|output| output.note.commitment()).collect();

        let params = TransactParams::default();
        let statement = TransactStatement {
            commitment_root: self.commitments.root(),
            nullifier_root: self.nullifiers.root(),
            nullifiers,
            commitments,
            reward_lines: alloc::vec![
                RewardLine {
                    asset: usdc(),
                    accumulator: self.accumulator,
                },
                RewardLine {
                    asset: sol(),
                    accumulator: Accumulator::ZERO,
                },
            ],
            public_lines: alloc::vec![PublicLine::PADDING; 2],
            roster: alloc::vec![usdc(), sol()],
            params_hash: params.hash(),
        };
        let witness = TransactWitness {
            inputs: spends,
            outputs: created,
            public_slots: alloc::vec![0; 2],
            params,
        };
        (statement, witness)
    }
}
