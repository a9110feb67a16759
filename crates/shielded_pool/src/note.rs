//! Notes, note commitments and nullifiers.
//!
//! ## Note Structure
//!
//! | Field      | Type | Description |
//! | ---------- | ---- | ----------- |
//! | `version`  | `u8` | Format version ([`NOTE_VERSION`]) |
//! | `asset`    | [`AssetId`] | Asset carried by the note |
//! | `amount`   | [`Value`] | Principal |
//! | `owner`    | [`PublicKey`] | Owner's public spending key `pk` |
//! | `blinding` | [`Blinding`] | Hiding randomness |
//! | `snapshot` | [`Accumulator`] | Reward accumulator at creation |
//! | `remainder`| `u128` | Sub-unit reward residue, `< SCALE` |
//!
//! ## Note Commitment
//!
//! $$cm = \text{ToBase}(\text{BLAKE2b-512}(\text{"Pool-NoteCommit"},\;
//!   version \| asset \| amount \| pk \| blinding \| snapshot \| remainder))$$
//!
//! Binding through collision resistance, hiding through the fresh blinding.
//! Mining deployments are committed under their own domain
//! ([`crate::mining::DeploymentCommitment`]), so no preimage can open as
//! both.
//!
//! ## Nullifier Derivation
//!
//! $$nf = \text{ToBase}(\text{BLAKE2b-512}(\text{"Pool-Nullifier"},\;
//!   nk \| cm \| position))$$
//!
//! where `position` is the commitment's leaf index in the accumulator. Only
//! the holder of `nk` can compute it, and it is unique per leaf. The value
//! zero is the genesis entry of the nullifier tree and so is never
//! spendable.

use ff::Field as _;
use pasta_curves::Fp;
use rand::{CryptoRng, RngCore};

use crate::{
    constants::{NOTE_COMMITMENT_PERSONALIZATION, NOTE_VERSION, NULLIFIER_PERSONALIZATION},
    keys::{NullifierKey, PublicKey},
    primitives::{AssetId, DomainHasher},
    reward::{self, Accumulator, RewardError},
    value::Value,
};

// =============================================================================
// Blinding
// =============================================================================

/// Commitment blinding: fresh per note, never reused.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Blinding(Fp);

impl Blinding {
    /// Sample a fresh blinding.
    pub fn random(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        Self(Fp::random(rng))
    }
}

impl From<Fp> for Blinding {
    fn from(fp: Fp) -> Self {
        Self(fp)
    }
}

impl From<Blinding> for Fp {
    fn from(blinding: Blinding) -> Self {
        blinding.0
    }
}

// =============================================================================
// Note
// =============================================================================

/// A unit of value of one asset, owned by one public key.
///
/// Immutable once committed: spending nullifies it, and any change in value
/// or owner is a new note.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Note {
    /// Format version.
    pub version: u8,
    /// The asset carried.
    pub asset: AssetId,
    /// Principal amount.
    pub amount: Value,
    /// Owner's public spending key.
    pub owner: PublicKey,
    /// Hiding randomness.
    pub blinding: Blinding,
    /// Reward accumulator of `asset` when the note was created.
    pub snapshot: Accumulator,
    /// Reward residue below one unit, in `1 / SCALE` units, carried over
    /// from the notes this one was paid from.
    pub remainder: u128,
}

impl Note {
    /// A current-version note with a fresh blinding.
    pub fn new(
        asset: AssetId,
        amount: Value,
        owner: PublicKey,
        snapshot: Accumulator,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Self {
        Self {
            version: NOTE_VERSION,
            asset,
            amount,
            owner,
            blinding: Blinding::random(rng),
            snapshot,
            remainder: 0,
        }
    }

    /// The same note carrying `remainder`.
    #[must_use]
    pub const fn with_remainder(self, remainder: u128) -> Self {
        Self { remainder, ..self }
    }

    /// Computes the note commitment `cm`.
    #[must_use]
    pub fn commitment(&self) -> Commitment {
        Commitment(
            DomainHasher::new(NOTE_COMMITMENT_PERSONALIZATION)
                .u8(self.version)
                .field(&self.asset.into())
                .u128(self.amount.into())
                .field(&self.owner.into())
                .field(&self.blinding.0)
                .u128(self.snapshot.into())
                .u128(self.remainder)
                .finalize(),
        )
    }

    /// Derives the nullifier of this note committed at leaf `position`.
    #[must_use]
    pub fn nullifier(&self, nk: &NullifierKey, position: u64) -> Nullifier {
        Nullifier::derive(nk, self.commitment().into(), position)
    }

    /// Value redeemable once the accumulator of this note's asset reaches
    /// `global`.
    pub fn value_at(&self, global: Accumulator) -> Result<reward::Accrual, RewardError> {
        reward::accrue(self.amount, global, self.snapshot, self.remainder)
    }

    /// Re-snapshots this note at `global`.
    ///
    /// The new note has the same asset and owner, the value accrued so far as
    /// principal and the leftover residue as its remainder. It redeems the
    /// same value as this note at `global` and never less afterwards.
    pub fn rebase(
        &self,
        global: Accumulator,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Result<Self, RewardError> {
        let accrual = self.value_at(global)?;
        Ok(Self::new(self.asset, accrual.value, self.owner, global, rng)
            .with_remainder(accrual.remainder))
    }
}

// =============================================================================
// Note commitment
// =============================================================================

field_element! {
    /// A note commitment `cm`, the leaf a note occupies in the commitment
    /// accumulator.
    pub struct Commitment;
}

// =============================================================================
// Nullifier
// =============================================================================

field_element! {
    /// A nullifier.
    ///
    /// Revealed when a note is spent and inserted into the indexed nullifier
    /// tree; a second spend of the same note produces the same nullifier and
    /// is rejected.
    pub struct Nullifier;
}

impl Nullifier {
    /// `nf = H(nk, cm, position)`.
    ///
    /// Shared by notes and mining deployments, which differ only in how
    /// `cm` is formed.
    pub(crate) fn derive(nk: &NullifierKey, cm: Fp, position: u64) -> Self {
        Self(
            DomainHasher::new(NULLIFIER_PERSONALIZATION)
                .field(&(*nk).into())
                .field(&cm)
                .u64(position)
                .finalize(),
        )
    }
}

#[cfg(test)]
mod tests {
    use ff::Field as _;
    use rand::{SeedableRng as _, rngs::StdRng};

    use super::*;
    use crate::keys::SpendingKey;

    fn note(rng: &mut StdRng, amount: u64) -> Note {
        let pk = SpendingKey::from([7u8; 32]).spend_authority().public_key();
        Note::new(
            AssetId::derive(b"usdc"),
            Value::from(amount),
            pk,
            Accumulator::ZERO,
            rng,
        )
    }

    /// Each committed field changes the commitment.
    #[test]
    fn commitment_binds_every_field() {
        let mut rng = StdRng::seed_from_u64(0);
        let base = note(&mut rng, 100);
        let cm = base.commitment();
        assert_eq!(cm, base.commitment());

        let variants = [
            Note { version: 2, ..base },
            Note {
                asset: AssetId::derive(b"sol"),
                ..base
            },
            Note {
                amount: Value::from(101u64),
                ..base
            },
            Note {
                owner: PublicKey::from(Fp::ONE),
                ..base
            },
            Note {
                blinding: Blinding::random(&mut rng),
                ..base
            },
            Note {
                snapshot: Accumulator::from(1),
                ..base
            },
            base.with_remainder(1),
        ];
        for variant in variants {
            assert_ne!(variant.commitment(), cm);
        }
    }

    /// Same note, different leaf or key: different nullifier.
    #[test]
    fn nullifier_binds_key_and_position() {
        let mut rng = StdRng::seed_from_u64(1);
        let spent = note(&mut rng, 5);
        let nk = SpendingKey::from([7u8; 32]).spend_authority().nullifier_key();
        let other_nk = SpendingKey::from([8u8; 32]).spend_authority().nullifier_key();

        let nf = spent.nullifier(&nk, 3);
        assert_eq!(nf, spent.nullifier(&nk, 3));
        assert_ne!(nf, spent.nullifier(&nk, 4));
        assert_ne!(nf, spent.nullifier(&other_nk, 3));
    }

    #[test]
    fn rebase_preserves_value() {
        let mut rng = StdRng::seed_from_u64(2);
        let old = note(&mut rng, 3);
        let global = Accumulator::from(500_000_000);

        let before = old.value_at(global).unwrap();
        let rebased = old.rebase(global, &mut rng).unwrap();
        assert_eq!(rebased.amount, before.value);
        assert_eq!(rebased.snapshot, global);
        assert_eq!(rebased.remainder, before.remainder);
        assert_eq!(rebased.owner, old.owner);
        assert_eq!(rebased.value_at(global).unwrap(), before);

        let later = Accumulator::from(1_000_000_000);
        assert_eq!(
            rebased.value_at(later).unwrap().value,
            old.value_at(later).unwrap().value
        );
    }
}
