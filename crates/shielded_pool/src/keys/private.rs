//! Private (spend) keys.

use ff::{Field as _, FromUniformBytes as _, PrimeField as _};
use pasta_curves::{Fp, Fq};
use rand::{CryptoRng, RngCore};
use reddsa::orchard::SpendAuth;

use super::{
    note::{NullifierKey, PublicKey},
    public::SpendValidatingKey,
};
use crate::constants::PrfExpand;

/// A spending key: raw 32-byte entropy.
///
/// The root from which both spend secrets are derived. This key must be kept
/// secret as it provides full spending authority.
///
/// - [`SpendAuthorizingKey`] (`ask`)
/// - [`NullifierSecretKey`] (`nsk`)
#[derive(Clone, Copy, Debug)]
pub struct SpendingKey([u8; 32]);

impl From<[u8; 32]> for SpendingKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl SpendingKey {
    /// Sample a fresh spending key.
    pub fn random(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Derive `ask = ToScalar(PRF^expand_sk([0x00]))`.
    #[must_use]
    pub fn spend_authorizing_key(&self) -> SpendAuthorizingKey {
        let ask = Fq::from_uniform_bytes(&PrfExpand::ASK.with(&self.0));
        #[expect(clippy::expect_used, reason = "specified behavior")]
        let key = SpendAuthorizingKey::try_from(ask)
            .expect("uniform PRF output is a nonzero scalar");
        key
    }

    /// Derive `nsk = ToBase(PRF^expand_sk([0x01]))`.
    #[must_use]
    pub fn nullifier_secret_key(&self) -> NullifierSecretKey {
        NullifierSecretKey(Fp::from_uniform_bytes(&PrfExpand::NSK.with(&self.0)))
    }

    /// Both spend secrets.
    #[must_use]
    pub fn spend_authority(&self) -> SpendAuthority {
        SpendAuthority {
            ask: self.spend_authorizing_key(),
            nsk: self.nullifier_secret_key(),
        }
    }
}

/// The spend authorizing key `ask`.
///
/// A RedPallas signing scalar. Its only role in the predicate is to prove
/// ownership: the prover shows that the note's owner key equals
/// [`public_key`](Self::public_key) of the `ask` it holds.
#[derive(Clone, Copy, Debug)]
pub struct SpendAuthorizingKey(reddsa::SigningKey<SpendAuth>);

impl SpendAuthorizingKey {
    /// Derive the spend validating key: `ak = [ask]G`.
    #[must_use]
    pub fn validating_key(&self) -> SpendValidatingKey {
        // reddsa::VerificationKey::from(&signing_key) performs [sk]G
        // (scalar-times-basepoint), not a trivial type conversion.
        SpendValidatingKey(reddsa::VerificationKey::from(&self.0))
    }

    /// Derive the public spending key `pk` (one-way in `ask`).
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.validating_key().public_key()
    }
}

impl TryFrom<Fq> for SpendAuthorizingKey {
    type Error = reddsa::Error;

    /// Rejects the zero scalar.
    fn try_from(ask: Fq) -> Result<Self, Self::Error> {
        if bool::from(ask.is_zero()) {
            return Err(reddsa::Error::MalformedSigningKey);
        }
        Ok(Self(reddsa::SigningKey::<SpendAuth>::try_from(ask.to_repr())?))
    }
}

/// The nullifier secret key `nsk`.
///
/// Only its image [`NullifierKey`] (`nk`) enters nullifier derivation, so
/// handing out `nk` lets a watcher recognise spends without learning `nsk`.
#[derive(Clone, Copy, Debug)]
pub struct NullifierSecretKey(Fp);

impl From<Fp> for NullifierSecretKey {
    fn from(nsk: Fp) -> Self {
        Self(nsk)
    }
}

impl NullifierSecretKey {
    /// Derive `nk = ToBase(BLAKE2b-512("Pool-NfKey", nsk))`.
    #[must_use]
    pub fn nullifier_key(&self) -> NullifierKey {
        NullifierKey::derive(&self.0)
    }
}

/// The pair of secrets that authorises spending a note: `(ask, nsk)`.
///
/// Supplied per input to the predicate, which re-derives `pk` and `nk` from
/// it rather than trusting claimed public keys.
#[derive(Clone, Copy, Debug)]
pub struct SpendAuthority {
    /// Spend authorizing key.
    pub ask: SpendAuthorizingKey,
    /// Nullifier secret key.
    pub nsk: NullifierSecretKey,
}

impl SpendAuthority {
    /// The owner key notes spendable by this authority are locked to.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.ask.public_key()
    }

    /// The key nullifiers are derived with.
    #[must_use]
    pub fn nullifier_key(&self) -> NullifierKey {
        self.nsk.nullifier_key()
    }
}
