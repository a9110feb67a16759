//! Note-related keys: PublicKey, NullifierKey.

use pasta_curves::Fp;

use crate::{
    constants::{NULLIFIER_KEY_PERSONALIZATION, PUBLIC_KEY_PERSONALIZATION},
    primitives::DomainHasher,
};

field_element! {
    /// The public spending key `pk`.
    ///
    /// The owner field of every note and deployment. A one-way function of
    /// `ask`: leaking `pk` reveals nothing about `ask`, and only the holder of
    /// `ask` can show that a note's owner matches.
    pub struct PublicKey;
}

impl PublicKey {
    pub(super) fn derive(ak: &[u8; 32]) -> Self {
        Self(
            DomainHasher::new(PUBLIC_KEY_PERSONALIZATION)
                .bytes(ak)
                .finalize(),
        )
    }
}

field_element! {
    /// The nullifier deriving key `nk`.
    ///
    /// `nf = H(nk, cm, position)`. Holding `nk` lets a wallet (or a delegated
    /// watcher) compute nullifiers and so detect spends; it confers no spend
    /// authority on its own.
    pub struct NullifierKey;
}

impl NullifierKey {
    pub(super) fn derive(nsk: &Fp) -> Self {
        Self(
            DomainHasher::new(NULLIFIER_KEY_PERSONALIZATION)
                .field(nsk)
                .finalize(),
        )
    }
}
