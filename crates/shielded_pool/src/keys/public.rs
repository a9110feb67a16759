//! Public (verification) keys.

use reddsa::orchard::SpendAuth;

use super::note::PublicKey;

/// The spend validating key `ak = [ask]G`, the public counterpart of
/// [`SpendAuthorizingKey`](super::private::SpendAuthorizingKey).
///
/// Notes do not carry `ak` directly; they carry its hash
/// [`PublicKey`] so the owner slot is a single base-field element.
#[derive(Clone, Copy, Debug)]
#[expect(clippy::field_scoped_visibility_modifiers, reason = "constructed by `ask`")]
pub struct SpendValidatingKey(pub(super) reddsa::VerificationKey<SpendAuth>);

impl SpendValidatingKey {
    /// `pk = ToBase(BLAKE2b-512("Pool-SpendPubKey", ak))`.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey::derive(&(*self).into())
    }
}

impl From<SpendValidatingKey> for [u8; 32] {
    fn from(ak: SpendValidatingKey) -> Self {
        ak.0.into()
    }
}
