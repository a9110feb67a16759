use crate::{constants::ASSET_ID_PERSONALIZATION, primitives::DomainHasher};

field_element! {
    /// An asset identifier.
    ///
    /// Every note, reward line, public line and roster slot names the asset
    /// it carries by this field element. Identifiers are opaque to the pool;
    /// [`AssetId::derive`] maps an external label (e.g. a token mint) into
    /// the field.
    pub struct AssetId;
}

impl AssetId {
    /// Derive an asset identifier from an external label.
    ///
    /// `id = ToBase(BLAKE2b-512("Pool-AssetId", label))`
    #[must_use]
    pub fn derive(label: &[u8]) -> Self {
        Self(
            DomainHasher::new(ASSET_ID_PERSONALIZATION)
                .bytes(label)
                .finalize(),
        )
    }
}
