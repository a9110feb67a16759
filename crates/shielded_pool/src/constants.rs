//! Protocol-wide domain separators, personalizations and fixed parameters.
//!
//! Every hash in the pool is BLAKE2b-512 reduced into $\mathbb{F}_p$ via
//! `FromUniformBytes`. Domain separation comes from the BLAKE2b
//! personalization (at most 16 bytes), so two entity types never share a
//! hash domain even when their preimages have the same shape.

/// BLAKE2b-512 personalization for `PRF^expand`: key expansion from a
/// spending key to the two spend secrets (`ask`, `nsk`).
pub const PRF_EXPAND_PERSONALIZATION: &[u8; 16] = b"Pool__ExpandSeed";

/// BLAKE2b-512 personalization for the public spending key
/// `pk = ToBase(BLAKE2b-512("Pool-SpendPubKey", ak))`.
pub const PUBLIC_KEY_PERSONALIZATION: &[u8; 16] = b"Pool-SpendPubKey";

/// BLAKE2b-512 personalization for the nullifier key
/// `nk = ToBase(BLAKE2b-512("Pool-NfKey", nsk))`.
pub const NULLIFIER_KEY_PERSONALIZATION: &[u8; 10] = b"Pool-NfKey";

/// Domain for spendable note commitments.
pub const NOTE_COMMITMENT_PERSONALIZATION: &[u8; 15] = b"Pool-NoteCommit";

/// Domain for mining deployment commitments.
///
/// Deployments share the commitment accumulator with notes; this domain is
/// what keeps a deployment from ever opening as a spendable note.
pub const DEPLOYMENT_COMMITMENT_PERSONALIZATION: &[u8; 15] = b"Pool-MineCommit";

/// Domain for nullifier derivation `nf = H(nk, cm, position)`.
pub const NULLIFIER_PERSONALIZATION: &[u8; 14] = b"Pool-Nullifier";

/// Domain for interior merkle nodes of both trees.
pub const MERKLE_NODE_PERSONALIZATION: &[u8; 15] = b"Pool-MerkleNode";

/// Domain for indexed nullifier tree leaves `(value, next_value, next_index)`.
pub const INDEXED_LEAF_PERSONALIZATION: &[u8; 16] = b"Pool-IndexedLeaf";

/// Domain for the external transaction parameters hash.
pub const TRANSACT_PARAMS_PERSONALIZATION: &[u8; 13] = b"Pool-TxParams";

/// Domain for deriving asset identifiers from external labels (mint keys).
pub const ASSET_ID_PERSONALIZATION: &[u8; 12] = b"Pool-AssetId";

/// Proof transcript domain of the transaction validity predicate.
pub const TRANSACT_CIRCUIT_ID: &[u8; 13] = b"Pool-Transact";

/// Proof transcript domain of the mining deploy predicate.
pub const DEPLOY_CIRCUIT_ID: &[u8; 11] = b"Pool-Deploy";

/// Proof transcript domain of the mining claim predicate.
pub const CLAIM_CIRCUIT_ID: &[u8; 10] = b"Pool-Claim";

/// The only note version this implementation creates and accepts.
pub const NOTE_VERSION: u8 = 1;

/// Fixed-point precision of reward accumulators (`1e9`).
pub const REWARD_SCALE: u128 = 1_000_000_000;

/// Default height of both trees (`2^26` ≈ 67M leaves).
pub const DEFAULT_TREE_HEIGHT: u8 = 26;

/// Largest supported tree height; leaf indices are `u64`.
pub const MAX_TREE_HEIGHT: u8 = 63;

/// Default amount range: amounts must be `< 2^64`.
pub const DEFAULT_AMOUNT_BITS: u32 = 64;

/// Widest amount range that still leaves headroom for summing amounts in
/// `u128` without overflow.
pub const MAX_AMOUNT_BITS: u32 = 120;

/// Number of blocks a mining deployment can select from.
pub const MINING_BLOCKS: usize = 25;

/// Domain-separated key expansion from a spending key.
///
/// `PRF^expand_sk(t) = BLAKE2b-512("Pool__ExpandSeed", sk || t)`
#[derive(Clone, Copy, Debug)]
pub(crate) struct PrfExpand {
    domain_separator: u8,
}

impl PrfExpand {
    /// `[0x00]` -> `ask` (spend authorizing key, scalar field)
    pub(crate) const ASK: Self = Self {
        domain_separator: 0x00,
    };
    /// `[0x01]` -> `nsk` (nullifier secret key, base field)
    pub(crate) const NSK: Self = Self {
        domain_separator: 0x01,
    };

    /// Evaluate the PRF: `BLAKE2b-512("Pool__ExpandSeed", sk || domain_sep)`.
    ///
    /// Returns 64 bytes suitable for unbiased reduction into either field
    /// via `FromUniformBytes`.
    pub(crate) fn with(self, sk: &[u8; 32]) -> [u8; 64] {
        *blake2b_simd::Params::new()
            .hash_length(64)
            .personal(PRF_EXPAND_PERSONALIZATION)
            .to_state()
            .update(sk)
            .update(&[self.domain_separator])
            .finalize()
            .as_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Same key, different domain separators -> different outputs.
    #[test]
    fn prf_expand_domain_separators_independent() {
        let sk = [0x42u8; 32];
        assert_ne!(PrfExpand::ASK.with(&sk), PrfExpand::NSK.with(&sk));
    }

    /// Every personalization fits the BLAKE2b personal field, and no two
    /// domains coincide.
    #[test]
    fn personalizations_are_distinct() {
        let domains: [&[u8]; 13] = [
            PRF_EXPAND_PERSONALIZATION,
            PUBLIC_KEY_PERSONALIZATION,
            NULLIFIER_KEY_PERSONALIZATION,
            NOTE_COMMITMENT_PERSONALIZATION,
            DEPLOYMENT_COMMITMENT_PERSONALIZATION,
            NULLIFIER_PERSONALIZATION,
            MERKLE_NODE_PERSONALIZATION,
            INDEXED_LEAF_PERSONALIZATION,
            TRANSACT_PARAMS_PERSONALIZATION,
            ASSET_ID_PERSONALIZATION,
            TRANSACT_CIRCUIT_ID,
            DEPLOY_CIRCUIT_ID,
            CLAIM_CIRCUIT_ID,
        ];
        for (idx, left) in domains.iter().enumerate() {
            assert!(left.len() <= 16, "personalization too long");
            for right in domains.iter().skip(idx + 1) {
                assert_ne!(left, right);
            }
        }
    }
}
