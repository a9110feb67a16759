//! Fixed-height sparse merkle trees.
//!
//! Both accumulators of the pool are binary merkle trees of a fixed height
//! `H` over $\mathbb{F}_p$ leaves:
//!
//! - [`CommitmentTree`]: append-only, one note or deployment commitment per
//!   leaf.
//! - [`NullifierTree`]: an indexed tree whose leaves form a sorted linked
//!   list of spent nullifiers.
//!
//! Interior nodes are `H(left || right)` under the merkle domain. An empty
//! leaf is `Fp::ZERO` and an empty subtree of level `l` hashes to the
//! precomputed zero node $z_l$ with $z_0 = 0$, $z_{l+1} = H(z_l \| z_l)$, so
//! only non-empty nodes are ever stored.
//!
//! ## Node store
//!
//! Nodes are addressed by `(level, index)` with level 0 holding the leaves
//! and level `H` the root. The storage backend is the [`NodeStore`] trait;
//! [`MemoryStore`] keeps them in an ordered map. A tree is reopened from a
//! store plus its [`TreeState`].

use alloc::{collections::BTreeMap, vec::Vec};

use ff::Field as _;
use pasta_curves::Fp;

use crate::{
    constants::MAX_TREE_HEIGHT,
    error::{Classify, ErrorClass},
    note::Nullifier,
    primitives::merkle_node,
};

mod commitment;
mod indexed;

pub use commitment::{CommitmentTree, verify_membership};
pub use indexed::{
    IndexedLeaf, InsertionWitness, LowLeafWitness, NullifierTree, verify_insertion,
    verify_non_membership,
};

/// Errors from tree construction and mutation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TreeError {
    /// Heights outside `1..=63` are not supported.
    #[error("tree height {0} is out of range")]
    InvalidHeight(u8),

    /// Every leaf slot is taken.
    #[error("tree is full ({capacity} leaves)")]
    Full {
        /// Number of leaf slots.
        capacity: u64,
    },

    /// A leaf index beyond the populated part of the tree.
    #[error("leaf index {index} is not populated (size {size})")]
    IndexOutOfRange {
        /// The requested index.
        index: u64,
        /// Number of populated leaves.
        size: u64,
    },

    /// A historical view past the current number of leaves.
    #[error("tree holds {leaf_count} leaves, cannot view it at size {size}")]
    SizeAhead {
        /// The requested size.
        size: u64,
        /// Number of populated leaves.
        leaf_count: u64,
    },

    /// The leaf at the index is not the one claimed.
    #[error("leaf at index {0} does not match")]
    LeafMismatch(u64),

    /// The nullifier is already in the tree.
    #[error("nullifier is already present")]
    AlreadyPresent(Nullifier),

    /// The same nullifier appears twice in one batch.
    #[error("nullifier appears twice in the batch")]
    DuplicateInBatch(Nullifier),

    /// The batch exceeds the configured size.
    #[error("batch of {len} exceeds the limit of {max}")]
    BatchTooLarge {
        /// Batch length.
        len: usize,
        /// Configured limit.
        max: usize,
    },

    /// The store does not hash to the recorded root.
    #[error("node store is inconsistent with the recorded tree state")]
    CorruptStore,
}

impl Classify for TreeError {
    fn class(&self) -> ErrorClass {
        match *self {
            Self::AlreadyPresent(_) | Self::DuplicateInBatch(_) => ErrorClass::DoubleSpend,
            Self::InvalidHeight(_)
            | Self::Full { .. }
            | Self::IndexOutOfRange { .. }
            | Self::SizeAhead { .. }
            | Self::LeafMismatch(_)
            | Self::BatchTooLarge { .. }
            | Self::CorruptStore => ErrorClass::Malformed,
        }
    }
}

/// Point lookups and updates of merkle nodes keyed by `(level, index)`.
///
/// Absent nodes are empty subtrees; the tree substitutes the zero node of
/// that level.
pub trait NodeStore {
    /// The node at `(level, index)`, if one was ever written.
    fn node(&self, level: u8, index: u64) -> Option<Fp>;

    /// Writes the node at `(level, index)`.
    fn set_node(&mut self, level: u8, index: u64, node: Fp);
}

/// An in-memory [`NodeStore`].
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(BTreeMap<(u8, u64), Fp>);

impl MemoryStore {
    /// Number of stored (non-empty) nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no node has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl NodeStore for MemoryStore {
    fn node(&self, level: u8, index: u64) -> Option<Fp> {
        self.0.get(&(level, index)).copied()
    }

    fn set_node(&mut self, level: u8, index: u64, node: Fp) {
        self.0.insert((level, index), node);
    }
}

/// The persisted summary of a tree: enough, together with its node store,
/// to reopen it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeState {
    /// Root at the time of persisting, canonical bytes.
    pub root: [u8; 32],
    /// Tree height.
    pub height: u8,
    /// Number of populated leaf slots (`nextFreeIndex` for the indexed
    /// tree).
    pub leaf_count: u64,
}

/// An authentication path: the sibling of each node from the leaf up.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MerklePath {
    siblings: Vec<Fp>,
}

impl MerklePath {
    /// The siblings, leaf level first.
    #[must_use]
    pub fn siblings(&self) -> &[Fp] {
        &self.siblings
    }

    /// Path length (the tree height).
    #[must_use]
    pub fn height(&self) -> usize {
        self.siblings.len()
    }

    /// Folds `leaf` at `index` up the path.
    #[must_use]
    pub fn root(&self, leaf: Fp, index: u64) -> Fp {
        let (root, _) = self
            .siblings
            .iter()
            .fold((leaf, index), |(node, position), sibling| {
                let parent = if position & 1 == 0 {
                    merkle_node(&node, sibling)
                } else {
                    merkle_node(sibling, &node)
                };
                (parent, position >> 1u32)
            });
        root
    }

    /// Whether `leaf` at `index` hashes to `root` along this path.
    ///
    /// Rejects indices that do not fit the path's height.
    #[must_use]
    pub fn verify(&self, root: Fp, leaf: Fp, index: u64) -> bool {
        let fits = u32::try_from(self.siblings.len())
            .ok()
            .and_then(|height| index.checked_shr(height))
            .is_none_or(|high| high == 0);
        fits && self.root(leaf, index) == root
    }
}

impl From<Vec<Fp>> for MerklePath {
    fn from(siblings: Vec<Fp>) -> Self {
        Self { siblings }
    }
}

/// Shared sparse merkle engine: a height, its zero nodes, and a store.
#[derive(Clone, Debug)]
struct SparseTree<S> {
    height: u8,
    zeros: Vec<Fp>,
    store: S,
}

impl<S: NodeStore> SparseTree<S> {
    fn new(height: u8, store: S) -> Result<Self, TreeError> {
        if height == 0 || height > MAX_TREE_HEIGHT {
            return Err(TreeError::InvalidHeight(height));
        }
        let mut zeros = Vec::with_capacity(usize::from(height) + 1);
        let mut zero = Fp::ZERO;
        zeros.push(zero);
        for _ in 0..height {
            zero = merkle_node(&zero, &zero);
            zeros.push(zero);
        }
        Ok(Self {
            height,
            zeros,
            store,
        })
    }

    fn capacity(&self) -> u64 {
        1u64 << self.height
    }

    fn zero(&self, level: u8) -> Fp {
        self.zeros
            .get(usize::from(level))
            .copied()
            .unwrap_or(Fp::ZERO)
    }

    fn node(&self, level: u8, index: u64) -> Fp {
        self.store
            .node(level, index)
            .unwrap_or_else(|| self.zero(level))
    }

    fn root(&self) -> Fp {
        self.node(self.height, 0)
    }

    /// Writes `leaf` at `index` and rehashes its path; returns the new root.
    fn set_leaf(&mut self, index: u64, leaf: Fp) -> Fp {
        let mut node = leaf;
        let mut position = index;
        self.store.set_node(0, position, node);
        for level in 0..self.height {
            let sibling = self.node(level, position ^ 1);
            node = if position & 1 == 0 {
                merkle_node(&node, &sibling)
            } else {
                merkle_node(&sibling, &node)
            };
            position >>= 1u32;
            self.store.set_node(level + 1, position, node);
        }
        node
    }

    fn path(&self, index: u64) -> MerklePath {
        let siblings = (0..self.height)
            .map(|level| self.node(level, (index >> level) ^ 1))
            .collect();
        MerklePath { siblings }
    }

    /// Node `(level, index)` as it stood when only the leaves below `size`
    /// were written.
    ///
    /// Valid for trees filled left to right: a subtree wholly below `size`
    /// has not changed since, one wholly above it was still empty, and only
    /// the subtrees straddling `size` are rehashed.
    fn node_at(&self, level: u8, index: u64, size: u64) -> Fp {
        let first = index << level;
        if first >= size {
            return self.zero(level);
        }
        let straddles = first.saturating_add(1u64 << level) > size;
        match level.checked_sub(1) {
            Some(child) if straddles => merkle_node(
                &self.node_at(child, index << 1u32, size),
                &self.node_at(child, (index << 1u32) | 1, size),
            ),
            Some(_) | None => self.node(level, index),
        }
    }

    /// [`Self::path`] in the tree of the first `size` leaves.
    fn path_at(&self, index: u64, size: u64) -> MerklePath {
        let siblings = (0..self.height)
            .map(|level| self.node_at(level, (index >> level) ^ 1, size))
            .collect();
        MerklePath { siblings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_root_is_top_zero_node() {
        let tree = SparseTree::new(4, MemoryStore::default()).unwrap();
        let mut zero = Fp::ZERO;
        for _ in 0..4 {
            zero = merkle_node(&zero, &zero);
        }
        assert_eq!(tree.root(), zero);
        assert!(tree.store.is_empty());
    }

    #[test]
    fn height_bounds() {
        assert_eq!(
            SparseTree::new(0, MemoryStore::default()).err(),
            Some(TreeError::InvalidHeight(0))
        );
        assert_eq!(
            SparseTree::new(64, MemoryStore::default()).err(),
            Some(TreeError::InvalidHeight(64))
        );
        assert!(SparseTree::new(63, MemoryStore::default()).is_ok());
    }

    /// A path taken from the engine folds back to the engine's root.
    #[test]
    fn path_matches_root() {
        let mut tree = SparseTree::new(3, MemoryStore::default()).unwrap();
        tree.set_leaf(2, Fp::from(9u64));
        let root = tree.set_leaf(5, Fp::from(11u64));
        assert_eq!(root, tree.root());

        let path = tree.path(5);
        assert_eq!(path.height(), 3);
        assert!(path.verify(root, Fp::from(11u64), 5));
        assert!(!path.verify(root, Fp::from(11u64), 4));
        assert!(!path.verify(root, Fp::from(11u64), 13));
        assert!(tree.path(7).verify(root, Fp::ZERO, 7));
    }
}
