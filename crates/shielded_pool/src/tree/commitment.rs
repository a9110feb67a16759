//! The commitment accumulator: an append-only merkle tree of note and
//! deployment commitments.

use ff::PrimeField as _;
use pasta_curves::Fp;

use super::{MemoryStore, MerklePath, NodeStore, SparseTree, TreeError, TreeState};
use crate::{note::Commitment, primitives::CommitmentRoot};

/// Append-only accumulator of commitments.
///
/// The root is a pure function of the ordered sequence of appended leaves.
#[derive(Clone, Debug)]
pub struct CommitmentTree<S = MemoryStore> {
    inner: SparseTree<S>,
    leaf_count: u64,
}

impl CommitmentTree {
    /// An empty in-memory tree of `height`.
    pub fn new(height: u8) -> Result<Self, TreeError> {
        Self::with_store(height, MemoryStore::default())
    }
}

impl<S: NodeStore> CommitmentTree<S> {
    /// An empty tree over `store`, which must hold no nodes.
    pub fn with_store(height: u8, store: S) -> Result<Self, TreeError> {
        Ok(Self {
            inner: SparseTree::new(height, store)?,
            leaf_count: 0,
        })
    }

    /// Reopens a persisted tree.
    ///
    /// Fails if the store does not hash to the recorded root.
    pub fn open(store: S, state: TreeState) -> Result<Self, TreeError> {
        let inner = SparseTree::new(state.height, store)?;
        if state.leaf_count > inner.capacity() || inner.root().to_repr() != state.root {
            return Err(TreeError::CorruptStore);
        }
        Ok(Self {
            inner,
            leaf_count: state.leaf_count,
        })
    }

    /// Appends `leaf` at the next free index; returns the new root and the
    /// leaf's index.
    pub fn append(&mut self, leaf: Commitment) -> Result<(CommitmentRoot, u64), TreeError> {
        let capacity = self.inner.capacity();
        if self.leaf_count >= capacity {
            return Err(TreeError::Full { capacity });
        }
        let index = self.leaf_count;
        let root = self.inner.set_leaf(index, leaf.into());
        self.leaf_count += 1;
        tracing::debug!(index, "commitment appended");
        Ok((CommitmentRoot::from(root), index))
    }

    /// Authentication path for `leaf` at `index`.
    ///
    /// Fails if `index` is unpopulated or holds a different leaf.
    pub fn prove_membership(&self, leaf: Commitment, index: u64) -> Result<MerklePath, TreeError> {
        if index >= self.leaf_count {
            return Err(TreeError::IndexOutOfRange {
                index,
                size: self.leaf_count,
            });
        }
        if self.inner.node(0, index) != Fp::from(leaf) {
            return Err(TreeError::LeafMismatch(index));
        }
        Ok(self.inner.path(index))
    }

    /// Authentication path for `leaf` at `index` in the tree as it stood
    /// after its first `size` appends, under [`Self::root_at`].
    pub fn prove_membership_at(
        &self,
        leaf: Commitment,
        index: u64,
        size: u64,
    ) -> Result<MerklePath, TreeError> {
        self.check_size(size)?;
        if index >= size {
            return Err(TreeError::IndexOutOfRange { index, size });
        }
        if self.inner.node(0, index) != Fp::from(leaf) {
            return Err(TreeError::LeafMismatch(index));
        }
        Ok(self.inner.path_at(index, size))
    }

    /// Current root.
    #[must_use]
    pub fn root(&self) -> CommitmentRoot {
        CommitmentRoot::from(self.inner.root())
    }

    /// Root after the first `size` appends.
    pub fn root_at(&self, size: u64) -> Result<CommitmentRoot, TreeError> {
        self.check_size(size)?;
        Ok(CommitmentRoot::from(
            self.inner.node_at(self.inner.height, 0, size),
        ))
    }

    const fn check_size(&self, size: u64) -> Result<(), TreeError> {
        if size > self.leaf_count {
            Err(TreeError::SizeAhead {
                size,
                leaf_count: self.leaf_count,
            })
        } else {
            Ok(())
        }
    }

    /// Number of appended leaves.
    #[must_use]
    pub const fn leaf_count(&self) -> u64 {
        self.leaf_count
    }

    /// Tree height.
    #[must_use]
    pub const fn height(&self) -> u8 {
        self.inner.height
    }

    /// Persistable summary.
    #[must_use]
    pub fn state(&self) -> TreeState {
        TreeState {
            root: self.inner.root().to_repr(),
            height: self.inner.height,
            leaf_count: self.leaf_count,
        }
    }

    /// The backing node store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.inner.store
    }
}

/// Whether `leaf` at `index` is a member of the tree with `root`.
#[must_use]
pub fn verify_membership(
    root: CommitmentRoot,
    leaf: Commitment,
    index: u64,
    path: &MerklePath,
) -> bool {
    path.verify(root.into(), leaf.into(), index)
}
