//! The indexed nullifier tree.
//!
//! Leaves are `(value, next_value, next_index)` and form a linked list
//! sorted by `value`. Index 0 holds the genesis leaf `(0, 0, 0)`; a
//! `next_value` of zero marks the tail and stands for infinity. A value `v`
//! is absent iff some leaf *brackets* it:
//!
//! $$low.value < v < low.next\_value \quad\text{or}\quad
//!   (low.next\_value = 0 \wedge low.value < v)$$
//!
//! Inserting `v` is always two merkle writes against the bracketing leaf
//! `low` and the next free slot `i`:
//!
//! 1. **update**: `low' = (low.value, v, i)` gives the intermediate root;
//! 2. **append**: `new = (v, low.next_value, low.next_index)` at `i`.
//!
//! The [`InsertionWitness`] of each step carries exactly what a verifier
//! holding only the old root needs to recompute both roots.
//!
//! Leaves live in an index-addressed arena; a `BTreeMap` from value to
//! index finds the bracketing leaf.

use alloc::{
    collections::{BTreeMap, BTreeSet},
    vec::Vec,
};

use ff::{Field as _, PrimeField as _};
use pasta_curves::Fp;

use super::{MemoryStore, MerklePath, NodeStore, SparseTree, TreeError, TreeState};
use crate::{
    constants::INDEXED_LEAF_PERSONALIZATION,
    note::Nullifier,
    primitives::{DomainHasher, NullifierRoot},
};

/// A leaf of the indexed tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexedLeaf {
    /// The nullifier stored in this leaf.
    pub value: Nullifier,
    /// The next larger stored nullifier; zero at the tail.
    pub next_value: Nullifier,
    /// Slot of the next larger leaf; zero at the tail.
    pub next_index: u64,
}

impl IndexedLeaf {
    /// The genesis leaf `(0, 0, 0)`.
    pub const GENESIS: Self = Self {
        value: Nullifier::ZERO,
        next_value: Nullifier::ZERO,
        next_index: 0,
    };

    /// Leaf hash `H(value || next_value || next_index)`.
    #[must_use]
    pub fn hash(&self) -> Fp {
        DomainHasher::new(INDEXED_LEAF_PERSONALIZATION)
            .field(&self.value.into())
            .field(&self.next_value.into())
            .u64(self.next_index)
            .finalize()
    }

    /// Whether this leaf is the tail of the sorted list.
    #[must_use]
    pub fn is_tail(&self) -> bool {
        Fp::from(self.next_value).is_zero_vartime()
    }

    /// Whether `value` falls strictly between this leaf and its successor.
    #[must_use]
    pub fn brackets(&self, value: Nullifier) -> bool {
        self.value < value && (self.is_tail() || value < self.next_value)
    }
}

/// Proof that a value is absent: the leaf bracketing it and its path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LowLeafWitness {
    /// The bracketing leaf.
    pub leaf: IndexedLeaf,
    /// Its slot.
    pub index: u64,
    /// Its authentication path.
    pub path: MerklePath,
}

/// Everything needed to check one insertion from the old root alone.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InsertionWitness {
    /// The inserted nullifier.
    pub value: Nullifier,
    /// Root before the insertion.
    pub old_root: NullifierRoot,
    /// The low leaf before its update, with its path under `old_root`.
    pub low: LowLeafWitness,
    /// Root after updating the low leaf.
    pub intermediate_root: NullifierRoot,
    /// Slot of the new leaf.
    pub new_index: u64,
    /// Path of the (empty) new slot under `intermediate_root`.
    pub new_path: MerklePath,
    /// Root after appending the new leaf.
    pub new_root: NullifierRoot,
}

impl InsertionWitness {
    /// The low leaf after its update.
    #[must_use]
    pub const fn updated_low(&self) -> IndexedLeaf {
        IndexedLeaf {
            value: self.low.leaf.value,
            next_value: self.value,
            next_index: self.new_index,
        }
    }

    /// The appended leaf.
    #[must_use]
    pub const fn new_leaf(&self) -> IndexedLeaf {
        IndexedLeaf {
            value: self.value,
            next_value: self.low.leaf.next_value,
            next_index: self.low.leaf.next_index,
        }
    }
}

/// Sorted linked-list merkle tree of spent nullifiers.
#[derive(Clone, Debug)]
pub struct NullifierTree<S = MemoryStore> {
    inner: SparseTree<S>,
    leaves: Vec<IndexedLeaf>,
    by_value: BTreeMap<Nullifier, u64>,
}

impl NullifierTree {
    /// A tree of `height` holding only the genesis leaf.
    pub fn new(height: u8) -> Result<Self, TreeError> {
        Self::with_store(height, MemoryStore::default())
    }
}

impl<S: NodeStore> NullifierTree<S> {
    /// A tree over an empty `store` holding only the genesis leaf.
    pub fn with_store(height: u8, store: S) -> Result<Self, TreeError> {
        let mut inner = SparseTree::new(height, store)?;
        inner.set_leaf(0, IndexedLeaf::GENESIS.hash());
        Ok(Self {
            inner,
            leaves: alloc::vec![IndexedLeaf::GENESIS],
            by_value: BTreeMap::from([(IndexedLeaf::GENESIS.value, 0)]),
        })
    }

    /// Reopens a persisted tree from its node store and leaf arena.
    ///
    /// Every leaf must hash to its stored slot and the store must hash to
    /// the recorded root.
    pub fn open(store: S, leaves: Vec<IndexedLeaf>, state: TreeState) -> Result<Self, TreeError> {
        let inner = SparseTree::new(state.height, store)?;
        let count = u64::try_from(leaves.len()).map_err(|_err| TreeError::CorruptStore)?;
        if count != state.leaf_count
            || count > inner.capacity()
            || inner.root().to_repr() != state.root
        {
            return Err(TreeError::CorruptStore);
        }

        let mut by_value = BTreeMap::new();
        for (index, leaf) in (0u64..).zip(&leaves) {
            if inner.node(0, index) != leaf.hash() || by_value.insert(leaf.value, index).is_some() {
                return Err(TreeError::CorruptStore);
            }
        }

        Ok(Self {
            inner,
            leaves,
            by_value,
        })
    }

    /// Current root.
    #[must_use]
    pub fn root(&self) -> NullifierRoot {
        NullifierRoot::from(self.inner.root())
    }

    /// Whether `value` has been inserted (zero always has).
    #[must_use]
    pub fn contains(&self, value: Nullifier) -> bool {
        self.by_value.contains_key(&value)
    }

    /// The next free slot.
    #[must_use]
    pub fn next_free_index(&self) -> u64 {
        u64::try_from(self.leaves.len()).unwrap_or(u64::MAX)
    }

    /// The leaf arena in slot order.
    #[must_use]
    pub fn leaves(&self) -> &[IndexedLeaf] {
        &self.leaves
    }

    /// Persistable summary.
    #[must_use]
    pub fn state(&self) -> TreeState {
        TreeState {
            root: self.inner.root().to_repr(),
            height: self.inner.height,
            leaf_count: self.next_free_index(),
        }
    }

    /// The backing node store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.inner.store
    }

    /// Non-membership witness for `value` under the current root.
    pub fn low_leaf(&self, value: Nullifier) -> Result<LowLeafWitness, TreeError> {
        if self.contains(value) {
            return Err(TreeError::AlreadyPresent(value));
        }
        // Genesis holds zero, the minimum, so every absent value has a
        // predecessor.
        let (_, &index) = self
            .by_value
            .range(..value)
            .next_back()
            .ok_or(TreeError::AlreadyPresent(value))?;
        let leaf = self.leaf(index)?;
        Ok(LowLeafWitness {
            leaf,
            index,
            path: self.inner.path(index),
        })
    }

    /// Inserts one nullifier (update + append).
    pub fn insert(&mut self, value: Nullifier) -> Result<InsertionWitness, TreeError> {
        let capacity = self.inner.capacity();
        let new_index = self.next_free_index();
        if new_index >= capacity {
            return Err(TreeError::Full { capacity });
        }
        let low = self.low_leaf(value)?;
        let old_root = self.root();

        let updated = IndexedLeaf {
            value: low.leaf.value,
            next_value: value,
            next_index: new_index,
        };
        let appended = IndexedLeaf {
            value,
            next_value: low.leaf.next_value,
            next_index: low.leaf.next_index,
        };

        let intermediate_root = NullifierRoot::from(self.inner.set_leaf(low.index, updated.hash()));
        let new_path = self.inner.path(new_index);
        let new_root = NullifierRoot::from(self.inner.set_leaf(new_index, appended.hash()));

        if let Some(slot) = usize::try_from(low.index)
            .ok()
            .and_then(|index| self.leaves.get_mut(index))
        {
            *slot = updated;
        }
        self.leaves.push(appended);
        self.by_value.insert(value, new_index);

        tracing::debug!(
            index = new_index,
            low_index = low.index,
            "nullifier inserted"
        );
        Ok(InsertionWitness {
            value,
            old_root,
            low,
            intermediate_root,
            new_index,
            new_path,
            new_root,
        })
    }

    /// Inserts a batch of nullifiers as a chain of insertions.
    ///
    /// The whole batch is rejected, and the tree left untouched, if it is
    /// larger than `max_batch`, repeats a value, contains an already
    /// inserted value, or does not fit in the remaining slots. The final
    /// root equals that of inserting the values one at a time.
    pub fn batch_insert(
        &mut self,
        values: &[Nullifier],
        max_batch: usize,
    ) -> Result<Vec<InsertionWitness>, TreeError> {
        if values.len() > max_batch {
            return Err(TreeError::BatchTooLarge {
                len: values.len(),
                max: max_batch,
            });
        }

        let mut seen = BTreeSet::new();
        for &value in values {
            if self.contains(value) {
                return Err(TreeError::AlreadyPresent(value));
            }
            if !seen.insert(value) {
                return Err(TreeError::DuplicateInBatch(value));
            }
        }

        let capacity = self.inner.capacity();
        let remaining = capacity.saturating_sub(self.next_free_index());
        if !u64::try_from(values.len()).is_ok_and(|len| len <= remaining) {
            return Err(TreeError::Full { capacity });
        }

        let witnesses = values
            .iter()
            .map(|&value| self.insert(value))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(count = witnesses.len(), "nullifier batch inserted");
        Ok(witnesses)
    }

    fn leaf(&self, index: u64) -> Result<IndexedLeaf, TreeError> {
        usize::try_from(index)
            .ok()
            .and_then(|slot| self.leaves.get(slot))
            .copied()
            .ok_or(TreeError::IndexOutOfRange {
                index,
                size: self.next_free_index(),
            })
    }
}

/// Whether `witness` proves `value` absent from the tree with `root`.
///
/// The low leaf must be a member of `root` and bracket `value`.
#[must_use]
pub fn verify_non_membership(
    root: NullifierRoot,
    value: Nullifier,
    witness: &LowLeafWitness,
) -> bool {
    witness.leaf.brackets(value)
        && witness
            .path
            .verify(root.into(), witness.leaf.hash(), witness.index)
}

/// Re-checks one insertion starting from `witness.old_root`.
///
/// Confirms the value was absent, that updating the low leaf yields the
/// intermediate root, that the new slot was empty under it, and that
/// appending the new leaf yields the new root.
#[must_use]
pub fn verify_insertion(witness: &InsertionWitness) -> bool {
    let low = &witness.low;
    verify_non_membership(witness.old_root, witness.value, low)
        && low.index != witness.new_index
        && low
            .path
            .verify(witness.intermediate_root.into(), witness.updated_low().hash(), low.index)
        && witness
            .new_path
            .verify(witness.intermediate_root.into(), Fp::ZERO, witness.new_index)
        && witness
            .new_path
            .verify(witness.new_root.into(), witness.new_leaf().hash(), witness.new_index)
}
