mod asset;
mod hash;
mod root;

pub use asset::AssetId;
pub(crate) use hash::{DomainHasher, merkle_node};
pub use root::{CommitmentRoot, NullifierRoot};
