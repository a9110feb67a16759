//! # shielded_pool
//!
//! A confidential, multi-asset note ledger with validity proofs.
//!
//! Value lives in **notes**, each represented publicly only by a
//! [`note::Commitment`] in the commitment accumulator. Spending a note reveals
//! its [`note::Nullifier`], which is inserted into an indexed nullifier tree;
//! the tree's sorted linked-list leaves give succinct non-membership proofs,
//! and a second insertion of the same nullifier is impossible.
//!
//! - **Reward accrual**: notes snapshot a per-asset reward accumulator at
//!   creation and redeem `amount` plus the yield accrued since then.
//! - **Validity predicate**: spends N notes and creates M notes across several
//!   assets, routes every line to exactly one roster slot and enforces
//!   per-asset conservation of value.
//! - **Private mining**: a commit/reveal extension whose deployment
//!   commitments share the commitment accumulator under their own hash domain.
//!
//! ## Flow
//!
//! ```text
//!  TransactionRequest --builder--> (Statement, Witness)
//!        --proof::prove--> Artifact { proof, statement }
//!        --ledger::submit--> nullifiers buffered, commitments appended
//!        --ledger::flush--> batched indexed-tree insertion
//! ```
//!
//! The proving backend is a BLAKE2b transcript mock ([`mock_proof`]); the
//! predicates in [`circuit`] are ordinary Rust checks returning
//! [`circuit::ValidityError`], and a proof is only produced for a witness that
//! satisfies them.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![expect(clippy::pub_use, reason = "exporting items for consumers")]

extern crate alloc;

/// Declares a newtype over a canonical `Fp` element with the conversions
/// every public field-valued type in the pool shares.
macro_rules! field_element {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(into = "[u8; 32]", try_from = "[u8; 32]"))]
        $vis struct $name(pasta_curves::Fp);

        impl $name {
            /// The zero element.
            pub const ZERO: Self = Self(<pasta_curves::Fp as ff::Field>::ZERO);
        }

        impl From<pasta_curves::Fp> for $name {
            fn from(fp: pasta_curves::Fp) -> Self {
                Self(fp)
            }
        }

        impl From<$name> for pasta_curves::Fp {
            fn from(el: $name) -> Self {
                el.0
            }
        }

        impl From<$name> for [u8; 32] {
            fn from(el: $name) -> Self {
                ff::PrimeField::to_repr(&el.0)
            }
        }

        impl TryFrom<[u8; 32]> for $name {
            type Error = &'static str;

            fn try_from(bytes: [u8; 32]) -> Result<Self, Self::Error> {
                Option::from(<pasta_curves::Fp as ff::PrimeField>::from_repr(bytes))
                    .map(Self)
                    .ok_or("invalid field element")
            }
        }
    };
}

pub mod builder;
pub mod circuit;
pub mod constants;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod mining;
pub mod note;
pub mod params;
pub mod proof;
pub mod reward;
pub mod tree;
pub mod value;

mod primitives;

pub use error::ErrorClass;
pub use ledger::Ledger;
pub use note::Note;
pub use params::Params;
pub use primitives::{AssetId, CommitmentRoot, NullifierRoot};
pub use proof::Artifact;
pub use value::Value;
