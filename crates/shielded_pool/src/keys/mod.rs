//! ## Key Hierarchy
//!
//! ```mermaid
//! flowchart TB
//!     sk[SpendingKey]
//!     ask[SpendAuthorizingKey ask]
//!     nsk[NullifierSecretKey nsk]
//!     ak[SpendValidatingKey ak]
//!     pk[PublicKey pk]
//!     nk[NullifierKey nk]
//!     sk --> ask & nsk
//!     ask --> ak --> pk
//!     nsk --> nk
//! ```
//!
//! ### Private keys ([`private`])
//!
//! - `sk`: Root spending key (full authority)
//! - `ask`: Authorizes spends; proves ownership of a note's `pk`
//! - `nsk`: Nullifier secret
//!
//! ### Public keys ([`public`])
//!
//! - `ak = [ask]G`: RedPallas validating key
//!
//! ### Note keys
//!
//! - `pk = ToBase(BLAKE2b-512(ak))`: owner field of notes and deployments
//! - `nk = ToBase(BLAKE2b-512(nsk))`: nullifier derivation
//!
//! Both derivations are deterministic and one-way; neither `pk` nor `nk`
//! reveals its secret.

pub mod private;
pub mod public;

mod note;

pub use note::{NullifierKey, PublicKey};
pub use private::{NullifierSecretKey, SpendAuthority, SpendAuthorizingKey, SpendingKey};
