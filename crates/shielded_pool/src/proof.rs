//! Proof artifacts.
//!
//! An [`Artifact`] is what a prover submits: a proof and the public
//! statement it was created for. Nothing else crosses the wire; the
//! verifier flattens the statement into public inputs itself.
//!
//! ## Proving
//!
//! [`prove`] first runs the predicate on the private witness and only asks
//! the backend for a proof when every constraint holds, so an unsatisfiable
//! witness surfaces as a [`ValidityError`] naming the broken constraint
//! rather than as a proof that fails later.
//!
//! ## Verification
//!
//! 1. Flatten the statement with [`Statement::public_inputs`]
//! 2. Recompute the transcript under the circuit's [`Circuit::ID`]
//!
//! A proof made for one circuit never verifies under another, and changing
//! any single public input invalidates it.
//!
//! ## Encoding
//!
//! | Bytes          | Content |
//! | -------------- | ------- |
//! | `0..96`        | proof |
//! | `96..100`      | public input count `n`, little-endian `u32` |
//! | `100..100+32n` | public inputs, canonical `Fp` encodings |

use alloc::vec::Vec;

use ff::PrimeField as _;
use mock_proof::{PROOF_SIZE, Proof, VerificationError};
use rand::{CryptoRng, RngCore};

use crate::{
    circuit::{Circuit, Statement, ValidityError},
    error::{Classify, ErrorClass},
};

/// Errors from proving or verifying an artifact.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ProofError {
    /// The witness does not satisfy the predicate; no proof was made.
    #[error("witness does not satisfy the predicate: {0}")]
    Unsatisfied(#[from] ValidityError),

    /// The proof does not match the statement or circuit.
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

impl Classify for ProofError {
    fn class(&self) -> ErrorClass {
        match *self {
            Self::Unsatisfied(ref err) => err.class(),
            Self::Verification(_) => ErrorClass::Soundness,
        }
    }
}

/// A proof together with the statement it proves.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Artifact<S> {
    /// Backend proof.
    pub proof: Proof,
    /// Public statement.
    pub statement: S,
}

/// Checks `witness` against `circuit` for `statement` and proves it.
pub fn prove<C: Circuit>(
    circuit: &C,
    statement: C::Statement,
    witness: &C::Witness,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<Artifact<C::Statement>, ProofError> {
    circuit.check(&statement, witness)?;
    let inputs = statement.public_inputs();
    let proof = Proof::create(rng, C::ID, &inputs);
    tracing::debug!(
        circuit = %hex::encode(C::ID),
        public_inputs = inputs.len(),
        "proof created"
    );
    Ok(Artifact { proof, statement })
}

impl<S: Statement> Artifact<S> {
    /// Verifies the proof for circuit `C`.
    pub fn verify<C: Circuit<Statement = S>>(&self) -> Result<(), ProofError> {
        Ok(self
            .proof
            .verify(C::ID, &self.statement.public_inputs())?)
    }

    /// The canonical byte encoding submitted to the settlement layer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let inputs = self.statement.public_inputs();
        let count = u32::try_from(inputs.len()).unwrap_or(u32::MAX);
        let mut bytes = Vec::with_capacity(PROOF_SIZE + 4 + 32 * inputs.len());
        bytes.extend_from_slice(&<[u8; PROOF_SIZE]>::from(self.proof));
        bytes.extend_from_slice(&count.to_le_bytes());
        for input in &inputs {
            bytes.extend_from_slice(&input.to_repr());
        }
        bytes
    }
}
