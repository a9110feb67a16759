//! # mock_proof
//!
//! BLAKE2b-based mock of a succinct proving backend.
//!
//! A real backend proves that a private witness satisfies a circuit for a
//! given list of public inputs. This mock only **binds** the public inputs:
//!
//! $$\text{digest} = \text{BLAKE2b-512}(\text{circuit},\;
//!   \text{nonce} \| n \| x_1 \| \cdots \| x_n)$$
//!
//! where the circuit identifier is the BLAKE2b personalization. Verifying
//! recomputes the digest, so any change to the circuit id or to a single
//! public input is detected. It is neither zero knowledge nor sound: the
//! caller is expected to have checked the witness against the predicate
//! before asking for a proof, which is exactly what the shielded pool's
//! prover does.
//!
//! ## Wire format
//!
//! | Bytes    | Content |
//! | -------- | ------- |
//! | `0..32`  | prover nonce |
//! | `32..96` | transcript digest |

#![cfg_attr(not(feature = "std"), no_std)]

use ff::PrimeField as _;
use pasta_curves::Fp;
use rand_core::{CryptoRng, RngCore};

/// Serialized proof size in bytes.
pub const PROOF_SIZE: usize = 96;

/// Maximum circuit identifier length (the BLAKE2b personalization width).
pub const CIRCUIT_ID_MAX: usize = 16;

/// Proof verification failed: the transcript does not match the claimed
/// circuit and public inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("proof transcript does not match the public inputs")]
pub struct VerificationError;

/// A mock proof: a random nonce and the transcript digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Proof {
    nonce: [u8; 32],
    digest: [u8; 64],
}

impl Proof {
    /// Creates a proof for `circuit` over `public_inputs`.
    ///
    /// `circuit` is used as the BLAKE2b personalization and must be at most
    /// [`CIRCUIT_ID_MAX`] bytes.
    pub fn create(
        rng: &mut (impl RngCore + CryptoRng),
        circuit: &[u8],
        public_inputs: &[Fp],
    ) -> Self {
        let mut nonce = [0u8; 32];
        rng.fill_bytes(&mut nonce);
        Self {
            nonce,
            digest: transcript(circuit, &nonce, public_inputs),
        }
    }

    /// Verifies this proof against `circuit` and `public_inputs`.
    pub fn verify(&self, circuit: &[u8], public_inputs: &[Fp]) -> Result<(), VerificationError> {
        if transcript(circuit, &self.nonce, public_inputs) == self.digest {
            Ok(())
        } else {
            Err(VerificationError)
        }
    }
}

fn transcript(circuit: &[u8], nonce: &[u8; 32], public_inputs: &[Fp]) -> [u8; 64] {
    let count = u64::try_from(public_inputs.len()).unwrap_or(u64::MAX);
    let mut state = blake2b_simd::Params::new()
        .hash_length(64)
        .personal(circuit)
        .to_state();
    state.update(nonce);
    state.update(&count.to_le_bytes());
    for input in public_inputs {
        state.update(&input.to_repr());
    }
    *state.finalize().as_array()
}

impl From<Proof> for [u8; PROOF_SIZE] {
    fn from(proof: Proof) -> Self {
        let mut bytes = [0u8; PROOF_SIZE];
        let (nonce, digest) = bytes.split_at_mut(32);
        nonce.copy_from_slice(&proof.nonce);
        digest.copy_from_slice(&proof.digest);
        bytes
    }
}

impl From<[u8; PROOF_SIZE]> for Proof {
    fn from(bytes: [u8; PROOF_SIZE]) -> Self {
        let mut nonce = [0u8; 32];
        let mut digest = [0u8; 64];
        let (head, tail) = bytes.split_at(32);
        nonce.copy_from_slice(head);
        digest.copy_from_slice(tail);
        Self { nonce, digest }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Proof {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let bytes: [u8; PROOF_SIZE] = (*self).into();
        serializer.serialize_bytes(&bytes)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Proof {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use core::fmt;

        use serde::de::{Error, SeqAccess, Visitor};

        struct ProofVisitor;

        impl<'de> Visitor<'de> for ProofVisitor {
            type Value = [u8; PROOF_SIZE];

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("96 proof bytes")
            }

            fn visit_bytes<E: Error>(self, value: &[u8]) -> Result<Self::Value, E> {
                <[u8; PROOF_SIZE]>::try_from(value)
                    .map_err(|_err| E::invalid_length(value.len(), &self))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut bytes = [0u8; PROOF_SIZE];
                for (idx, byte) in bytes.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| A::Error::invalid_length(idx, &self))?;
                }
                Ok(bytes)
            }
        }

        deserializer
            .deserialize_bytes(ProofVisitor)
            .map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use ff::Field as _;
    use rand::{SeedableRng as _, rngs::StdRng};

    use super::*;

    const CIRCUIT: &[u8] = b"test-circuit";

    #[test]
    fn proof_verifies_against_its_inputs() {
        let mut rng = StdRng::seed_from_u64(0);
        let inputs = [Fp::ONE, Fp::from(7u64)];
        let proof = Proof::create(&mut rng, CIRCUIT, &inputs);
        proof.verify(CIRCUIT, &inputs).unwrap();
    }

    /// Any tampered input, dropped input, or circuit swap is detected.
    #[test]
    fn tampering_is_detected() {
        let mut rng = StdRng::seed_from_u64(0);
        let inputs = [Fp::ONE, Fp::from(7u64)];
        let proof = Proof::create(&mut rng, CIRCUIT, &inputs);

        assert_eq!(
            proof.verify(CIRCUIT, &[Fp::ONE, Fp::from(8u64)]),
            Err(VerificationError)
        );
        assert_eq!(proof.verify(CIRCUIT, &[Fp::ONE]), Err(VerificationError));
        assert_eq!(proof.verify(b"other", &inputs), Err(VerificationError));
        assert_eq!(
            VerificationError.to_string(),
            "proof transcript does not match the public inputs"
        );
    }

    #[test]
    fn byte_encoding_preserves_proof() {
        let mut rng = StdRng::seed_from_u64(3);
        let inputs = [Fp::ZERO];
        let proof = Proof::create(&mut rng, CIRCUIT, &inputs);
        let bytes: [u8; PROOF_SIZE] = proof.into();
        let decoded = Proof::from(bytes);
        assert_eq!(decoded, proof);
        decoded.verify(CIRCUIT, &inputs).unwrap();
    }
}
