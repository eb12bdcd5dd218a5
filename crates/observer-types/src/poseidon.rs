//! Poseidon-based hashing primitives.
//!
//! `light-poseidon`'s circom-compatible hasher only accepts fixed-width
//! field elements (here, one `Hash32` per input). Arbitrary-length payloads
//! are absorbed by chunking them into 31-byte, big-endian, zero-padded
//! field elements and folding them two-at-a-time through the same
//! width-2 permutation the Buffer's accumulator uses to fold its running
//! root — a single primitive serves both jobs, matching the "sponge-style
//! fold" description of the accumulator.

use ark_bn254::Fr;
use light_poseidon::{Poseidon, PoseidonBytesHasher, PoseidonError as LightPoseidonError};

use crate::primitives::Hash32;

/// Errors surfaced by the Poseidon hashing primitives.
#[derive(Debug, thiserror::Error)]
pub enum PoseidonError {
    /// The underlying `light-poseidon` permutation failed (e.g. bad arity).
    #[error("poseidon permutation failed: {0}")]
    Permutation(#[from] LightPoseidonError),
}

/// Two-to-one Poseidon fold: `Poseidon(a, b)`.
pub fn poseidon2(a: &Hash32, b: &Hash32) -> Result<Hash32, PoseidonError> {
    let mut hasher = Poseidon::<Fr>::new_circom(2)?;
    let out = hasher.hash_bytes_be(&[&a.0, &b.0])?;
    Ok(Hash32(out))
}

/// Folds an arbitrary-length payload into a single 32-byte Poseidon digest.
///
/// Starts from the zero digest and absorbs the payload in 31-byte chunks,
/// right-aligned into a zero-padded 32-byte big-endian buffer so every
/// chunk value stays below the BN254 scalar field modulus.
pub fn poseidon_hash_bytes(payload: &[u8]) -> Result<Hash32, PoseidonError> {
    let mut acc = Hash32::ZERO;
    if payload.is_empty() {
        // Absorb one empty chunk so `poseidon_hash_bytes(&[])` is still a
        // well-defined, non-trivial digest rather than the zero sentinel.
        return poseidon2(&acc, &Hash32::ZERO);
    }
    for chunk in payload.chunks(31) {
        let mut buf = [0u8; 32];
        buf[32 - chunk.len()..].copy_from_slice(chunk);
        acc = poseidon2(&acc, &Hash32(buf))?;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_input() {
        let a = poseidon_hash_bytes(b"hello world").unwrap();
        let b = poseidon_hash_bytes(b"hello world").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn differs_for_different_input() {
        let a = poseidon_hash_bytes(b"hello world").unwrap();
        let b = poseidon_hash_bytes(b"hello worle").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn fold_is_order_sensitive() {
        let a = poseidon2(&Hash32::ZERO, &Hash32([1u8; 32])).unwrap();
        let b = poseidon2(&Hash32([1u8; 32]), &Hash32::ZERO).unwrap();
        assert_ne!(a, b);
    }
}
