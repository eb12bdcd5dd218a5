//! Canonical CBOR codec shared by every wire type.
//!
//! `ciborium` serializes a derived `struct` as a CBOR map in field
//! declaration order, which is what makes the encoding byte-stable (and
//! therefore safe to feed into [`crate::poseidon::poseidon_hash_bytes`])
//! across runs: field order is fixed by the type definition, not by a
//! runtime sort.

use serde::{de::DeserializeOwned, Serialize};

/// Errors raised while encoding or decoding a wire type.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode CBOR: {0}")]
    Encode(String),
    #[error("failed to decode CBOR: {0}")]
    Decode(String),
}

pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(out)
}

pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}
