//! The canonical, content-addressed delta between two consecutive States.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::codec::{from_cbor, to_cbor, CodecError};
use crate::poseidon::{poseidon_hash_bytes, PoseidonError};
use crate::primitives::Hash32;

/// Errors raised while constructing or hashing a [`Record`].
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("record event must be non-empty")]
    EmptyEvent,
    #[error("pre_state_hash and post_state_hash must differ")]
    EqualHashes,
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Poseidon(#[from] PoseidonError),
}

/// The body fields that feed both the wire format and the self-hash input.
/// `self_hash` is deliberately excluded: it is the Poseidon digest of this
/// body's canonical encoding, so including it in its own preimage would be
/// circular.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct RecordBody {
    scope: Hash32,
    event: Vec<u8>,
    prestate: Hash32,
    poststate: Hash32,
}

/// A canonical delta between two consecutive States of the same scope.
#[derive(Clone, Debug)]
pub struct Record {
    body: RecordBody,
    self_hash: OnceCell<Hash32>,
}

/// The on-the-wire shape: the same four body fields plus the memoised hash,
/// under the five stable keys `{scope, hash, event, prestate, poststate}`.
#[derive(Serialize, Deserialize)]
struct RecordWire {
    scope: Hash32,
    hash: Hash32,
    event: Vec<u8>,
    prestate: Hash32,
    poststate: Hash32,
}

impl Record {
    /// Builds a record from a successor/predecessor State pair. Rejects an
    /// empty event or equal pre/post hashes, matching `Record::build`.
    pub fn build(
        scope: Hash32,
        pre_state_hash: Hash32,
        post_state_hash: Hash32,
        event_bytes: Vec<u8>,
    ) -> Result<Self, RecordError> {
        if event_bytes.is_empty() {
            return Err(RecordError::EmptyEvent);
        }
        if pre_state_hash == post_state_hash {
            return Err(RecordError::EqualHashes);
        }
        Ok(Record {
            body: RecordBody {
                scope,
                event: event_bytes,
                prestate: pre_state_hash,
                poststate: post_state_hash,
            },
            self_hash: OnceCell::new(),
        })
    }

    pub fn scope(&self) -> Hash32 {
        self.body.scope
    }

    pub fn pre_state_hash(&self) -> Hash32 {
        self.body.prestate
    }

    pub fn post_state_hash(&self) -> Hash32 {
        self.body.poststate
    }

    pub fn event_bytes(&self) -> &[u8] {
        &self.body.event
    }

    /// Poseidon hash of the canonical body encoding, computed on first
    /// access and memoised thereafter.
    pub fn self_hash(&self) -> Result<Hash32, PoseidonError> {
        if let Some(h) = self.self_hash.get() {
            return Ok(*h);
        }
        let body_bytes =
            to_cbor(&self.body).expect("RecordBody CBOR encoding is infallible");
        let hash = poseidon_hash_bytes(&body_bytes)?;
        Ok(*self.self_hash.get_or_init(|| hash))
    }

    pub fn serialize(&self) -> Result<Vec<u8>, RecordError> {
        let wire = RecordWire {
            scope: self.body.scope,
            hash: self.self_hash()?,
            event: self.body.event.clone(),
            prestate: self.body.prestate,
            poststate: self.body.poststate,
        };
        Ok(to_cbor(&wire)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, RecordError> {
        let wire: RecordWire = from_cbor(bytes)?;
        let self_hash = OnceCell::new();
        let _ = self_hash.set(wire.hash);
        Ok(Record {
            body: RecordBody {
                scope: wire.scope,
                event: wire.event,
                prestate: wire.prestate,
                poststate: wire.poststate,
            },
            self_hash,
        })
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.body == other.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_equal_hashes() {
        let err = Record::build(Hash32::ZERO, Hash32([1; 32]), Hash32([1; 32]), vec![1]);
        assert!(matches!(err, Err(RecordError::EqualHashes)));
    }

    #[test]
    fn rejects_empty_event() {
        let err = Record::build(Hash32::ZERO, Hash32([1; 32]), Hash32([2; 32]), vec![]);
        assert!(matches!(err, Err(RecordError::EmptyEvent)));
    }

    #[test]
    fn self_hash_is_memoised() {
        let r = Record::build(Hash32::ZERO, Hash32([1; 32]), Hash32([2; 32]), vec![9]).unwrap();
        let h1 = r.self_hash().unwrap();
        let h2 = r.self_hash().unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn round_trip() {
        let r = Record::build(Hash32([5; 32]), Hash32([1; 32]), Hash32([2; 32]), vec![9, 9]).unwrap();
        let bytes = r.serialize().unwrap();
        let back = Record::deserialize(&bytes).unwrap();
        assert_eq!(r, back);
        assert_eq!(r.self_hash().unwrap(), back.self_hash().unwrap());
    }

    #[test]
    fn well_formed_invariant() {
        let r = Record::build(Hash32([3; 32]), Hash32([1; 32]), Hash32([2; 32]), vec![1]).unwrap();
        assert_ne!(r.pre_state_hash(), r.post_state_hash());
        assert_eq!(r.scope(), Hash32([3; 32]));
    }
}
