//! The decoded application payload and the State unit the pipeline transports.

use serde::{Deserialize, Serialize};

use crate::codec::{from_cbor, to_cbor, CodecError};
use crate::event::Event;
use crate::primitives::{Address, Hash32};

/// The decoded privacy-pool state-transition payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransitionEvent {
    pub src: Address,
    pub sink: Address,
    pub fee_collector: Address,
    pub fee: Hash32,
    pub new_root: Hash32,
    pub new_size: Hash32,
}

impl StateTransitionEvent {
    pub fn serialize(&self) -> Vec<u8> {
        to_cbor(self).expect("StateTransitionEvent CBOR encoding is infallible")
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, CodecError> {
        from_cbor(bytes)
    }

    /// Two transitions match on input iff `(src, sink, fee_collector, fee)` agree.
    pub fn input_match(&self, other: &StateTransitionEvent) -> bool {
        self.src == other.src && self.sink == other.sink && self.fee_collector == other.fee_collector && self.fee == other.fee
    }

    /// Two transitions match on root iff `(new_root, new_size)` agree.
    pub fn root_match(&self, other: &StateTransitionEvent) -> bool {
        self.new_root == other.new_root && self.new_size == other.new_size
    }
}

/// A pairing of the raw Event and its decoded transition, tagged with the
/// Observable's scope, and the unit the pipeline transports between stages.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct State {
    scope: Hash32,
    hash: Hash32,
    event_bytes: Vec<u8>,
    transition_bytes: Vec<u8>,
}

/// Errors raised while constructing a [`State`].
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state hash must equal the transition's new_root")]
    HashMismatch,
    #[error("failed to decode embedded event: {0}")]
    Event(#[from] CodecError),
}

impl State {
    /// Builds a new State from an already-decoded transition and its raw
    /// source event, enforcing `state.hash == transition.new_root`.
    pub fn new(scope: Hash32, event: &Event, transition: &StateTransitionEvent) -> Self {
        State {
            scope,
            hash: transition.new_root,
            event_bytes: event.serialize(),
            transition_bytes: transition.serialize(),
        }
    }

    pub fn scope(&self) -> Hash32 {
        self.scope
    }

    pub fn hash(&self) -> Hash32 {
        self.hash
    }

    /// Serialized transition bytes ("inner" state detail).
    pub fn inner(&self) -> &[u8] {
        &self.transition_bytes
    }

    /// The decoded on-chain event, or `None` if the state carries no event
    /// (the Detector's `MissingEvent` failure mode).
    pub fn event(&self) -> Option<Event> {
        if self.event_bytes.is_empty() {
            return None;
        }
        Event::deserialize(&self.event_bytes).ok()
    }

    pub fn event_bytes(&self) -> &[u8] {
        &self.event_bytes
    }

    pub fn transition(&self) -> Option<StateTransitionEvent> {
        StateTransitionEvent::deserialize(&self.transition_bytes).ok()
    }

    pub fn serialize(&self) -> Vec<u8> {
        to_cbor(self).expect("State CBOR encoding is infallible")
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, CodecError> {
        from_cbor(bytes)
    }

    /// The detector's state comparator: `+1` if `other` has a different hash
    /// within the same scope (an "inequal" / new state), `0` if the hash
    /// agrees, `-1` if the scopes themselves differ (not comparable).
    ///
    /// This is *not* an ordinal comparison — it only tests hash inequality,
    /// matching `StateComparatorFunc` in the source implementation.
    pub fn cmp_state(&self, other: &State) -> i8 {
        if self.scope != other.scope {
            return -1;
        }
        if self.hash != other.hash {
            return 1;
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> Event {
        Event {
            block_number: 100,
            block_hash: Hash32::ZERO,
            tx_hash: Hash32::ZERO,
            tx_index: 0,
            log_index: 0,
            log_address: Address::ZERO,
            log_topics: vec![],
            log_data: vec![],
            calldata: vec![],
        }
    }

    fn transition(root: u8) -> StateTransitionEvent {
        StateTransitionEvent {
            src: Address::ZERO,
            sink: Address::ZERO,
            fee_collector: Address::ZERO,
            fee: Hash32::ZERO,
            new_root: Hash32([root; 32]),
            new_size: Hash32::ZERO,
        }
    }

    #[test]
    fn hash_equals_new_root() {
        let s = State::new(Hash32([1; 32]), &event(), &transition(7));
        assert_eq!(s.hash(), Hash32([7; 32]));
    }

    #[test]
    fn round_trip() {
        let s = State::new(Hash32([1; 32]), &event(), &transition(7));
        let bytes = s.serialize();
        let back = State::deserialize(&bytes).unwrap();
        assert_eq!(back.scope(), s.scope());
        assert_eq!(back.hash(), s.hash());
        assert_eq!(back.event(), s.event());
    }

    #[test]
    fn cmp_state_matches_source_semantics() {
        let a = State::new(Hash32([1; 32]), &event(), &transition(7));
        let b = State::new(Hash32([1; 32]), &event(), &transition(8));
        let c = State::new(Hash32([2; 32]), &event(), &transition(7));
        assert_eq!(a.cmp_state(&b), 1); // same scope, different hash
        assert_eq!(a.cmp_state(&a), 0); // same scope, same hash
        assert_eq!(a.cmp_state(&c), -1); // different scope
    }
}
