#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **observer-recorder** – derives a content-addressed [`Record`] for every
//! successive pair of [`State`] values belonging to the same scope.

use observer_types::{Record, RecordError, State};

/// Errors raised by [`Recorder::record`].
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// The candidate record failed construction (equal pre/post hashes, or
    /// an empty serialized event).
    #[error("record construction failed: {0}")]
    BuildFailed(#[from] RecordError),
}

/// Stateful, per-Observable delta builder.
///
/// Holds the last State seen; each call to [`Recorder::record`] pairs it
/// with the new one to produce a [`Record`], then advances.
pub struct Recorder {
    prev: Option<State>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    /// Creates an empty recorder with no prior State.
    pub fn new() -> Self {
        Recorder { prev: None }
    }

    /// Pairs `post` with the previously seen State. Returns `None` the
    /// first time it is called (there is no predecessor yet to pair
    /// against). On build failure, `prev` is left unchanged so the next
    /// call retries against the same predecessor.
    pub fn record(&mut self, post: State) -> Result<Option<Record>, RecorderError> {
        let prev = match &self.prev {
            None => {
                self.prev = Some(post);
                return Ok(None);
            }
            Some(prev) => prev.clone(),
        };

        let record = Record::build(
            post.scope(),
            prev.hash(),
            post.hash(),
            post.event_bytes().to_vec(),
        )?;
        self.prev = Some(post);
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use observer_types::{Address, Event, Hash32, StateTransitionEvent};

    fn event(block: u64) -> Event {
        Event {
            block_number: block,
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

    fn state(block: u64, root: u8) -> State {
        State::new(Hash32([1; 32]), &event(block), &transition(root))
    }

    #[test]
    fn first_state_yields_no_record() {
        let mut rec = Recorder::new();
        assert!(rec.record(state(1, 1)).unwrap().is_none());
    }

    #[test]
    fn second_state_yields_a_delta() {
        let mut rec = Recorder::new();
        rec.record(state(1, 1)).unwrap();
        let record = rec.record(state(2, 2)).unwrap().unwrap();
        assert_eq!(record.scope(), Hash32([1; 32]));
        assert_eq!(record.pre_state_hash(), Hash32([1; 32]));
        assert_eq!(record.post_state_hash(), Hash32([2; 32]));
    }

    #[test]
    fn repeated_state_fails_and_preserves_prev() {
        let mut rec = Recorder::new();
        rec.record(state(1, 1)).unwrap();
        let err = rec.record(state(1, 1)).unwrap_err();
        assert!(matches!(err, RecorderError::BuildFailed(RecordError::EqualHashes)));

        // prev was not advanced, so the next genuine transition still works.
        let record = rec.record(state(2, 2)).unwrap().unwrap();
        assert_eq!(record.pre_state_hash(), Hash32([1; 32]));
    }

    #[test]
    fn three_states_produce_two_chained_deltas() {
        let mut rec = Recorder::new();
        rec.record(state(1, 1)).unwrap();
        let r1 = rec.record(state(2, 2)).unwrap().unwrap();
        let r2 = rec.record(state(3, 3)).unwrap().unwrap();
        assert_eq!(r1.post_state_hash(), r2.pre_state_hash());
        assert_ne!(r1.self_hash().unwrap(), r2.self_hash().unwrap());
    }
}
