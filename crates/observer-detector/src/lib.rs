#![forbid(unsafe_code)]

//! **observer-detector** – enforces the monotonic-ordering invariant of the
//! state stream and forwards each validated [`State`] into the [`Buffer`].
//!
//! Two-state machine: `Empty` (no state observed yet) and `Primed` (holding
//! the last validated state). `last_known` is mutated only by whichever
//! task owns the `Detector` — it is never shared across tasks, so no
//! interior locking is needed here (contrast [`Buffer`], which is shared).

use observer_buffer::{Buffer, BufferError};
use observer_types::{Hash32, State};

/// The accumulator root as observed by the Detector after a successful
/// absorb — identical in meaning to [`Buffer::root`].
pub type Root = Hash32;

/// Errors raised by [`Detector::absorb`].
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// `absorb` was called with an empty batch; there is nothing to seed or validate.
    #[error("batch must contain at least one state")]
    EmptyBatch,
    /// A state did not strictly succeed `last_known` within the same scope.
    #[error("state is out of order relative to the last known state")]
    OutOfOrderState,
    /// A state (or the last known state) carries no decodable event.
    #[error("state is missing its event")]
    MissingEvent,
    /// The Buffer rejected the stash.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

enum DetectorState {
    Empty,
    Primed(State),
}

/// The ordering/validation stage between the Watcher and the Buffer.
pub struct Detector {
    state: DetectorState,
    buffer: Buffer,
}

impl Detector {
    /// Creates a detector bound to `buffer`, starting in the `Empty` state.
    pub fn new(buffer: Buffer) -> Self {
        Detector {
            state: DetectorState::Empty,
            buffer,
        }
    }

    /// Validates and absorbs one batch, in arrival order, returning the
    /// last root observed from the Buffer. Any failure aborts the batch;
    /// states already stashed into the Buffer are not rolled back.
    pub async fn absorb(&mut self, batch: Vec<State>) -> Result<Root, DetectorError> {
        if batch.is_empty() {
            return Err(DetectorError::EmptyBatch);
        }

        let mut iter = batch.into_iter();
        let mut last_known = match std::mem::replace(&mut self.state, DetectorState::Empty) {
            DetectorState::Empty => iter.next().expect("batch checked non-empty above"),
            DetectorState::Primed(last) => last,
        };

        let mut root = self.buffer.root().await;
        let result = self.validate_and_stash(&mut iter, &mut last_known, &mut root).await;
        self.state = DetectorState::Primed(last_known);
        result?;
        Ok(root)
    }

    async fn validate_and_stash(
        &mut self,
        iter: &mut std::vec::IntoIter<State>,
        last_known: &mut State,
        root: &mut Root,
    ) -> Result<(), DetectorError> {
        for s in iter.by_ref() {
            if s.cmp_state(last_known) != 1 {
                return Err(DetectorError::OutOfOrderState);
            }

            let last_event = last_known.event().ok_or(DetectorError::MissingEvent)?;
            let curr_event = s.event().ok_or(DetectorError::MissingEvent)?;

            // Forward-progress direction, per the design's resolution of
            // the source's ambiguous comparison direction (see DESIGN.md).
            if curr_event.cmp(&last_event) != 1 {
                return Err(DetectorError::OutOfOrderState);
            }

            *root = self.buffer.stash(s.serialize()).await?;
            *last_known = s;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use observer_types::{Address, Event, Hash32, StateTransitionEvent};

    fn event(block: u64, tx: u32, log: u32) -> Event {
        Event {
            block_number: block,
            block_hash: Hash32::ZERO,
            tx_hash: Hash32::ZERO,
            tx_index: tx,
            log_index: log,
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

    fn state(scope: Hash32, block: u64, root: u8) -> State {
        State::new(scope, &event(block, 0, 0), &transition(root))
    }

    fn scope() -> Hash32 {
        Hash32([7; 32])
    }

    async fn new_detector() -> (Detector, Buffer) {
        let buffer = Buffer::new(Hash32::ZERO);
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        let sink_buf = buffer.clone();
        tokio::spawn(async move { sink_buf.sink(tx).await });
        (Detector::new(buffer.clone()), buffer)
    }

    #[tokio::test]
    async fn happy_path_seeds_then_stashes_two() {
        let (mut det, buffer) = new_detector().await;
        let s1 = state(scope(), 100, 1);
        let s2 = state(scope(), 101, 2);
        let s3 = state(scope(), 102, 3);

        let root = det.absorb(vec![s1, s2, s3]).await.unwrap();
        assert_eq!(buffer.count().await, 2);
        assert_eq!(root, buffer.root().await);
        assert_ne!(root, Hash32::ZERO);
    }

    #[tokio::test]
    async fn out_of_order_rejected() {
        let (mut det, buffer) = new_detector().await;
        let s1 = state(scope(), 100, 1);
        let s2 = state(scope(), 101, 2);
        let s3 = state(scope(), 102, 3);

        // Feed [S1, S3, S2]: S3 validates fine, S2 fails against S3.
        let err = det.absorb(vec![s1, s3, s2]).await.unwrap_err();
        assert!(matches!(err, DetectorError::OutOfOrderState));
        assert_eq!(buffer.count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_rejected() {
        let (mut det, buffer) = new_detector().await;
        let s1 = state(scope(), 100, 1);
        let s1_dup = state(scope(), 100, 1);

        let err = det.absorb(vec![s1, s1_dup]).await.unwrap_err();
        assert!(matches!(err, DetectorError::OutOfOrderState));
        assert_eq!(buffer.count().await, 0);
    }

    #[tokio::test]
    async fn different_scope_is_out_of_order() {
        let (mut det, buffer) = new_detector().await;
        let s1 = state(scope(), 100, 1);
        let s2 = state(Hash32([9; 32]), 101, 2);

        let err = det.absorb(vec![s1, s2]).await.unwrap_err();
        assert!(matches!(err, DetectorError::OutOfOrderState));
        assert_eq!(buffer.count().await, 0);
    }

    #[tokio::test]
    async fn absorb_across_two_batches_chains_last_known() {
        let (mut det, buffer) = new_detector().await;
        let s1 = state(scope(), 100, 1);
        let s2 = state(scope(), 101, 2);
        det.absorb(vec![s1]).await.unwrap();
        assert_eq!(buffer.count().await, 0);

        let root = det.absorb(vec![s2]).await.unwrap();
        assert_eq!(buffer.count().await, 1);
        assert_eq!(root, buffer.root().await);
    }
}
