#![forbid(unsafe_code)]

//! **observer-watcher** – the Observable adapter contract and the Watcher
//! stage that drives it for one block window.

use async_trait::async_trait;
use observer_chain::ChainRpc;
use observer_types::{Address, CodecError, Hash32, InvalidRange, State, Window};
use tokio::sync::mpsc;

/// Opaque error surfaced by an [`Observable::play`] implementation when it
/// cannot establish its log stream (e.g. the backend RPC call failed).
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PlayError(pub String);

/// An immutable descriptor for one on-chain log source, and the only
/// component that understands its protocol's ABI — everything downstream
/// of `deserialize` sees opaque [`State`]s.
#[async_trait]
pub trait Observable: Send + Sync {
    /// Stable identifier for this Observable (e.g. `"SEPOLIA_ETH_POOL_1"`).
    fn id(&self) -> &str;
    /// The 32-byte protocol/instance scope shared by every State this
    /// Observable produces.
    fn scope(&self) -> Hash32;
    /// The chain id this Observable's address lives on.
    fn chain_id(&self) -> u64;
    /// The on-chain contract address this Observable watches.
    fn address(&self) -> Address;

    /// Drives `backend` for `window`, yielding one serialized State per
    /// matching log in on-chain order (block-asc, tx-asc, log-asc), then
    /// closing the channel. `Some(None)` sentinel items signal an
    /// iteration failure partway through the window; the channel is
    /// closed immediately after.
    async fn play(
        &self,
        backend: &dyn ChainRpc,
        window: Window,
    ) -> Result<mpsc::Receiver<Option<Vec<u8>>>, PlayError>;

    /// Decodes a payload produced by this Observable's own `play` encoder.
    fn deserialize(&self, bytes: &[u8]) -> Result<State, CodecError>;
}

/// Errors raised by [`Watcher::watch`].
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// The requested window violates `0 < lo <= hi`.
    #[error(transparent)]
    InvalidRange(#[from] InvalidRange),
    /// `Observable::play` failed to establish its log stream.
    #[error("upstream observable failed: {0}")]
    UpstreamError(#[from] PlayError),
    /// The lazy sequence yielded the nil sentinel mid-stream.
    #[error("observable signalled a decode failure mid-stream")]
    DecodeError,
    /// A yielded payload could not be decoded into a State.
    #[error("failed to decode state: {0}")]
    StateDecode(#[from] CodecError),
}

/// Drives one [`Observable`] for one block window, collecting every
/// emitted State into an ordered batch. Does not retry; retry/backoff is
/// the orchestrator's policy.
pub struct Watcher;

impl Default for Watcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Watcher {
    /// Creates a stateless Watcher.
    pub fn new() -> Self {
        Watcher
    }

    /// Validates `[lo, hi]`, drives `observable` over the resulting
    /// window, and collects every emitted State in arrival order.
    pub async fn watch(
        &self,
        observable: &dyn Observable,
        backend: &dyn ChainRpc,
        lo: u64,
        hi: u64,
    ) -> Result<Vec<State>, WatcherError> {
        let window = Window::new(lo, hi)?;
        let mut rx = observable.play(backend, window).await?;

        let mut states = Vec::new();
        while let Some(item) = rx.recv().await {
            match item {
                Some(bytes) => states.push(observable.deserialize(&bytes)?),
                None => return Err(WatcherError::DecodeError),
            }
        }
        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use observer_chain::mock::MockChainRpc;
    use observer_types::StateTransitionEvent;
    use tokio::sync::mpsc;

    struct FixtureObservable {
        scope: Hash32,
        payloads: Vec<Vec<u8>>,
        fail_mid_stream: bool,
    }

    fn sample_event(block: u64) -> observer_types::Event {
        observer_types::Event {
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

    fn sample_transition(root: u8) -> StateTransitionEvent {
        StateTransitionEvent {
            src: Address::ZERO,
            sink: Address::ZERO,
            fee_collector: Address::ZERO,
            fee: Hash32::ZERO,
            new_root: Hash32([root; 32]),
            new_size: Hash32::ZERO,
        }
    }

    #[async_trait]
    impl Observable for FixtureObservable {
        fn id(&self) -> &str {
            "fixture"
        }
        fn scope(&self) -> Hash32 {
            self.scope
        }
        fn chain_id(&self) -> u64 {
            1
        }
        fn address(&self) -> Address {
            Address::ZERO
        }

        async fn play(
            &self,
            _backend: &dyn ChainRpc,
            _window: Window,
        ) -> Result<mpsc::Receiver<Option<Vec<u8>>>, PlayError> {
            let (tx, rx) = mpsc::channel(self.payloads.len() + 1);
            for p in &self.payloads {
                tx.send(Some(p.clone())).await.expect("channel has capacity");
            }
            if self.fail_mid_stream {
                tx.send(None).await.expect("channel has capacity");
            }
            Ok(rx)
        }

        fn deserialize(&self, bytes: &[u8]) -> Result<State, CodecError> {
            State::deserialize(bytes)
        }
    }

    fn backend() -> MockChainRpc {
        MockChainRpc::new(1, 100, vec![])
    }

    #[tokio::test]
    async fn rejects_invalid_window() {
        let watcher = Watcher::new();
        let obs = FixtureObservable {
            scope: Hash32::ZERO,
            payloads: vec![],
            fail_mid_stream: false,
        };
        let err = watcher.watch(&obs, &backend(), 10, 5).await.unwrap_err();
        assert!(matches!(err, WatcherError::InvalidRange(_)));
    }

    #[tokio::test]
    async fn collects_states_in_play_order() {
        let s1 = State::new(Hash32([1; 32]), &sample_event(10), &sample_transition(1));
        let s2 = State::new(Hash32([1; 32]), &sample_event(11), &sample_transition(2));
        let obs = FixtureObservable {
            scope: Hash32([1; 32]),
            payloads: vec![s1.serialize(), s2.serialize()],
            fail_mid_stream: false,
        };
        let states = watcher_with(&obs).await.unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].hash(), Hash32([1; 32]));
        assert_eq!(states[1].hash(), Hash32([2; 32]));
    }

    #[tokio::test]
    async fn nil_sentinel_mid_stream_is_a_decode_error() {
        let s1 = State::new(Hash32([1; 32]), &sample_event(10), &sample_transition(1));
        let obs = FixtureObservable {
            scope: Hash32([1; 32]),
            payloads: vec![s1.serialize()],
            fail_mid_stream: true,
        };
        let err = watcher_with(&obs).await.unwrap_err();
        assert!(matches!(err, WatcherError::DecodeError));
    }

    async fn watcher_with(obs: &FixtureObservable) -> Result<Vec<State>, WatcherError> {
        let watcher = Watcher::new();
        watcher.watch(obs, &backend(), 1, 100).await
    }
}
