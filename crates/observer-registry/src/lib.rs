#![forbid(unsafe_code)]

//! **observer-registry** – the static registry of privacy-pool Observables
//! and their "Record"-event decoder.
//!
//! Built as a `Vec` of explicit instances rather than the source's three
//! parallel arrays indexed by a shared ordinal (see the REDESIGN FLAG this
//! resolves in `DESIGN.md`).

use async_trait::async_trait;
use observer_chain::{ChainRpc, FilterQuery};
use observer_types::{Address, CodecError, Event, Hash32, State, StateTransitionEvent, Window};
use observer_watcher::{Observable, PlayError};
use tokio::sync::mpsc;
use tracing::warn;

/// Errors raised while building or decoding a [`PrivacyPoolObservable`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A registry entry's scope literal did not parse as a 32-byte decimal.
    #[error("invalid scope literal: {0}")]
    InvalidScope(String),
    /// A registry entry's address literal did not parse as a 20-byte hex string.
    #[error("invalid address literal: {0}")]
    InvalidAddress(String),
}

/// One privacy-pool deployment this observer can watch.
pub struct PrivacyPoolObservable {
    id: &'static str,
    scope: Hash32,
    chain_id: u64,
    genesis_block: u64,
    address: Address,
}

/// The byte width of one ABI-packed, non-indexed `Record` event field.
const WORD: usize = 32;
/// `Record(address src, address sink, address feeCollector, uint256 fee, uint256 stateRoot, uint256 stateSize)`.
const RECORD_WORDS: usize = 6;

impl PrivacyPoolObservable {
    /// Builds one registry entry, parsing its decimal scope and hex
    /// address literals eagerly.
    pub fn new(
        id: &'static str,
        scope_decimal: &str,
        chain_id: u64,
        genesis_block: u64,
        address_hex: &str,
    ) -> Result<Self, RegistryError> {
        let scope = Hash32::from_decimal(scope_decimal)
            .ok_or_else(|| RegistryError::InvalidScope(scope_decimal.to_string()))?;
        let address = parse_address(address_hex)
            .ok_or_else(|| RegistryError::InvalidAddress(address_hex.to_string()))?;
        Ok(PrivacyPoolObservable {
            id,
            scope,
            chain_id,
            genesis_block,
            address,
        })
    }

    /// The first block this deployment could possibly have emitted a log in.
    pub fn genesis_block(&self) -> u64 {
        self.genesis_block
    }
}

fn parse_address(hex_str: &str) -> Option<Address> {
    let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let bytes = hex::decode(trimmed).ok()?;
    Address::from_slice(&bytes)
}

/// Decodes one ABI-packed `Record` event's non-indexed data into the
/// protocol's `StateTransitionEvent`.
fn decode_record_data(data: &[u8]) -> Option<StateTransitionEvent> {
    if data.len() != WORD * RECORD_WORDS {
        return None;
    }
    let word = |i: usize| &data[i * WORD..(i + 1) * WORD];
    let address_from_word = |w: &[u8]| Address::from_slice(&w[WORD - 20..]);

    Some(StateTransitionEvent {
        src: address_from_word(word(0))?,
        sink: address_from_word(word(1))?,
        fee_collector: address_from_word(word(2))?,
        fee: Hash32::from_slice(word(3))?,
        new_root: Hash32::from_slice(word(4))?,
        new_size: Hash32::from_slice(word(5))?,
    })
}

fn flatten_topics(topics: &[Hash32]) -> Vec<u8> {
    topics.iter().flat_map(|t| t.0).collect()
}

#[async_trait]
impl Observable for PrivacyPoolObservable {
    fn id(&self) -> &str {
        self.id
    }

    fn scope(&self) -> Hash32 {
        self.scope
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn play(
        &self,
        backend: &dyn ChainRpc,
        window: Window,
    ) -> Result<mpsc::Receiver<Option<Vec<u8>>>, PlayError> {
        let query = FilterQuery {
            address: self.address,
            from_block: window.lo,
            to_block: window.hi,
            topics: vec![],
        };
        let mut logs = backend
            .filter_logs(&query)
            .await
            .map_err(|e| PlayError(e.to_string()))?;
        logs.sort_by_key(|l| (l.block_number, l.tx_index, l.log_index));

        let (tx, rx) = mpsc::channel(logs.len().max(1));
        for log in logs {
            let transition = match decode_record_data(&log.data) {
                Some(t) => t,
                None => {
                    warn!(id = self.id, block = log.block_number, "failed to decode Record log, terminating stream");
                    let _ = tx.send(None).await;
                    break;
                }
            };
            let event = Event {
                block_number: log.block_number,
                block_hash: log.block_hash,
                tx_hash: log.tx_hash,
                tx_index: log.tx_index,
                log_index: log.log_index,
                log_address: log.address,
                log_topics: flatten_topics(&log.topics),
                log_data: log.data.clone(),
                calldata: Vec::new(),
            };
            let state = State::new(self.scope, &event, &transition);
            if tx.send(Some(state.serialize())).await.is_err() {
                break;
            }
        }
        Ok(rx)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<State, CodecError> {
        State::deserialize(bytes)
    }
}

/// Builds the static list of pre-baked privacy-pool Observables.
///
/// Panics only if a literal baked into this function is malformed, which
/// would indicate a typo in the registry itself, not a runtime condition.
pub fn registry() -> Vec<PrivacyPoolObservable> {
    vec![
        PrivacyPoolObservable::new(
            "SEPOLIA_ETH_POOL_1",
            "15365509683721112532018974415132282847207162026665662018590046777583916671872",
            11155111,
            6313019,
            "0x35F9acbaD838b12AA130Ef6386C14d847bdC1642",
        )
        .expect("SEPOLIA_ETH_POOL_1 registry literal is well-formed"),
        PrivacyPoolObservable::new(
            "SEPOLIA_ETH_POOL_2",
            "1594601211935923806427821481643004967624986397998197460555337643549018639657",
            11155111,
            6454920,
            "0x0C606138Aa02600c55e0d427cf4B2a7319a808fe",
        )
        .expect("SEPOLIA_ETH_POOL_2 registry literal is well-formed"),
        PrivacyPoolObservable::new(
            "GNOSIS_XDAI_POOL_1",
            "11049869816642268564454296009173568684966369147224378104485796423384633924130",
            100,
            34972988,
            "0x0C606138Aa02600c55e0d427cf4B2a7319a808fe",
        )
        .expect("GNOSIS_XDAI_POOL_1 registry literal is well-formed"),
        PrivacyPoolObservable::new(
            "GNOSIS_XDAI_POOL_2",
            "19420586229045152356890556789607410844693215030122143238126523862419003191309",
            100,
            35827812,
            "0x555eb8F3C1C2bEDa8e8eA69F8c51317470Ab8fC1",
        )
        .expect("GNOSIS_XDAI_POOL_2 registry literal is well-formed"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use observer_chain::{mock::MockChainRpc, Log};

    #[test]
    fn registry_has_four_entries_with_distinct_ids() {
        let entries = registry();
        assert_eq!(entries.len(), 4);
        let ids: Vec<&str> = entries.iter().map(|o| o.id()).collect();
        assert_eq!(
            ids,
            vec![
                "SEPOLIA_ETH_POOL_1",
                "SEPOLIA_ETH_POOL_2",
                "GNOSIS_XDAI_POOL_1",
                "GNOSIS_XDAI_POOL_2"
            ]
        );
    }

    #[test]
    fn rejects_malformed_scope_literal() {
        let err = PrivacyPoolObservable::new("x", "not-a-number", 1, 1, "0x0000000000000000000000000000000000000000").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidScope(_)));
    }

    fn record_log(address: Address, block: u64, log_index: u32) -> Log {
        let mut data = Vec::with_capacity(WORD * RECORD_WORDS);
        data.extend(std::iter::repeat(0u8).take(WORD - 20));
        data.extend([0xAA; 20]); // src
        data.extend(std::iter::repeat(0u8).take(WORD - 20));
        data.extend([0xBB; 20]); // sink
        data.extend(std::iter::repeat(0u8).take(WORD - 20));
        data.extend([0xCC; 20]); // feeCollector
        data.extend([0u8; WORD]); // fee
        data.extend([7u8; WORD]); // newRoot
        data.extend([0u8; WORD]); // newSize

        Log {
            address,
            topics: vec![],
            data,
            block_number: block,
            block_hash: Hash32::ZERO,
            tx_hash: Hash32::ZERO,
            tx_index: 0,
            log_index,
        }
    }

    #[tokio::test]
    async fn play_decodes_one_record_log_into_a_state() {
        let entries = registry();
        let obs = &entries[0];
        let logs = vec![record_log(obs.address(), obs.genesis_block() + 1, 0)];
        let backend = MockChainRpc::new(obs.chain_id(), obs.genesis_block() + 10, logs);

        let window = Window::new(obs.genesis_block(), obs.genesis_block() + 10).unwrap();
        let mut rx = obs.play(&backend, window).await.unwrap();
        let payload = rx.recv().await.unwrap().unwrap();
        let state = obs.deserialize(&payload).unwrap();
        assert_eq!(state.scope(), obs.scope());
        assert_eq!(state.hash(), Hash32([7; 32]));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn play_sends_nil_sentinel_on_undecodable_log() {
        let entries = registry();
        let obs = &entries[0];
        let mut bad_log = record_log(obs.address(), obs.genesis_block() + 1, 0);
        bad_log.data.truncate(10); // too short to decode
        let backend = MockChainRpc::new(obs.chain_id(), obs.genesis_block() + 10, vec![bad_log]);

        let window = Window::new(obs.genesis_block(), obs.genesis_block() + 10).unwrap();
        let mut rx = obs.play(&backend, window).await.unwrap();
        assert!(rx.recv().await.unwrap().is_none());
    }
}
