#![forbid(unsafe_code)]

//! **observer-chain** – the chain-RPC backend contract consumed by the
//! Watcher and Orchestrator.
//!
//! This crate only specifies the interface; it carries no concrete
//! provider client. A production binary wires an `ethers`/`alloy`-backed
//! implementation behind [`ChainRpc`] — out of scope here, matching the
//! "generic chain-RPC adapter" external collaborator.

use async_trait::async_trait;
use observer_types::{Address, Hash32};
use tokio::sync::mpsc;

/// Errors raised by a [`ChainRpc`] implementation or by [`ConnType::parse`].
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The connection URL's scheme is not one of `http/https/ws/wss`.
    #[error("unknown connection type for url: {0}")]
    UnknownConnType(String),
    /// The underlying RPC call failed.
    #[error("rpc call {method} failed: {reason}")]
    RpcFailed {
        /// The JSON-RPC method name, for log correlation.
        method: &'static str,
        /// The provider's error text.
        reason: String,
    },
}

/// The transport scheme a backend connection string resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnType {
    /// Plain HTTP JSON-RPC.
    Http,
    /// HTTP JSON-RPC over TLS.
    Https,
    /// WebSocket JSON-RPC.
    Ws,
    /// WebSocket JSON-RPC over TLS.
    Wss,
}

impl ConnType {
    /// Parses a connection string's scheme, matching `getConnType` in the
    /// source backend: substring match on `scheme://`, not a strict URL
    /// parse.
    pub fn parse(conn: &str) -> Result<Self, ChainError> {
        if conn.contains("wss://") {
            Ok(ConnType::Wss)
        } else if conn.contains("ws://") {
            Ok(ConnType::Ws)
        } else if conn.contains("https://") {
            Ok(ConnType::Https)
        } else if conn.contains("http://") {
            Ok(ConnType::Http)
        } else {
            Err(ChainError::UnknownConnType(conn.to_string()))
        }
    }
}

/// A single on-chain event log, as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<Hash32>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub block_hash: Hash32,
    pub tx_hash: Hash32,
    pub tx_index: u32,
    pub log_index: u32,
}

/// A block header, as returned by `eth_getBlockByNumber`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: Hash32,
}

/// A transaction, as returned by `eth_getTransactionByHash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub hash: Hash32,
    pub block_number: Option<u64>,
    pub from: Address,
    pub to: Option<Address>,
    pub input: Vec<u8>,
}

/// A transaction receipt, as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub tx_hash: Hash32,
    pub status: bool,
    pub block_number: u64,
    pub logs: Vec<Log>,
}

/// An `eth_getLogs`/`eth_subscribe("logs")` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterQuery {
    pub address: Address,
    pub from_block: u64,
    pub to_block: u64,
    pub topics: Vec<Hash32>,
}

/// The subset of a JSON-RPC chain backend the Observer pipeline consumes.
///
/// Mirrors the source's `Backend` interface, trimmed to the methods this
/// pipeline actually calls.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// The chain id the backend is connected to.
    async fn chain_id(&self) -> Result<u64, ChainError>;
    /// The latest block number the backend has observed.
    async fn block_number(&self) -> Result<u64, ChainError>;
    /// Fetches a block header by number.
    async fn block_by_number(&self, number: u64) -> Result<BlockHeader, ChainError>;
    /// Fetches a transaction by hash, or `None` if unknown.
    async fn transaction_by_hash(&self, hash: Hash32) -> Result<Option<Transaction>, ChainError>;
    /// Fetches a transaction's receipt, or `None` if not yet mined.
    async fn transaction_receipt(&self, hash: Hash32) -> Result<Option<TransactionReceipt>, ChainError>;
    /// Fetches all logs matching `query` within its block range.
    async fn filter_logs(&self, query: &FilterQuery) -> Result<Vec<Log>, ChainError>;
    /// Subscribes to new logs matching `query`, streamed as they arrive.
    async fn subscribe_filter_logs(&self, query: &FilterQuery) -> Result<mpsc::Receiver<Log>, ChainError>;
    /// Executes a read-only contract call at `block_number` (latest if `None`).
    async fn call_contract(
        &self,
        to: Address,
        data: &[u8],
        block_number: Option<u64>,
    ) -> Result<Vec<u8>, ChainError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    //! An in-memory [`ChainRpc`] test double backed by a canned log fixture.

    use super::*;
    use std::sync::Mutex;

    /// A [`ChainRpc`] implementation serving a fixed set of logs and a
    /// fixed chain tip, for Watcher and Orchestrator tests.
    pub struct MockChainRpc {
        chain_id: u64,
        tip: Mutex<u64>,
        logs: Vec<Log>,
    }

    impl MockChainRpc {
        /// Builds a mock backend with the given chain id, starting tip,
        /// and fixed log fixture.
        pub fn new(chain_id: u64, tip: u64, logs: Vec<Log>) -> Self {
            MockChainRpc {
                chain_id,
                tip: Mutex::new(tip),
                logs,
            }
        }

        /// Advances the mock chain tip, simulating new blocks arriving.
        pub fn advance_tip(&self, to: u64) {
            let mut guard = self.tip.lock().expect("mock tip mutex poisoned");
            *guard = to;
        }
    }

    #[async_trait]
    impl ChainRpc for MockChainRpc {
        async fn chain_id(&self) -> Result<u64, ChainError> {
            Ok(self.chain_id)
        }

        async fn block_number(&self) -> Result<u64, ChainError> {
            Ok(*self.tip.lock().expect("mock tip mutex poisoned"))
        }

        async fn block_by_number(&self, number: u64) -> Result<BlockHeader, ChainError> {
            Ok(BlockHeader {
                number,
                hash: Hash32::ZERO,
            })
        }

        async fn transaction_by_hash(&self, _hash: Hash32) -> Result<Option<Transaction>, ChainError> {
            Ok(None)
        }

        async fn transaction_receipt(&self, _hash: Hash32) -> Result<Option<TransactionReceipt>, ChainError> {
            Ok(None)
        }

        async fn filter_logs(&self, query: &FilterQuery) -> Result<Vec<Log>, ChainError> {
            Ok(self
                .logs
                .iter()
                .filter(|log| {
                    log.address == query.address
                        && log.block_number >= query.from_block
                        && log.block_number <= query.to_block
                })
                .cloned()
                .collect())
        }

        async fn subscribe_filter_logs(&self, _query: &FilterQuery) -> Result<mpsc::Receiver<Log>, ChainError> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }

        async fn call_contract(
            &self,
            _to: Address,
            _data: &[u8],
            _block_number: Option<u64>,
        ) -> Result<Vec<u8>, ChainError> {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conn_type_recognises_all_four_schemes() {
        assert_eq!(ConnType::parse("https://rpc.example/v1").unwrap(), ConnType::Https);
        assert_eq!(ConnType::parse("http://127.0.0.1:8545").unwrap(), ConnType::Http);
        assert_eq!(ConnType::parse("wss://rpc.example/ws").unwrap(), ConnType::Wss);
        assert_eq!(ConnType::parse("ws://127.0.0.1:8546").unwrap(), ConnType::Ws);
    }

    #[test]
    fn conn_type_rejects_unknown_scheme() {
        let err = ConnType::parse("ftp://rpc.example").unwrap_err();
        assert!(matches!(err, ChainError::UnknownConnType(_)));
    }

    #[tokio::test]
    async fn mock_filters_logs_by_address_and_window() {
        use mock::MockChainRpc;

        let addr = Address([1; 20]);
        let other = Address([2; 20]);
        let logs = vec![
            Log {
                address: addr,
                topics: vec![],
                data: vec![],
                block_number: 10,
                block_hash: Hash32::ZERO,
                tx_hash: Hash32::ZERO,
                tx_index: 0,
                log_index: 0,
            },
            Log {
                address: other,
                topics: vec![],
                data: vec![],
                block_number: 11,
                block_hash: Hash32::ZERO,
                tx_hash: Hash32::ZERO,
                tx_index: 0,
                log_index: 0,
            },
            Log {
                address: addr,
                topics: vec![],
                data: vec![],
                block_number: 20,
                block_hash: Hash32::ZERO,
                tx_hash: Hash32::ZERO,
                tx_index: 0,
                log_index: 0,
            },
        ];
        let backend = MockChainRpc::new(1, 100, logs);

        let matched = backend
            .filter_logs(&FilterQuery {
                address: addr,
                from_block: 0,
                to_block: 15,
                topics: vec![],
            })
            .await
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].block_number, 10);
    }
}
