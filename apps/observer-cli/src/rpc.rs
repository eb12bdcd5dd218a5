//! A minimal JSON-RPC-over-HTTP(S) [`ChainRpc`] implementation.
//!
//! Grounded on `internal/erpc/erpc.go`'s `ERPC` wrapper around go-ethereum's
//! `ethclient.Client`: each trait method maps to one `eth_*` JSON-RPC call.
//! Unlike the source, this adapter only speaks HTTP(S) — it is the minimal
//! "generic chain-RPC adapter" collaborator the pipeline crates describe as
//! an external dependency, not a full multi-transport client. `ws://`/`wss://`
//! endpoints are rejected at construction time; a production deployment
//! would swap in an `ethers`/`alloy`-backed client behind the same trait.

use async_trait::async_trait;
use observer_chain::{
    BlockHeader, ChainError, ChainRpc, FilterQuery, Log, Transaction, TransactionReceipt,
};
use observer_types::{Address, Hash32};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// A [`ChainRpc`] backed by a single HTTP(S) JSON-RPC endpoint.
pub struct JsonRpcBackend {
    url: String,
    client: reqwest::Client,
}

impl JsonRpcBackend {
    /// Connects to `url`, rejecting anything other than `http://`/`https://`.
    pub fn connect(url: &str) -> Result<Self, ChainError> {
        match observer_chain::ConnType::parse(url)? {
            observer_chain::ConnType::Http | observer_chain::ConnType::Https => Ok(JsonRpcBackend {
                url: url.to_string(),
                client: reqwest::Client::new(),
            }),
            _ => Err(ChainError::UnknownConnType(format!(
                "{url} (ws/wss endpoints require a streaming client, not supported by this adapter)"
            ))),
        }
    }

    async fn call(&self, method: &'static str, params: Value) -> Result<Value, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let resp: RpcResponse = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::RpcFailed {
                method,
                reason: e.to_string(),
            })?
            .json()
            .await
            .map_err(|e| ChainError::RpcFailed {
                method,
                reason: e.to_string(),
            })?;

        if let Some(err) = resp.error {
            return Err(ChainError::RpcFailed {
                method,
                reason: err.message,
            });
        }
        resp.result.ok_or_else(|| ChainError::RpcFailed {
            method,
            reason: "missing result".to_string(),
        })
    }
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    message: String,
}

fn parse_hex_u64(v: &Value, method: &'static str) -> Result<u64, ChainError> {
    let s = v.as_str().ok_or_else(|| ChainError::RpcFailed {
        method,
        reason: "expected hex string".to_string(),
    })?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| ChainError::RpcFailed {
        method,
        reason: e.to_string(),
    })
}

fn parse_hash32(v: &Value, method: &'static str) -> Result<Hash32, ChainError> {
    let s = v.as_str().ok_or_else(|| ChainError::RpcFailed {
        method,
        reason: "expected hex string".to_string(),
    })?;
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| ChainError::RpcFailed {
        method,
        reason: e.to_string(),
    })?;
    Hash32::from_slice(&bytes).ok_or_else(|| ChainError::RpcFailed {
        method,
        reason: "expected 32-byte hash".to_string(),
    })
}

fn parse_address(v: &Value, method: &'static str) -> Result<Address, ChainError> {
    let s = v.as_str().ok_or_else(|| ChainError::RpcFailed {
        method,
        reason: "expected hex string".to_string(),
    })?;
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| ChainError::RpcFailed {
        method,
        reason: e.to_string(),
    })?;
    Address::from_slice(&bytes).ok_or_else(|| ChainError::RpcFailed {
        method,
        reason: "expected 20-byte address".to_string(),
    })
}

fn parse_log(v: &Value) -> Result<Log, ChainError> {
    const M: &str = "eth_getLogs";
    let address = parse_address(v.get("address").unwrap_or(&Value::Null), M)?;
    let topics = v
        .get("topics")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(|t| parse_hash32(t, M)).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();
    let data_hex = v.get("data").and_then(Value::as_str).unwrap_or("0x");
    let data = hex::decode(data_hex.trim_start_matches("0x")).map_err(|e| ChainError::RpcFailed {
        method: M,
        reason: e.to_string(),
    })?;
    Ok(Log {
        address,
        topics,
        data,
        block_number: parse_hex_u64(v.get("blockNumber").unwrap_or(&Value::Null), M)?,
        block_hash: parse_hash32(v.get("blockHash").unwrap_or(&Value::Null), M)?,
        tx_hash: parse_hash32(v.get("transactionHash").unwrap_or(&Value::Null), M)?,
        tx_index: parse_hex_u64(v.get("transactionIndex").unwrap_or(&Value::Null), M)? as u32,
        log_index: parse_hex_u64(v.get("logIndex").unwrap_or(&Value::Null), M)? as u32,
    })
}

#[async_trait]
impl ChainRpc for JsonRpcBackend {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        let v = self.call("eth_chainId", json!([])).await?;
        parse_hex_u64(&v, "eth_chainId")
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let v = self.call("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&v, "eth_blockNumber")
    }

    async fn block_by_number(&self, number: u64) -> Result<BlockHeader, ChainError> {
        const M: &str = "eth_getBlockByNumber";
        let v = self.call(M, json!([format!("0x{number:x}"), false])).await?;
        Ok(BlockHeader {
            number,
            hash: parse_hash32(v.get("hash").unwrap_or(&Value::Null), M)?,
        })
    }

    async fn transaction_by_hash(&self, hash: Hash32) -> Result<Option<Transaction>, ChainError> {
        const M: &str = "eth_getTransactionByHash";
        let v = self.call(M, json!([format!("0x{}", hex::encode(hash.0))])).await?;
        if v.is_null() {
            return Ok(None);
        }
        let to = v
            .get("to")
            .filter(|t| !t.is_null())
            .map(|t| parse_address(t, M))
            .transpose()?;
        let input_hex = v.get("input").and_then(Value::as_str).unwrap_or("0x");
        let input = hex::decode(input_hex.trim_start_matches("0x")).map_err(|e| ChainError::RpcFailed {
            method: M,
            reason: e.to_string(),
        })?;
        Ok(Some(Transaction {
            hash,
            block_number: v
                .get("blockNumber")
                .filter(|b| !b.is_null())
                .map(|b| parse_hex_u64(b, M))
                .transpose()?,
            from: parse_address(v.get("from").unwrap_or(&Value::Null), M)?,
            to,
            input,
        }))
    }

    async fn transaction_receipt(&self, hash: Hash32) -> Result<Option<TransactionReceipt>, ChainError> {
        const M: &str = "eth_getTransactionReceipt";
        let v = self.call(M, json!([format!("0x{}", hex::encode(hash.0))])).await?;
        if v.is_null() {
            return Ok(None);
        }
        let status = v.get("status").and_then(Value::as_str).unwrap_or("0x0") == "0x1";
        let logs = v
            .get("logs")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().map(parse_log).collect::<Result<Vec<_>, _>>())
            .transpose()?
            .unwrap_or_default();
        Ok(Some(TransactionReceipt {
            tx_hash: hash,
            status,
            block_number: parse_hex_u64(v.get("blockNumber").unwrap_or(&Value::Null), M)?,
            logs,
        }))
    }

    async fn filter_logs(&self, query: &FilterQuery) -> Result<Vec<Log>, ChainError> {
        let topics: Vec<String> = query.topics.iter().map(|t| format!("0x{}", hex::encode(t.0))).collect();
        let params = json!([{
            "address": format!("0x{}", hex::encode(query.address.0)),
            "fromBlock": format!("0x{:x}", query.from_block),
            "toBlock": format!("0x{:x}", query.to_block),
            "topics": topics,
        }]);
        let v = self.call("eth_getLogs", params).await?;
        v.as_array()
            .ok_or_else(|| ChainError::RpcFailed {
                method: "eth_getLogs",
                reason: "expected array result".to_string(),
            })?
            .iter()
            .map(parse_log)
            .collect()
    }

    async fn subscribe_filter_logs(&self, _query: &FilterQuery) -> Result<mpsc::Receiver<Log>, ChainError> {
        Err(ChainError::RpcFailed {
            method: "eth_subscribe",
            reason: "log subscriptions require a websocket transport, not supported by this adapter".to_string(),
        })
    }

    async fn call_contract(
        &self,
        to: Address,
        data: &[u8],
        block_number: Option<u64>,
    ) -> Result<Vec<u8>, ChainError> {
        const M: &str = "eth_call";
        let block = block_number.map(|n| format!("0x{n:x}")).unwrap_or_else(|| "latest".to_string());
        let params = json!([{
            "to": format!("0x{}", hex::encode(to.0)),
            "data": format!("0x{}", hex::encode(data)),
        }, block]);
        let v = self.call(M, params).await?;
        let s = v.as_str().ok_or_else(|| ChainError::RpcFailed {
            method: M,
            reason: "expected hex string".to_string(),
        })?;
        hex::decode(s.trim_start_matches("0x")).map_err(|e| ChainError::RpcFailed {
            method: M,
            reason: e.to_string(),
        })
    }
}
