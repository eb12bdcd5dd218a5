#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **observer-config** – environment-driven configuration for the
//! privacy-pool state observer, layered defaults → environment via the
//! `config` crate.

use serde::Deserialize;

/// Errors raised while loading or validating a [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The underlying `config` crate failed to build or deserialize the source.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    /// `chain_id` was zero.
    #[error("invalid chain id")]
    InvalidChainId,
    /// `erpc_wss` was empty.
    #[error("invalid erpc wss endpoint")]
    InvalidErpcWss,
    /// `erpc_https` was empty.
    #[error("invalid erpc https endpoint")]
    InvalidErpcHttps,
    /// `protocol_id` was empty.
    #[error("invalid protocol id")]
    InvalidProtocolId,
    /// `instance_id` was empty.
    #[error("invalid instance id")]
    InvalidInstanceId,
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    chain_id: u64,
    erpc_wss: String,
    erpc_https: String,
    protocol_id: String,
    instance_id: String,
}

/// Validated runtime configuration for one Observer instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The chain id this Observer instance watches (default `11155111`, Sepolia).
    pub chain_id: u64,
    /// WebSocket JSON-RPC endpoint for log subscriptions.
    pub erpc_wss: String,
    /// HTTP JSON-RPC endpoint for one-shot calls.
    pub erpc_https: String,
    /// The protocol identifier this instance reports records under.
    pub protocol_id: String,
    /// The instance identifier, distinguishing deployments of the same protocol.
    pub instance_id: String,
}

impl Config {
    /// Loads configuration from the process environment, applying the
    /// default `CHAIN_ID=11155111` (Sepolia) when unset, then validates it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let source = config::Config::builder()
            .set_default("chain_id", 11_155_111i64)?
            .add_source(config::Environment::default())
            .build()?;
        let raw: RawConfig = source.try_deserialize()?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        if raw.chain_id == 0 {
            return Err(ConfigError::InvalidChainId);
        }
        if raw.erpc_wss.is_empty() {
            return Err(ConfigError::InvalidErpcWss);
        }
        if raw.erpc_https.is_empty() {
            return Err(ConfigError::InvalidErpcHttps);
        }
        if raw.protocol_id.is_empty() {
            return Err(ConfigError::InvalidProtocolId);
        }
        if raw.instance_id.is_empty() {
            return Err(ConfigError::InvalidInstanceId);
        }
        Ok(Config {
            chain_id: raw.chain_id,
            erpc_wss: raw.erpc_wss,
            erpc_https: raw.erpc_https,
            protocol_id: raw.protocol_id,
            instance_id: raw.instance_id,
        })
    }
}
