#![forbid(unsafe_code)]

//! **observer-categorizer** – the Categorizer contract the core pipeline
//! calls after every successful [`observer_recorder::Recorder::record`],
//! plus a Chainalysis KYT client implementing it.
//!
//! Only [`Categorizer::register`] and [`Categorizer::categorize`] are
//! exercised by the core pipeline; the richer transfer/exposure/alert
//! query surface on [`chainalysis::ChainalysisCategorizer`] is supplemental,
//! grounded in the source's `internal/category/feature/extractors/plugins/chainalysis`
//! package, and kept behind the same trait so the core crate never
//! depends on `reqwest` directly.

use async_trait::async_trait;
use observer_types::Record;

/// Errors raised by a [`Categorizer`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum CategorizerError {
    /// The record could not be decoded before categorization.
    #[error("failed to decode record: {0}")]
    Decode(#[from] observer_types::RecordError),
    /// The upstream KYT provider request failed.
    #[error("categorizer request failed: {0}")]
    Upstream(String),
}

/// The outcome of categorizing one [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryResult {
    /// Whether the record's counterparties fall under a blocked category.
    pub blocked: bool,
    /// The dominant exposure category id, if any was found.
    pub category_id: Option<i32>,
    /// The human-readable category name, if any was found.
    pub category_name: Option<String>,
}

/// Consumed by the Orchestrator after every successful Record; scores one
/// delta for risk exposure.
#[async_trait]
pub trait Categorizer: Send + Sync {
    /// Registers the delta described by `record_bytes` with the upstream
    /// KYT provider, returning an opaque reference id for later queries.
    async fn register(&self, record_bytes: &[u8]) -> Result<String, CategorizerError>;

    /// Registers and scores `record_bytes` in one call, combining
    /// [`Categorizer::register`] with an exposure lookup.
    async fn categorize(&self, record_bytes: &[u8]) -> Result<CategoryResult, CategorizerError>;
}

pub mod chainalysis {
    //! A [`Categorizer`] backed by the Chainalysis KYT v2 API.

    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::HashSet;

    const API_V2_ENDPOINT: &str = "https://api.chainalysis.com/api/kyt/v2/";

    /// Category ids the source treats as automatically block-worthy.
    const BLOCKED_CATEGORIES: &[i32] = &[
        1,  // child abuse material
        2,  // darknet market
        3,  // sanctioned entity
        6,  // stolen funds
        12, // ransomware
        13, // mixing
        18, // scam
        23, // terrorism
        28, // fraud shop
        29, // illicit actor org
        35, // malware
        36, // online pharmacy
        39, // seized funds
        42, // stolen bitcoins
        43, // stolen ether
        16, // gambling
        4,  // high risk exchange
        25, // sanctioned jurisdiction
        33, // protocol privacy
        26, // lending contract
        19, // p2p exchange
    ];

    fn is_blocked(category_id: i32) -> bool {
        let set: HashSet<i32> = BLOCKED_CATEGORIES.iter().copied().collect();
        set.contains(&category_id)
    }

    /// The direction of a registered transfer, relative to the monitored address.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Direction {
        Sent,
        Received,
    }

    /// Request body for `POST users/{userId}/transfers`.
    #[derive(Debug, Clone, Serialize)]
    pub struct TransferRegisterReq {
        pub network: String,
        pub asset: String,
        #[serde(rename = "transferReference")]
        pub transfer_reference: String,
        pub direction: Direction,
    }

    /// Response body for the register/summary endpoints.
    #[derive(Debug, Clone, Deserialize)]
    pub struct TransferRegisterResp {
        #[serde(rename = "externalId")]
        pub external_id: String,
        #[serde(rename = "updatedAt")]
        pub updated_at: Option<String>,
    }

    impl TransferRegisterResp {
        /// The source's `KYTFinishedProcessing`: the provider has a verdict.
        pub fn finished_processing(&self) -> bool {
            self.updated_at.is_some()
        }
    }

    /// One exposure category returned by `GET transfers/{id}/exposures`.
    #[derive(Debug, Clone, Deserialize)]
    pub struct Exposure {
        pub name: String,
        pub category: String,
        #[serde(rename = "categoryId")]
        pub category_id: i32,
    }

    /// One alert returned by `GET transfers/{id}/alerts`.
    #[derive(Debug, Clone, Deserialize)]
    pub struct Alert {
        #[serde(rename = "alertLevel")]
        pub alert_level: String,
        pub service: String,
        #[serde(rename = "externalId")]
        pub external_id: String,
        #[serde(rename = "categoryId")]
        pub category_id: i32,
    }

    fn transfer_path(external_id: &str, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("transfers/{external_id}")
        } else {
            format!("transfers/{external_id}/{suffix}")
        }
    }

    /// HTTP client for the Chainalysis KYT v2 API, keyed by `CHAINALYSIS_API_KEY`.
    pub struct ChainalysisCategorizer {
        api_key: String,
        client: reqwest::Client,
    }

    impl ChainalysisCategorizer {
        /// Builds a client from an explicit API key.
        pub fn new(api_key: impl Into<String>) -> Self {
            ChainalysisCategorizer {
                api_key: api_key.into(),
                client: reqwest::Client::new(),
            }
        }

        /// Builds a client from the `CHAINALYSIS_API_KEY` environment variable.
        pub fn from_env() -> Result<Self, CategorizerError> {
            let api_key = std::env::var("CHAINALYSIS_API_KEY")
                .map_err(|_| CategorizerError::Upstream("CHAINALYSIS_API_KEY not set".into()))?;
            Ok(Self::new(api_key))
        }

        fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
            self.client
                .request(method, format!("{API_V2_ENDPOINT}{path}"))
                .header("Content-Type", "application/json")
                .header("Accept", "application/json")
                .header("Token", &self.api_key)
        }

        /// `POST users/{user_id}/transfers`.
        pub async fn register_transfer(
            &self,
            user_id: &str,
            body: &TransferRegisterReq,
        ) -> Result<TransferRegisterResp, CategorizerError> {
            self.request(reqwest::Method::POST, &format!("users/{user_id}/transfers"))
                .json(body)
                .send()
                .await
                .map_err(|e| CategorizerError::Upstream(e.to_string()))?
                .json()
                .await
                .map_err(|e| CategorizerError::Upstream(e.to_string()))
        }

        /// `GET transfers/{id}`.
        pub async fn get_transfer_summary(&self, external_id: &str) -> Result<TransferRegisterResp, CategorizerError> {
            self.request(reqwest::Method::GET, &transfer_path(external_id, ""))
                .send()
                .await
                .map_err(|e| CategorizerError::Upstream(e.to_string()))?
                .json()
                .await
                .map_err(|e| CategorizerError::Upstream(e.to_string()))
        }

        /// `GET transfers/{id}/exposures`, returning the "direct" entry.
        pub async fn get_direct_exposure(&self, external_id: &str) -> Result<Option<Exposure>, CategorizerError> {
            let out: std::collections::HashMap<String, Exposure> = self
                .request(reqwest::Method::GET, &transfer_path(external_id, "exposures"))
                .send()
                .await
                .map_err(|e| CategorizerError::Upstream(e.to_string()))?
                .json()
                .await
                .map_err(|e| CategorizerError::Upstream(e.to_string()))?;
            Ok(out.into_iter().find(|(k, _)| k == "direct").map(|(_, v)| v))
        }

        /// `GET transfers/{id}/alerts`.
        pub async fn get_alerts(&self, external_id: &str) -> Result<Vec<Alert>, CategorizerError> {
            let mut out: std::collections::HashMap<String, Vec<Alert>> = self
                .request(reqwest::Method::GET, &transfer_path(external_id, "alerts"))
                .send()
                .await
                .map_err(|e| CategorizerError::Upstream(e.to_string()))?
                .json()
                .await
                .map_err(|e| CategorizerError::Upstream(e.to_string()))?;
            Ok(out.remove("alerts").unwrap_or_default())
        }
    }

    #[async_trait]
    impl Categorizer for ChainalysisCategorizer {
        async fn register(&self, record_bytes: &[u8]) -> Result<String, CategorizerError> {
            let record = Record::deserialize(record_bytes)?;
            let self_hash = record.self_hash().map_err(|e| CategorizerError::Upstream(e.to_string()))?;
            let transfer_reference = format!("{self_hash}");

            let req = TransferRegisterReq {
                network: "ethereum".to_string(),
                asset: "ETH".to_string(),
                transfer_reference,
                direction: Direction::Received,
            };
            let instance_id = hex::encode(record.scope().0);
            let resp = self.register_transfer(&instance_id, &req).await?;
            tracing::info!(external_id = %resp.external_id, "registered transfer with Chainalysis");
            Ok(resp.external_id)
        }

        async fn categorize(&self, record_bytes: &[u8]) -> Result<CategoryResult, CategorizerError> {
            let external_id = self.register(record_bytes).await?;

            let exposure = self.get_direct_exposure(&external_id).await?;
            let alerts = self.get_alerts(&external_id).await?;
            for alert in &alerts {
                tracing::warn!(service = %alert.service, category_id = alert.category_id, "chainalysis alert");
            }

            let blocked = exposure.as_ref().is_some_and(|e| is_blocked(e.category_id))
                || alerts.iter().any(|a| is_blocked(a.category_id));

            Ok(CategoryResult {
                blocked,
                category_id: exposure.as_ref().map(|e| e.category_id),
                category_name: exposure.map(|e| e.name),
            })
        }
    }

}
