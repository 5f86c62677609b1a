//! Moralis holder analytics: recent large ERC-20 transfers.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::SourceError;
use crate::sources::de::null_default;
use crate::sources::{HolderAnalytics, HttpSource};

/// Number of recent transfers requested per lookup.
const TRANSFER_LIMIT: u32 = 50;

/// Feed chain name → Moralis chain id. Solana has no ERC-20 endpoints.
pub fn moralis_chain_id(chain: &str) -> Result<String, SourceError> {
    let lower = chain.to_ascii_lowercase();
    let mapped = match lower.as_str() {
        "ethereum" => "0x1",
        "bsc" => "0x38",
        "arbitrum" => "0xa4b1",
        "polygon" => "0x89",
        "optimism" => "0xa",
        "avalanche" => "0xa86a",
        "base" => "0x2105",
        "solana" => return Err(SourceError::Unsupported(format!("chain {}", chain))),
        _ => return Ok(chain.to_string()),
    };
    Ok(mapped.to_string())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TransfersResponse {
    #[serde(deserialize_with = "null_default")]
    result: Vec<Value>,
}

pub struct MoralisAnalytics {
    http: Arc<HttpSource>,
    base_url: String,
    api_key: String,
}

impl MoralisAnalytics {
    pub fn new(http: Arc<HttpSource>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn transfers(&self, address: &str, chain: &str) -> Result<Vec<Value>, SourceError> {
        let chain_id = moralis_chain_id(chain)?;
        let url = format!("{}/erc20/{}/transfers", self.base_url, address);
        let request = self
            .http
            .client()
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .query(&[("chain", chain_id.as_str()), ("order", "DESC")])
            .query(&[("limit", TRANSFER_LIMIT)]);
        let response: TransfersResponse = self.http.send_as(request).await?;
        Ok(response.result)
    }
}

#[async_trait]
impl HolderAnalytics for MoralisAnalytics {
    #[instrument(skip(self))]
    async fn whale_activity(&self, address: &str, chain: &str) -> Vec<Value> {
        match self.transfers(address, chain).await {
            Ok(transfers) => transfers,
            Err(e) => {
                debug!("Moralis lookup skipped: {}", e);
                Vec::new()
            }
        }
    }
}
