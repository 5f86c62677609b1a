//! GoPlus token-security oracle.

use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::NetworkConfig;
use crate::error::SourceError;
use crate::sources::de::{f64_or_zero, null_default, opt_f64, opt_flag, opt_u64};
use crate::sources::{HolderEntry, HttpSource, SecurityAttributes, SecurityOracle};

/// Feed chain name → GoPlus chain id. Unknown chains are passed through as-is.
pub fn goplus_chain_id(chain: &str) -> String {
    let lower = chain.to_ascii_lowercase();
    let mapped = match lower.as_str() {
        "ethereum" => "1",
        "bsc" => "56",
        "arbitrum" => "42161",
        "polygon" => "137",
        "optimism" => "10",
        "avalanche" => "43114",
        "base" => "8453",
        "solana" => "solana",
        _ => return chain.to_string(),
    };
    mapped.to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEnvelope {
    #[serde(deserialize_with = "opt_f64")]
    code: Option<f64>,
    message: Option<String>,
    #[serde(deserialize_with = "null_default")]
    result: HashMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHolder {
    #[serde(deserialize_with = "null_default")]
    address: String,
    #[serde(deserialize_with = "f64_or_zero")]
    percent: f64,
    #[serde(deserialize_with = "opt_flag")]
    is_locked: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTokenSecurity {
    #[serde(deserialize_with = "opt_flag")]
    is_honeypot: Option<bool>,
    #[serde(deserialize_with = "opt_f64")]
    buy_tax: Option<f64>,
    #[serde(deserialize_with = "opt_f64")]
    sell_tax: Option<f64>,
    #[serde(deserialize_with = "opt_flag")]
    is_open_source: Option<bool>,
    #[serde(deserialize_with = "opt_flag")]
    owner_change_balance: Option<bool>,
    #[serde(deserialize_with = "opt_flag")]
    is_mintable: Option<bool>,
    #[serde(deserialize_with = "opt_flag")]
    is_proxy: Option<bool>,
    owner_address: Option<String>,
    #[serde(deserialize_with = "opt_f64")]
    owner_percent: Option<f64>,
    #[serde(deserialize_with = "opt_u64")]
    holder_count: Option<u64>,
    #[serde(deserialize_with = "null_default")]
    holders: Vec<RawHolder>,
    #[serde(deserialize_with = "null_default")]
    lp_holders: Vec<RawHolder>,
}

impl From<RawHolder> for HolderEntry {
    fn from(raw: RawHolder) -> Self {
        HolderEntry {
            address: raw.address,
            percent: raw.percent,
            is_locked: raw.is_locked.unwrap_or(false),
        }
    }
}

impl From<RawTokenSecurity> for SecurityAttributes {
    fn from(raw: RawTokenSecurity) -> Self {
        SecurityAttributes {
            honeypot: raw.is_honeypot,
            buy_tax: raw.buy_tax,
            sell_tax: raw.sell_tax,
            open_source: raw.is_open_source,
            owner_change_balance: raw.owner_change_balance,
            mintable: raw.is_mintable,
            proxy: raw.is_proxy,
            owner_address: raw.owner_address,
            owner_percent: raw.owner_percent,
            holder_count: raw.holder_count,
            holders: raw.holders.into_iter().map(HolderEntry::from).collect(),
            lp_holders: raw.lp_holders.into_iter().map(HolderEntry::from).collect(),
        }
    }
}

/// Extract the attributes for `address` from a GoPlus response body.
pub fn parse_security_response(body: Value, address: &str) -> Result<SecurityAttributes, SourceError> {
    let envelope: RawEnvelope = serde_json::from_value(body)?;
    if envelope.code != Some(1.0) {
        return Err(SourceError::MalformedResponse(format!(
            "GoPlus returned code {:?}: {}",
            envelope.code,
            envelope.message.unwrap_or_default()
        )));
    }

    let wanted = address.to_ascii_lowercase();
    let Some(entry) = envelope
        .result
        .into_iter()
        .find_map(|(key, value)| (key.to_ascii_lowercase() == wanted).then_some(value))
    else {
        return Ok(SecurityAttributes::default());
    };

    let raw: RawTokenSecurity = serde_json::from_value(entry)?;
    Ok(raw.into())
}

pub struct GoPlusOracle {
    http: Arc<HttpSource>,
    base_url: String,
    cache: Cache<(String, String), SecurityAttributes>,
}

impl GoPlusOracle {
    pub fn new(http: Arc<HttpSource>, config: &NetworkConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.security_cache_max_entries)
            .time_to_live(Duration::from_secs(config.security_cache_ttl_secs))
            .build();
        Self {
            http,
            base_url: config.goplus_base_url.trim_end_matches('/').to_string(),
            cache,
        }
    }

    async fn fetch(&self, address: &str, chain: &str) -> Result<SecurityAttributes, SourceError> {
        let url = format!("{}/token_security/{}", self.base_url, goplus_chain_id(chain));
        let request = self.http.client().get(&url).query(&[("contract_addresses", address)]);
        let body = self.http.send_json(request).await?;
        parse_security_response(body, address)
    }
}

#[async_trait]
impl SecurityOracle for GoPlusOracle {
    #[instrument(skip(self))]
    async fn check(&self, address: &str, chain: &str) -> SecurityAttributes {
        let key = (chain.to_ascii_lowercase(), address.to_ascii_lowercase());
        if let Some(cached) = self.cache.get(&key).await {
            debug!("Security cache hit");
            return cached;
        }

        match self.fetch(address, chain).await {
            Ok(attributes) => {
                if !attributes.is_empty() {
                    self.cache.insert(key, attributes.clone()).await;
                }
                attributes
            }
            Err(e) => {
                warn!("GoPlus lookup failed for {}:{}: {}", chain, address, e);
                SecurityAttributes::default()
            }
        }
    }
}
