//! DexScreener market feed: latest token profiles resolved to their primary pair.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::SourceError;
use crate::sources::de::{f64_or_zero, null_default, opt_f64, u64_or_zero};
use crate::sources::{HttpSource, MarketFeed};
use crate::types::{Link, Snapshot};

/// Maximum pair addresses per `/latest/dex/pairs` request.
pub const PAIRS_PER_REQUEST: usize = 30;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawProfile {
    token_address: String,
    chain_id: String,
    icon: Option<String>,
    image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPairsResponse {
    #[serde(deserialize_with = "null_default")]
    pairs: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawToken {
    #[serde(deserialize_with = "null_default")]
    address: String,
    #[serde(deserialize_with = "null_default")]
    name: String,
    #[serde(deserialize_with = "null_default")]
    symbol: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawWindows {
    #[serde(deserialize_with = "f64_or_zero")]
    h1: f64,
    #[serde(deserialize_with = "f64_or_zero")]
    h6: f64,
    #[serde(deserialize_with = "f64_or_zero")]
    h24: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLiquidity {
    #[serde(deserialize_with = "f64_or_zero")]
    usd: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTxnCount {
    #[serde(deserialize_with = "u64_or_zero")]
    buys: u64,
    #[serde(deserialize_with = "u64_or_zero")]
    sells: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTxns {
    #[serde(deserialize_with = "null_default")]
    h1: RawTxnCount,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawInfo {
    image_url: Option<String>,
    icon: Option<String>,
    #[serde(deserialize_with = "null_default")]
    websites: Vec<Link>,
    #[serde(deserialize_with = "null_default")]
    socials: Vec<Link>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPair {
    #[serde(deserialize_with = "null_default")]
    chain_id: String,
    #[serde(deserialize_with = "null_default")]
    pair_address: String,
    #[serde(deserialize_with = "null_default")]
    url: String,
    #[serde(deserialize_with = "null_default")]
    base_token: RawToken,
    #[serde(deserialize_with = "null_default")]
    quote_token: RawToken,
    #[serde(deserialize_with = "opt_f64")]
    price_usd: Option<f64>,
    #[serde(deserialize_with = "null_default")]
    liquidity: RawLiquidity,
    #[serde(deserialize_with = "f64_or_zero")]
    fdv: f64,
    pair_created_at: Option<i64>,
    #[serde(deserialize_with = "null_default")]
    volume: RawWindows,
    #[serde(deserialize_with = "null_default")]
    price_change: RawWindows,
    #[serde(deserialize_with = "null_default")]
    txns: RawTxns,
    #[serde(deserialize_with = "null_default")]
    info: RawInfo,
}

/// Convert one raw pair object into a snapshot. Returns None for records
/// without a pair or base-token address.
pub fn normalize_pair(raw: Value, icon_override: Option<String>) -> Option<Snapshot> {
    let pair: RawPair = match serde_json::from_value(raw) {
        Ok(pair) => pair,
        Err(e) => {
            debug!("Dropping malformed pair: {}", e);
            return None;
        }
    };
    if pair.pair_address.is_empty() || pair.base_token.address.is_empty() {
        return None;
    }
    let Some(price_usd) = pair.price_usd else {
        debug!(pair = %pair.pair_address, "Dropping unpriced pair");
        return None;
    };

    let created = pair
        .pair_created_at
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);
    let icon_url = icon_override.or(pair.info.icon).or(pair.info.image_url);

    Some(Snapshot {
        chain_id: if pair.chain_id.is_empty() { "unknown".to_string() } else { pair.chain_id },
        pair_address: pair.pair_address,
        base_token_address: pair.base_token.address,
        base_token_name: non_empty_or(pair.base_token.name, "Unknown"),
        base_token_symbol: non_empty_or(pair.base_token.symbol, "UNK"),
        quote_token_address: pair.quote_token.address,
        quote_token_symbol: non_empty_or(pair.quote_token.symbol, "UNK"),
        price_usd,
        liquidity_usd: pair.liquidity.usd,
        fdv: pair.fdv,
        pair_created_at: created,
        volume_h1: pair.volume.h1,
        volume_h6: pair.volume.h6,
        volume_h24: pair.volume.h24,
        price_change_h1: pair.price_change.h1,
        price_change_h6: pair.price_change.h6,
        price_change_h24: pair.price_change.h24,
        txns_h1_buys: pair.txns.h1.buys,
        txns_h1_sells: pair.txns.h1.sells,
        url: pair.url,
        icon_url,
        websites: pair.info.websites,
        socials: pair.info.socials,
        security_data: None,
        security_flags: Vec::new(),
    })
}

/// Normalize a pair listing, dropping records that cannot be priced or identified.
fn normalize_pairs(pairs: Vec<Value>) -> Vec<Snapshot> {
    pairs.into_iter().filter_map(|raw| normalize_pair(raw, None)).collect()
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

pub struct DexScreenerFeed {
    http: Arc<HttpSource>,
    base_url: String,
    concurrency: usize,
}

impl DexScreenerFeed {
    pub fn new(http: Arc<HttpSource>, base_url: impl Into<String>, concurrency: usize) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            concurrency: concurrency.max(1),
        }
    }

    async fn latest_profiles(&self) -> Result<Vec<RawProfile>, SourceError> {
        let url = format!("{}/token-profiles/latest/v1", self.base_url);
        let body = self.http.send_json(self.http.client().get(&url)).await?;
        let Value::Array(items) = body else {
            return Err(SourceError::MalformedResponse("expected a profile array".to_string()));
        };
        Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<RawProfile>(item).ok())
            .filter(|p| !p.token_address.is_empty())
            .collect())
    }

    /// Primary (first listed) pair for a token, with the profile icon merged in.
    #[instrument(skip(self, profile), fields(token = %profile.token_address, chain = %profile.chain_id))]
    async fn primary_pair(&self, profile: RawProfile) -> Option<Snapshot> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, profile.token_address);
        let response: RawPairsResponse = match self.http.send_as(self.http.client().get(&url)).await {
            Ok(response) => response,
            Err(e) => {
                debug!("Pair lookup failed: {}", e);
                return None;
            }
        };
        let first = response.pairs.into_iter().next()?;
        normalize_pair(first, profile.icon.or(profile.image_url))
    }

    async fn pairs_chunk(&self, chain: &str, chunk: &[String]) -> Vec<Snapshot> {
        let url = format!("{}/latest/dex/pairs/{}/{}", self.base_url, chain, chunk.join(","));
        match self.http.send_as::<RawPairsResponse>(self.http.client().get(&url)).await {
            Ok(response) => normalize_pairs(response.pairs),
            Err(e) => {
                warn!(chain, "Pair refresh failed: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl MarketFeed for DexScreenerFeed {
    #[instrument(skip(self))]
    async fn list_latest(&self) -> Vec<Snapshot> {
        let profiles = match self.latest_profiles().await {
            Ok(profiles) => profiles,
            Err(e) => {
                warn!("Failed to fetch latest profiles: {}", e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let profiles: Vec<RawProfile> = profiles
            .into_iter()
            .filter(|p| seen.insert(p.token_address.clone()))
            .collect();
        info!("Found {} new profiles, fetching pair details", profiles.len());

        stream::iter(profiles)
            .map(|profile| self.primary_pair(profile))
            .buffer_unordered(self.concurrency)
            .filter_map(|snapshot| async move { snapshot })
            .collect()
            .await
    }

    #[instrument(skip(self, addresses), fields(count = addresses.len()))]
    async fn pairs_for(&self, chain: &str, addresses: &[String]) -> Vec<Snapshot> {
        let chunks = addresses.chunks(PAIRS_PER_REQUEST).map(|chunk| self.pairs_chunk(chain, chunk));
        futures::future::join_all(chunks).await.into_iter().flatten().collect()
    }
}
