//! Core types and data structures for the pair-scout system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzer::types::RiskFlag;
use crate::sources::SecurityAttributes;

/// Addresses are kept as plain strings; chains mix EVM hex and base58.
pub type Address = String;

/// A web or social link attached to a pair's profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Link label ("twitter", "telegram", "Website", ...)
    #[serde(default, alias = "type", alias = "label")]
    pub kind: String,
    /// Target URL
    #[serde(default)]
    pub url: String,
}

/// One observation of a tradeable pair's market state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Chain identifier as reported by the feed ("ethereum", "solana", ...)
    pub chain_id: String,
    /// The pair (pool) address, used as the identity key
    pub pair_address: Address,
    /// The base token contract / mint address
    pub base_token_address: Address,
    pub base_token_name: String,
    pub base_token_symbol: String,
    pub quote_token_address: Address,
    pub quote_token_symbol: String,

    /// Price of the base token in USD
    pub price_usd: f64,
    /// Pool liquidity in USD
    pub liquidity_usd: f64,
    /// Fully diluted valuation in USD
    pub fdv: f64,

    /// When the pair was created
    pub pair_created_at: DateTime<Utc>,

    pub volume_h1: f64,
    pub volume_h6: f64,
    pub volume_h24: f64,
    pub price_change_h1: f64,
    pub price_change_h6: f64,
    pub price_change_h24: f64,
    pub txns_h1_buys: u64,
    pub txns_h1_sells: u64,

    /// Feed page for the pair
    pub url: String,
    pub icon_url: Option<String>,
    pub websites: Vec<Link>,
    pub socials: Vec<Link>,

    /// Security attributes written back by the risk evaluator
    #[serde(default)]
    pub security_data: Option<SecurityAttributes>,
    /// Risk flags written back by the risk evaluator
    #[serde(default)]
    pub security_flags: Vec<RiskFlag>,
}

impl Snapshot {
    /// Whether the pair advertises any website or social account.
    pub fn has_socials(&self) -> bool {
        !self.websites.is_empty() || !self.socials.is_empty()
    }

    /// First website URL, if any.
    pub fn primary_website(&self) -> Option<&str> {
        self.websites.first().map(|l| l.url.as_str()).filter(|u| !u.is_empty())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::Duration;

    /// A healthy, mid-sized pair created an hour ago.
    pub fn snapshot(pair: &str, price: f64) -> Snapshot {
        Snapshot {
            chain_id: "ethereum".to_string(),
            pair_address: pair.to_string(),
            base_token_address: format!("{}-base", pair),
            base_token_name: "Test Coin".to_string(),
            base_token_symbol: "TEST".to_string(),
            quote_token_address: "0xUSDC".to_string(),
            quote_token_symbol: "USDC".to_string(),
            price_usd: price,
            liquidity_usd: 100_000.0,
            fdv: 1_000_000.0,
            pair_created_at: Utc::now() - Duration::minutes(60),
            volume_h1: 150_000.0,
            volume_h6: 300_000.0,
            volume_h24: 500_000.0,
            price_change_h1: 12.0,
            price_change_h6: 40.0,
            price_change_h24: 80.0,
            txns_h1_buys: 300,
            txns_h1_sells: 120,
            url: format!("https://dexscreener.com/ethereum/{}", pair),
            icon_url: None,
            websites: vec![Link { kind: "Website".to_string(), url: "https://test.coin".to_string() }],
            socials: vec![Link { kind: "twitter".to_string(), url: "https://x.com/testcoin".to_string() }],
            security_data: None,
            security_flags: Vec::new(),
        }
    }
}
