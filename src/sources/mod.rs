//! External collaborators: market feed, security oracle, holder analytics and
//! notification sink.
//!
//! Every collaborator sits behind an async trait so the pipeline and the bot
//! loop can run against mocks. The concrete clients degrade to empty results
//! on failure; they never surface a transport error to the caller.

pub mod de;
pub mod dexscreener;
pub mod goplus;
pub mod http;
pub mod moralis;
pub mod telegram;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analyzer::types::AnalysisResult;
use crate::types::Snapshot;

pub use dexscreener::DexScreenerFeed;
pub use goplus::GoPlusOracle;
pub use http::HttpSource;
pub use moralis::MoralisAnalytics;
pub use telegram::{DisabledNotifier, TelegramNotifier};

/// Market-data feed producing normalized snapshots.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Latest listed pairs. Empty on failure.
    async fn list_latest(&self) -> Vec<Snapshot>;

    /// Current snapshots for specific pair addresses on one chain. Empty on failure.
    async fn pairs_for(&self, chain: &str, addresses: &[String]) -> Vec<Snapshot>;
}

/// Contract-risk lookup for a token address.
#[async_trait]
pub trait SecurityOracle: Send + Sync {
    /// Security attributes; `SecurityAttributes::default()` on failure.
    async fn check(&self, address: &str, chain: &str) -> SecurityAttributes;
}

/// Holder concentration / whale activity lookup.
#[async_trait]
pub trait HolderAnalytics: Send + Sync {
    /// Recent large transfers. Empty on failure or unsupported chain.
    async fn whale_activity(&self, address: &str, chain: &str) -> Vec<Value>;
}

/// Identifier of a delivered message, kept so it can be retracted later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub destination: String,
    pub message_id: i64,
}

/// Operator commands recognized by the bot loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    BalanceReport,
    Reset,
}

impl Command {
    /// Parse a chat message into a command, ignoring anything unrecognized.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        // "/balance@SomeBot" is how group chats address a specific bot
        let word = word.split('@').next().unwrap_or(word);
        match word.to_ascii_lowercase().as_str() {
            "/balance" => Some(Command::BalanceReport),
            "/reset" => Some(Command::Reset),
            _ => None,
        }
    }
}

/// Human-facing notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an analysis alert. None when delivery failed or the sink is disabled.
    async fn send(&self, result: &AnalysisResult) -> Option<SentMessage>;

    /// Deliver a plain text message.
    async fn send_text(&self, text: &str) -> Option<SentMessage>;

    /// Remove a previously delivered message. Best effort.
    async fn retract(&self, message: &SentMessage);

    /// Commands received since `cursor`, and the cursor to use next time.
    async fn poll_commands(&self, cursor: i64) -> (Vec<Command>, i64);
}

/// One holder or LP-holder entry reported by the security oracle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HolderEntry {
    pub address: String,
    /// Share of supply as a fraction (0.25 = 25%)
    pub percent: f64,
    pub is_locked: bool,
}

/// Contract-risk attributes for one token. Every field is optional: an empty
/// value means the oracle had nothing to say (or the call failed).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityAttributes {
    pub honeypot: Option<bool>,
    /// Buy tax as a fraction
    pub buy_tax: Option<f64>,
    /// Sell tax as a fraction
    pub sell_tax: Option<f64>,
    pub open_source: Option<bool>,
    /// Owner can change balances (mint / burn arbitrary amounts)
    pub owner_change_balance: Option<bool>,
    pub mintable: Option<bool>,
    pub proxy: Option<bool>,
    pub owner_address: Option<String>,
    /// Owner's share of supply as a fraction
    pub owner_percent: Option<f64>,
    pub holder_count: Option<u64>,
    #[serde(default)]
    pub holders: Vec<HolderEntry>,
    #[serde(default)]
    pub lp_holders: Vec<HolderEntry>,
}

impl SecurityAttributes {
    pub fn is_empty(&self) -> bool {
        *self == SecurityAttributes::default()
    }

    /// Sum of the ten largest reported holder shares, as a fraction.
    pub fn top10_share(&self) -> f64 {
        self.holders.iter().take(10).map(|h| h.percent).sum()
    }

    /// Whether ownership has been given up (no owner, or the zero / dead address).
    pub fn is_renounced(&self) -> Option<bool> {
        self.owner_address.as_deref().map(|owner| owner.is_empty() || is_burn_address(owner))
    }
}

/// Zero or dead address, used for burned LP tokens and renounced ownership.
pub fn is_burn_address(address: &str) -> bool {
    let lower = address.to_ascii_lowercase();
    lower.contains("0x000000000000000000000000000000000000dead")
        || lower.contains("0x0000000000000000000000000000000000000000")
}
