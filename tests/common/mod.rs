//! Shared fixtures and mock collaborators for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use pair_scout::analyzer::AnalysisResult;
use pair_scout::error::{StoreError, StoreResult};
use pair_scout::ledger::types::{InsertOutcome, LedgerEvent, Portfolio, PortfolioDelta, Position, PositionStatus};
use pair_scout::sources::{
    Command, HolderAnalytics, HolderEntry, MarketFeed, Notifier, SecurityAttributes, SecurityOracle, SentMessage,
};
use pair_scout::types::{Link, Snapshot};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use pair_scout::storage::{InMemoryStore, Store};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

/// A healthy pair created an hour ago: $100k liquidity, $1M valuation, busy 1h volume.
pub fn snapshot(pair: &str, price: f64) -> Snapshot {
    Snapshot {
        chain_id: "ethereum".to_string(),
        pair_address: pair.to_string(),
        base_token_address: format!("{}-token", pair),
        base_token_name: format!("Token {}", pair),
        base_token_symbol: pair.trim_start_matches("0x").to_uppercase(),
        quote_token_address: "0xweth".to_string(),
        quote_token_symbol: "WETH".to_string(),
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
        websites: vec![Link { kind: "Website".to_string(), url: "https://example.org".to_string() }],
        socials: vec![Link { kind: "twitter".to_string(), url: "https://x.com/example".to_string() }],
        security_data: None,
        security_flags: Vec::new(),
    }
}

/// Security data for a clean token: burned LP, renounced owner, spread-out holders.
pub fn clean_security() -> SecurityAttributes {
    SecurityAttributes {
        honeypot: Some(false),
        buy_tax: Some(0.01),
        sell_tax: Some(0.01),
        open_source: Some(true),
        owner_change_balance: Some(false),
        mintable: Some(false),
        proxy: Some(false),
        owner_address: Some(String::new()),
        owner_percent: Some(0.0),
        holder_count: Some(640),
        holders: (0..10)
            .map(|i| HolderEntry { address: format!("0xholder{}", i), percent: 0.025, is_locked: false })
            .collect(),
        lp_holders: vec![HolderEntry {
            address: "0x000000000000000000000000000000000000dead".to_string(),
            percent: 0.98,
            is_locked: false,
        }],
    }
}

pub struct FixedOracle(pub SecurityAttributes);

#[async_trait]
impl SecurityOracle for FixedOracle {
    async fn check(&self, _address: &str, _chain: &str) -> SecurityAttributes {
        self.0.clone()
    }
}

pub struct FixedAnalytics(pub Vec<Value>);

#[async_trait]
impl HolderAnalytics for FixedAnalytics {
    async fn whale_activity(&self, _address: &str, _chain: &str) -> Vec<Value> {
        self.0.clone()
    }
}

/// Feed that serves queued batches, one per `list_latest` call, and answers
/// `pairs_for` from a price table.
#[derive(Default)]
pub struct ScriptedFeed {
    batches: Mutex<VecDeque<Vec<Snapshot>>>,
    prices: Mutex<HashMap<String, f64>>,
    pub pair_requests: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedFeed {
    pub fn push_batch(&self, batch: Vec<Snapshot>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    pub fn set_price(&self, pair: &str, price: f64) {
        self.prices.lock().unwrap().insert(pair.to_string(), price);
    }
}

#[async_trait]
impl MarketFeed for ScriptedFeed {
    async fn list_latest(&self) -> Vec<Snapshot> {
        self.batches.lock().unwrap().pop_front().unwrap_or_default()
    }

    async fn pairs_for(&self, chain: &str, addresses: &[String]) -> Vec<Snapshot> {
        self.pair_requests
            .lock()
            .unwrap()
            .push((chain.to_string(), addresses.to_vec()));
        let prices = self.prices.lock().unwrap();
        addresses
            .iter()
            .filter_map(|a| prices.get(a).map(|p| snapshot(a, *p)))
            .collect()
    }
}

/// Notifier that records everything it is asked to deliver.
#[derive(Default)]
pub struct RecordingNotifier {
    next_id: AtomicI64,
    pub alerts: Mutex<Vec<String>>,
    pub texts: Mutex<Vec<String>>,
    pub retracted: Mutex<Vec<SentMessage>>,
    commands: Mutex<VecDeque<Command>>,
}

impl RecordingNotifier {
    pub fn queue_command(&self, command: Command) {
        self.commands.lock().unwrap().push_back(command);
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    fn next_message(&self) -> SentMessage {
        SentMessage {
            destination: "test-chat".to_string(),
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, result: &AnalysisResult) -> Option<SentMessage> {
        self.alerts.lock().unwrap().push(result.snapshot.pair_address.clone());
        Some(self.next_message())
    }

    async fn send_text(&self, text: &str) -> Option<SentMessage> {
        self.texts.lock().unwrap().push(text.to_string());
        Some(self.next_message())
    }

    async fn retract(&self, message: &SentMessage) {
        self.retracted.lock().unwrap().push(message.clone());
    }

    async fn poll_commands(&self, cursor: i64) -> (Vec<Command>, i64) {
        let commands: Vec<Command> = self.commands.lock().unwrap().drain(..).collect();
        let next = cursor + commands.len() as i64;
        (commands, next)
    }
}

/// In-memory store whose `open_count` can be switched to fail.
pub struct FlakyStore {
    inner: InMemoryStore,
    fail_open_count: AtomicBool,
}

impl FlakyStore {
    pub fn new(initial_balance: f64) -> Self {
        Self { inner: InMemoryStore::new(initial_balance), fail_open_count: AtomicBool::new(false) }
    }

    pub fn fail_open_count(&self, fail: bool) {
        self.fail_open_count.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn is_seen(&self, pair_address: &str) -> StoreResult<bool> {
        self.inner.is_seen(pair_address).await
    }

    async fn mark_seen(&self, pair_address: &str, chain_id: &str) -> StoreResult<()> {
        self.inner.mark_seen(pair_address, chain_id).await
    }

    async fn open_count(&self) -> StoreResult<usize> {
        if self.fail_open_count.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("open count offline".to_string()));
        }
        self.inner.open_count().await
    }

    async fn open_positions(&self) -> StoreResult<Vec<Position>> {
        self.inner.open_positions().await
    }

    async fn all_positions(&self) -> StoreResult<Vec<Position>> {
        self.inner.all_positions().await
    }

    async fn insert_position(
        &self,
        position: &Position,
        delta: &PortfolioDelta,
        max_open: usize,
    ) -> StoreResult<InsertOutcome> {
        self.inner.insert_position(position, delta, max_open).await
    }

    async fn update_current_price(&self, id: i64, price: f64) -> StoreResult<()> {
        self.inner.update_current_price(id, price).await
    }

    async fn close_position(
        &self,
        id: i64,
        status: PositionStatus,
        event: &LedgerEvent,
        delta: &PortfolioDelta,
    ) -> StoreResult<()> {
        self.inner.close_position(id, status, event, delta).await
    }

    async fn portfolio(&self) -> StoreResult<Portfolio> {
        self.inner.portfolio().await
    }

    async fn log_message(&self, message: &SentMessage) -> StoreResult<()> {
        self.inner.log_message(message).await
    }

    async fn take_message_ids(&self) -> StoreResult<Vec<SentMessage>> {
        self.inner.take_message_ids().await
    }

    async fn reset(&self, initial_balance: f64) -> StoreResult<()> {
        self.inner.reset(initial_balance).await
    }

    async fn health_check(&self) -> StoreResult<bool> {
        self.inner.health_check().await
    }
}
