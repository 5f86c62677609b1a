//! Storage abstraction for the scout.
//!
//! The `Store` trait is the persistence contract the ledger and the bot loop
//! depend on. Every mutation that touches the portfolio is applied atomically
//! together with the position transition that caused it.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::ledger::types::{InsertOutcome, LedgerEvent, Portfolio, PortfolioDelta, Position, PositionStatus};
use crate::sources::SentMessage;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Whether a pair has already been analyzed this epoch.
    async fn is_seen(&self, pair_address: &str) -> StoreResult<bool>;

    /// Record a pair as analyzed. Idempotent.
    async fn mark_seen(&self, pair_address: &str, chain_id: &str) -> StoreResult<()>;

    /// Number of OPEN positions, from the maintained counter.
    async fn open_count(&self) -> StoreResult<usize>;

    /// All OPEN positions.
    async fn open_positions(&self) -> StoreResult<Vec<Position>>;

    /// Every position, open or closed, oldest first.
    async fn all_positions(&self) -> StoreResult<Vec<Position>>;

    /// Create `position` unless one is already OPEN for its key or the OPEN
    /// count has reached `max_open`. On success `delta` is applied to the
    /// portfolio in the same transaction.
    async fn insert_position(
        &self,
        position: &Position,
        delta: &PortfolioDelta,
        max_open: usize,
    ) -> StoreResult<InsertOutcome>;

    /// Record the latest observed price for an OPEN position.
    async fn update_current_price(&self, id: i64, price: f64) -> StoreResult<()>;

    /// Close an OPEN position: zero its quantity and cost basis, set `status`,
    /// append `event` to its log and apply `delta` to the portfolio, atomically.
    async fn close_position(
        &self,
        id: i64,
        status: PositionStatus,
        event: &LedgerEvent,
        delta: &PortfolioDelta,
    ) -> StoreResult<()>;

    async fn portfolio(&self) -> StoreResult<Portfolio>;

    /// Remember a delivered message so it can be retracted later.
    async fn log_message(&self, message: &SentMessage) -> StoreResult<()>;

    /// Return every logged message and clear the log.
    async fn take_message_ids(&self) -> StoreResult<Vec<SentMessage>>;

    /// Remove all positions and seen pairs and restore the portfolio to
    /// `initial_balance` with zero P&L and fees.
    async fn reset(&self, initial_balance: f64) -> StoreResult<()>;

    async fn health_check(&self) -> StoreResult<bool>;
}
