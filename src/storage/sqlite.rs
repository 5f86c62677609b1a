//! SQLite implementation of the `Store` trait.
//!
//! Schema:
//! - `seen_pairs`: analyzed pair addresses
//! - `portfolio`: singleton row (id = 1) with balance, realized P&L and fees
//! - `positions`: one row per simulated trade; a partial unique index allows
//!   at most one OPEN row per pair key
//! - `ledger_counters`: maintained OPEN position count
//! - `message_log`: delivered messages awaiting retraction

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, Pool, Sqlite, Transaction};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::ledger::types::{InsertOutcome, LedgerEvent, Portfolio, PortfolioDelta, Position, PositionStatus};
use crate::sources::SentMessage;
use crate::storage::Store;

const OPEN_COUNTER: &str = "open_positions";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS seen_pairs (
        pair_address TEXT PRIMARY KEY,
        chain_id TEXT NOT NULL,
        seen_at INTEGER NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS portfolio (
        id INTEGER PRIMARY KEY,
        balance REAL NOT NULL,
        realized_pnl REAL NOT NULL DEFAULT 0.0,
        fees_paid REAL NOT NULL DEFAULT 0.0,
        updated_at INTEGER NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS positions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        pair_key TEXT NOT NULL,
        symbol TEXT NOT NULL,
        chain_id TEXT NOT NULL,
        entry_price REAL NOT NULL,
        current_quantity REAL NOT NULL,
        cost_basis REAL NOT NULL,
        last_tp_price REAL NOT NULL,
        current_price REAL NOT NULL DEFAULT 0.0,
        status TEXT NOT NULL,
        log TEXT NOT NULL,
        entry_time INTEGER NOT NULL
    );
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_positions_open_key
        ON positions (pair_key) WHERE status = 'OPEN';
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ledger_counters (
        name TEXT PRIMARY KEY,
        value INTEGER NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS message_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        destination TEXT NOT NULL,
        message_id INTEGER NOT NULL,
        sent_at INTEGER NOT NULL
    );
    "#,
];

/// Helper type for reading positions from SQLite
#[derive(FromRow)]
struct PositionRow {
    id: i64,
    pair_key: String,
    symbol: String,
    chain_id: String,
    entry_price: f64,
    current_quantity: f64,
    cost_basis: f64,
    last_tp_price: f64,
    current_price: f64,
    status: String,
    log: String, // JSON
    entry_time: i64,
}

impl TryFrom<PositionRow> for Position {
    type Error = StoreError;

    fn try_from(row: PositionRow) -> StoreResult<Self> {
        let status = row.status.parse::<PositionStatus>().map_err(StoreError::Corrupt)?;
        let log: Vec<LedgerEvent> = serde_json::from_str(&row.log)?;
        Ok(Position {
            id: row.id,
            pair_key: row.pair_key,
            symbol: row.symbol,
            chain_id: row.chain_id,
            entry_price: row.entry_price,
            current_quantity: row.current_quantity,
            cost_basis: row.cost_basis,
            last_tp_price: row.last_tp_price,
            current_price: row.current_price,
            status,
            log,
            entry_time: from_millis(row.entry_time)?,
        })
    }
}

#[derive(FromRow)]
struct PortfolioRow {
    balance: f64,
    realized_pnl: f64,
    fees_paid: f64,
}

#[derive(FromRow)]
struct MessageRow {
    destination: String,
    message_id: i64,
}

pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Connect to `url`, create the schema if needed and seed the portfolio
    /// with `initial_balance` when it does not exist yet.
    pub async fn connect(url: &str, initial_balance: f64) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", url, e)))?;

        let store = Self { pool };
        store.init_schema(initial_balance).await?;
        info!("SqliteStore initialized and connected to {}", url);
        Ok(store)
    }

    /// Private in-memory database. A single connection that is never recycled,
    /// since every SQLite memory connection is its own database.
    pub async fn in_memory(initial_balance: f64) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let store = Self { pool };
        store.init_schema(initial_balance).await?;
        Ok(store)
    }

    async fn init_schema(&self, initial_balance: f64) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        sqlx::query("INSERT OR IGNORE INTO portfolio (id, balance, updated_at) VALUES (1, ?, ?)")
            .bind(initial_balance)
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO ledger_counters (name, value) VALUES (?, 0)")
            .bind(OPEN_COUNTER)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn apply_delta(tx: &mut Transaction<'_, Sqlite>, delta: &PortfolioDelta) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE portfolio
            SET balance = balance + ?,
                realized_pnl = realized_pnl + ?,
                fees_paid = fees_paid + ?,
                updated_at = ?
            WHERE id = 1
            "#,
        )
        .bind(delta.balance)
        .bind(delta.realized_pnl)
        .bind(delta.fees)
        .bind(now_millis())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn adjust_open_counter(tx: &mut Transaction<'_, Sqlite>, by: i64) -> StoreResult<()> {
        sqlx::query("UPDATE ledger_counters SET value = MAX(value + ?, 0) WHERE name = ?")
            .bind(by)
            .bind(OPEN_COUNTER)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn is_seen(&self, pair_address: &str) -> StoreResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM seen_pairs WHERE pair_address = ?")
            .bind(pair_address)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn mark_seen(&self, pair_address: &str, chain_id: &str) -> StoreResult<()> {
        sqlx::query("INSERT OR IGNORE INTO seen_pairs (pair_address, chain_id, seen_at) VALUES (?, ?, ?)")
            .bind(pair_address)
            .bind(chain_id)
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn open_count(&self) -> StoreResult<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT value FROM ledger_counters WHERE name = ?")
            .bind(OPEN_COUNTER)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn open_positions(&self) -> StoreResult<Vec<Position>> {
        let rows: Vec<PositionRow> = sqlx::query_as("SELECT * FROM positions WHERE status = 'OPEN' ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Position::try_from).collect()
    }

    async fn all_positions(&self) -> StoreResult<Vec<Position>> {
        let rows: Vec<PositionRow> = sqlx::query_as("SELECT * FROM positions ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Position::try_from).collect()
    }

    async fn insert_position(
        &self,
        position: &Position,
        delta: &PortfolioDelta,
        max_open: usize,
    ) -> StoreResult<InsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let (open,): (i64,) = sqlx::query_as("SELECT value FROM ledger_counters WHERE name = ?")
            .bind(OPEN_COUNTER)
            .fetch_one(&mut *tx)
            .await?;
        if open.max(0) as usize >= max_open {
            tx.rollback().await?;
            return Ok(InsertOutcome::CapReached);
        }

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM positions WHERE pair_key = ? AND status = 'OPEN'")
                .bind(&position.pair_key)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            tx.rollback().await?;
            return Ok(InsertOutcome::AlreadyOpen);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO positions (
                pair_key, symbol, chain_id, entry_price, current_quantity, cost_basis,
                last_tp_price, current_price, status, log, entry_time
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&position.pair_key)
        .bind(&position.symbol)
        .bind(&position.chain_id)
        .bind(position.entry_price)
        .bind(position.current_quantity)
        .bind(position.cost_basis)
        .bind(position.last_tp_price)
        .bind(position.current_price)
        .bind(PositionStatus::Open.as_str())
        .bind(serde_json::to_string(&position.log)?)
        .bind(position.entry_time.timestamp_millis())
        .execute(&mut *tx)
        .await;

        let id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                tx.rollback().await?;
                return Ok(InsertOutcome::AlreadyOpen);
            }
            Err(e) => return Err(e.into()),
        };

        Self::adjust_open_counter(&mut tx, 1).await?;
        Self::apply_delta(&mut tx, delta).await?;
        tx.commit().await?;

        debug!(id, pair = %position.pair_key, "Inserted position");
        Ok(InsertOutcome::Inserted(id))
    }

    async fn update_current_price(&self, id: i64, price: f64) -> StoreResult<()> {
        let result = sqlx::query("UPDATE positions SET current_price = ? WHERE id = ? AND status = 'OPEN'")
            .bind(price)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotOpen(id));
        }
        Ok(())
    }

    async fn close_position(
        &self,
        id: i64,
        status: PositionStatus,
        event: &LedgerEvent,
        delta: &PortfolioDelta,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String,)> = sqlx::query_as("SELECT log FROM positions WHERE id = ? AND status = 'OPEN'")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some((log_json,)) = row else {
            tx.rollback().await?;
            return Err(StoreError::NotOpen(id));
        };

        let mut log: Vec<LedgerEvent> = serde_json::from_str(&log_json)?;
        log.push(event.clone());

        sqlx::query(
            r#"
            UPDATE positions
            SET current_quantity = 0, cost_basis = 0, current_price = ?, status = ?, log = ?
            WHERE id = ?
            "#,
        )
        .bind(event.price)
        .bind(status.as_str())
        .bind(serde_json::to_string(&log)?)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        Self::adjust_open_counter(&mut tx, -1).await?;
        Self::apply_delta(&mut tx, delta).await?;
        tx.commit().await?;

        debug!(id, status = %status, "Closed position");
        Ok(())
    }

    async fn portfolio(&self) -> StoreResult<Portfolio> {
        let row: PortfolioRow = sqlx::query_as("SELECT balance, realized_pnl, fees_paid FROM portfolio WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(Portfolio {
            balance: row.balance,
            realized_pnl: row.realized_pnl,
            fees_paid: row.fees_paid,
        })
    }

    async fn log_message(&self, message: &SentMessage) -> StoreResult<()> {
        sqlx::query("INSERT INTO message_log (destination, message_id, sent_at) VALUES (?, ?, ?)")
            .bind(&message.destination)
            .bind(message.message_id)
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn take_message_ids(&self) -> StoreResult<Vec<SentMessage>> {
        let mut tx = self.pool.begin().await?;
        let rows: Vec<MessageRow> = sqlx::query_as("SELECT destination, message_id FROM message_log ORDER BY id ASC")
            .fetch_all(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM message_log").execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(rows
            .into_iter()
            .map(|row| SentMessage {
                destination: row.destination,
                message_id: row.message_id,
            })
            .collect())
    }

    async fn reset(&self, initial_balance: f64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM positions").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM seen_pairs").execute(&mut *tx).await?;
        sqlx::query("UPDATE ledger_counters SET value = 0 WHERE name = ?")
            .bind(OPEN_COUNTER)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE portfolio SET balance = ?, realized_pnl = 0.0, fees_paid = 0.0, updated_at = ? WHERE id = 1",
        )
        .bind(initial_balance)
        .bind(now_millis())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!("Store reset; portfolio restored to ${:.2}", initial_balance);
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<bool> {
        let (one,): (i64,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(one == 1)
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(ms: i64) -> StoreResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("invalid timestamp {}", ms)))
}
