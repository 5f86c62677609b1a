//! In-memory `Store` for tests and dry runs.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::ledger::types::{InsertOutcome, LedgerEvent, Portfolio, PortfolioDelta, Position, PositionStatus};
use crate::sources::SentMessage;
use crate::storage::Store;

#[derive(Default)]
struct State {
    positions: BTreeMap<i64, Position>,
    /// pair key → id of its OPEN position
    open_index: HashMap<String, i64>,
    open_count: usize,
    next_id: i64,
    seen: HashSet<String>,
    portfolio: Portfolio,
    messages: Vec<SentMessage>,
}

/// All state lives behind one mutex, so every operation is atomic.
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                portfolio: Portfolio {
                    balance: initial_balance,
                    ..Default::default()
                },
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn is_seen(&self, pair_address: &str) -> StoreResult<bool> {
        Ok(self.state.lock().await.seen.contains(pair_address))
    }

    async fn mark_seen(&self, pair_address: &str, _chain_id: &str) -> StoreResult<()> {
        self.state.lock().await.seen.insert(pair_address.to_string());
        Ok(())
    }

    async fn open_count(&self) -> StoreResult<usize> {
        Ok(self.state.lock().await.open_count)
    }

    async fn open_positions(&self) -> StoreResult<Vec<Position>> {
        let state = self.state.lock().await;
        Ok(state
            .positions
            .values()
            .filter(|p| p.status.is_open())
            .cloned()
            .collect())
    }

    async fn all_positions(&self) -> StoreResult<Vec<Position>> {
        Ok(self.state.lock().await.positions.values().cloned().collect())
    }

    async fn insert_position(
        &self,
        position: &Position,
        delta: &PortfolioDelta,
        max_open: usize,
    ) -> StoreResult<InsertOutcome> {
        let mut state = self.state.lock().await;
        if state.open_count >= max_open {
            return Ok(InsertOutcome::CapReached);
        }
        if state.open_index.contains_key(&position.pair_key) {
            return Ok(InsertOutcome::AlreadyOpen);
        }

        let id = state.next_id;
        state.next_id += 1;

        let mut stored = position.clone();
        stored.id = id;
        stored.status = PositionStatus::Open;
        state.open_index.insert(stored.pair_key.clone(), id);
        state.positions.insert(id, stored);
        state.open_count += 1;
        state.portfolio.apply(delta);

        Ok(InsertOutcome::Inserted(id))
    }

    async fn update_current_price(&self, id: i64, price: f64) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        match state.positions.get_mut(&id) {
            Some(position) if position.status.is_open() => {
                position.current_price = price;
                Ok(())
            }
            _ => Err(StoreError::NotOpen(id)),
        }
    }

    async fn close_position(
        &self,
        id: i64,
        status: PositionStatus,
        event: &LedgerEvent,
        delta: &PortfolioDelta,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let key = match state.positions.get_mut(&id) {
            Some(position) if position.status.is_open() => {
                position.current_quantity = 0.0;
                position.cost_basis = 0.0;
                position.current_price = event.price;
                position.status = status;
                position.log.push(event.clone());
                position.pair_key.clone()
            }
            _ => return Err(StoreError::NotOpen(id)),
        };

        state.open_index.remove(&key);
        state.open_count = state.open_count.saturating_sub(1);
        state.portfolio.apply(delta);
        Ok(())
    }

    async fn portfolio(&self) -> StoreResult<Portfolio> {
        Ok(self.state.lock().await.portfolio)
    }

    async fn log_message(&self, message: &SentMessage) -> StoreResult<()> {
        self.state.lock().await.messages.push(message.clone());
        Ok(())
    }

    async fn take_message_ids(&self) -> StoreResult<Vec<SentMessage>> {
        Ok(std::mem::take(&mut self.state.lock().await.messages))
    }

    async fn reset(&self, initial_balance: f64) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.positions.clear();
        state.open_index.clear();
        state.open_count = 0;
        state.seen.clear();
        state.portfolio = Portfolio {
            balance: initial_balance,
            ..Default::default()
        };
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn position(key: &str) -> Position {
        Position {
            id: 0,
            pair_key: key.to_string(),
            symbol: key.to_uppercase(),
            chain_id: "solana".to_string(),
            entry_price: 2.0,
            current_quantity: 5.0,
            cost_basis: 10.0,
            last_tp_price: 2.0,
            current_price: 0.0,
            status: PositionStatus::Open,
            log: vec![LedgerEvent::buy(2.0, 5.0, 10.0, Utc::now())],
            entry_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_store_abstraction_swaps_in() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new(200.0));
        let outcome = store
            .insert_position(&position("a"), &PortfolioDelta::entry(10.0, 0.05), 4)
            .await
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted(1));
        assert_eq!(
            store.insert_position(&position("a"), &PortfolioDelta::default(), 4).await.unwrap(),
            InsertOutcome::AlreadyOpen
        );

        store.update_current_price(1, 2.5).await.unwrap();
        assert_eq!(store.open_positions().await.unwrap()[0].current_price, 2.5);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_never_exceed_cap() {
        let store = Arc::new(InMemoryStore::new(1000.0));
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert_position(&position(&format!("k{}", i % 6)), &PortfolioDelta::default(), 4)
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.open_count().await.unwrap(), 4);
        assert_eq!(store.open_positions().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_update_on_closed_position_fails() {
        let store = InMemoryStore::new(200.0);
        store.insert_position(&position("a"), &PortfolioDelta::default(), 4).await.unwrap();
        let event = LedgerEvent::settlement(PositionStatus::TakeProfit2x, 4.0, 5.0, 19.8, 9.8, Utc::now());
        store
            .close_position(1, PositionStatus::TakeProfit2x, &event, &PortfolioDelta::default())
            .await
            .unwrap();

        assert!(matches!(store.update_current_price(1, 5.0).await, Err(StoreError::NotOpen(1))));
        assert_eq!(store.open_count().await.unwrap(), 0);
    }
}
