//! Paper-trading ledger: simulated entries, stop-loss / take-profit exits and
//! portfolio accounting.
//!
//! All mutations go through one writer lock, so the position cap and the
//! one-OPEN-per-key rule hold even if several tasks drive the ledger.

pub mod types;

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::config::LedgerConfig;
use crate::storage::Store;
use crate::types::Snapshot;
use types::{
    EntryDecision, ExitNotice, InsertOutcome, LedgerEvent, Portfolio, PortfolioDelta, Position, PositionStatus,
    TradeStats,
};

/// Number of closed positions listed in the balance summary.
const SUMMARY_HISTORY: usize = 5;

/// Proceeds of liquidating a position at a given price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    pub gross_value: f64,
    pub sell_value: f64,
    pub pnl: f64,
}

/// Exit rule for `position` at `price`, if one fires. Stop-loss is checked first.
pub fn exit_signal(position: &Position, price: f64, config: &LedgerConfig) -> Option<PositionStatus> {
    if price <= position.entry_price * config.stop_loss_fraction {
        Some(PositionStatus::StopLoss50)
    } else if price >= position.last_tp_price * config.take_profit_multiple {
        Some(PositionStatus::TakeProfit2x)
    } else {
        None
    }
}

/// Full liquidation of `position` at `price`, after slippage.
pub fn settle(position: &Position, price: f64, config: &LedgerConfig) -> Settlement {
    let gross_value = position.current_quantity * price;
    let sell_value = gross_value * (1.0 - config.slippage);
    Settlement {
        gross_value,
        sell_value,
        pnl: sell_value - position.cost_basis,
    }
}

pub struct PaperTrader {
    store: Arc<dyn Store>,
    config: LedgerConfig,
    write_lock: Mutex<()>,
}

impl PaperTrader {
    pub fn new(store: Arc<dyn Store>, config: LedgerConfig) -> Self {
        Self {
            store,
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Try to open a position for `snapshot`, sized at a fraction of current cash.
    #[instrument(skip_all, fields(pair = %snapshot.pair_address, symbol = %snapshot.base_token_symbol))]
    pub async fn enter(&self, snapshot: &Snapshot) -> Result<EntryDecision> {
        let _guard = self.write_lock.lock().await;

        let price = snapshot.price_usd;
        if !price.is_finite() || price <= 0.0 {
            return Ok(EntryDecision::InvalidPrice);
        }

        let portfolio = self.store.portfolio().await.context("Failed to read portfolio")?;
        let size = portfolio.balance * self.config.position_fraction;
        let fee = self.config.flat_fee_usd;
        if size < self.config.min_position_usd || portfolio.balance < size + fee {
            warn!("Insufficient funds for trade: ${:.2}", portfolio.balance);
            return Ok(EntryDecision::InsufficientFunds { balance: portfolio.balance });
        }

        let quantity = size / price;
        let now = Utc::now();
        let mut position = Position {
            id: 0,
            pair_key: snapshot.pair_address.clone(),
            symbol: snapshot.base_token_symbol.clone(),
            chain_id: snapshot.chain_id.clone(),
            entry_price: price,
            current_quantity: quantity,
            cost_basis: size,
            last_tp_price: price,
            current_price: price,
            status: PositionStatus::Open,
            log: vec![LedgerEvent::buy(price, quantity, size, now)],
            entry_time: now,
        };

        let outcome = self
            .store
            .insert_position(&position, &PortfolioDelta::entry(size, fee), self.config.max_open_positions)
            .await
            .context("Failed to persist position")?;

        match outcome {
            InsertOutcome::Inserted(id) => {
                position.id = id;
                info!("Entered trade: {} | Size: ${:.2} | Qty: {}", position.symbol, size, quantity);
                Ok(EntryDecision::Opened(position))
            }
            InsertOutcome::AlreadyOpen => Ok(EntryDecision::AlreadyOpen),
            InsertOutcome::CapReached => {
                info!(
                    "Max open positions ({}) reached, skipping {}",
                    self.config.max_open_positions, snapshot.base_token_symbol
                );
                Ok(EntryDecision::CapReached)
            }
        }
    }

    /// Apply exit rules to every OPEN position with a fresh price in `prices`
    /// (keyed by pair address). A failure on one position is logged and does
    /// not stop the others.
    #[instrument(skip_all, fields(prices = prices.len()))]
    pub async fn update_positions(&self, prices: &HashMap<String, f64>) -> Result<Vec<ExitNotice>> {
        let _guard = self.write_lock.lock().await;

        let open = self.store.open_positions().await.context("Failed to load open positions")?;
        let mut notices = Vec::new();

        for position in open {
            let Some(&price) = prices.get(&position.pair_key) else {
                continue;
            };
            if !price.is_finite() || price < 0.0 {
                warn!(pair = %position.pair_key, "Ignoring unusable price {}", price);
                continue;
            }

            match exit_signal(&position, price, &self.config) {
                Some(reason) => match self.close(&position, price, reason).await {
                    Ok(notice) => notices.push(notice),
                    Err(e) => error!(pair = %position.pair_key, "Failed to close position: {:#}", e),
                },
                None => {
                    if let Err(e) = self.store.update_current_price(position.id, price).await {
                        error!(pair = %position.pair_key, "Failed to update price: {}", e);
                    }
                }
            }
        }

        Ok(notices)
    }

    async fn close(&self, position: &Position, price: f64, reason: PositionStatus) -> Result<ExitNotice> {
        let settlement = settle(position, price, &self.config);
        let fee = self.config.flat_fee_usd;
        let event = LedgerEvent::settlement(
            reason,
            price,
            position.current_quantity,
            settlement.sell_value,
            settlement.pnl,
            Utc::now(),
        );

        self.store
            .close_position(
                position.id,
                reason,
                &event,
                &PortfolioDelta::settlement(settlement.sell_value, settlement.pnl, fee),
            )
            .await
            .with_context(|| format!("Failed to close position {}", position.id))?;

        let balance_after = self
            .store
            .portfolio()
            .await
            .map(|p| p.balance)
            .inspect_err(|e| warn!(pair = %position.pair_key, "Balance unavailable for exit notice: {}", e))
            .unwrap_or_default();
        let open_after = self
            .store
            .open_count()
            .await
            .inspect_err(|e| warn!(pair = %position.pair_key, "Open count unavailable for exit notice: {}", e))
            .unwrap_or_default();

        info!(
            "{} triggered for {}: sold ${:.2} (PnL: ${:.2})",
            reason, position.symbol, settlement.sell_value, settlement.pnl
        );

        Ok(ExitNotice {
            symbol: position.symbol.clone(),
            reason,
            entry_price: position.entry_price,
            exit_price: price,
            cost_basis: position.cost_basis,
            gross_value: settlement.gross_value,
            sell_value: settlement.sell_value,
            pnl: settlement.pnl,
            balance_after,
            open_after,
            max_open: self.config.max_open_positions,
        })
    }

    /// Clear all positions and seen pairs; restore the configured initial balance.
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store
            .reset(self.config.initial_balance)
            .await
            .context("Failed to reset ledger")?;
        info!("Portfolio reset to ${:.2}", self.config.initial_balance);
        Ok(())
    }

    pub async fn portfolio(&self) -> Result<Portfolio> {
        Ok(self.store.portfolio().await?)
    }

    pub async fn open_count(&self) -> Result<usize> {
        Ok(self.store.open_count().await?)
    }

    /// (chain, pair address) for every OPEN position.
    pub async fn active_pairs(&self) -> Result<Vec<(String, String)>> {
        let open = self.store.open_positions().await?;
        Ok(open.into_iter().map(|p| (p.chain_id, p.pair_key)).collect())
    }

    /// Win / loss statistics over every position with realized P&L.
    pub async fn detailed_stats(&self) -> Result<TradeStats> {
        let positions = self.store.all_positions().await?;
        Ok(compute_stats(&positions))
    }

    /// HTML portfolio summary with live equity, stats, open positions and recent exits.
    pub async fn summary_text(&self) -> Result<String> {
        let portfolio = self.store.portfolio().await?;
        let positions = self.store.all_positions().await?;
        let stats = compute_stats(&positions);

        let (open, mut closed): (Vec<&Position>, Vec<&Position>) =
            positions.iter().partition(|p| p.status.is_open());
        closed.sort_by(|a, b| b.entry_time.cmp(&a.entry_time));

        let mut holdings = 0.0;
        let mut active = String::new();
        if open.is_empty() {
            active.push_str("<i>No active positions. Scanning for new pairs...</i>\n");
        }
        for position in &open {
            let price = position.mark_price();
            let value = position.current_quantity * price;
            holdings += value;
            let change_pct = (price - position.entry_price) / position.entry_price * 100.0;
            let marker = if change_pct >= 0.0 { "🟢" } else { "🔴" };
            let _ = writeln!(
                active,
                "{} <b>{}</b>\n   Entry: ${:.6} | Curr: ${:.6}\n   Value: <code>${:.2}</code> ({:+.1}%)\n",
                marker, position.symbol, position.entry_price, price, value, change_pct
            );
        }

        let equity = portfolio.balance + holdings;
        let total_profit = equity - self.config.initial_balance;

        let mut msg = String::from("📊 <b>PORTFOLIO</b>\n\n");
        let _ = writeln!(msg, "🏦 <b>Live equity</b>: <code>${:.2}</code>", equity);
        let _ = writeln!(msg, "💵 <b>Cash</b>: <code>${:.2}</code>", portfolio.balance);
        let _ = writeln!(msg, "💎 <b>Holdings</b>: <code>${:.2}</code>", holdings);
        let _ = writeln!(
            msg,
            "{} <b>Total profit</b>: <code>${:+.2}</code>",
            if total_profit >= 0.0 { "🚀" } else { "🔻" },
            total_profit
        );
        let _ = writeln!(msg, "🧾 <b>Fees paid</b>: <code>${:.2}</code>", portfolio.fees_paid);
        msg.push_str("━━━━━━━━━━━━━━━━━━━\n");
        let _ = writeln!(
            msg,
            "🏆 {} W | 💀 {} L | 🎯 {:.0}%",
            stats.wins, stats.losses, stats.win_rate
        );
        msg.push_str("━━━━━━━━━━━━━━━━━━━\n");
        let _ = writeln!(msg, "🎲 <b>ACTIVE ({}/{})</b>\n", open.len(), self.config.max_open_positions);
        msg.push_str(&active);

        if !closed.is_empty() {
            msg.push_str("📜 <b>RECENT HISTORY</b>\n");
            for position in closed.iter().take(SUMMARY_HISTORY) {
                let pnl = position.realized_pnl();
                let icon = if pnl > 0.0 { "✅" } else { "❌" };
                let _ = writeln!(msg, "{} <b>{}</b>: <code>${:+.2}</code>", icon, position.symbol, pnl);
            }
        }

        Ok(msg)
    }
}

/// Aggregate realized results. Positions without a settlement are counted in
/// `total_trades` but not as wins or losses.
pub fn compute_stats(positions: &[Position]) -> TradeStats {
    let mut stats = TradeStats {
        total_trades: positions.len(),
        ..Default::default()
    };
    let mut gross_win = 0.0;
    let mut gross_loss = 0.0;

    for position in positions.iter().filter(|p| p.has_settlement()) {
        let pnl = position.realized_pnl();
        if pnl > 0.0 {
            stats.wins += 1;
            gross_win += pnl;
        } else {
            stats.losses += 1;
            gross_loss += pnl.abs();
        }
    }

    let counted = stats.wins + stats.losses;
    if counted > 0 {
        stats.win_rate = stats.wins as f64 / counted as f64 * 100.0;
    }
    if stats.wins > 0 {
        stats.avg_win = gross_win / stats.wins as f64;
    }
    if stats.losses > 0 {
        stats.avg_loss = gross_loss / stats.losses as f64;
    }
    stats.profit_factor = if gross_loss > 0.0 {
        gross_win / gross_loss
    } else if gross_win > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };
    stats.total_pnl = gross_win - gross_loss;
    stats
}
