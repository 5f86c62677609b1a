//! Paper-trading ledger records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a position. Closed states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionStatus {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "STOP_LOSS_50")]
    StopLoss50,
    #[serde(rename = "TAKE_PROFIT_2X")]
    TakeProfit2x,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Open => "OPEN",
            PositionStatus::StopLoss50 => "STOP_LOSS_50",
            PositionStatus::TakeProfit2x => "TAKE_PROFIT_2X",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, PositionStatus::Open)
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(PositionStatus::Open),
            "STOP_LOSS_50" => Ok(PositionStatus::StopLoss50),
            "TAKE_PROFIT_2X" => Ok(PositionStatus::TakeProfit2x),
            other => Err(format!("unknown position status: {}", other)),
        }
    }
}

/// What a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventAction {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "STOP_LOSS_50")]
    StopLoss,
    #[serde(rename = "TAKE_PROFIT_2X")]
    TakeProfit,
}

impl From<PositionStatus> for EventAction {
    fn from(status: PositionStatus) -> Self {
        match status {
            PositionStatus::Open => EventAction::Buy,
            PositionStatus::StopLoss50 => EventAction::StopLoss,
            PositionStatus::TakeProfit2x => EventAction::TakeProfit,
        }
    }
}

/// One entry in a position's append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub action: EventAction,
    pub price: f64,
    pub quantity: f64,
    /// Amount spent (buys only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Proceeds after slippage (sells only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Realized profit / loss (sells only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    pub time: DateTime<Utc>,
}

impl LedgerEvent {
    pub fn buy(price: f64, quantity: f64, cost: f64, time: DateTime<Utc>) -> Self {
        Self {
            action: EventAction::Buy,
            price,
            quantity,
            cost: Some(cost),
            value: None,
            pnl: None,
            time,
        }
    }

    pub fn settlement(reason: PositionStatus, price: f64, quantity: f64, value: f64, pnl: f64, time: DateTime<Utc>) -> Self {
        Self {
            action: reason.into(),
            price,
            quantity,
            cost: None,
            value: Some(value),
            pnl: Some(pnl),
            time,
        }
    }
}

/// A simulated trade keyed by pair address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Store-assigned identifier; 0 until persisted
    pub id: i64,
    pub pair_key: String,
    pub symbol: String,
    pub chain_id: String,
    pub entry_price: f64,
    pub current_quantity: f64,
    pub cost_basis: f64,
    /// Reference price for the take-profit multiple
    pub last_tp_price: f64,
    /// Last observed price (0 until the first update)
    pub current_price: f64,
    pub status: PositionStatus,
    pub log: Vec<LedgerEvent>,
    pub entry_time: DateTime<Utc>,
}

impl Position {
    /// Realized profit / loss across all settlement entries.
    pub fn realized_pnl(&self) -> f64 {
        self.log.iter().filter_map(|e| e.pnl).sum()
    }

    pub fn has_settlement(&self) -> bool {
        self.log.iter().any(|e| e.pnl.is_some())
    }

    /// Price used to mark the position: last observed, or entry when none yet.
    pub fn mark_price(&self) -> f64 {
        if self.current_price > 0.0 {
            self.current_price
        } else {
            self.entry_price
        }
    }
}

/// Singleton running totals.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Portfolio {
    pub balance: f64,
    pub realized_pnl: f64,
    pub fees_paid: f64,
}

/// Change applied atomically to the portfolio together with a position transition.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PortfolioDelta {
    pub balance: f64,
    pub realized_pnl: f64,
    pub fees: f64,
}

impl PortfolioDelta {
    /// Debit for opening a position of `size` with a flat `fee`.
    pub fn entry(size: f64, fee: f64) -> Self {
        Self {
            balance: -(size + fee),
            realized_pnl: 0.0,
            fees: fee,
        }
    }

    /// Credit for selling with proceeds `value` and realized `pnl`.
    pub fn settlement(value: f64, pnl: f64, fee: f64) -> Self {
        Self {
            balance: value - fee,
            realized_pnl: pnl,
            fees: fee,
        }
    }
}

impl Portfolio {
    pub fn apply(&mut self, delta: &PortfolioDelta) {
        self.balance += delta.balance;
        self.realized_pnl += delta.realized_pnl;
        self.fees_paid += delta.fees;
    }
}

/// Result of an atomic create-if-absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    AlreadyOpen,
    CapReached,
}

/// Why an entry request did or did not open a position.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryDecision {
    Opened(Position),
    AlreadyOpen,
    CapReached,
    InsufficientFunds { balance: f64 },
    InvalidPrice,
}

impl EntryDecision {
    pub fn is_opened(&self) -> bool {
        matches!(self, EntryDecision::Opened(_))
    }
}

/// Win / loss statistics over realized trades.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TradeStats {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percentage of realized trades that were profitable
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// Gross profit over gross loss; infinite with wins and no losses
    pub profit_factor: f64,
    pub total_pnl: f64,
}

/// A settled exit, reported to the operator.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitNotice {
    pub symbol: String,
    pub reason: PositionStatus,
    pub entry_price: f64,
    pub exit_price: f64,
    pub cost_basis: f64,
    /// Gross value before slippage
    pub gross_value: f64,
    pub sell_value: f64,
    pub pnl: f64,
    pub balance_after: f64,
    pub open_after: usize,
    pub max_open: usize,
}

impl fmt::Display for ExitNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            PositionStatus::StopLoss50 => write!(
                f,
                "🛑 <b>STOP LOSS HIT: {}</b>\n📉 Dropped 50% below entry.\n💸 Exited at loss of <b>${:.2}</b>\n🛡️ Saved remaining <b>${:.2}</b>",
                self.symbol,
                self.cost_basis - self.gross_value,
                self.gross_value,
            ),
            _ => {
                let gain_pct = if self.entry_price > 0.0 {
                    (self.exit_price - self.entry_price) / self.entry_price * 100.0
                } else {
                    0.0
                };
                write!(
                    f,
                    "✅ <b>TAKE PROFIT HIT: {}</b>\n🚀 Price doubled! ({:.0}%)\n💰 <b>Position closed</b> for <b>${:.2}</b>\n🤑 Profit: <b>${:.2}</b>\n♻️ <b>Slot freed</b> (Active: {}/{})\n🏦 New balance: <b>${:.2}</b>",
                    self.symbol, gain_pct, self.sell_value, self.pnl, self.open_after, self.max_open, self.balance_after,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [PositionStatus::Open, PositionStatus::StopLoss50, PositionStatus::TakeProfit2x] {
            assert_eq!(status.as_str().parse::<PositionStatus>(), Ok(status));
        }
        assert!("CLOSED".parse::<PositionStatus>().is_err());
    }

    #[test]
    fn test_event_log_serialization_omits_empty_fields() {
        let event = LedgerEvent::buy(1.0, 10.0, 10.0, Utc::now());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "BUY");
        assert!(json.get("pnl").is_none());

        let sell = LedgerEvent::settlement(PositionStatus::TakeProfit2x, 2.0, 10.0, 19.8, 9.8, Utc::now());
        let json = serde_json::to_value(&sell).unwrap();
        assert_eq!(json["action"], "TAKE_PROFIT_2X");
        assert_eq!(json["pnl"], 9.8);
    }

    #[test]
    fn test_portfolio_delta_application() {
        let mut portfolio = Portfolio { balance: 200.0, ..Default::default() };
        portfolio.apply(&PortfolioDelta::entry(10.0, 0.05));
        assert!((portfolio.balance - 189.95).abs() < 1e-9);
        assert!((portfolio.fees_paid - 0.05).abs() < 1e-9);

        portfolio.apply(&PortfolioDelta::settlement(19.8, 9.8, 0.05));
        assert!((portfolio.balance - 209.70).abs() < 1e-9);
        assert!((portfolio.realized_pnl - 9.8).abs() < 1e-9);
        assert!((portfolio.fees_paid - 0.10).abs() < 1e-9);
    }
}
