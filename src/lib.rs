//! pair-scout - screening and paper-trading of newly listed DEX pairs
//!
//! Snapshots from a market feed run through a gated checklist scorer and a
//! risk evaluator; attractive pairs are alerted and traded against a simulated
//! ledger that exits on stop-loss or take-profit.

pub mod analyzer;
pub mod bot;
pub mod config;
pub mod error;
pub mod ledger;
pub mod sources;
pub mod storage;
pub mod types;

// Re-export main types for convenience
pub use analyzer::{Action, AnalysisResult, RiskFlag, RiskLevel, ScoringEngine};
pub use bot::Bot;
pub use config::Config;
pub use ledger::PaperTrader;
pub use storage::{InMemoryStore, SqliteStore, Store};
pub use types::Snapshot;
