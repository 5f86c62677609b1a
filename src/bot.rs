//! The scout's main loop: commands, fetch, analyze, trade, monitor, report.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::analyzer::types::{Action, AnalysisResult};
use crate::analyzer::ScoringEngine;
use crate::config::Config;
use crate::ledger::types::{EntryDecision, Portfolio};
use crate::ledger::PaperTrader;
use crate::sources::{Command, MarketFeed, Notifier, SentMessage};
use crate::storage::Store;
use crate::types::Snapshot;

/// Pause between message deletions when clearing the chat.
const RETRACT_PAUSE: Duration = Duration::from_millis(50);

/// What one cycle did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub commands: usize,
    pub fetched: usize,
    pub analyzed: usize,
    pub alerted: usize,
    pub suppressed: usize,
    pub entered: usize,
    pub exits: usize,
    pub report_sent: bool,
}

pub struct Bot {
    config: Config,
    feed: Arc<dyn MarketFeed>,
    engine: Arc<ScoringEngine>,
    trader: Arc<PaperTrader>,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    command_cursor: i64,
    last_report: Option<Instant>,
}

impl Bot {
    pub fn new(
        config: Config,
        feed: Arc<dyn MarketFeed>,
        engine: Arc<ScoringEngine>,
        trader: Arc<PaperTrader>,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            feed,
            engine,
            trader,
            store,
            notifier,
            command_cursor: 0,
            last_report: None,
        }
    }

    /// Optional fresh start, then the start message.
    pub async fn startup(&mut self) -> Result<()> {
        if self.config.cycle.reset_on_startup {
            info!("Performing startup reset");
            self.reset_session().await?;
        }

        let portfolio = self.trader.portfolio().await?;
        let text = format!(
            "🔥 <b>Scout started</b>\n\n{}\nBalance: <b>${:.2}</b>\nChecklist gate: <b>{}/20</b>",
            if self.config.cycle.reset_on_startup { "Fresh session initialized." } else { "Session resumed." },
            portfolio.balance,
            self.config.scoring.checklist_pass_threshold
        );
        self.notify_text(&text).await;
        Ok(())
    }

    /// Run cycles until `stop` flips to true (or its sender goes away).
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) {
        info!(
            "Scout running: cycle every {}s, report every {}s",
            self.config.cycle.cycle_interval_secs, self.config.cycle.report_interval_secs
        );

        loop {
            if *stop.borrow() {
                break;
            }

            match self.run_cycle().await {
                Ok(report) => info!(
                    fetched = report.fetched,
                    analyzed = report.analyzed,
                    alerted = report.alerted,
                    entered = report.entered,
                    exits = report.exits,
                    "Cycle complete"
                ),
                Err(e) => error!("Cycle failed: {:#}", e),
            }

            tokio::select! {
                _ = sleep(self.config.cycle.cycle_interval()) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Scout stopped");
    }

    /// One full pass of the pipeline.
    #[instrument(skip(self))]
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        report.commands = self.handle_commands().await;

        let batch = self.feed.list_latest().await;
        report.fetched = batch.len();
        let mut prices: HashMap<String, f64> = batch
            .iter()
            .map(|s| (s.pair_address.clone(), s.price_usd))
            .collect();

        let unseen = self.unseen(batch).await;
        if !unseen.is_empty() {
            info!("Analyzing {} new pairs", unseen.len());
        }

        let engine = &self.engine;
        let results: Vec<AnalysisResult> = stream::iter(unseen)
            .map(|snapshot| engine.analyze(snapshot))
            .buffer_unordered(self.config.network.max_parallel_analyses)
            .collect()
            .await;
        report.analyzed = results.len();

        for result in &results {
            let s = &result.snapshot;
            if let Err(e) = self.process_result(result, &mut report).await {
                error!(pair = %s.pair_address, "Failed to process result: {:#}", e);
            }
            if let Err(e) = self.store.mark_seen(&s.pair_address, &s.chain_id).await {
                error!(pair = %s.pair_address, "Failed to mark pair as seen: {}", e);
            }
        }

        if let Err(e) = self.refresh_open_prices(&mut prices).await {
            warn!("Price refresh skipped, using batch prices only: {:#}", e);
        }
        match self.trader.update_positions(&prices).await {
            Ok(notices) => {
                report.exits = notices.len();
                for notice in &notices {
                    self.notify_text(&notice.to_string()).await;
                }
            }
            Err(e) => error!("Position update failed: {:#}", e),
        }

        report.report_sent = match self.maybe_send_report().await {
            Ok(sent) => sent,
            Err(e) => {
                error!("Portfolio report failed: {:#}", e);
                false
            }
        };
        Ok(report)
    }

    async fn handle_commands(&mut self) -> usize {
        let (commands, next) = self.notifier.poll_commands(self.command_cursor).await;
        self.command_cursor = next;

        for command in &commands {
            if let Err(e) = self.handle_command(command).await {
                error!(?command, "Command failed: {:#}", e);
            }
        }
        commands.len()
    }

    async fn handle_command(&self, command: &Command) -> Result<()> {
        match command {
            Command::BalanceReport => {
                let summary = self.trader.summary_text().await?;
                self.notify_text(&summary).await;
                info!("Sent balance report by command");
            }
            Command::Reset => {
                self.reset_session().await?;
                let text = format!(
                    "♻️ <b>Scout reset!</b>\n\nHistory wiped.\nBalance: ${:.2}.",
                    self.trader.config().initial_balance
                );
                self.notify_text(&text).await;
                info!("State reset by command");
            }
        }
        Ok(())
    }

    /// Snapshots not analyzed in this epoch, first occurrence per pair.
    async fn unseen(&self, batch: Vec<Snapshot>) -> Vec<Snapshot> {
        let mut in_batch = HashSet::new();
        let mut unseen = Vec::new();
        for snapshot in batch {
            if !in_batch.insert(snapshot.pair_address.clone()) {
                continue;
            }
            match self.store.is_seen(&snapshot.pair_address).await {
                Ok(true) => {}
                Ok(false) => unseen.push(snapshot),
                Err(e) => warn!(pair = %snapshot.pair_address, "Seen lookup failed, skipping: {}", e),
            }
        }
        unseen
    }

    async fn process_result(&self, result: &AnalysisResult, report: &mut CycleReport) -> Result<()> {
        let s = &result.snapshot;
        if result.action == Action::Reject {
            debug!(pair = %s.pair_address, score = result.score(), flags = %result.risk_flags, "Rejected");
        } else {
            info!(
                pair = %s.pair_address,
                symbol = %s.base_token_symbol,
                chain = %s.chain_id,
                score = result.score(),
                action = %result.action,
                risk = %result.risk_level,
                liquidity = s.liquidity_usd,
                fdv = s.fdv,
                predicted_fdv = result.predicted_fdv,
                flags = %result.risk_flags,
                "Scored {} ({})",
                s.base_token_name,
                s.base_token_address
            );
        }

        if !result.action.is_actionable() {
            return Ok(());
        }

        let open = self.trader.open_count().await?;
        let max_open = self.trader.config().max_open_positions;
        if open >= max_open {
            info!("Position cap reached ({}/{}); suppressing alert for {}", open, max_open, s.base_token_symbol);
            report.suppressed += 1;
            return Ok(());
        }

        if let Some(message) = self.notifier.send(result).await {
            self.log_message(&message).await;
        }
        report.alerted += 1;

        match self.trader.enter(s).await {
            Ok(EntryDecision::Opened(_)) => report.entered += 1,
            Ok(other) => debug!(pair = %s.pair_address, "No entry: {:?}", other),
            Err(e) => error!(pair = %s.pair_address, "Entry failed: {:#}", e),
        }
        Ok(())
    }

    /// Fetch prices for OPEN positions that the latest batch did not cover.
    async fn refresh_open_prices(&self, prices: &mut HashMap<String, f64>) -> Result<()> {
        let mut missing: HashMap<String, Vec<String>> = HashMap::new();
        for (chain, pair) in self.trader.active_pairs().await? {
            if !prices.contains_key(&pair) {
                missing.entry(chain).or_default().push(pair);
            }
        }

        for (chain, pairs) in missing {
            for snapshot in self.feed.pairs_for(&chain, &pairs).await {
                prices.insert(snapshot.pair_address, snapshot.price_usd);
            }
        }
        Ok(())
    }

    async fn maybe_send_report(&mut self) -> Result<bool> {
        let due = self
            .last_report
            .map_or(true, |at| at.elapsed() >= self.config.cycle.report_interval());
        if !due {
            return Ok(false);
        }

        let portfolio = self.trader.portfolio().await?;
        self.notify_text(&portfolio_report(&portfolio, &self.config)).await;
        self.last_report = Some(Instant::now());
        Ok(true)
    }

    /// Wipe ledger and seen set, then retract every logged message.
    async fn reset_session(&self) -> Result<()> {
        self.trader.reset().await?;

        let messages = self
            .store
            .take_message_ids()
            .await
            .context("Failed to read message log")?;
        if !messages.is_empty() {
            info!("Retracting {} messages", messages.len());
        }
        for message in &messages {
            self.notifier.retract(message).await;
            sleep(RETRACT_PAUSE).await;
        }
        Ok(())
    }

    async fn notify_text(&self, text: &str) {
        if let Some(message) = self.notifier.send_text(text).await {
            self.log_message(&message).await;
        }
    }

    async fn log_message(&self, message: &SentMessage) {
        if let Err(e) = self.store.log_message(message).await {
            warn!("Failed to log message {}: {}", message.message_id, e);
        }
    }
}

/// Periodic portfolio report.
pub fn portfolio_report(portfolio: &Portfolio, config: &Config) -> String {
    let l = &config.ledger;
    format!(
        "📊 <b>Portfolio Report</b> 📊\n\n\
         Balance: <code>${:.2}</code>\n\
         Realized PnL: <code>${:.2}</code>\n\
         Fees Paid: <code>${:.2}</code>\n\
         Strategy: Risk {:.0}% | Stop {:.0}% | Exit @ {:.0}x",
        portfolio.balance,
        portfolio.realized_pnl,
        portfolio.fees_paid,
        l.position_fraction * 100.0,
        l.stop_loss_fraction * 100.0,
        l.take_profit_multiple
    )
}
