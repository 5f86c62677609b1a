//! Bot cycle behavior against a scripted feed and a recording notifier.

mod common;

use common::{clean_security, snapshot, FixedOracle, FlakyStore, RecordingNotifier, ScriptedFeed};
use pair_scout::analyzer::ScoringEngine;
use pair_scout::bot::Bot;
use pair_scout::config::Config;
use pair_scout::ledger::PaperTrader;
use pair_scout::sources::{Command, SentMessage};
use pair_scout::storage::{InMemoryStore, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

struct Harness {
    bot: Bot,
    feed: Arc<ScriptedFeed>,
    notifier: Arc<RecordingNotifier>,
    store: Arc<dyn Store>,
}

fn harness(config: Config) -> Harness {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new(config.ledger.initial_balance));
    harness_with_store(config, store)
}

fn harness_with_store(config: Config, store: Arc<dyn Store>) -> Harness {
    let feed = Arc::new(ScriptedFeed::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = Arc::new(ScoringEngine::new(
        Arc::new(FixedOracle(clean_security())),
        None,
        config.scoring.clone(),
    ));
    let trader = Arc::new(PaperTrader::new(store.clone(), config.ledger.clone()));
    let bot = Bot::new(config, feed.clone(), engine, trader, store.clone(), notifier.clone());
    Harness { bot, feed, notifier, store }
}

#[tokio::test]
async fn test_cycle_alerts_enters_and_marks_seen() {
    let mut h = harness(Config::default());
    h.feed.push_batch(vec![snapshot("0xa1", 0.01), snapshot("0xa2", 0.02), snapshot("0xa1", 0.01)]);

    let report = h.bot.run_cycle().await.unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(report.analyzed, 2, "duplicates within a batch are analyzed once");
    assert_eq!(report.alerted, 2);
    assert_eq!(report.entered, 2);
    assert!(report.report_sent);
    assert_eq!(h.notifier.alert_count(), 2);
    assert!(h.store.is_seen("0xa1").await.unwrap());
    assert_eq!(h.store.open_count().await.unwrap(), 2);

    // Same pairs again: nothing new to analyze, and no second report yet
    h.feed.push_batch(vec![snapshot("0xa1", 0.011), snapshot("0xa2", 0.02)]);
    let report = h.bot.run_cycle().await.unwrap();
    assert_eq!(report.analyzed, 0);
    assert!(!report.report_sent);
    assert_eq!(h.notifier.alert_count(), 2);

    // Batch prices still reach the open positions
    let open = h.store.open_positions().await.unwrap();
    let a1 = open.iter().find(|p| p.pair_key == "0xa1").unwrap();
    assert_eq!(a1.current_price, 0.011);
}

#[tokio::test]
async fn test_alerts_suppressed_at_position_cap() {
    let mut h = harness(Config::default());
    h.feed
        .push_batch((0..6).map(|i| snapshot(&format!("0xc{}", i), 0.01)).collect());

    let report = h.bot.run_cycle().await.unwrap();
    assert_eq!(report.analyzed, 6);
    assert_eq!(report.alerted, 4);
    assert_eq!(report.entered, 4);
    assert_eq!(report.suppressed, 2);
    assert_eq!(h.notifier.alert_count(), 4);
    assert_eq!(h.store.open_count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_store_read_failure_does_not_abort_cycle() {
    let flaky = Arc::new(FlakyStore::new(200.0));
    let mut h = harness_with_store(Config::default(), flaky.clone());
    h.feed.push_batch(vec![snapshot("0xs1", 1.0)]);
    h.bot.run_cycle().await.unwrap();
    assert_eq!(h.store.open_positions().await.unwrap().len(), 1);

    flaky.fail_open_count(true);
    h.feed.push_batch(vec![snapshot("0xs1", 0.4), snapshot("0xn1", 0.01), snapshot("0xn2", 0.01)]);
    let report = h.bot.run_cycle().await.unwrap();

    // Both results fail the cap check, yet the rest of the cycle still runs
    assert_eq!(report.analyzed, 2);
    assert_eq!(report.alerted, 0);
    assert!(h.store.is_seen("0xn1").await.unwrap());
    assert!(h.store.is_seen("0xn2").await.unwrap());
    assert_eq!(report.exits, 1);
    assert!(h.store.open_positions().await.unwrap().is_empty());
    assert!(h.notifier.texts().iter().any(|t| t.contains("STOP LOSS HIT: S1")));
}

#[tokio::test]
async fn test_missing_prices_fetched_and_exit_notified() {
    let mut h = harness(Config::default());
    h.feed.push_batch(vec![snapshot("0xe1", 1.0)]);
    h.bot.run_cycle().await.unwrap();
    assert_eq!(h.store.open_count().await.unwrap(), 1);

    // Next batch does not include the open pair; its price comes from pairs_for
    h.feed.set_price("0xe1", 2.0);
    let report = h.bot.run_cycle().await.unwrap();

    assert_eq!(report.exits, 1);
    assert_eq!(
        h.feed.pair_requests.lock().unwrap().as_slice(),
        &[("ethereum".to_string(), vec!["0xe1".to_string()])]
    );
    assert!(h.notifier.texts().iter().any(|t| t.contains("TAKE PROFIT HIT: E1")));
    assert_eq!(h.store.open_count().await.unwrap(), 0);
    let balance = h.store.portfolio().await.unwrap().balance;
    assert!((balance - 209.70).abs() < 1e-9, "balance {}", balance);
}

#[tokio::test]
async fn test_balance_and_reset_commands() {
    let mut h = harness(Config::default());
    h.feed.push_batch(vec![snapshot("0xr1", 1.0)]);
    h.bot.run_cycle().await.unwrap();
    assert_eq!(h.store.open_count().await.unwrap(), 1);

    h.notifier.queue_command(Command::BalanceReport);
    let report = h.bot.run_cycle().await.unwrap();
    assert_eq!(report.commands, 1);
    assert!(h.notifier.texts().iter().any(|t| t.contains("PORTFOLIO") && t.contains("ACTIVE (1/4)")));

    let delivered_before_reset = h.store.take_message_ids().await.unwrap();
    for message in &delivered_before_reset {
        h.store.log_message(message).await.unwrap();
    }

    h.notifier.queue_command(Command::Reset);
    h.bot.run_cycle().await.unwrap();

    assert_eq!(h.store.open_count().await.unwrap(), 0);
    assert_eq!(h.store.portfolio().await.unwrap().balance, 200.0);
    assert!(!h.store.is_seen("0xr1").await.unwrap());
    assert_eq!(*h.notifier.retracted.lock().unwrap(), delivered_before_reset);
    assert!(h.notifier.texts().iter().any(|t| t.contains("reset")));

    // Only the confirmation is left to retract next time
    let remaining = h.store.take_message_ids().await.unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn test_startup_reset_retracts_previous_session() {
    let mut h = harness(Config::default());
    let stale = SentMessage { destination: "test-chat".to_string(), message_id: 99 };
    h.store.log_message(&stale).await.unwrap();
    h.store.mark_seen("0xold", "ethereum").await.unwrap();

    h.bot.startup().await.unwrap();

    assert_eq!(*h.notifier.retracted.lock().unwrap(), vec![stale]);
    assert!(!h.store.is_seen("0xold").await.unwrap());
    let texts = h.notifier.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("Fresh session") && texts[0].contains("$200.00"));
}

#[tokio::test]
async fn test_run_stops_on_signal() {
    let h = harness(Config::default().with_cycle_interval(3600));
    let mut bot = h.bot;
    let (stop_tx, stop_rx) = watch::channel(false);

    let handle = tokio::spawn(async move { bot.run(stop_rx).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("bot did not stop")
        .unwrap();
}
