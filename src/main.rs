//! pair-scout binary: wires the feed, oracles, ledger and notifier together and
//! runs the cycle loop until Ctrl-C.

use anyhow::{Context, Result};
use pair_scout::analyzer::ScoringEngine;
use pair_scout::bot::Bot;
use pair_scout::config::Config;
use pair_scout::ledger::PaperTrader;
use pair_scout::sources::{
    DexScreenerFeed, DisabledNotifier, GoPlusOracle, HolderAnalytics, HttpSource, MoralisAnalytics, Notifier,
    TelegramNotifier,
};
use pair_scout::storage::{SqliteStore, Store};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn, Level};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;

    let level = config.log_level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    info!("Starting pair-scout");
    info!(
        "Checklist gate {}/20, liquidity floor ${}, cap {} positions",
        config.scoring.checklist_pass_threshold, config.scoring.min_liquidity_usd, config.ledger.max_open_positions
    );

    let store: Arc<dyn Store> = match SqliteStore::connect(&config.database_url, config.ledger.initial_balance).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Store unavailable at {}: {}", config.database_url, e);
            return Err(e.into());
        }
    };

    if !store.health_check().await.unwrap_or(false) {
        error!("Store at {} failed its health check", config.database_url);
        anyhow::bail!("store health check failed");
    }

    let http = Arc::new(HttpSource::new(&config.network).context("Failed to build HTTP client")?);
    let feed = Arc::new(DexScreenerFeed::new(
        http.clone(),
        config.network.dexscreener_base_url.clone(),
        config.network.max_parallel_analyses,
    ));
    let oracle = Arc::new(GoPlusOracle::new(http.clone(), &config.network));
    let analytics: Option<Arc<dyn HolderAnalytics>> = match &config.moralis_api_key {
        Some(key) => Some(Arc::new(MoralisAnalytics::new(
            http.clone(),
            config.network.moralis_base_url.clone(),
            key.clone(),
        ))),
        None => {
            warn!("MORALIS_API_KEY not set; holder analytics disabled");
            None
        }
    };
    let notifier: Arc<dyn Notifier> = match &config.telegram {
        Some(telegram) => Arc::new(TelegramNotifier::new(http.clone(), &config.network.telegram_base_url, telegram)),
        None => {
            warn!("Telegram credentials not set; notifications disabled");
            Arc::new(DisabledNotifier)
        }
    };

    let engine = Arc::new(ScoringEngine::new(oracle, analytics, config.scoring.clone()));
    let trader = Arc::new(PaperTrader::new(store.clone(), config.ledger.clone()));

    let mut bot = Bot::new(config, feed, engine, trader, store, notifier);
    bot.startup().await.context("Startup failed")?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut bot_handle = tokio::spawn(async move { bot.run(stop_rx).await });

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Shutdown requested; finishing current cycle");
            let _ = stop_tx.send(true);
            bot_handle.await.context("Bot task panicked")?;
        }
        joined = &mut bot_handle => {
            joined.context("Bot task panicked")?;
        }
    }

    Ok(())
}
