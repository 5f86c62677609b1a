//! Configuration for the scout: one immutable value threaded through every component.
//!
//! Defaults mirror the production tuning; `Config::from_env` overrides them from the
//! process environment (and a `.env` file, if present).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Complete configuration for the scout service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub scoring: ScoringConfig,
    pub ledger: LedgerConfig,
    pub network: NetworkConfig,
    pub cycle: CycleConfig,
    /// Telegram credentials; notifications are disabled when absent
    pub telegram: Option<TelegramConfig>,
    /// Moralis API key; holder analytics are skipped when absent
    pub moralis_api_key: Option<String>,
    /// sqlx connection string for the persistent store
    pub database_url: String,
    /// Maximum tracing level ("TRACE", "DEBUG", "INFO", ...)
    pub log_level: String,
}

/// Checklist gate, fundamental floors and classification thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Minimum checklist passes before any category scoring happens
    pub checklist_pass_threshold: u32,
    /// Hard liquidity floor in USD
    pub min_liquidity_usd: f64,
    /// Hard 1h volume floor in USD
    pub min_volume_h1_usd: f64,
    pub watchlist_threshold: f64,
    pub alert_threshold: f64,
    pub high_priority_threshold: f64,
    /// Points removed when the owner can mint / change balances
    pub mint_penalty: f64,
}

/// Paper-trading parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Fraction of current cash committed per trade
    pub position_fraction: f64,
    /// Flat fee in USD charged on every buy and every sell
    pub flat_fee_usd: f64,
    /// Fractional haircut applied to sale proceeds
    pub slippage: f64,
    pub max_open_positions: usize,
    pub initial_balance: f64,
    /// Positions smaller than this are not worth opening
    pub min_position_usd: f64,
    /// Stop-loss fires at or below this fraction of the entry price
    pub stop_loss_fraction: f64,
    /// Take-profit fires at or above this multiple of the reference price
    pub take_profit_multiple: f64,
}

/// Timeouts, retries and rate limits for the external clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_secs: u64,
    pub rate_limit_per_second: u32,
    pub security_cache_ttl_secs: u64,
    pub security_cache_max_entries: u64,
    /// Upper bound on snapshots analyzed concurrently within one cycle
    pub max_parallel_analyses: usize,
    pub dexscreener_base_url: String,
    pub goplus_base_url: String,
    pub moralis_base_url: String,
    pub telegram_base_url: String,
}

/// Main loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    pub cycle_interval_secs: u64,
    pub report_interval_secs: u64,
    /// Wipe ledger, seen set and chat history when the process starts
    pub reset_on_startup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            checklist_pass_threshold: 14,
            min_liquidity_usd: 500.0,
            min_volume_h1_usd: 100.0,
            watchlist_threshold: 80.0,
            alert_threshold: 90.0,
            high_priority_threshold: 99.0,
            mint_penalty: 50.0,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            position_fraction: 0.05,
            flat_fee_usd: 0.05,
            slippage: 0.01,
            max_open_positions: 4,
            initial_balance: 200.0,
            min_position_usd: 1.0,
            stop_loss_fraction: 0.5,
            take_profit_multiple: 2.0,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            max_retries: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_secs: 8,
            rate_limit_per_second: 5,
            security_cache_ttl_secs: 300,
            security_cache_max_entries: 10_000,
            max_parallel_analyses: 8,
            dexscreener_base_url: "https://api.dexscreener.com".to_string(),
            goplus_base_url: "https://api.gopluslabs.io/api/v1".to_string(),
            moralis_base_url: "https://deep-index.moralis.io/api/v2.2".to_string(),
            telegram_base_url: "https://api.telegram.org".to_string(),
        }
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 30,
            report_interval_secs: 3600,
            reset_on_startup: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            ledger: LedgerConfig::default(),
            network: NetworkConfig::default(),
            cycle: CycleConfig::default(),
            telegram: None,
            moralis_api_key: None,
            database_url: "sqlite:./scout.db?mode=rwc".to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl CycleConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}

impl Config {
    /// Build configuration from defaults overridden by environment variables.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Config::default();

        if let (Some(bot_token), Some(chat_id)) = (optional("TELEGRAM_BOT_TOKEN"), optional("TELEGRAM_CHAT_ID")) {
            config.telegram = Some(TelegramConfig { bot_token, chat_id });
        }
        config.moralis_api_key = optional("MORALIS_API_KEY");
        if let Some(url) = optional("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(level) = optional("LOG_LEVEL") {
            config.log_level = level;
        }

        override_from_env("CHECKLIST_PASS_THRESHOLD", &mut config.scoring.checklist_pass_threshold)?;
        override_from_env("MIN_LIQUIDITY_USD", &mut config.scoring.min_liquidity_usd)?;
        override_from_env("MIN_VOLUME_H1_USD", &mut config.scoring.min_volume_h1_usd)?;
        override_from_env("SCORE_WATCHLIST", &mut config.scoring.watchlist_threshold)?;
        override_from_env("SCORE_ALERT", &mut config.scoring.alert_threshold)?;
        override_from_env("SCORE_HIGH_PRIORITY", &mut config.scoring.high_priority_threshold)?;

        override_from_env("POSITION_FRACTION", &mut config.ledger.position_fraction)?;
        override_from_env("FLAT_FEE_USD", &mut config.ledger.flat_fee_usd)?;
        override_from_env("SLIPPAGE", &mut config.ledger.slippage)?;
        override_from_env("MAX_OPEN_POSITIONS", &mut config.ledger.max_open_positions)?;
        override_from_env("INITIAL_BALANCE", &mut config.ledger.initial_balance)?;

        override_from_env("REQUEST_TIMEOUT_SECS", &mut config.network.request_timeout_secs)?;
        override_from_env("MAX_RETRIES", &mut config.network.max_retries)?;
        override_from_env("RATE_LIMIT_PER_SECOND", &mut config.network.rate_limit_per_second)?;
        override_from_env("MAX_PARALLEL_ANALYSES", &mut config.network.max_parallel_analyses)?;

        override_from_env("CYCLE_INTERVAL_SECS", &mut config.cycle.cycle_interval_secs)?;
        override_from_env("REPORT_INTERVAL_SECS", &mut config.cycle.report_interval_secs)?;
        override_from_env("RESET_ON_STARTUP", &mut config.cycle.reset_on_startup)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the pipeline or the ledger incoherent.
    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;
        if !(s.watchlist_threshold <= s.alert_threshold && s.alert_threshold <= s.high_priority_threshold) {
            bail!(
                "score thresholds must be ordered watchlist <= alert <= high priority (got {} / {} / {})",
                s.watchlist_threshold, s.alert_threshold, s.high_priority_threshold
            );
        }
        if s.checklist_pass_threshold > 20 {
            bail!("checklist pass threshold {} exceeds the 20 available checks", s.checklist_pass_threshold);
        }

        let l = &self.ledger;
        for (name, value) in [
            ("position_fraction", l.position_fraction),
            ("slippage", l.slippage),
            ("stop_loss_fraction", l.stop_loss_fraction),
        ] {
            if !(0.0..1.0).contains(&value) {
                bail!("{} must be within [0, 1), got {}", name, value);
            }
        }
        if l.take_profit_multiple <= 1.0 {
            bail!("take_profit_multiple must be above 1.0, got {}", l.take_profit_multiple);
        }
        if l.max_open_positions == 0 {
            bail!("max_open_positions must be at least 1");
        }
        if l.initial_balance <= 0.0 || l.flat_fee_usd < 0.0 {
            bail!("initial balance must be positive and fees non-negative");
        }
        if self.network.max_parallel_analyses == 0 {
            bail!("max_parallel_analyses must be at least 1");
        }
        Ok(())
    }

    pub fn with_telegram(mut self, bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        self.telegram = Some(TelegramConfig {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        });
        self
    }

    pub fn with_initial_balance(mut self, balance: f64) -> Self {
        self.ledger.initial_balance = balance;
        self
    }

    pub fn with_max_open_positions(mut self, max: usize) -> Self {
        self.ledger.max_open_positions = max;
        self
    }

    pub fn with_thresholds(mut self, watchlist: f64, alert: f64, high_priority: f64) -> Self {
        self.scoring.watchlist_threshold = watchlist;
        self.scoring.alert_threshold = alert;
        self.scoring.high_priority_threshold = high_priority;
        self
    }

    pub fn with_cycle_interval(mut self, secs: u64) -> Self {
        self.cycle.cycle_interval_secs = secs;
        self
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn override_from_env<T>(key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = optional(key) {
        *target = raw
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw))?;
    }
    Ok(())
}
