//! Configuration loading
//!
//! Settings live in a TOML file (default `config.toml`), with optional
//! `RACEBOT_*` environment overrides layered on top.

use crate::error::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// Top-level bot configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub broker: BrokerConfig,
    pub telegram: Option<TelegramConfig>,
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub rates: RatesConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Broker REST API access
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// API base URL
    pub base_url: String,
    /// Access token
    pub token: String,
}

/// Telegram delivery settings
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    /// Send a message when a cycle step fails
    #[serde(default = "default_true")]
    pub notify_errors: bool,
}

/// One account participating in the race
#[derive(Debug, Clone, Deserialize)]
pub struct RaceAccount {
    pub id: String,
    /// Display name used in race reports and the history file
    pub name: String,
}

/// Which accounts the bot watches
#[derive(Debug, Clone, Deserialize)]
pub struct AccountsConfig {
    /// Account the /portfolio and /pnl reports cover
    pub primary: String,
    /// Ordered race participants; order is the tie-break for the ranking
    /// and fixes the column layout of the history file
    pub race: Vec<RaceAccount>,
}

/// When the daily cycle runs
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Local wall-clock time "HH:MM" for the daily report
    #[serde(default = "default_report_time")]
    pub report_time: String,
    /// How often the schedule tick checks the clock, in seconds
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            report_time: default_report_time(),
            tick_secs: default_tick_secs(),
        }
    }
}

/// Currency rate cache behavior
#[derive(Debug, Clone, Deserialize)]
pub struct RatesConfig {
    /// Cache validity window in seconds
    #[serde(default = "default_cache_secs")]
    pub cache_secs: u64,
    /// Fallback USD/home rate when the source is unreachable
    #[serde(default = "default_usd_fallback")]
    pub usd_fallback: Decimal,
    /// Fallback EUR/home rate when the source is unreachable
    #[serde(default = "default_eur_fallback")]
    pub eur_fallback: Decimal,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            cache_secs: default_cache_secs(),
            usd_fallback: default_usd_fallback(),
            eur_fallback: default_eur_fallback(),
        }
    }
}

/// Race history persistence
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Append-only CSV the daily snapshots go to
    #[serde(default = "default_history_path")]
    pub path: String,
    /// Pre-rendered race chart to attach to reports, when it exists
    #[serde(default)]
    pub chart_path: Option<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
            chart_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_report_time() -> String {
    "11:00".to_string()
}

fn default_tick_secs() -> u64 {
    60
}

fn default_cache_secs() -> u64 {
    3600
}

fn default_usd_fallback() -> Decimal {
    dec!(90)
}

fn default_eur_fallback() -> Decimal {
    dec!(100)
}

fn default_history_path() -> String {
    "data/portfolio_race_history.csv".to_string()
}

impl Config {
    /// Load configuration from a TOML file, with `RACEBOT_*` env overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("RACEBOT")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
