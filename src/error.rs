//! Crate-wide error type

use thiserror::Error;

/// Errors produced anywhere in the bot
#[derive(Error, Debug)]
pub enum BotError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("History file error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Broker API error: {0}")]
    Broker(String),

    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

pub type Result<T> = std::result::Result<T, BotError>;
