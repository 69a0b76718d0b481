//! Telegram bot for receiving commands
//!
//! Long-polls `getUpdates` and forwards recognized commands over a channel
//! to the command handler. Only messages from the configured chat are
//! honored. The poll loop owns the update offset; nothing else touches it.

use crate::config::TelegramConfig;
use crate::error::Result;
use crate::notify::Notifier;
use crate::scheduler::Engine;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Commands the chat can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// Portfolio valuation of the primary account
    Portfolio,
    /// Short status line
    Status,
    /// Race standings
    Race,
    /// Race chart image
    Chart,
    /// Run the full daily cycle now
    Report,
    /// Lifetime P&L breakdown
    Pnl,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    chat: TelegramChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    result: Vec<TelegramUpdate>,
}

/// Long-poll loop feeding [`BotCommand`]s into the handler channel
pub struct TelegramBot {
    http: Client,
    config: TelegramConfig,
    command_tx: mpsc::Sender<BotCommand>,
}

impl TelegramBot {
    pub fn new(config: TelegramConfig, command_tx: mpsc::Sender<BotCommand>) -> Self {
        Self {
            http: Client::new(),
            config,
            command_tx,
        }
    }

    /// Poll until the process exits. The offset lives here and only here.
    pub async fn start_polling(self) {
        info!("Starting Telegram command listener");
        let mut last_update_id: i64 = 0;

        loop {
            match self.poll_updates(last_update_id).await {
                Ok(updates) => {
                    for update in updates {
                        last_update_id = last_update_id.max(update.update_id + 1);

                        let Some(msg) = update.message else { continue };
                        if msg.chat.id.to_string() != self.config.chat_id {
                            warn!("Ignoring message from unauthorized chat {}", msg.chat.id);
                            continue;
                        }
                        if let Some(text) = msg.text {
                            self.handle_message(&text).await;
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to poll Telegram updates: {}", e);
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                }
            }

            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        }
    }

    async fn poll_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let url = format!(
            "https://api.telegram.org/bot{}/getUpdates?offset={}&timeout=30",
            self.config.bot_token, offset
        );

        let response: GetUpdatesResponse = self.http.get(&url).send().await?.json().await?;
        Ok(response.result)
    }

    async fn handle_message(&self, text: &str) {
        let Some(command) = parse_command(text) else {
            if text.trim().starts_with('/') {
                self.reply(&unknown_command_text(text)).await;
            }
            return;
        };

        info!("Received command: {}", text.trim());
        match command {
            ParsedCommand::Help => self.reply(HELP_TEXT).await,
            ParsedCommand::Bot(cmd) => {
                let _ = self.command_tx.send(cmd).await;
            }
        }
    }

    async fn reply(&self, text: &str) {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.config.bot_token
        );
        let body = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        if let Err(e) = self.http.post(&url).json(&body).send().await {
            error!("Failed to send Telegram reply: {}", e);
        }
    }
}

enum ParsedCommand {
    Help,
    Bot(BotCommand),
}

fn parse_command(text: &str) -> Option<ParsedCommand> {
    let text = text.trim();
    let stripped = text.strip_prefix('/')?;
    // Group chats append @botname
    let cmd = stripped
        .split_whitespace()
        .next()?
        .split('@')
        .next()
        .unwrap_or_default();

    match cmd.to_lowercase().as_str() {
        "start" | "help" => Some(ParsedCommand::Help),
        "status" => Some(ParsedCommand::Bot(BotCommand::Status)),
        "portfolio" => Some(ParsedCommand::Bot(BotCommand::Portfolio)),
        "race" => Some(ParsedCommand::Bot(BotCommand::Race)),
        "chart" => Some(ParsedCommand::Bot(BotCommand::Chart)),
        "report" => Some(ParsedCommand::Bot(BotCommand::Report)),
        "pnl" => Some(ParsedCommand::Bot(BotCommand::Pnl)),
        _ => None,
    }
}

fn unknown_command_text(text: &str) -> String {
    format!(
        "❓ Unknown command: {}\nUse /help for available commands",
        text.trim()
    )
}

const HELP_TEXT: &str = r#"🏁 <b>Portfolio Race Bot</b>

/portfolio - Current valuation of the main account
/status - Short equity summary
/pnl - Lifetime P&L since account inception
/race - Race standings across tracked accounts
/chart - Latest race chart
/report - Run the full daily report now
/help - Show this message"#;

/// Executes commands arriving from the poll loop
pub struct CommandHandler {
    engine: Arc<Engine>,
    notifier: Notifier,
}

impl CommandHandler {
    pub fn new(engine: Arc<Engine>, notifier: Notifier) -> Self {
        Self { engine, notifier }
    }

    pub async fn run(&self, mut command_rx: mpsc::Receiver<BotCommand>) {
        while let Some(cmd) = command_rx.recv().await {
            self.handle(cmd).await;
        }
    }

    pub async fn handle(&self, cmd: BotCommand) {
        let outcome = match cmd {
            BotCommand::Portfolio => self.send_portfolio().await,
            BotCommand::Status => self.send_status().await,
            BotCommand::Race => self.send_race().await,
            BotCommand::Chart => self.send_chart().await,
            BotCommand::Report => self.engine.run_cycle().await,
            BotCommand::Pnl => self.send_pnl().await,
        };

        if let Err(e) = outcome {
            error!("Command {:?} failed: {}", cmd, e);
            let _ = self.notifier.error("Command failed", &e.to_string()).await;
        }
    }

    async fn send_portfolio(&self) -> Result<()> {
        let text = self.engine.portfolio_report_text().await?;
        self.notifier.send_text(&text).await
    }

    async fn send_status(&self) -> Result<()> {
        let text = self.engine.status_text().await?;
        self.notifier.send_text(&text).await
    }

    async fn send_race(&self) -> Result<()> {
        let text = self.engine.race_report_text()?;
        self.notifier.send_text(&text).await
    }

    async fn send_chart(&self) -> Result<()> {
        match self.engine.chart_path() {
            Some(path) => self.notifier.send_photo(&path, "🏁 Race chart").await,
            None => self.notifier.send_text("📉 Chart not available").await,
        }
    }

    async fn send_pnl(&self) -> Result<()> {
        let text = self.engine.pnl_report_text().await?;
        self.notifier.send_text(&text).await
    }
}
