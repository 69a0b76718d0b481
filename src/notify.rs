//! Telegram notification sink
//!
//! Delivers pre-formatted report text and chart images to the configured
//! chat. Sends retry with bounded exponential backoff; exhaustion returns an
//! error so a cycle can log it, but delivery failure never aborts the
//! computation that produced the report.

use crate::config::TelegramConfig;
use crate::error::{BotError, Result};
use reqwest::multipart;
use reqwest::Client;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct SendMessageRequest {
    chat_id: String,
    text: String,
    parse_mode: String,
}

/// Telegram delivery client. A disabled notifier swallows every send,
/// useful for local runs without a bot token.
#[derive(Clone)]
pub struct Notifier {
    http: Client,
    target: Option<TelegramConfig>,
}

impl Notifier {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            http: Client::new(),
            target: Some(config),
        }
    }

    pub fn disabled() -> Self {
        Self {
            http: Client::new(),
            target: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Send HTML-formatted text to the configured chat
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let Some(target) = &self.target else {
            debug!("Notifier disabled, dropping message");
            return Ok(());
        };

        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            target.bot_token
        );
        let request = SendMessageRequest {
            chat_id: target.chat_id.clone(),
            text: text.to_string(),
            parse_mode: "HTML".to_string(),
        };

        let mut delay = Duration::from_millis(BASE_DELAY_MS);
        let mut last_err: Option<BotError> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let outcome = async {
                self.http
                    .post(&url)
                    .json(&request)
                    .send()
                    .await?
                    .error_for_status()?;
                Ok::<_, BotError>(())
            }
            .await;

            match outcome {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("sendMessage attempt {}/{} failed: {}", attempt, MAX_ATTEMPTS, e);
                    last_err = Some(e);
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        Err(exhausted("sendMessage", last_err))
    }

    /// Upload a photo from disk with a caption
    pub async fn send_photo(&self, path: &Path, caption: &str) -> Result<()> {
        let Some(target) = &self.target else {
            debug!("Notifier disabled, dropping photo");
            return Ok(());
        };

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chart.png".to_string());
        let url = format!("https://api.telegram.org/bot{}/sendPhoto", target.bot_token);

        let mut delay = Duration::from_millis(BASE_DELAY_MS);
        let mut last_err: Option<BotError> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            // Multipart bodies are not reusable; rebuild the form per attempt
            let form = multipart::Form::new()
                .text("chat_id", target.chat_id.clone())
                .text("caption", caption.to_string())
                .part(
                    "photo",
                    multipart::Part::bytes(bytes.clone()).file_name(file_name.clone()),
                );

            let outcome = async {
                self.http
                    .post(&url)
                    .multipart(form)
                    .send()
                    .await?
                    .error_for_status()?;
                Ok::<_, BotError>(())
            }
            .await;

            match outcome {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("sendPhoto attempt {}/{} failed: {}", attempt, MAX_ATTEMPTS, e);
                    last_err = Some(e);
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        Err(exhausted("sendPhoto", last_err))
    }

    /// Best-effort error notice; honored only when `notify_errors` is set
    pub async fn error(&self, context: &str, detail: &str) -> Result<()> {
        if let Some(target) = &self.target {
            if !target.notify_errors {
                return Ok(());
            }
        }
        self.send_text(&format!("⚠️ <b>{}</b>\n<code>{}</code>", context, detail))
            .await
    }

    pub async fn startup(&self) -> Result<()> {
        info!("Sending startup notification");
        self.send_text("🏁 Portfolio race bot started").await
    }
}

fn exhausted(what: &str, last_err: Option<BotError>) -> BotError {
    last_err.unwrap_or_else(|| BotError::Telegram(format!("{} failed", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_notifier_accepts_everything() {
        let notifier = Notifier::disabled();
        assert!(!notifier.is_enabled());
        assert!(notifier.send_text("hello").await.is_ok());
        assert!(notifier.error("cycle", "boom").await.is_ok());
    }

    #[tokio::test]
    async fn test_error_suppressed_when_notify_errors_off() {
        let notifier = Notifier::new(TelegramConfig {
            bot_token: "token".to_string(),
            chat_id: "1".to_string(),
            notify_errors: false,
        });
        // Would hit the network if it were not suppressed
        assert!(notifier.error("cycle", "boom").await.is_ok());
    }
}
