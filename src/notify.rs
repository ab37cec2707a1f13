//! Notification delivery
//!
//! Fire-and-forget by contract: a failed send is logged and swallowed,
//! never surfaced to the state machine.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Characters the Telegram MarkdownV2 dialect requires escaping.
const MARKDOWN_V2_RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message, optionally with a link to the monitored table.
    async fn notify(&self, text: &str, link: Option<&str>);
}

/// Telegram Bot API adapter.
pub struct TelegramNotifier {
    client: reqwest::Client,
    url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("https://api.telegram.org/bot{}/sendMessage", bot_token),
            chat_id: chat_id.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str, link: Option<&str>) {
        let mut body = json!({
            "chat_id": self.chat_id,
            "text": escape_markdown_v2(text),
            "parse_mode": "MarkdownV2",
        });

        if let Some(link) = link {
            body["reply_markup"] = json!({
                "inline_keyboard": [[{ "text": "Open table", "url": link }]],
            });
        }

        let sent = self.client.post(&self.url).json(&body).send().await;
        match sent.and_then(|r| r.error_for_status()) {
            Ok(_) => log::debug!("📨 Notification delivered"),
            Err(e) => log::warn!("Notification failed (dropped): {}", e),
        }
    }
}

/// Log-only notifier for dry runs and local development.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str, link: Option<&str>) {
        match link {
            Some(link) => log::info!("📣 {} [{}]", text, link),
            None => log::info!("📣 {}", text),
        }
    }
}

/// Escape a message for Telegram MarkdownV2.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_V2_RESERVED.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
