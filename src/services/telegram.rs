use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Telegram truncates at 4096 chars; leave headroom for HTML entities.
const MESSAGE_CHUNK_CHARS: usize = 4000;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
    disable_web_page_preview: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Outbound-only Telegram Bot API client. Command handling and callback
/// routing live with the bot runtime, not here.
pub struct TelegramClient {
    client: Client,
    token: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(token: String, chat_id: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            token,
            chat_id,
        }
    }

    /// Send an HTML-formatted message, splitting over-long text into
    /// chunks. The keyboard, if any, rides on the final chunk.
    pub async fn send_message(
        &self,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        let chunks = split_message(text, MESSAGE_CHUNK_CHARS);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let reply_markup = if i == last { keyboard.clone() } else { None };
            let request = SendMessageRequest {
                chat_id: &self.chat_id,
                text: chunk,
                parse_mode: "HTML",
                reply_markup,
                disable_web_page_preview: true,
            };

            let response = self
                .client
                .post(format!("{TELEGRAM_API_URL}/bot{}/sendMessage", self.token))
                .json(&request)
                .send()
                .await?;

            if !response.status().is_success() {
                let error_text = response.text().await?;
                return Err(AppError::Telegram(format!("API error: {}", error_text)));
            }

            let body: ApiResponse = response.json().await?;
            if !body.ok {
                return Err(AppError::Telegram(
                    body.description
                        .unwrap_or_else(|| "unknown error".to_string()),
                ));
            }
        }

        Ok(())
    }
}

/// The fixed 2x2 action grid attached to every delivered item, keyed by
/// the persisted article id.
pub fn article_keyboard(article_id: i64) -> InlineKeyboardMarkup {
    let button = |text: &str, action: &str| InlineKeyboardButton {
        text: text.to_string(),
        callback_data: format!("{action}:{article_id}"),
    };

    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![button("📖 Details", "detail"), button("🌐 Translate", "translate")],
            vec![button("🔖 Bookmark", "bookmark"), button("🔗 Related", "related")],
        ],
    }
}

/// Split text into chunks of at most `max_chars` characters, preferring
/// paragraph breaks, then newlines, then spaces, then a hard cut.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    loop {
        if remaining.chars().count() <= max_chars {
            chunks.push(remaining.to_string());
            break;
        }

        let cut = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let window = &remaining[..cut];

        if let Some(pos) = window.rfind("\n\n").filter(|&p| p > 0) {
            chunks.push(remaining[..pos].to_string());
            remaining = &remaining[pos + 2..];
        } else if let Some(pos) = window.rfind('\n').filter(|&p| p > 0) {
            chunks.push(remaining[..pos].to_string());
            remaining = &remaining[pos + 1..];
        } else if let Some(pos) = window.rfind(' ').filter(|&p| p > 0) {
            chunks.push(remaining[..pos].to_string());
            remaining = &remaining[pos + 1..];
        } else {
            chunks.push(window.to_string());
            remaining = &remaining[cut..];
        }
    }

    chunks
}
