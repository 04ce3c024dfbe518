use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::NewsItem;

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-3-5-haiku-20241022";

const SUMMARIZE_TIMEOUT_SECS: u64 = 120;
const MAX_CONTENT_CHARS: usize = 10_000;
const RETRY_DELAYS_SECS: [u64; 3] = [2, 4, 8];

const SYSTEM_PROMPT: &str = r#"You summarise tech news for software developers in British English.
Write 5-7 sentences covering the key facts, then:

## Insights
- key insights for software developers

## Action Items
- actionable recommendations

## Vocabulary
- difficult words with short definitions"#;

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    content_type: String,
    text: Option<String>,
}

pub struct Summarizer {
    client: Client,
    api_key: Option<String>,
}

impl Summarizer {
    pub fn new(api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(SUMMARIZE_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, api_key }
    }

    /// Summarize one item, retrying a bounded number of times on failed
    /// or empty responses. The caller decides what to do when every
    /// attempt fails.
    pub async fn summarize(&self, item: &NewsItem) -> Result<String> {
        let Some(api_key) = &self.api_key else {
            return Err(AppError::ClaudeApi("api key not configured".to_string()));
        };

        let total_attempts = RETRY_DELAYS_SECS.len() + 1;
        for attempt in 0..total_attempts {
            match self.generate(api_key, item).await {
                Ok(text) if !text.trim().is_empty() => return Ok(text),
                Ok(_) => tracing::warn!(
                    "summarizer returned empty output (attempt {}/{total_attempts})",
                    attempt + 1
                ),
                Err(e) => tracing::warn!(
                    "summarizer call failed (attempt {}/{total_attempts}): {e}",
                    attempt + 1
                ),
            }

            if attempt < RETRY_DELAYS_SECS.len() {
                tokio::time::sleep(Duration::from_secs(RETRY_DELAYS_SECS[attempt])).await;
            }
        }

        Err(AppError::ClaudeApi(format!(
            "no summary after {total_attempts} attempts"
        )))
    }

    async fn generate(&self, api_key: &str, item: &NewsItem) -> Result<String> {
        let content: String = item
            .content
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(MAX_CONTENT_CHARS)
            .collect();

        let user_message = format!(
            "Summarise the following tech news item:\n\nTitle: {}\nURL: {}\nContent:\n{}",
            item.title, item.url, content
        );

        let request = MessageRequest {
            model: CLAUDE_MODEL.to_string(),
            max_tokens: 1024,
            messages: vec![Message {
                role: "user".to_string(),
                content: user_message,
            }],
            system: Some(SYSTEM_PROMPT.to_string()),
        };

        let response = self
            .client
            .post(CLAUDE_API_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::ClaudeApi(format!("API error: {}", error_text)));
        }

        let message_response: MessageResponse = response.json().await?;

        let summary = message_response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;

    #[tokio::test]
    async fn missing_api_key_fails_fast() {
        let summarizer = Summarizer::new(None);
        let item = NewsItem::new(Source::HackerNews, "https://example.com", "t", None);
        let err = summarizer.summarize(&item).await.unwrap_err();
        assert!(matches!(err, AppError::ClaudeApi(_)));
    }

    #[test]
    fn response_text_blocks_join() {
        let body = r#"{"content":[
            {"type":"text","text":"first"},
            {"type":"tool_use"},
            {"type":"text","text":"second"}
        ]}"#;
        let response: MessageResponse = serde_json::from_str(body).unwrap();
        let summary = response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(summary, "first\nsecond");
    }
}
