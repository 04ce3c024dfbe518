use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::models::Source;

const USER_AGENT_STRING: &str = "digest-bot/0.1";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

const MAX_RETRIES: u32 = 2;
const BACKOFF_BASE_SECS: u64 = 2;

/// HTTP client shared by every call a fetcher makes, tagged with its
/// source so failures identify their origin.
pub struct SourceClient {
    client: Client,
    origin: Source,
}

impl SourceClient {
    pub fn new(origin: Source) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(USER_AGENT_STRING)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, origin }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.execute_with_retry(self.client.get(url)).await?;
        response
            .json()
            .await
            .map_err(|e| AppError::fetch_with(self.origin, format!("invalid JSON from {url}"), e))
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.execute_with_retry(self.client.get(url)).await?;
        response
            .text()
            .await
            .map_err(|e| AppError::fetch_with(self.origin, format!("failed to read {url}"), e))
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
        bearer: Option<&str>,
    ) -> Result<T> {
        let mut request = self.client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = self.execute_with_retry(request).await?;
        response
            .json()
            .await
            .map_err(|e| AppError::fetch_with(self.origin, format!("invalid JSON from {url}"), e))
    }

    /// Send a request with bounded retries and exponential backoff.
    /// Any status >= 400 counts as a failed attempt, as do timeouts and
    /// transport errors.
    async fn execute_with_retry(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let mut last_error: Option<reqwest::Error> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BACKOFF_BASE_SECS.pow(attempt);
                tracing::warn!(
                    "[{}] retry attempt {attempt}/{MAX_RETRIES}, waiting {delay}s",
                    self.origin
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }

            let Some(request) = request.try_clone() else {
                return Err(AppError::fetch(self.origin, "request body is not retryable"));
            };

            match request.send().await.and_then(|r| r.error_for_status()) {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::warn!(
                        "[{}] request error (attempt {}/{}): {e}",
                        self.origin,
                        attempt + 1,
                        MAX_RETRIES + 1
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(AppError::Fetch {
            origin: self.origin,
            message: format!("failed after {} attempts", MAX_RETRIES + 1),
            cause: last_error.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Port 9 (discard) is closed in practice; connections are refused
    // immediately, and the paused clock fast-forwards the backoff sleeps.
    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_a_tagged_fetch_error() {
        let client = SourceClient::new(Source::HackerNews);
        let err = client.get_text("http://127.0.0.1:9/").await.unwrap_err();

        match err {
            AppError::Fetch { origin, message, cause } => {
                assert_eq!(origin, Source::HackerNews);
                assert!(message.contains("3 attempts"), "message: {message}");
                assert!(cause.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn json_requests_fail_the_same_way() {
        let client = SourceClient::new(Source::GitHub);
        let err = client
            .get_json::<serde_json::Value>("http://127.0.0.1:9/")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Fetch { origin: Source::GitHub, .. }));
    }
}
