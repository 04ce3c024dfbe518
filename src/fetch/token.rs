use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::Source;

const TOKEN_URL: &str = "https://api.producthunt.com/v2/oauth/token";
const TOKEN_TIMEOUT_SECS: u64 = 10;
const EXPIRY_MARGIN_SECS: u64 = 60;
const DEFAULT_EXPIRES_IN_SECS: u64 = 86_400;

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Client-credentials token cache for the Product Hunt API. Holds one
/// token slot, refreshed lazily when the cached token is within the
/// safety margin of its expiry.
pub struct TokenCache {
    client: Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(client_id: Option<String>, client_secret: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(TOKEN_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            client_id,
            client_secret,
            cached: Mutex::new(None),
        }
    }

    /// Return a valid bearer token, refreshing if needed. A failed
    /// refresh leaves the slot untouched and yields None.
    pub async fn access_token(&self) -> Option<String> {
        let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret)
        else {
            tracing::error!(
                "Product Hunt client credentials not configured; set producthunt_client_id and producthunt_client_secret"
            );
            return None;
        };

        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.expires_at) {
            tracing::debug!("using cached Product Hunt access token");
            return Some(token.access_token.clone());
        }

        tracing::debug!("fetching new Product Hunt access token");
        match self.fetch_token(client_id, client_secret).await {
            Ok((access_token, expires_in)) => {
                *cached = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at: expires_at_for(expires_in),
                });
                tracing::info!("obtained Product Hunt access token (expires in {expires_in}s)");
                Some(access_token)
            }
            Err(e) => {
                tracing::error!("failed to obtain Product Hunt access token: {e}");
                None
            }
        }
    }

    async fn fetch_token(&self, client_id: &str, client_secret: &str) -> Result<(String, u64)> {
        let response = self
            .client
            .post(TOKEN_URL)
            .json(&TokenRequest {
                client_id,
                client_secret,
                grant_type: "client_credentials",
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::fetch(
                Source::ProductHunt,
                format!("token endpoint returned HTTP {}", response.status()),
            ));
        }

        let body: TokenResponse = response.json().await?;
        let access_token = body
            .access_token
            .ok_or_else(|| AppError::fetch(Source::ProductHunt, "no access_token in token response"))?;

        Ok((access_token, body.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)))
    }
}

fn expires_at_for(expires_in: u64) -> Instant {
    Instant::now() + Duration::from_secs(expires_in.saturating_sub(EXPIRY_MARGIN_SECS))
}
