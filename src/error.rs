use thiserror::Error;

use crate::models::Source;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Config(String),

    /// A source fetch that failed after exhausting its retries.
    #[error("[{origin}] {message}")]
    Fetch {
        origin: Source,
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("another digest run is already in progress")]
    AlreadyRunning,

    #[error("Claude API error: {0}")]
    ClaudeApi(String),

    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("invalid selector: {0}")]
    Selector(String),
}

impl AppError {
    pub fn fetch(origin: Source, message: impl Into<String>) -> Self {
        AppError::Fetch {
            origin,
            message: message.into(),
            cause: None,
        }
    }

    pub fn fetch_with(
        origin: Source,
        message: impl Into<String>,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        AppError::Fetch {
            origin,
            message: message.into(),
            cause: Some(cause.into()),
        }
    }
}
