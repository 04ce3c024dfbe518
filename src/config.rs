use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_lock_path")]
    pub lock_path: String,

    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    pub claude_api_key: Option<String>,

    pub producthunt_client_id: Option<String>,
    pub producthunt_client_secret: Option<String>,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("digest-bot");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("digest.db").to_string_lossy().to_string()
}

fn default_lock_path() -> String {
    std::env::temp_dir()
        .join("digest-bot.lock")
        .to_string_lossy()
        .to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            lock_path: default_lock_path(),
            telegram_bot_token: None,
            telegram_chat_id: None,
            claude_api_key: None,
            producthunt_client_id: None,
            producthunt_client_secret: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("digest-bot")
            .join("config.toml")
    }

    /// Check that the settings required to deliver a digest are present.
    /// Missing credentials here are fatal at startup.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.telegram_bot_token.is_none() {
            missing.push("telegram_bot_token");
        }
        if self.telegram_chat_id.is_none() {
            missing.push("telegram_chat_id");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Config(format!(
                "missing required configuration: {}",
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_reports_all_missing_credentials() {
        let config = Config {
            telegram_bot_token: None,
            telegram_chat_id: None,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("telegram_bot_token"));
        assert!(message.contains("telegram_chat_id"));
    }

    #[test]
    fn validate_passes_with_required_credentials() {
        let config = Config {
            telegram_bot_token: Some("token".into()),
            telegram_chat_id: Some("12345".into()),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }
}
