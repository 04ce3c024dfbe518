use std::path::PathBuf;

use digest_bot::ai::Summarizer;
use digest_bot::config::Config;
use digest_bot::db::Repository;
use digest_bot::digest::DigestRunner;
use digest_bot::error::{AppError, Result};
use digest_bot::fetch::default_fetchers;
use digest_bot::models::Batch;
use digest_bot::scheduler::Scheduler;
use digest_bot::services::TelegramClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Config::load()?;
    config.validate()?;

    let repo = Repository::new(&config.db_path).await?;
    let runner = build_runner(&config, repo.clone())?;

    // one-shot mode: run a single digest and exit
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 3 && args[1] == "--digest" {
        let Some(batch) = Batch::parse(&args[2]) else {
            return Err(AppError::Config(format!(
                "unknown batch '{}': expected morning, evening or manual",
                args[2]
            )));
        };
        runner.run(batch).await?;
        return Ok(());
    }

    tracing::info!("digest bot started");
    Scheduler::new(runner, repo).run().await
}

fn build_runner(config: &Config, repo: Repository) -> Result<DigestRunner> {
    let token = config
        .telegram_bot_token
        .clone()
        .ok_or_else(|| AppError::Config("telegram_bot_token is required".to_string()))?;
    let chat_id = config
        .telegram_chat_id
        .clone()
        .ok_or_else(|| AppError::Config("telegram_chat_id is required".to_string()))?;

    Ok(DigestRunner::new(
        repo,
        default_fetchers(config),
        Summarizer::new(config.claude_api_key.clone()),
        TelegramClient::new(token, chat_id),
        PathBuf::from(&config.lock_path),
    ))
}
