mod lock;

pub use lock::DigestLock;

use std::path::PathBuf;
use std::time::Duration;

use futures::future;

use crate::ai::Summarizer;
use crate::db::Repository;
use crate::dedup::prepare_batch;
use crate::error::{AppError, Result};
use crate::fetch::NewsFetcher;
use crate::models::{Batch, NewsItem};
use crate::services::{article_keyboard, TelegramClient};

const ITEMS_PER_SOURCE: usize = 10;
const SEND_DELAY: Duration = Duration::from_secs(1);
const FALLBACK_SUMMARY: &str = "No summary could be generated for this item.";

/// Runs one digest batch end to end: fetch from every source, dedup and
/// balance, then persist, summarize, and deliver item by item.
pub struct DigestRunner {
    repo: Repository,
    fetchers: Vec<Box<dyn NewsFetcher>>,
    summarizer: Summarizer,
    telegram: TelegramClient,
    lock_path: PathBuf,
}

impl DigestRunner {
    pub fn new(
        repo: Repository,
        fetchers: Vec<Box<dyn NewsFetcher>>,
        summarizer: Summarizer,
        telegram: TelegramClient,
        lock_path: PathBuf,
    ) -> Self {
        Self {
            repo,
            fetchers,
            summarizer,
            telegram,
            lock_path,
        }
    }

    /// At most one digest runs per host at a time; a run that finds the
    /// lock held bows out quietly.
    pub async fn run(&self, batch: Batch) -> Result<()> {
        let _lock = match DigestLock::try_acquire(&self.lock_path) {
            Ok(lock) => lock,
            Err(AppError::AlreadyRunning) => {
                tracing::warn!("another digest run is in progress, skipping {batch} digest");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        tracing::info!("starting {batch} digest");

        let raw = self.fetch_all_sources(ITEMS_PER_SOURCE).await;
        if raw.is_empty() {
            tracing::warn!("no items fetched from any source, aborting {batch} digest");
            return Ok(());
        }

        let selected = prepare_batch(&self.repo, raw).await?;
        if selected.is_empty() {
            tracing::warn!("no items left after deduplication, aborting {batch} digest");
            return Ok(());
        }

        let total = selected.len();
        tracing::info!("processing {total} items for {batch} digest");

        self.telegram
            .send_message(&format_digest_header(batch, total), None)
            .await?;

        for (idx, item) in selected.iter().enumerate() {
            let position = idx + 1;

            let article_id = match self.repo.insert_item(item).await {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!("failed to persist item {}: {e}", item.url);
                    continue;
                }
            };

            let summary = match self.summarizer.summarize(item).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("falling back to placeholder summary for {}: {e}", item.url);
                    FALLBACK_SUMMARY.to_string()
                }
            };

            if let Err(e) = self.repo.insert_summary(article_id, &summary, batch).await {
                tracing::error!("failed to persist summary for article {article_id}: {e}");
            }

            let message = format_digest_item(item, &summary, position, total);
            if let Err(e) = self
                .telegram
                .send_message(&message, Some(article_keyboard(article_id)))
                .await
            {
                tracing::error!("failed to deliver item {position}/{total}: {e}");
            }

            tokio::time::sleep(SEND_DELAY).await;
        }

        tracing::info!("completed {batch} digest: sent {total} items");
        Ok(())
    }

    /// Fan out to every source concurrently and keep whatever succeeds.
    /// One source failing only costs that source's items.
    async fn fetch_all_sources(&self, limit: usize) -> Vec<NewsItem> {
        let fetches = self
            .fetchers
            .iter()
            .map(|fetcher| async move { (fetcher.source(), fetcher.fetch(limit).await) });

        let mut all_items = Vec::new();
        for (source, result) in future::join_all(fetches).await {
            match result {
                Ok(items) => {
                    tracing::info!("[{source}] contributed {} items", items.len());
                    all_items.extend(items);
                }
                Err(e) => tracing::error!("[{source}] fetch failed: {e}"),
            }
        }
        all_items
    }
}

fn format_digest_header(batch: Batch, total: usize) -> String {
    let title = match batch {
        Batch::Morning => "🌅 Morning Tech Digest",
        Batch::Evening => "🌙 Evening Tech Digest",
        Batch::Manual => "📰 Tech Digest",
    };
    format!("<b>{title}</b>\n\n📰 {total} stories summarized for you.")
}

fn format_digest_item(item: &NewsItem, summary: &str, position: usize, total: usize) -> String {
    let emoji = item.source.emoji();

    let related_line = if item.related.is_empty() {
        String::new()
    } else {
        let sources: Vec<&str> = item.related.iter().map(|r| r.source.tag()).collect();
        format!("\n🔗 Also on: {}", sources.join(", "))
    };

    format!(
        "<b>{emoji} [{position}/{total}] {title}</b>\n\n{summary}\n{related_line}\n🔗 <a href=\"{url}\">Read the original</a>",
        title = item.title,
        url = item.url,
    )
}
