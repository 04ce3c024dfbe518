mod client;
mod geeknews;
mod github;
mod hackernews;
mod producthunt;
mod token;

pub use geeknews::GeekNewsFetcher;
pub use github::GitHubFetcher;
pub use hackernews::HackerNewsFetcher;
pub use producthunt::ProductHuntFetcher;
pub use token::TokenCache;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::Result;
use crate::models::{NewsItem, Source};

/// One external news source. The orchestrator only ever sees this
/// trait, never a concrete fetcher.
#[async_trait]
pub trait NewsFetcher: Send + Sync {
    fn source(&self) -> Source;

    /// Fetch up to `limit` items, each tagged with this fetcher's source.
    async fn fetch(&self, limit: usize) -> Result<Vec<NewsItem>>;
}

/// The full set of fetchers a digest run fans out over.
pub fn default_fetchers(config: &Config) -> Vec<Box<dyn NewsFetcher>> {
    vec![
        Box::new(HackerNewsFetcher::new()),
        Box::new(GeekNewsFetcher::new()),
        Box::new(GitHubFetcher::new()),
        Box::new(ProductHuntFetcher::new(TokenCache::new(
            config.producthunt_client_id.clone(),
            config.producthunt_client_secret.clone(),
        ))),
    ]
}
