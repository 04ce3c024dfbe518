use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;

use crate::error::Result;
use crate::models::{NewsItem, Source};

use super::client::SourceClient;
use super::NewsFetcher;

const TOP_STORIES_URL: &str = "https://hacker-news.firebaseio.com/v0/topstories.json";
const ITEM_URL_BASE: &str = "https://hacker-news.firebaseio.com/v0/item";
const CONCURRENT_STORY_FETCHES: usize = 5;

#[derive(Debug, Deserialize)]
struct Story {
    id: u64,
    title: Option<String>,
    url: Option<String>,
    text: Option<String>,
}

/// Top stories from Hacker News via the Firebase REST API: one ranked
/// id list, then a concurrent detail fetch per story.
pub struct HackerNewsFetcher {
    http: SourceClient,
}

impl HackerNewsFetcher {
    pub fn new() -> Self {
        Self {
            http: SourceClient::new(Source::HackerNews),
        }
    }

    async fn fetch_story(&self, story_id: u64) -> Result<Option<NewsItem>> {
        // the item endpoint returns JSON null for dead or missing ids
        let story: Option<Story> = self
            .http
            .get_json(&format!("{ITEM_URL_BASE}/{story_id}.json"))
            .await?;
        Ok(story.map(story_item))
    }
}

fn story_item(story: Story) -> NewsItem {
    let url = story
        .url
        .unwrap_or_else(|| format!("https://news.ycombinator.com/item?id={}", story.id));
    NewsItem::new(
        Source::HackerNews,
        url,
        story.title.unwrap_or_default(),
        story.text,
    )
}

impl Default for HackerNewsFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NewsFetcher for HackerNewsFetcher {
    fn source(&self) -> Source {
        Source::HackerNews
    }

    async fn fetch(&self, limit: usize) -> Result<Vec<NewsItem>> {
        let story_ids: Vec<u64> = self.http.get_json(TOP_STORIES_URL).await?;

        // a story that fails to resolve is dropped, not fatal to the batch
        let items: Vec<NewsItem> = stream::iter(story_ids.into_iter().take(limit))
            .map(|story_id| async move {
                match self.fetch_story(story_id).await {
                    Ok(item) => item,
                    Err(e) => {
                        tracing::warn!("[{}] failed to fetch story {story_id}: {e}", self.source());
                        None
                    }
                }
            })
            .buffered(CONCURRENT_STORY_FETCHES)
            .filter_map(|item| async { item })
            .collect()
            .await;

        tracing::info!("[{}] fetched {} items", self.source(), items.len());
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_without_url_links_to_its_comments_page() {
        let story = Story {
            id: 42,
            title: Some("Ask HN: anything".into()),
            url: None,
            text: Some("body".into()),
        };
        let item = story_item(story);
        assert_eq!(item.url, "https://news.ycombinator.com/item?id=42");
        assert_eq!(item.source, Source::HackerNews);
        assert_eq!(item.content.as_deref(), Some("body"));
    }

    #[test]
    fn story_with_url_keeps_it() {
        let story = Story {
            id: 7,
            title: Some("A story".into()),
            url: Some("https://example.com/post".into()),
            text: None,
        };
        assert_eq!(story_item(story).url, "https://example.com/post");
    }
}
