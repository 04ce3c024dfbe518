use async_trait::async_trait;
use feed_rs::parser;

use crate::error::{AppError, Result};
use crate::models::{NewsItem, Source};

use super::client::SourceClient;
use super::NewsFetcher;

const GEEKNEWS_RSS_URL: &str = "https://news.hada.io/rss/news";

/// GeekNews (news.hada.io) via its RSS feed. Entries map 1:1 to items;
/// a feed that fails to parse fails the whole call.
pub struct GeekNewsFetcher {
    http: SourceClient,
}

impl GeekNewsFetcher {
    pub fn new() -> Self {
        Self {
            http: SourceClient::new(Source::GeekNews),
        }
    }
}

fn entry_item(entry: feed_rs::model::Entry) -> NewsItem {
    let url = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_default();
    let title = entry
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| "Untitled".to_string());
    let content = entry
        .summary
        .and_then(|s| html2text::from_read(s.content.as_bytes(), 80).ok());

    NewsItem::new(Source::GeekNews, url, title, content)
}

impl Default for GeekNewsFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NewsFetcher for GeekNewsFetcher {
    fn source(&self) -> Source {
        Source::GeekNews
    }

    async fn fetch(&self, limit: usize) -> Result<Vec<NewsItem>> {
        let body = self.http.get_text(GEEKNEWS_RSS_URL).await?;

        let feed = parser::parse(body.as_bytes())
            .map_err(|e| AppError::fetch_with(self.source(), "failed to parse RSS feed", e))?;

        let items: Vec<NewsItem> = feed
            .entries
            .into_iter()
            .take(limit)
            .map(entry_item)
            .collect();

        tracing::info!("[{}] fetched {} items", self.source(), items.len());
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>GeekNews</title>
    <link>https://news.hada.io</link>
    <item>
      <title>Rust 2.0 announced</title>
      <link>https://news.hada.io/topic?id=1</link>
      <description>&lt;p&gt;Big &lt;b&gt;release&lt;/b&gt; notes&lt;/p&gt;</description>
    </item>
    <item>
      <title>Second story</title>
      <link>https://news.hada.io/topic?id=2</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn entries_map_to_items_with_text_content() {
        let feed = parser::parse(FEED.as_bytes()).unwrap();
        let items: Vec<NewsItem> = feed.entries.into_iter().map(entry_item).collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Rust 2.0 announced");
        assert_eq!(items[0].url, "https://news.hada.io/topic?id=1");
        let content = items[0].content.as_deref().unwrap();
        assert!(content.contains("release"));
        assert!(!content.contains("<p>"));
        assert_eq!(items[1].content, None);
    }

    #[test]
    fn garbage_input_is_a_parse_error() {
        assert!(parser::parse("not xml".as_bytes()).is_err());
    }
}
