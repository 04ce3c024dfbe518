use std::fmt;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{NewsItem, Source};

use super::client::SourceClient;
use super::NewsFetcher;

const OSSINSIGHT_API_URL: &str = "https://api.ossinsight.io/v1/trends/repos";
const GITHUB_TRENDING_URL: &str = "https://github.com/trending";

#[derive(Debug, Deserialize)]
struct TrendsResponse {
    data: TrendsData,
}

#[derive(Debug, Deserialize)]
struct TrendsData {
    rows: Vec<TrendingRepo>,
}

#[derive(Debug, Deserialize)]
struct TrendingRepo {
    repo_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    primary_language: Option<String>,
    #[serde(default)]
    stars: Option<StarCount>,
}

// the trends API is inconsistent about numeric vs string star counts
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StarCount {
    Text(String),
    Number(u64),
}

impl fmt::Display for StarCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StarCount::Text(s) => f.write_str(s),
            StarCount::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Trending GitHub repositories. Tries the OSS Insight API first and
/// falls back to scraping the public trending page on any failure.
pub struct GitHubFetcher {
    http: SourceClient,
}

impl GitHubFetcher {
    pub fn new() -> Self {
        Self {
            http: SourceClient::new(Source::GitHub),
        }
    }

    async fn fetch_from_api(&self, limit: usize) -> Result<Vec<NewsItem>> {
        let url = format!("{OSSINSIGHT_API_URL}?period=past_week&language=All");
        let response: TrendsResponse = self.http.get_json(&url).await?;

        if response.data.rows.is_empty() {
            return Err(AppError::fetch(self.source(), "trends API returned no rows"));
        }

        let items: Vec<NewsItem> = response
            .data
            .rows
            .into_iter()
            .take(limit)
            .map(api_repo_item)
            .collect();

        tracing::info!("[{}] fetched {} items from trends API", self.source(), items.len());
        Ok(items)
    }

    async fn fetch_from_scraping(&self, limit: usize) -> Result<Vec<NewsItem>> {
        let html = self.http.get_text(GITHUB_TRENDING_URL).await?;
        let items = parse_trending(&html, limit)?;

        tracing::info!("[{}] fetched {} items from scraping", self.source(), items.len());
        Ok(items)
    }
}

fn api_repo_item(repo: TrendingRepo) -> NewsItem {
    let url = format!("https://github.com/{}", repo.repo_name);
    let content = join_content_parts([
        repo.description,
        repo.primary_language.map(|l| format!("Language: {l}")),
        repo.stars.map(|s| format!("Stars: {s}")),
    ]);
    NewsItem::new(Source::GitHub, url, repo.repo_name, content)
}

fn parse_trending(html: &str, limit: usize) -> Result<Vec<NewsItem>> {
    let document = Html::parse_document(html);
    let row_sel = selector("article.Box-row")?;
    let title_sel = selector("h2 a")?;
    let description_sel = selector("p")?;
    let language_sel = selector(r#"[itemprop="programmingLanguage"]"#)?;
    let stars_sel = selector(r#"a[href$="/stargazers"]"#)?;

    let mut items = Vec::new();
    for row in document.select(&row_sel).take(limit) {
        let Some(href) = row
            .select(&title_sel)
            .next()
            .and_then(|link| link.value().attr("href"))
            .map(str::trim)
        else {
            continue;
        };

        let repo_name = href.trim_start_matches('/').to_string();
        let url = format!("https://github.com{href}");

        let description = row.select(&description_sel).next().map(element_text);
        let language = row.select(&language_sel).next().map(element_text);
        let stars = row.select(&stars_sel).next().map(element_text);

        let content = join_content_parts([
            description,
            language.map(|l| format!("Language: {l}")),
            stars.map(|s| format!("Stars: {s}")),
        ]);

        items.push(NewsItem::new(Source::GitHub, url, repo_name, content));
    }

    Ok(items)
}

fn element_text(element: scraper::ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_content_parts<const N: usize>(parts: [Option<String>; N]) -> Option<String> {
    let parts: Vec<String> = parts
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AppError::Selector(format!("{css}: {e}")))
}

impl Default for GitHubFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NewsFetcher for GitHubFetcher {
    fn source(&self) -> Source {
        Source::GitHub
    }

    async fn fetch(&self, limit: usize) -> Result<Vec<NewsItem>> {
        match self.fetch_from_api(limit).await {
            Ok(items) => Ok(items),
            Err(e) => {
                tracing::warn!("[{}] trends API failed, trying scraping: {e}", self.source());
                self.fetch_from_scraping(limit).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRENDING_HTML: &str = r#"<html><body>
<article class="Box-row">
  <h2><a href="/rust-lang/rust">rust-lang / rust</a></h2>
  <p>
    Empowering everyone to build reliable software.
  </p>
  <span itemprop="programmingLanguage">Rust</span>
  <a href="/rust-lang/rust/stargazers">

    101,262
  </a>
</article>
<article class="Box-row">
  <h2><a href="/tokio-rs/tokio">tokio-rs / tokio</a></h2>
</article>
<article class="Box-row">
  <h2><a href="/serde-rs/serde">serde-rs / serde</a></h2>
</article>
</body></html>"#;

    #[test]
    fn trending_rows_become_items() {
        let items = parse_trending(TRENDING_HTML, 10).unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].url, "https://github.com/rust-lang/rust");
        assert_eq!(items[0].title, "rust-lang/rust");
        let content = items[0].content.as_deref().unwrap();
        assert!(content.contains("reliable software"));
        assert!(content.contains("Language: Rust"));
        assert!(content.contains("Stars: 101,262"));

        // rows without extras still parse
        assert_eq!(items[1].content, None);
    }

    #[test]
    fn scrape_honors_limit() {
        let items = parse_trending(TRENDING_HTML, 2).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn api_rows_deserialize_with_mixed_star_types() {
        let body = r#"{"data":{"rows":[
            {"repo_name":"a/b","description":"desc","primary_language":"Rust","stars":"1,234"},
            {"repo_name":"c/d","stars":567}
        ]}}"#;
        let response: TrendsResponse = serde_json::from_str(body).unwrap();
        let items: Vec<NewsItem> = response.data.rows.into_iter().map(api_repo_item).collect();

        assert_eq!(items[0].url, "https://github.com/a/b");
        assert_eq!(
            items[0].content.as_deref(),
            Some("desc | Language: Rust | Stars: 1,234")
        );
        assert_eq!(items[1].content.as_deref(), Some("Stars: 567"));
    }
}
