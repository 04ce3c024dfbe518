use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{NewsItem, Source};

use super::client::SourceClient;
use super::token::TokenCache;
use super::NewsFetcher;

const PRODUCTHUNT_GRAPHQL_URL: &str = "https://api.producthunt.com/v2/api/graphql";

const POSTS_QUERY: &str = r#"
query GetPosts($first: Int!) {
    posts(first: $first, order: VOTES) {
        edges {
            node {
                name
                tagline
                url
                votesCount
            }
        }
    }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<PostsData>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PostsData {
    posts: PostConnection,
}

#[derive(Debug, Deserialize)]
struct PostConnection {
    edges: Vec<PostEdge>,
}

#[derive(Debug, Deserialize)]
struct PostEdge {
    node: Post,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Post {
    name: String,
    #[serde(default)]
    tagline: Option<String>,
    url: String,
    #[serde(default)]
    votes_count: u64,
}

/// Top Product Hunt launches by votes via the GraphQL API, authorized
/// with a client-credentials bearer token.
pub struct ProductHuntFetcher {
    http: SourceClient,
    tokens: TokenCache,
}

impl ProductHuntFetcher {
    pub fn new(tokens: TokenCache) -> Self {
        Self {
            http: SourceClient::new(Source::ProductHunt),
            tokens,
        }
    }
}

fn post_item(post: Post) -> Option<NewsItem> {
    if post.name.is_empty() || post.url.is_empty() {
        return None;
    }

    let mut content_parts = Vec::new();
    if let Some(tagline) = post.tagline.filter(|t| !t.is_empty()) {
        content_parts.push(tagline);
    }
    if post.votes_count > 0 {
        content_parts.push(format!("Votes: {}", post.votes_count));
    }
    let content = if content_parts.is_empty() {
        None
    } else {
        Some(content_parts.join(" | "))
    };

    Some(NewsItem::new(Source::ProductHunt, post.url, post.name, content))
}

#[async_trait]
impl NewsFetcher for ProductHuntFetcher {
    fn source(&self) -> Source {
        Source::ProductHunt
    }

    async fn fetch(&self, limit: usize) -> Result<Vec<NewsItem>> {
        let token = self.tokens.access_token().await.ok_or_else(|| {
            AppError::fetch(
                self.source(),
                "failed to get access token; check Product Hunt client credentials",
            )
        })?;

        let payload = serde_json::json!({
            "query": POSTS_QUERY,
            "variables": { "first": limit },
        });
        let response: GraphQlResponse = self
            .http
            .post_json(PRODUCTHUNT_GRAPHQL_URL, &payload, Some(&token))
            .await?;

        if let Some(errors) = &response.errors {
            let message = errors
                .first()
                .map(|e| e.message.as_str())
                .unwrap_or("unknown GraphQL error");
            return Err(AppError::fetch(self.source(), format!("GraphQL error: {message}")));
        }

        let items: Vec<NewsItem> = response
            .data
            .map(|d| d.posts.edges)
            .unwrap_or_default()
            .into_iter()
            .take(limit)
            .filter_map(|edge| post_item(edge.node))
            .collect();

        tracing::info!("[{}] fetched {} items", self.source(), items.len());
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posts_parse_into_items() {
        let body = r#"{"data":{"posts":{"edges":[
            {"node":{"name":"Shippy","tagline":"Ship faster","url":"https://producthunt.com/posts/shippy","votesCount":321}},
            {"node":{"name":"","tagline":"nameless","url":"https://producthunt.com/posts/x","votesCount":1}},
            {"node":{"name":"Quiet","url":"https://producthunt.com/posts/quiet"}}
        ]}}}"#;
        let response: GraphQlResponse = serde_json::from_str(body).unwrap();

        let items: Vec<NewsItem> = response
            .data
            .unwrap()
            .posts
            .edges
            .into_iter()
            .filter_map(|edge| post_item(edge.node))
            .collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Shippy");
        assert_eq!(items[0].content.as_deref(), Some("Ship faster | Votes: 321"));
        assert_eq!(items[1].title, "Quiet");
        assert_eq!(items[1].content, None);
    }

    #[test]
    fn graphql_errors_deserialize() {
        let body = r#"{"errors":[{"message":"rate limited"}]}"#;
        let response: GraphQlResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.errors.unwrap()[0].message, "rate limited");
        assert!(response.data.is_none());
    }
}
