use std::collections::{HashMap, HashSet, VecDeque};

use url::Url;

use crate::db::Repository;
use crate::error::Result;
use crate::models::{NewsItem, RelatedLink, Source};

/// Cap on items per digest after deduplication and balancing.
pub const ITEMS_PER_DIGEST: usize = 10;

/// Canonical form used as dedup identity: lowercase scheme and host,
/// trailing slashes stripped from the path (an empty path becomes "/"),
/// fragment dropped, query kept. Unparsable input is returned trimmed.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let Ok(parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    let mut normalized = format!("{}://", parsed.scheme());
    if let Some(host) = parsed.host_str() {
        normalized.push_str(host);
    }
    if let Some(port) = parsed.port() {
        normalized.push(':');
        normalized.push_str(&port.to_string());
    }
    let path = parsed.path().trim_end_matches('/');
    if path.is_empty() {
        normalized.push('/');
    } else {
        normalized.push_str(path);
    }
    if let Some(query) = parsed.query() {
        normalized.push('?');
        normalized.push_str(query);
    }
    normalized
}

/// Fold duplicate URLs, keeping the first occurrence and collecting the
/// rest as related links on it. Items whose normalized URL is in
/// `exclude` are dropped entirely. Output preserves first-seen order.
pub fn deduplicate(items: Vec<NewsItem>, exclude: &HashSet<String>) -> Vec<NewsItem> {
    let total = items.len();
    let mut kept_index: HashMap<String, usize> = HashMap::new();
    let mut result: Vec<NewsItem> = Vec::new();

    for item in items {
        if item.url.is_empty() {
            continue;
        }

        let normalized = normalize_url(&item.url);

        if exclude.contains(&normalized) {
            tracing::debug!("skipping already-sent URL: {}", item.url);
            continue;
        }

        match kept_index.get(&normalized) {
            Some(&idx) => {
                tracing::debug!("duplicate found: {} (source: {})", item.url, item.source);
                result[idx].related.push(RelatedLink {
                    url: item.url,
                    source: item.source,
                });
            }
            None => {
                kept_index.insert(normalized, result.len());
                result.push(item);
            }
        }
    }

    tracing::info!("deduplicated {total} items to {} unique items", result.len());
    result
}

/// Round-robin selection across sources so no single source dominates
/// when there are more candidates than the cap. Groups keep first-seen
/// order; input is returned unchanged when it already fits.
pub fn select_balanced(items: Vec<NewsItem>, limit: usize) -> Vec<NewsItem> {
    if items.len() <= limit {
        return items;
    }

    let mut groups: Vec<(Source, VecDeque<NewsItem>)> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|(source, _)| *source == item.source) {
            Some((_, group)) => group.push_back(item),
            None => groups.push((item.source, VecDeque::from([item]))),
        }
    }

    let source_count = groups.len();
    let mut selected = Vec::with_capacity(limit);
    while selected.len() < limit {
        let mut took_any = false;
        for (_, group) in groups.iter_mut() {
            if selected.len() >= limit {
                break;
            }
            if let Some(item) = group.pop_front() {
                selected.push(item);
                took_any = true;
            }
        }
        if !took_any {
            break;
        }
    }

    tracing::info!(
        "selected {} items balanced across {source_count} sources",
        selected.len()
    );
    selected
}

/// Full selection pass for one digest run: drop everything already
/// summarized today (any batch), fold duplicates, cap to a balanced
/// subset.
pub async fn prepare_batch(repo: &Repository, raw: Vec<NewsItem>) -> Result<Vec<NewsItem>> {
    let exclude: HashSet<String> = repo
        .todays_sent_urls()
        .await?
        .iter()
        .map(|url| normalize_url(url))
        .collect();
    tracing::info!("excluding {} URLs already sent today", exclude.len());

    let unique = deduplicate(raw, &exclude);
    Ok(select_balanced(unique, ITEMS_PER_DIGEST))
}
