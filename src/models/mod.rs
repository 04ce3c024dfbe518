use std::fmt;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// External feed a news item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    HackerNews,
    GeekNews,
    GitHub,
    ProductHunt,
}

impl Source {
    pub fn tag(self) -> &'static str {
        match self {
            Source::HackerNews => "hackernews",
            Source::GeekNews => "geeknews",
            Source::GitHub => "github",
            Source::ProductHunt => "producthunt",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Source::HackerNews => "🔶",
            Source::GeekNews => "🇰🇷",
            Source::GitHub => "🐙",
            Source::ProductHunt => "🚀",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A digest run slot. Scheduled runs use morning/evening; interactive
/// re-summarization is tagged manual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Batch {
    Morning,
    Evening,
    Manual,
}

impl Batch {
    pub fn as_str(self) -> &'static str {
        match self {
            Batch::Morning => "morning",
            Batch::Evening => "evening",
            Batch::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Batch> {
        match s {
            "morning" => Some(Batch::Morning),
            "evening" => Some(Batch::Evening),
            "manual" => Some(Batch::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sibling URL folded into a kept item during deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedLink {
    pub url: String,
    pub source: Source,
}

/// A freshly fetched news item, not yet persisted.
#[derive(Debug, Clone)]
pub struct NewsItem {
    pub source: Source,
    pub url: String,
    pub title: String,
    pub content: Option<String>,
    pub related: Vec<RelatedLink>,
}

impl NewsItem {
    pub fn new(
        source: Source,
        url: impl Into<String>,
        title: impl Into<String>,
        content: Option<String>,
    ) -> Self {
        Self {
            source,
            url: url.into(),
            title: title.into(),
            content,
            related: Vec::new(),
        }
    }
}

/// Persisted article row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub source: String,
    pub url: String,
    pub title: String,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Persisted summary row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: i64,
    pub article_id: i64,
    pub summary_text: String,
    pub batch: String,
    pub created_at: DateTime<Utc>,
}

/// Bookmark listing row joined with its article and latest summary.
#[derive(Debug, Clone)]
pub struct BookmarkEntry {
    pub bookmark_id: i64,
    pub bookmarked_at: DateTime<Utc>,
    pub article_id: i64,
    pub source: String,
    pub url: String,
    pub title: String,
    pub summary_text: Option<String>,
}

/// Summary search result row.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub article_id: i64,
    pub source: String,
    pub url: String,
    pub title: String,
    pub summary_text: String,
    pub batch: String,
    pub created_at: DateTime<Utc>,
}

/// Morning/evening digest times, stored in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTimes {
    pub morning: NaiveTime,
    pub evening: NaiveTime,
}

impl Default for ScheduleTimes {
    fn default() -> Self {
        Self {
            morning: NaiveTime::from_hms_opt(8, 0, 0).expect("valid time"),
            evening: NaiveTime::from_hms_opt(20, 0, 0).expect("valid time"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_round_trips_through_str() {
        for batch in [Batch::Morning, Batch::Evening, Batch::Manual] {
            assert_eq!(Batch::parse(batch.as_str()), Some(batch));
        }
        assert_eq!(Batch::parse("nightly"), None);
    }

    #[test]
    fn source_tags_are_distinct() {
        let tags = [
            Source::HackerNews.tag(),
            Source::GeekNews.tag(),
            Source::GitHub.tag(),
            Source::ProductHunt.tag(),
        ];
        for (i, a) in tags.iter().enumerate() {
            for b in &tags[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
