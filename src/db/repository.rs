use chrono::{DateTime, NaiveTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Article, Batch, BookmarkEntry, NewsItem, ScheduleTimes, SearchHit, Summary};

use super::schema::SCHEMA;

const MORNING_TIME_KEY: &str = "morning_time";
const EVENING_TIME_KEY: &str = "evening_time";
const TIME_FORMAT: &str = "%H:%M";

#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Article operations

    /// Insert an item, ignoring URL collisions, and return the row id of
    /// whichever row owns that URL.
    pub async fn insert_item(&self, item: &NewsItem) -> Result<i64> {
        let source = item.source.tag().to_string();
        let url = item.url.clone();
        let title = item.title.clone();
        let content = item.content.clone();

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO articles (source, url, title, content) VALUES (?1, ?2, ?3, ?4)",
                    params![source, url, title, content],
                )?;
                let id = conn.query_row(
                    "SELECT id FROM articles WHERE url = ?1",
                    params![url],
                    |row| row.get(0),
                )?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }

    pub async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let article = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, source, url, title, content, created_at FROM articles WHERE id = ?1",
                )?;
                let article = stmt
                    .query_row(params![id], |row| Ok(article_from_row(row)))
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    // Summary operations

    pub async fn insert_summary(
        &self,
        article_id: i64,
        summary_text: &str,
        batch: Batch,
    ) -> Result<i64> {
        let summary_text = summary_text.to_string();
        let batch = batch.as_str();

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO summaries (article_id, summary_text, batch) VALUES (?1, ?2, ?3)",
                    params![article_id, summary_text, batch],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn latest_summary(&self, article_id: i64) -> Result<Option<Summary>> {
        let summary = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, article_id, summary_text, batch, created_at FROM summaries
                     WHERE article_id = ?1 ORDER BY id DESC LIMIT 1",
                )?;
                let summary = stmt
                    .query_row(params![article_id], |row| Ok(summary_from_row(row)))
                    .optional()?;
                Ok(summary)
            })
            .await?;
        Ok(summary)
    }

    /// Raw URLs of every article summarized today, any batch. Feeds the
    /// dedup engine's at-most-once-per-day exclusion.
    pub async fn todays_sent_urls(&self) -> Result<Vec<String>> {
        let urls = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT a.url FROM articles a
                     JOIN summaries s ON s.article_id = a.id
                     WHERE date(s.created_at) = date('now')",
                )?;
                let urls = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await?;
        Ok(urls)
    }

    // Bookmark operations

    /// Returns false when the (user, article) pair was already bookmarked.
    pub async fn add_bookmark(&self, user_id: &str, article_id: i64) -> Result<bool> {
        let user_id = user_id.to_string();

        let inserted = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "INSERT OR IGNORE INTO bookmarks (user_id, article_id) VALUES (?1, ?2)",
                    params![user_id, article_id],
                )?;
                Ok(n > 0)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn bookmarks_for(&self, user_id: &str) -> Result<Vec<BookmarkEntry>> {
        let user_id = user_id.to_string();

        let entries = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT b.id, b.created_at, a.id, a.source, a.url, a.title, s.summary_text
                     FROM bookmarks b
                     JOIN articles a ON b.article_id = a.id
                     LEFT JOIN summaries s
                       ON s.id = (SELECT MAX(id) FROM summaries WHERE article_id = a.id)
                     WHERE b.user_id = ?1
                     ORDER BY b.created_at DESC",
                )?;
                let entries = stmt
                    .query_map(params![user_id], |row| Ok(bookmark_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await?;
        Ok(entries)
    }

    // Search

    /// Case-insensitive keyword search over titles and summary text,
    /// newest summaries first.
    pub async fn search_summaries(&self, keyword: &str) -> Result<Vec<SearchHit>> {
        let pattern = format!("%{}%", keyword);

        let hits = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT a.id, a.source, a.url, a.title, s.summary_text, s.batch, s.created_at
                     FROM summaries s
                     JOIN articles a ON s.article_id = a.id
                     WHERE LOWER(a.title) LIKE LOWER(?1)
                        OR LOWER(s.summary_text) LIKE LOWER(?1)
                     ORDER BY s.created_at DESC",
                )?;
                let hits = stmt
                    .query_map(params![pattern], |row| Ok(search_hit_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(hits)
            })
            .await?;
        Ok(hits)
    }

    // Settings

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();

        let value = self
            .conn
            .call(move |conn| {
                let value = conn
                    .query_row(
                        "SELECT value FROM settings WHERE key = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await?;
        Ok(value)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                    params![key, value],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Digest times from settings, falling back to the defaults for any
    /// missing or unparsable entry.
    pub async fn schedule_times(&self) -> Result<ScheduleTimes> {
        let defaults = ScheduleTimes::default();
        let morning = self
            .parse_time_setting(MORNING_TIME_KEY)
            .await?
            .unwrap_or(defaults.morning);
        let evening = self
            .parse_time_setting(EVENING_TIME_KEY)
            .await?
            .unwrap_or(defaults.evening);
        Ok(ScheduleTimes { morning, evening })
    }

    pub async fn update_schedule(&self, times: ScheduleTimes) -> Result<()> {
        self.set_setting(MORNING_TIME_KEY, &times.morning.format(TIME_FORMAT).to_string())
            .await?;
        self.set_setting(EVENING_TIME_KEY, &times.evening.format(TIME_FORMAT).to_string())
            .await?;
        tracing::info!(
            "schedule updated: morning={}, evening={}",
            times.morning.format(TIME_FORMAT),
            times.evening.format(TIME_FORMAT)
        );
        Ok(())
    }

    async fn parse_time_setting(&self, key: &str) -> Result<Option<NaiveTime>> {
        let Some(value) = self.get_setting(key).await? else {
            return Ok(None);
        };
        match NaiveTime::parse_from_str(&value, TIME_FORMAT) {
            Ok(time) => Ok(Some(time)),
            Err(e) => {
                tracing::warn!("ignoring invalid {key} setting {value:?}: {e}");
                Ok(None)
            }
        }
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn datetime_column(row: &Row, idx: usize) -> DateTime<Utc> {
    row.get::<_, String>(idx)
        .ok()
        .and_then(|s| parse_datetime(&s))
        .unwrap_or_else(Utc::now)
}

fn article_from_row(row: &Row) -> Article {
    Article {
        id: row.get(0).unwrap(),
        source: row.get(1).unwrap(),
        url: row.get(2).unwrap(),
        title: row.get(3).unwrap(),
        content: row.get(4).unwrap(),
        created_at: datetime_column(row, 5),
    }
}

fn summary_from_row(row: &Row) -> Summary {
    Summary {
        id: row.get(0).unwrap(),
        article_id: row.get(1).unwrap(),
        summary_text: row.get(2).unwrap(),
        batch: row.get(3).unwrap(),
        created_at: datetime_column(row, 4),
    }
}

fn bookmark_from_row(row: &Row) -> BookmarkEntry {
    BookmarkEntry {
        bookmark_id: row.get(0).unwrap(),
        bookmarked_at: datetime_column(row, 1),
        article_id: row.get(2).unwrap(),
        source: row.get(3).unwrap(),
        url: row.get(4).unwrap(),
        title: row.get(5).unwrap(),
        summary_text: row.get(6).unwrap(),
    }
}

fn search_hit_from_row(row: &Row) -> SearchHit {
    SearchHit {
        article_id: row.get(0).unwrap(),
        source: row.get(1).unwrap(),
        url: row.get(2).unwrap(),
        title: row.get(3).unwrap(),
        summary_text: row.get(4).unwrap(),
        batch: row.get(5).unwrap(),
        created_at: datetime_column(row, 6),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;

    async fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("digest.db");
        let repo = Repository::new(db_path.to_str().unwrap()).await.unwrap();
        (dir, repo)
    }

    fn item(source: Source, url: &str, title: &str) -> NewsItem {
        NewsItem::new(source, url, title, None)
    }

    #[tokio::test]
    async fn insert_item_is_idempotent_per_url() {
        let (_dir, repo) = test_repo().await;

        let first = item(Source::HackerNews, "https://example.com/a", "first");
        let id1 = repo.insert_item(&first).await.unwrap();

        let second = item(Source::GitHub, "https://example.com/a", "second");
        let id2 = repo.insert_item(&second).await.unwrap();
        assert_eq!(id1, id2);

        let stored = repo.get_article(id1).await.unwrap().unwrap();
        assert_eq!(stored.title, "first");
        assert_eq!(stored.source, "hackernews");
    }

    #[tokio::test]
    async fn todays_sent_urls_sees_any_batch() {
        let (_dir, repo) = test_repo().await;

        let a = repo
            .insert_item(&item(Source::HackerNews, "https://example.com/a", "a"))
            .await
            .unwrap();
        let b = repo
            .insert_item(&item(Source::GeekNews, "https://example.com/b", "b"))
            .await
            .unwrap();
        repo.insert_summary(a, "morning summary", Batch::Morning)
            .await
            .unwrap();
        repo.insert_summary(b, "manual summary", Batch::Manual)
            .await
            .unwrap();

        let mut urls = repo.todays_sent_urls().await.unwrap();
        urls.sort();
        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[tokio::test]
    async fn duplicate_bookmark_is_a_no_op() {
        let (_dir, repo) = test_repo().await;

        let id = repo
            .insert_item(&item(Source::ProductHunt, "https://example.com/p", "p"))
            .await
            .unwrap();
        assert!(repo.add_bookmark("42", id).await.unwrap());
        assert!(!repo.add_bookmark("42", id).await.unwrap());
        // a different user may still bookmark the same article
        assert!(repo.add_bookmark("43", id).await.unwrap());

        let entries = repo.bookmarks_for("42").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].article_id, id);
    }

    #[tokio::test]
    async fn latest_summary_wins() {
        let (_dir, repo) = test_repo().await;

        let id = repo
            .insert_item(&item(Source::GitHub, "https://example.com/r", "repo"))
            .await
            .unwrap();
        repo.insert_summary(id, "old", Batch::Morning).await.unwrap();
        repo.insert_summary(id, "new", Batch::Manual).await.unwrap();

        let summary = repo.latest_summary(id).await.unwrap().unwrap();
        assert_eq!(summary.summary_text, "new");
        assert_eq!(summary.batch, "manual");
    }

    #[tokio::test]
    async fn search_matches_title_and_summary() {
        let (_dir, repo) = test_repo().await;

        let id = repo
            .insert_item(&item(Source::HackerNews, "https://example.com/rust", "Rust 2.0 released"))
            .await
            .unwrap();
        repo.insert_summary(id, "the borrow checker got friendlier", Batch::Evening)
            .await
            .unwrap();

        assert_eq!(repo.search_summaries("rust").await.unwrap().len(), 1);
        assert_eq!(repo.search_summaries("BORROW").await.unwrap().len(), 1);
        assert!(repo.search_summaries("golang").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn schedule_times_fall_back_to_defaults() {
        let (_dir, repo) = test_repo().await;

        assert_eq!(repo.schedule_times().await.unwrap(), ScheduleTimes::default());

        let updated = ScheduleTimes {
            morning: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            evening: NaiveTime::from_hms_opt(21, 15, 0).unwrap(),
        };
        repo.update_schedule(updated).await.unwrap();
        assert_eq!(repo.schedule_times().await.unwrap(), updated);

        repo.set_setting("morning_time", "not a time").await.unwrap();
        let times = repo.schedule_times().await.unwrap();
        assert_eq!(times.morning, ScheduleTimes::default().morning);
        assert_eq!(times.evening, updated.evening);
    }
}
