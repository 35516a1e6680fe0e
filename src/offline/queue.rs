//! Durable queue for writes made while offline
//!
//! Comments and articles created without a connection are stored in SQLite
//! under a sync tag and replayed by [`SyncQueue::flush`]. An item is removed
//! only after the server accepts it, so delivery is at-least-once.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info, warn};
use reqwest::Method;
use rusqlite::{Connection, params};
use serde::Serialize;

use crate::cache::CacheStorage;
use crate::client::endpoints::{ARTICLES_PATH, COMMENTS_PATH};
use crate::client::{ApiClient, RequestOptions};
use crate::error::CacheError;

type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncTag {
    #[serde(rename = "pending-comments")]
    PendingComments,
    #[serde(rename = "pending-articles")]
    PendingArticles,
}

impl SyncTag {
    pub const ALL: [SyncTag; 2] = [SyncTag::PendingComments, SyncTag::PendingArticles];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTag::PendingComments => "pending-comments",
            SyncTag::PendingArticles => "pending-articles",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Endpoint the queued payloads are POSTed to
    pub fn endpoint(&self) -> &'static str {
        match self {
            SyncTag::PendingComments => COMMENTS_PATH,
            SyncTag::PendingArticles => ARTICLES_PATH,
        }
    }
}

impl std::fmt::Display for SyncTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueuedWrite {
    pub id: i64,
    pub tag: SyncTag,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct FlushReport {
    pub sent: usize,
    pub failed: usize,
    pub remaining: usize,
}

pub struct SyncQueue {
    conn: Mutex<Connection>,
}

impl SyncQueue {
    /// Open the queue next to the response cache
    pub fn open() -> Result<Self> {
        Self::open_at(&CacheStorage::cache_dir()?)
    }

    pub fn open_at(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| CacheError::Io(format!("Failed to create queue dir: {}", e)))?;
        let conn = Connection::open(dir.join("queue.db"))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS queued_writes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tag TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_queued_tag ON queued_writes(tag);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn enqueue(&self, tag: SyncTag, payload: &serde_json::Value) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO queued_writes (tag, payload, created_at) VALUES (?1, ?2, ?3)",
            params![tag.as_str(), payload.to_string(), Utc::now().timestamp()],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Queued write {} under {}", id, tag);
        Ok(id)
    }

    /// Items in insertion order, optionally for one tag
    pub fn list(&self, tag: Option<SyncTag>) -> Result<Vec<QueuedWrite>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, tag, payload, created_at, attempts, last_error
             FROM queued_writes
             WHERE (?1 IS NULL OR tag = ?1)
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map([tag.map(|t| t.as_str())], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let items = rows
            .into_iter()
            .filter_map(|(id, tag, payload, created_at, attempts, last_error)| {
                let Some(tag) = SyncTag::parse(&tag) else {
                    warn!("Skipping queued write {} with unknown tag {}", id, tag);
                    return None;
                };
                Some(QueuedWrite {
                    id,
                    tag,
                    payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
                    created_at: Utc
                        .timestamp_opt(created_at, 0)
                        .single()
                        .unwrap_or_else(Utc::now),
                    attempts,
                    last_error,
                })
            })
            .collect();
        Ok(items)
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM queued_writes", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn remove(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM queued_writes WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    fn record_failure(&self, id: i64, error: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE queued_writes SET attempts = attempts + 1, last_error = ?2 WHERE id = ?1",
            params![id, error],
        )?;
        Ok(())
    }

    /// Replay queued writes in order. Failed items stay queued.
    pub async fn flush(&self, client: &ApiClient, tag: Option<SyncTag>) -> Result<FlushReport> {
        let items = self.list(tag)?;
        let mut report = FlushReport::default();

        for item in items {
            let result = client
                .request(
                    Method::POST,
                    item.tag.endpoint(),
                    Some(&item.payload),
                    RequestOptions::default().no_dedupe(),
                )
                .await;

            match result {
                Ok(_) => {
                    self.remove(item.id)?;
                    report.sent += 1;
                }
                Err(e) => {
                    warn!("Queued write {} ({}) not delivered: {}", item.id, item.tag, e);
                    self.record_failure(item.id, &e.message())?;
                    report.failed += 1;
                }
            }
        }

        report.remaining = self.list(tag)?.len();
        info!(
            "Flushed sync queue: {} sent, {} failed, {} remaining",
            report.sent, report.failed, report.remaining
        );
        Ok(report)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }
}
