//! SQLite-based cache bucket storage with file blob support
//!
//! Each bucket is an independent URL → response store. Small bodies are stored
//! inline in SQLite, large bodies (>10KB) as files.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::client::HttpResponse;
use crate::error::CacheError;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 2;

/// Bodies larger than this are stored as external blobs
const INLINE_THRESHOLD: usize = 10 * 1024; // 10KB

type Result<T> = std::result::Result<T, CacheError>;

/// SQLite-backed bucket storage with file blob support
pub struct CacheStorage {
    conn: Connection,
    blobs_dir: PathBuf,
}

impl CacheStorage {
    /// Open or create cache storage at the default XDG cache location
    pub fn open() -> Result<Self> {
        let cache_dir = Self::cache_dir()?;
        Self::open_at(&cache_dir)
    }

    /// Get the cache directory path (~/.cache/versehub on Linux)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("versehub"))
    }

    /// Open cache storage at a specific directory (for testing)
    pub fn open_at(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join("cache.db");
        let blobs_dir = cache_dir.join("blobs");
        std::fs::create_dir_all(&blobs_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create blobs dir: {}", e)))?;

        let conn = Connection::open(&db_path)?;

        // Check schema version - nuke if mismatched
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            Self::nuke(&db_path, &blobs_dir)?;
            return Self::open_at(cache_dir);
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS buckets (
                name TEXT PRIMARY KEY NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cache_entries (
                bucket TEXT NOT NULL,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                status_text TEXT NOT NULL,
                headers TEXT NOT NULL,
                body BLOB,
                blob_path TEXT,
                stored_at INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL,
                PRIMARY KEY (bucket, url)
            );

            CREATE INDEX IF NOT EXISTS idx_entries_url ON cache_entries(url);
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self { conn, blobs_dir })
    }

    /// Create a bucket if it does not exist yet
    pub fn open_bucket(&self, bucket: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
            params![bucket, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Names of every bucket currently present
    pub fn bucket_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM buckets ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Get the response stored for `url` in `bucket`
    pub fn get(&self, bucket: &str, url: &str) -> Result<Option<HttpResponse>> {
        let row: Option<(u16, String, String, Option<Vec<u8>>, Option<String>)> = self
            .conn
            .query_row(
                "SELECT status, status_text, headers, body, blob_path FROM cache_entries
                 WHERE bucket = ?1 AND url = ?2",
                params![bucket, url],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((status, status_text, headers, body, blob_path)) = row else {
            return Ok(None);
        };

        let body = match (body, blob_path) {
            (Some(body), None) => body,
            (None, Some(blob_path)) => {
                let full_path = self.blobs_dir.join(&blob_path);
                match std::fs::read(&full_path) {
                    Ok(data) => data,
                    Err(e) => {
                        log::warn!("Failed to read blob {}: {}", blob_path, e);
                        // Delete stale entry
                        let _ = self.delete_entry(bucket, url);
                        return Ok(None);
                    }
                }
            }
            _ => Vec::new(),
        };

        let headers: Vec<(String, String)> = serde_json::from_str(&headers).unwrap_or_default();

        Ok(Some(HttpResponse {
            status,
            status_text,
            headers,
            body,
        }))
    }

    /// Find `url` in the first of `buckets` that holds it
    pub fn match_any(&self, url: &str, buckets: &[&str]) -> Result<Option<(String, HttpResponse)>> {
        for bucket in buckets {
            if let Some(response) = self.get(bucket, url)? {
                return Ok(Some((bucket.to_string(), response)));
            }
        }
        Ok(None)
    }

    /// Store (or replace) a response
    pub fn put(&self, bucket: &str, url: &str, response: &HttpResponse) -> Result<()> {
        self.open_bucket(bucket)?;

        let now = Utc::now().timestamp();
        let headers = serde_json::to_string(&response.headers)
            .map_err(|e| CacheError::Io(format!("Failed to encode headers: {}", e)))?;

        // Replacing an entry must not leave its old blob behind
        self.remove_blob_for(bucket, url)?;

        if response.body.len() <= INLINE_THRESHOLD {
            self.conn.execute(
                "INSERT OR REPLACE INTO cache_entries
                 (bucket, url, status, status_text, headers, body, blob_path, stored_at, size_bytes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8)",
                params![
                    bucket,
                    url,
                    response.status,
                    response.status_text,
                    headers,
                    response.body,
                    now,
                    response.body.len()
                ],
            )?;
        } else {
            let blob_path = self.write_blob(&blob_key(bucket, url), &response.body)?;
            self.conn.execute(
                "INSERT OR REPLACE INTO cache_entries
                 (bucket, url, status, status_text, headers, body, blob_path, stored_at, size_bytes)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7, ?8)",
                params![
                    bucket,
                    url,
                    response.status,
                    response.status_text,
                    headers,
                    blob_path,
                    now,
                    response.body.len()
                ],
            )?;
        }
        Ok(())
    }

    /// Delete a single entry
    pub fn delete_entry(&self, bucket: &str, url: &str) -> Result<bool> {
        self.remove_blob_for(bucket, url)?;
        let deleted = self.conn.execute(
            "DELETE FROM cache_entries WHERE bucket = ?1 AND url = ?2",
            params![bucket, url],
        )?;
        Ok(deleted > 0)
    }

    /// Delete a bucket and everything in it, returning the number of entries removed
    pub fn delete_bucket(&self, bucket: &str) -> Result<usize> {
        let blob_paths: Vec<String> = {
            let mut stmt = self.conn.prepare(
                "SELECT blob_path FROM cache_entries WHERE bucket = ?1 AND blob_path IS NOT NULL",
            )?;
            let paths = stmt
                .query_map([bucket], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            paths
        };
        for path in blob_paths {
            if let Err(e) = std::fs::remove_file(self.blobs_dir.join(&path)) {
                log::warn!("Failed to remove blob {}: {}", path, e);
            }
        }

        let deleted = self
            .conn
            .execute("DELETE FROM cache_entries WHERE bucket = ?1", [bucket])?;
        self.conn
            .execute("DELETE FROM buckets WHERE name = ?1", [bucket])?;
        Ok(deleted)
    }

    /// Clear all buckets and entries
    pub fn clear_all(&self) -> Result<ClearStats> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;
        let buckets: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM buckets", [], |r| r.get(0))?;

        self.conn.execute("DELETE FROM cache_entries", [])?;
        self.conn.execute("DELETE FROM buckets", [])?;

        // Clear blobs directory
        if self.blobs_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.blobs_dir) {
                log::warn!("Failed to clear blobs directory: {}", e);
            }
            std::fs::create_dir_all(&self.blobs_dir)
                .map_err(|e| CacheError::Io(format!("Failed to recreate blobs dir: {}", e)))?;
        }

        Ok(ClearStats {
            entries_removed: count as usize,
            buckets_removed: buckets as usize,
        })
    }

    /// Get cache statistics
    pub fn stats(&self) -> Result<CacheStats> {
        let mut stmt = self.conn.prepare(
            "SELECT b.name, COUNT(e.url), COALESCE(SUM(e.size_bytes), 0)
             FROM buckets b LEFT JOIN cache_entries e ON e.bucket = b.name
             GROUP BY b.name ORDER BY b.name",
        )?;
        let buckets = stmt
            .query_map([], |row| {
                Ok(BucketStats {
                    name: row.get(0)?,
                    entries: row.get::<_, i64>(1)? as usize,
                    size_bytes: row.get::<_, i64>(2)? as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let oldest: Option<i64> = self
            .conn
            .query_row("SELECT MIN(stored_at) FROM cache_entries", [], |r| r.get(0))
            .optional()?
            .flatten();

        let newest: Option<i64> = self
            .conn
            .query_row("SELECT MAX(stored_at) FROM cache_entries", [], |r| r.get(0))
            .optional()?
            .flatten();

        Ok(CacheStats {
            total_entries: buckets.iter().map(|b| b.entries).sum(),
            total_size_bytes: buckets.iter().map(|b| b.size_bytes).sum(),
            buckets,
            oldest_entry: oldest,
            newest_entry: newest,
        })
    }

    fn remove_blob_for(&self, bucket: &str, url: &str) -> Result<()> {
        let existing: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT blob_path FROM cache_entries WHERE bucket = ?1 AND url = ?2",
                params![bucket, url],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(Some(path)) = existing {
            let _ = std::fs::remove_file(self.blobs_dir.join(path));
        }
        Ok(())
    }

    /// Write a blob file, sharded by first 2 chars of key
    fn write_blob(&self, key: &str, data: &[u8]) -> Result<String> {
        let shard = &key[..2.min(key.len())];
        let shard_dir = self.blobs_dir.join(shard);
        std::fs::create_dir_all(&shard_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create shard dir: {}", e)))?;

        let filename = format!("{}.bin", key);
        let rel_path = format!("{}/{}", shard, filename);
        let full_path = shard_dir.join(&filename);

        std::fs::write(&full_path, data)
            .map_err(|e| CacheError::Io(format!("Failed to write blob: {}", e)))?;

        Ok(rel_path)
    }

    /// Nuke the cache (delete DB and all blobs)
    fn nuke(db_path: &Path, blobs_dir: &Path) -> Result<()> {
        if db_path.exists() {
            std::fs::remove_file(db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
        }
        if blobs_dir.exists() {
            std::fs::remove_dir_all(blobs_dir)
                .map_err(|e| CacheError::Io(format!("Failed to remove blobs dir: {}", e)))?;
        }
        Ok(())
    }
}

fn blob_key(bucket: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bucket.as_bytes());
    hasher.update(b"|");
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Statistics about cache clear operation
#[derive(Debug)]
pub struct ClearStats {
    pub entries_removed: usize,
    pub buckets_removed: usize,
}

/// Per-bucket statistics
#[derive(Debug, Clone)]
pub struct BucketStats {
    pub name: String,
    pub entries: usize,
    pub size_bytes: usize,
}

/// Statistics about cache state
#[derive(Debug)]
pub struct CacheStats {
    pub buckets: Vec<BucketStats>,
    pub total_entries: usize,
    pub total_size_bytes: usize,
    pub oldest_entry: Option<i64>,
    pub newest_entry: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_storage() -> (CacheStorage, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = CacheStorage::open_at(dir.path()).unwrap();
        (storage, dir)
    }

    fn response(body: &[u8]) -> HttpResponse {
        HttpResponse {
            status: 200,
            status_text: "OK".to_string(),
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_put_get_inline() {
        let (storage, _dir) = test_storage();

        storage
            .put("app-dynamic-v1", "http://h/", &response(b"<html></html>"))
            .unwrap();

        let cached = storage.get("app-dynamic-v1", "http://h/").unwrap().unwrap();
        assert_eq!(cached.status, 200);
        assert_eq!(cached.body, b"<html></html>");
        assert_eq!(cached.header("content-type"), Some("text/html"));
    }

    #[test]
    fn test_put_get_blob() {
        let (storage, _dir) = test_storage();
        let data = vec![b'x'; 20_000]; // 20KB - will use blob

        storage
            .put("app-static-v1", "http://h/static/big.js", &response(&data))
            .unwrap();

        let cached = storage
            .get("app-static-v1", "http://h/static/big.js")
            .unwrap()
            .unwrap();
        assert_eq!(cached.body, data);
    }

    #[test]
    fn test_buckets_are_independent() {
        let (storage, _dir) = test_storage();

        storage.put("a", "http://h/x", &response(b"a")).unwrap();

        assert!(storage.get("b", "http://h/x").unwrap().is_none());
        let (bucket, found) = storage
            .match_any("http://h/x", &["b", "a"])
            .unwrap()
            .unwrap();
        assert_eq!(bucket, "a");
        assert_eq!(found.body, b"a");
    }

    #[test]
    fn test_delete_bucket() {
        let (storage, _dir) = test_storage();

        storage.put("old-v0", "http://h/1", &response(b"1")).unwrap();
        storage
            .put("old-v0", "http://h/2", &response(&vec![b'y'; 20_000]))
            .unwrap();
        storage.put("new-v1", "http://h/1", &response(b"1")).unwrap();

        assert_eq!(storage.delete_bucket("old-v0").unwrap(), 2);
        assert_eq!(storage.bucket_names().unwrap(), vec!["new-v1".to_string()]);
        assert!(storage.get("new-v1", "http://h/1").unwrap().is_some());
    }

    #[test]
    fn test_open_bucket_creates_empty_bucket() {
        let (storage, _dir) = test_storage();
        storage.open_bucket("empty").unwrap();
        assert_eq!(storage.bucket_names().unwrap(), vec!["empty".to_string()]);
    }

    #[test]
    fn test_clear_all() {
        let (storage, _dir) = test_storage();

        storage.put("a", "http://h/1", &response(b"d1")).unwrap();
        storage.put("b", "http://h/2", &response(b"d2")).unwrap();

        let stats = storage.clear_all().unwrap();
        assert_eq!(stats.entries_removed, 2);
        assert_eq!(stats.buckets_removed, 2);

        assert!(storage.get("a", "http://h/1").unwrap().is_none());
        assert!(storage.bucket_names().unwrap().is_empty());
    }

    #[test]
    fn test_stats() {
        let (storage, _dir) = test_storage();

        storage.put("a", "http://h/1", &response(b"data1")).unwrap();
        storage.put("a", "http://h/2", &response(b"data2")).unwrap();
        storage.open_bucket("b").unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.buckets.len(), 2);
        assert_eq!(stats.buckets[1].entries, 0);
        assert!(stats.total_size_bytes > 0);
        assert!(stats.newest_entry.is_some());
    }
}
