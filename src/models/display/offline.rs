//! Display models for local offline state: cache buckets and queued writes

use serde::Serialize;
use tabled::Tabled;

use crate::cache::storage::BucketStats;
use crate::offline::queue::QueuedWrite;
use crate::output::formatters::{format_bytes, format_datetime_local, truncate};

#[derive(Debug, Clone, Tabled, Serialize)]
pub struct BucketDisplay {
    #[tabled(rename = "BUCKET")]
    pub name: String,

    #[tabled(rename = "ENTRIES")]
    pub entries: usize,

    #[tabled(rename = "SIZE")]
    pub size: String,

    /// Whether the bucket belongs to the configured cache version
    #[tabled(rename = "CURRENT")]
    pub current: String,
}

impl BucketDisplay {
    pub fn new(stats: &BucketStats, current: bool) -> Self {
        Self {
            name: stats.name.clone(),
            entries: stats.entries,
            size: format_bytes(stats.size_bytes),
            current: if current { "\u{2713}".to_string() } else { String::new() },
        }
    }
}

#[derive(Debug, Clone, Tabled, Serialize)]
pub struct QueuedWriteDisplay {
    #[tabled(rename = "ID")]
    pub id: i64,

    #[tabled(rename = "TAG")]
    pub tag: String,

    #[tabled(rename = "PAYLOAD")]
    pub payload: String,

    #[tabled(rename = "QUEUED")]
    pub queued: String,

    #[tabled(rename = "ATTEMPTS")]
    pub attempts: u32,

    #[tabled(rename = "LAST ERROR")]
    pub last_error: String,
}

impl From<&QueuedWrite> for QueuedWriteDisplay {
    fn from(item: &QueuedWrite) -> Self {
        Self {
            id: item.id,
            tag: item.tag.to_string(),
            payload: truncate(&item.payload.to_string(), 50),
            queued: format_datetime_local(Some(&item.created_at)),
            attempts: item.attempts,
            last_error: item.last_error.clone().unwrap_or_default(),
        }
    }
}
