//! API resource models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// DRF page-number pagination envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn has_more_pages(&self) -> bool {
        self.next.is_some()
    }
}

/// Notification type tag
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    Mention,
    Post,
    #[default]
    System,
    Other(String),
}

impl From<String> for NotificationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "like" => NotificationKind::Like,
            "comment" => NotificationKind::Comment,
            "follow" => NotificationKind::Follow,
            "mention" => NotificationKind::Mention,
            "post" => NotificationKind::Post,
            "system" => NotificationKind::System,
            _ => NotificationKind::Other(value),
        }
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
            NotificationKind::Follow => "follow",
            NotificationKind::Mention => "mention",
            NotificationKind::Post => "post",
            NotificationKind::System => "system",
            NotificationKind::Other(s) => s.as_str(),
        }
    }
}

/// A notification as pushed over the realtime feed or listed by the API.
///
/// Accepts both the realtime field names (`type`, `read`) and the REST
/// serializer names (`notification_type`, `is_read`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,

    #[serde(rename = "type", alias = "notification_type", default)]
    pub kind: NotificationKind,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub message: String,

    #[serde(alias = "is_read", default)]
    pub read: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Deep link into the site
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "url")]
    pub link: Option<String>,
}

/// `GET /api/v1/notifications/unread-count/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread_count: u64,
}

/// `POST /api/v1/notifications/read-all/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkAllReadResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub marked_count: u64,
}

/// Browser-style push subscription descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub endpoint: String,
    #[serde(default)]
    pub expiration_time: Option<i64>,
    pub keys: PushKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Article author summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub full_name: String,
}

/// Article as listed by `/api/v1/articles/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub id: serde_json::Value,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
    /// Either a nested category object or its name
    #[serde(default)]
    pub category: Option<serde_json::Value>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub views_count: u64,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub comment_count: u64,
}

impl Article {
    /// Display name of the category, whatever shape the server sent
    pub fn category_name(&self) -> Option<String> {
        match self.category.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(map) => map
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            _ => None,
        }
    }
}

/// Filters for the article listing
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
}

impl ArticleFilter {
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![];
        if let Some(ref category) = self.category {
            params.push(("category", category.clone()));
        }
        if let Some(ref search) = self.search {
            params.push(("search", search.clone()));
        }
        if let Some(ref ordering) = self.ordering {
            params.push(("ordering", ordering.clone()));
        }
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        params
    }
}

/// `POST /api/v1/auth/login/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub is_verified: bool,
}
