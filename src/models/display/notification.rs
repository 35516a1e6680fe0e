//! Notification display model

use chrono::Utc;
use serde::Serialize;
use tabled::Tabled;

use crate::client::models::Notification;
use crate::output::formatters::{format_age, truncate};

/// Notification display model for table/JSON output.
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct NotificationDisplay {
    #[tabled(rename = "ID")]
    pub id: u64,

    /// Unread marker
    #[tabled(rename = "")]
    #[serde(skip)]
    pub marker: String,

    #[tabled(rename = "TYPE")]
    pub kind: String,

    #[tabled(rename = "TITLE")]
    pub title: String,

    #[tabled(rename = "MESSAGE")]
    pub message: String,

    #[tabled(rename = "AGE")]
    pub age: String,

    #[tabled(skip)]
    pub read: bool,
}

impl From<&Notification> for NotificationDisplay {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            marker: if n.read { String::new() } else { "\u{25CF}".to_string() },
            kind: n.kind.as_str().to_string(),
            title: truncate(&n.title, 40),
            message: truncate(&n.message, 60),
            age: format_age(n.created_at.as_ref(), Utc::now()),
            read: n.read,
        }
    }
}

impl From<Notification> for NotificationDisplay {
    fn from(n: Notification) -> Self {
        Self::from(&n)
    }
}
