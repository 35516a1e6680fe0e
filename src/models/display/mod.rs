//! Display model implementations for table and JSON output
//!
//! Display models transform API response types into CLI-friendly formats
//! with appropriate column names and serialization.

mod article;
mod notification;
mod offline;

pub use article::{ArticleDisplay, SearchHitDisplay};
pub use notification::NotificationDisplay;
pub use offline::{BucketDisplay, QueuedWriteDisplay};
