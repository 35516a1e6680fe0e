//! Display models for CLI output
//!
//! Converts API and local storage types into table/JSON rows.

pub mod display;

pub use display::{
    ArticleDisplay, BucketDisplay, NotificationDisplay, QueuedWriteDisplay, SearchHitDisplay,
};
