//! Local caches
//!
//! - [`ttl::ResponseCache`]: in-memory TTL cache used by the request client
//! - [`storage::CacheStorage`]: SQLite-backed named buckets used by the offline router

pub mod key;
pub mod storage;
pub mod ttl;

use std::time::Duration;

/// TTL configuration per data type
///
/// The request client defaults to [`CacheTtl::DEFAULT`]; typed endpoints use
/// the more specific values.
pub struct CacheTtl;

impl CacheTtl {
    /// Default for any cacheable GET
    pub const DEFAULT: Duration = Duration::from_secs(5 * 60); // 5 min

    // Listings change as authors publish
    pub const ARTICLES: Duration = Duration::from_secs(5 * 60); // 5 min
    pub const ARTICLE_DETAIL: Duration = Duration::from_secs(60 * 60); // 1 hr
    pub const SEARCH: Duration = Duration::from_secs(15 * 60); // 15 min
}

pub use key::request_key;
pub use storage::CacheStorage;
pub use ttl::ResponseCache;
