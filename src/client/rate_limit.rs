//! Per-endpoint rate limiting for the DjangoVerseHub API
//!
//! Implements reactive rate limiting that only activates after receiving a 429.
//! Categories mirror the server's throttle scopes.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;
use reqwest::Method;
use tokio::sync::RwLock;

/// Categories of API endpoints with their throttle scopes.
///
/// - Login: 5/min
/// - Search: 30/min
/// - Article creation: 10/min
/// - Comment creation: 20/min
/// - Uploads: 10/min
/// - Everything else: 1000/hour (the server's `user` scope)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointCategory {
    /// POST /api/v1/auth/login/
    Login,
    /// GET /api/v1/search/
    Search,
    /// POST /api/v1/articles/
    CreateArticle,
    /// POST /api/v1/comments/
    CreateComment,
    /// Any path containing /upload
    Upload,
    /// Default for all other endpoints
    Default,
}

impl EndpointCategory {
    /// All endpoint categories for initialization.
    pub const ALL: [EndpointCategory; 6] = [
        EndpointCategory::Login,
        EndpointCategory::Search,
        EndpointCategory::CreateArticle,
        EndpointCategory::CreateComment,
        EndpointCategory::Upload,
        EndpointCategory::Default,
    ];

    /// Categorize a request based on path and method.
    ///
    /// The path is the URL path (e.g., "/api/v1/search/").
    pub fn from_request(path: &str, method: &Method) -> Self {
        // Strip API version prefix if present
        let path = path
            .strip_prefix("/api/v1")
            .or_else(|| path.strip_prefix("/api"))
            .unwrap_or(path);

        if path.contains("/upload") {
            return EndpointCategory::Upload;
        }

        if path.starts_with("/auth/login") && *method == Method::POST {
            return EndpointCategory::Login;
        }

        if path.starts_with("/search") && *method == Method::GET {
            return EndpointCategory::Search;
        }

        if path.trim_end_matches('/') == "/articles" && *method == Method::POST {
            return EndpointCategory::CreateArticle;
        }

        if path.trim_end_matches('/') == "/comments" && *method == Method::POST {
            return EndpointCategory::CreateComment;
        }

        EndpointCategory::Default
    }

    /// Quota for this category
    pub fn quota(&self) -> Quota {
        let per_minute = |n: u32| Quota::per_minute(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN));
        match self {
            EndpointCategory::Login => per_minute(5),
            EndpointCategory::Search => per_minute(30),
            EndpointCategory::CreateArticle => per_minute(10),
            EndpointCategory::CreateComment => per_minute(20),
            EndpointCategory::Upload => per_minute(10),
            EndpointCategory::Default => {
                Quota::per_hour(NonZeroU32::new(1000).unwrap_or(NonZeroU32::MIN))
            }
        }
    }
}

/// Rate limiter state for a single endpoint category.
pub struct EndpointRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    active: AtomicBool,
    category: EndpointCategory,
}

impl EndpointRateLimiter {
    /// Create a new rate limiter for an endpoint category.
    pub fn new(category: EndpointCategory) -> Self {
        Self {
            limiter: RateLimiter::direct(category.quota()),
            active: AtomicBool::new(false),
            category,
        }
    }

    /// Activate rate limiting for this category.
    pub fn activate(&self) {
        let was_active = self.active.swap(true, Ordering::SeqCst);
        if !was_active {
            debug!("Rate limiting activated for {:?}", self.category);
        }
    }

    /// Check if rate limiting is active.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait for permission if rate limiting is active.
    pub async fn wait_if_active(&self) {
        if self.is_active() {
            debug!("Waiting for rate limiter {:?}", self.category);
            self.limiter.until_ready().await;
        }
    }
}

/// Collection of rate limiters for all endpoint categories.
pub struct RateLimiterSet {
    limiters: RwLock<HashMap<EndpointCategory, EndpointRateLimiter>>,
}

impl Default for RateLimiterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterSet {
    /// Create a new set of rate limiters for all endpoint categories.
    pub fn new() -> Self {
        let mut map = HashMap::new();

        for category in EndpointCategory::ALL {
            map.insert(category, EndpointRateLimiter::new(category));
        }

        Self {
            limiters: RwLock::new(map),
        }
    }

    /// Wait for rate limit permission for a category (if active).
    pub async fn wait_for(&self, category: EndpointCategory) {
        let limiters = self.limiters.read().await;
        if let Some(limiter) = limiters.get(&category) {
            limiter.wait_if_active().await;
        }
    }

    /// Activate rate limiting for a category (called on 429).
    pub async fn activate(&self, category: EndpointCategory) {
        let limiters = self.limiters.read().await;
        if let Some(limiter) = limiters.get(&category) {
            limiter.activate();
        }
    }

    /// Whether a category is currently throttled
    pub async fn is_active(&self, category: EndpointCategory) -> bool {
        let limiters = self.limiters.read().await;
        limiters
            .get(&category)
            .map(|l| l.is_active())
            .unwrap_or(false)
    }
}
