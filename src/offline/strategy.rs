//! Request classification for the offline router

use reqwest::{Method, Url};

use crate::client::HttpRequest;

/// Third-party asset hosts treated like local static files
pub const CDN_HOSTS: &[&str] = &[
    "cdn.jsdelivr.net",
    "cdnjs.cloudflare.com",
    "unpkg.com",
    "fonts.googleapis.com",
    "fonts.gstatic.com",
];

const NETWORK_FIRST_PREFIXES: &[&str] = &["/api/", "/ws/", "/admin/"];
const CACHE_FIRST_PREFIXES: &[&str] = &["/static/", "/media/"];
const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".ico"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    NetworkFirst,
    CacheFirst,
    StaleWhileRevalidate,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Strategy::NetworkFirst => "network-first",
            Strategy::CacheFirst => "cache-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
        };
        write!(f, "{}", s)
    }
}

/// What the requester can render, for picking an offline fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepts {
    Html,
    Image,
    Other,
}

/// Only GETs over http(s) go through the router
pub fn should_intercept(request: &HttpRequest) -> bool {
    if request.method != Method::GET {
        return false;
    }
    Url::parse(&request.url)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Pick a strategy. Rules are checked in priority order.
pub fn classify(request: &HttpRequest) -> Strategy {
    let Ok(url) = Url::parse(&request.url) else {
        return Strategy::NetworkFirst;
    };
    let path = url.path();

    if NETWORK_FIRST_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return Strategy::NetworkFirst;
    }

    let cdn = url
        .host_str()
        .map(|host| CDN_HOSTS.contains(&host))
        .unwrap_or(false);
    if cdn || CACHE_FIRST_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return Strategy::CacheFirst;
    }

    if accepts(request) == Accepts::Html {
        return Strategy::StaleWhileRevalidate;
    }

    Strategy::NetworkFirst
}

pub fn accepts(request: &HttpRequest) -> Accepts {
    if request.accepts("text/html") {
        return Accepts::Html;
    }
    if request.accepts("image/") {
        return Accepts::Image;
    }
    let path = Url::parse(&request.url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default();
    if IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return Accepts::Image;
    }
    Accepts::Other
}
