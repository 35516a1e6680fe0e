//! Caching fetch proxy with versioned buckets
//!
//! Every intercepted GET is served by one of three strategies (see
//! [`classify`]). Misses on both network and cache degrade to an offline
//! fallback instead of an error.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};
use tokio_util::task::TaskTracker;

use super::fallback;
use super::strategy::{Accepts, Strategy, accepts, classify, should_intercept};
use crate::cache::CacheStorage;
use crate::client::{HttpRequest, HttpResponse, Transport};
use crate::config::OfflineSettings;
use crate::error::{ApiError, CacheError, Result};

/// Versioned bucket names for one app version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketNames {
    pub static_assets: String,
    pub dynamic: String,
    pub precache: String,
}

impl BucketNames {
    pub fn new(app: &str, version: &str) -> Self {
        Self {
            static_assets: format!("{}-static-{}", app, version),
            dynamic: format!("{}-dynamic-{}", app, version),
            precache: format!("{}-precache-{}", app, version),
        }
    }

    pub fn all(&self) -> [&str; 3] {
        [&self.dynamic, &self.static_assets, &self.precache]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.all().contains(&name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    New,
    Installing,
    Activating,
    Activated,
}

#[derive(Debug, Clone)]
pub struct InstallReport {
    pub cached: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ActivateReport {
    pub purged: Vec<String>,
    pub entries_removed: usize,
}

type SharedStorage = Arc<Mutex<CacheStorage>>;

pub struct OfflineRouter {
    transport: Arc<dyn Transport>,
    storage: SharedStorage,
    names: BucketNames,
    base_url: String,
    offline_page: String,
    precache: Vec<String>,
    revalidations: TaskTracker,
    state: Mutex<LifecycleState>,
}

impl OfflineRouter {
    pub fn new(
        transport: Arc<dyn Transport>,
        storage: CacheStorage,
        settings: &OfflineSettings,
        base_url: &str,
    ) -> Self {
        Self {
            transport,
            storage: Arc::new(Mutex::new(storage)),
            names: BucketNames::new(&settings.app_name, &settings.version),
            base_url: base_url.trim_end_matches('/').to_string(),
            offline_page: settings.offline_page.clone(),
            precache: settings.precache.clone(),
            revalidations: TaskTracker::new(),
            state: Mutex::new(LifecycleState::New),
        }
    }

    pub fn names(&self) -> &BucketNames {
        &self.names
    }

    pub fn state(&self) -> LifecycleState {
        self.state.lock().map(|s| *s).unwrap_or(LifecycleState::New)
    }

    /// Resolve a path against the site root
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            format!("{}/{}", self.base_url, url)
        }
    }

    /// Fetch through the router.
    ///
    /// Non-intercepted requests go straight to the network and their errors
    /// propagate. Intercepted requests always resolve to a response.
    pub async fn fetch(&self, request: HttpRequest) -> std::result::Result<HttpResponse, ApiError> {
        if !should_intercept(&request) {
            return self.transport.send(&request).await;
        }

        let strategy = classify(&request);
        debug!("{} {}", strategy, request.url);

        let response = match strategy {
            Strategy::NetworkFirst => self.network_first(&request).await,
            Strategy::CacheFirst => self.cache_first(&request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(&request).await,
        };
        Ok(response)
    }

    async fn network_first(&self, request: &HttpRequest) -> HttpResponse {
        match self.transport.send(request).await {
            Ok(response) => {
                self.store(&self.names.dynamic, &request.url, &response);
                response
            }
            Err(e) => {
                debug!("Network failed for {}, trying cache: {}", request.url, e);
                match self.lookup(&request.url) {
                    Some(cached) => cached,
                    None => self.fallback(request),
                }
            }
        }
    }

    async fn cache_first(&self, request: &HttpRequest) -> HttpResponse {
        if let Some(cached) = self.lookup(&request.url) {
            debug!("Cache hit: {}", request.url);
            return cached;
        }
        match self.transport.send(request).await {
            Ok(response) => {
                self.store(&self.names.static_assets, &request.url, &response);
                response
            }
            Err(e) => {
                debug!("Network failed for {}: {}", request.url, e);
                self.fallback(request)
            }
        }
    }

    async fn stale_while_revalidate(&self, request: &HttpRequest) -> HttpResponse {
        if let Some(cached) = self.lookup(&request.url) {
            self.spawn_revalidation(request.clone());
            return cached;
        }
        match self.transport.send(request).await {
            Ok(response) => {
                self.store(&self.names.dynamic, &request.url, &response);
                response
            }
            Err(e) => {
                debug!("Network failed for {}: {}", request.url, e);
                self.fallback(request)
            }
        }
    }

    fn spawn_revalidation(&self, request: HttpRequest) {
        let transport = self.transport.clone();
        let storage = self.storage.clone();
        let bucket = self.names.dynamic.clone();
        self.revalidations.spawn(async move {
            match transport.send(&request).await {
                Ok(response) => store_in(&storage, &bucket, &request.url, &response),
                Err(e) => debug!("Background revalidation of {} failed: {}", request.url, e),
            }
        });
    }

    /// Wait for background revalidations started so far
    pub async fn settle(&self) {
        self.revalidations.close();
        self.revalidations.wait().await;
        self.revalidations.reopen();
    }

    /// Precache the manifest. Nothing is written unless every entry succeeds.
    pub async fn install(&self) -> Result<InstallReport> {
        self.set_state(LifecycleState::Installing);

        let mut fetched = Vec::with_capacity(self.precache.len());
        let mut failed = Vec::new();
        for entry in &self.precache {
            let url = self.resolve(entry);
            match self.transport.send(&HttpRequest::get(url.clone())).await {
                Ok(response) if response.is_success() => fetched.push((url, response)),
                Ok(response) => {
                    warn!("Precache of {} returned {}", url, response.status);
                    failed.push(url);
                }
                Err(e) => {
                    warn!("Precache of {} failed: {}", url, e);
                    failed.push(url);
                }
            }
        }

        if !failed.is_empty() {
            self.set_state(LifecycleState::New);
            return Err(CacheError::Precache(failed).into());
        }

        {
            let storage = self.lock_storage()?;
            storage.open_bucket(&self.names.precache)?;
            for (url, response) in &fetched {
                storage.put(&self.names.precache, url, response)?;
            }
        }

        // Skip waiting
        self.set_state(LifecycleState::Activating);
        info!(
            "Installed {} precached assets into {}",
            fetched.len(),
            self.names.precache
        );
        Ok(InstallReport {
            cached: fetched.into_iter().map(|(url, _)| url).collect(),
        })
    }

    /// Delete buckets from other versions and take control
    pub fn activate(&self) -> Result<ActivateReport> {
        self.set_state(LifecycleState::Activating);

        let storage = self.lock_storage()?;
        let mut purged = Vec::new();
        let mut entries_removed = 0;
        for name in storage.bucket_names()? {
            if !self.names.contains(&name) {
                entries_removed += storage.delete_bucket(&name)?;
                info!("Deleted old cache bucket {}", name);
                purged.push(name);
            }
        }
        for name in self.names.all() {
            storage.open_bucket(name)?;
        }
        drop(storage);

        self.set_state(LifecycleState::Activated);
        info!("Offline router active; claiming clients");
        Ok(ActivateReport {
            purged,
            entries_removed,
        })
    }

    /// Look `url` up across the current buckets
    pub fn lookup(&self, url: &str) -> Option<HttpResponse> {
        let storage = self.lock_storage().ok()?;
        match storage.match_any(url, &self.names.all()) {
            Ok(hit) => hit.map(|(_, response)| response),
            Err(e) => {
                warn!("Cache lookup failed for {}: {}", url, e);
                None
            }
        }
    }

    fn store(&self, bucket: &str, url: &str, response: &HttpResponse) {
        store_in(&self.storage, bucket, url, response);
    }

    fn fallback(&self, request: &HttpRequest) -> HttpResponse {
        match accepts(request) {
            Accepts::Html => self
                .lookup(&self.resolve(&self.offline_page))
                .unwrap_or_else(fallback::offline_html),
            Accepts::Image => fallback::placeholder_image(),
            Accepts::Other => fallback::service_unavailable(),
        }
    }

    fn lock_storage(&self) -> std::result::Result<MutexGuard<'_, CacheStorage>, CacheError> {
        self.storage.lock().map_err(|_| CacheError::Poisoned)
    }

    fn set_state(&self, state: LifecycleState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }
}

/// Store a successful response; anything else is left uncached
fn store_in(storage: &SharedStorage, bucket: &str, url: &str, response: &HttpResponse) {
    if !response.is_success() {
        return;
    }
    let Ok(storage) = storage.lock() else {
        warn!("Cache storage lock poisoned; not caching {}", url);
        return;
    };
    if let Err(e) = storage.put(bucket, url, response) {
        warn!("Failed to cache {}: {}", url, e);
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::client::mock::{MockReply, MockTransport};

    const BASE: &str = "http://site.test";

    fn settings() -> OfflineSettings {
        OfflineSettings {
            app_name: "versehub".to_string(),
            version: "v1".to_string(),
            offline_page: "/offline/".to_string(),
            precache: vec!["/offline/".to_string(), "/static/css/main.css".to_string()],
        }
    }

    fn router(mock: MockTransport) -> (OfflineRouter, Arc<MockTransport>, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = CacheStorage::open_at(dir.path()).unwrap();
        let mock = Arc::new(mock);
        (OfflineRouter::new(mock.clone(), storage, &settings(), BASE), mock, dir)
    }

    fn page(body: &str) -> MockReply {
        MockReply::Response(
            HttpResponse::new(200, body).with_header("content-type", "text/html"),
        )
    }

    fn offline() -> ApiError {
        ApiError::Network("offline".to_string())
    }

    fn html(url: &str) -> HttpRequest {
        HttpRequest::get(format!("{}{}", BASE, url)).with_header("Accept", "text/html")
    }

    #[test]
    fn test_bucket_names() {
        let names = BucketNames::new("versehub", "v2");
        assert_eq!(names.static_assets, "versehub-static-v2");
        assert_eq!(names.dynamic, "versehub-dynamic-v2");
        assert_eq!(names.precache, "versehub-precache-v2");
        assert!(names.contains("versehub-dynamic-v2"));
        assert!(!names.contains("versehub-dynamic-v1"));
    }

    #[tokio::test]
    async fn test_network_first_stores_then_falls_back_to_cache() {
        let (router, mock, _dir) = router(
            MockTransport::new()
                .json(Method::GET, "/api/v1/articles/", 200, json!({"results": [1]}))
                .fail(Method::GET, "/api/v1/articles/", offline()),
        );
        let url = format!("{}/api/v1/articles/", BASE);

        let live = router.fetch(HttpRequest::get(url.clone())).await.unwrap();
        assert_eq!(live.status, 200);

        let stored = router
            .storage
            .lock()
            .unwrap()
            .get("versehub-dynamic-v1", &url)
            .unwrap();
        assert!(stored.is_some());

        let cached = router.fetch(HttpRequest::get(url)).await.unwrap();
        assert_eq!(cached.body, live.body);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_network_first_does_not_store_errors() {
        let (router, _mock, _dir) = router(MockTransport::new().json(
            Method::GET,
            "/api/v1/articles/",
            500,
            json!({}),
        ));
        let url = format!("{}/api/v1/articles/", BASE);

        let response = router.fetch(HttpRequest::get(url.clone())).await.unwrap();
        assert_eq!(response.status, 500);
        assert!(router.lookup(&url).is_none());
    }

    #[tokio::test]
    async fn test_offline_json_fallback() {
        let (router, _mock, _dir) =
            router(MockTransport::new().fail(Method::GET, "/api/v1/search/", offline()));

        let response = router
            .fetch(HttpRequest::get(format!("{}/api/v1/search/", BASE)))
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["offline"], true);
    }

    #[tokio::test]
    async fn test_cache_first_serves_without_network() {
        let (router, mock, _dir) = router(MockTransport::new().reply(
            Method::GET,
            "/static/css/main.css",
            MockReply::Response(HttpResponse::new(200, "body{}")),
        ));
        let url = format!("{}/static/css/main.css", BASE);

        router.fetch(HttpRequest::get(url.clone())).await.unwrap();
        let again = router.fetch(HttpRequest::get(url.clone())).await.unwrap();
        assert_eq!(again.text(), "body{}");
        assert_eq!(mock.call_count(), 1);

        let stored = router
            .storage
            .lock()
            .unwrap()
            .get("versehub-static-v1", &url)
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_image_placeholder_when_offline() {
        let (router, _mock, _dir) = router(
            MockTransport::new().fail(Method::GET, "/media/avatars/a.png", offline()),
        );

        let response = router
            .fetch(HttpRequest::get(format!("{}/media/avatars/a.png", BASE)))
            .await
            .unwrap();
        assert_eq!(response.header("content-type"), Some("image/svg+xml"));
    }

    #[tokio::test]
    async fn test_swr_serves_stale_and_refreshes() {
        let (router, mock, _dir) = router(
            MockTransport::new()
                .reply(Method::GET, "/articles/intro/", page("v1"))
                .reply(Method::GET, "/articles/intro/", page("v2")),
        );

        let first = router.fetch(html("/articles/intro/")).await.unwrap();
        assert_eq!(first.text(), "v1");

        let stale = router.fetch(html("/articles/intro/")).await.unwrap();
        assert_eq!(stale.text(), "v1");

        router.settle().await;
        assert_eq!(mock.call_count(), 2);

        let fresh = router.fetch(html("/articles/intro/")).await.unwrap();
        assert_eq!(fresh.text(), "v2");
    }

    #[tokio::test]
    async fn test_swr_background_failure_is_swallowed() {
        let (router, _mock, _dir) = router(
            MockTransport::new()
                .reply(Method::GET, "/about/", page("about"))
                .fail(Method::GET, "/about/", offline()),
        );

        router.fetch(html("/about/")).await.unwrap();
        let stale = router.fetch(html("/about/")).await.unwrap();
        router.settle().await;
        assert_eq!(stale.text(), "about");
        assert_eq!(router.lookup(&format!("{}/about/", BASE)).unwrap().text(), "about");
    }

    #[tokio::test]
    async fn test_html_falls_back_to_precached_offline_page() {
        let (router, _mock, _dir) = router(
            MockTransport::new()
                .reply(Method::GET, "/offline/", page("offline page"))
                .reply(
                    Method::GET,
                    "/static/css/main.css",
                    MockReply::Response(HttpResponse::new(200, "css")),
                )
                .fail(Method::GET, "/articles/new-post/", offline()),
        );

        router.install().await.unwrap();
        let response = router.fetch(html("/articles/new-post/")).await.unwrap();
        assert_eq!(response.text(), "offline page");
    }

    #[tokio::test]
    async fn test_html_without_offline_page_gets_builtin() {
        let (router, _mock, _dir) =
            router(MockTransport::new().fail(Method::GET, "/articles/x/", offline()));

        let response = router.fetch(html("/articles/x/")).await.unwrap();
        assert_eq!(response.status, 503);
        assert!(response.text().contains("offline"));
    }

    #[tokio::test]
    async fn test_non_get_passes_through() {
        let (router, mock, _dir) = router(MockTransport::new().fail(
            Method::POST,
            "/api/v1/comments/",
            offline(),
        ));

        let err = router
            .fetch(HttpRequest::new(Method::POST, format!("{}/api/v1/comments/", BASE)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let (router, _mock, _dir) = router(
            MockTransport::new().reply(Method::GET, "/offline/", page("offline page")),
        );

        let err = router.install().await.unwrap_err();
        assert!(err.to_string().contains("/static/css/main.css"));
        assert_eq!(router.state(), LifecycleState::New);
        assert!(router.lookup(&format!("{}/offline/", BASE)).is_none());
    }

    #[tokio::test]
    async fn test_install_then_activate_purges_old_versions() {
        let (router, _mock, _dir) = router(
            MockTransport::new()
                .reply(Method::GET, "/offline/", page("offline page"))
                .reply(
                    Method::GET,
                    "/static/css/main.css",
                    MockReply::Response(HttpResponse::new(200, "css")),
                ),
        );
        {
            let storage = router.storage.lock().unwrap();
            storage
                .put("versehub-static-v0", "http://site.test/old.css", &HttpResponse::new(200, "old"))
                .unwrap();
        }

        let report = router.install().await.unwrap();
        assert_eq!(report.cached.len(), 2);
        assert_eq!(router.state(), LifecycleState::Activating);

        let report = router.activate().unwrap();
        assert_eq!(report.purged, vec!["versehub-static-v0".to_string()]);
        assert_eq!(report.entries_removed, 1);
        assert_eq!(router.state(), LifecycleState::Activated);

        let names = router.storage.lock().unwrap().bucket_names().unwrap();
        assert_eq!(
            names,
            vec![
                "versehub-dynamic-v1".to_string(),
                "versehub-precache-v1".to_string(),
                "versehub-static-v1".to_string(),
            ]
        );
    }
}
