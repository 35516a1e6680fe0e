//! Resilient request client
//!
//! [`ApiClient`] wraps a [`Transport`] with request deduplication, a TTL
//! response cache for GETs, retry with exponential backoff for transient
//! failures, per-endpoint rate limiting and cancellation.
//!
//! The client is a cheap `Clone` over shared state. One instance is built per
//! process and handed to every consumer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::rate_limit::{EndpointCategory, RateLimiterSet};
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::backoff::BackoffPolicy;
use crate::cache::{CacheTtl, ResponseCache, request_key};
use crate::config::{Config, DEFAULT_BASE_URL};
use crate::error::ApiError;

type SharedResponse = Shared<BoxFuture<'static, Result<ApiResponse, ApiError>>>;

/// Parsed response body plus status line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub status_text: String,
    /// JSON body; non-JSON bodies become a string, empty bodies `null`
    pub body: serde_json::Value,
}

impl ApiResponse {
    /// Deserialize the body into a typed model
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    fn from_http(response: HttpResponse) -> Result<Self, ApiError> {
        let body = parse_body(&response.body);
        if !response.is_success() {
            return Err(ApiError::Status {
                status: response.status,
                status_text: response.status_text,
                body: (!body.is_null()).then_some(body),
            });
        }
        Ok(Self {
            status: response.status,
            status_text: response.status_text,
            body,
        })
    }
}

fn parse_body(bytes: &[u8]) -> serde_json::Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or_else(|_| {
        serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
    })
}

/// Per-call options.
///
/// A caller that joins an identical in-flight request shares its execution,
/// so `retries` and `timeout` are those of the caller that started it.
/// Cached and uncached calls never join each other.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Serve and store GETs through the response cache
    pub cache: bool,
    /// Coalesce with an identical in-flight request
    pub dedupe: bool,
    /// Override the retry budget
    pub retries: Option<u32>,
    /// Override the per-attempt timeout
    pub timeout: Option<Duration>,
    /// Override the cache TTL
    pub ttl: Option<Duration>,
    /// Ends this caller's wait when cancelled
    pub cancel: Option<CancellationToken>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            cache: true,
            dedupe: true,
            retries: None,
            timeout: None,
            ttl: None,
            cancel: None,
        }
    }
}

impl RequestOptions {
    pub fn no_cache(mut self) -> Self {
        self.cache = false;
        self
    }

    pub fn no_dedupe(mut self) -> Self {
        self.dedupe = false;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Construction parameters for [`ApiClient`]
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: BackoffPolicy,
    pub cache_ttl: Duration,
    /// When false no GET response is cached
    pub cache_enabled: bool,
    pub token: Option<String>,
    pub csrf_token: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            retry: BackoffPolicy::retry(Duration::from_secs(1), 3),
            cache_ttl: CacheTtl::DEFAULT,
            cache_enabled: true,
            token: None,
            csrf_token: None,
        }
    }
}

impl ClientSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout: config.request.timeout(),
            retry: config.request.retry_policy(),
            cache_ttl: config.request.cache_ttl(),
            cache_enabled: true,
            token: config.token.clone(),
            csrf_token: config.csrf_token.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct AuthHeaders {
    token: Option<String>,
    csrf: Option<String>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: String,
    auth: RwLock<AuthHeaders>,
    responses: ResponseCache<ApiResponse>,
    in_flight: Mutex<HashMap<String, SharedResponse>>,
    rate_limits: RateLimiterSet,
    retry: BackoffPolicy,
    timeout: Duration,
    cache_ttl: Duration,
    cache_enabled: bool,
    shutdown: CancellationToken,
}

/// A fully resolved call, ready to execute
#[derive(Debug, Clone)]
struct PreparedCall {
    method: Method,
    url: String,
    path: String,
    body: Option<String>,
    key: String,
    retries: Option<u32>,
    timeout: Duration,
    /// Set when a successful response should be cached
    ttl: Option<Duration>,
}

impl PreparedCall {
    /// In-flight map key. Uncached calls get their own slot so their
    /// result is never stored on behalf of a cached joiner.
    fn flight_key(&self) -> String {
        match self.ttl {
            Some(_) => self.key.clone(),
            None => format!("{}#uncached", self.key),
        }
    }
}

/// Removes an in-flight entry when the executing task finishes or unwinds
struct InFlightGuard {
    inner: Arc<ClientInner>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Resilient HTTP client for the DjangoVerseHub API
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, settings: ClientSettings) -> Self {
        let inner = ClientInner {
            transport,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            auth: RwLock::new(AuthHeaders {
                token: settings.token,
                csrf: settings.csrf_token,
            }),
            responses: ResponseCache::new(),
            in_flight: Mutex::new(HashMap::new()),
            rate_limits: RateLimiterSet::new(),
            retry: settings.retry,
            timeout: settings.timeout,
            cache_ttl: settings.cache_ttl,
            cache_enabled: settings.cache_enabled,
            shutdown: CancellationToken::new(),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Build a client over the reqwest transport from config
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::over_reqwest(ClientSettings::from_config(config))
    }

    /// Build a client over the reqwest transport
    pub fn over_reqwest(settings: ClientSettings) -> Result<Self, ApiError> {
        // The client applies its own per-attempt timeout; this is a backstop.
        let transport = ReqwestTransport::new(settings.timeout.saturating_mul(2))?;
        Ok(Self::new(Arc::new(transport), settings))
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.inner.transport.clone()
    }

    /// Resolve an endpoint (absolute URL or path) against the base URL
    pub fn resolve_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        if endpoint.starts_with('/') {
            format!("{}{}", self.inner.base_url, endpoint)
        } else {
            format!("{}/{}", self.inner.base_url, endpoint)
        }
    }

    /// Resolve an endpoint and append query parameters
    pub fn url_with_query(&self, endpoint: &str, params: &[(&str, String)]) -> String {
        let resolved = self.resolve_url(endpoint);
        if params.is_empty() {
            return resolved;
        }
        match Url::parse(&resolved) {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
                url.to_string()
            }
            Err(_) => resolved,
        }
    }

    /// Issue a request.
    ///
    /// GETs are served from the cache when a live entry exists. Identical
    /// concurrent requests share one execution. Transient failures are
    /// retried with backoff.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.resolve_url(endpoint);
        let body = body.map(|b| b.to_string());
        let key = request_key(method.as_str(), &url, body.as_deref());
        let cacheable = method == Method::GET && options.cache && self.inner.cache_enabled;

        if cacheable {
            if let Some(hit) = self.inner.responses.get(&key) {
                debug!("Cache hit: {} {}", method, url);
                return Ok(hit);
            }
        }

        let path = Url::parse(&url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| endpoint.to_string());

        let call = PreparedCall {
            method,
            url,
            path,
            body,
            key,
            retries: options.retries,
            timeout: options.timeout.unwrap_or(self.inner.timeout),
            ttl: cacheable.then(|| options.ttl.unwrap_or(self.inner.cache_ttl)),
        };

        if !options.dedupe {
            return self.inner.execute(&call, options.cancel.as_ref()).await;
        }

        let shared = self.join_or_start(call);
        match options.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(ApiError::Aborted),
                    result = shared => result,
                }
            }
            None => shared.await,
        }
    }

    /// Join an identical in-flight request or start a new one
    fn join_or_start(&self, call: PreparedCall) -> SharedResponse {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let key = call.flight_key();
        if let Some(existing) = in_flight.get(&key) {
            debug!("Joining in-flight request: {} {}", call.method, call.url);
            return existing.clone();
        }

        // A request that settled after the first cache check may have filled it
        if call.ttl.is_some() {
            if let Some(hit) = self.inner.responses.get(&call.key) {
                return futures::future::ready(Ok(hit)).boxed().shared();
            }
        }

        let inner = self.inner.clone();
        let guard_key = key.clone();
        let task = tokio::spawn(async move {
            let _guard = InFlightGuard {
                inner: inner.clone(),
                key: guard_key,
            };
            inner.execute(&call, None).await
        });

        let shared = async move {
            task.await
                .unwrap_or_else(|e| Err(ApiError::Network(format!("request task failed: {}", e))))
        }
        .boxed()
        .shared();

        in_flight.insert(key, shared.clone());
        shared
    }

    pub async fn get(&self, endpoint: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::GET, endpoint, None, RequestOptions::default())
            .await
    }

    pub async fn get_with(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::GET, endpoint, None, options).await
    }

    pub async fn post(
        &self,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::POST, endpoint, body, RequestOptions::default())
            .await
    }

    pub async fn put(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::PUT, endpoint, Some(body), RequestOptions::default())
            .await
    }

    pub async fn patch(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::PATCH, endpoint, Some(body), RequestOptions::default())
            .await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::DELETE, endpoint, None, RequestOptions::default())
            .await
    }

    /// Attach the auth token. Cached responses belong to the previous
    /// identity and are dropped.
    pub fn on_login(&self, token: &str) {
        let cleared = self.inner.responses.clear();
        self.write_auth(|auth| auth.token = Some(token.to_string()));
        info!("Logged in; cleared {} cached responses", cleared);
    }

    /// Remove the auth token and drop cached responses
    pub fn on_logout(&self) {
        let cleared = self.inner.responses.clear();
        self.write_auth(|auth| auth.token = None);
        info!("Logged out; cleared {} cached responses", cleared);
    }

    pub fn set_csrf_token(&self, csrf: Option<String>) {
        self.write_auth(|auth| auth.csrf = csrf);
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .auth
            .read()
            .map(|auth| auth.token.is_some())
            .unwrap_or(false)
    }

    /// Drop every cached response
    pub fn clear_cache(&self) -> usize {
        self.inner.responses.clear()
    }

    /// Number of live cached responses
    pub fn cached_count(&self) -> usize {
        self.inner.responses.purge_expired();
        self.inner.responses.len()
    }

    /// Number of requests currently executing under deduplication
    pub fn in_flight_count(&self) -> usize {
        self.inner
            .in_flight
            .lock()
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Abort every in-flight request. The client rejects all later requests
    /// without reaching the transport.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            debug!("Aborting {} in-flight requests", self.in_flight_count());
        }
        self.inner.shutdown.cancel();
    }

    fn write_auth(&self, update: impl FnOnce(&mut AuthHeaders)) {
        let mut auth = self
            .inner
            .auth
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        update(&mut auth);
    }
}

impl ClientInner {
    async fn execute(
        &self,
        call: &PreparedCall,
        cancel: Option<&CancellationToken>,
    ) -> Result<ApiResponse, ApiError> {
        let policy = match call.retries {
            Some(retries) => self.retry.with_max_attempts(retries),
            None => self.retry,
        };
        let category = EndpointCategory::from_request(&call.path, &call.method);
        let mut attempt = 0;

        loop {
            if self.shutdown.is_cancelled() {
                return Err(ApiError::Aborted);
            }
            self.rate_limits.wait_for(category).await;

            let err = match self.send_once(call, cancel).await {
                Ok(response) => {
                    if let Some(ttl) = call.ttl {
                        self.responses.put(&call.key, response.clone(), ttl);
                    }
                    return Ok(response);
                }
                Err(err) => err,
            };

            if err.status() == Some(429) {
                self.rate_limits.activate(category).await;
            }

            if !err.is_transient() || !policy.allows(attempt) {
                if err.is_transient() && attempt > 0 {
                    warn!(
                        "{} {} failed after {} retries: {}",
                        call.method, call.url, attempt, err
                    );
                }
                return Err(err);
            }

            let delay = policy.delay_for(attempt);
            debug!(
                "Retrying {} {} in {:?} (retry {}/{}): {}",
                call.method,
                call.url,
                delay,
                attempt + 1,
                policy.max_attempts(),
                err
            );

            tokio::select! {
                biased;
                _ = self.cancelled(cancel) => return Err(ApiError::Aborted),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    async fn send_once(
        &self,
        call: &PreparedCall,
        cancel: Option<&CancellationToken>,
    ) -> Result<ApiResponse, ApiError> {
        let request = self.build_request(call);
        let send = tokio::time::timeout(call.timeout, self.transport.send(&request));

        let response = tokio::select! {
            biased;
            _ = self.cancelled(cancel) => return Err(ApiError::Aborted),
            result = send => match result {
                Ok(response) => response?,
                Err(_) => return Err(ApiError::Timeout(call.timeout)),
            },
        };

        ApiResponse::from_http(response)
    }

    fn build_request(&self, call: &PreparedCall) -> HttpRequest {
        let mut request = HttpRequest::new(call.method.clone(), call.url.clone())
            .with_header("Accept", "application/json")
            .with_header("X-Requested-With", "XMLHttpRequest");

        if let Some(ref body) = call.body {
            request = request
                .with_header("Content-Type", "application/json")
                .with_body(body.clone());
        }

        let auth = self.auth.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(ref csrf) = auth.csrf {
            request = request.with_header("X-CSRFToken", csrf.clone());
        }
        if let Some(ref token) = auth.token {
            request = request.with_header("Authorization", format!("Token {}", token));
        }
        request
    }

    /// Resolves when the client shuts down or the caller gives up
    async fn cancelled(&self, caller: Option<&CancellationToken>) {
        match caller {
            Some(token) => {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {}
                    _ = token.cancelled() => {}
                }
            }
            None => self.shutdown.cancelled().await,
        }
    }
}
