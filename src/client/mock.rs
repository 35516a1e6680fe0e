//! Mock transport for testing
//!
//! Scripts responses per route so the request client, offline router and
//! sync queue can be exercised without a server.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tokio::time::Instant;

use super::transport::{HttpRequest, HttpResponse, Transport};
use crate::error::ApiError;

/// A scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    Response(HttpResponse),
    Error(ApiError),
}

/// A request the mock observed
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub at: Instant,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Mock transport for testing.
///
/// Routes match on method plus URL suffix. Replies for a route are consumed
/// in order; the last one repeats. Unrouted requests get a 404.
///
/// # Example
/// ```ignore
/// let mock = MockTransport::new()
///     .json(Method::GET, "/api/v1/articles/", 200, json!({"results": []}))
///     .with_delay(Duration::from_millis(50));
/// ```
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<MockReply>>>,
    captured: Mutex<Vec<CapturedRequest>>,
    delay: Duration,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every reply by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a raw response for a route
    pub fn reply(self, method: Method, suffix: &str, reply: MockReply) -> Self {
        if let Ok(mut routes) = self.routes.lock() {
            routes
                .entry((method, suffix.to_string()))
                .or_default()
                .push_back(reply);
        }
        self
    }

    /// Queue a JSON response for a route
    pub fn json(self, method: Method, suffix: &str, status: u16, body: serde_json::Value) -> Self {
        let response = HttpResponse::new(status, body.to_string())
            .with_header("content-type", "application/json");
        self.reply(method, suffix, MockReply::Response(response))
    }

    /// Queue a transport-level failure for a route
    pub fn fail(self, method: Method, suffix: &str, error: ApiError) -> Self {
        self.reply(method, suffix, MockReply::Error(error))
    }

    /// Number of requests received so far
    pub fn call_count(&self) -> usize {
        self.captured.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Every request received so far
    pub fn captured(&self) -> Vec<CapturedRequest> {
        self.captured.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn next_reply(&self, request: &HttpRequest) -> Option<MockReply> {
        let mut routes = self.routes.lock().ok()?;
        // Longest matching suffix wins
        let (_, queue) = routes
            .iter_mut()
            .filter(|((method, suffix), _)| {
                *method == request.method && request.url.ends_with(suffix.as_str())
            })
            .max_by_key(|((_, suffix), _)| suffix.len())?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        if let Ok(mut captured) = self.captured.lock() {
            captured.push(CapturedRequest {
                method: request.method.clone(),
                url: request.url.clone(),
                headers: request.headers.clone(),
                body: request.body.clone(),
                at: Instant::now(),
            });
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.next_reply(request) {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::Error(error)) => Err(error),
            None => Ok(HttpResponse::new(404, r#"{"detail":"Not found."}"#)
                .with_header("content-type", "application/json")),
        }
    }
}
