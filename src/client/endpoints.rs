//! Typed DjangoVerseHub endpoints
//!
//! Thin wrappers over [`ApiClient::request`] that pick TTLs and decode
//! responses into models.

use log::warn;
use reqwest::Method;
use serde_json::json;

use super::api::{ApiClient, RequestOptions};
use super::models::{
    Article, ArticleFilter, LoginResponse, MarkAllReadResponse, Notification, Paginated,
    PushSubscription, UnreadCount,
};
use crate::cache::CacheTtl;
use crate::error::ApiError;

pub const LOGIN_PATH: &str = "/api/v1/auth/login/";
pub const LOGOUT_PATH: &str = "/api/v1/auth/logout/";
pub const ARTICLES_PATH: &str = "/api/v1/articles/";
pub const COMMENTS_PATH: &str = "/api/v1/comments/";
pub const SEARCH_PATH: &str = "/api/v1/search/";
pub const NOTIFICATIONS_PATH: &str = "/api/v1/notifications/";
pub const PUSH_SUBSCRIBE_PATH: &str = "/api/notifications/subscribe/";

impl ApiClient {
    /// Exchange credentials for a token and attach it
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = json!({ "email": email, "password": password });
        let response = self
            .request(
                Method::POST,
                LOGIN_PATH,
                Some(&body),
                RequestOptions::default().no_dedupe().retries(0),
            )
            .await?;
        let login: LoginResponse = response.json()?;
        self.on_login(&login.token);
        Ok(login)
    }

    /// Revoke the token server-side. Local auth state is cleared either way.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self
            .request(
                Method::POST,
                LOGOUT_PATH,
                None,
                RequestOptions::default().no_dedupe().retries(0),
            )
            .await;
        self.on_logout();
        if let Err(ref err) = result {
            warn!("Server-side logout failed: {}", err);
        }
        result.map(|_| ())
    }

    pub async fn list_articles(
        &self,
        filter: &ArticleFilter,
    ) -> Result<Paginated<Article>, ApiError> {
        let url = self.url_with_query(ARTICLES_PATH, &filter.to_query());
        self.get_with(&url, RequestOptions::default().ttl(CacheTtl::ARTICLES))
            .await?
            .json()
    }

    pub async fn get_article(&self, slug: &str) -> Result<Article, ApiError> {
        let path = format!("{}{}/", ARTICLES_PATH, slug);
        self.get_with(&path, RequestOptions::default().ttl(CacheTtl::ARTICLE_DETAIL))
            .await?
            .json()
    }

    /// Site search. Result shape depends on `kind`, so the body is returned as-is.
    pub async fn search(
        &self,
        query: &str,
        kind: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        let mut params = vec![("q", query.to_string())];
        if let Some(kind) = kind {
            params.push(("type", kind.to_string()));
        }
        let url = self.url_with_query(SEARCH_PATH, &params);
        Ok(self
            .get_with(&url, RequestOptions::default().ttl(CacheTtl::SEARCH))
            .await?
            .body)
    }

    /// Notification state is pushed over the realtime channel, so listings
    /// always go to the network.
    pub async fn list_notifications(
        &self,
        page: Option<u32>,
    ) -> Result<Paginated<Notification>, ApiError> {
        let params: Vec<(&str, String)> = page.map(|p| ("page", p.to_string())).into_iter().collect();
        let url = self.url_with_query(NOTIFICATIONS_PATH, &params);
        self.get_with(&url, RequestOptions::default().no_cache())
            .await?
            .json()
    }

    pub async fn unread_count(&self) -> Result<u64, ApiError> {
        let path = format!("{}unread-count/", NOTIFICATIONS_PATH);
        let count: UnreadCount = self
            .get_with(&path, RequestOptions::default().no_cache())
            .await?
            .json()?;
        Ok(count.unread_count)
    }

    pub async fn mark_notification_read(&self, id: u64) -> Result<(), ApiError> {
        let path = format!("{}{}/read/", NOTIFICATIONS_PATH, id);
        self.post(&path, None).await.map(|_| ())
    }

    pub async fn mark_all_notifications_read(&self) -> Result<u64, ApiError> {
        let path = format!("{}read-all/", NOTIFICATIONS_PATH);
        let response = self.post(&path, None).await?;
        Ok(response
            .json::<MarkAllReadResponse>()
            .map(|r| r.marked_count)
            .unwrap_or(0))
    }

    pub async fn delete_notification(&self, id: u64) -> Result<(), ApiError> {
        let path = format!("{}{}/delete/", NOTIFICATIONS_PATH, id);
        self.delete(&path).await.map(|_| ())
    }

    /// Register a push subscription with the server
    pub async fn subscribe_push(&self, subscription: &PushSubscription) -> Result<(), ApiError> {
        let body =
            serde_json::to_value(subscription).map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        self.request(
            Method::POST,
            PUSH_SUBSCRIBE_PATH,
            Some(&body),
            RequestOptions::default().no_dedupe(),
        )
        .await
        .map(|_| ())
    }
}
