//! Error types for the VerseHub CLI

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for VerseHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Interactive prompt error: {0}")]
    Dialoguer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Other(String),
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        Error::Dialoguer(err.to_string())
    }
}

/// API-related errors.
///
/// Cloneable so a single failed request can be handed to every caller that
/// was coalesced onto it.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("API error {status} {status_text}: {}", message_or_default(.body, .status_text))]
    Status {
        status: u16,
        status_text: String,
        body: Option<serde_json::Value>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request aborted")]
    Aborted,

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// HTTP status code, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Server errors, rate limiting, network failures and timeouts are
    /// transient. Client errors and caller aborts are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Status { status, .. } => *status >= 500 || *status == 429,
            ApiError::Network(_) | ApiError::Timeout(_) => true,
            ApiError::Aborted | ApiError::InvalidResponse(_) => false,
        }
    }

    /// Human-readable message extracted from the error body
    pub fn message(&self) -> String {
        match self {
            ApiError::Status {
                body, status_text, ..
            } => message_or_default(body, status_text),
            other => other.to_string(),
        }
    }

    /// Field-level validation errors (`{"field": ["msg", ...]}`) for form binding
    pub fn field_errors(&self) -> BTreeMap<String, Vec<String>> {
        let mut fields = BTreeMap::new();
        let Some(serde_json::Value::Object(map)) = (match self {
            ApiError::Status { body, .. } => body.as_ref(),
            _ => None,
        }) else {
            return fields;
        };

        for (field, value) in map {
            if matches!(field.as_str(), "detail" | "error" | "message") {
                continue;
            }
            let messages: Vec<String> = match value {
                serde_json::Value::Array(items) => items
                    .iter()
                    .map(|v| match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
                serde_json::Value::String(s) => vec![s.clone()],
                _ => continue,
            };
            fields.insert(field.clone(), messages);
        }
        fields
    }
}

fn message_or_default(body: &Option<serde_json::Value>, status_text: &str) -> String {
    let from_body = body.as_ref().and_then(|b| match b {
        serde_json::Value::Object(map) => ["detail", "error", "message"]
            .iter()
            .find_map(|k| map.get(*k).and_then(|v| v.as_str()))
            .map(str::to_string),
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    });
    from_body.unwrap_or_else(|| status_text.to_string())
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Network("Failed to connect to API".to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found. Run `versehub init` to set up.")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("Not logged in. Run `versehub login` to authenticate.")]
    MissingToken,
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Local cache and queue storage errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Could not determine cache directory")]
    NoHome,

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cache storage lock poisoned")]
    Poisoned,

    #[error("Precache failed for {}", .0.join(", "))]
    Precache(Vec<String>),
}

/// Realtime notification channel errors
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Failed to connect to notification feed: {0}")]
    Connect(String),

    #[error("Notification feed transport error: {0}")]
    Transport(String),

    #[error("Invalid notification feed URL: {0}")]
    InvalidUrl(String),
}
