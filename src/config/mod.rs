//! Configuration management for VerseHub

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::error::{ConfigError, Result};

/// Server used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// DjangoVerseHub server root (scheme + host)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API token obtained from `/api/v1/auth/login/`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// CSRF token sent as `X-CSRFToken`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,

    /// Whether desktop notifications may be shown for pushed notifications
    #[serde(default)]
    pub push_permission: PushPermission,

    /// Endpoint of the push subscription already registered with the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_endpoint: Option<String>,

    #[serde(default)]
    pub request: RequestSettings,

    #[serde(default)]
    pub realtime: RealtimeSettings,

    #[serde(default)]
    pub offline: OfflineSettings,
}

/// Platform notification permission state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushPermission {
    Granted,
    Denied,
    #[default]
    Default,
}

/// Request client tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

/// Realtime notification channel tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSettings {
    #[serde(default = "default_ws_path")]
    pub path: String,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    #[serde(default = "default_reconnect_multiplier")]
    pub reconnect_multiplier: f64,

    #[serde(default = "default_max_notifications")]
    pub max_notifications: usize,
}

/// Offline cache router settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineSettings {
    /// Prefix for cache bucket names
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Bucket version; bumping it purges older buckets on activation
    #[serde(default = "default_cache_version")]
    pub version: String,

    /// Page served to HTML requests when both network and cache miss
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Assets fetched into the precache bucket on install
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    5 * 60
}

fn default_ws_path() -> String {
    "/ws/notifications/".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

fn default_reconnect_multiplier() -> f64 {
    crate::backoff::RECONNECT_MULTIPLIER
}

fn default_max_notifications() -> usize {
    50
}

fn default_app_name() -> String {
    "versehub".to_string()
}

fn default_cache_version() -> String {
    "v1".to_string()
}

fn default_offline_page() -> String {
    "/offline/".to_string()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/offline/",
        "/static/css/main.css",
        "/static/js/main.js",
        "/static/js/notifications.js",
        "/static/images/logo.png",
        "/static/images/default-avatar.png",
        "/static/manifest.json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl RequestSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn retry_policy(&self) -> BackoffPolicy {
        BackoffPolicy::retry(
            Duration::from_millis(self.retry_base_delay_ms),
            self.max_retries,
        )
    }
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            path: default_ws_path(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_multiplier: default_reconnect_multiplier(),
            max_notifications: default_max_notifications(),
        }
    }
}

impl RealtimeSettings {
    pub fn reconnect_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.reconnect_base_delay_ms),
            self.reconnect_multiplier,
            self.max_reconnect_attempts,
        )
    }
}

impl Default for OfflineSettings {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            version: default_cache_version(),
            offline_page: default_offline_page(),
            precache: default_precache(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".versehub").join("config.yaml"))
    }

    /// Resolve an optional override to a concrete config path
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Self::default_path(),
        }
    }

    /// Load configuration from an optional override path
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        Self::load_from(Self::resolve_path(path)?)
    }

    /// Load configuration, falling back to defaults when no file exists
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match Self::load_at(path) {
            Err(crate::error::Error::Config(ConfigError::NotFound)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to an optional override path
    pub fn save_at(&self, path: Option<&str>) -> Result<()> {
        self.save_to(Self::resolve_path(path)?)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(&path, contents)?;

        // The file holds the API token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    /// Check that values make sense before anything is built from them
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url '{}': {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "base_url must be http or https, got '{}'",
                url.scheme()
            ))
            .into());
        }
        if !self.realtime.path.starts_with('/') {
            return Err(ConfigError::Invalid("realtime.path must start with '/'".to_string()).into());
        }
        if self.realtime.max_notifications == 0 {
            return Err(
                ConfigError::Invalid("realtime.max_notifications must be > 0".to_string()).into(),
            );
        }
        Ok(())
    }

    /// Validate that an API token is present
    pub fn validate_auth(&self) -> Result<()> {
        if self.token.is_none() {
            return Err(ConfigError::MissingToken.into());
        }
        Ok(())
    }

    /// WebSocket URL of the notification feed (http→ws, https→wss)
    pub fn websocket_url(&self) -> Result<String> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url: {}", e)))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| ConfigError::Invalid("cannot derive websocket scheme".to_string()))?;
        url.set_path(&self.realtime.path);
        url.set_query(None);
        Ok(url.to_string())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            csrf_token: None,
            push_permission: PushPermission::default(),
            push_endpoint: None,
            request: RequestSettings::default(),
            realtime: RealtimeSettings::default(),
            offline: OfflineSettings::default(),
        }
    }
}
