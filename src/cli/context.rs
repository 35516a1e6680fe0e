//! Command execution context
//!
//! Loads configuration, applies global overrides and builds the one
//! [`ApiClient`] a command runs with.

use std::path::PathBuf;

use log::debug;

use crate::cli::{GlobalOptions, OutputFormat};
use crate::client::{ApiClient, ClientSettings};
use crate::config::Config;
use crate::error::Result;

/// Context for command execution containing config, client, and runtime options.
pub struct CommandContext {
    /// Loaded configuration with CLI overrides applied
    pub config: Config,
    /// Request client; clones share cache, dedup table and auth state
    pub client: ApiClient,
    /// Output format preference
    pub format: OutputFormat,
    config_path: Option<String>,
}

impl CommandContext {
    /// Context for commands that need a logged-in user.
    ///
    /// # Errors
    /// Returns error if config is invalid or no token is stored.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let ctx = Self::anonymous(opts)?;
        ctx.config.validate_auth()?;
        Ok(ctx)
    }

    /// Context for commands that work without a token (public reads, cache).
    ///
    /// A missing config file is not an error here; defaults are used.
    pub fn anonymous(opts: &GlobalOptions) -> Result<Self> {
        let config = Self::load_config(opts)?;

        let settings = ClientSettings {
            cache_enabled: !opts.no_cache,
            ..ClientSettings::from_config(&config)
        };
        let client = ApiClient::over_reqwest(settings)?;

        debug!(
            "Context ready for {} (authenticated: {})",
            config.base_url,
            client.is_authenticated()
        );

        Ok(Self {
            config,
            client,
            format: opts.format,
            config_path: opts.config.clone(),
        })
    }

    /// Load config and apply the `--base-url` override
    pub fn load_config(opts: &GlobalOptions) -> Result<Config> {
        let mut config = Config::load_or_default(opts.config_ref())?;
        if let Some(base_url) = opts.base_url_ref() {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        config.validate()?;
        Ok(config)
    }

    /// Resolved config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        Config::resolve_path(self.config_path.as_deref())
    }

    /// Persist the in-memory config back to its file
    pub fn save_config(&self) -> Result<()> {
        self.config.save_at(self.config_path.as_deref())
    }
}
