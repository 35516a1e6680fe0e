//! CLI command definitions and handlers

use clap::{Parser, Subcommand};
pub use clap_complete::Shell;

use completions::{article_slug_candidates, notification_id_candidates};

pub mod args;
pub mod articles;
pub mod auth;
pub mod cache;
pub mod completions;
pub mod context;
pub mod fetch;
pub mod init;
pub mod notifications;
pub mod queue;
pub mod status;

pub use args::{AcceptKind, GlobalOptions, OutputFormat, PageArgs};
pub use context::CommandContext;

/// VerseHub CLI - command-line companion for the DjangoVerseHub platform
#[derive(Parser, Debug)]
#[command(name = "versehub")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, table, json)
    #[arg(
        long,
        global = true,
        env = "VERSEHUB_FORMAT",
        default_value = "table",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "VERSEHUB_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "VERSEHUB_DEBUG", hide_env = true)]
    pub debug: bool,

    /// Bypass the response cache, fetch fresh data from the server
    #[arg(long, global = true, env = "VERSEHUB_NO_CACHE", hide_env = true)]
    pub no_cache: bool,

    /// Override the server root (e.g. http://localhost:8000)
    #[arg(long, global = true, env = "VERSEHUB_BASE_URL", hide_env = true)]
    pub base_url: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize VerseHub configuration
    Init,

    /// Show authentication and configuration status
    Status,

    /// Display version information
    Version,

    /// Log in and store the API token
    Login {
        /// Account email
        #[arg(long, short = 'e')]
        email: Option<String>,

        /// Password (prompted when omitted)
        #[arg(long, env = "VERSEHUB_PASSWORD", hide_env = true)]
        password: Option<String>,
    },

    /// Log out and forget the stored token
    Logout,

    /// Browse articles
    #[command(subcommand)]
    Articles(ArticleCommands),

    /// Search articles, users and comments
    Search {
        /// Search query
        query: String,

        /// Restrict to one result type (articles, users, comments)
        #[arg(long = "type", short = 't')]
        kind: Option<String>,
    },

    /// View and manage notifications
    #[command(subcommand)]
    Notifications(NotificationCommands),

    /// Fetch a URL through the offline cache router
    Fetch {
        /// Absolute URL or path on the configured server
        url: String,

        /// Content type to request
        #[arg(long, value_enum, default_value = "any")]
        accept: AcceptKind,

        /// Write the body to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<String>,
    },

    /// Manage the offline cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Manage writes queued while offline
    #[command(subcommand)]
    Queue(QueueCommands),

    /// Generate shell completions
    #[command(after_help = "\
Examples:
  bash:   versehub completion bash > /etc/bash_completion.d/versehub
  zsh:    versehub completion zsh > \"${fpath[1]}/_versehub\"
  fish:   versehub completion fish > ~/.config/fish/completions/versehub.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Article subcommands
#[derive(Subcommand, Debug)]
pub enum ArticleCommands {
    /// List published articles
    List {
        /// Filter by category slug
        #[arg(long, short = 'c')]
        category: Option<String>,

        /// Full-text filter
        #[arg(long, short = 's')]
        search: Option<String>,

        /// Ordering field, prefix with '-' for descending (e.g. -published_at)
        #[arg(long)]
        ordering: Option<String>,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Show one article
    Get {
        /// Article slug
        #[arg(add = article_slug_candidates())]
        slug: String,
    },
}

/// Notification subcommands
#[derive(Subcommand, Debug)]
pub enum NotificationCommands {
    /// List notifications
    List {
        /// Only show unread notifications
        #[arg(long, short = 'u')]
        unread: bool,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Show the unread count
    Count,

    /// Mark one notification read
    Read {
        /// Notification ID
        #[arg(add = notification_id_candidates())]
        id: u64,
    },

    /// Mark every notification read
    ReadAll,

    /// Delete a notification
    Delete {
        /// Notification ID
        #[arg(add = notification_id_candidates())]
        id: u64,
    },

    /// Stream notifications over the realtime channel until interrupted
    Watch,

    /// Register a push subscription and record notification permission
    Subscribe {
        /// Push service endpoint
        #[arg(long)]
        endpoint: String,

        /// Client public key (base64url)
        #[arg(long)]
        p256dh: String,

        /// Client auth secret (base64url)
        #[arg(long)]
        auth: String,

        /// Deny platform notifications instead of granting them
        #[arg(long)]
        deny: bool,
    },
}

/// Offline cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache buckets and sizes
    Status,

    /// Remove every cached response
    Clear,

    /// Print the cache directory
    Path,

    /// Precache the configured asset list
    Install,

    /// Purge buckets from older cache versions
    Activate,
}

/// Sync queue subcommands
#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// Queue a comment for later delivery
    AddComment {
        /// Article ID the comment belongs to
        #[arg(long)]
        article: u64,

        /// Comment text
        content: String,

        /// Parent comment ID for replies
        #[arg(long)]
        parent: Option<u64>,
    },

    /// Queue an article draft for later delivery
    AddArticle {
        #[arg(long)]
        title: String,

        #[arg(long)]
        content: String,

        /// Category ID
        #[arg(long)]
        category: Option<u64>,
    },

    /// List queued writes
    List {
        /// Only one tag (pending-comments, pending-articles)
        #[arg(long)]
        tag: Option<String>,
    },

    /// Send queued writes to the server
    Flush {
        /// Only one tag (pending-comments, pending-articles)
        #[arg(long)]
        tag: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_articles_list() {
        let cli = Cli::try_parse_from([
            "versehub",
            "articles",
            "list",
            "--category",
            "tutorials",
            "-p",
            "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Articles(ArticleCommands::List { category, page, .. }) => {
                assert_eq!(category.as_deref(), Some("tutorials"));
                assert_eq!(page.page, Some(2));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_fetch_accept() {
        let cli =
            Cli::try_parse_from(["versehub", "fetch", "/articles/", "--accept", "html"]).unwrap();
        match cli.command {
            Commands::Fetch { url, accept, .. } => {
                assert_eq!(url, "/articles/");
                assert_eq!(accept, AcceptKind::Html);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_notification_read_requires_id() {
        assert!(Cli::try_parse_from(["versehub", "notifications", "read"]).is_err());
        assert!(Cli::try_parse_from(["versehub", "notifications", "read", "7"]).is_ok());
    }
}
