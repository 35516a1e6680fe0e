//! Shell completions for the VerseHub CLI
//!
//! Static scripts come from `versehub completion <shell>`. Dynamic TAB
//! completion of article slugs and notification IDs queries the server at
//! completion time.
//!
//! Shell support:
//! - Fish/Zsh: Full support with descriptions
//! - Bash: Values only (no description display)

use std::time::Duration;

use clap::CommandFactory;
use clap_complete::engine::{ArgValueCandidates, CompletionCandidate};

use crate::cli::{Cli, Shell};
use crate::client::ApiClient;
use crate::client::models::ArticleFilter;
use crate::config::Config;
use crate::output::formatters::truncate;

/// Maximum number of completion candidates to return
const MAX_COMPLETIONS: usize = 25;

/// Timeout for completion API calls
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(3);

/// Write a static completion script to stdout
pub fn generate(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}

/// Create a blocking runtime for completion API calls.
///
/// Completers are called synchronously by the shell.
fn blocking_runtime() -> Option<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .ok()
}

/// Client from the default config. Completions never break the shell, so
/// every failure yields no candidates.
fn completion_client(require_auth: bool) -> Option<ApiClient> {
    let config = Config::load_or_default(None).ok()?;
    if require_auth {
        config.token.as_ref()?;
    }
    ApiClient::from_config(&config).ok()
}

/// Complete article slugs, with the title as help.
///
/// Note: clap_complete handles prefix filtering - we return all candidates.
pub fn complete_article_slugs() -> Vec<CompletionCandidate> {
    let Some(client) = completion_client(false) else {
        return vec![];
    };
    let Some(rt) = blocking_runtime() else {
        return vec![];
    };

    let result = rt.block_on(async {
        tokio::time::timeout(
            COMPLETION_TIMEOUT,
            client.list_articles(&ArticleFilter::default()),
        )
        .await
    });
    let Ok(Ok(listing)) = result else {
        return vec![];
    };

    listing
        .results
        .into_iter()
        .take(MAX_COMPLETIONS)
        .map(|article| {
            CompletionCandidate::new(article.slug).help(Some(truncate(&article.title, 50).into()))
        })
        .collect()
}

/// Complete notification IDs, unread first.
pub fn complete_notification_ids() -> Vec<CompletionCandidate> {
    let Some(client) = completion_client(true) else {
        return vec![];
    };
    let Some(rt) = blocking_runtime() else {
        return vec![];
    };

    let result = rt.block_on(async {
        tokio::time::timeout(COMPLETION_TIMEOUT, client.list_notifications(None)).await
    });
    let Ok(Ok(listing)) = result else {
        return vec![];
    };

    let mut items = listing.results;
    items.sort_by_key(|n| n.read);
    items
        .into_iter()
        .take(MAX_COMPLETIONS)
        .map(|n| {
            let help = format!(
                "{}{} | {}",
                if n.read { "" } else { "● " },
                n.kind.as_str(),
                truncate(&n.title, 40)
            );
            CompletionCandidate::new(n.id.to_string()).help(Some(help.into()))
        })
        .collect()
}

pub fn article_slug_candidates() -> ArgValueCandidates {
    ArgValueCandidates::new(complete_article_slugs)
}

pub fn notification_id_candidates() -> ArgValueCandidates {
    ArgValueCandidates::new(complete_notification_ids)
}
