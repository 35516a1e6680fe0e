//! Status command implementation

use colored::Colorize;

use crate::cache::CacheStorage;
use crate::cli::{GlobalOptions, OutputFormat};
use crate::config::{Config, PushPermission};
use crate::error::Result;
use crate::offline::SyncQueue;
use crate::output::json::format_json_value;

/// Run the status command to display configuration status
pub fn run(opts: &GlobalOptions) -> Result<()> {
    let config_path = Config::resolve_path(opts.config_ref())?;
    let loaded = Config::load_at(opts.config_ref());
    let pending = SyncQueue::open().and_then(|q| q.len()).ok();

    if opts.format == OutputFormat::Json {
        let config = loaded.as_ref().ok();
        let json = serde_json::json!({
            "config_path": config_path.display().to_string(),
            "configured": config.is_some(),
            "base_url": config
                .map(|c| c.base_url.clone())
                .or_else(|| opts.base_url.clone()),
            "authenticated": config.map(|c| c.token.is_some()).unwrap_or(false),
            "push_permission": config.map(|c| c.push_permission),
            "cache_dir": CacheStorage::cache_dir().ok().map(|p| p.display().to_string()),
            "queued_writes": pending,
        });
        println!("{}", format_json_value(&json)?);
        return Ok(());
    }

    println!("{}\n", "VerseHub Configuration Status".bold());

    match loaded {
        Ok(mut config) => {
            if let Some(base_url) = opts.base_url_ref() {
                config.base_url = base_url.to_string();
            }
            println!("Config file: {}", config_path.display().to_string().cyan());
            println!("Server:      {}", config.base_url.cyan());
            println!();

            if config.token.is_some() {
                println!("{} Logged in (API token stored)", "✓".green());
            } else {
                println!("{} Not logged in", "✗".red());
                println!("  → Run 'versehub login' to authenticate");
            }

            match config.push_permission {
                PushPermission::Granted => {
                    println!("{} Desktop notifications allowed", "✓".green())
                }
                PushPermission::Denied => {
                    println!("{} Desktop notifications denied", "○".dimmed())
                }
                PushPermission::Default => {
                    println!("{} Desktop notifications not decided", "○".dimmed());
                    println!("  → Run 'versehub notifications subscribe' to enable");
                }
            }

            if let Some(ref endpoint) = config.push_endpoint {
                println!("{} Push subscription: {}", "✓".green(), endpoint.dimmed());
            }

            match pending {
                Some(0) | None => {}
                Some(n) => {
                    println!(
                        "{} {} write(s) queued offline",
                        "⚠".yellow(),
                        n.to_string().bold()
                    );
                    println!("  → Run 'versehub queue flush' to send them");
                }
            }
            println!();
        }
        Err(_) => {
            println!("{} Configuration not found", "✗".red());
            println!();
            println!(
                "Run {} to create a configuration file.",
                "versehub init".cyan()
            );
            println!();
        }
    }

    Ok(())
}
