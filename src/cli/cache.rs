//! Offline cache management commands

use colored::Colorize;

use crate::cache::CacheStorage;
use crate::cli::{CommandContext, GlobalOptions, OutputFormat, fetch};
use crate::error::Result;
use crate::models::BucketDisplay;
use crate::offline::router::BucketNames;
use crate::output::Formattable;
use crate::output::formatters::{format_bytes, format_unix_local};
use crate::output::json::format_json_value;

/// Show cache buckets and statistics
pub fn status(opts: &GlobalOptions) -> Result<()> {
    let config = CommandContext::load_config(opts)?;
    let names = BucketNames::new(&config.offline.app_name, &config.offline.version);
    let cache = CacheStorage::open()?;
    let stats = cache.stats()?;
    let path = CacheStorage::cache_dir()?.display().to_string();

    if opts.format == OutputFormat::Json {
        let buckets: Vec<BucketDisplay> = stats
            .buckets
            .iter()
            .map(|b| BucketDisplay::new(b, names.contains(&b.name)))
            .collect();
        let json = serde_json::json!({
            "path": path,
            "buckets": buckets,
            "total_entries": stats.total_entries,
            "total_size_bytes": stats.total_size_bytes,
            "total_size_human": format_bytes(stats.total_size_bytes),
            "oldest_entry_timestamp": stats.oldest_entry,
            "newest_entry_timestamp": stats.newest_entry,
        });
        println!("{}", format_json_value(&json)?);
        return Ok(());
    }

    println!("Cache Status");
    println!("────────────────────────────────────────");
    println!("Location:       {}", path);
    println!("Entries:        {}", stats.total_entries);
    println!("Total size:     {}", format_bytes(stats.total_size_bytes));
    if let Some(oldest) = stats.oldest_entry {
        println!("Oldest entry:   {}", format_unix_local(oldest));
    }
    if let Some(newest) = stats.newest_entry {
        println!("Newest entry:   {}", format_unix_local(newest));
    }
    println!();

    let rows: Vec<BucketDisplay> = stats
        .buckets
        .iter()
        .map(|b| BucketDisplay::new(b, names.contains(&b.name)))
        .collect();
    rows.print(opts.format)
}

/// Clear all cache entries
pub fn clear(format: OutputFormat) -> Result<()> {
    let cache = CacheStorage::open()?;
    let stats = cache.clear_all()?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "entries_removed": stats.entries_removed,
                "buckets_removed": stats.buckets_removed,
                "success": true,
            });
            println!("{}", format_json_value(&json)?);
        }
        _ => {
            if stats.entries_removed > 0 || stats.buckets_removed > 0 {
                println!(
                    "Cleared {} cache entries from {} bucket(s)",
                    stats.entries_removed, stats.buckets_removed
                );
            } else {
                println!("Cache was already empty");
            }
        }
    }

    Ok(())
}

/// Show cache path
pub fn path() -> Result<()> {
    println!("{}", CacheStorage::cache_dir()?.display());
    Ok(())
}

/// Precache the configured asset list, then activate
pub async fn install(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::anonymous(opts)?;
    let router = fetch::router(&ctx)?;

    let installed = router.install().await?;
    let activated = router.activate()?;

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "cached": installed.cached,
                "purged": activated.purged,
                "state": format!("{:?}", router.state()),
            });
            println!("{}", format_json_value(&json)?);
        }
        _ => {
            println!(
                "{} Precached {} asset(s) into {}",
                "✓".green(),
                installed.cached.len(),
                router.names().precache.bold()
            );
            report_purged(&activated.purged, activated.entries_removed);
        }
    }
    Ok(())
}

/// Purge buckets that belong to other cache versions
pub async fn activate(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::anonymous(opts)?;
    let router = fetch::router(&ctx)?;
    let report = router.activate()?;

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "purged": report.purged,
                "entries_removed": report.entries_removed,
            });
            println!("{}", format_json_value(&json)?);
        }
        _ => {
            println!("{} Cache version {} active", "✓".green(), ctx.config.offline.version);
            report_purged(&report.purged, report.entries_removed);
        }
    }
    Ok(())
}

fn report_purged(purged: &[String], entries: usize) {
    if purged.is_empty() {
        return;
    }
    println!(
        "  Removed {} old bucket(s) ({} entries): {}",
        purged.len(),
        entries,
        purged.join(", ").dimmed()
    );
}
