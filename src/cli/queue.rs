//! Offline write queue commands

use colored::Colorize;
use serde_json::json;

use crate::cli::{CommandContext, GlobalOptions, OutputFormat};
use crate::error::{Error, Result};
use crate::models::QueuedWriteDisplay;
use crate::offline::{SyncQueue, SyncTag};
use crate::output::Formattable;
use crate::output::json::{format_json, format_json_value};

fn parse_tag(tag: Option<&str>) -> Result<Option<SyncTag>> {
    match tag {
        None => Ok(None),
        Some(raw) => SyncTag::parse(raw).map(Some).ok_or_else(|| {
            let known: Vec<&str> = SyncTag::ALL.iter().map(|t| t.as_str()).collect();
            Error::Other(format!(
                "unknown sync tag '{}' (expected one of: {})",
                raw,
                known.join(", ")
            ))
        }),
    }
}

pub fn add_comment(
    opts: &GlobalOptions,
    article: u64,
    content: &str,
    parent: Option<u64>,
) -> Result<()> {
    let mut payload = json!({ "article": article, "content": content });
    if let Some(parent) = parent {
        payload["parent"] = json!(parent);
    }
    enqueue(opts, SyncTag::PendingComments, &payload)
}

pub fn add_article(
    opts: &GlobalOptions,
    title: &str,
    content: &str,
    category: Option<u64>,
) -> Result<()> {
    let mut payload = json!({ "title": title, "content": content });
    if let Some(category) = category {
        payload["category"] = json!(category);
    }
    enqueue(opts, SyncTag::PendingArticles, &payload)
}

fn enqueue(opts: &GlobalOptions, tag: SyncTag, payload: &serde_json::Value) -> Result<()> {
    let queue = SyncQueue::open()?;
    let id = queue.enqueue(tag, payload)?;

    match opts.format {
        OutputFormat::Json => println!("{}", format_json_value(&json!({ "id": id, "tag": tag }))?),
        _ => println!(
            "{} Queued #{} under {} ({} pending)",
            "✓".green(),
            id,
            tag,
            queue.len()?
        ),
    }
    Ok(())
}

pub fn list(opts: &GlobalOptions, tag: Option<&str>) -> Result<()> {
    let queue = SyncQueue::open()?;
    let items = queue.list(parse_tag(tag)?)?;

    match opts.format {
        OutputFormat::Json => println!("{}", format_json(&items)?),
        _ => {
            let rows: Vec<QueuedWriteDisplay> = items.iter().map(QueuedWriteDisplay::from).collect();
            rows.print(opts.format)?;
        }
    }
    Ok(())
}

pub async fn flush(opts: &GlobalOptions, tag: Option<&str>) -> Result<()> {
    let tag = parse_tag(tag)?;
    let ctx = CommandContext::new(opts)?;
    let queue = SyncQueue::open()?;
    let report = queue.flush(&ctx.client, tag).await?;

    match ctx.format {
        OutputFormat::Json => println!("{}", format_json_value(&report)?),
        _ => {
            println!(
                "{} Sent {}, failed {}, {} still queued",
                if report.failed == 0 { "✓".green() } else { "⚠".yellow() },
                report.sent,
                report.failed,
                report.remaining
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tag() {
        assert_eq!(parse_tag(None).unwrap(), None);
        assert_eq!(
            parse_tag(Some("pending-articles")).unwrap(),
            Some(SyncTag::PendingArticles)
        );
        let err = parse_tag(Some("pending-likes")).unwrap_err().to_string();
        assert!(err.contains("pending-comments"));
    }
}
