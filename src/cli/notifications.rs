//! Notification commands, including the realtime `watch` stream

use std::sync::Arc;

use colored::Colorize;
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::{CommandContext, GlobalOptions, OutputFormat, PageArgs};
use crate::client::models::{Notification, PushKeys, PushSubscription};
use crate::config::PushPermission;
use crate::error::Result;
use crate::models::NotificationDisplay;
use crate::output::Formattable;
use crate::output::formatters::format_delay;
use crate::output::json::format_json_value;
use crate::realtime::{
    ChannelEvent, ChannelSettings, NotificationCenter, RealtimeChannel, WsConnector,
};

pub async fn list(opts: &GlobalOptions, unread: bool, page: &PageArgs) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let listing = ctx.client.list_notifications(page.page).await?;

    let items: Vec<Notification> = listing
        .results
        .into_iter()
        .filter(|n| !unread || !n.read)
        .collect();
    let rows: Vec<NotificationDisplay> = page
        .take(items)
        .iter()
        .map(NotificationDisplay::from)
        .collect();
    rows.print(ctx.format)
}

pub async fn count(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let unread = ctx.client.unread_count().await?;

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({ "unread_count": unread });
            println!("{}", format_json_value(&json)?);
        }
        _ => println!("{}", unread),
    }
    Ok(())
}

pub async fn read(opts: &GlobalOptions, id: u64) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    ctx.client.mark_notification_read(id).await?;
    println!("{} Notification {} marked read", "✓".green(), id);
    Ok(())
}

pub async fn read_all(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let marked = ctx.client.mark_all_notifications_read().await?;

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({ "marked_count": marked, "success": true });
            println!("{}", format_json_value(&json)?);
        }
        _ => println!("{} Marked {} notification(s) read", "✓".green(), marked),
    }
    Ok(())
}

pub async fn delete(opts: &GlobalOptions, id: u64) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    ctx.client.delete_notification(id).await?;
    println!("{} Notification {} deleted", "✓".green(), id);
    Ok(())
}

/// Record the platform permission and, when granted, register the
/// subscription with the server
pub async fn subscribe(
    opts: &GlobalOptions,
    endpoint: String,
    p256dh: String,
    auth: String,
    deny: bool,
) -> Result<()> {
    let mut ctx = CommandContext::new(opts)?;

    if deny {
        ctx.config.push_permission = PushPermission::Denied;
        ctx.config.push_endpoint = None;
        ctx.save_config()?;
        println!("{} Desktop notifications disabled", "○".dimmed());
        return Ok(());
    }

    let subscription = PushSubscription {
        endpoint,
        expiration_time: None,
        keys: PushKeys { p256dh, auth },
    };
    ctx.client.subscribe_push(&subscription).await?;

    ctx.config.push_permission = PushPermission::Granted;
    ctx.config.push_endpoint = Some(subscription.endpoint);
    ctx.save_config()?;
    println!("{} Push subscription registered", "✓".green());
    Ok(())
}

/// Stream realtime notifications until Ctrl-C or reconnects run out.
///
/// Lines typed on stdin (`read <id>`, `read-all`, `delete <id>`) are applied
/// optimistically and rolled back if the server refuses them.
pub async fn watch(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let settings = ChannelSettings::from_config(&ctx.config)?;
    let connector = Arc::new(WsConnector::new(ctx.config.token.clone()));
    info!("Watching {}", settings.url);

    let channel = RealtimeChannel::new(connector, settings);
    let mut events = channel.subscribe();
    let center = NotificationCenter::new(ctx.client.clone(), channel.store(), channel.events());
    if let Err(e) = center.refresh().await {
        warn!("Could not load notifications: {}", e);
    }

    let mut handle = channel.start();
    if ctx.format != OutputFormat::Json {
        println!(
            "{}",
            "Watching notifications. Commands: read <id>, read-all, delete <id>. Ctrl-C to stop."
                .dimmed()
        );
        println!("Unread: {}", center.unread().to_string().bold());
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = input.next_line(), if stdin_open => match line {
                Ok(Some(line)) => run_action(&center, line.trim()).await,
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("stdin closed: {}", e);
                    stdin_open = false;
                }
            },
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event, ctx.format)?;
                    if matches!(event, ChannelEvent::ReconnectExhausted { .. }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("Dropped {} realtime events", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.close().await;
    Ok(())
}

async fn run_action(center: &NotificationCenter, line: &str) {
    let mut parts = line.split_whitespace();
    let result = match (parts.next(), parts.next().map(str::parse::<u64>)) {
        (Some("read"), Some(Ok(id))) => center.mark_read(id).await,
        (Some("read-all"), None) => center.mark_all_read().await,
        (Some("delete"), Some(Ok(id))) => center.delete(id).await,
        (None, _) => return,
        _ => {
            eprintln!("Unknown command: {}", line);
            return;
        }
    };
    if let Err(e) = result {
        warn!("'{}' failed: {}", line, e);
    }
}

fn print_event(event: &ChannelEvent, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string(&event_json(event))?);
        return Ok(());
    }

    match event {
        ChannelEvent::StateChanged(state) => println!("{} {}", "●".dimmed(), state),
        ChannelEvent::Toast { title, message } => {
            println!("{} {} {}", "▶".cyan(), title.bold(), message)
        }
        ChannelEvent::PlatformNotification(n) => {
            // Terminal bell stands in for the desktop notification
            print!("\x07");
            println!("{} {}", "🔔".yellow(), n.title.bold());
        }
        ChannelEvent::UnreadCountChanged(count) => {
            println!("Unread: {}", count.to_string().bold())
        }
        ChannelEvent::NotificationMarkedRead(id) => println!("{} read", id),
        ChannelEvent::ReconnectScheduled { attempt, delay } => println!(
            "{} reconnecting in {} (attempt {})",
            "⚠".yellow(),
            format_delay(*delay),
            attempt
        ),
        ChannelEvent::ReconnectExhausted { attempts } => println!(
            "{} gave up after {} reconnect attempts",
            "✗".red(),
            attempts
        ),
        ChannelEvent::RollbackApplied { op, reason } => {
            println!("{} undone {:?}: {}", "↶".red(), op, reason)
        }
        // Shown through the toast
        ChannelEvent::NotificationReceived(_) => {}
    }
    Ok(())
}

fn event_json(event: &ChannelEvent) -> serde_json::Value {
    use serde_json::json;
    match event {
        ChannelEvent::StateChanged(state) => json!({"event": "state", "state": state}),
        ChannelEvent::NotificationReceived(n) => json!({"event": "notification", "notification": n}),
        ChannelEvent::Toast { title, message } => {
            json!({"event": "toast", "title": title, "message": message})
        }
        ChannelEvent::PlatformNotification(n) => json!({"event": "platform", "id": n.id}),
        ChannelEvent::UnreadCountChanged(count) => json!({"event": "unread", "count": count}),
        ChannelEvent::NotificationMarkedRead(id) => json!({"event": "read", "id": id}),
        ChannelEvent::ReconnectScheduled { attempt, delay } => json!({
            "event": "reconnect_scheduled",
            "attempt": attempt,
            "delay_ms": delay.as_millis() as u64,
        }),
        ChannelEvent::ReconnectExhausted { attempts } => {
            json!({"event": "reconnect_exhausted", "attempts": attempts})
        }
        ChannelEvent::RollbackApplied { op, reason } => {
            json!({"event": "rollback", "op": op, "reason": reason})
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::realtime::ConnectionState;
    use crate::realtime::events::OptimisticOp;

    #[test]
    fn test_event_json_shapes() {
        let scheduled = event_json(&ChannelEvent::ReconnectScheduled {
            attempt: 2,
            delay: Duration::from_millis(2250),
        });
        assert_eq!(scheduled["event"], "reconnect_scheduled");
        assert_eq!(scheduled["delay_ms"], 2250);

        let state = event_json(&ChannelEvent::StateChanged(ConnectionState::Reconnecting));
        assert_eq!(state["state"], "reconnecting");

        let rollback = event_json(&ChannelEvent::RollbackApplied {
            op: OptimisticOp::MarkRead(7),
            reason: "Not found.".to_string(),
        });
        assert_eq!(rollback["op"]["mark_read"], 7);
    }
}
