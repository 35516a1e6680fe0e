//! Typed events published by the realtime channel

use std::time::Duration;

use log::debug;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::client::models::Notification;

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        write!(f, "{}", s)
    }
}

/// Optimistic operations that can be rolled back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimisticOp {
    MarkRead(u64),
    MarkAllRead,
    Delete(u64),
}

#[derive(Debug, Clone)]
pub enum ChannelEvent {
    StateChanged(ConnectionState),
    NotificationReceived(Notification),
    /// In-app toast for a freshly pushed notification
    Toast {
        title: String,
        message: String,
    },
    /// OS-level notification; only emitted when push permission is granted
    PlatformNotification(Notification),
    UnreadCountChanged(u64),
    NotificationMarkedRead(u64),
    ReconnectScheduled {
        attempt: u32,
        delay: Duration,
    },
    ReconnectExhausted {
        attempts: u32,
    },
    RollbackApplied {
        op: OptimisticOp,
        reason: String,
    },
}

/// Broadcast fan-out for [`ChannelEvent`]
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChannelEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish, ignoring whether anyone is listening
    pub fn publish(&self, event: ChannelEvent) {
        if self.tx.send(event).is_err() {
            debug!("No realtime subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.tx.subscribe()
    }
}
