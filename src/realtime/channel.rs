//! Realtime notification channel
//!
//! Maintains one WebSocket connection to the notification endpoint,
//! reconnecting with backoff after any close the client did not initiate.
//! Inbound envelopes are applied to the shared [`NotificationStore`] in
//! arrival order and announced on the [`EventBus`].

use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::events::{ChannelEvent, ConnectionState, EventBus};
use super::message::{ClientMessage, ServerMessage};
use super::store::{NotificationSnapshot, NotificationStore};
use super::transport::{Connection, Connector, Frame};
use crate::backoff::BackoffPolicy;
use crate::config::{Config, PushPermission};
use crate::error::Result;

pub type SharedStore = Arc<Mutex<NotificationStore>>;

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub url: String,
    pub reconnect: BackoffPolicy,
    pub max_notifications: usize,
    pub push_permission: PushPermission,
}

impl ChannelSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            url: config.websocket_url()?,
            reconnect: config.realtime.reconnect_policy(),
            max_notifications: config.realtime.max_notifications,
            push_permission: config.push_permission,
        })
    }
}

/// A configured, not yet started channel
pub struct RealtimeChannel {
    connector: Arc<dyn Connector>,
    settings: ChannelSettings,
    store: SharedStore,
    events: EventBus,
}

impl RealtimeChannel {
    pub fn new(connector: Arc<dyn Connector>, settings: ChannelSettings) -> Self {
        let store = Arc::new(Mutex::new(NotificationStore::new(settings.max_notifications)));
        Self {
            connector,
            settings,
            store,
            events: EventBus::default(),
        }
    }

    /// Subscribe before [`start`](Self::start) to observe every event
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    /// Spawn the connection loop
    pub fn start(self) -> ChannelHandle {
        let shutdown = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let worker = Worker {
            connector: self.connector,
            settings: self.settings,
            store: self.store.clone(),
            events: self.events.clone(),
            state: state_tx,
            attempts: 0,
        };
        let task = tokio::spawn(worker.run(shutdown.clone()));

        ChannelHandle {
            shutdown,
            task: Some(task),
            state: state_rx,
            store: self.store,
            events: self.events,
        }
    }
}

/// Handle to a running channel
pub struct ChannelHandle {
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
    state: watch::Receiver<ConnectionState>,
    store: SharedStore,
    events: EventBus,
}

impl ChannelHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// Tear down. No reconnect follows a client close.
    pub async fn close(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Realtime task ended abnormally: {}", e);
            }
        }
    }

    /// Wait until the channel stops on its own (reconnects exhausted)
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Realtime task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Why a connection ended
enum Ended {
    ByClient,
    ByServer,
}

struct Worker {
    connector: Arc<dyn Connector>,
    settings: ChannelSettings,
    store: SharedStore,
    events: EventBus,
    state: watch::Sender<ConnectionState>,
    attempts: u32,
}

impl Worker {
    async fn run(mut self, shutdown: CancellationToken) {
        loop {
            self.set_state(ConnectionState::Connecting);

            let connected = tokio::select! {
                result = self.connector.connect(&self.settings.url) => result,
                _ = shutdown.cancelled() => break,
            };

            match connected {
                Ok(mut conn) => {
                    self.attempts = 0;
                    self.set_state(ConnectionState::Connected);
                    info!("Realtime channel connected to {}", self.settings.url);

                    if let Ended::ByClient = self.pump(conn.as_mut(), &shutdown).await {
                        conn.close().await;
                        break;
                    }
                }
                Err(e) => warn!("Realtime connect failed: {}", e),
            }

            let policy = self.settings.reconnect;
            if !policy.allows(self.attempts) {
                warn!(
                    "Giving up on realtime channel after {} reconnect attempts",
                    self.attempts
                );
                self.set_state(ConnectionState::Disconnected);
                self.events.publish(ChannelEvent::ReconnectExhausted {
                    attempts: self.attempts,
                });
                return;
            }

            let delay = policy.delay_for(self.attempts);
            self.attempts += 1;
            debug!(
                "Reconnecting in {:?} (attempt {}/{})",
                delay,
                self.attempts,
                policy.max_attempts()
            );
            self.set_state(ConnectionState::Reconnecting);
            self.events.publish(ChannelEvent::ReconnectScheduled {
                attempt: self.attempts,
                delay,
            });

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        self.set_state(ConnectionState::Disconnected);
    }

    /// Read frames until the connection ends
    async fn pump(&self, conn: &mut dyn Connection, shutdown: &CancellationToken) -> Ended {
        loop {
            let frame = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ended::ByClient,
                frame = conn.next_frame() => frame,
            };

            match frame {
                Frame::Text(text) => {
                    if let Some(reply) = self.handle_text(&text) {
                        if let Err(e) = conn.send_text(reply.to_text()).await {
                            warn!("Failed to send realtime reply: {}", e);
                            return Ended::ByServer;
                        }
                    }
                }
                Frame::Closed(code) => {
                    info!("Realtime connection closed by server (code {:?})", code);
                    return Ended::ByServer;
                }
                Frame::Error(e) => {
                    warn!("Realtime connection error: {}", e);
                    return Ended::ByServer;
                }
            }
        }
    }

    fn handle_text(&self, text: &str) -> Option<ClientMessage> {
        match ServerMessage::parse(text) {
            Ok(message) => apply_message(
                &self.store,
                &self.events,
                self.settings.push_permission,
                message,
            ),
            Err(e) => {
                warn!("Dropping malformed realtime payload: {}", e);
                None
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            self.events.publish(ChannelEvent::StateChanged(state));
        }
    }
}

/// Apply one envelope to the store and publish what changed. Returns a
/// reply to send back, if any.
pub fn apply_message(
    store: &SharedStore,
    events: &EventBus,
    push_permission: PushPermission,
    message: ServerMessage,
) -> Option<ClientMessage> {
    match message {
        ServerMessage::Notification { notification } => {
            let unread = {
                let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
                store.push(notification.clone());
                store.unread()
            };
            events.publish(ChannelEvent::Toast {
                title: notification.title.clone(),
                message: notification.message.clone(),
            });
            if push_permission == PushPermission::Granted {
                events.publish(ChannelEvent::PlatformNotification(notification.clone()));
            }
            events.publish(ChannelEvent::NotificationReceived(notification));
            events.publish(ChannelEvent::UnreadCountChanged(unread));
            None
        }
        ServerMessage::NotificationRead { notification_id } => {
            let unread = {
                let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
                store.mark_read(notification_id);
                store.unread()
            };
            events.publish(ChannelEvent::NotificationMarkedRead(notification_id));
            events.publish(ChannelEvent::UnreadCountChanged(unread));
            None
        }
        ServerMessage::NotificationCount { count } => {
            store
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .set_unread(count);
            events.publish(ChannelEvent::UnreadCountChanged(count));
            None
        }
        ServerMessage::Ping => Some(ClientMessage::Pong),
        ServerMessage::Unknown => {
            debug!("Ignoring realtime message of unknown type");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::{broadcast, mpsc};

    use super::*;
    use crate::realtime::transport::scripted::{ScriptedConnector, Session};

    fn settings(permission: PushPermission) -> ChannelSettings {
        ChannelSettings {
            url: "ws://api.test/ws/notifications/".to_string(),
            reconnect: BackoffPolicy::reconnect(Duration::from_millis(1000), 5),
            max_notifications: 50,
            push_permission: permission,
        }
    }

    fn text(value: serde_json::Value) -> Frame {
        Frame::Text(value.to_string())
    }

    fn notification_frame(id: u64, read: bool) -> Frame {
        text(serde_json::json!({
            "type": "notification",
            "notification": {
                "id": id, "read": read, "type": "like",
                "title": "X", "message": "Y", "created_at": "2025-01-01T00:00:00Z"
            }
        }))
    }

    /// Receive until an event matches, skipping others
    async fn wait_for<F>(rx: &mut broadcast::Receiver<ChannelEvent>, mut pred: F) -> ChannelEvent
    where
        F: FnMut(&ChannelEvent) -> bool,
    {
        loop {
            let event = rx.recv().await.unwrap();
            if pred(&event) {
                return event;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pushed_notification_prepends_and_counts() {
        let connector = Arc::new(ScriptedConnector::new(vec![Session::Frames(vec![
            notification_frame(1, true),
            notification_frame(7, false),
        ])]));
        let channel = RealtimeChannel::new(connector, settings(PushPermission::Default));
        let mut rx = channel.subscribe();
        let mut handle = channel.start();

        wait_for(&mut rx, |e| {
            matches!(e, ChannelEvent::NotificationReceived(n) if n.id == 7)
        })
        .await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.unread_count, 1);
        assert_eq!(snapshot.notifications[0].id, 7);
        assert_eq!(handle.state(), ConnectionState::Connected);

        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_platform_notification_requires_permission() {
        let connector = Arc::new(ScriptedConnector::new(vec![Session::Frames(vec![
            notification_frame(1, false),
        ])]));
        let channel = RealtimeChannel::new(connector, settings(PushPermission::Granted));
        let mut rx = channel.subscribe();
        let mut handle = channel.start();

        let event = wait_for(&mut rx, |e| {
            matches!(
                e,
                ChannelEvent::PlatformNotification(_) | ChannelEvent::NotificationReceived(_)
            )
        })
        .await;
        assert!(matches!(event, ChannelEvent::PlatformNotification(n) if n.id == 1));
        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_platform_notification_without_permission() {
        let store: SharedStore = Arc::new(Mutex::new(NotificationStore::default()));
        let events = EventBus::default();
        let mut rx = events.subscribe();

        let message = ServerMessage::parse(
            r#"{"type":"notification","notification":{"id":2,"type":"system"}}"#,
        )
        .unwrap();
        apply_message(&store, &events, PushPermission::Denied, message);

        let mut seen = vec![];
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        assert!(seen.iter().any(|e| matches!(e, ChannelEvent::Toast { .. })));
        assert!(
            !seen
                .iter()
                .any(|e| matches!(e, ChannelEvent::PlatformNotification(_)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_read_and_malformed_messages() {
        let connector = Arc::new(ScriptedConnector::new(vec![Session::Frames(vec![
            notification_frame(3, false),
            Frame::Text("{not json".to_string()),
            text(serde_json::json!({"type": "presence", "online": 4})),
            text(serde_json::json!({"type": "notification_read", "notification_id": 3})),
            text(serde_json::json!({"type": "unread_count", "count": 9})),
        ])]));
        let channel = RealtimeChannel::new(connector, settings(PushPermission::Default));
        let mut rx = channel.subscribe();
        let mut handle = channel.start();

        wait_for(&mut rx, |e| matches!(e, ChannelEvent::UnreadCountChanged(9))).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.unread_count, 9);
        assert!(snapshot.notifications[0].read);
        assert_eq!(handle.state(), ConnectionState::Connected);
        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_gets_pong() {
        let (tx, rx_frames) = mpsc::unbounded_channel();
        let connector = Arc::new(ScriptedConnector::new(vec![Session::Live(rx_frames)]));
        let channel = RealtimeChannel::new(connector.clone(), settings(PushPermission::Default));
        let mut rx = channel.subscribe();
        let mut handle = channel.start();

        wait_for(&mut rx, |e| {
            matches!(e, ChannelEvent::StateChanged(ConnectionState::Connected))
        })
        .await;

        tx.send(text(serde_json::json!({"type": "ping"}))).unwrap();
        // A later frame is only read once the pong went out
        tx.send(text(serde_json::json!({"type": "notification_count", "count": 1})))
            .unwrap();
        wait_for(&mut rx, |e| matches!(e, ChannelEvent::UnreadCountChanged(1))).await;

        assert_eq!(connector.sent(), vec![r#"{"type":"pong"}"#.to_string()]);
        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_backoff_until_exhausted() {
        let connector = Arc::new(ScriptedConnector::new(vec![Session::Frames(vec![
            Frame::Closed(Some(1006)),
        ])]));
        let channel = RealtimeChannel::new(connector.clone(), settings(PushPermission::Default));
        let mut rx = channel.subscribe();
        let mut handle = channel.start();

        let mut delays = vec![];
        loop {
            match rx.recv().await.unwrap() {
                ChannelEvent::ReconnectScheduled { delay, .. } => delays.push(delay),
                ChannelEvent::ReconnectExhausted { attempts } => {
                    assert_eq!(attempts, 5);
                    break;
                }
                _ => {}
            }
        }
        handle.finished().await;

        let policy = BackoffPolicy::reconnect(Duration::from_millis(1000), 5);
        let expected: Vec<Duration> = policy.delays().collect();
        assert_eq!(delays, expected);
        // Attempt 2 of 5 waits base × 1.5²
        assert_eq!(delays[2], Duration::from_millis(2250));

        // One successful open followed by five refused reconnects
        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 6);
        for (i, pair) in attempts.windows(2).enumerate() {
            assert!(pair[1] - pair[0] >= expected[i]);
        }
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_open_resets_attempts() {
        let connector = Arc::new(ScriptedConnector::new(vec![
            Session::Frames(vec![Frame::Closed(None)]),
            Session::Refuse,
            Session::Frames(vec![Frame::Error("reset".to_string())]),
            Session::Frames(vec![]),
        ]));
        let channel = RealtimeChannel::new(connector.clone(), settings(PushPermission::Default));
        let mut rx = channel.subscribe();
        let mut handle = channel.start();

        let mut delays = vec![];
        while delays.len() < 3 {
            if let ChannelEvent::ReconnectScheduled { delay, .. } = rx.recv().await.unwrap() {
                delays.push(delay);
            }
        }
        // close → base, refused → base × 1.5, reopened then errored → base again
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(1500),
                Duration::from_millis(1000)
            ]
        );

        wait_for(&mut rx, |e| {
            matches!(e, ChannelEvent::StateChanged(ConnectionState::Connected))
        })
        .await;
        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_close_never_reconnects() {
        let connector = Arc::new(ScriptedConnector::new(vec![Session::Frames(vec![])]));
        let channel = RealtimeChannel::new(connector.clone(), settings(PushPermission::Default));
        let mut rx = channel.subscribe();
        let mut handle = channel.start();

        wait_for(&mut rx, |e| {
            matches!(e, ChannelEvent::StateChanged(ConnectionState::Connected))
        })
        .await;
        handle.close().await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.attempts().len(), 1);
        assert_eq!(connector.client_closes(), 1);
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        while let Ok(event) = rx.try_recv() {
            assert!(!matches!(event, ChannelEvent::ReconnectScheduled { .. }));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_backoff_stops_reconnects() {
        let connector = Arc::new(ScriptedConnector::new(vec![]));
        let channel = RealtimeChannel::new(connector.clone(), settings(PushPermission::Default));
        let mut rx = channel.subscribe();
        let mut handle = channel.start();

        wait_for(&mut rx, |e| matches!(e, ChannelEvent::ReconnectScheduled { .. })).await;
        handle.close().await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.attempts().len(), 1);
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }
}
