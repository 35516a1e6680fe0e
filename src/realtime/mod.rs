//! Realtime notification feed
//!
//! - [`channel`]: WebSocket connection loop with reconnect backoff
//! - [`center`]: optimistic read/delete operations with rollback
//! - [`store`]: capped local notification list and unread counter

pub mod center;
pub mod channel;
pub mod events;
pub mod message;
pub mod store;
pub mod transport;

pub use center::NotificationCenter;
pub use channel::{ChannelHandle, ChannelSettings, RealtimeChannel};
pub use events::{ChannelEvent, ConnectionState, EventBus};
pub use transport::WsConnector;
