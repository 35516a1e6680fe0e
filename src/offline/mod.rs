//! Offline support
//!
//! - [`router`]: caching fetch proxy with network-first, cache-first and
//!   stale-while-revalidate strategies
//! - [`queue`]: durable queue for writes made while offline

pub mod fallback;
pub mod queue;
pub mod router;
pub mod strategy;

pub use queue::{SyncQueue, SyncTag};
pub use router::OfflineRouter;
