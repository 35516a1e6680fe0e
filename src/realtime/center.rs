//! Optimistic notification operations
//!
//! Each operation changes the local store first and then asks the server to
//! confirm. When the server refuses, the local change is undone and a
//! [`ChannelEvent::RollbackApplied`] is published.

use std::sync::PoisonError;

use log::warn;

use super::channel::SharedStore;
use super::events::{ChannelEvent, EventBus, OptimisticOp};
use super::store::Undo;
use crate::client::ApiClient;
use crate::error::ApiError;

pub struct NotificationCenter {
    client: ApiClient,
    store: SharedStore,
    events: EventBus,
}

impl NotificationCenter {
    pub fn new(client: ApiClient, store: SharedStore, events: EventBus) -> Self {
        Self {
            client,
            store,
            events,
        }
    }

    /// Seed the store from the server listing and unread count
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let page = self.client.list_notifications(None).await?;
        let unread = self.client.unread_count().await?;
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .load(page.results, unread);
        self.events.publish(ChannelEvent::UnreadCountChanged(unread));
        Ok(())
    }

    pub async fn mark_read(&self, id: u64) -> Result<(), ApiError> {
        let undo = self.apply(|store| store.mark_read(id));
        if undo.is_some() {
            self.events.publish(ChannelEvent::NotificationMarkedRead(id));
            self.publish_unread();
        }
        let result = self.client.mark_notification_read(id).await;
        self.settle(OptimisticOp::MarkRead(id), undo, result)
    }

    pub async fn mark_all_read(&self) -> Result<(), ApiError> {
        let undo = self.apply(|store| Some(store.mark_all_read()));
        self.publish_unread();
        let result = self.client.mark_all_notifications_read().await.map(|_| ());
        self.settle(OptimisticOp::MarkAllRead, undo, result)
    }

    pub async fn delete(&self, id: u64) -> Result<(), ApiError> {
        let undo = self.apply(|store| store.remove(id));
        if undo.is_some() {
            self.publish_unread();
        }
        let result = self.client.delete_notification(id).await;
        self.settle(OptimisticOp::Delete(id), undo, result)
    }

    pub fn unread(&self) -> u64 {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unread()
    }

    fn apply<F>(&self, change: F) -> Option<Undo>
    where
        F: FnOnce(&mut super::store::NotificationStore) -> Option<Undo>,
    {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        change(&mut store)
    }

    fn settle(
        &self,
        op: OptimisticOp,
        undo: Option<Undo>,
        result: Result<(), ApiError>,
    ) -> Result<(), ApiError> {
        if let Err(ref err) = result {
            warn!("{:?} failed, rolling back: {}", op, err);
            if let Some(undo) = undo {
                self.store
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .undo(undo);
                self.publish_unread();
            }
            self.events.publish(ChannelEvent::RollbackApplied {
                op,
                reason: err.message(),
            });
        }
        result
    }

    fn publish_unread(&self) {
        let unread = self.unread();
        self.events.publish(ChannelEvent::UnreadCountChanged(unread));
    }
}
