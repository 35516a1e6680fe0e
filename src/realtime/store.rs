//! Local notification projection
//!
//! Most-recent-first list capped at a fixed length, plus an unread counter.
//! Mutations return what they changed so optimistic updates can be undone.

use std::collections::VecDeque;

use serde::Serialize;

use crate::client::models::Notification;

/// Default list cap
pub const MAX_NOTIFICATIONS: usize = 50;

/// Read-only copy of the store for rendering
#[derive(Debug, Clone, Default, Serialize)]
pub struct NotificationSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
}

/// What an optimistic change did, recorded relative to the items it touched
/// so that notifications pushed in the meantime survive an undo
#[derive(Debug, Clone)]
pub enum Undo {
    MarkRead { id: u64 },
    MarkAllRead { ids: Vec<u64> },
    Delete {
        notification: Notification,
        /// Item that sat directly after the removed one (older), if any
        older: Option<u64>,
    },
}

#[derive(Debug)]
pub struct NotificationStore {
    items: VecDeque<Notification>,
    unread: u64,
    capacity: usize,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new(MAX_NOTIFICATIONS)
    }
}

impl NotificationStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            unread: 0,
            capacity: capacity.max(1),
        }
    }

    /// Prepend a pushed notification, evicting the oldest past capacity
    pub fn push(&mut self, notification: Notification) -> Option<Notification> {
        if !notification.read {
            self.unread += 1;
        }
        self.items.push_front(notification);
        if self.items.len() > self.capacity {
            self.items.pop_back()
        } else {
            None
        }
    }

    /// Replace contents with a server listing (most recent first)
    pub fn load(&mut self, notifications: Vec<Notification>, unread: u64) {
        self.items = notifications.into_iter().take(self.capacity).collect();
        self.unread = unread;
    }

    /// Mark one notification read. `None` if absent or already read.
    pub fn mark_read(&mut self, id: u64) -> Option<Undo> {
        let item = self.items.iter_mut().find(|n| n.id == id && !n.read)?;
        item.read = true;
        self.unread = self.unread.saturating_sub(1);
        Some(Undo::MarkRead { id })
    }

    pub fn mark_all_read(&mut self) -> Undo {
        let ids = self
            .items
            .iter_mut()
            .filter(|n| !n.read)
            .map(|n| {
                n.read = true;
                n.id
            })
            .collect();
        self.unread = 0;
        Undo::MarkAllRead { ids }
    }

    pub fn remove(&mut self, id: u64) -> Option<Undo> {
        let index = self.items.iter().position(|n| n.id == id)?;
        let notification = self.items.remove(index)?;
        if !notification.read {
            self.unread = self.unread.saturating_sub(1);
        }
        let older = self.items.get(index).map(|n| n.id);
        Some(Undo::Delete {
            notification,
            older,
        })
    }

    /// Revert an optimistic change.
    ///
    /// Only items the change touched are restored; the unread counter moves
    /// by the number of items flipped back, never to a saved absolute value.
    pub fn undo(&mut self, undo: Undo) {
        match undo {
            Undo::MarkRead { id } => {
                self.flip_unread(&[id]);
            }
            Undo::MarkAllRead { ids } => {
                self.flip_unread(&ids);
            }
            Undo::Delete {
                notification,
                older,
            } => {
                if self.items.iter().any(|n| n.id == notification.id) {
                    return;
                }
                let index = older
                    .and_then(|older| self.items.iter().position(|n| n.id == older))
                    .unwrap_or(self.items.len());
                if !notification.read {
                    self.unread += 1;
                }
                self.items.insert(index, notification);
                self.items.truncate(self.capacity);
            }
        }
    }

    fn flip_unread(&mut self, ids: &[u64]) {
        for item in self.items.iter_mut().filter(|n| n.read && ids.contains(&n.id)) {
            item.read = false;
            self.unread += 1;
        }
    }

    pub fn set_unread(&mut self, count: u64) {
        self.unread = count;
    }

    pub fn unread(&self) -> u64 {
        self.unread
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        NotificationSnapshot {
            notifications: self.items.iter().cloned().collect(),
            unread_count: self.unread,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::models::NotificationKind;

    fn notification(id: u64, read: bool) -> Notification {
        Notification {
            id,
            kind: NotificationKind::Comment,
            title: format!("n{}", id),
            message: String::new(),
            read,
            created_at: None,
            link: None,
        }
    }

    #[test]
    fn test_push_prepends_and_counts_unread() {
        let mut store = NotificationStore::default();
        store.push(notification(1, false));
        store.push(notification(2, true));
        store.push(notification(7, false));

        let snap = store.snapshot();
        assert_eq!(snap.notifications[0].id, 7);
        assert_eq!(snap.unread_count, 2);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut store = NotificationStore::default();
        for id in 1..=50 {
            assert!(store.push(notification(id, true)).is_none());
        }
        let evicted = store.push(notification(51, true)).unwrap();
        assert_eq!(evicted.id, 1);
        assert_eq!(store.len(), MAX_NOTIFICATIONS);
        assert_eq!(store.snapshot().notifications[0].id, 51);
    }

    #[test]
    fn test_mark_read_and_undo() {
        let mut store = NotificationStore::default();
        store.push(notification(1, false));
        store.push(notification(2, false));

        let undo = store.mark_read(1).unwrap();
        assert_eq!(store.unread(), 1);
        assert!(store.get(1).unwrap().read);
        // Already read
        assert!(store.mark_read(1).is_none());
        // Unknown
        assert!(store.mark_read(99).is_none());

        store.undo(undo);
        assert_eq!(store.unread(), 2);
        assert!(!store.get(1).unwrap().read);
    }

    #[test]
    fn test_mark_all_read_and_undo() {
        let mut store = NotificationStore::default();
        store.push(notification(1, false));
        store.push(notification(2, true));
        store.push(notification(3, false));

        let undo = store.mark_all_read();
        assert_eq!(store.unread(), 0);
        assert!(store.snapshot().notifications.iter().all(|n| n.read));

        store.undo(undo);
        assert_eq!(store.unread(), 2);
        assert!(!store.get(1).unwrap().read);
        assert!(store.get(2).unwrap().read);
        assert!(!store.get(3).unwrap().read);
    }

    #[test]
    fn test_remove_and_undo_restores_position() {
        let mut store = NotificationStore::default();
        store.push(notification(1, false));
        store.push(notification(2, false));
        store.push(notification(3, true));

        let undo = store.remove(2).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.unread(), 1);

        store.undo(undo);
        let ids: Vec<u64> = store.snapshot().notifications.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(store.unread(), 2);
    }

    #[test]
    fn test_undo_keeps_notifications_pushed_meanwhile() {
        let mut store = NotificationStore::default();
        store.push(notification(1, false));
        store.push(notification(2, false));
        store.push(notification(3, false));

        let read = store.mark_read(1).unwrap();
        let removed = store.remove(2).unwrap();
        store.push(notification(4, false));
        store.push(notification(5, true));
        assert_eq!(store.unread(), 2);

        store.undo(removed);
        store.undo(read);

        let ids: Vec<u64> = store.snapshot().notifications.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
        assert_eq!(store.unread(), 4);
        assert!(!store.get(1).unwrap().read);
    }

    #[test]
    fn test_undo_delete_of_oldest_goes_to_back() {
        let mut store = NotificationStore::default();
        store.push(notification(1, true));
        store.push(notification(2, true));

        let undo = store.remove(1).unwrap();
        store.push(notification(3, true));
        store.undo(undo);

        let ids: Vec<u64> = store.snapshot().notifications.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(store.unread(), 0);
    }

    #[test]
    fn test_load_truncates_to_capacity() {
        let mut store = NotificationStore::new(2);
        store.load(
            vec![notification(3, false), notification(2, false), notification(1, false)],
            3,
        );
        assert_eq!(store.len(), 2);
        assert_eq!(store.unread(), 3);
    }
}
