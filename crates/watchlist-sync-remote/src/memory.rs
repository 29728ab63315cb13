//! In-process remote store.
//!
//! Holds every user's rows in memory and pushes change events to all open
//! subscriptions for the affected user, the way the hosted realtime service
//! does. Several engines sharing one `MemoryRemoteStore` behave like several
//! devices signed in to the same account.
//!
//! Failure switches let tests make individual operations fail.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};
use watchlist_sync_models::{CatalogPayload, ItemId, RealtimeEvent, UserId, WatchListEntry};
use crate::error::RemoteError;
use crate::traits::{RemoteStore, Subscription, SubscriptionId};

struct Subscriber {
    user_id: UserId,
    sender: mpsc::UnboundedSender<RealtimeEvent>,
}

#[derive(Default)]
struct FailureSwitches {
    list: AtomicBool,
    insert: AtomicBool,
    delete: AtomicBool,
    subscribe: AtomicBool,
    // Fail this many inserts, then recover
    insert_budget: AtomicU32,
}

pub struct MemoryRemoteStore {
    rows: Mutex<HashMap<UserId, Vec<WatchListEntry>>>,
    subscribers: Mutex<HashMap<SubscriptionId, Subscriber>>,
    next_subscription: AtomicU64,
    failures: FailureSwitches,
    strip_delete_ids: AtomicBool,
    insert_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    access_token: Mutex<Option<String>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        info!("[MemoryRemoteStore] Creating in-memory remote store");
        Self {
            rows: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
            failures: FailureSwitches::default(),
            strip_delete_ids: AtomicBool::new(false),
            insert_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            access_token: Mutex::new(None),
        }
    }

    /// Replace a user's rows without emitting events
    pub fn seed(&self, user: &UserId, entries: Vec<WatchListEntry>) {
        if let Ok(mut rows) = self.rows.lock() {
            rows.insert(user.clone(), entries);
        }
    }

    /// Snapshot of a user's rows, bypassing failure switches
    pub fn rows_for(&self, user: &UserId) -> Vec<WatchListEntry> {
        self.rows
            .lock()
            .map(|rows| rows.get(user).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.failures.list.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_insert(&self, fail: bool) {
        self.failures.insert.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.failures.delete.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.failures.subscribe.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `count` inserts, then accept them again
    pub fn fail_next_inserts(&self, count: u32) {
        self.failures.insert_budget.store(count, Ordering::SeqCst);
    }

    /// Emit delete events without the deleted item id
    pub fn set_strip_delete_ids(&self, strip: bool) {
        self.strip_delete_ids.store(strip, Ordering::SeqCst);
    }

    /// End every open change feed as if the realtime service went away
    pub fn close_feeds(&self) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            debug!("[MemoryRemoteStore] closing {} subscription(s)", subscribers.len());
            subscribers.clear();
        }
    }

    /// Last token handed to `set_access_token`
    pub fn access_token(&self) -> Option<String> {
        self.access_token.lock().ok().and_then(|token| token.clone())
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn should_fail_insert(&self) -> bool {
        if self.failures.insert.load(Ordering::SeqCst) {
            return true;
        }
        self.failures
            .insert_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn publish(&self, event: RealtimeEvent) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };
        // Receivers dropped without unsubscribing are pruned here
        subscribers.retain(|id, sub| {
            if sub.user_id != event.user_id {
                return true;
            }
            let delivered = sub.sender.send(event.clone()).is_ok();
            if !delivered {
                debug!("[MemoryRemoteStore] Dropping closed subscription {}", id);
            }
            delivered
        });
    }

    fn lock_poisoned() -> RemoteError {
        RemoteError::Unavailable("memory store lock poisoned".to_string())
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn list_for(&self, user: &UserId) -> Result<Vec<WatchListEntry>, RemoteError> {
        if self.failures.list.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("list_for failure injected".to_string()));
        }
        let rows = self.rows.lock().map_err(|_| Self::lock_poisoned())?;
        Ok(rows.get(user).cloned().unwrap_or_default())
    }

    async fn insert(&self, user: &UserId, item_id: ItemId, payload: &CatalogPayload) -> Result<(), RemoteError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail_insert() {
            return Err(RemoteError::Unavailable("insert failure injected".to_string()));
        }

        let entry = WatchListEntry {
            item_id,
            payload: payload.clone(),
            added_at: Some(Utc::now()),
        };
        let inserted = {
            let mut rows = self.rows.lock().map_err(|_| Self::lock_poisoned())?;
            let user_rows = rows.entry(user.clone()).or_default();
            if user_rows.iter().any(|e| e.item_id == item_id) {
                false
            } else {
                user_rows.insert(0, entry.clone());
                true
            }
        };

        if inserted {
            debug!("[MemoryRemoteStore] insert {} for {}", item_id, user);
            self.publish(RealtimeEvent::insert(user.clone(), entry));
        }
        Ok(())
    }

    async fn delete(&self, user: &UserId, item_id: ItemId) -> Result<(), RemoteError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.delete.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("delete failure injected".to_string()));
        }

        let removed = {
            let mut rows = self.rows.lock().map_err(|_| Self::lock_poisoned())?;
            match rows.get_mut(user) {
                Some(user_rows) => {
                    let before = user_rows.len();
                    user_rows.retain(|e| e.item_id != item_id);
                    user_rows.len() != before
                }
                None => false,
            }
        };

        if removed {
            debug!("[MemoryRemoteStore] delete {} for {}", item_id, user);
            let event_id = if self.strip_delete_ids.load(Ordering::SeqCst) {
                None
            } else {
                Some(item_id)
            };
            self.publish(RealtimeEvent::delete(user.clone(), event_id));
        }
        Ok(())
    }

    async fn subscribe(&self, user: &UserId) -> Result<Subscription, RemoteError> {
        if self.failures.subscribe.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("subscribe failure injected".to_string()));
        }
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        let (sender, events) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .map_err(|_| Self::lock_poisoned())?
            .insert(id, Subscriber { user_id: user.clone(), sender });
        debug!("[MemoryRemoteStore] subscription {} opened for {}", id, user);
        Ok(Subscription { id, user_id: user.clone(), events })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), RemoteError> {
        let removed = self
            .subscribers
            .lock()
            .map_err(|_| Self::lock_poisoned())?
            .remove(&id);
        match removed {
            Some(_) => {
                debug!("[MemoryRemoteStore] subscription {} closed", id);
                Ok(())
            }
            None => Err(RemoteError::SubscriptionNotFound(id)),
        }
    }

    fn active_subscriptions(&self) -> usize {
        self.subscribers.lock().map(|subs| subs.len()).unwrap_or(0)
    }

    fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut current) = self.access_token.lock() {
            *current = token;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchlist_sync_models::{MediaType, RealtimeEventKind};

    fn payload(title: &str) -> CatalogPayload {
        CatalogPayload::builder(MediaType::Movie).title(title).build()
    }

    #[tokio::test]
    async fn test_insert_prepends_and_notifies_same_user_only() {
        let store = MemoryRemoteStore::new();
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");
        let mut sub1 = store.subscribe(&u1).await.unwrap();
        let mut sub2 = store.subscribe(&u2).await.unwrap();

        store.insert(&u1, ItemId(1), &payload("One")).await.unwrap();
        store.insert(&u1, ItemId(2), &payload("Two")).await.unwrap();

        let ids: Vec<_> = store.list_for(&u1).await.unwrap().iter().map(|e| e.item_id).collect();
        assert_eq!(ids, vec![ItemId(2), ItemId(1)]);

        let event = sub1.events.recv().await.unwrap();
        assert_eq!(event.user_id, u1);
        assert!(matches!(event.kind, RealtimeEventKind::Insert { ref entry } if entry.item_id == ItemId(1)));
        assert!(sub2.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_silent() {
        let store = MemoryRemoteStore::new();
        let u1 = UserId::new("u1");
        store.insert(&u1, ItemId(1), &payload("One")).await.unwrap();
        let mut sub = store.subscribe(&u1).await.unwrap();

        store.insert(&u1, ItemId(1), &payload("One")).await.unwrap();
        assert_eq!(store.rows_for(&u1).len(), 1);
        assert!(sub.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delete_event_can_omit_item_id() {
        let store = MemoryRemoteStore::new();
        let u1 = UserId::new("u1");
        store.insert(&u1, ItemId(5), &payload("Five")).await.unwrap();
        store.insert(&u1, ItemId(6), &payload("Six")).await.unwrap();
        let mut sub = store.subscribe(&u1).await.unwrap();

        store.delete(&u1, ItemId(5)).await.unwrap();
        store.set_strip_delete_ids(true);
        store.delete(&u1, ItemId(6)).await.unwrap();

        let first = sub.events.recv().await.unwrap();
        assert_eq!(first.kind, RealtimeEventKind::Delete { item_id: Some(ItemId(5)) });
        let second = sub.events.recv().await.unwrap();
        assert_eq!(second.kind, RealtimeEventKind::Delete { item_id: None });
    }

    #[tokio::test]
    async fn test_failure_switches() {
        let store = MemoryRemoteStore::new();
        let u1 = UserId::new("u1");

        store.set_fail_list(true);
        assert!(store.list_for(&u1).await.is_err());
        store.set_fail_list(false);

        store.fail_next_inserts(2);
        assert!(store.insert(&u1, ItemId(1), &payload("One")).await.is_err());
        assert!(store.insert(&u1, ItemId(1), &payload("One")).await.is_err());
        assert!(store.insert(&u1, ItemId(1), &payload("One")).await.is_ok());
        assert_eq!(store.insert_calls(), 3);
        assert_eq!(store.rows_for(&u1).len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let store = MemoryRemoteStore::new();
        let sub = store.subscribe(&UserId::new("u1")).await.unwrap();
        assert_eq!(store.active_subscriptions(), 1);
        store.unsubscribe(sub.id).await.unwrap();
        assert_eq!(store.active_subscriptions(), 0);
        assert!(matches!(store.unsubscribe(sub.id).await, Err(RemoteError::SubscriptionNotFound(_))));
    }

    #[tokio::test]
    async fn test_close_feeds_ends_receivers() {
        let store = MemoryRemoteStore::new();
        let mut sub = store.subscribe(&UserId::new("u1")).await.unwrap();

        store.close_feeds();
        assert_eq!(store.active_subscriptions(), 0);
        assert!(sub.events.recv().await.is_none());
    }
}
