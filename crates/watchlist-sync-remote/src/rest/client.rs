use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use watchlist_sync_models::{CatalogPayload, ItemId, UserId, WatchListEntry};
use crate::error::RemoteError;
use crate::rest::api::{RestEndpoint, WatchListRow};
use crate::rest::feed::run_poll_feed;
use crate::traits::{RemoteStore, Subscription, SubscriptionId};

/// Shortest allowed gap between change-feed polls
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct RestStoreSettings {
    pub url: String,
    pub table: String,
    pub api_key: String,
    pub access_token: Option<String>,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

/// Remote store backed by a hosted PostgREST table.
///
/// The change feed polls the table and diffs consecutive snapshots, one
/// background task per subscription.
pub struct RestRemoteStore {
    endpoint: RestEndpoint,
    poll_interval: Duration,
    feeds: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
    next_subscription: AtomicU64,
}

impl RestRemoteStore {
    pub fn new(settings: RestStoreSettings) -> Result<Self, RemoteError> {
        let endpoint = RestEndpoint::new(
            &settings.url,
            &settings.table,
            settings.api_key,
            settings.access_token,
            settings.request_timeout,
        )?;
        let poll_interval = settings.poll_interval.max(MIN_POLL_INTERVAL);
        if poll_interval != settings.poll_interval {
            warn!(
                "Poll interval {:?} is too short, using {:?}",
                settings.poll_interval, poll_interval
            );
        }
        info!("Using REST remote store at {}", endpoint.table_url());
        Ok(Self {
            endpoint,
            poll_interval,
            feeds: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
        })
    }

    fn lock_poisoned() -> RemoteError {
        RemoteError::Unavailable("feed registry lock poisoned".to_string())
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    fn backend_name(&self) -> &str {
        "rest"
    }

    async fn list_for(&self, user: &UserId) -> Result<Vec<WatchListEntry>, RemoteError> {
        self.endpoint.fetch_rows(user).await
    }

    async fn insert(&self, user: &UserId, item_id: ItemId, payload: &CatalogPayload) -> Result<(), RemoteError> {
        let row = WatchListRow {
            user_id: user.to_string(),
            item_id: item_id.0,
            payload: payload.as_value().clone(),
            created_at: None,
        };
        self.endpoint.insert_row(&row).await
    }

    async fn delete(&self, user: &UserId, item_id: ItemId) -> Result<(), RemoteError> {
        self.endpoint.delete_row(user, item_id).await
    }

    async fn subscribe(&self, user: &UserId) -> Result<Subscription, RemoteError> {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        let (sender, events) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_poll_feed(
            self.endpoint.clone(),
            user.clone(),
            self.poll_interval,
            sender,
        ));
        self.feeds.lock().map_err(|_| Self::lock_poisoned())?.insert(id, task);
        debug!("Change feed {} started for {} (every {:?})", id, user, self.poll_interval);
        Ok(Subscription { id, user_id: user.clone(), events })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), RemoteError> {
        let task = self
            .feeds
            .lock()
            .map_err(|_| Self::lock_poisoned())?
            .remove(&id)
            .ok_or(RemoteError::SubscriptionNotFound(id))?;
        task.abort();
        debug!("Change feed {} stopped", id);
        Ok(())
    }

    fn active_subscriptions(&self) -> usize {
        self.feeds.lock().map(|feeds| feeds.len()).unwrap_or(0)
    }

    fn set_access_token(&self, token: Option<String>) {
        debug!("Session token {}", if token.is_some() { "replaced" } else { "cleared" });
        self.endpoint.set_access_token(token);
    }
}

impl Drop for RestRemoteStore {
    fn drop(&mut self) {
        if let Ok(mut feeds) = self.feeds.lock() {
            for (_, task) in feeds.drain() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(poll_interval: Duration) -> RestStoreSettings {
        RestStoreSettings {
            // Nothing listens here, so every poll fails fast
            url: "http://127.0.0.1:9".to_string(),
            table: "watchlist".to_string(),
            api_key: "anon".to_string(),
            access_token: None,
            poll_interval,
            request_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_zero_poll_interval_keeps_feed_alive() {
        let store = RestRemoteStore::new(settings(Duration::ZERO)).unwrap();
        assert_eq!(store.poll_interval, MIN_POLL_INTERVAL);

        let mut subscription = store.subscribe(&UserId::new("u1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        // A dead feed task would have dropped its sender
        assert!(matches!(
            subscription.events.try_recv(),
            Err(mpsc::error::TryRecvError::Empty)
        ));
        assert_eq!(store.active_subscriptions(), 1);
        store.unsubscribe(subscription.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_access_token_reaches_endpoint() {
        let store = RestRemoteStore::new(settings(Duration::from_secs(5))).unwrap();
        assert_eq!(store.endpoint.bearer_token(), "anon");

        store.set_access_token(Some("user-jwt".to_string()));
        assert_eq!(store.endpoint.bearer_token(), "user-jwt");
    }
}
