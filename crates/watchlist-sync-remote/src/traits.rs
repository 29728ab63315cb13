use async_trait::async_trait;
use tokio::sync::mpsc;
use watchlist_sync_models::{CatalogPayload, ItemId, RealtimeEvent, UserId, WatchListEntry};
use crate::error::RemoteError;

pub type SubscriptionId = u64;

/// Realtime channel scoped to one user.
///
/// Events arrive on `events` until the store is told to `unsubscribe(id)`
/// or the store itself goes away.
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub events: mpsc::UnboundedReceiver<RealtimeEvent>,
}

/// Remote table of watch-list rows plus its change feed
#[async_trait]
pub trait RemoteStore: Send + Sync {
    fn backend_name(&self) -> &str;

    /// Canonical list for `user`, newest first
    async fn list_for(&self, user: &UserId) -> Result<Vec<WatchListEntry>, RemoteError>;

    async fn insert(&self, user: &UserId, item_id: ItemId, payload: &CatalogPayload) -> Result<(), RemoteError>;
    async fn delete(&self, user: &UserId, item_id: ItemId) -> Result<(), RemoteError>;

    async fn subscribe(&self, user: &UserId) -> Result<Subscription, RemoteError>;
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), RemoteError>;

    /// Number of open subscriptions
    fn active_subscriptions(&self) -> usize;

    /// Use `token` to authorize later requests, or fall back to the store's
    /// own key when `None`. Stores without per-user auth ignore it.
    fn set_access_token(&self, _token: Option<String>) {}
}
