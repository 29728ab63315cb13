//! Optimistic watch-list engine.
//!
//! The engine owns the authoritative in-memory list for whoever is signed in.
//! User actions change that list immediately, persist it to the local cache
//! and queue the matching remote write. Remote snapshots and realtime events
//! flow back in and replace or patch the list.
//!
//! Every identity change bumps a generation counter. Fetches, subscriptions
//! and events that belong to an older generation or another user are
//! discarded, so a slow response for a previous account can never overwrite
//! the current one.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use watchlist_sync_config::Config;
use watchlist_sync_models::{
    Identity, ItemId, RealtimeEvent, RealtimeEventKind, UserId, WatchList, WatchListEntry,
};
use watchlist_sync_remote::{RemoteStore, SubscriptionId};
use crate::cache::{load_watchlist, save_watchlist, LocalCache};
use crate::outbox::{Outbox, PendingWrite, RetryPolicy};
use crate::warning::SyncWarning;

const WARNING_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Cache slot the list is persisted under
    pub cache_key: String,
    pub retry: RetryPolicy,
    /// Refetch the whole list on delete events instead of removing the id
    pub refetch_on_delete: bool,
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_key: config.cache.key.clone(),
            retry: RetryPolicy::from(&config.sync),
            refetch_on_delete: config.sync.refetch_on_delete,
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Point-in-time view of the engine for status output
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub identity: Identity,
    pub entries: usize,
    pub remote_subscription_active: bool,
    pub cache_available: bool,
    pub pending_writes: usize,
    pub backend: String,
}

struct ActiveChannel {
    subscription_id: SubscriptionId,
    user_id: UserId,
    pump: JoinHandle<()>,
}

struct SyncState {
    identity: Identity,
    list: WatchList,
    generation: u64,
    channel: Option<ActiveChannel>,
    cache_available: bool,
}

/// Work left over from an identity switch, finished by `complete_attach`
pub(crate) struct AttachTicket {
    generation: u64,
    identity: Identity,
    previous: Option<ActiveChannel>,
}

struct EngineInner {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn LocalCache>,
    options: EngineOptions,
    state: Mutex<SyncState>,
    outbox: Outbox,
    changes: watch::Sender<WatchList>,
    warnings: broadcast::Sender<SyncWarning>,
}

#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Create an engine with an empty list and no identity.
    ///
    /// Must be called from within a tokio runtime; the outbox task is
    /// spawned here.
    pub fn new(remote: Arc<dyn RemoteStore>, cache: Arc<dyn LocalCache>, options: EngineOptions) -> Self {
        let (warnings, _) = broadcast::channel(WARNING_CAPACITY);
        let (changes, _) = watch::channel(WatchList::new());
        let outbox = Outbox::spawn(Arc::clone(&remote), options.retry.clone(), warnings.clone());
        info!(
            backend = remote.backend_name(),
            cache_key = %options.cache_key,
            refetch_on_delete = options.refetch_on_delete,
            "Sync engine created"
        );
        Self {
            inner: Arc::new(EngineInner {
                remote,
                cache,
                options,
                state: Mutex::new(SyncState {
                    identity: Identity::Anonymous,
                    list: WatchList::new(),
                    generation: 0,
                    channel: None,
                    cache_available: true,
                }),
                outbox,
                changes,
                warnings,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.inner.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn warn(&self, warning: SyncWarning) {
        // No receivers is fine; the warning was already logged
        let _ = self.inner.warnings.send(warning);
    }

    /// Persist and publish the list. Call with the state lock held.
    fn commit(&self, state: &mut SyncState) {
        if state.cache_available {
            if let Err(e) = save_watchlist(self.inner.cache.as_ref(), &self.inner.options.cache_key, &state.list) {
                warn!("Local cache write failed, continuing in memory only: {}", e);
                state.cache_available = false;
                self.warn(SyncWarning::CacheUnavailable { message: e.to_string() });
            }
        }
        self.inner.changes.send_replace(state.list.clone());
    }

    /// Load the cached list, if any, as the starting state.
    ///
    /// Cache problems are reported and otherwise ignored.
    pub fn initialize(&self) {
        let mut state = self.lock();
        if !state.cache_available {
            return;
        }
        match load_watchlist(self.inner.cache.as_ref(), &self.inner.options.cache_key) {
            Ok(Some(list)) => {
                info!("Restored {} items from local cache", list.len());
                state.list = list;
                self.inner.changes.send_replace(state.list.clone());
            }
            Ok(None) => debug!("No cached watch list"),
            Err(e) => {
                warn!("Local cache read failed, continuing in memory only: {}", e);
                state.cache_available = false;
                self.warn(SyncWarning::CacheUnavailable { message: e.to_string() });
            }
        }
    }

    /// Switch to `identity`, fetch its list and open its realtime channel.
    ///
    /// The list is left alone when signing out.
    pub async fn attach(&self, identity: Identity) {
        let ticket = self.begin_attach(identity);
        self.complete_attach(ticket).await;
    }

    /// Make `identity` current right away. Any fetch or subscription still
    /// in flight for the previous identity becomes stale.
    pub(crate) fn begin_attach(&self, identity: Identity) -> AttachTicket {
        let mut state = self.lock();
        state.generation += 1;
        state.identity = identity.clone();
        debug!(operation = "attach", generation = state.generation, user = %identity, "Identity switched");
        AttachTicket {
            generation: state.generation,
            identity,
            previous: state.channel.take(),
        }
    }

    #[instrument(skip(self, ticket), fields(identity = %ticket.identity, generation = ticket.generation))]
    pub(crate) async fn complete_attach(&self, ticket: AttachTicket) {
        let AttachTicket { generation, identity, previous } = ticket;

        if let Some(channel) = previous {
            self.close_channel(channel).await;
        }

        let Some(user_id) = identity.user_id().cloned() else {
            info!("Signed out; keeping {} items in memory", self.lock().list.len());
            return;
        };

        self.refresh_for(&user_id, generation).await;

        if !self.is_current(generation) {
            debug!("Identity changed during fetch, not subscribing");
            return;
        }

        let subscription = match self.inner.remote.subscribe(&user_id).await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(operation = "subscribe", user = %user_id, "Realtime subscription failed: {}", e);
                self.warn(SyncWarning::SubscribeFailed {
                    user_id,
                    message: e.to_string(),
                });
                return;
            }
        };

        let subscription_id = subscription.id;
        let stale = {
            let mut state = self.lock();
            if state.generation == generation {
                let pump = tokio::spawn(pump_events(
                    Arc::downgrade(&self.inner),
                    generation,
                    subscription_id,
                    subscription.events,
                ));
                state.channel = Some(ActiveChannel {
                    subscription_id,
                    user_id: user_id.clone(),
                    pump,
                });
                false
            } else {
                true
            }
        };

        if stale {
            debug!("Identity changed during subscribe, closing subscription {}", subscription_id);
            if let Err(e) = self.inner.remote.unsubscribe(subscription_id).await {
                warn!("Failed to close stale subscription {}: {}", subscription_id, e);
            }
        } else {
            info!(operation = "subscribe", subscription_id, user = %user_id, "Realtime channel open");
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    async fn close_channel(&self, channel: ActiveChannel) {
        channel.pump.abort();
        match self.inner.remote.unsubscribe(channel.subscription_id).await {
            Ok(()) => debug!(
                "Closed realtime channel {} for {}",
                channel.subscription_id, channel.user_id
            ),
            Err(e) => warn!("Failed to close subscription {}: {}", channel.subscription_id, e),
        }
    }

    /// Replace the list with the remote snapshot if `generation` is still current
    async fn refresh_for(&self, user_id: &UserId, generation: u64) {
        match self.inner.remote.list_for(user_id).await {
            Ok(entries) => {
                let mut state = self.lock();
                if state.generation != generation {
                    debug!("Discarding stale snapshot for {}", user_id);
                    return;
                }
                state.list = WatchList::from_entries(entries);
                self.reapply_queued(&mut state.list, user_id);
                info!(operation = "fetch", user = %user_id, entries = state.list.len(), "Replaced list with remote snapshot");
                self.commit(&mut state);
            }
            Err(e) => {
                warn!(operation = "fetch", user = %user_id, "Fetching watch list failed: {}", e);
                self.warn(SyncWarning::RemoteFetchFailed {
                    user_id: user_id.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    /// Writes still in the outbox are not in a remote snapshot yet. Replay
    /// them so a refetch does not undo a local change.
    fn reapply_queued(&self, list: &mut WatchList, user_id: &UserId) {
        for write in self.inner.outbox.queued_for(user_id) {
            match write {
                PendingWrite::Insert { item_id, payload, .. } => {
                    if list.insert_front(WatchListEntry::new(item_id, payload)) {
                        debug!("Kept queued insert of {} over remote snapshot", item_id);
                    }
                }
                PendingWrite::Delete { item_id, .. } => {
                    if list.remove(item_id) {
                        debug!("Kept queued delete of {} over remote snapshot", item_id);
                    }
                }
            }
        }
    }

    /// Add an entry to the front of the list.
    ///
    /// Returns false if the item was already present. The remote insert is
    /// queued when signed in.
    pub fn add(&self, entry: WatchListEntry) -> bool {
        let mut state = self.lock();
        if state.list.contains(entry.item_id) {
            debug!("Item {} already in watch list", entry.item_id);
            return false;
        }

        let write = state.identity.user_id().map(|user_id| PendingWrite::Insert {
            user_id: user_id.clone(),
            item_id: entry.item_id,
            payload: entry.payload.clone(),
        });
        state.list.insert_front(entry);
        self.commit(&mut state);

        if let Some(write) = write {
            self.inner.outbox.enqueue(write);
        }
        true
    }

    /// Remove an item. Returns whether it was in the list.
    ///
    /// The remote delete is queued when signed in, even if the item was not
    /// in the local list.
    pub fn remove(&self, item_id: ItemId) -> bool {
        let mut state = self.lock();
        let removed = state.list.remove(item_id);
        if removed {
            self.commit(&mut state);
        } else {
            debug!("Item {} not in watch list", item_id);
        }

        if let Some(user_id) = state.identity.user_id() {
            self.inner.outbox.enqueue(PendingWrite::Delete {
                user_id: user_id.clone(),
                item_id,
            });
        }
        removed
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.lock().list.contains(item_id)
    }

    pub fn current_list(&self) -> WatchList {
        self.lock().list.clone()
    }

    pub fn identity(&self) -> Identity {
        self.lock().identity.clone()
    }

    /// Apply a realtime event.
    ///
    /// Events for anyone but the current user are dropped.
    pub async fn apply_event(&self, event: RealtimeEvent) {
        let generation = {
            let state = self.lock();
            if state.identity.user_id() != Some(&event.user_id) {
                debug!("Ignoring event for {} (current identity {})", event.user_id, state.identity);
                return;
            }
            state.generation
        };
        self.apply_for_generation(event, generation).await;
    }

    async fn apply_for_generation(&self, event: RealtimeEvent, generation: u64) {
        let RealtimeEvent { user_id, kind } = event;
        match kind {
            RealtimeEventKind::Insert { entry } => {
                let mut state = self.lock();
                if state.generation != generation {
                    return;
                }
                let item_id = entry.item_id;
                if state.list.insert_front(entry) {
                    debug!("Realtime insert of {} for {}", item_id, user_id);
                    self.commit(&mut state);
                }
            }
            RealtimeEventKind::Delete { item_id: Some(item_id) } if !self.inner.options.refetch_on_delete => {
                let mut state = self.lock();
                if state.generation != generation {
                    return;
                }
                if state.list.remove(item_id) {
                    debug!("Realtime delete of {} for {}", item_id, user_id);
                    self.commit(&mut state);
                }
            }
            RealtimeEventKind::Delete { item_id } => {
                debug!("Realtime delete ({:?}) for {}, refetching", item_id, user_id);
                self.refresh_for(&user_id, generation).await;
            }
        }
    }

    /// Receiver that sees every committed list
    pub fn subscribe_changes(&self) -> watch::Receiver<WatchList> {
        self.inner.changes.subscribe()
    }

    pub fn warnings(&self) -> broadcast::Receiver<SyncWarning> {
        self.inner.warnings.subscribe()
    }

    pub fn state(&self) -> SyncStatus {
        let state = self.lock();
        SyncStatus {
            identity: state.identity.clone(),
            entries: state.list.len(),
            remote_subscription_active: state.channel.is_some(),
            cache_available: state.cache_available,
            pending_writes: self.inner.outbox.pending(),
            backend: self.inner.remote.backend_name().to_string(),
        }
    }

    /// Wait for all queued remote writes to finish
    pub async fn flush(&self) {
        self.inner.outbox.flush().await;
    }

    /// The remote side ended the channel opened for `generation`. Forget it
    /// if it is still the active one so status reflects reality.
    async fn feed_closed(&self, generation: u64, subscription_id: SubscriptionId) {
        let channel = {
            let mut state = self.lock();
            let active = state.generation == generation
                && state
                    .channel
                    .as_ref()
                    .is_some_and(|channel| channel.subscription_id == subscription_id);
            if active {
                state.channel.take()
            } else {
                None
            }
        };
        let Some(channel) = channel else {
            return;
        };

        warn!(
            operation = "subscribe",
            subscription_id,
            user = %channel.user_id,
            "Realtime channel closed by the remote store"
        );
        // Called from the pump itself, so its handle is dropped rather than aborted
        drop(channel.pump);
        if let Err(e) = self.inner.remote.unsubscribe(subscription_id).await {
            debug!("Subscription {} already gone: {}", subscription_id, e);
        }
        self.warn(SyncWarning::SubscribeFailed {
            user_id: channel.user_id,
            message: "realtime channel closed".to_string(),
        });
    }

    /// Close the realtime channel. The list and identity stay as they are.
    pub async fn shutdown(&self) {
        let channel = self.lock().channel.take();
        if let Some(channel) = channel {
            self.close_channel(channel).await;
        }
    }
}

async fn pump_events(
    engine: Weak<EngineInner>,
    generation: u64,
    subscription_id: SubscriptionId,
    mut events: mpsc::UnboundedReceiver<RealtimeEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = engine.upgrade() else {
            debug!(generation, "Engine dropped, realtime pump stopped");
            return;
        };
        let engine = SyncEngine { inner };
        if !engine.is_current(generation) {
            debug!(generation, "Realtime pump stopped");
            return;
        }
        engine.apply_event(event).await;
    }

    if let Some(inner) = engine.upgrade() {
        SyncEngine { inner }.feed_closed(generation, subscription_id).await;
    }
    debug!(generation, "Realtime feed ended");
}
