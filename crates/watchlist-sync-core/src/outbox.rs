//! Write-behind queue for remote mutations.
//!
//! Local changes are applied first; the matching remote write is queued here
//! and delivered in order by a single background task. Transient failures are
//! retried with exponential backoff. A write that still fails is dropped and
//! reported as a [`SyncWarning`]. The local list is never rolled back.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};
use watchlist_sync_config::SyncOptions;
use watchlist_sync_models::{CatalogPayload, ItemId, UserId};
use watchlist_sync_remote::{RemoteError, RemoteStore};
use crate::warning::{SyncWarning, WriteKind};

/// Remote write waiting for delivery
#[derive(Debug, Clone)]
pub enum PendingWrite {
    Insert {
        user_id: UserId,
        item_id: ItemId,
        payload: CatalogPayload,
    },
    Delete {
        user_id: UserId,
        item_id: ItemId,
    },
}

impl PendingWrite {
    pub fn kind(&self) -> WriteKind {
        match self {
            PendingWrite::Insert { .. } => WriteKind::Insert,
            PendingWrite::Delete { .. } => WriteKind::Delete,
        }
    }

    pub fn user_id(&self) -> &UserId {
        match self {
            PendingWrite::Insert { user_id, .. } | PendingWrite::Delete { user_id, .. } => user_id,
        }
    }

    pub fn item_id(&self) -> ItemId {
        match self {
            PendingWrite::Insert { item_id, .. } | PendingWrite::Delete { item_id, .. } => *item_id,
        }
    }

    async fn send(&self, remote: &dyn RemoteStore) -> Result<(), RemoteError> {
        match self {
            PendingWrite::Insert { user_id, item_id, payload } => remote.insert(user_id, *item_id, payload).await,
            PendingWrite::Delete { user_id, item_id } => remote.delete(user_id, *item_id).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1`, doubling from `base_delay`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent).min(self.max_delay)
    }
}

impl From<&SyncOptions> for RetryPolicy {
    fn from(options: &SyncOptions) -> Self {
        Self {
            max_attempts: options.max_write_attempts.max(1),
            base_delay: Duration::from_millis(options.retry_base_delay_ms),
            max_delay: Duration::from_millis(options.retry_max_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&SyncOptions::default())
    }
}

/// Writes not yet delivered or given up on, oldest first
type Queued = Arc<Mutex<VecDeque<PendingWrite>>>;

pub(crate) struct Outbox {
    sender: mpsc::UnboundedSender<PendingWrite>,
    pending: Arc<watch::Sender<usize>>,
    queued: Queued,
}

impl Outbox {
    /// Start the delivery task on the current tokio runtime
    pub(crate) fn spawn(
        remote: Arc<dyn RemoteStore>,
        policy: RetryPolicy,
        warnings: broadcast::Sender<SyncWarning>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);
        let queued: Queued = Arc::default();
        tokio::spawn(deliver(
            receiver,
            remote,
            policy,
            Arc::clone(&pending),
            Arc::clone(&queued),
            warnings,
        ));
        Self { sender, pending, queued }
    }

    pub(crate) fn enqueue(&self, write: PendingWrite) {
        self.pending.send_modify(|n| *n += 1);
        lock_queued(&self.queued).push_back(write.clone());
        if let Err(e) = self.sender.send(write) {
            lock_queued(&self.queued).pop_back();
            self.pending.send_modify(|n| *n = n.saturating_sub(1));
            warn!(
                "Outbox closed, dropping remote {} of item {}",
                e.0.kind(),
                e.0.item_id()
            );
        }
    }

    pub(crate) fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Undelivered writes for `user`, in the order they were queued
    pub(crate) fn queued_for(&self, user: &UserId) -> Vec<PendingWrite> {
        lock_queued(&self.queued)
            .iter()
            .filter(|write| write.user_id() == user)
            .cloned()
            .collect()
    }

    /// Wait until every queued write was delivered or given up on
    pub(crate) async fn flush(&self) {
        let mut receiver = self.pending.subscribe();
        let _ = receiver.wait_for(|n| *n == 0).await;
    }
}

fn lock_queued(queued: &Queued) -> std::sync::MutexGuard<'_, VecDeque<PendingWrite>> {
    queued.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn deliver(
    mut receiver: mpsc::UnboundedReceiver<PendingWrite>,
    remote: Arc<dyn RemoteStore>,
    policy: RetryPolicy,
    pending: Arc<watch::Sender<usize>>,
    queued: Queued,
    warnings: broadcast::Sender<SyncWarning>,
) {
    while let Some(write) = receiver.recv().await {
        if let Err(warning) = deliver_one(&write, remote.as_ref(), &policy).await {
            let _ = warnings.send(warning);
        }
        // Single consumer, so the delivered write is the oldest one queued
        lock_queued(&queued).pop_front();
        pending.send_modify(|n| *n = n.saturating_sub(1));
    }
    debug!("Outbox delivery task stopped");
}

async fn deliver_one(write: &PendingWrite, remote: &dyn RemoteStore, policy: &RetryPolicy) -> Result<(), SyncWarning> {
    let mut attempt = 1;
    loop {
        match write.send(remote).await {
            Ok(()) => {
                debug!(
                    "Remote {} of item {} for {} delivered (attempt {})",
                    write.kind(),
                    write.item_id(),
                    write.user_id(),
                    attempt
                );
                return Ok(());
            }
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                info!(
                    "Remote {} of item {} failed (attempt {}/{}): {}. Retrying in {:?}",
                    write.kind(),
                    write.item_id(),
                    attempt,
                    policy.max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!(
                    operation = "deliver",
                    "Giving up on remote {} of item {} for {} after {} attempt(s): {}",
                    write.kind(),
                    write.item_id(),
                    write.user_id(),
                    attempt,
                    e
                );
                return Err(SyncWarning::RemoteWriteFailed {
                    user_id: write.user_id().clone(),
                    item_id: write.item_id(),
                    kind: write.kind(),
                    attempts: attempt,
                    message: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(4), Duration::from_millis(500));
        assert_eq!(policy.delay_after(40), Duration::from_millis(500));
    }

    #[test]
    fn test_policy_from_options() {
        let options = SyncOptions {
            max_write_attempts: 0,
            ..SyncOptions::default()
        };
        let policy = RetryPolicy::from(&options);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_queued_writes_tracked_until_delivered() {
        let remote = Arc::new(watchlist_sync_remote::MemoryRemoteStore::new());
        let (warnings, _) = broadcast::channel(4);
        let outbox = Outbox::spawn(remote.clone(), RetryPolicy::default(), warnings);
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");

        outbox.enqueue(PendingWrite::Delete { user_id: u1.clone(), item_id: ItemId(1) });
        outbox.enqueue(PendingWrite::Delete { user_id: u2.clone(), item_id: ItemId(2) });
        outbox.enqueue(PendingWrite::Delete { user_id: u1.clone(), item_id: ItemId(3) });

        let ids: Vec<ItemId> = outbox.queued_for(&u1).iter().map(PendingWrite::item_id).collect();
        assert_eq!(ids, vec![ItemId(1), ItemId(3)]);
        assert_eq!(outbox.pending(), 3);

        outbox.flush().await;
        assert!(outbox.queued_for(&u1).is_empty());
        assert!(outbox.queued_for(&u2).is_empty());
        assert_eq!(remote.delete_calls(), 3);
    }
}
