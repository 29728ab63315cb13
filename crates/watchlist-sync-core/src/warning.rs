use serde::Serialize;
use std::fmt;
use watchlist_sync_models::{ItemId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteKind {
    Insert,
    Delete,
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteKind::Insert => write!(f, "insert"),
            WriteKind::Delete => write!(f, "delete"),
        }
    }
}

/// Non-fatal problem reported by the engine.
///
/// None of these change the in-memory list; they only tell observers that
/// local and remote state may have drifted apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum SyncWarning {
    RemoteFetchFailed {
        user_id: UserId,
        message: String,
    },
    RemoteWriteFailed {
        user_id: UserId,
        item_id: ItemId,
        kind: WriteKind,
        attempts: u32,
        message: String,
    },
    SubscribeFailed {
        user_id: UserId,
        message: String,
    },
    CacheUnavailable {
        message: String,
    },
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncWarning::RemoteFetchFailed { user_id, message } => {
                write!(f, "could not fetch watch list for {}: {}", user_id, message)
            }
            SyncWarning::RemoteWriteFailed { user_id, item_id, kind, attempts, message } => write!(
                f,
                "remote {} of item {} for {} failed after {} attempt(s): {}",
                kind, item_id, user_id, attempts, message
            ),
            SyncWarning::SubscribeFailed { user_id, message } => {
                write!(f, "realtime subscription for {} failed: {}", user_id, message)
            }
            SyncWarning::CacheUnavailable { message } => {
                write!(f, "local cache unavailable, continuing in memory: {}", message)
            }
        }
    }
}
