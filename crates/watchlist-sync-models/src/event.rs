use serde::{Deserialize, Serialize};
use crate::identity::{ItemId, UserId};
use crate::watchlist::WatchListEntry;

/// Change pushed by the remote store's realtime feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeEvent {
    pub user_id: UserId, // Owner of the changed row; events for other users are stale
    pub kind: RealtimeEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEventKind {
    Insert { entry: WatchListEntry },
    /// `item_id` is absent when the feed only carries the row's primary key
    Delete { item_id: Option<ItemId> },
}

impl RealtimeEvent {
    pub fn insert(user_id: UserId, entry: WatchListEntry) -> Self {
        Self { user_id, kind: RealtimeEventKind::Insert { entry } }
    }

    pub fn delete(user_id: UserId, item_id: Option<ItemId>) -> Self {
        Self { user_id, kind: RealtimeEventKind::Delete { item_id } }
    }
}
