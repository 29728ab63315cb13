use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use watchlist_sync_models::{ItemId, RealtimeEvent, UserId, WatchListEntry};
use crate::rest::api::RestEndpoint;

/// Events that turn snapshot `previous` into `current`.
///
/// Inserts are emitted oldest first so a consumer that prepends them ends up
/// in remote order. Deletes always carry the vanished id.
pub fn diff_snapshots(user: &UserId, previous: &[WatchListEntry], current: &[WatchListEntry]) -> Vec<RealtimeEvent> {
    let previous_ids: HashSet<ItemId> = previous.iter().map(|e| e.item_id).collect();
    let current_ids: HashSet<ItemId> = current.iter().map(|e| e.item_id).collect();

    let mut events: Vec<RealtimeEvent> = previous
        .iter()
        .filter(|e| !current_ids.contains(&e.item_id))
        .map(|e| RealtimeEvent::delete(user.clone(), Some(e.item_id)))
        .collect();

    events.extend(
        current
            .iter()
            .rev()
            .filter(|e| !previous_ids.contains(&e.item_id))
            .map(|e| RealtimeEvent::insert(user.clone(), e.clone())),
    );
    events
}

/// Poll the table for `user` and forward changes until the receiver goes away
pub async fn run_poll_feed(
    endpoint: RestEndpoint,
    user: UserId,
    interval: Duration,
    sender: mpsc::UnboundedSender<RealtimeEvent>,
) {
    let mut snapshot = match endpoint.fetch_rows(&user).await {
        Ok(rows) => Some(rows),
        Err(e) => {
            warn!("Change feed for {} could not load its baseline: {}", user, e);
            None
        }
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if sender.is_closed() {
            debug!("Change feed for {} stopped: receiver dropped", user);
            return;
        }

        let current = match endpoint.fetch_rows(&user).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Change feed poll for {} failed: {}", user, e);
                continue;
            }
        };

        let Some(previous) = snapshot.as_ref() else {
            snapshot = Some(current);
            continue;
        };

        for event in diff_snapshots(&user, previous, &current) {
            if sender.send(event).is_err() {
                debug!("Change feed for {} stopped: receiver dropped", user);
                return;
            }
        }
        snapshot = Some(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchlist_sync_models::{CatalogPayload, MediaType, RealtimeEventKind};

    fn entry(id: u64) -> WatchListEntry {
        WatchListEntry::new(ItemId(id), CatalogPayload::builder(MediaType::Movie).id(id).build())
    }

    fn inserted_ids(events: &[RealtimeEvent]) -> Vec<ItemId> {
        events
            .iter()
            .filter_map(|e| match &e.kind {
                RealtimeEventKind::Insert { entry } => Some(entry.item_id),
                _ => None,
            })
            .collect()
    }

    fn deleted_ids(events: &[RealtimeEvent]) -> Vec<Option<ItemId>> {
        events
            .iter()
            .filter_map(|e| match &e.kind {
                RealtimeEventKind::Delete { item_id } => Some(*item_id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_diff_identical_snapshots_is_empty() {
        let user = UserId::new("u1");
        let rows = vec![entry(2), entry(1)];
        assert!(diff_snapshots(&user, &rows, &rows).is_empty());
    }

    #[test]
    fn test_diff_reports_inserts_oldest_first() {
        let user = UserId::new("u1");
        let previous = vec![entry(1)];
        let current = vec![entry(3), entry(2), entry(1)];

        let events = diff_snapshots(&user, &previous, &current);
        assert_eq!(inserted_ids(&events), vec![ItemId(2), ItemId(3)]);
        assert!(events.iter().all(|e| e.user_id == user));
    }

    #[test]
    fn test_diff_reports_deletes_with_ids() {
        let user = UserId::new("u1");
        let previous = vec![entry(3), entry(2), entry(1)];
        let current = vec![entry(4), entry(1)];

        let events = diff_snapshots(&user, &previous, &current);
        assert_eq!(deleted_ids(&events), vec![Some(ItemId(3)), Some(ItemId(2))]);
        assert_eq!(inserted_ids(&events), vec![ItemId(4)]);
    }
}
