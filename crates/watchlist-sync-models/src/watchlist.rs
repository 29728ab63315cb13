use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::identity::ItemId;
use crate::media::CatalogPayload;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchListEntry {
    pub item_id: ItemId,
    pub payload: CatalogPayload, // Snapshot taken at add time, never refreshed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

impl WatchListEntry {
    pub fn new(item_id: ItemId, payload: CatalogPayload) -> Self {
        Self {
            item_id,
            payload,
            added_at: Some(Utc::now()),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.payload.title()
    }
}

/// Ordered watch-list, unique by `item_id`, newest entries first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct WatchList {
    entries: Vec<WatchListEntry>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from remote or cached rows, keeping their order.
    /// Later duplicates of an id are dropped.
    pub fn from_entries(entries: Vec<WatchListEntry>) -> Self {
        let mut list = Self::new();
        for entry in entries {
            if !list.contains(entry.item_id) {
                list.entries.push(entry);
            }
        }
        list
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.entries.iter().any(|e| e.item_id == item_id)
    }

    pub fn get(&self, item_id: ItemId) -> Option<&WatchListEntry> {
        self.entries.iter().find(|e| e.item_id == item_id)
    }

    /// Prepend `entry` unless its id is already present. Returns whether the list changed.
    pub fn insert_front(&mut self, entry: WatchListEntry) -> bool {
        if self.contains(entry.item_id) {
            return false;
        }
        self.entries.insert(0, entry);
        true
    }

    /// Remove the entry with `item_id`. Returns whether the list changed.
    pub fn remove(&mut self, item_id: ItemId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.item_id != item_id);
        self.entries.len() != before
    }

    pub fn item_ids(&self) -> Vec<ItemId> {
        self.entries.iter().map(|e| e.item_id).collect()
    }

    pub fn entries(&self) -> &[WatchListEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WatchListEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for WatchList {
    type Item = WatchListEntry;
    type IntoIter = std::vec::IntoIter<WatchListEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a WatchList {
    type Item = &'a WatchListEntry;
    type IntoIter = std::slice::Iter<'a, WatchListEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaType;

    fn entry(id: u64, title: &str) -> WatchListEntry {
        WatchListEntry::new(ItemId(id), CatalogPayload::builder(MediaType::Movie).id(id).title(title).build())
    }

    #[test]
    fn test_insert_front_prepends_and_ignores_duplicates() {
        let mut list = WatchList::new();
        assert!(list.insert_front(entry(1, "One")));
        assert!(list.insert_front(entry(2, "Two")));
        assert!(!list.insert_front(entry(1, "One again")));

        assert_eq!(list.item_ids(), vec![ItemId(2), ItemId(1)]);
        assert_eq!(list.get(ItemId(1)).unwrap().title(), Some("One"));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut list = WatchList::from_entries(vec![entry(1, "One")]);
        assert!(!list.remove(ItemId(9)));
        assert!(list.remove(ItemId(1)));
        assert!(!list.remove(ItemId(1)));
        assert!(list.is_empty());
    }

    #[test]
    fn test_from_entries_keeps_order_and_drops_duplicates() {
        let list = WatchList::from_entries(vec![entry(3, "C"), entry(1, "A"), entry(3, "C dup")]);
        assert_eq!(list.item_ids(), vec![ItemId(3), ItemId(1)]);
        assert_eq!(list.get(ItemId(3)).unwrap().title(), Some("C"));
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let list = WatchList::from_entries(vec![entry(42, "X")]);
        let json = serde_json::to_value(&list).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["item_id"], 42);
        assert_eq!(json[0]["payload"]["title"], "X");
    }
}
