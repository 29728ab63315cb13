pub mod event;
pub mod identity;
pub mod media;
pub mod watchlist;

pub use event::{RealtimeEvent, RealtimeEventKind};
pub use identity::{Identity, ItemId, UserId};
pub use media::{CatalogPayload, CatalogPayloadBuilder, MediaType};
pub use watchlist::{WatchList, WatchListEntry};
