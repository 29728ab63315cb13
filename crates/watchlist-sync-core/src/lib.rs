pub mod cache;
pub mod engine;
pub mod identity;
pub mod outbox;
pub mod warning;

pub use cache::{load_watchlist, save_watchlist, CacheError, FileCache, LocalCache, MemoryCache};
pub use engine::{EngineOptions, SyncEngine, SyncStatus};
pub use identity::{follow_identity, IdentityProvider, SessionIdentity};
pub use outbox::{PendingWrite, RetryPolicy};
pub use warning::{SyncWarning, WriteKind};
