pub mod error;
pub mod factory;
pub mod memory;
pub mod rest;
pub mod tmdb;
pub mod traits;

pub use error::{CatalogError, RemoteError};
pub use factory::{RemoteStoreFactory, RemoteStoreFactoryRegistry};
pub use memory::MemoryRemoteStore;
pub use rest::{RestRemoteStore, RestStoreSettings};
pub use tmdb::{CatalogPager, SearchPage, TmdbClient};
pub use traits::{RemoteStore, Subscription, SubscriptionId};
