pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{CacheConfig, CatalogConfig, Config, LoggingConfig, RemoteBackend, RemoteConfig, SyncOptions};
pub use credentials::CredentialStore;
pub use paths::{PathManager, container_base_path};
