/// Factory pattern for creating the remote store from configuration
///
/// Each backend registers a factory; the configured `remote.backend`
/// selects which one builds the store.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use watchlist_sync_config::{Config, CredentialStore, RemoteBackend};
use crate::RemoteStore;

pub trait RemoteStoreFactory: Send + Sync {
    fn backend(&self) -> RemoteBackend;

    /// Build the store. Credentials supply API keys and the session token.
    fn create_store(&self, config: &Config, credentials: &CredentialStore) -> Result<Arc<dyn RemoteStore>>;

    /// Check the configuration before attempting to create the store
    fn validate_config(&self, config: &Config, credentials: &CredentialStore) -> Result<()>;
}

pub struct RemoteStoreFactoryRegistry {
    factories: HashMap<RemoteBackend, Box<dyn RemoteStoreFactory>>,
}

impl RemoteStoreFactoryRegistry {
    /// Create a new registry with all built-in factories registered
    pub fn new() -> Self {
        let mut registry = Self { factories: HashMap::new() };
        registry.register(Box::new(rest::RestStoreFactory));
        registry.register(Box::new(memory::MemoryStoreFactory));
        registry
    }

    pub fn register(&mut self, factory: Box<dyn RemoteStoreFactory>) {
        self.factories.insert(factory.backend(), factory);
    }

    pub fn create_store(&self, config: &Config, credentials: &CredentialStore) -> Result<Arc<dyn RemoteStore>> {
        let factory = self
            .factories
            .get(&config.remote.backend)
            .ok_or_else(|| anyhow::anyhow!("No factory registered for backend {:?}", config.remote.backend))?;
        factory.validate_config(config, credentials)?;
        factory.create_store(config, credentials)
    }
}

impl Default for RemoteStoreFactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

mod rest {
    use super::*;
    use crate::rest::{RestRemoteStore, RestStoreSettings};
    use std::time::Duration;

    pub struct RestStoreFactory;

    impl RemoteStoreFactory for RestStoreFactory {
        fn backend(&self) -> RemoteBackend {
            RemoteBackend::Rest
        }

        fn create_store(&self, config: &Config, credentials: &CredentialStore) -> Result<Arc<dyn RemoteStore>> {
            let api_key = credentials
                .get_remote_api_key()
                .ok_or_else(|| anyhow::anyhow!("Remote API key not found in credentials. Run 'primescene config init' first"))?
                .clone();
            let store = RestRemoteStore::new(RestStoreSettings {
                url: config.remote.url.clone(),
                table: config.remote.table.clone(),
                api_key,
                access_token: credentials.get_session_access_token().cloned(),
                poll_interval: Duration::from_secs(config.remote.poll_interval_secs),
                request_timeout: Duration::from_secs(config.remote.request_timeout_secs),
            })?;
            Ok(Arc::new(store))
        }

        fn validate_config(&self, config: &Config, credentials: &CredentialStore) -> Result<()> {
            if config.remote.url.trim().is_empty() {
                return Err(anyhow::anyhow!("Remote backend is rest but remote.url is not configured"));
            }
            if credentials.get_remote_api_key().map_or(true, |k| k.is_empty()) {
                return Err(anyhow::anyhow!("Remote backend is rest but no API key is stored"));
            }
            if config.remote.poll_interval_secs == 0 {
                return Err(anyhow::anyhow!("remote.poll_interval_secs must be at least 1"));
            }
            Ok(())
        }
    }
}

mod memory {
    use super::*;
    use crate::memory::MemoryRemoteStore;

    pub struct MemoryStoreFactory;

    impl RemoteStoreFactory for MemoryStoreFactory {
        fn backend(&self) -> RemoteBackend {
            RemoteBackend::Memory
        }

        fn create_store(&self, _config: &Config, _credentials: &CredentialStore) -> Result<Arc<dyn RemoteStore>> {
            Ok(Arc::new(MemoryRemoteStore::new()))
        }

        fn validate_config(&self, _config: &Config, _credentials: &CredentialStore) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_memory_backend_needs_no_credentials() {
        let mut config = Config::default();
        config.remote.backend = RemoteBackend::Memory;
        let credentials = CredentialStore::new(PathBuf::from("/tmp/none.toml"));

        let store = RemoteStoreFactoryRegistry::new().create_store(&config, &credentials).unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn test_rest_backend_requires_api_key() {
        let mut config = Config::default();
        config.remote.url = "https://example.supabase.co".to_string();
        let credentials = CredentialStore::new(PathBuf::from("/tmp/none.toml"));

        let result = RemoteStoreFactoryRegistry::new().create_store(&config, &credentials);
        assert!(result.is_err());
    }

    #[test]
    fn test_rest_backend_with_key() {
        let mut config = Config::default();
        config.remote.url = "https://example.supabase.co".to_string();
        let mut credentials = CredentialStore::new(PathBuf::from("/tmp/none.toml"));
        credentials.set_remote_api_key("anon".to_string());

        let store = RemoteStoreFactoryRegistry::new().create_store(&config, &credentials).unwrap();
        assert_eq!(store.backend_name(), "rest");
    }

    #[test]
    fn test_rest_backend_rejects_zero_poll_interval() {
        let mut config = Config::default();
        config.remote.url = "https://example.supabase.co".to_string();
        config.remote.poll_interval_secs = 0;
        let mut credentials = CredentialStore::new(PathBuf::from("/tmp/none.toml"));
        credentials.set_remote_api_key("anon".to_string());

        let err = RemoteStoreFactoryRegistry::new()
            .create_store(&config, &credentials)
            .err()
            .unwrap();
        assert!(err.to_string().contains("poll_interval_secs"));
    }
}
