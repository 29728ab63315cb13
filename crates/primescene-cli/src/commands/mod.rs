pub mod add;
pub mod clear;
pub mod config;
pub mod list;
pub mod remove;
pub mod search;
pub mod session;
pub mod watch;

use crate::output::Output;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use watchlist_sync_config::{Config, CredentialStore, PathManager, RemoteBackend};
use watchlist_sync_core::{EngineOptions, FileCache, LocalCache, MemoryCache, SyncEngine, SyncWarning};
use watchlist_sync_models::Identity;
use watchlist_sync_remote::{CatalogError, MemoryRemoteStore, RemoteStore, RemoteStoreFactoryRegistry, TmdbClient};

/// Paths, config and credentials shared by every command
pub struct AppContext {
    pub paths: PathManager,
    pub config: Config,
    pub credentials: CredentialStore,
}

impl AppContext {
    pub fn load(paths: PathManager) -> Result<Self> {
        let config_file = paths.config_file();
        let config = Config::load_or_default(&config_file)
            .map_err(|e| color_eyre::eyre::eyre!("Failed to load config from {}: {}", config_file.display(), e))?;

        let credentials_file = paths.credentials_file();
        let mut credentials = CredentialStore::new(credentials_file.clone());
        credentials
            .load()
            .map_err(|e| color_eyre::eyre::eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;

        Ok(Self { paths, config, credentials })
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.config
            .cache
            .dir
            .clone()
            .unwrap_or_else(|| self.paths.cache_dir())
    }

    /// Identity of the saved session, if any.
    ///
    /// The in-process backend starts empty on every run, so commands using
    /// it stay signed out and work on the cached list.
    pub fn session_identity(&self) -> Identity {
        if self.config.remote.backend == RemoteBackend::Memory {
            return Identity::Anonymous;
        }
        match self.credentials.get_session_user_id() {
            Some(user_id) => Identity::user(user_id.as_str()),
            None => Identity::Anonymous,
        }
    }

    /// Open the local cache, falling back to memory when the directory is unusable
    pub fn open_cache(&self, output: &Output) -> Arc<dyn LocalCache> {
        let dir = self.cache_dir();
        match FileCache::new(&dir) {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                warn!("Cache directory {} unusable: {}", dir.display(), e);
                output.warn(format!("Local cache unavailable ({}); changes will not persist", e));
                Arc::new(MemoryCache::new())
            }
        }
    }

    pub fn catalog_client(&self) -> std::result::Result<TmdbClient, CatalogError> {
        let api_key = self.credentials.get_tmdb_api_key().cloned().unwrap_or_default();
        TmdbClient::new(&self.config.catalog.base_url, api_key, self.config.catalog.language.clone())
    }

    /// Build the configured remote store. `None` means work offline.
    pub fn open_remote(&self, output: &Output) -> Option<Arc<dyn RemoteStore>> {
        match RemoteStoreFactoryRegistry::new().create_store(&self.config, &self.credentials) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("Remote store unavailable: {}", e);
                output.warn(format!("Remote store unavailable ({}); working offline", e));
                None
            }
        }
    }
}

/// Engine with cache restored and, when a remote store is available,
/// attached to the saved session.
pub struct Session {
    pub engine: SyncEngine,
    warnings: broadcast::Receiver<SyncWarning>,
}

impl Session {
    pub async fn start(ctx: &AppContext, output: &Output) -> Result<Self> {
        let cache = ctx.open_cache(output);
        let (remote, identity) = match ctx.open_remote(output) {
            Some(remote) => (remote, ctx.session_identity()),
            None => (Arc::new(MemoryRemoteStore::new()) as Arc<dyn RemoteStore>, Identity::Anonymous),
        };

        let engine = SyncEngine::new(remote, cache, EngineOptions::from_config(&ctx.config));
        let warnings = engine.warnings();
        engine.initialize();
        debug!("Attaching engine as {}", identity);
        engine.attach(identity).await;

        Ok(Self { engine, warnings })
    }

    /// Print warnings raised since the last call
    pub fn report_warnings(&mut self, output: &Output) {
        loop {
            match self.warnings.try_recv() {
                Ok(warning) => output.sync_warning(&warning),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    output.warn(format!("{} warning(s) dropped", skipped));
                }
                Err(_) => break,
            }
        }
    }

    /// Deliver queued writes, close the realtime channel and report warnings
    pub async fn finish(mut self, output: &Output) -> Result<()> {
        self.engine.flush().await;
        self.engine.shutdown().await;
        self.report_warnings(output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_defaults_in_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::load(PathManager::from_base(dir.path().to_path_buf())).unwrap();

        assert_eq!(ctx.config.cache.key, "watchlist");
        assert_eq!(ctx.cache_dir(), dir.path().join("data").join("cache"));
        assert!(ctx.session_identity().is_anonymous());
    }

    #[test]
    fn test_session_identity_from_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::from_base(dir.path().to_path_buf());
        let mut credentials = CredentialStore::new(paths.credentials_file());
        credentials.set_session("u1".to_string(), None);
        credentials.save().unwrap();

        let mut ctx = AppContext::load(paths).unwrap();
        assert_eq!(ctx.session_identity(), Identity::user("u1"));

        ctx.config.remote.backend = RemoteBackend::Memory;
        assert!(ctx.session_identity().is_anonymous());
    }

    #[test]
    fn test_cache_dir_override() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = AppContext::load(PathManager::from_base(dir.path().to_path_buf())).unwrap();
        ctx.config.cache.dir = Some(dir.path().join("elsewhere"));
        assert_eq!(ctx.cache_dir(), dir.path().join("elsewhere"));
    }
}
