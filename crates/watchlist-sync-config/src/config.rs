use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sync: SyncOptions,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    /// Hosted PostgREST-style table
    Rest,
    /// In-process table (offline use and tests)
    Memory,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "default_backend")]
    pub backend: RemoteBackend,
    /// Project URL, e.g. https://xyz.supabase.co
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_table")]
    pub table: String,
    /// How often the REST change feed polls the table
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Storage slot the list is persisted under
    #[serde(default = "default_cache_key")]
    pub key: String,
    /// Override for the cache directory (defaults to `<data>/cache`)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncOptions {
    #[serde(default = "default_max_write_attempts")]
    pub max_write_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// Replace the whole list from the remote store on every delete event.
    /// When false, delete events that carry an item id remove it locally.
    #[serde(default = "default_true")]
    pub refetch_on_delete: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_base_url")]
    pub base_url: String,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json_logging")]
    pub json: bool,
    pub file: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_backend() -> RemoteBackend {
    RemoteBackend::Rest
}

fn default_table() -> String {
    "watchlist".to_string()
}

fn default_poll_interval_secs() -> u64 {
    15
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_cache_key() -> String {
    "watchlist".to_string()
}

fn default_max_write_attempts() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_catalog_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json_logging() -> bool {
    use std::io::IsTerminal;
    !std::io::stdout().is_terminal()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: String::new(),
            table: default_table(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key: default_cache_key(),
            dir: None,
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_write_attempts: default_max_write_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            refetch_on_delete: default_true(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_base_url(),
            language: default_language(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json_logging(),
            file: None,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.remote.backend == RemoteBackend::Rest {
            let url = self.remote.url.trim();
            if url.is_empty() {
                return Err(anyhow::anyhow!("remote.url is required for the rest backend"));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(anyhow::anyhow!("remote.url must be an http(s) URL: {}", url));
            }
        }
        if self.remote.table.trim().is_empty() {
            return Err(anyhow::anyhow!("remote.table cannot be empty"));
        }
        if self.remote.poll_interval_secs == 0 {
            return Err(anyhow::anyhow!("remote.poll_interval_secs must be at least 1"));
        }
        if self.cache.key.trim().is_empty() {
            return Err(anyhow::anyhow!("cache.key cannot be empty"));
        }
        if self.sync.max_write_attempts == 0 {
            return Err(anyhow::anyhow!("sync.max_write_attempts must be at least 1"));
        }
        if self.sync.retry_base_delay_ms > self.sync.retry_max_delay_ms {
            return Err(anyhow::anyhow!(
                "sync.retry_base_delay_ms ({}) exceeds sync.retry_max_delay_ms ({})",
                self.sync.retry_base_delay_ms,
                self.sync.retry_max_delay_ms
            ));
        }
        Ok(())
    }

    pub fn is_remote_configured(&self) -> bool {
        match self.remote.backend {
            RemoteBackend::Memory => true,
            RemoteBackend::Rest => !self.remote.url.trim().is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn rest_config() -> Config {
        Config {
            remote: RemoteConfig {
                url: "https://example.supabase.co".to_string(),
                ..RemoteConfig::default()
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_config_load_and_save() {
        let file = NamedTempFile::new().unwrap();
        let mut config = rest_config();
        config.sync.max_write_attempts = 3;
        config.cache.key = "primescene-watchlist".to_string();

        let path = file.path().to_path_buf();
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.remote.url, "https://example.supabase.co");
        assert_eq!(loaded.remote.backend, RemoteBackend::Rest);
        assert_eq!(loaded.sync.max_write_attempts, 3);
        assert_eq!(loaded.cache.key, "primescene-watchlist");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [remote]
            backend = "memory"

            [sync]
            refetch_on_delete = false
            "#,
        )
        .unwrap();
        assert_eq!(config.remote.backend, RemoteBackend::Memory);
        assert_eq!(config.remote.table, "watchlist");
        assert!(!config.sync.refetch_on_delete);
        assert_eq!(config.sync.max_write_attempts, 5);
        assert_eq!(config.catalog.base_url, "https://api.themoviedb.org/3");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate() {
        let mut config = Config::default();
        // Default backend is rest without a URL
        assert!(config.validate().is_err());
        assert!(!config.is_remote_configured());

        config.remote.url = "ftp://nope".to_string();
        assert!(config.validate().is_err());

        config = rest_config();
        assert!(config.validate().is_ok());
        assert!(config.is_remote_configured());

        config.sync.max_write_attempts = 0;
        assert!(config.validate().is_err());
        config.sync.max_write_attempts = 2;

        config.sync.retry_base_delay_ms = 10_000;
        config.sync.retry_max_delay_ms = 100;
        assert!(config.validate().is_err());
        config.sync.retry_max_delay_ms = 20_000;

        config.remote.poll_interval_secs = 0;
        assert!(config.validate().is_err());
        config.remote.poll_interval_secs = 5;

        config.cache.key = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.cache.key, "watchlist");
    }
}
