use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};
use watchlist_sync_models::WatchList;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize cached list: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Durable key-value slot holding the last synchronized list
pub trait LocalCache: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn write(&self, key: &str, value: &str) -> Result<(), CacheError>;
    fn clear(&self, key: &str) -> Result<(), CacheError>;
}

/// Load the list stored under `key`.
///
/// A slot that does not hold a valid list is treated as empty and removed.
pub fn load_watchlist(cache: &dyn LocalCache, key: &str) -> Result<Option<WatchList>, CacheError> {
    let Some(content) = cache.read(key)? else {
        debug!("Cache miss: {} (slot is empty)", key);
        return Ok(None);
    };

    match serde_json::from_str::<WatchList>(&content) {
        Ok(list) => {
            info!("Cache hit: {} (loaded {} items)", key, list.len());
            Ok(Some(list))
        }
        Err(e) => {
            warn!("Cache corruption detected for {}: {}. Clearing slot.", key, e);
            if let Err(clear_err) = cache.clear(key) {
                warn!("Failed to clear corrupted cache slot {}: {}", key, clear_err);
            }
            Ok(None)
        }
    }
}

pub fn save_watchlist(cache: &dyn LocalCache, key: &str, list: &WatchList) -> Result<(), CacheError> {
    let json = serde_json::to_string(list)?;
    cache.write(key, &json)?;
    debug!("Cache saved: {} ({} items)", key, list.len());
    Ok(())
}

/// One JSON file per key under a directory
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: &Path) -> Result<Self, CacheError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl LocalCache for FileCache {
    fn read(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(&path)?))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let path = self.path_for(key);
        // Write to a temp file, then rename over the slot
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, value)?;
        std::fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), CacheError> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(&path)?;
            info!("Cleared cache slot {:?}", path);
        }
        Ok(())
    }
}

/// In-process cache. Failure switches simulate disabled or full storage.
#[derive(Default)]
pub struct MemoryCache {
    slots: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn slots(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, CacheError> {
        self.slots
            .lock()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".to_string()))
    }
}

impl LocalCache for MemoryCache {
    fn read(&self, key: &str) -> Result<Option<String>, CacheError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("storage disabled".to_string()));
        }
        Ok(self.slots()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), CacheError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("storage quota exceeded".to_string()));
        }
        self.slots()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), CacheError> {
        self.slots()?.remove(key);
        Ok(())
    }
}
