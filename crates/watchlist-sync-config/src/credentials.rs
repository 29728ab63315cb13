use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

const REMOTE_API_KEY: &str = "remote_api_key";
const SESSION_USER_ID: &str = "session_user_id";
const SESSION_ACCESS_TOKEN: &str = "session_access_token";
const SESSION_SIGNED_IN_AT: &str = "session_signed_in_at";
const TMDB_API_KEY: &str = "tmdb_api_key";

#[derive(Debug, Serialize, Deserialize, Default)]
struct CredentialsData {
    #[serde(flatten)]
    data: HashMap<String, String>,
}

/// Secrets and session state kept out of `config.toml`
pub struct CredentialStore {
    path: PathBuf,
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            credentials: HashMap::new(),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            let creds_data: CredentialsData = toml::from_str(&content)?;
            self.credentials = creds_data.data;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let creds_data = CredentialsData {
            data: self.credentials.clone(),
        };
        let content = toml::to_string_pretty(&creds_data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.credentials.get(key)
    }

    pub fn set(&mut self, key: String, value: String) {
        self.credentials.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.credentials.remove(key);
    }

    // Remote store
    pub fn get_remote_api_key(&self) -> Option<&String> {
        self.get(REMOTE_API_KEY)
    }

    pub fn set_remote_api_key(&mut self, key: String) {
        self.set(REMOTE_API_KEY.to_string(), key);
    }

    // Catalog API
    pub fn get_tmdb_api_key(&self) -> Option<&String> {
        self.get(TMDB_API_KEY)
    }

    pub fn set_tmdb_api_key(&mut self, key: String) {
        self.set(TMDB_API_KEY.to_string(), key);
    }

    // Session issued by the identity provider
    pub fn get_session_user_id(&self) -> Option<&String> {
        self.get(SESSION_USER_ID).filter(|id| !id.is_empty())
    }

    pub fn get_session_access_token(&self) -> Option<&String> {
        self.get(SESSION_ACCESS_TOKEN)
    }

    pub fn get_session_signed_in_at(&self) -> Option<DateTime<Utc>> {
        self.get(SESSION_SIGNED_IN_AT)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn set_session(&mut self, user_id: String, access_token: Option<String>) {
        self.set(SESSION_USER_ID.to_string(), user_id);
        match access_token {
            Some(token) => self.set(SESSION_ACCESS_TOKEN.to_string(), token),
            None => self.remove(SESSION_ACCESS_TOKEN),
        }
        self.set(SESSION_SIGNED_IN_AT.to_string(), Utc::now().to_rfc3339());
    }

    pub fn clear_session(&mut self) {
        self.remove(SESSION_USER_ID);
        self.remove(SESSION_ACCESS_TOKEN);
        self.remove(SESSION_SIGNED_IN_AT);
    }

    pub fn get_all_keys(&self) -> Vec<String> {
        self.credentials.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_credential_store_load_and_save() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();

        let mut store = CredentialStore::new(path.clone());
        store.set_remote_api_key("anon-key".to_string());
        store.set_tmdb_api_key("tmdb-key".to_string());
        store.save().unwrap();

        let mut loaded_store = CredentialStore::new(path);
        loaded_store.load().unwrap();
        assert_eq!(loaded_store.get_remote_api_key(), Some(&"anon-key".to_string()));
        assert_eq!(loaded_store.get_tmdb_api_key(), Some(&"tmdb-key".to_string()));
    }

    #[test]
    fn test_session_set_and_clear() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();

        let mut store = CredentialStore::new(path.clone());
        store.set_session("user-1".to_string(), Some("jwt".to_string()));
        store.save().unwrap();

        let mut loaded_store = CredentialStore::new(path);
        loaded_store.load().unwrap();
        assert_eq!(loaded_store.get_session_user_id(), Some(&"user-1".to_string()));
        assert_eq!(loaded_store.get_session_access_token(), Some(&"jwt".to_string()));
        let signed_in = loaded_store.get_session_signed_in_at().unwrap();
        assert!((Utc::now() - signed_in).num_seconds().abs() < 5);

        loaded_store.clear_session();
        assert_eq!(loaded_store.get_session_user_id(), None);
        assert_eq!(loaded_store.get_session_access_token(), None);
    }

    #[test]
    fn test_empty_session_user_is_anonymous() {
        let mut store = CredentialStore::new(PathBuf::from("/tmp/test"));
        store.set(SESSION_USER_ID.to_string(), String::new());
        assert_eq!(store.get_session_user_id(), None);
    }

    #[test]
    fn test_credential_store_remove() {
        let mut store = CredentialStore::new(PathBuf::from("/tmp/test"));
        store.set("key1".to_string(), "value1".to_string());
        store.set("key2".to_string(), "value2".to_string());

        assert_eq!(store.get("key1"), Some(&"value1".to_string()));
        store.remove("key1");
        assert_eq!(store.get("key1"), None);
        assert_eq!(store.get("key2"), Some(&"value2".to_string()));
    }
}
