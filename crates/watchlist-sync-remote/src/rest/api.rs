use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;
use watchlist_sync_models::{CatalogPayload, ItemId, UserId, WatchListEntry};
use crate::error::RemoteError;

const SELECT_COLUMNS: &str = "item_id,payload,created_at";

/// One row of the remote watch-list table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchListRow {
    pub user_id: String,
    pub item_id: u64,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Columns returned by the list query (user_id is implied by the filter)
#[derive(Debug, Deserialize)]
struct ListedRow {
    item_id: u64,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<ListedRow> for WatchListEntry {
    fn from(row: ListedRow) -> Self {
        WatchListEntry {
            item_id: ItemId(row.item_id),
            payload: CatalogPayload::new(row.payload),
            added_at: row.created_at,
        }
    }
}

/// Connection details shared by the store and its feed tasks
#[derive(Clone)]
pub struct RestEndpoint {
    client: Client,
    table_url: String,
    api_key: String,
    // Shared with feed tasks so a new session token reaches them too
    access_token: Arc<RwLock<Option<String>>>,
}

impl RestEndpoint {
    pub fn new(
        base_url: &str,
        table: &str,
        api_key: String,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        if base_url.trim().is_empty() {
            return Err(RemoteError::NotConfigured("remote url is empty".to_string()));
        }
        if api_key.is_empty() {
            return Err(RemoteError::NotConfigured("remote api key is empty".to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            table_url: table_url(base_url, table),
            api_key,
            access_token: Arc::new(RwLock::new(access_token)),
        })
    }

    pub fn table_url(&self) -> &str {
        &self.table_url
    }

    /// Replace the session token sent with later requests
    pub fn set_access_token(&self, token: Option<String>) {
        let mut current = self.access_token.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = token;
    }

    /// Bearer for the Authorization header. Without a user session the anon
    /// key doubles as bearer token.
    pub fn bearer_token(&self) -> String {
        let current = self.access_token.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        current.clone().unwrap_or_else(|| self.api_key.clone())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.bearer_token()))
            .header("Accept", "application/json")
    }

    pub async fn fetch_rows(&self, user: &UserId) -> Result<Vec<WatchListEntry>, RemoteError> {
        let response = self
            .authorized(self.client.get(&self.table_url))
            .query(&list_query(user))
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;
        let entries = parse_rows(&body)?;
        debug!("Fetched {} remote rows for {}", entries.len(), user);
        Ok(entries)
    }

    pub async fn insert_row(&self, row: &WatchListRow) -> Result<(), RemoteError> {
        let response = self
            .authorized(self.client.post(&self.table_url))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(&[row])
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn delete_row(&self, user: &UserId, item_id: ItemId) -> Result<(), RemoteError> {
        let response = self
            .authorized(self.client.delete(&self.table_url))
            .query(&delete_query(user, item_id))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

pub fn table_url(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table)
}

pub fn list_query(user: &UserId) -> Vec<(&'static str, String)> {
    vec![
        ("select", SELECT_COLUMNS.to_string()),
        ("user_id", format!("eq.{}", user)),
        ("order", "created_at.desc".to_string()),
    ]
}

pub fn delete_query(user: &UserId, item_id: ItemId) -> Vec<(&'static str, String)> {
    vec![
        ("user_id", format!("eq.{}", user)),
        ("item_id", format!("eq.{}", item_id)),
    ]
}

pub fn parse_rows(body: &str) -> Result<Vec<WatchListEntry>, RemoteError> {
    let rows: Vec<ListedRow> = serde_json::from_str(body)?;
    Ok(rows.into_iter().map(WatchListEntry::from).collect())
}

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status { status: status.as_u16(), body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_trims_trailing_slash() {
        assert_eq!(
            table_url("https://abc.supabase.co/", "watchlist"),
            "https://abc.supabase.co/rest/v1/watchlist"
        );
    }

    #[test]
    fn test_queries_filter_by_user_and_item() {
        let user = UserId::new("5f1c");
        let list = list_query(&user);
        assert!(list.contains(&("user_id", "eq.5f1c".to_string())));
        assert!(list.contains(&("order", "created_at.desc".to_string())));

        let delete = delete_query(&user, ItemId(603));
        assert_eq!(delete, vec![("user_id", "eq.5f1c".to_string()), ("item_id", "eq.603".to_string())]);
    }

    #[test]
    fn test_parse_rows() {
        let body = r#"[
            {"item_id": 603, "payload": {"title": "The Matrix"}, "created_at": "2024-05-01T10:00:00Z"},
            {"item_id": 1399, "payload": {"name": "Game of Thrones", "media_type": "tv"}}
        ]"#;
        let entries = parse_rows(body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].item_id, ItemId(603));
        assert_eq!(entries[0].title(), Some("The Matrix"));
        assert!(entries[0].added_at.is_some());
        assert_eq!(entries[1].added_at, None);
    }

    #[test]
    fn test_parse_rows_rejects_garbage() {
        assert!(matches!(parse_rows("{\"message\":\"nope\"}"), Err(RemoteError::Decode(_))));
    }

    #[test]
    fn test_row_serialization_omits_missing_timestamp() {
        let row = WatchListRow {
            user_id: "u1".to_string(),
            item_id: 42,
            payload: serde_json::json!({"title": "X"}),
            created_at: None,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["item_id"], 42);
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn test_endpoint_requires_url_and_key() {
        let timeout = Duration::from_secs(5);
        assert!(RestEndpoint::new("", "watchlist", "key".to_string(), None, timeout).is_err());
        assert!(RestEndpoint::new("https://x.supabase.co", "watchlist", String::new(), None, timeout).is_err());
    }

    #[test]
    fn test_bearer_follows_session_token() {
        let endpoint =
            RestEndpoint::new("https://x.supabase.co", "watchlist", "anon".to_string(), None, Duration::from_secs(5))
                .unwrap();
        let feed_copy = endpoint.clone();
        assert_eq!(endpoint.bearer_token(), "anon");

        endpoint.set_access_token(Some("user-jwt".to_string()));
        assert_eq!(endpoint.bearer_token(), "user-jwt");
        assert_eq!(feed_copy.bearer_token(), "user-jwt");

        feed_copy.set_access_token(None);
        assert_eq!(endpoint.bearer_token(), "anon");
    }
}
