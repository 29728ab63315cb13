use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;
use watchlist_sync_models::{CatalogPayload, ItemId, MediaType};
use crate::error::CatalogError;

/// Fields kept in a watch-list snapshot; the rest of a detail response is dropped
const SNAPSHOT_FIELDS: &[&str] = &[
    "id",
    "title",
    "name",
    "overview",
    "poster_path",
    "backdrop_path",
    "vote_average",
    "release_date",
    "first_air_date",
    "media_type",
];

#[derive(Debug, Clone, Deserialize)]
struct SearchResponse {
    page: u32,
    #[serde(default)]
    total_pages: u32,
    #[serde(default)]
    results: Vec<Value>,
}

/// One page of catalog search results (movies and shows only)
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub page: u32,
    pub total_pages: u32,
    pub results: Vec<CatalogPayload>,
}

/// Read-only client for the TMDB v3 API
#[derive(Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    language: String,
}

impl TmdbClient {
    pub fn new(base_url: &str, api_key: String, language: String) -> Result<Self, CatalogError> {
        if api_key.is_empty() {
            return Err(CatalogError::MissingApiKey);
        }
        let client = Client::builder().timeout(Duration::from_secs(20)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            language,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str, query: &[(&str, String)]) -> Result<T, CatalogError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("language", self.language.as_str())])
            .query(query)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status { status, body });
        }
        Ok(response.json::<T>().await?)
    }

    /// Metadata snapshot for a single movie or show
    pub async fn details(&self, media_type: MediaType, item_id: ItemId) -> Result<CatalogPayload, CatalogError> {
        let path = format!("/{}/{}", media_type.as_str(), item_id);
        let value: Value = self.get_json(&path, &[]).await?;
        debug!("Fetched catalog details for {} {}", media_type, item_id);
        Ok(snapshot(value, media_type))
    }

    pub async fn search(&self, query: &str, page: u32) -> Result<SearchPage, CatalogError> {
        let response: SearchResponse = self
            .get_json(
                "/search/multi",
                &[
                    ("query", query.to_string()),
                    ("page", page.max(1).to_string()),
                    ("include_adult", "false".to_string()),
                ],
            )
            .await?;
        Ok(search_page(response))
    }
}

/// Trim a catalog response down to the snapshot fields and tag its media type
pub fn snapshot(value: Value, media_type: MediaType) -> CatalogPayload {
    let mut fields = Map::new();
    if let Value::Object(object) = value {
        for (key, field) in object {
            if SNAPSHOT_FIELDS.contains(&key.as_str()) && !field.is_null() {
                fields.insert(key, field);
            }
        }
    }
    fields.insert("media_type".to_string(), Value::from(media_type.as_str()));
    CatalogPayload::new(Value::Object(fields))
}

fn search_page(response: SearchResponse) -> SearchPage {
    let results = response
        .results
        .into_iter()
        .filter_map(|value| {
            let media_type = value
                .get("media_type")
                .and_then(Value::as_str)
                .and_then(MediaType::parse)?;
            Some(snapshot(value, media_type))
        })
        .collect();
    SearchPage {
        page: response.page,
        total_pages: response.total_pages,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_keeps_listed_fields() {
        let payload = snapshot(
            json!({
                "id": 603,
                "title": "The Matrix",
                "budget": 63000000,
                "poster_path": "/p.jpg",
                "backdrop_path": null,
                "genres": [{"id": 28, "name": "Action"}]
            }),
            MediaType::Movie,
        );
        let value = payload.as_value();
        assert_eq!(value["id"], 603);
        assert_eq!(value["media_type"], "movie");
        assert!(value.get("budget").is_none());
        assert!(value.get("genres").is_none());
        assert!(value.get("backdrop_path").is_none());
    }

    #[test]
    fn test_search_page_drops_people() {
        let response: SearchResponse = serde_json::from_value(json!({
            "page": 1,
            "total_pages": 3,
            "results": [
                {"id": 1, "media_type": "movie", "title": "A"},
                {"id": 2, "media_type": "person", "name": "Someone"},
                {"id": 3, "media_type": "tv", "name": "B"}
            ]
        }))
        .unwrap();

        let page = search_page(response);
        assert_eq!(page.total_pages, 3);
        let ids: Vec<_> = page.results.iter().filter_map(|p| p.id()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_client_requires_api_key() {
        let result = TmdbClient::new("https://api.themoviedb.org/3", String::new(), "en-US".to_string());
        assert!(matches!(result, Err(CatalogError::MissingApiKey)));
    }
}
