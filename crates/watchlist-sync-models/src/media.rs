use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MediaType {
    #[serde(rename = "movie")]
    Movie,
    #[serde(rename = "tv")]
    Show,
}

impl MediaType {
    /// Path segment used by the catalog API ("movie" / "tv")
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Show => "tv",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "movie" | "movies" | "film" => Some(MediaType::Movie),
            "tv" | "show" | "shows" | "series" => Some(MediaType::Show),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of catalog metadata captured when an item is added.
///
/// The snapshot is stored as-is and never revalidated against the catalog,
/// so it is kept as raw JSON. Accessors read the fields the catalog API
/// normally carries (movies use `title`/`release_date`, shows use
/// `name`/`first_air_date`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct CatalogPayload(Value);

impl CatalogPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Start a payload for an item that was not fetched from the catalog
    pub fn builder(media_type: MediaType) -> CatalogPayloadBuilder {
        CatalogPayloadBuilder::new(media_type)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// Catalog id embedded in the snapshot, if any
    pub fn id(&self) -> Option<u64> {
        self.0.get("id").and_then(Value::as_u64)
    }

    pub fn title(&self) -> Option<&str> {
        self.str_field("title").or_else(|| self.str_field("name"))
    }

    pub fn media_type(&self) -> Option<MediaType> {
        if let Some(kind) = self.str_field("media_type") {
            return MediaType::parse(kind);
        }
        // Detail responses carry no media_type; infer from the title field
        if self.str_field("title").is_some() {
            Some(MediaType::Movie)
        } else if self.str_field("name").is_some() {
            Some(MediaType::Show)
        } else {
            None
        }
    }

    pub fn poster_path(&self) -> Option<&str> {
        self.str_field("poster_path")
    }

    pub fn vote_average(&self) -> Option<f64> {
        self.0.get("vote_average").and_then(Value::as_f64)
    }

    pub fn release_year(&self) -> Option<u32> {
        self.str_field("release_date")
            .or_else(|| self.str_field("first_air_date"))
            .and_then(|date| date.get(..4))
            .and_then(|year| year.parse().ok())
    }
}

pub struct CatalogPayloadBuilder {
    fields: Map<String, Value>,
    media_type: MediaType,
}

impl CatalogPayloadBuilder {
    fn new(media_type: MediaType) -> Self {
        let mut fields = Map::new();
        fields.insert("media_type".to_string(), Value::from(media_type.as_str()));
        Self { fields, media_type }
    }

    pub fn id(mut self, id: u64) -> Self {
        self.fields.insert("id".to_string(), Value::from(id));
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        let key = match self.media_type {
            MediaType::Movie => "title",
            MediaType::Show => "name",
        };
        self.fields.insert(key.to_string(), Value::from(title.into()));
        self
    }

    pub fn poster_path(mut self, path: impl Into<String>) -> Self {
        self.fields.insert("poster_path".to_string(), Value::from(path.into()));
        self
    }

    pub fn vote_average(mut self, rating: f64) -> Self {
        self.fields.insert("vote_average".to_string(), Value::from(rating));
        self
    }

    pub fn build(self) -> CatalogPayload {
        CatalogPayload(Value::Object(self.fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_movie_accessors() {
        let payload = CatalogPayload::new(json!({
            "id": 603,
            "title": "The Matrix",
            "release_date": "1999-03-30",
            "poster_path": "/f89U3ADr1oiB1s9GkdPOEpXUk5H.jpg",
            "vote_average": 8.2
        }));
        assert_eq!(payload.id(), Some(603));
        assert_eq!(payload.title(), Some("The Matrix"));
        assert_eq!(payload.media_type(), Some(MediaType::Movie));
        assert_eq!(payload.release_year(), Some(1999));
        assert_eq!(payload.vote_average(), Some(8.2));
    }

    #[test]
    fn test_show_accessors() {
        let payload = CatalogPayload::new(json!({
            "id": 1399,
            "name": "Game of Thrones",
            "first_air_date": "2011-04-17",
            "media_type": "tv"
        }));
        assert_eq!(payload.title(), Some("Game of Thrones"));
        assert_eq!(payload.media_type(), Some(MediaType::Show));
        assert_eq!(payload.release_year(), Some(2011));
        assert_eq!(payload.poster_path(), None);
    }

    #[test]
    fn test_builder_uses_name_for_shows() {
        let payload = CatalogPayload::builder(MediaType::Show)
            .id(7)
            .title("Severance")
            .build();
        assert_eq!(payload.as_value()["name"], "Severance");
        assert_eq!(payload.title(), Some("Severance"));
        assert_eq!(payload.media_type(), Some(MediaType::Show));
    }
}
