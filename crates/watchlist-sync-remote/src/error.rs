use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode remote response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Remote store is not configured: {0}")]
    NotConfigured(String),

    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Subscription {0} not found")]
    SubscriptionNotFound(u64),
}

impl RemoteError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Http(_) | RemoteError::Unavailable(_) => true,
            RemoteError::Status { status, .. } => *status == 429 || *status >= 500,
            RemoteError::Decode(_)
            | RemoteError::NotConfigured(_)
            | RemoteError::SubscriptionNotFound(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Catalog API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Catalog API key is missing")]
    MissingApiKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RemoteError::Unavailable("offline".to_string()).is_transient());
        assert!(RemoteError::Status { status: 503, body: String::new() }.is_transient());
        assert!(RemoteError::Status { status: 429, body: String::new() }.is_transient());
        assert!(!RemoteError::Status { status: 401, body: String::new() }.is_transient());
        assert!(!RemoteError::NotConfigured("url".to_string()).is_transient());
    }
}
