use std::collections::HashSet;
use watchlist_sync_models::CatalogPayload;
use crate::error::CatalogError;
use crate::tmdb::client::{SearchPage, TmdbClient};

/// Accumulates search results across "load more" requests
pub struct CatalogPager {
    query: String,
    results: Vec<CatalogPayload>,
    seen: HashSet<u64>,
    loaded_page: u32,
    total_pages: Option<u32>,
}

impl CatalogPager {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            results: Vec::new(),
            seen: HashSet::new(),
            loaded_page: 0,
            total_pages: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> &[CatalogPayload] {
        &self.results
    }

    pub fn loaded_page(&self) -> u32 {
        self.loaded_page
    }

    pub fn has_more(&self) -> bool {
        match self.total_pages {
            None => true,
            Some(total) => self.loaded_page < total,
        }
    }

    /// Fetch the next page. Returns how many new results were appended.
    pub async fn load_more(&mut self, client: &TmdbClient) -> Result<usize, CatalogError> {
        if !self.has_more() {
            return Ok(0);
        }
        let page = client.search(&self.query, self.loaded_page + 1).await?;
        Ok(self.merge_page(page))
    }

    /// Append a page, skipping ids already shown (results shift between pages)
    pub fn merge_page(&mut self, page: SearchPage) -> usize {
        self.loaded_page = self.loaded_page.max(page.page);
        self.total_pages = Some(page.total_pages);

        let mut added = 0;
        for payload in page.results {
            let fresh = match payload.id() {
                Some(id) => self.seen.insert(id),
                None => true,
            };
            if fresh {
                self.results.push(payload);
                added += 1;
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchlist_sync_models::MediaType;

    fn page(number: u32, total: u32, ids: &[u64]) -> SearchPage {
        SearchPage {
            page: number,
            total_pages: total,
            results: ids
                .iter()
                .map(|id| CatalogPayload::builder(MediaType::Movie).id(*id).build())
                .collect(),
        }
    }

    #[test]
    fn test_merge_appends_and_deduplicates() {
        let mut pager = CatalogPager::new("matrix");
        assert!(pager.has_more());

        assert_eq!(pager.merge_page(page(1, 2, &[1, 2, 3])), 3);
        assert!(pager.has_more());
        assert_eq!(pager.merge_page(page(2, 2, &[3, 4])), 1);
        assert!(!pager.has_more());

        let ids: Vec<_> = pager.results().iter().filter_map(|p| p.id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(pager.loaded_page(), 2);
    }

    #[test]
    fn test_empty_result_set_stops_paging() {
        let mut pager = CatalogPager::new("zzzz");
        assert_eq!(pager.merge_page(page(1, 0, &[])), 0);
        assert!(!pager.has_more());
    }
}
