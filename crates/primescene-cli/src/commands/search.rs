use super::AppContext;
use crate::output::Output;
use color_eyre::Result;
use tracing::{debug, info, warn};
use watchlist_sync_core::load_watchlist;
use watchlist_sync_models::WatchList;
use watchlist_sync_remote::CatalogPager;

/// Search the catalog, loading up to `pages` result pages
pub async fn run_search(ctx: &AppContext, query: &str, pages: u32, output: &Output) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        return Err(color_eyre::eyre::eyre!("Search query cannot be empty"));
    }

    let client = ctx.catalog_client().map_err(|e| {
        color_eyre::eyre::eyre!("{}. Store a TMDB key with 'primescene config init --tmdb-key <KEY>'", e)
    })?;

    let mut pager = CatalogPager::new(query);
    while pager.loaded_page() < pages.max(1) && pager.has_more() {
        let added = pager
            .load_more(&client)
            .await
            .map_err(|e| color_eyre::eyre::eyre!("Catalog search failed: {}", e))?;
        debug!(page = pager.loaded_page(), added, "Loaded search page");
    }
    info!(operation = "search", query, results = pager.results().len(), "Catalog search complete");

    // Mark results against the cached list; no remote round trip needed
    let cache = ctx.open_cache(output);
    let saved = match load_watchlist(cache.as_ref(), &ctx.config.cache.key) {
        Ok(list) => list.unwrap_or_default(),
        Err(e) => {
            warn!("Could not read cached watch list: {}", e);
            WatchList::new()
        }
    };

    output.catalog_results(pager.results(), &saved);
    if pager.has_more() {
        output.info(format!(
            "More results available; use --pages {} to load the next page",
            pager.loaded_page() + 1
        ));
    }
    Ok(())
}
