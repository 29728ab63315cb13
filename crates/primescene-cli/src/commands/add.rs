use super::{AppContext, Session};
use crate::output::Output;
use color_eyre::Result;
use tracing::{info, warn};
use watchlist_sync_models::{CatalogPayload, ItemId, MediaType, WatchListEntry};

/// Look up the catalog snapshot for the item, or build a minimal one
/// from the command line when the catalog cannot be reached.
async fn resolve_payload(
    ctx: &AppContext,
    media_type: MediaType,
    item_id: ItemId,
    title: Option<String>,
    output: &Output,
) -> CatalogPayload {
    let fallback = |title: Option<String>| {
        let builder = CatalogPayload::builder(media_type).id(item_id.0);
        match title {
            Some(title) => builder.title(title).build(),
            None => builder.build(),
        }
    };

    let client = match ctx.catalog_client() {
        Ok(client) => client,
        Err(e) => {
            if title.is_none() {
                output.warn(format!("Catalog unavailable ({}); saving item without details", e));
            }
            return fallback(title);
        }
    };

    match client.details(media_type, item_id).await {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Catalog lookup for {} {} failed: {}", media_type, item_id, e);
            output.warn(format!("Could not fetch details for {} {}: {}", media_type, item_id, e));
            fallback(title)
        }
    }
}

pub async fn run_add(
    ctx: &AppContext,
    item_id: u64,
    media_type: MediaType,
    title: Option<String>,
    output: &Output,
) -> Result<()> {
    let session = Session::start(ctx, output).await?;
    let item_id = ItemId(item_id);

    if session.engine.contains(item_id) {
        output.info(format!("Item {} is already in your watch list", item_id));
        return session.finish(output).await;
    }

    let payload = resolve_payload(ctx, media_type, item_id, title, output).await;
    let entry = WatchListEntry::new(item_id, payload);
    let label = entry.title().map(str::to_string).unwrap_or_else(|| item_id.to_string());

    if session.engine.add(entry) {
        info!(operation = "add", item_id = %item_id, media_type = %media_type, "Added to watch list");
        output.success(format!("Added {} to your watch list", label));
    } else {
        output.info(format!("Item {} is already in your watch list", item_id));
    }

    session.finish(output).await
}
