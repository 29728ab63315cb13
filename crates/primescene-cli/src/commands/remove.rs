use super::{AppContext, Session};
use crate::output::Output;
use color_eyre::Result;
use tracing::info;
use watchlist_sync_models::ItemId;

pub async fn run_remove(ctx: &AppContext, item_id: u64, output: &Output) -> Result<()> {
    let session = Session::start(ctx, output).await?;
    let item_id = ItemId(item_id);

    let title = session
        .engine
        .current_list()
        .get(item_id)
        .and_then(|entry| entry.title().map(str::to_string));

    if session.engine.remove(item_id) {
        info!(operation = "remove", item_id = %item_id, "Removed from watch list");
        output.success(format!(
            "Removed {} from your watch list",
            title.unwrap_or_else(|| item_id.to_string())
        ));
    } else {
        output.info(format!("Item {} is not in your watch list", item_id));
    }

    session.finish(output).await
}
