use super::{AppContext, Session};
use crate::output::Output;
use color_eyre::Result;

/// Print the watch list.
///
/// Signed in, the list comes from the remote store; offline or signed out,
/// from the local cache.
pub async fn run_list(ctx: &AppContext, output: &Output) -> Result<()> {
    let session = Session::start(ctx, output).await?;
    output.watch_list(&session.engine.current_list());
    session.finish(output).await
}
