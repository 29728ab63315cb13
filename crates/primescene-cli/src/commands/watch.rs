use super::AppContext;
use crate::output::Output;
use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use watchlist_sync_config::CredentialStore;
use watchlist_sync_core::{follow_identity, EngineOptions, IdentityProvider, SessionIdentity, SyncEngine};
use watchlist_sync_models::{Identity, UserId};
use watchlist_sync_remote::RemoteStore;

/// Re-read the credentials file and apply a login or logout made by
/// another `primescene` process.
///
/// The remote store gets the new access token before the identity switch,
/// so the fetch for the new user is already authorized as that user.
fn reload_session(ctx: &AppContext, session: &SessionIdentity, remote: &dyn RemoteStore, token: &mut Option<String>) {
    let mut credentials = CredentialStore::new(ctx.paths.credentials_file());
    if let Err(e) = credentials.load() {
        warn!("Could not reload credentials: {}", e);
        return;
    }

    let saved_token = credentials.get_session_access_token().cloned();
    if saved_token != *token {
        info!(operation = "session_token", "Saved access token changed");
        remote.set_access_token(saved_token.clone());
        *token = saved_token;
    }

    let saved = match credentials.get_session_user_id() {
        Some(user_id) => Identity::User(UserId::new(user_id.as_str())),
        None => Identity::Anonymous,
    };
    if saved == session.current() {
        return;
    }

    info!(operation = "session_changed", user = %saved, "Saved session changed");
    match saved {
        Identity::User(user_id) => session.sign_in(user_id),
        Identity::Anonymous => session.sign_out(),
    }
}

/// Stay attached to the remote store, printing the list whenever it changes
/// until interrupted.
pub async fn run_watch(ctx: &AppContext, output: &Output) -> Result<()> {
    let remote = ctx.open_remote(output).ok_or_else(|| {
        color_eyre::eyre::eyre!("Watching needs a remote store. Run 'primescene config init' first")
    })?;
    let cache = ctx.open_cache(output);
    let mut access_token = ctx.credentials.get_session_access_token().cloned();

    let engine = SyncEngine::new(Arc::clone(&remote), cache, EngineOptions::from_config(&ctx.config));
    let mut warnings = engine.warnings();
    let mut changes = engine.subscribe_changes();
    engine.initialize();

    let session = SessionIdentity::from_credentials(&ctx.credentials);
    if session.current().is_anonymous() {
        output.warn("Not signed in; changes stay on this device until you run 'primescene login'");
    }
    let follower = tokio::spawn(follow_identity(engine.clone(), session.watch()));

    let poll_interval = Duration::from_secs(ctx.config.remote.poll_interval_secs.max(1));
    let mut session_check = tokio::time::interval(poll_interval);
    session_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(
        operation = "watch_started",
        backend = ?ctx.config.remote.backend,
        user = %session.current(),
        "Watching watch list for changes"
    );
    output.info("Watching for changes (Ctrl+C to stop)");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let list = changes.borrow_and_update().clone();
                debug!(entries = list.len(), "Watch list changed");
                output.watch_list(&list);
            }
            warning = warnings.recv() => match warning {
                Ok(warning) => output.sync_warning(&warning),
                Err(RecvError::Lagged(skipped)) => output.warn(format!("{} warning(s) dropped", skipped)),
                Err(RecvError::Closed) => break,
            },
            _ = session_check.tick() => reload_session(ctx, &session, remote.as_ref(), &mut access_token),
        }
    }

    info!(operation = "watch_stopping", "Shutting down");
    // Dropping the provider ends the follower, which closes the channel
    drop(session);
    if let Err(e) = follower.await {
        warn!("Identity follower ended abnormally: {}", e);
    }
    engine.flush().await;

    output.success("Stopped watching");
    Ok(())
}
