use super::AppContext;
use crate::output::Output;
use color_eyre::Result;
use tracing::info;

pub async fn run_login(ctx: &mut AppContext, user_id: String, token: Option<String>, output: &Output) -> Result<()> {
    let user_id = user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(color_eyre::eyre::eyre!("User id cannot be empty"));
    }

    ctx.credentials.set_session(user_id.clone(), token);
    ctx.credentials
        .save()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to save credentials: {}", e))?;

    info!(operation = "login", user = %user_id, "Session saved");
    output.success(format!("Signed in as {}", user_id));
    Ok(())
}

/// Forget the saved session. The cached list stays as the guest list.
pub async fn run_logout(ctx: &mut AppContext, output: &Output) -> Result<()> {
    let Some(user_id) = ctx.credentials.get_session_user_id().cloned() else {
        output.info("Not signed in");
        return Ok(());
    };

    ctx.credentials.clear_session();
    ctx.credentials
        .save()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to save credentials: {}", e))?;

    info!(operation = "logout", user = %user_id, "Session cleared");
    output.success(format!("Signed out {}", user_id));
    Ok(())
}
