use super::AppContext;
use crate::output::Output;
use color_eyre::Result;
use std::fs;
use tracing::info;

pub async fn run_clear(ctx: &AppContext, all: bool, cache: bool, credentials: bool, output: &Output) -> Result<()> {
    if all {
        clear_cache(ctx, output)?;
        clear_credentials(ctx, output)?;
        output.success("Cleared cached watch list and credentials");
        return Ok(());
    }

    if !cache && !credentials {
        output.warn("No clear option specified. Use --cache, --credentials, or --all");
        output.info("\nExample: primescene clear --cache");
        return Ok(());
    }

    if cache {
        clear_cache(ctx, output)?;
    }
    if credentials {
        clear_credentials(ctx, output)?;
    }
    Ok(())
}

fn clear_cache(ctx: &AppContext, output: &Output) -> Result<()> {
    let cache_dir = ctx.cache_dir();
    if cache_dir.exists() {
        fs::remove_dir_all(&cache_dir).map_err(|e| {
            color_eyre::eyre::eyre!("Failed to remove cache at {}: {}", cache_dir.display(), e)
        })?;
        info!(operation = "clear_cache", path = %cache_dir.display(), "Cache cleared");
        output.success(format!("Cleared cached watch list: {}", cache_dir.display()));
    } else {
        output.info("No cached watch list found to clear");
    }
    Ok(())
}

fn clear_credentials(ctx: &AppContext, output: &Output) -> Result<()> {
    let credentials_file = ctx.paths.credentials_file();
    if credentials_file.exists() {
        fs::remove_file(&credentials_file).map_err(|e| {
            color_eyre::eyre::eyre!("Failed to remove credentials file at {}: {}", credentials_file.display(), e)
        })?;
        info!(operation = "clear_credentials", path = %credentials_file.display(), "Credentials cleared");
        output.success(format!("Cleared credentials: {}", credentials_file.display()));
    } else {
        output.info("No credentials file found to clear");
    }
    Ok(())
}
