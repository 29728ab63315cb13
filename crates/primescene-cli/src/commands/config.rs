use super::AppContext;
use crate::output::{Output, OutputFormat};
use crate::ConfigCommands;
use color_eyre::Result;
use comfy_table::{modifiers, presets, Attribute, Cell, Color, Table};
use owo_colors::OwoColorize;
use serde_json::json;
use tracing::info;
use watchlist_sync_config::{Config, RemoteBackend};

pub async fn run_config(cmd: ConfigCommands, ctx: &mut AppContext, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show { full } => show_config(ctx, full, output),
        ConfigCommands::Init {
            backend,
            url,
            table,
            api_key,
            tmdb_key,
            force,
        } => init_config(ctx, InitOptions { backend, url, table, api_key, tmdb_key, force }, output),
    }
}

fn mask_string(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.is_empty() {
        return "<not set>".to_string();
    }
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}

fn secret(value: Option<&String>, full: bool) -> String {
    match value {
        Some(v) if full => v.clone(),
        Some(v) => mask_string(v),
        None => "<not set>".to_string(),
    }
}

fn section(title: &str, rows: Vec<(&str, String)>) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new(title).fg(Color::Cyan).add_attribute(Attribute::Bold),
    ]);
    for (key, value) in rows {
        table.add_row(vec![Cell::new(key), Cell::new(value)]);
    }
    table.load_preset(presets::UTF8_FULL);
    table.apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table
}

fn show_config(ctx: &AppContext, full: bool, output: &Output) -> Result<()> {
    let config_file = ctx.paths.config_file();
    let config = &ctx.config;
    let credentials = &ctx.credentials;

    let session_user = credentials
        .get_session_user_id()
        .cloned()
        .unwrap_or_else(|| "<signed out>".to_string());
    let signed_in_at = credentials
        .get_session_signed_in_at()
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    match output.format() {
        OutputFormat::Human => {
            if output.is_quiet() {
                return Ok(());
            }

            if !config_file.exists() {
                println!(
                    "{}",
                    format!("No config file at {}; showing defaults", config_file.display()).bright_black()
                );
            }

            let valid = match config.validate() {
                Ok(()) => "✓".green().to_string(),
                Err(e) => format!("{} {}", "✗".red(), e),
            };
            println!(
                "{}",
                section(
                    "Files",
                    vec![
                        ("Config", config_file.display().to_string()),
                        ("Credentials", ctx.paths.credentials_file().display().to_string()),
                        ("Cache", ctx.cache_dir().display().to_string()),
                        ("Valid", valid),
                    ],
                )
            );
            println!(
                "{}",
                section(
                    "Remote",
                    vec![
                        ("Backend", format!("{:?}", config.remote.backend).to_lowercase()),
                        ("URL", config.remote.url.clone()),
                        ("Table", config.remote.table.clone()),
                        ("Poll interval", format!("{}s", config.remote.poll_interval_secs)),
                        ("API key", secret(credentials.get_remote_api_key(), full)),
                    ],
                )
            );
            println!(
                "{}",
                section(
                    "Sync",
                    vec![
                        ("Cache key", config.cache.key.clone()),
                        ("Max write attempts", config.sync.max_write_attempts.to_string()),
                        (
                            "Retry delay",
                            format!("{}ms .. {}ms", config.sync.retry_base_delay_ms, config.sync.retry_max_delay_ms),
                        ),
                        ("Refetch on delete", config.sync.refetch_on_delete.to_string()),
                    ],
                )
            );
            println!(
                "{}",
                section(
                    "Session",
                    vec![
                        ("User", session_user),
                        ("Signed in at", signed_in_at),
                        ("Access token", secret(credentials.get_session_access_token(), full)),
                        ("TMDB key", secret(credentials.get_tmdb_api_key(), full)),
                    ],
                )
            );
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            output.json(&json!({
                "type": "config",
                "config_file": config_file.display().to_string(),
                "exists": config_file.exists(),
                "valid": config.validate().is_ok(),
                "config": config,
                "session": {
                    "user_id": credentials.get_session_user_id(),
                    "signed_in_at": signed_in_at,
                },
                "credentials": {
                    "remote_api_key": secret(credentials.get_remote_api_key(), full),
                    "session_access_token": secret(credentials.get_session_access_token(), full),
                    "tmdb_api_key": secret(credentials.get_tmdb_api_key(), full),
                }
            }));
        }
    }
    Ok(())
}

struct InitOptions {
    backend: Option<String>,
    url: Option<String>,
    table: Option<String>,
    api_key: Option<String>,
    tmdb_key: Option<String>,
    force: bool,
}

fn init_config(ctx: &mut AppContext, options: InitOptions, output: &Output) -> Result<()> {
    let config_file = ctx.paths.config_file();
    let mut config = if config_file.exists() && !options.force {
        Config::load_from_file(&config_file)
            .map_err(|e| color_eyre::eyre::eyre!("Failed to load config from {}: {}", config_file.display(), e))?
    } else {
        Config::default()
    };

    match options.backend.as_deref() {
        Some("memory") => config.remote.backend = RemoteBackend::Memory,
        Some("rest") => config.remote.backend = RemoteBackend::Rest,
        Some(other) => return Err(color_eyre::eyre::eyre!("Unknown backend '{}'. Use 'rest' or 'memory'", other)),
        None => {}
    }
    if let Some(url) = options.url {
        config.remote.url = url.trim().trim_end_matches('/').to_string();
    }
    if let Some(table) = options.table {
        config.remote.table = table;
    }

    config
        .validate()
        .map_err(|e| color_eyre::eyre::eyre!("Invalid configuration: {}", e))?;

    ctx.paths
        .ensure_directories()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to create directories: {}", e))?;
    config
        .save_to_file(&config_file)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to save config to {}: {}", config_file.display(), e))?;
    info!(operation = "config_init", path = %config_file.display(), "Configuration saved");
    output.success(format!("Configuration saved to {}", config_file.display()));

    let mut credentials_changed = false;
    if let Some(key) = options.api_key {
        ctx.credentials.set_remote_api_key(key);
        credentials_changed = true;
    }
    if let Some(key) = options.tmdb_key {
        ctx.credentials.set_tmdb_api_key(key);
        credentials_changed = true;
    }
    if credentials_changed {
        ctx.credentials
            .save()
            .map_err(|e| color_eyre::eyre::eyre!("Failed to save credentials: {}", e))?;
        output.success(format!("Credentials saved to {}", ctx.paths.credentials_file().display()));
    }

    if config.remote.backend == RemoteBackend::Rest && ctx.credentials.get_remote_api_key().is_none() {
        output.warn("No remote API key stored yet. Pass --api-key to sync with the remote store");
    }

    ctx.config = config;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_string() {
        assert_eq!(mask_string(""), "<not set>");
        assert_eq!(mask_string("abcd"), "****");
        assert_eq!(mask_string("eyJhbGciOi"), "ey***Oi");
    }

    #[test]
    fn test_secret_respects_full() {
        let key = "supersecret".to_string();
        assert_eq!(secret(Some(&key), true), "supersecret");
        assert_eq!(secret(Some(&key), false), "su***et");
        assert_eq!(secret(None, false), "<not set>");
    }
}
