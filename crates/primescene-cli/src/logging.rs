use anyhow::Result;
use std::io;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, time::ChronoUtc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};
use watchlist_sync_config::LoggingConfig;

/// Filter directive for the given flags.
///
/// `--quiet` wins, then `-v`/`-vv`, then the configured level. `RUST_LOG`
/// overrides everything except `--quiet`.
fn filter_directive(verbose_level: u8, quiet: bool, config: &LoggingConfig) -> String {
    if quiet {
        return "error".to_string();
    }
    match verbose_level {
        0 => config.level.clone(),
        // Debug without per-request hyper noise
        1 => "debug,hyper::proto::h1=warn,hyper::client::pool=warn".to_string(),
        _ => "trace".to_string(),
    }
}

pub fn init_logging(verbose_level: u8, quiet: bool, config: &LoggingConfig) -> Result<()> {
    init_logging_with_file(verbose_level, quiet, config, config.file.as_deref())
}

pub fn init_logging_with_file(
    verbose_level: u8,
    quiet: bool,
    config: &LoggingConfig,
    log_file: Option<&Path>,
) -> Result<()> {
    let directive = filter_directive(verbose_level, quiet, config);
    let filter = if quiet {
        EnvFilter::new(directive)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
    };

    let json = std::env::var("RUST_LOG_JSON")
        .map(|v| v == "true")
        .unwrap_or(config.json);

    let registry = Registry::default().with(filter);

    let Some(log_path) = log_file else {
        if json {
            let json_layer = fmt::layer()
                .json()
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(io::stderr);
            registry.with(json_layer).init();
        } else {
            let fmt_layer = fmt::layer()
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(io::stderr);
            registry.with(fmt_layer).init();
        }
        return Ok(());
    };

    let log_dir = log_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Log file path has no parent directory"))?;
    std::fs::create_dir_all(log_dir)?;
    let log_filename = log_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid log filename"))?;

    // primescene.log rotates to primescene.2026-01-17 and so on
    let log_prefix = log_filename.rsplit_once('.').map_or(log_filename, |(stem, _)| stem);
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, log_prefix);

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(file_appender);
        registry.with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(false)
            .with_writer(file_appender);
        registry.with(fmt_layer).init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive_precedence() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            json: false,
            file: None,
        };
        assert_eq!(filter_directive(0, false, &config), "warn");
        assert!(filter_directive(1, false, &config).starts_with("debug"));
        assert_eq!(filter_directive(3, false, &config), "trace");
        assert_eq!(filter_directive(2, true, &config), "error");
    }
}
