use clap::ValueEnum;
use comfy_table::{presets, modifiers, Attribute, Cell, Color, Table};
use owo_colors::OwoColorize;
use serde_json::json;
use watchlist_sync_core::SyncWarning;
use watchlist_sync_models::{CatalogPayload, WatchList};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    #[value(name = "json-pretty")]
    JsonPretty,
}

pub struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }

        match self.format {
            OutputFormat::Human => {
                println!("{} {}", "✓".green(), msg.as_ref());
            }
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({
                    "type": "success",
                    "message": msg.as_ref()
                }));
            }
        }
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        // Errors are shown even in quiet mode
        match self.format {
            OutputFormat::Human => {
                eprintln!("{} {}", "✗".red(), msg.as_ref());
            }
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({
                    "type": "error",
                    "message": msg.as_ref()
                }));
            }
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }

        match self.format {
            OutputFormat::Human => {
                println!("{}", msg.as_ref());
            }
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({
                    "type": "info",
                    "message": msg.as_ref()
                }));
            }
        }
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }

        match self.format {
            OutputFormat::Human => {
                println!("{} {}", "⚠".yellow(), msg.as_ref());
            }
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({
                    "type": "warning",
                    "message": msg.as_ref()
                }));
            }
        }
    }

    pub fn sync_warning(&self, warning: &SyncWarning) {
        if self.quiet {
            return;
        }

        match self.format {
            OutputFormat::Human => self.warn(warning.to_string()),
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({
                    "type": "warning",
                    "message": warning.to_string(),
                    "detail": warning
                }));
            }
        }
    }

    pub fn json(&self, data: &serde_json::Value) {
        if self.quiet && self.format != OutputFormat::Human {
            return;
        }

        self.print_json(data);
    }

    fn print_json(&self, data: &serde_json::Value) {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(data).unwrap_or_default());
            }
            OutputFormat::JsonPretty => {
                println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
            }
            OutputFormat::Human => {
                println!("{}", data);
            }
        }
    }

    pub fn watch_list(&self, list: &WatchList) {
        match self.format {
            OutputFormat::Human => {
                if self.quiet {
                    return;
                }
                if list.is_empty() {
                    println!("{}", "Watch list is empty".bright_black());
                    return;
                }
                println!("{}", watch_list_table(list));
                println!("{} item(s)", list.len());
            }
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.json(&json!({
                    "type": "watchlist",
                    "count": list.len(),
                    "items": list
                }));
            }
        }
    }

    /// Search results, marking titles already on `list`
    pub fn catalog_results(&self, results: &[CatalogPayload], list: &WatchList) {
        match self.format {
            OutputFormat::Human => {
                if self.quiet {
                    return;
                }
                if results.is_empty() {
                    println!("{}", "No results".bright_black());
                    return;
                }
                println!("{}", catalog_table(results, list));
            }
            OutputFormat::Json | OutputFormat::JsonPretty => {
                let items: Vec<_> = results
                    .iter()
                    .map(|payload| {
                        let saved = payload
                            .id()
                            .map_or(false, |id| list.contains(id.into()));
                        json!({ "payload": payload, "in_watch_list": saved })
                    })
                    .collect();
                self.json(&json!({
                    "type": "search",
                    "count": items.len(),
                    "results": items
                }));
            }
        }
    }
}

fn styled_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.set_header(
        header
            .into_iter()
            .map(|h| Cell::new(h).fg(Color::Cyan).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

fn display_year(payload: &CatalogPayload) -> String {
    payload.release_year().map(|y| y.to_string()).unwrap_or_default()
}

fn display_rating(payload: &CatalogPayload) -> String {
    payload.vote_average().map(|r| format!("{:.1}", r)).unwrap_or_default()
}

fn display_kind(payload: &CatalogPayload) -> String {
    payload.media_type().map(|m| m.to_string()).unwrap_or_default()
}

fn watch_list_table(list: &WatchList) -> Table {
    let mut table = styled_table(vec!["ID", "Type", "Title", "Year", "Rating", "Added"]);
    for entry in list {
        table.add_row(vec![
            Cell::new(entry.item_id),
            Cell::new(display_kind(&entry.payload)),
            Cell::new(entry.title().unwrap_or("(untitled)")),
            Cell::new(display_year(&entry.payload)),
            Cell::new(display_rating(&entry.payload)),
            Cell::new(
                entry
                    .added_at
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            ),
        ]);
    }
    table
}

fn catalog_table(results: &[CatalogPayload], list: &WatchList) -> Table {
    let mut table = styled_table(vec!["", "ID", "Type", "Title", "Year", "Rating"]);
    for payload in results {
        let saved = payload.id().map_or(false, |id| list.contains(id.into()));
        table.add_row(vec![
            Cell::new(if saved { "✓".green().to_string() } else { String::new() }),
            Cell::new(payload.id().map(|id| id.to_string()).unwrap_or_default()),
            Cell::new(display_kind(payload)),
            Cell::new(payload.title().unwrap_or("(untitled)")),
            Cell::new(display_year(payload)),
            Cell::new(display_rating(payload)),
        ]);
    }
    table
}
