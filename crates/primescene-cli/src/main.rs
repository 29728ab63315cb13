use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use commands::{add, clear, config, list, remove, search, session, watch, AppContext};
use watchlist_sync_config::PathManager;
use watchlist_sync_models::MediaType;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "primescene")]
#[command(about = "PrimeScene - One watch list, every device")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Movie,
    Tv,
}

impl From<KindArg> for MediaType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Movie => MediaType::Movie,
            KindArg::Tv => MediaType::Show,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the watch list
    #[command(long_about = "Show the watch list. When signed in, the list is fetched from the remote store and cached locally; otherwise the cached guest list is shown.")]
    List,
    /// Add a movie or show to the watch list
    #[command(long_about = "Add a catalog item to the watch list. The change is saved locally right away and sent to the remote store when signed in. Details are fetched from TMDB when a key is configured.")]
    Add {
        /// TMDB id of the item
        id: u64,

        /// Catalog kind of the item
        #[arg(long, value_enum, default_value = "movie")]
        kind: KindArg,

        /// Title to store when catalog details are unavailable
        #[arg(long)]
        title: Option<String>,
    },
    /// Remove an item from the watch list
    Remove {
        /// TMDB id of the item
        id: u64,
    },
    /// Follow the watch list live until interrupted
    #[command(long_about = "Stay connected to the remote store and print the watch list whenever it changes, including changes made on other devices. Logins and logouts made with 'primescene login/logout' are picked up while running.")]
    Watch,
    /// Search the TMDB catalog
    Search {
        /// Search text
        query: String,

        /// Number of result pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Save a session for a user id
    Login {
        /// User id issued by the identity provider
        user_id: String,

        /// Access token for the remote store (defaults to the API key)
        #[arg(long)]
        token: Option<String>,
    },
    /// Forget the saved session
    Logout,
    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
    /// Clear cached data
    #[command(long_about = "Clear the cached watch list or stored credentials. Use --cache to clear the local cache, --credentials to clear stored credentials and the session, or --all to clear both.")]
    Clear {
        /// Clear cache and credentials
        #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["cache", "credentials"])]
        all: bool,

        /// Clear the cached watch list
        #[arg(long, action = ArgAction::SetTrue)]
        cache: bool,

        /// Clear stored credentials
        #[arg(long, action = ArgAction::SetTrue)]
        credentials: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration (masks sensitive data)
    Show {
        /// Show secrets unmasked
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },
    /// Write the config file and store keys
    #[command(long_about = "Create or update the configuration file. Existing settings are kept unless --force is given. Keys are written to the credentials file, never to config.toml.")]
    Init {
        /// Remote backend
        #[arg(long, value_parser = ["rest", "memory"])]
        backend: Option<String>,

        /// Remote project URL, e.g. https://xyz.supabase.co
        #[arg(long)]
        url: Option<String>,

        /// Remote table holding watch-list rows
        #[arg(long)]
        table: Option<String>,

        /// Remote API key
        #[arg(long)]
        api_key: Option<String>,

        /// TMDB API key for catalog lookups
        #[arg(long)]
        tmdb_key: Option<String>,

        /// Start from defaults instead of the existing file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let mut ctx = AppContext::load(PathManager::default())?;

    // Watch is long-running, so it always logs to a file
    let log_result = match cli.command {
        Commands::Watch => {
            let log_file = ctx
                .config
                .logging
                .file
                .clone()
                .unwrap_or_else(|| ctx.paths.watch_log_file());
            logging::init_logging_with_file(cli.verbose, cli.quiet, &ctx.config.logging, Some(&log_file))
        }
        _ => logging::init_logging(cli.verbose, cli.quiet, &ctx.config.logging),
    };
    log_result.map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::List => list::run_list(&ctx, &output).await,
        Commands::Add { id, kind, title } => add::run_add(&ctx, id, kind.into(), title, &output).await,
        Commands::Remove { id } => remove::run_remove(&ctx, id, &output).await,
        Commands::Watch => watch::run_watch(&ctx, &output).await,
        Commands::Search { query, pages } => search::run_search(&ctx, &query, pages, &output).await,
        Commands::Login { user_id, token } => session::run_login(&mut ctx, user_id, token, &output).await,
        Commands::Logout => session::run_logout(&mut ctx, &output).await,
        Commands::Config { cmd } => config::run_config(cmd, &mut ctx, &output).await,
        Commands::Clear { all, cache, credentials } => clear::run_clear(&ctx, all, cache, credentials, &output).await,
    }
}
