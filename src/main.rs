use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use completion::CompletionClient;
use dashboard::DashboardService;
use store::{RestSessionStore, SessionStore};

mod cache;
mod completion;
mod config;
mod dashboard;
mod http;
mod models;
mod storage;
mod store;
mod tui;
mod types;
mod utils;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "fiesta")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output the dashboard as JSON instead of rendering tables
    #[arg(long)]
    json: bool,

    /// Use comma-separated number formatting
    #[arg(long)]
    number_comma: bool,

    /// Use human-readable number formatting (k, m, b, t)
    #[arg(short = 'H', long)]
    number_human: bool,

    /// Locale for number formatting (en, de, fr, es, it, ja, ko, zh)
    #[arg(long)]
    locale: Option<String>,

    /// Number of decimal places for human-readable formatting
    #[arg(long)]
    decimal_places: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one prompt to several models and compare the answers
    Compare(CompareArgs),
    /// List or delete saved comparison sessions
    Sessions(SessionsArgs),
    /// Output dashboard metrics as JSON
    Stats(StatsArgs),
    /// List the available models
    Models,
    /// Manage configuration
    Config(ConfigArgs),
    /// Zero the cumulative dashboard counters
    ResetMetrics,
}

#[derive(Args)]
struct CompareArgs {
    /// The prompt to fan out
    prompt: String,

    /// Comma-separated model ids (see `fiesta models`)
    #[arg(long, value_delimiter = ',', required = true)]
    models: Vec<String>,

    /// Mark one of the selected models as the best answer
    #[arg(long)]
    best: Option<String>,

    /// Persist the comparison to the session store
    #[arg(long, default_value_t = false)]
    save: bool,
}

#[derive(Args)]
struct SessionsArgs {
    #[command(subcommand)]
    subcommand: SessionsSubcommands,
}

#[derive(Subcommand)]
enum SessionsSubcommands {
    /// List saved comparisons, newest first
    List,
    /// Delete one saved comparison by id
    Delete { id: String },
}

#[derive(Args)]
struct StatsArgs {
    /// Pretty-print JSON instead of a single line
    #[arg(long, default_value_t = false)]
    pretty: bool,

    /// Include raw session records in the JSON output
    #[arg(long, default_value_t = false)]
    include_sessions: bool,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    subcommand: ConfigSubcommands,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Create default configuration file
    Init {
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Show current configuration
    Show,
    /// Set configuration value
    Set {
        /// Configuration key (api-token, server-url, completion-token, completion-url,
        /// timeout-seconds, number-comma, number-human, locale, decimal-places)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load config file to get defaults
    let config = config::Config::load().unwrap_or(None).unwrap_or_default();

    // Create format options merging config defaults with CLI overrides
    let format_options = utils::NumberFormatOptions {
        use_comma: cli.number_comma || config.formatting.number_comma,
        use_human: cli.number_human || config.formatting.number_human,
        locale: cli.locale.unwrap_or(config.formatting.locale),
        decimal_places: cli
            .decimal_places
            .unwrap_or(config.formatting.decimal_places),
    };

    let outcome = match cli.command {
        None => {
            if cli.json {
                run_stats(StatsArgs {
                    pretty: true,
                    include_sessions: false,
                })
                .await
            } else {
                run_dashboard(&format_options).await
            }
        }
        Some(Commands::Compare(args)) => run_compare(args).await,
        Some(Commands::Sessions(args)) => run_sessions(args, &format_options).await,
        Some(Commands::Stats(args)) => run_stats(args).await,
        Some(Commands::Models) => tui::show_model_catalog(),
        Some(Commands::Config(args)) => handle_config_subcommand(args),
        Some(Commands::ResetMetrics) => run_reset_metrics(),
    };

    if let Err(e) = outcome {
        tui::show_error("Error", &format!("{e:#}"));
        std::process::exit(1);
    }
}

/// Load the config and insist the session store credentials are present.
fn require_configured() -> Result<config::Config> {
    match config::Config::load()? {
        Some(config) if config.is_configured() => Ok(config),
        Some(config) => {
            tui::show_config_help();
            if config.is_api_token_missing() {
                anyhow::bail!("Configuration incomplete: API token not set");
            }
            if config.is_server_url_missing() {
                anyhow::bail!("Configuration incomplete: server URL not set");
            }
            anyhow::bail!("Configuration incomplete")
        }
        None => {
            tui::show_config_help();
            anyhow::bail!("No configuration found. Run 'fiesta config init' first")
        }
    }
}

async fn fetch_sessions(config: &config::Config) -> Result<Vec<types::ChatSession>> {
    let store = RestSessionStore::new(&config.server)?;
    store.fetch_all_sessions().await
}

async fn run_dashboard(format_options: &utils::NumberFormatOptions) -> Result<()> {
    let config = require_configured()?;
    let sessions = fetch_sessions(&config)
        .await
        .context("Failed to load sessions")?;

    let service = DashboardService::with_default_storage()?;
    let snapshot = service.snapshot(&sessions, false);
    tui::show_dashboard(&snapshot, format_options)
}

async fn run_compare(args: CompareArgs) -> Result<()> {
    let config = require_configured()?;
    if !config.is_completion_configured() {
        tui::show_config_help();
        anyhow::bail!("Completion provider not configured");
    }

    for model in &args.models {
        if !models::is_known_model(model) {
            utils::warn_once(format!(
                "⚠️  '{model}' is not in the model catalog; sending it anyway"
            ));
        }
    }

    if let Some(best) = &args.best
        && !args.models.contains(best)
    {
        anyhow::bail!("--best must name one of the selected models");
    }

    let client = CompletionClient::new(&config.completion)?;
    let mut session = client.run_comparison(&args.prompt, &args.models).await;
    session.best_response = args.best;

    tui::show_comparison(&session)?;

    if args.save {
        let store = RestSessionStore::new(&config.server)?;
        store
            .upsert_session(&session)
            .await
            .context("Failed to save comparison")?;

        println!("💾 Saved comparison {}", session.id);
    }

    Ok(())
}

async fn run_sessions(
    args: SessionsArgs,
    format_options: &utils::NumberFormatOptions,
) -> Result<()> {
    let config = require_configured()?;
    let store = RestSessionStore::new(&config.server)?;

    match args.subcommand {
        SessionsSubcommands::List => {
            let sessions = store.fetch_all_sessions().await?;
            tui::show_session_list(&sessions, format_options)
        }
        SessionsSubcommands::Delete { id } => {
            store
                .delete_session(&id)
                .await
                .with_context(|| format!("Failed to delete session {id}"))?;

            println!("🗑️  Deleted session {id}");
            Ok(())
        }
    }
}

async fn run_stats(args: StatsArgs) -> Result<()> {
    let config = require_configured()?;
    let sessions = fetch_sessions(&config)
        .await
        .context("Failed to load sessions")?;

    let service = DashboardService::with_default_storage()?;
    let snapshot = service.snapshot(&sessions, args.include_sessions);

    if args.pretty {
        let json = simd_json::to_string_pretty(&snapshot)?;
        println!("{json}");
    } else {
        let json = simd_json::to_string(&snapshot)?;
        println!("{json}");
    }

    Ok(())
}

fn run_reset_metrics() -> Result<()> {
    let service = DashboardService::with_default_storage()?;
    service.reset_cumulative_metrics();
    println!("✅ Cumulative metrics reset.");
    Ok(())
}

fn handle_config_subcommand(config_args: ConfigArgs) -> Result<()> {
    match config_args.subcommand {
        ConfigSubcommands::Init { overwrite } => {
            config::create_default_config(overwrite).context("Error creating config")
        }
        ConfigSubcommands::Show => config::show_config().context("Error showing config"),
        ConfigSubcommands::Set { key, value } => {
            config::set_config_value(&key, &value).context("Error setting config")
        }
    }
}
