mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, event::EventSubcommand, InboundArgs, SettingsArgs,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "golden-sync",
    about = "Stamp a golden repository with platform application metadata",
    version,
    propagate_version = true
)]
struct Cli {
    /// Settings file (YAML); defaults apply when omitted
    #[arg(long, global = true, env = "GOLDEN_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync with inbound values taken from the environment
    Run {
        #[command(flatten)]
        inbound: InboundArgs,
        #[command(flatten)]
        overrides: SettingsArgs,
    },

    /// Handle an inbound event document; non-application events are skipped
    Handle {
        /// Event JSON file ("-" reads stdin)
        #[arg(long, default_value = "-")]
        event: String,
        /// Platform API key
        #[arg(long, env = "NP_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        #[command(flatten)]
        overrides: SettingsArgs,
    },

    /// Inspect inbound events
    Event {
        #[command(subcommand)]
        subcommand: EventSubcommand,
    },

    /// Inspect effective settings
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } | Commands::Handle { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Run { inbound, overrides } => cmd::run::run(config, &overrides, inbound.into()),
        Commands::Handle {
            event,
            api_key,
            overrides,
        } => cmd::handle::run(config, &overrides, &event, api_key),
        Commands::Event { subcommand } => cmd::event::run(subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(config, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
