mod cmd;
mod output;
mod render;
mod settings;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, wait::WaitArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "warmup",
    about = "Wait for a cold-starting chat backend, with progress, tips and a failure view",
    version,
    propagate_version = true
)]
struct Cli {
    /// Backend base URL (default: $WARMUP_API_URL, then http://localhost:5189)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// YAML config file (default: ./warmup.yaml when present)
    #[arg(long, global = true, env = "WARMUP_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log probe activity to stderr
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the backend until it is ready or the retry budget runs out
    Wait(WaitArgs),

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = settings::resolve_config(cli.config.as_deref(), cli.api_url.as_deref())
        .and_then(|config| match cli.command {
            Commands::Wait(args) => cmd::wait::run(config, args, cli.json),
            Commands::Config { subcommand } => cmd::config::run(&config, subcommand, cli.json),
        });

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
