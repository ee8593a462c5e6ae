use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use trackline::EngineConfig;
use trackline::config::config_path;
use trackline::log_format::TargetFirstFormat;

mod commands;

#[derive(Parser)]
#[command(name = "trackline")]
#[command(about = "Live flight kinematics and path rendering", long_about = None)]
#[command(version)]
struct Cli {
    /// Engine configuration file (defaults to $TRACKLINE_CONFIG, then ./trackline.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable coloured log levels
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded session (JSON lines) and print session outputs
    Replay {
        /// Session event file, one JSON event per line
        #[arg(long)]
        input: PathBuf,

        /// Render tick interval in milliseconds (defaults to the configured value)
        #[arg(long)]
        tick_ms: Option<u64>,

        /// Print Prometheus metrics to stderr when done
        #[arg(long)]
        print_metrics: bool,
    },
    /// Build one renderable route from a request file
    Route {
        /// JSON file with `history`, `currentPosition` and optional `filedRoute`
        #[arg(long)]
        input: PathBuf,
    },
    /// Show the effective configuration, or write the defaults to a file
    Config {
        /// Write the default configuration here instead of printing
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn init_tracing(ansi: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(TargetFirstFormat::new(ansi))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(!cli.no_color);

    let config = EngineConfig::load_or_default(cli.config.as_deref())?;
    match config_path(cli.config.as_deref()) {
        Some(path) => debug!("Loaded configuration from {:?}", path),
        None => debug!("No configuration file, using defaults"),
    }

    match cli.command {
        Commands::Replay {
            input,
            tick_ms,
            print_metrics,
        } => commands::handle_replay(config, &input, tick_ms, print_metrics).await,
        Commands::Route { input } => commands::handle_route(config, &input).await,
        Commands::Config { write } => commands::handle_config(&config, write.as_deref()).await,
    }
}
