//! swiftexd: the swiftex daemon.
//!
//! Single binary that assembles the exporter:
//! - Config loading and validation
//! - Node discovery (static list or node list file)
//! - One scheduled collector per metric family
//! - Metric store
//! - Scrape API
//!
//! # Usage
//!
//! ```text
//! swiftexd serve --config /etc/swiftex/swiftex.toml
//! swiftexd check-config --config /etc/swiftex/swiftex.toml
//! swiftexd collect-once --config /etc/swiftex/swiftex.toml
//! ```

mod daemon;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "/etc/swiftex/swiftex.toml";

#[derive(Parser)]
#[command(name = "swiftexd", version, about = "Prometheus exporter for OpenStack Swift")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the collectors and serve the scrape endpoint until interrupted.
    Serve {
        /// Path to the config file.
        #[arg(long, short, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Override `server.listen` from the config file.
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// Validate the config file and print the resolved settings.
    CheckConfig {
        /// Path to the config file.
        #[arg(long, short, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Run every collector once and print the exposition to stdout.
    CollectOnce {
        /// Path to the config file.
        #[arg(long, short, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve { config, listen } => daemon::run_serve(&config, listen).await,
        Command::CheckConfig { config } => daemon::check_config(&config),
        Command::CollectOnce { config } => daemon::collect_once(&config).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,swiftexd=debug,swiftex=debug"));

    // Logs go to stderr so `collect-once` output stays clean.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
