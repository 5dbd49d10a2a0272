//! Tradeseal CLI.
//!
//! Local identity management and the protocol's hashing helpers. Nothing
//! here talks to a relay.

mod commands;
mod config_file;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tradeseal_types::config::AppConfig;
use tradeseal_types::Result;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Tradeseal: anonymous, signed seller/buyer trades.
#[derive(Parser)]
#[command(name = "tradeseal", version, about)]
struct Cli {
    /// Output in JSON format (no colors, machine-readable).
    #[arg(long, global = true)]
    json: bool,

    /// JSON config file. A missing file means defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the identity file.
    #[arg(long, global = true, default_value = ".tradeseal")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, inspect, export and import the local identity.
    #[command(alias = "id")]
    Identity {
        #[command(subcommand)]
        action: commands::identity::IdentityAction,
    },
    /// Canonical SHA-256 of a JSON document.
    Hash {
        /// The JSON document, as one argument.
        document: String,
    },
    /// Content hash of a listing's description and price.
    ContentHash {
        #[arg(long)]
        description: String,
        /// Any JSON number, e.g. `30` or `19.99`.
        #[arg(long)]
        price: String,
    },
    /// Inspect the effective configuration.
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

// ---------------------------------------------------------------------------
// Global options passed to every command handler
// ---------------------------------------------------------------------------

/// Shared options threaded into command handlers.
pub struct GlobalOpts {
    pub json: bool,
    pub data_dir: PathBuf,
    pub config: AppConfig,
}

impl GlobalOpts {
    pub fn identity_path(&self) -> PathBuf {
        self.data_dir.join(&self.config.identity_file)
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match config_file::load(cli.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            output::print_error(&e.to_string(), cli.json);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let opts = GlobalOpts {
        json: cli.json,
        data_dir: cli.data_dir,
        config,
    };
    tracing::debug!(
        data_dir = %opts.data_dir.display(),
        identity_file = %opts.config.identity_file,
        "configuration loaded"
    );

    if let Err(e) = dispatch(&opts, cli.command).await {
        output::print_error(&e.to_string(), opts.json);
        std::process::exit(1);
    }
}

async fn dispatch(opts: &GlobalOpts, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Identity { action } => commands::identity::run(action, opts).await,
        Commands::Hash { document } => commands::hash::canonical(&document, opts),
        Commands::ContentHash { description, price } => {
            commands::hash::content(&description, &price, opts)
        }
        Commands::Config { action } => commands::config::run(action, opts),
    }
}
