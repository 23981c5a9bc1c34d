//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod config_cmd;
mod scrape;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "parcel-scraper")]
#[command(about = "Extract parcel records from county listing pages")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides $PARCELSCRAPE_CONFIG and ./parcelscrape.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web interface
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default: from config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Scrape a listing page from the terminal and write a CSV
    Scrape {
        /// Listing page URL
        url: String,
        /// Parcel ids to skip, comma separated
        #[arg(short, long, default_value = "")]
        exclude: String,
        /// Output CSV path
        #[arg(short, long, default_value = "parcels.csv")]
        output: PathBuf,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },

    /// Print the effective configuration
    Config,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (settings, source) = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => serve::cmd_serve(&settings, bind.as_deref()).await,
        Commands::Scrape {
            url,
            exclude,
            output,
            headed,
        } => scrape::cmd_scrape(settings, &url, &exclude, &output, headed).await,
        Commands::Config => config_cmd::cmd_config_show(&settings, source.as_deref()),
    }
}
