//! Cellserve CLI
//!
//! Command-line interface for submitting segmentation and training jobs and
//! following their progress.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "cellserve")]
#[command(about = "Cell segmentation job CLI", long_about = None)]
struct Cli {
    /// Server URL
    #[arg(long, env = "CELLSERVE_URL", default_value = "http://localhost:5000")]
    server_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        server_url: cli.server_url,
    };

    handle_command(cli.command, &config).await
}
