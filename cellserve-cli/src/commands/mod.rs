//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod status;
mod submit;

pub use status::WaitArgs;
pub use submit::{SegmentArgs, TrainArgs};

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Upload images and start a segmentation job
    Segment(SegmentArgs),
    /// Upload a labeled dataset and start a training job
    Train(TrainArgs),
    /// Show the current status of a job
    Status {
        /// Job ID (e.g., 2025-01-01-00-00-00-000)
        id: String,
    },
    /// Wait until a job succeeds or fails
    Wait {
        /// Job ID
        id: String,

        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Save the overlay images of a segmentation job
    Preview {
        /// Job ID
        id: String,

        /// Directory to write the overlays into
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Download the output directory of a job as a zip archive
    Download {
        /// Job ID
        id: String,

        /// Directory to write `<id>.zip` into
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Check server health
    Health,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = cellserve_client::CellserveClient::new(&config.server_url);

    match command {
        Commands::Segment(args) => submit::segment(&client, args).await,
        Commands::Train(args) => submit::train(&client, args).await,
        Commands::Status { id } => status::show_status(&client, &id).await,
        Commands::Wait { id, wait } => status::wait(&client, &id, &wait).await,
        Commands::Preview { id, out } => status::save_preview(&client, &id, &out).await,
        Commands::Download { id, out } => status::download(&client, &id, &out).await,
        Commands::Health => status::health(&client).await,
    }
}
