//! Submission command handlers
//!
//! Uploads images or datasets and optionally waits for the job to finish.

use anyhow::Result;
use cellserve_client::CellserveClient;
use cellserve_core::domain::params::{
    DEFAULT_CELLPROB_THRESHOLD, DEFAULT_EPOCHS, DEFAULT_FLOW_THRESHOLD, DEFAULT_LEARNING_RATE,
    DEFAULT_MODEL, DEFAULT_WEIGHT_DECAY, SegmentationParams, TrainingParams,
};
use cellserve_core::dto::job::SubmitResponse;
use clap::Args;
use colored::*;
use std::path::PathBuf;

use super::status::{WaitArgs, wait_for};

/// Arguments of `cellserve segment`
#[derive(Args)]
pub struct SegmentArgs {
    /// Images to segment
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, default_value_t = DEFAULT_FLOW_THRESHOLD)]
    pub flow_threshold: f64,

    #[arg(long, default_value_t = DEFAULT_CELLPROB_THRESHOLD)]
    pub cellprob_threshold: f64,

    /// Expected cell diameter in pixels (estimated when omitted)
    #[arg(long)]
    pub diameter: Option<f64>,

    /// Wait for the job to finish
    #[arg(short, long)]
    pub wait: bool,

    #[command(flatten)]
    pub wait_args: WaitArgs,
}

/// Arguments of `cellserve train`
#[derive(Args)]
pub struct TrainArgs {
    /// Training images and masks
    #[arg(long = "train", required = true, num_args = 1..)]
    pub train_files: Vec<PathBuf>,

    /// Held-out images and masks
    #[arg(long = "test", num_args = 1..)]
    pub test_files: Vec<PathBuf>,

    /// Name to save the model under
    #[arg(long)]
    pub model_name: Option<String>,

    #[arg(long, default_value_t = DEFAULT_EPOCHS)]
    pub epochs: u32,

    #[arg(long, default_value_t = DEFAULT_LEARNING_RATE)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = DEFAULT_WEIGHT_DECAY)]
    pub weight_decay: f64,

    /// Wait for the job to finish
    #[arg(short, long)]
    pub wait: bool,

    #[command(flatten)]
    pub wait_args: WaitArgs,
}

/// Submit a segmentation job
pub async fn segment(client: &CellserveClient, args: SegmentArgs) -> Result<()> {
    let params = SegmentationParams {
        model: args.model,
        flow_threshold: args.flow_threshold,
        cellprob_threshold: args.cellprob_threshold,
        diameter: args.diameter,
    };

    let submitted = client.submit_segmentation(&args.files, &params).await?;
    print_submitted("Segmentation", &submitted);

    if args.wait {
        wait_for(client, &submitted.id, &args.wait_args).await?;
    }

    Ok(())
}

/// Submit a training job
pub async fn train(client: &CellserveClient, args: TrainArgs) -> Result<()> {
    let params = TrainingParams {
        model_name: args.model_name,
        n_epochs: args.epochs,
        learning_rate: args.learning_rate,
        weight_decay: args.weight_decay,
    };

    let submitted = client
        .submit_training(&args.train_files, &args.test_files, &params)
        .await?;
    print_submitted("Training", &submitted);

    if args.wait {
        wait_for(client, &submitted.id, &args.wait_args).await?;
    }

    Ok(())
}

fn print_submitted(kind: &str, submitted: &SubmitResponse) {
    println!(
        "{} {} job submitted ({} file(s))",
        "✓".green(),
        kind,
        submitted.count
    );
    println!("  ID: {}", submitted.id.to_string().cyan());
}
