//! Status command handlers
//!
//! Shows job status, waits for completion and saves preview images.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cellserve_client::CellserveClient;
use cellserve_core::domain::job::{JobId, JobStatus};
use cellserve_core::domain::record::{JobOutput, LossCurve, StatusRecord};
use clap::Args;
use colored::*;
use std::path::Path;
use std::time::Duration;

/// Polling options
#[derive(Args, Debug, Clone)]
pub struct WaitArgs {
    /// Seconds between status polls
    #[arg(long, default_value_t = 2)]
    pub interval: u64,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 3600)]
    pub timeout: u64,
}

fn parse_id(raw: &str) -> Result<JobId> {
    JobId::parse(raw.trim()).with_context(|| format!("'{}' is not a job ID", raw))
}

/// Show the status of a job
pub async fn show_status(client: &CellserveClient, id: &str) -> Result<()> {
    let id = parse_id(id)?;

    match client.status(&id).await? {
        Some(record) => print_record(&id, &record),
        None => println!(
            "{}",
            format!("Job {} not found (unknown or expired).", id).yellow()
        ),
    }

    Ok(())
}

/// Wait for a job given on the command line
pub async fn wait(client: &CellserveClient, id: &str, args: &WaitArgs) -> Result<()> {
    let id = parse_id(id)?;
    wait_for(client, &id, args).await
}

/// Poll until the job finishes, then print its final record
///
/// Fails when the job itself failed, so scripts can rely on the exit code.
pub async fn wait_for(client: &CellserveClient, id: &JobId, args: &WaitArgs) -> Result<()> {
    println!("{}", format!("Waiting for job {}...", id).dimmed());

    let record = client
        .wait_for_completion(
            id,
            Duration::from_secs(args.interval.max(1)),
            Duration::from_secs(args.timeout),
        )
        .await?;

    print_record(id, &record);

    if record.status == JobStatus::Failed {
        anyhow::bail!("job {} failed", id);
    }
    Ok(())
}

/// Decode and write the overlays of a job into `out`
pub async fn save_preview(client: &CellserveClient, id: &str, out: &Path) -> Result<()> {
    let id = parse_id(id)?;
    let preview = client.preview(&id).await?;

    if !preview.ok {
        anyhow::bail!(
            "no preview for job {}: {}",
            id,
            preview.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create {}", out.display()))?;

    for image in &preview.images {
        // Names come from the server; keep only the final component
        let name = Path::new(&image.filename)
            .file_name()
            .with_context(|| format!("Invalid image name '{}'", image.filename))?;
        let data = STANDARD
            .decode(&image.image)
            .with_context(|| format!("Invalid image data for {}", image.filename))?;

        let path = out.join(name);
        std::fs::write(&path, data)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("  {} {}", "▸".cyan(), path.display());
    }

    println!(
        "{}",
        format!("Saved {} overlay(s)", preview.images.len()).green()
    );
    Ok(())
}

/// Save the zipped output directory of a job
pub async fn download(client: &CellserveClient, id: &str, out: &Path) -> Result<()> {
    let id = parse_id(id)?;
    let archive = client.download(&id).await?;

    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create {}", out.display()))?;

    let path = out.join(format!("{}.zip", id));
    std::fs::write(&path, &archive)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} {} ({} bytes)",
        "Saved".green(),
        path.display(),
        archive.len()
    );
    Ok(())
}

/// Check server health
pub async fn health(client: &CellserveClient) -> Result<()> {
    let health = client.health().await?;

    let status = if health.store_healthy {
        health.status.green()
    } else {
        health.status.yellow()
    };
    println!("Server:  {}", status);
    println!(
        "Workers: {} busy, {} queued, {} slot(s)",
        health.pool.active, health.pool.queued, health.pool.size
    );

    Ok(())
}

fn print_record(id: &JobId, record: &StatusRecord) {
    println!("{} Job {}", "▸".cyan(), id.to_string().bold());
    println!("    Status:  {}", colorize_status(record.status));
    println!(
        "    Updated: {}",
        record.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    if let Some(error) = &record.error {
        println!("    Error:   {}", error.red());
    }

    match &record.output {
        Some(JobOutput::Inference(output)) => {
            println!("    Output:  {}", output.output_dir.dimmed());
            for message in &output.messages {
                println!("      {}", message);
            }
        }
        Some(JobOutput::Training(output)) => {
            println!("    Epochs:  {}", output.train_losses.len());
            println!("    Train:   {}", describe_curve(&output.train_losses));
            println!("    Test:    {}", describe_curve(&output.test_losses));
            if let Some(path) = &output.model_path {
                println!("    Model:   {}", path.dimmed());
            }
        }
        None => {}
    }

    for (key, value) in &record.extras {
        println!("    {}: {}", key.dimmed(), value);
    }
}

fn describe_curve(curve: &LossCurve) -> String {
    match curve.last() {
        Some(last) if last.is_finite() => format!("final loss {:.4}", last),
        Some(_) => "final loss not a number".to_string(),
        None => "no epochs".to_string(),
    }
}

fn colorize_status(status: JobStatus) -> ColoredString {
    match status {
        JobStatus::Pending => status.as_str().yellow(),
        JobStatus::Running => status.as_str().blue(),
        JobStatus::Success => status.as_str().green(),
        JobStatus::Failed => status.as_str().red(),
    }
}
