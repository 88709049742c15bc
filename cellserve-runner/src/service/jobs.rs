//! Job bodies
//!
//! Builds the blocking closures the job runner executes for inference and
//! training submissions. Each body owns everything it needs; nothing is shared
//! with the request that created it.

use anyhow::{Context, Result};
use cellserve_core::domain::record::{InferenceOutput, JobOutput, TrainingOutput};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::scheduler::runner::JobContext;
use crate::service::segmentation::{SegmentationBackend, SegmentationRequest, TrainingRequest};

/// Uploaded files waiting to be moved into a training dataset
#[derive(Debug, Clone, Default)]
pub struct StagedDataset {
    pub train_files: Vec<PathBuf>,
    pub test_files: Vec<PathBuf>,
}

/// Body of an inference job
///
/// Fails when there is nothing to segment or the model reports `ok == false`.
pub fn segmentation_job(
    backend: Arc<dyn SegmentationBackend>,
    request: SegmentationRequest,
) -> impl FnOnce(&JobContext) -> Result<JobOutput> + Send + 'static {
    move |ctx| {
        if request.images.is_empty() {
            anyhow::bail!("No images received");
        }

        std::fs::create_dir_all(&request.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {}",
                request.output_dir.display()
            )
        })?;

        debug!(
            "Job {} segmenting {} image(s)",
            ctx.id(),
            request.images.len()
        );
        let report = backend.segment(&request)?;

        if !report.ok {
            let detail = report.messages.join("; ");
            if detail.is_empty() {
                anyhow::bail!("segmentation was rejected by the model");
            }
            anyhow::bail!("{}", detail);
        }

        Ok(JobOutput::Inference(InferenceOutput {
            output_dir: request.output_dir.display().to_string(),
            messages: report.messages,
        }))
    }
}

/// Body of a training job
///
/// Copies the staged uploads into the request's dataset directories, marks the
/// job running and trains.
pub fn training_job(
    backend: Arc<dyn SegmentationBackend>,
    staged: StagedDataset,
    request: TrainingRequest,
) -> impl FnOnce(&JobContext) -> Result<JobOutput> + Send + 'static {
    move |ctx| {
        if staged.train_files.is_empty() {
            anyhow::bail!("No training images received");
        }

        let train_count = materialize(&staged.train_files, &request.train_dir)?;
        let test_count = materialize(&staged.test_files, &request.test_dir)?;
        std::fs::create_dir_all(&request.models_dir).with_context(|| {
            format!(
                "Failed to create models directory {}",
                request.models_dir.display()
            )
        })?;

        info!(
            "Job {} dataset ready ({} train, {} test file(s))",
            ctx.id(),
            train_count,
            test_count
        );
        ctx.set_running()?;

        let report = backend.train(&request)?;

        Ok(JobOutput::Training(TrainingOutput {
            train_losses: report.train_losses,
            test_losses: report.test_losses,
            model_path: report.model_path,
        }))
    }
}

/// Copies files into `dir`, keeping their names
///
/// # Returns
/// Number of files copied
fn materialize(files: &[PathBuf], dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create dataset directory {}", dir.display()))?;

    for file in files {
        let name = file
            .file_name()
            .with_context(|| format!("Staged path {} has no file name", file.display()))?;
        std::fs::copy(file, dir.join(name))
            .with_context(|| format!("Failed to copy {} into dataset", file.display()))?;
    }

    Ok(files.len())
}
