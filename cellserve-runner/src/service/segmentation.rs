//! Segmentation backend
//!
//! The model itself lives outside this crate. A backend takes a request
//! describing images or datasets on disk and blocks until the model is done.

use cellserve_core::domain::params::{SegmentationParams, TrainingParams};
use cellserve_core::domain::record::LossCurve;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One inference run over a batch of images
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationRequest {
    pub images: Vec<PathBuf>,

    /// Where masks and `*_overlay.png` files are written
    pub output_dir: PathBuf,

    #[serde(flatten)]
    pub params: SegmentationParams,
}

/// What the model reported for an inference run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationReport {
    /// `false` when the model refused the request
    pub ok: bool,

    #[serde(default)]
    pub messages: Vec<String>,
}

/// One training run over a materialized dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    /// Directory of `*_img` / `*_masks` training pairs
    pub train_dir: PathBuf,

    /// Directory of held-out pairs
    pub test_dir: PathBuf,

    /// Where the trained model is saved
    pub models_dir: PathBuf,

    pub model_name: String,

    pub n_epochs: u32,
    pub learning_rate: f64,
    pub weight_decay: f64,
}

impl TrainingRequest {
    /// Builds a request, naming the model after the job when no name was given
    pub fn new(
        train_dir: PathBuf,
        test_dir: PathBuf,
        models_dir: PathBuf,
        params: &TrainingParams,
        fallback_name: &str,
    ) -> Self {
        let model_name = params
            .model_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("model-{}", fallback_name));

        Self {
            train_dir,
            test_dir,
            models_dir,
            model_name,
            n_epochs: params.n_epochs,
            learning_rate: params.learning_rate,
            weight_decay: params.weight_decay,
        }
    }
}

/// Loss curves and model location of a finished training run
///
/// A `null` loss is read as NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub train_losses: LossCurve,
    pub test_losses: LossCurve,

    #[serde(default)]
    pub model_path: Option<String>,
}

/// Blocking access to the segmentation model
///
/// Calls run on the blocking thread pool and may take minutes. Any error is
/// recorded as the job's failure.
pub trait SegmentationBackend: Send + Sync {
    /// Segments every image of the request
    fn segment(&self, request: &SegmentationRequest) -> anyhow::Result<SegmentationReport>;

    /// Trains a model on the request's datasets
    fn train(&self, request: &TrainingRequest) -> anyhow::Result<TrainingReport>;
}
