//! Job parameters
//!
//! Parameters captured by a job closure at submission time. Defaults match what
//! the HTTP layer substitutes when a field is missing or unparseable.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "cpsam";
pub const DEFAULT_FLOW_THRESHOLD: f64 = 0.4;
pub const DEFAULT_CELLPROB_THRESHOLD: f64 = 0.0;
pub const DEFAULT_EPOCHS: u32 = 100;
pub const DEFAULT_LEARNING_RATE: f64 = 1e-5;
pub const DEFAULT_WEIGHT_DECAY: f64 = 0.1;

/// Parameters of one segmentation (inference) run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationParams {
    /// Pretrained or custom model name
    pub model: String,
    pub flow_threshold: f64,
    pub cellprob_threshold: f64,
    /// Expected cell diameter in pixels; estimated by the model when absent
    pub diameter: Option<f64>,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            flow_threshold: DEFAULT_FLOW_THRESHOLD,
            cellprob_threshold: DEFAULT_CELLPROB_THRESHOLD,
            diameter: None,
        }
    }
}

/// Hyperparameters of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    /// Name the trained model is saved under; derived from the job id when absent
    pub model_name: Option<String>,
    pub n_epochs: u32,
    pub learning_rate: f64,
    pub weight_decay: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            model_name: None,
            n_epochs: DEFAULT_EPOCHS,
            learning_rate: DEFAULT_LEARNING_RATE,
            weight_decay: DEFAULT_WEIGHT_DECAY,
        }
    }
}
