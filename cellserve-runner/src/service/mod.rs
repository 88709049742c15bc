//! Service layer
//!
//! Everything between a submission and the segmentation model: the backend
//! trait, the process bridge implementing it and the job bodies built on top.

mod command;
mod jobs;
mod segmentation;

pub use command::CommandBackend;
pub use jobs::{StagedDataset, segmentation_job, training_job};
pub use segmentation::{
    SegmentationBackend, SegmentationReport, SegmentationRequest, TrainingReport, TrainingRequest,
};
