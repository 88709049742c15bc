//! Submission Service
//!
//! Turns accepted uploads into queued jobs and answers status polls.

use cellserve_core::domain::job::{JobId, JobKind};
use cellserve_core::domain::record::Extras;
use cellserve_core::dto::job::{StatusResponse, SubmitResponse};
use cellserve_runner::repository::StoreError;
use cellserve_runner::scheduler::{RunnerError, Submission};
use cellserve_runner::service::{
    SegmentationRequest, StagedDataset, TrainingRequest, segmentation_job, training_job,
};
use serde_json::Value;
use thiserror::Error;

use crate::service::upload::{RequestParams, UploadedFile, store_files};
use crate::state::AppState;

/// Service error type
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("failed to store upload: {0}")]
    Upload(#[from] std::io::Error),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Stores the images of an inference request and queues the job
///
/// The job's status is `running` by the time this returns.
pub async fn submit_segmentation(
    state: &AppState,
    params: &RequestParams,
    files: Vec<UploadedFile>,
) -> Result<SubmitResponse, SubmitError> {
    let id = state.runner.next_id();
    let params = params.segmentation();

    let images = store_files(&state.config.upload_dir(&id), &files).await?;
    let count = images.len();

    let mut extras = Extras::new();
    extras.insert("model".to_string(), Value::String(params.model.clone()));
    extras.insert("count".to_string(), count.into());

    let request = SegmentationRequest {
        images,
        output_dir: state.config.output_dir(&id),
        params,
    };

    state
        .runner
        .submit(
            Submission::new(id.clone(), JobKind::Inference).with_extras(extras),
            segmentation_job(state.backend.clone(), request),
        )
        .await?;

    tracing::info!("Segmentation job {} accepted with {} image(s)", id, count);

    Ok(SubmitResponse {
        ok: true,
        count,
        id,
    })
}

/// Stages the datasets of a training request and queues the job
///
/// The job's status is `pending` until its body has built the datasets.
pub async fn submit_training(
    state: &AppState,
    params: &RequestParams,
    train_files: Vec<UploadedFile>,
    test_files: Vec<UploadedFile>,
) -> Result<SubmitResponse, SubmitError> {
    let id = state.runner.next_id();
    let params = params.training();

    let staging = state.config.upload_dir(&id);
    let staged = StagedDataset {
        train_files: store_files(&staging.join("train"), &train_files).await?,
        test_files: store_files(&staging.join("test"), &test_files).await?,
    };
    let count = staged.train_files.len() + staged.test_files.len();

    let request = TrainingRequest::new(
        state.config.train_dir(&id),
        state.config.test_dir(&id),
        state.config.models_dir(),
        &params,
        id.as_str(),
    );

    let mut extras = Extras::new();
    extras.insert(
        "model_name".to_string(),
        Value::String(request.model_name.clone()),
    );
    extras.insert("count".to_string(), count.into());

    state
        .runner
        .submit(
            Submission::new(id.clone(), JobKind::Training).with_extras(extras),
            training_job(state.backend.clone(), staged, request),
        )
        .await?;

    tracing::info!("Training job {} accepted with {} file(s)", id, count);

    Ok(SubmitResponse {
        ok: true,
        count,
        id,
    })
}

/// Looks up the latest status of a job
///
/// Missing, expired and malformed ids are all reported as not found.
pub async fn get_status(
    state: &AppState,
    raw_id: Option<&str>,
) -> Result<StatusResponse, StoreError> {
    let Some(id) = raw_id.and_then(|raw| JobId::parse(raw).ok()) else {
        tracing::debug!("Status requested for malformed id {:?}", raw_id);
        return Ok(StatusResponse::not_found());
    };

    Ok(match state.runner.status(&id).await? {
        Some(record) => StatusResponse::found(&record),
        None => StatusResponse::not_found(),
    })
}
