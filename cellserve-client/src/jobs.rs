//! Job-related API endpoints

use crate::CellserveClient;
use crate::error::{ClientError, Result};
use cellserve_core::domain::job::JobId;
use cellserve_core::domain::params::{SegmentationParams, TrainingParams};
use cellserve_core::domain::record::StatusRecord;
use cellserve_core::dto::health::HealthResponse;
use cellserve_core::dto::job::{PreviewResponse, StatusResponse, SubmitResponse};
use reqwest::multipart::{Form, Part};
use std::path::PathBuf;
use std::time::{Duration, Instant};

impl CellserveClient {
    // =============================================================================
    // Health
    // =============================================================================

    /// Store reachability and worker pool load
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Submission
    // =============================================================================

    /// Upload images and start a segmentation job
    ///
    /// # Arguments
    /// * `images` - Image files to segment
    /// * `params` - Model and thresholds
    ///
    /// # Returns
    /// The id of the new job and the number of files the server kept
    pub async fn submit_segmentation(
        &self,
        images: &[PathBuf],
        params: &SegmentationParams,
    ) -> Result<SubmitResponse> {
        let url = format!("{}/upload", self.base_url);
        let form = with_fields(Form::new(), segmentation_fields(params));
        let form = attach_files(form, "files", images).await?;
        let response = self.client.post(&url).multipart(form).send().await?;

        self.handle_response(response).await
    }

    /// Upload a labeled dataset and start a training job
    ///
    /// # Arguments
    /// * `train_files` - Training images and masks
    /// * `test_files` - Held-out images and masks
    /// * `params` - Model name and hyperparameters
    pub async fn submit_training(
        &self,
        train_files: &[PathBuf],
        test_files: &[PathBuf],
        params: &TrainingParams,
    ) -> Result<SubmitResponse> {
        let url = format!("{}/train", self.base_url);
        let form = with_fields(Form::new(), training_fields(params));
        let form = attach_files(form, "train_files", train_files).await?;
        let form = attach_files(form, "test_files", test_files).await?;
        let response = self.client.post(&url).multipart(form).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Results
    // =============================================================================

    /// Latest status record of a job
    ///
    /// # Returns
    /// `None` if the job is unknown or its record expired
    pub async fn status(&self, id: &JobId) -> Result<Option<StatusRecord>> {
        let url = format!("{}/status", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("id", id.as_str())])
            .send()
            .await?;

        let body: StatusResponse = self.handle_response(response).await?;
        body.record()
            .map_err(|e| ClientError::ParseError(format!("Invalid status record: {}", e)))
    }

    /// Overlay images of a finished segmentation job
    pub async fn preview(&self, id: &JobId) -> Result<PreviewResponse> {
        let url = format!("{}/preview", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("id", id.as_str())])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Zip archive of everything a job wrote to its output directory
    ///
    /// # Returns
    /// The raw archive bytes, or `ClientError::NotFound` for unknown jobs
    pub async fn download(&self, id: &JobId) -> Result<Vec<u8>> {
        let url = format!("{}/dl", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("id", id.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(id.clone()));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Polls a job until it succeeds or fails
    ///
    /// # Arguments
    /// * `id` - The job to watch
    /// * `poll_interval` - Delay between polls
    /// * `timeout` - Give up after this long
    ///
    /// # Returns
    /// The terminal status record
    pub async fn wait_for_completion(
        &self,
        id: &JobId,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<StatusRecord> {
        let started = Instant::now();

        loop {
            let record = self
                .status(id)
                .await?
                .ok_or_else(|| ClientError::NotFound(id.clone()))?;

            if record.is_terminal() {
                return Ok(record);
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(ClientError::Timeout {
                    id: id.clone(),
                    waited,
                });
            }

            tracing::debug!("Job {} is {}, polling again", id, record.status);
            tokio::time::sleep(poll_interval.min(timeout - waited)).await;
        }
    }
}

fn segmentation_fields(params: &SegmentationParams) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("model", params.model.clone()),
        ("flow_threshold", params.flow_threshold.to_string()),
        ("cellprob_threshold", params.cellprob_threshold.to_string()),
    ];
    if let Some(diameter) = params.diameter {
        fields.push(("diameter", diameter.to_string()));
    }
    fields
}

fn training_fields(params: &TrainingParams) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("n_epochs", params.n_epochs.to_string()),
        ("learning_rate", params.learning_rate.to_string()),
        ("weight_decay", params.weight_decay.to_string()),
    ];
    if let Some(name) = &params.model_name {
        fields.push(("model_name", name.clone()));
    }
    fields
}

fn with_fields(form: Form, fields: Vec<(&'static str, String)>) -> Form {
    fields
        .into_iter()
        .fold(form, |form, (name, value)| form.text(name, value))
}

async fn attach_files(mut form: Form, field: &'static str, files: &[PathBuf]) -> Result<Form> {
    for path in files {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| ClientError::ReadFile {
                path: path.display().to_string(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        form = form.part(field, Part::bytes(data).file_name(file_name));
    }

    Ok(form)
}
