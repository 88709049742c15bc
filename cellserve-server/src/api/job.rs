//! Job API Handlers
//!
//! HTTP endpoints for submitting jobs and polling their results.

use axum::{
    Json,
    extract::{Multipart, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use cellserve_core::dto::job::{PreviewResponse, StatusResponse, SubmitResponse};
use serde::Deserialize;
use std::collections::HashMap;

use crate::api::error::ApiResult;
use crate::service::upload::{RequestParams, UploadedFile};
use crate::service::{download_service, preview_service, submission_service};
use crate::state::AppState;

/// Query parameters naming a job
#[derive(Debug, Deserialize)]
pub struct JobQuery {
    pub id: Option<String>,
}

/// Files and text fields of a multipart body
#[derive(Debug, Default)]
struct MultipartForm {
    files: HashMap<String, Vec<UploadedFile>>,
    fields: HashMap<String, String>,
}

impl MultipartForm {
    fn take_files(&mut self, field: &str) -> Vec<UploadedFile> {
        self.files.remove(field).unwrap_or_default()
    }
}

async fn read_multipart(mut multipart: Multipart) -> ApiResult<MultipartForm> {
    let mut form = MultipartForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let bytes = field.bytes().await?;
                if file_name.is_empty() {
                    continue;
                }
                form.files
                    .entry(name)
                    .or_default()
                    .push(UploadedFile { file_name, bytes });
            }
            None => {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}

// =============================================================================
// Submission Endpoints
// =============================================================================

/// POST /upload
/// Store images and start a segmentation job
///
/// Parameters (`model`, `flow_threshold`, `cellprob_threshold`, `diameter`)
/// are read from the query string or from form fields.
pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    multipart: Multipart,
) -> ApiResult<Json<SubmitResponse>> {
    let mut form = read_multipart(multipart).await?;
    let files = form.take_files("files");
    let params = RequestParams::new(query, form.fields);

    tracing::info!("Received segmentation upload with {} file(s)", files.len());

    let response = submission_service::submit_segmentation(&state, &params, files).await?;
    Ok(Json(response))
}

/// POST /train
/// Store a labeled dataset and start a training job
///
/// Parameters (`model_name`, `n_epochs`, `learning_rate`, `weight_decay`)
/// are read from the query string or from form fields.
pub async fn train(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    multipart: Multipart,
) -> ApiResult<Json<SubmitResponse>> {
    let mut form = read_multipart(multipart).await?;
    let train_files = form.take_files("train_files");
    let test_files = form.take_files("test_files");
    let params = RequestParams::new(query, form.fields);

    tracing::info!(
        "Received training upload with {} train and {} test file(s)",
        train_files.len(),
        test_files.len()
    );

    let response =
        submission_service::submit_training(&state, &params, train_files, test_files).await?;
    Ok(Json(response))
}

// =============================================================================
// Result Endpoints
// =============================================================================

/// GET /status?id=
/// Latest status of a job
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> ApiResult<Json<StatusResponse>> {
    tracing::debug!("Getting status of job: {:?}", query.id);

    let response = submission_service::get_status(&state, query.id.as_deref()).await?;
    Ok(Json(response))
}

/// GET /preview?id=
/// Base64-encoded overlay images of a finished segmentation job
pub async fn preview(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> ApiResult<Json<PreviewResponse>> {
    tracing::debug!("Getting preview of job: {:?}", query.id);

    let response = preview_service::get_preview(&state, query.id.as_deref()).await?;
    Ok(Json(response))
}

/// GET /dl?id=
/// Zip archive of everything a job wrote to its output directory
///
/// Unknown jobs get a 404 with `{ok: false, error: "task not found"}`.
pub async fn download(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> ApiResult<Response> {
    tracing::debug!("Downloading output of job: {:?}", query.id);

    let Some(archive) = download_service::build_archive(&state, query.id.as_deref()).await? else {
        let body = Json(serde_json::json!({ "ok": false, "error": "task not found" }));
        return Ok((StatusCode::NOT_FOUND, body).into_response());
    };

    let disposition = format!("attachment; filename=\"{}\"", archive.file_name());
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive.bytes,
    )
        .into_response())
}
