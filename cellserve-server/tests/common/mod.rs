#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, Response};
use cellserve_core::clock::{Clock, SystemClock};
use cellserve_core::domain::job::JobId;
use cellserve_core::domain::record::StatusRecord;
use cellserve_runner::config::{Config, StoreBackend};
use cellserve_runner::repository::{InMemoryStatusRepository, StatusRepository, StoreError};
use cellserve_runner::scheduler::JobRunner;
use cellserve_runner::service::{
    SegmentationBackend, SegmentationReport, SegmentationRequest, TrainingReport, TrainingRequest,
};
use cellserve_server::{AppState, create_router};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "cellserve-test-boundary";

/// Backend that writes one overlay per image and never loads a model
///
/// Images whose name contains "bad" make the whole run fail the way the
/// model reports a rejected input.
pub struct ScriptedBackend;

impl SegmentationBackend for ScriptedBackend {
    fn segment(&self, request: &SegmentationRequest) -> Result<SegmentationReport> {
        let mut messages = vec![format!("Using {} model", request.params.model)];

        for image in &request.images {
            let stem = image
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if stem.contains("bad") {
                return Ok(SegmentationReport {
                    ok: false,
                    messages: vec!["bad image".to_string()],
                });
            }
            std::fs::write(
                request.output_dir.join(format!("{}_overlay.png", stem)),
                format!("overlay of {}", stem),
            )?;
        }

        messages.push(format!(
            "Output saved to: {}",
            request.output_dir.display()
        ));
        Ok(SegmentationReport { ok: true, messages })
    }

    fn train(&self, request: &TrainingRequest) -> Result<TrainingReport> {
        let epochs = request.n_epochs.max(1) as usize;
        let curve = |start: f64| -> Vec<f64> {
            (0..epochs).map(|e| start / (e + 1) as f64).collect()
        };

        Ok(TrainingReport {
            train_losses: curve(1.0).into(),
            test_losses: curve(2.0).into(),
            model_path: Some(
                request
                    .models_dir
                    .join(&request.model_name)
                    .display()
                    .to_string(),
            ),
        })
    }
}

/// Status store that is always unreachable
pub struct UnreachableStore;

#[async_trait]
impl StatusRepository for UnreachableStore {
    async fn write(&self, _: &JobId, _: &StatusRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn read(&self, _: &JobId) -> Result<Option<StatusRecord>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// Router plus the data directory it writes into
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub data_dir: TempDir,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

fn test_config(data_dir: &TempDir) -> Config {
    let mut config = Config::new(
        "redis://127.0.0.1:6379/0".to_string(),
        data_dir.path().to_path_buf(),
    );
    config.store_backend = StoreBackend::Memory;
    config
}

fn build(store: Arc<dyn StatusRepository>, data_dir: TempDir) -> TestApp {
    let config = test_config(&data_dir);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let runner = JobRunner::new(store, clock, config.pool_size);
    let state = AppState::new(runner, Arc::new(ScriptedBackend), config);

    TestApp {
        router: create_router(state.clone(), 16 * 1024 * 1024),
        state,
        data_dir,
    }
}

/// App backed by an in-memory status store and the scripted backend
pub fn build_test_app() -> TestApp {
    let store = Arc::new(InMemoryStatusRepository::new(
        Duration::from_secs(86_400),
        Arc::new(SystemClock),
    ));
    build(store, TempDir::new().unwrap())
}

/// App whose status store cannot be reached
pub fn build_unreachable_app() -> TestApp {
    build(Arc::new(UnreachableStore), TempDir::new().unwrap())
}

/// One part of a multipart body
pub enum Part<'a> {
    File {
        field: &'a str,
        filename: &'a str,
        bytes: &'a [u8],
    },
    Text {
        field: &'a str,
        value: &'a str,
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                field,
                filename,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        field, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text { field, value } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}",
                        field, value
                    )
                    .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_multipart(app: Router, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();

    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Polls `GET /status` until the job reaches a terminal status
pub async fn wait_for_terminal(app: &TestApp, id: &str) -> Value {
    for _ in 0..200 {
        let json = body_json(get(app.app(), &format!("/status?id={}", id)).await).await;
        if json["status"] == "success" || json["status"] == "failed" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {} never finished", id);
}
