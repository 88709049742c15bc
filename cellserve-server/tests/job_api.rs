//! Integration tests for job submission, status polling, previews and downloads.

mod common;

use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::{Part, body_bytes, body_json, get, post_multipart, wait_for_terminal};
use std::io::{Cursor, Read};

// ---------------------------------------------------------------------------
// Segmentation
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn upload_runs_segmentation_to_success() {
    let app = common::build_test_app();
    let response = post_multipart(
        app.app(),
        "/upload",
        &[
            Part::File {
                field: "files",
                filename: "a.png",
                bytes: b"first",
            },
            Part::File {
                field: "files",
                filename: "b.png",
                bytes: b"second",
            },
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["count"], 2);
    let id = json["id"].as_str().unwrap().to_string();

    let status = wait_for_terminal(&app, &id).await;
    assert_eq!(status["ok"], true);
    assert_eq!(status["exists"], true);
    assert_eq!(status["status"], "success");
    assert_eq!(status["kind"], "inference");
    assert_eq!(status["model"], "cpsam");
    assert_eq!(status["messages"][0], "Using cpsam model");
    assert!(status["updated_at"].is_string());

    let uploaded = app.data_dir.path().join("uploads").join(&id);
    assert_eq!(std::fs::read(uploaded.join("a.png")).unwrap(), b"first");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn upload_reads_params_from_query_and_form() {
    let app = common::build_test_app();
    let response = post_multipart(
        app.app(),
        "/upload?model=nuclei",
        &[
            Part::Text {
                field: "model",
                value: "cyto3",
            },
            Part::Text {
                field: "diameter",
                value: "30",
            },
            Part::File {
                field: "files",
                filename: "cells.png",
                bytes: b"pixels",
            },
        ],
    )
    .await;

    let id = body_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();
    let status = wait_for_terminal(&app, &id).await;

    assert_eq!(status["model"], "nuclei");
    assert_eq!(status["messages"][0], "Using nuclei model");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_image_marks_job_failed() {
    let app = common::build_test_app();
    let response = post_multipart(
        app.app(),
        "/upload",
        &[Part::File {
            field: "files",
            filename: "bad.png",
            bytes: b"noise",
        }],
    )
    .await;

    let id = body_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();
    let status = wait_for_terminal(&app, &id).await;

    assert_eq!(status["status"], "failed");
    assert_eq!(status["error"], "bad image");
    assert!(status.get("messages").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn upload_without_files_fails_the_job() {
    let app = common::build_test_app();
    let response = post_multipart(
        app.app(),
        "/upload",
        &[Part::Text {
            field: "model",
            value: "cpsam",
        }],
    )
    .await;

    let json = body_json(response).await;
    assert_eq!(json["count"], 0);

    let status = wait_for_terminal(&app, json["id"].as_str().unwrap()).await;
    assert_eq!(status["status"], "failed");
    assert_eq!(status["error"], "No images received");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unsafe_filenames_are_sanitized() {
    let app = common::build_test_app();
    let response = post_multipart(
        app.app(),
        "/upload",
        &[Part::File {
            field: "files",
            filename: "../../escape.png",
            bytes: b"pixels",
        }],
    )
    .await;

    let id = body_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();
    wait_for_terminal(&app, &id).await;

    let uploaded = app.data_dir.path().join("uploads").join(&id);
    assert!(uploaded.join("escape.png").is_file());
    assert!(!app.data_dir.path().join("escape.png").exists());
}

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn train_materializes_dataset_and_reports_losses() {
    let app = common::build_test_app();
    let response = post_multipart(
        app.app(),
        "/train",
        &[
            Part::Text {
                field: "n_epochs",
                value: "3",
            },
            Part::Text {
                field: "model_name",
                value: "nuclei",
            },
            Part::File {
                field: "train_files",
                filename: "a_img.tif",
                bytes: b"img",
            },
            Part::File {
                field: "train_files",
                filename: "a_masks.tif",
                bytes: b"mask",
            },
            Part::File {
                field: "test_files",
                filename: "b_img.tif",
                bytes: b"img",
            },
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["count"], 3);
    let id = json["id"].as_str().unwrap().to_string();

    let status = wait_for_terminal(&app, &id).await;
    assert_eq!(status["status"], "success");
    assert_eq!(status["kind"], "training");
    assert_eq!(status["model_name"], "nuclei");
    assert_eq!(status["train_losses"].as_array().unwrap().len(), 3);
    assert_eq!(status["test_losses"][0], 2.0);

    let datasets = app.data_dir.path().join("datasets");
    assert!(datasets.join("train").join(&id).join("a_masks.tif").is_file());
    assert!(datasets.join("test").join(&id).join("b_img.tif").is_file());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn train_without_training_images_fails() {
    let app = common::build_test_app();
    let response = post_multipart(
        app.app(),
        "/train",
        &[Part::File {
            field: "test_files",
            filename: "b_img.tif",
            bytes: b"img",
        }],
    )
    .await;

    let id = body_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();
    let status = wait_for_terminal(&app, &id).await;

    assert_eq!(status["status"], "failed");
    assert_eq!(status["error"], "No training images received");
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_and_malformed_ids_are_not_found() {
    let app = common::build_test_app();

    for uri in [
        "/status?id=2025-01-01-00-00-00-000",
        "/status?id=not-an-id",
        "/status",
    ] {
        let response = get(app.app(), uri).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["exists"], false);
        assert_eq!(json["status"], "not_found");
    }
}

#[tokio::test]
async fn status_reports_503_when_store_is_down() {
    let app = common::build_unreachable_app();
    let response = get(app.app(), "/status?id=2025-01-01-00-00-00-000").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn upload_reports_503_when_store_is_down() {
    let app = common::build_unreachable_app();
    let response = post_multipart(
        app.app(),
        "/upload",
        &[Part::File {
            field: "files",
            filename: "a.png",
            bytes: b"pixels",
        }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(app.state.runner.stats().queued, 0);
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn preview_returns_overlays_in_name_order() {
    let app = common::build_test_app();
    let response = post_multipart(
        app.app(),
        "/upload",
        &[
            Part::File {
                field: "files",
                filename: "b.png",
                bytes: b"second",
            },
            Part::File {
                field: "files",
                filename: "a.png",
                bytes: b"first",
            },
        ],
    )
    .await;
    let id = body_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();
    wait_for_terminal(&app, &id).await;

    let json = body_json(get(app.app(), &format!("/preview?id={}", id)).await).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["count"], 2);
    assert_eq!(json["images"][0]["filename"], "a_overlay.png");
    assert_eq!(json["images"][1]["filename"], "b_overlay.png");

    let decoded = STANDARD
        .decode(json["images"][0]["image"].as_str().unwrap())
        .unwrap();
    assert_eq!(decoded, b"overlay of a");
}

#[tokio::test]
async fn preview_of_unknown_job_is_not_ok() {
    let app = common::build_test_app();

    let json = body_json(get(app.app(), "/preview?id=2025-01-01-00-00-00-000").await).await;
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"], "task not found");

    let json = body_json(get(app.app(), "/preview?id=../../etc").await).await;
    assert_eq!(json["ok"], false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn preview_without_overlays_is_not_ok() {
    let app = common::build_test_app();
    let response = post_multipart(
        app.app(),
        "/upload",
        &[Part::File {
            field: "files",
            filename: "bad.png",
            bytes: b"noise",
        }],
    )
    .await;
    let id = body_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();
    wait_for_terminal(&app, &id).await;

    let json = body_json(get(app.app(), &format!("/preview?id={}", id)).await).await;
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"], "no overlay images");
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn download_zips_the_output_directory() {
    let app = common::build_test_app();
    let response = post_multipart(
        app.app(),
        "/upload",
        &[Part::File {
            field: "files",
            filename: "a.png",
            bytes: b"first",
        }],
    )
    .await;
    let id = body_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();
    let record = wait_for_terminal(&app, &id).await;
    assert_eq!(record["status"], "success");

    let response = get(app.app(), &format!("/dl?id={}", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/zip");
    assert_eq!(
        response.headers()[CONTENT_DISPOSITION],
        format!("attachment; filename=\"{}.zip\"", id).as_str()
    );

    let bytes = body_bytes(response).await;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut contents = String::new();
    archive
        .by_name("a_overlay.png")
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    assert_eq!(contents, "overlay of a");
}

#[tokio::test]
async fn download_of_unknown_job_is_not_found() {
    let app = common::build_test_app();

    let response = get(app.app(), "/dl?id=2025-01-01-00-00-00-000").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"], "task not found");

    let response = get(app.app(), "/dl?id=../../etc").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(app.app(), "/dl").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
