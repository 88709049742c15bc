//! Upload handling
//!
//! Request parameters with their defaults, filename sanitization and writing
//! uploaded files into a job's upload directory.

use axum::body::Bytes;
use cellserve_core::domain::params::{
    DEFAULT_CELLPROB_THRESHOLD, DEFAULT_EPOCHS, DEFAULT_FLOW_THRESHOLD, DEFAULT_LEARNING_RATE,
    DEFAULT_MODEL, DEFAULT_WEIGHT_DECAY, SegmentationParams, TrainingParams,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A file received in a multipart request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Name the client gave the file
    pub file_name: String,
    pub bytes: Bytes,
}

/// Parameters of a request, from its query string and its form fields
///
/// The query string wins; blank values count as absent.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pub query: HashMap<String, String>,
    pub form: HashMap<String, String>,
}

impl RequestParams {
    pub fn new(query: HashMap<String, String>, form: HashMap<String, String>) -> Self {
        Self { query, form }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        [self.query.get(key), self.form.get(key)]
            .into_iter()
            .flatten()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }

    /// Parses a value, falling back to `default` when absent or malformed
    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    pub fn segmentation(&self) -> SegmentationParams {
        SegmentationParams {
            model: self.get("model").unwrap_or(DEFAULT_MODEL).to_string(),
            flow_threshold: self.parse_or("flow_threshold", DEFAULT_FLOW_THRESHOLD),
            cellprob_threshold: self.parse_or("cellprob_threshold", DEFAULT_CELLPROB_THRESHOLD),
            diameter: self.get("diameter").and_then(|value| value.parse().ok()),
        }
    }

    pub fn training(&self) -> TrainingParams {
        TrainingParams {
            model_name: self.get("model_name").map(sanitize_model_name),
            n_epochs: self.parse_or("n_epochs", DEFAULT_EPOCHS),
            learning_rate: self.parse_or("learning_rate", DEFAULT_LEARNING_RATE),
            weight_decay: self.parse_or("weight_decay", DEFAULT_WEIGHT_DECAY),
        }
    }
}

/// Reduces a client-supplied file name to a safe basename
///
/// Path separators and whitespace become underscores, anything outside
/// `[A-Za-z0-9._-]` is dropped and leading or trailing dots and underscores are
/// stripped.
///
/// # Returns
/// `None` if nothing usable is left
pub fn sanitize_filename(name: &str) -> Option<String> {
    let joined = name
        .replace(['/', '\\'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");

    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

fn sanitize_model_name(name: &str) -> String {
    sanitize_filename(name).unwrap_or_default()
}

/// Writes uploads into `dir`, skipping files without a usable name
///
/// A later file with the same sanitized name replaces an earlier one.
///
/// # Returns
/// Paths of the written files, in upload order
pub async fn store_files(dir: &Path, files: &[UploadedFile]) -> std::io::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;

    let mut saved = Vec::with_capacity(files.len());
    for file in files {
        let Some(name) = sanitize_filename(&file.file_name) else {
            tracing::warn!("Skipping upload with unusable name '{}'", file.file_name);
            continue;
        };

        let path = dir.join(name);
        tokio::fs::write(&path, &file.bytes).await?;
        saved.push(path);
    }

    Ok(saved)
}
