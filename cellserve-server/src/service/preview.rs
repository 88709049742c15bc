//! Preview Service
//!
//! Collects the overlay images a segmentation job produced.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cellserve_core::domain::job::JobId;
use cellserve_core::dto::job::{PreviewImage, PreviewResponse};

use crate::state::AppState;

const OVERLAY_SUFFIX: &str = "_overlay.png";

/// Base64-encodes every `*_overlay.png` of a job, sorted by file name
///
/// Unknown jobs and jobs without overlays yield an `ok: false` response.
pub async fn get_preview(
    state: &AppState,
    raw_id: Option<&str>,
) -> std::io::Result<PreviewResponse> {
    let Some(id) = raw_id.and_then(|raw| JobId::parse(raw).ok()) else {
        return Ok(PreviewResponse::error("task not found"));
    };

    let dir = state.config.output_dir(&id);
    if !tokio::fs::try_exists(&dir).await? {
        return Ok(PreviewResponse::error("task not found"));
    }

    let mut overlays = Vec::new();
    let mut entries = tokio::fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(OVERLAY_SUFFIX) {
            overlays.push((name, entry.path()));
        }
    }

    if overlays.is_empty() {
        return Ok(PreviewResponse::error("no overlay images"));
    }
    overlays.sort();

    let mut images = Vec::with_capacity(overlays.len());
    for (filename, path) in overlays {
        let data = tokio::fs::read(&path).await?;
        images.push(PreviewImage {
            filename,
            image: STANDARD.encode(data),
        });
    }

    tracing::debug!("Preview of job {} has {} image(s)", id, images.len());
    Ok(PreviewResponse::images(images))
}
