//! Job DTOs for the HTTP API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::job::JobId;
use crate::domain::record::{RecordError, StatusRecord};

/// Response to an accepted submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub ok: bool,

    /// Number of files stored for the job
    pub count: usize,

    pub id: JobId,
}

/// Response of `GET /status`
///
/// A found record is flattened next to `ok` and `exists`; a missing one is
/// reported as `{"ok": true, "exists": false, "status": "not_found"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub exists: bool,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl StatusResponse {
    pub fn found(record: &StatusRecord) -> Self {
        Self {
            ok: true,
            exists: true,
            body: record.to_document(),
        }
    }

    pub fn not_found() -> Self {
        let mut body = Map::new();
        body.insert("status".to_string(), Value::String("not_found".to_string()));
        Self {
            ok: true,
            exists: false,
            body,
        }
    }

    /// Decodes the flattened record, `None` when the job does not exist
    pub fn record(&self) -> Result<Option<StatusRecord>, RecordError> {
        if !self.exists {
            return Ok(None);
        }
        StatusRecord::try_from(self.body.clone()).map(Some)
    }
}

/// One rendered overlay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewImage {
    pub filename: String,

    /// Base64-encoded PNG
    pub image: String,
}

/// Response of `GET /preview`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<PreviewImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PreviewResponse {
    pub fn images(images: Vec<PreviewImage>) -> Self {
        Self {
            ok: true,
            count: Some(images.len()),
            images,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            count: None,
            images: Vec::new(),
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::JobStatus;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_not_found_shape() {
        let value = serde_json::to_value(StatusResponse::not_found()).unwrap();
        assert_eq!(
            value,
            json!({"ok": true, "exists": false, "status": "not_found"})
        );
        assert!(StatusResponse::not_found().record().unwrap().is_none());
    }

    #[test]
    fn test_found_flattens_record() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let record = StatusRecord::failed("bad image", at);

        let value = serde_json::to_value(StatusResponse::found(&record)).unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(value["exists"], true);
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "bad image");

        let decoded: StatusResponse = serde_json::from_value(value).unwrap();
        let decoded = decoded.record().unwrap().unwrap();
        assert_eq!(decoded.status, JobStatus::Failed);
        assert_eq!(decoded.error.as_deref(), Some("bad image"));
    }
}
