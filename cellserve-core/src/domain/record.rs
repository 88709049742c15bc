//! Status record
//!
//! The document stored per job. It is kept as a flat JSON object so any
//! consumer of the store can read it:
//!
//! ```text
//! { "status": "success", "updated_at": "...", "kind": "training",
//!   "train_losses": [..], "test_losses": [..], ...extras }
//! ```
//!
//! Core fields always win over extras of the same name.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::job::{JobKind, JobStatus};

/// Caller-supplied fields stored next to the core fields
pub type Extras = Map<String, Value>;

/// Field names owned by the record itself
pub const RESERVED_FIELDS: &[&str] = &[
    "status",
    "updated_at",
    "error",
    "kind",
    "output_dir",
    "messages",
    "train_losses",
    "test_losses",
    "model_path",
];

const EMPTY_ERROR: &str = "job failed without an error message";

/// Latest known state of one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Map<String, Value>", try_from = "Map<String, Value>")]
pub struct StatusRecord {
    pub status: JobStatus,
    /// Time of the write that produced this record
    pub updated_at: DateTime<Utc>,
    /// Set only when `status` is `Failed`
    pub error: Option<String>,
    /// Set only when `status` is `Success`
    pub output: Option<JobOutput>,
    pub extras: Extras,
}

/// Result payload of a successful job, by job kind
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutput {
    Inference(InferenceOutput),
    Training(TrainingOutput),
}

/// Where a segmentation run left its masks and overlays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceOutput {
    pub output_dir: String,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// Loss curves of a training run, one value per completed epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingOutput {
    #[serde(default)]
    pub train_losses: LossCurve,
    #[serde(default)]
    pub test_losses: LossCurve,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
}

/// Ordered loss values as plain `f64`s
///
/// Built from any numeric type that widens to `f64`. Non-finite values are
/// written as JSON `null` and read back as NaN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LossCurve(Vec<f64>);

/// Status record document that cannot be decoded
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("status record is missing '{0}'")]
    MissingField(&'static str),

    #[error("status record field '{field}' is invalid: {source}")]
    InvalidField {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl StatusRecord {
    pub fn new(status: JobStatus, updated_at: DateTime<Utc>) -> Self {
        Self {
            status,
            updated_at,
            error: None,
            output: None,
            extras: Extras::new(),
        }
    }

    /// Terminal success record carrying the job's output
    pub fn succeeded(output: JobOutput, updated_at: DateTime<Utc>) -> Self {
        Self {
            output: Some(output),
            ..Self::new(JobStatus::Success, updated_at)
        }
    }

    /// Terminal failure record; an empty message is replaced so `error` is never blank
    pub fn failed(error: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = EMPTY_ERROR.to_string();
        }
        Self {
            error: Some(error),
            ..Self::new(JobStatus::Failed, updated_at)
        }
    }

    pub fn with_extras(mut self, extras: Extras) -> Self {
        self.extras = extras;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Flat JSON object as stored and as returned by the status endpoint
    pub fn to_document(&self) -> Map<String, Value> {
        self.clone().into()
    }

    /// Messages of an inference result, empty otherwise
    pub fn messages(&self) -> &[String] {
        match &self.output {
            Some(JobOutput::Inference(output)) => &output.messages,
            _ => &[],
        }
    }
}

impl JobOutput {
    pub fn kind(&self) -> JobKind {
        match self {
            JobOutput::Inference(_) => JobKind::Inference,
            JobOutput::Training(_) => JobKind::Training,
        }
    }

    fn write_fields(&self, doc: &mut Map<String, Value>) {
        doc.insert("kind".to_string(), Value::String(self.kind().to_string()));
        match self {
            JobOutput::Inference(output) => {
                doc.insert(
                    "output_dir".to_string(),
                    Value::String(output.output_dir.clone()),
                );
                doc.insert(
                    "messages".to_string(),
                    output.messages.iter().cloned().map(Value::String).collect(),
                );
            }
            JobOutput::Training(output) => {
                doc.insert("train_losses".to_string(), Value::from(&output.train_losses));
                doc.insert("test_losses".to_string(), Value::from(&output.test_losses));
                if let Some(path) = &output.model_path {
                    doc.insert("model_path".to_string(), Value::String(path.clone()));
                }
            }
        }
    }
}

impl LossCurve {
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Loss of the last completed epoch
    pub fn last(&self) -> Option<f64> {
        self.0.last().copied()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }
}

impl<T: Into<f64>> FromIterator<T> for LossCurve {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<f64>> for LossCurve {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl Serialize for LossCurve {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|v| v.is_finite().then_some(*v)))
    }
}

impl From<&LossCurve> for Value {
    fn from(curve: &LossCurve) -> Self {
        curve
            .0
            .iter()
            .map(|v| Number::from_f64(*v).map_or(Value::Null, Value::Number))
            .collect()
    }
}

impl<'de> Deserialize<'de> for LossCurve {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(Self(
            values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect(),
        ))
    }
}

impl From<StatusRecord> for Map<String, Value> {
    fn from(record: StatusRecord) -> Self {
        let mut doc: Map<String, Value> = record
            .extras
            .into_iter()
            .filter(|(key, _)| !RESERVED_FIELDS.contains(&key.as_str()))
            .collect();

        doc.insert(
            "status".to_string(),
            Value::String(record.status.as_str().to_string()),
        );
        doc.insert(
            "updated_at".to_string(),
            Value::String(
                record
                    .updated_at
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            ),
        );
        if let Some(error) = record.error {
            doc.insert("error".to_string(), Value::String(error));
        }
        if let Some(output) = &record.output {
            output.write_fields(&mut doc);
        }

        doc
    }
}

impl TryFrom<Map<String, Value>> for StatusRecord {
    type Error = RecordError;

    fn try_from(mut doc: Map<String, Value>) -> Result<Self, Self::Error> {
        let status: JobStatus =
            take_field(&mut doc, "status")?.ok_or(RecordError::MissingField("status"))?;
        let updated_at: DateTime<Utc> =
            take_field(&mut doc, "updated_at")?.ok_or(RecordError::MissingField("updated_at"))?;
        let error = take_field(&mut doc, "error")?;

        let output = match take_field::<JobKind>(&mut doc, "kind")? {
            Some(JobKind::Inference) => Some(JobOutput::Inference(InferenceOutput {
                output_dir: take_field(&mut doc, "output_dir")?
                    .ok_or(RecordError::MissingField("output_dir"))?,
                messages: take_field(&mut doc, "messages")?.unwrap_or_default(),
            })),
            Some(JobKind::Training) => Some(JobOutput::Training(TrainingOutput {
                train_losses: take_field(&mut doc, "train_losses")?.unwrap_or_default(),
                test_losses: take_field(&mut doc, "test_losses")?.unwrap_or_default(),
                model_path: take_field(&mut doc, "model_path")?,
            })),
            None => None,
        };

        for field in RESERVED_FIELDS {
            doc.remove(*field);
        }

        Ok(Self {
            status,
            updated_at,
            error,
            output,
            extras: doc,
        })
    }
}

fn take_field<T: DeserializeOwned>(
    doc: &mut Map<String, Value>,
    field: &'static str,
) -> Result<Option<T>, RecordError> {
    match doc.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| RecordError::InvalidField { field, source }),
    }
}
