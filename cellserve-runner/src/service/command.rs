//! Process-backed segmentation
//!
//! Runs the model bridge as a child process for every call. Any executable
//! following the protocol below can be plugged in through `CELLPOSE_COMMAND`
//! and `CELLPOSE_SCRIPT`.
//!
//! # Bridge protocol
//!
//! The bridge is invoked as `<command> <script> <subcommand>`, where the
//! subcommand is `segment` or `train`. It receives one JSON object on stdin and
//! must print one JSON object on stdout before exiting with status 0. Paths are
//! absolute or relative to the server's working directory.
//!
//! `segment` request:
//!
//! ```json
//! {
//!   "images": ["data/upload/<id>/a.png"],
//!   "output_dir": "data/output/<id>",
//!   "model": "cpsam",
//!   "flow_threshold": 0.4,
//!   "cellprob_threshold": 0.0,
//!   "diameter": null
//! }
//! ```
//!
//! For every image the bridge writes its masks and a `<stem>_overlay.png` into
//! `output_dir`, then reports `{"ok": true, "messages": ["..."]}`. With
//! `"ok": false` the job fails and the messages become its error.
//!
//! `train` request:
//!
//! ```json
//! {
//!   "train_dir": "data/train/<id>",
//!   "test_dir": "data/test/<id>",
//!   "models_dir": "data/models",
//!   "model_name": "model-<id>",
//!   "n_epochs": 100,
//!   "learning_rate": 1e-5,
//!   "weight_decay": 0.1
//! }
//! ```
//!
//! Both dataset directories hold `*_img` / `*_masks` pairs. The bridge reports
//! `{"train_losses": [...], "test_losses": [...], "model_path": "..."}`, where
//! `model_path` is optional and `null` stands for a loss that is not a number.
//!
//! A non-zero exit fails the job. Its error is stderr, or stdout when stderr is
//! empty. Stderr of a successful run is only logged.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::service::segmentation::{
    SegmentationBackend, SegmentationReport, SegmentationRequest, TrainingReport, TrainingRequest,
};

/// Segmentation backend calling an external bridge script
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    script: PathBuf,
}

impl CommandBackend {
    /// Creates a backend
    ///
    /// # Arguments
    /// * `program` - Interpreter to run (e.g., "python3")
    /// * `script` - Bridge script handed to the interpreter
    pub fn new(program: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            script: script.into(),
        }
    }

    /// Creates a backend from the runner configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cellpose_command.clone(), config.cellpose_script.clone())
    }

    /// Runs one bridge subcommand and parses its report
    fn call<Req, Resp>(&self, subcommand: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request).context("Failed to encode bridge request")?;

        debug!(
            "Running {} {} {}",
            self.program,
            self.script.display(),
            subcommand
        );

        let mut child = Command::new(&self.program)
            .arg(&self.script)
            .arg(subcommand)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start '{}'", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .context("Failed to send request to bridge")?;
        }

        let output = child
            .wait_with_output()
            .context("Failed to wait for bridge")?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !stderr.trim().is_empty() {
            debug!("bridge {} stderr: {}", subcommand, stderr.trim());
        }

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };

            error!(
                "bridge {} failed: exit_code={}, detail='{}'",
                subcommand, exit_code, detail
            );
            anyhow::bail!(
                "{} exited with code {}: {}",
                subcommand,
                exit_code,
                detail
            );
        }

        serde_json::from_str(stdout.trim())
            .with_context(|| format!("Bridge returned an invalid {} report", subcommand))
    }
}

impl SegmentationBackend for CommandBackend {
    fn segment(&self, request: &SegmentationRequest) -> Result<SegmentationReport> {
        info!(
            "Segmenting {} image(s) with model {}",
            request.images.len(),
            request.params.model
        );
        self.call("segment", request)
    }

    fn train(&self, request: &TrainingRequest) -> Result<TrainingReport> {
        info!(
            "Training model {} for {} epoch(s)",
            request.model_name, request.n_epochs
        );
        self.call("train", request)
    }
}
