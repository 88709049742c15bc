//! Shared application state

use cellserve_runner::config::Config;
use cellserve_runner::repository::StatusRepository;
use cellserve_runner::scheduler::JobRunner;
use cellserve_runner::service::SegmentationBackend;
use std::sync::Arc;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<JobRunner>,
    pub backend: Arc<dyn SegmentationBackend>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(runner: JobRunner, backend: Arc<dyn SegmentationBackend>, config: Config) -> Self {
        Self {
            runner: Arc::new(runner),
            backend,
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &Arc<dyn StatusRepository> {
        self.runner.store()
    }
}
