//! Job runner
//!
//! Ties a job body to its status record:
//! 1. the initial status is written before `submit` returns
//! 2. the body runs on the blocking thread pool from a worker pool slot
//! 3. exactly one terminal record is written once the body returns, fails or
//!    panics, and the job handle is resolved afterwards
//!
//! The body only borrows its [`JobContext`], so it cannot write anything once
//! the terminal record exists.

use cellserve_core::clock::Clock;
use cellserve_core::domain::job::{JobId, JobKind, JobStatus};
use cellserve_core::domain::record::{Extras, JobOutput, StatusRecord};
use cellserve_core::dto::health::PoolStats;
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::repository::{StatusRepository, StoreError};
use crate::scheduler::pool::{PoolError, WorkerPool};

/// Errors raised while submitting or awaiting a job
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("job {0} ended without reporting completion")]
    Lost(JobId),
}

/// A job about to be handed to the runner
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: JobId,
    pub kind: JobKind,

    /// Written with every status record of the job
    pub extras: Extras,
}

impl Submission {
    pub fn new(id: JobId, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            extras: Extras::new(),
        }
    }

    pub fn with_extras(mut self, extras: Extras) -> Self {
        self.extras = extras;
        self
    }
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCompletion {
    pub id: JobId,

    /// `Success` or `Failed`
    pub status: JobStatus,

    /// Whether the terminal record reached the store
    pub recorded: bool,
}

/// Completion channel of one submitted job
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    completion: oneshot::Receiver<JobCompletion>,
}

impl JobHandle {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Waits until the terminal record has been written
    pub async fn wait(self) -> Result<JobCompletion, RunnerError> {
        self.completion.await.map_err(|_| RunnerError::Lost(self.id))
    }
}

/// What a running job body can see and do
pub struct JobContext {
    id: JobId,
    kind: JobKind,
    extras: Extras,
    store: Arc<dyn StatusRepository>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
}

impl JobContext {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Records that the job left `pending` and is doing real work
    ///
    /// Blocks the calling thread until the write completes; bodies run on the
    /// blocking pool where that is allowed.
    pub fn set_running(&self) -> Result<(), StoreError> {
        let record = StatusRecord::new(JobStatus::Running, self.clock.now())
            .with_extras(self.extras.clone());
        self.runtime.block_on(self.store.write(&self.id, &record))?;

        info!("Job {} is running", self.id);
        Ok(())
    }
}

/// Runs job bodies on a worker pool and records their lifecycle
pub struct JobRunner {
    store: Arc<dyn StatusRepository>,
    clock: Arc<dyn Clock>,
    pool: WorkerPool,
}

impl JobRunner {
    /// Creates a runner with a pool of `pool_size` slots
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: Arc<dyn StatusRepository>, clock: Arc<dyn Clock>, pool_size: usize) -> Self {
        Self {
            store,
            clock,
            pool: WorkerPool::new(pool_size),
        }
    }

    /// Mints the identity for a new submission
    pub fn next_id(&self) -> JobId {
        JobId::generate(self.clock.as_ref())
    }

    pub fn store(&self) -> &Arc<dyn StatusRepository> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Writes the job's initial status and queues its body
    ///
    /// Returns as soon as the body is queued. A read of the job's status made
    /// after this returns sees at least the initial record.
    ///
    /// # Arguments
    /// * `submission` - Identity, kind and extras of the job
    /// * `body` - Blocking unit of work producing the job's output
    pub async fn submit<F>(&self, submission: Submission, body: F) -> Result<JobHandle, RunnerError>
    where
        F: FnOnce(&JobContext) -> anyhow::Result<JobOutput> + Send + 'static,
    {
        let id = submission.id.clone();
        let initial = StatusRecord::new(submission.kind.initial_status(), self.clock.now())
            .with_extras(submission.extras.clone());

        self.store.write(&id, &initial).await?;

        let (completion_tx, completion_rx) = oneshot::channel();
        let task = run_job(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            submission,
            body,
            completion_tx,
        );

        if let Err(e) = self.pool.submit(task) {
            // Leave a terminal record rather than one stuck in its initial state
            let record = StatusRecord::failed(e.to_string(), self.clock.now())
                .with_extras(initial.extras);
            if let Err(store_err) = self.store.write(&id, &record).await {
                error!("Failed to record rejection of job {}: {}", id, store_err);
            }
            return Err(e.into());
        }

        info!("Job {} queued with status {}", id, initial.status);

        Ok(JobHandle {
            id,
            completion: completion_rx,
        })
    }

    /// Latest status record of a job
    pub async fn status(&self, id: &JobId) -> Result<Option<StatusRecord>, StoreError> {
        debug!("Reading status of job {}", id);
        self.store.read(id).await
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Stops accepting jobs and waits for queued and running jobs to finish
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

async fn run_job<F>(
    store: Arc<dyn StatusRepository>,
    clock: Arc<dyn Clock>,
    submission: Submission,
    body: F,
    completion: oneshot::Sender<JobCompletion>,
) where
    F: FnOnce(&JobContext) -> anyhow::Result<JobOutput> + Send + 'static,
{
    let Submission { id, kind, extras } = submission;
    let context = JobContext {
        id: id.clone(),
        kind,
        extras: extras.clone(),
        store: Arc::clone(&store),
        clock: Arc::clone(&clock),
        runtime: Handle::current(),
    };

    debug!("Starting {} job {}", kind, id);

    let outcome = tokio::task::spawn_blocking(move || body(&context)).await;

    let record = match outcome {
        Ok(Ok(output)) => StatusRecord::succeeded(output, clock.now()),
        Ok(Err(e)) => {
            warn!("Job {} failed: {:#}", id, e);
            StatusRecord::failed(format!("{:#}", e), clock.now())
        }
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            error!("Job {} panicked: {}", id, message);
            StatusRecord::failed(message, clock.now())
        }
        Err(e) => {
            error!("Job {} was aborted: {}", id, e);
            StatusRecord::failed(format!("job aborted: {}", e), clock.now())
        }
    }
    .with_extras(extras);

    let status = record.status;
    let recorded = match store.write(&id, &record).await {
        Ok(()) => {
            info!("Job {} finished with status {}", id, status);
            true
        }
        Err(e) => {
            // The record stays in its last non-terminal state until it expires
            error!("Failed to record status {} for job {}: {}", status, id, e);
            false
        }
    };

    let _ = completion.send(JobCompletion {
        id,
        status,
        recorded,
    });
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("job panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("job panicked: {}", message)
    } else {
        "job panicked".to_string()
    }
}
