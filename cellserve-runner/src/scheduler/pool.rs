//! Worker pool
//!
//! A fixed number of worker tasks drain one shared FIFO queue. Submitting only
//! enqueues, so callers on the request path never wait for a free slot. A job
//! holds its slot until it finishes, whether it succeeds, fails or panics.

use cellserve_core::dto::health::PoolStats;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Errors raised by the worker pool
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool is shut down")]
    ShutDown,
}

#[derive(Default)]
struct Counters {
    queued: AtomicUsize,
    active: AtomicUsize,
}

/// Bounded pool of job execution slots
pub struct WorkerPool {
    size: usize,
    sender: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Starts `size` workers on the current tokio runtime
    ///
    /// A size of zero is raised to one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::unbounded_channel::<Task>();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let counters = Arc::new(Counters::default());

        let workers = (0..size)
            .map(|slot| {
                tokio::spawn(worker_loop(
                    slot,
                    Arc::clone(&receiver),
                    Arc::clone(&counters),
                ))
            })
            .collect();

        info!("Worker pool started with {} slot(s)", size);

        Self {
            size,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            counters,
        }
    }

    /// Enqueues a task behind every task submitted before it
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sender = self.sender.lock().unwrap();
        let sender = sender.as_ref().ok_or(PoolError::ShutDown)?;

        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        if sender.send(Box::pin(task)).is_err() {
            self.counters.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(PoolError::ShutDown);
        }

        Ok(())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.size,
            queued: self.counters.queued.load(Ordering::SeqCst),
            active: self.counters.active.load(Ordering::SeqCst),
        }
    }

    /// Stops accepting tasks, runs everything already queued and waits for
    /// the workers to exit
    pub async fn shutdown(&self) {
        drop(self.sender.lock().unwrap().take());

        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        if workers.is_empty() {
            return;
        }

        info!("Draining worker pool ({} queued)", self.stats().queued);
        for worker in workers {
            if let Err(e) = worker.await {
                warn!("Worker exited abnormally: {}", e);
            }
        }
        info!("Worker pool stopped");
    }
}

async fn worker_loop(
    slot: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Task>>>,
    counters: Arc<Counters>,
) {
    loop {
        // Only one idle worker waits on the queue at a time, which keeps
        // dequeue order equal to submit order.
        let task = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };

        let Some(task) = task else {
            debug!("Worker {} exiting", slot);
            break;
        };

        counters.queued.fetch_sub(1, Ordering::SeqCst);
        counters.active.fetch_add(1, Ordering::SeqCst);

        // Run on its own task so a panic unwinds there and not through the worker
        if let Err(e) = tokio::spawn(task).await {
            warn!("Task on worker {} panicked: {}", slot, e);
        }

        counters.active.fetch_sub(1, Ordering::SeqCst);
    }
}
