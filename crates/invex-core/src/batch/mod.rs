//! Concurrent processing of many documents under one job id.

mod store;

pub use store::{DocumentOutcome, DocumentState, JobId, JobRecord, JobState, JobStore};

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::invoice::llm::Credentials;
use crate::models::config::BatchConfig;
use crate::pipeline::Pipeline;

/// Dispatches documents to the pipeline with bounded concurrency.
pub struct BatchRunner {
    pipeline: Arc<Pipeline>,
    store: JobStore,
    workers: usize,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<Pipeline>, store: JobStore, config: &BatchConfig) -> Self {
        Self {
            pipeline,
            store,
            workers: config.workers.max(1),
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Register a job for `paths` and start it in the background.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, paths: Vec<PathBuf>, credentials: Option<Credentials>) -> BatchHandle {
        let id = self.store.create(paths.clone());
        let cancelled = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(run_job(
            id,
            paths,
            credentials,
            Arc::clone(&self.pipeline),
            self.store.clone(),
            self.workers,
            Arc::clone(&cancelled),
        ));

        info!(job = %id, workers = self.workers, "batch job submitted");
        BatchHandle { id, cancelled, task }
    }
}

async fn run_job(
    id: JobId,
    paths: Vec<PathBuf>,
    credentials: Option<Credentials>,
    pipeline: Arc<Pipeline>,
    store: JobStore,
    workers: usize,
    cancelled: Arc<AtomicBool>,
) -> Option<JobState> {
    if !store.compare_and_set(id, JobState::Pending, JobState::Running) {
        warn!(job = %id, "job was not pending, not starting it");
        return None;
    }

    let semaphore = Arc::new(Semaphore::new(workers));
    let credentials = credentials.map(Arc::new);
    let mut in_flight = JoinSet::new();

    for (index, path) in paths.into_iter().enumerate() {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        if cancelled.load(Ordering::SeqCst) {
            debug!(job = %id, index, "cancelled, no further dispatch");
            break;
        }

        store.update_document(id, index, |doc| doc.state = DocumentState::Running);

        let pipeline = Arc::clone(&pipeline);
        let store = store.clone();
        let credentials = credentials.clone();
        in_flight.spawn(async move {
            let _permit = permit;
            let result = pipeline.process_file(&path, credentials.as_deref()).await;
            if let Err(e) = &result {
                warn!(job = %id, path = %path.display(), "document failed: {}", e);
            }
            store.update_document(id, index, |doc| doc.record(result));
        });
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            warn!(job = %id, "document worker aborted: {}", e);
        }
    }

    let state = store.finish(id);
    info!(job = %id, state = ?state, "batch job finished");
    state
}

/// Handle to a submitted job.
pub struct BatchHandle {
    id: JobId,
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<Option<JobState>>,
}

impl BatchHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Stop dispatching new documents. Documents already running finish;
    /// the rest are recorded as cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the job to reach a terminal state.
    pub async fn wait(self) -> Option<JobState> {
        match self.task.await {
            Ok(state) => state,
            Err(e) => {
                warn!(job = %self.id, "batch coordinator aborted: {}", e);
                None
            }
        }
    }
}
