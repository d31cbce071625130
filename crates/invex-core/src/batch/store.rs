//! Owned job-status store shared by batch workers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DocumentError, DocumentErrorKind};
use crate::pipeline::ProcessedDocument;

pub type JobId = Uuid;

/// Lifecycle of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Lifecycle of one document inside a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Per-document status entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOutcome {
    pub path: PathBuf,
    pub state: DocumentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_csv: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_items_csv: Option<PathBuf>,
    pub line_items: usize,
    pub warnings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DocumentErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DocumentOutcome {
    fn pending(path: PathBuf) -> Self {
        Self {
            path,
            state: DocumentState::Pending,
            serial_number: None,
            remarks: None,
            invoice_csv: None,
            line_items_csv: None,
            line_items: 0,
            warnings: 0,
            error: None,
            message: None,
        }
    }

    pub(crate) fn record(&mut self, result: Result<ProcessedDocument, DocumentError>) {
        match result {
            Ok(doc) => {
                self.state = DocumentState::Succeeded;
                self.remarks = Some(doc.normalized.invoice.remarks);
                self.line_items = doc.normalized.line_items.len();
                self.warnings = doc.normalized.warnings.len();
                self.invoice_csv = Some(doc.output.invoice_path);
                self.line_items_csv = Some(doc.output.line_items_path);
                self.serial_number = Some(doc.serial_number);
            }
            Err(err) => {
                self.state = DocumentState::Failed;
                self.error = Some(err.kind());
                self.message = Some(err.to_string());
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            DocumentState::Succeeded | DocumentState::Failed | DocumentState::Cancelled
        )
    }
}

/// Snapshot of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub documents: Vec<DocumentOutcome>,
}

impl JobRecord {
    pub fn count(&self, state: DocumentState) -> usize {
        self.documents.iter().filter(|d| d.state == state).count()
    }

    pub fn finished_documents(&self) -> usize {
        self.documents.iter().filter(|d| d.is_finished()).count()
    }

    /// Terminal state from the document outcomes: failed only when no
    /// document succeeded and at least one failed.
    fn settle(&self) -> JobState {
        if self.count(DocumentState::Succeeded) == 0 && self.count(DocumentState::Failed) > 0 {
            JobState::Failed
        } else {
            JobState::Completed
        }
    }
}

/// Job records behind a single lock. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Arc<Mutex<HashMap<JobId, JobRecord>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending job for `paths`.
    pub fn create(&self, paths: Vec<PathBuf>) -> JobId {
        let id = Uuid::new_v4();
        let record = JobRecord {
            id,
            state: JobState::Pending,
            created_at: Utc::now(),
            finished_at: None,
            documents: paths.into_iter().map(DocumentOutcome::pending).collect(),
        };
        self.jobs.lock().insert(id, record);
        id
    }

    /// Snapshot of a job.
    pub fn get(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.lock().get(&id).cloned()
    }

    pub fn state(&self, id: JobId) -> Option<JobState> {
        self.jobs.lock().get(&id).map(|job| job.state)
    }

    /// Snapshots of every job, oldest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.jobs.lock().values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    /// Move a job from `expected` to `next`. Returns false, leaving the job
    /// untouched, if it is missing or not in `expected`.
    pub fn compare_and_set(&self, id: JobId, expected: JobState, next: JobState) -> bool {
        let mut jobs = self.jobs.lock();
        match jobs.get_mut(&id) {
            Some(job) if job.state == expected => {
                job.state = next;
                if matches!(next, JobState::Completed | JobState::Failed) {
                    job.finished_at = Some(Utc::now());
                }
                true
            }
            _ => false,
        }
    }

    /// Apply `update` to one document of a running job.
    pub fn update_document<F>(&self, id: JobId, index: usize, update: F) -> bool
    where
        F: FnOnce(&mut DocumentOutcome),
    {
        let mut jobs = self.jobs.lock();
        match jobs.get_mut(&id) {
            Some(job) if job.state == JobState::Running => match job.documents.get_mut(index) {
                Some(doc) => {
                    update(doc);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Close a running job: undispatched documents become cancelled,
    /// abandoned ones failed, then the terminal state is set.
    pub fn finish(&self, id: JobId) -> Option<JobState> {
        let mut jobs = self.jobs.lock();
        let job = jobs.get_mut(&id)?;
        if job.state != JobState::Running {
            return None;
        }

        for doc in &mut job.documents {
            match doc.state {
                DocumentState::Pending => doc.state = DocumentState::Cancelled,
                DocumentState::Running => {
                    doc.state = DocumentState::Failed;
                    doc.message = Some("worker stopped before finishing".to_string());
                }
                _ => {}
            }
        }

        let state = job.settle();
        job.state = state;
        job.finished_at = Some(Utc::now());
        Some(state)
    }
}
