use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;
use utoipa::ToSchema;

use crate::models::{ExtractionRequest, SampleTable};
use crate::progress::{Progress, ProgressSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: u64,
    pub request: ExtractionRequest,
    pub status: JobStatus,
    pub progress: Arc<Progress>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub table: Option<Arc<SampleTable>>,
    pub error: Option<String>,
}

/// What the API reports about a job
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobSummary {
    pub id: u64,
    pub status: JobStatus,
    pub request: ExtractionRequest,
    pub progress: ProgressSnapshot,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub samples: Option<usize>,
    pub failed_samples: Option<usize>,
    pub error: Option<String>,
}

impl Job {
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            status: self.status,
            request: self.request.clone(),
            progress: self.progress.snapshot(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            samples: self.table.as_ref().map(|t| t.len()),
            failed_samples: self.table.as_ref().map(|t| t.failed_count()),
            error: self.error.clone(),
        }
    }
}

/// Finished jobs kept around before the oldest are dropped
pub const DEFAULT_RETAINED_JOBS: usize = 20;

/// In-memory registry of extraction jobs for the dashboard
#[derive(Clone)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<u64, Job>>>,
    next_id: Arc<AtomicU64>,
    retain: usize,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_JOBS)
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `retain` jobs; running jobs are never dropped
    pub fn with_retention(retain: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
            retain: retain.max(1),
        }
    }

    pub async fn create(&self, request: ExtractionRequest, progress: Arc<Progress>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let job = Job {
            id,
            request,
            status: JobStatus::Running,
            progress,
            started_at: Utc::now(),
            finished_at: None,
            table: None,
            error: None,
        };
        let mut jobs = self.jobs.write().await;
        jobs.insert(id, job);
        evict_finished(&mut jobs, self.retain);
        id
    }

    pub async fn complete(&self, id: u64, table: SampleTable) {
        if let Some(job) = self.jobs.write().await.get_mut(&id) {
            job.status = JobStatus::Completed;
            job.finished_at = Some(Utc::now());
            job.table = Some(Arc::new(table));
        }
    }

    pub async fn fail(&self, id: u64, error: String) {
        if let Some(job) = self.jobs.write().await.get_mut(&id) {
            job.status = JobStatus::Failed;
            job.finished_at = Some(Utc::now());
            job.error = Some(error);
        }
    }

    pub async fn get(&self, id: u64) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    pub async fn latest(&self) -> Option<Job> {
        let jobs = self.jobs.read().await;
        jobs.keys().max().and_then(|id| jobs.get(id)).cloned()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn evict_finished(jobs: &mut HashMap<u64, Job>, retain: usize) {
    while jobs.len() > retain {
        let oldest = jobs
            .values()
            .filter(|job| job.status != JobStatus::Running)
            .map(|job| job.id)
            .min();
        match oldest {
            Some(id) => {
                jobs.remove(&id);
                debug!(job_id = id, "Dropped finished job");
            }
            None => break,
        }
    }
}
