use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::chart::{self, ChartError};
use crate::export::{self, ExportError, ExportFormat};
use crate::extractor::{Estimate, Extractor};
use crate::jobs::{Job, JobStatus, JobStore};
use crate::models::{ExtractionRequest, RequestError, SampleTable};
use crate::page_source::AnySource;
use crate::progress::Progress;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("Extraction job {0} not found")]
    NotFound(u64),
    #[error("Extraction job {0} has not finished")]
    NotReady(u64),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Chart(#[from] ChartError),
}

/// Runs extractions in the background and keeps their results for the dashboard
#[derive(Clone)]
pub struct ExtractionService {
    extractor: Arc<Extractor<AnySource>>,
    jobs: JobStore,
    last_estimate: Arc<RwLock<Option<Estimate>>>,
}

impl ExtractionService {
    pub fn new(extractor: Extractor<AnySource>) -> Self {
        Self {
            extractor: Arc::new(extractor),
            jobs: JobStore::new(),
            last_estimate: Arc::new(RwLock::new(None)),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.extractor.concurrency()
    }

    /// Validate, register a job and run it on the runtime; returns the job id
    #[instrument(skip(self))]
    pub async fn start_extraction(&self, request: ExtractionRequest) -> Result<u64, ServiceError> {
        request.validate()?;

        let progress = Arc::new(Progress::new(request.total_points()));
        let id = self.jobs.create(request.clone(), progress.clone()).await;
        info!(job_id = id, points = request.total_points(), "Extraction job started");

        let extractor = self.extractor.clone();
        supervise(self.jobs.clone(), id, async move {
            extractor.fetch_parallel(&request, &progress).await
        });

        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn estimate(&self, request: &ExtractionRequest) -> Result<Estimate, ServiceError> {
        let estimate = self.extractor.estimate(request).await?;
        *self.last_estimate.write().await = Some(estimate.clone());
        Ok(estimate)
    }

    pub async fn last_estimate(&self) -> Option<Estimate> {
        self.last_estimate.read().await.clone()
    }

    pub async fn job(&self, id: u64) -> Result<Job, ServiceError> {
        self.jobs.get(id).await.ok_or(ServiceError::NotFound(id))
    }

    pub async fn latest_job(&self) -> Option<Job> {
        self.jobs.latest().await
    }

    /// Finished table for a job
    pub async fn table(&self, id: u64) -> Result<Arc<SampleTable>, ServiceError> {
        let job = self.job(id).await?;
        match (job.status, job.table) {
            (JobStatus::Completed, Some(table)) => Ok(table),
            (JobStatus::Failed, _) => Ok(Arc::new(SampleTable::new())),
            _ => Err(ServiceError::NotReady(id)),
        }
    }

    pub async fn export(&self, id: u64, format: ExportFormat) -> Result<Vec<u8>, ServiceError> {
        let table = self.table(id).await?;
        Ok(export::export(&table, format)?)
    }

    pub async fn chart_svg(&self, id: u64) -> Result<String, ServiceError> {
        let table = self.table(id).await?;
        Ok(chart::render_svg(&table)?)
    }
}

/// Run `work` on the runtime and record its outcome on job `id`
///
/// A panicking task still ends the job as failed.
fn supervise<F>(jobs: JobStore, id: u64, work: F) -> JoinHandle<()>
where
    F: Future<Output = Result<SampleTable, RequestError>> + Send + 'static,
{
    let task = tokio::spawn(work);
    tokio::spawn(async move {
        match task.await {
            Ok(Ok(table)) => {
                info!(
                    job_id = id,
                    samples = table.len(),
                    failed = table.failed_count(),
                    "Extraction job completed"
                );
                jobs.complete(id, table).await;
            }
            Ok(Err(e)) => {
                error!(job_id = id, error = %e, "Extraction job failed");
                jobs.fail(id, e.to_string()).await;
            }
            Err(e) => {
                error!(job_id = id, error = %e, "Extraction task aborted");
                jobs.fail(id, format!("extraction task aborted: {e}")).await;
            }
        }
    })
}
