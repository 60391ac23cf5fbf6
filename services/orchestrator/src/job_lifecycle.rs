//! Job Lifecycle Manager
//!
//! Submission and cancellation happen on the API side; every other status
//! change comes from the worker executing the job. Only the worker that owns
//! a job moves it past `pending`, so job records have a single writer.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use grnops::steplog::LOG_FILE;
use grnops::ResultPayload;
use metastore::paginate;
use tracing::{error, info, info_span, warn, Instrument};

use crate::broker::{TaskBroker, TaskExecutor};
use crate::dataset_registry::DatasetRegistry;
use crate::dispatch::Dispatcher;
use crate::error::GrnError;
use crate::results_registry::{dir_size, ResultsRegistry};
use crate::store_exec::{with_store_blocking, SharedRepo};
use crate::types::Page;
use crate::types_jobs::{JobCreate, JobRecord, JobStatus, RunInferenceTask, TaskOutcome};
use crate::types_results::ResultSummary;

pub const RESTART_ERROR: &str = "worker_restart";

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub failed: usize,
    pub redispatched: usize,
}

pub struct JobManager {
    jobs: SharedRepo<JobRecord>,
    datasets: DatasetRegistry,
    results: ResultsRegistry,
    broker: Arc<dyn TaskBroker>,
    dispatcher: Dispatcher,
}

impl JobManager {
    pub fn new(
        jobs: SharedRepo<JobRecord>,
        datasets: DatasetRegistry,
        results: ResultsRegistry,
        broker: Arc<dyn TaskBroker>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self { jobs, datasets, results, broker, dispatcher }
    }

    pub fn results_dir_for(&self, job_id: &str) -> PathBuf {
        self.dispatcher.output_dir(job_id)
    }

    /// Validates, persists a `pending` job, then hands it to the broker. The
    /// broker handle lands on the record afterwards.
    pub async fn submit(&self, req: JobCreate) -> Result<JobRecord, GrnError> {
        let supported = self.dispatcher.algorithms();
        if !supported.iter().any(|a| a == &req.algorithm) {
            return Err(GrnError::unsupported(&req.algorithm, supported));
        }
        let dataset = self
            .datasets
            .get(&req.dataset_id)
            .await?
            .ok_or_else(|| GrnError::DatasetNotFound(req.dataset_id.clone()))?;

        let job = JobRecord::new(&dataset.id, &req.algorithm, req.params);
        self.put(job.clone()).await?;
        info!(job_id = %job.id, dataset_id = %dataset.id, algorithm = %job.algorithm, "job created");

        let handle = self.broker.send_task(task_for(&job, &dataset.file_path)).await?;
        self.attach_handle(&job.id, handle).await
    }

    /// The worker may already have started the job and recorded the handle.
    async fn attach_handle(&self, job_id: &str, handle: String) -> Result<JobRecord, GrnError> {
        let job_id = job_id.to_string();
        with_store_blocking(self.jobs.clone(), move |repo| {
            let mut job = repo.get(&job_id)?.ok_or_else(|| GrnError::NotFound(format!("Job {job_id} not found")))?;
            if job.task_id.is_none() {
                job.task_id = Some(handle);
                job.updated_at = Utc::now();
                repo.put(&job)?;
            }
            Ok(job)
        })
        .await
    }

    pub async fn status(&self, id: &str) -> Result<Option<JobRecord>, GrnError> {
        let id = id.to_string();
        with_store_blocking(self.jobs.clone(), move |repo| Ok(repo.get(&id)?)).await
    }

    /// Newest first.
    pub async fn list(&self, page: Page) -> Result<Vec<JobRecord>, GrnError> {
        let mut jobs = with_store_blocking(self.jobs.clone(), |repo| Ok(repo.list()?)).await?;
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(jobs, page.skip, page.limit))
    }

    pub async fn count(&self) -> Result<usize, GrnError> {
        with_store_blocking(self.jobs.clone(), |repo| Ok(repo.count()?)).await
    }

    /// Marks a pending or running job cancelled and revokes its task. The
    /// worker is signalled, not awaited. Returns false for unknown or
    /// finished jobs, which are left untouched.
    pub async fn cancel(&self, id: &str) -> Result<bool, GrnError> {
        let job_id = id.to_string();
        let handle = with_store_blocking(self.jobs.clone(), move |repo| {
            let Some(mut job) = repo.get(&job_id)? else {
                return Ok(None);
            };
            if !job.status.is_cancellable() {
                return Ok(None);
            }
            job.transition(JobStatus::Cancelled)?;
            repo.put(&job)?;
            Ok(Some(job.task_id))
        })
        .await?;

        let Some(handle) = handle else {
            return Ok(false);
        };
        if let Some(h) = handle {
            self.broker.revoke(&h).await;
        }
        info!(job_id = id, "job cancelled");
        Ok(true)
    }

    /// Queues `cancel_job` and returns its handle; `None` when the job can't
    /// be cancelled.
    pub async fn request_cancel(&self, id: &str) -> Result<Option<String>, GrnError> {
        match self.status(id).await? {
            Some(job) if job.status.is_cancellable() => Ok(Some(self.broker.send_cancel(id).await?)),
            _ => Ok(None),
        }
    }

    /// Lines of the job's step log; `None` for unknown jobs, empty when no log
    /// has been written yet.
    pub async fn logs(&self, id: &str) -> Result<Option<Vec<String>>, GrnError> {
        if self.status(id).await?.is_none() {
            return Ok(None);
        }
        let path = self.results_dir_for(id).join(LOG_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text.lines().map(String::from).collect())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Some(Vec::new())),
            Err(e) => Err(GrnError::Internal(format!("{}: {e}", path.display()))),
        }
    }

    pub async fn delete(&self, id: &str) -> Result<bool, GrnError> {
        let id = id.to_string();
        with_store_blocking(self.jobs.clone(), move |repo| Ok(repo.delete(&id)?)).await
    }

    /// Startup pass: jobs left `running` by a previous process are failed,
    /// `pending` ones are queued again.
    pub async fn recover_jobs(&self) -> Result<RecoveryReport, GrnError> {
        let jobs = with_store_blocking(self.jobs.clone(), |repo| Ok(repo.list()?)).await?;
        let mut report = RecoveryReport::default();

        for job in jobs {
            match job.status {
                JobStatus::Running => {
                    let applied = self
                        .apply(&job.id, JobStatus::Failed, |j| j.error_message = Some(RESTART_ERROR.to_string()))
                        .await;
                    if self.log_rejected(&job.id, applied).is_some() {
                        report.failed += 1;
                    }
                }
                JobStatus::Pending => {
                    let dataset_path = match self.datasets.get(&job.dataset_id).await? {
                        Some(ds) => ds.file_path,
                        None => {
                            warn!(job_id = %job.id, dataset_id = %job.dataset_id, "pending job references a deleted dataset");
                            continue;
                        }
                    };
                    let handle = self.broker.send_task(task_for(&job, &dataset_path)).await?;
                    let job_id = job.id.clone();
                    with_store_blocking(self.jobs.clone(), move |repo| {
                        if let Some(mut j) = repo.get(&job_id)? {
                            j.task_id = Some(handle);
                            j.updated_at = Utc::now();
                            repo.put(&j)?;
                        }
                        Ok(())
                    })
                    .await?;
                    report.redispatched += 1;
                }
                _ => {}
            }
        }

        info!(failed = report.failed, redispatched = report.redispatched, "job recovery done");
        Ok(report)
    }

    async fn put(&self, job: JobRecord) -> Result<(), GrnError> {
        with_store_blocking(self.jobs.clone(), move |repo| Ok(repo.put(&job)?)).await
    }

    /// Validated status write: loads the record, transitions it, applies `f`
    /// and stores it, all under one store lock.
    async fn apply<F>(&self, job_id: &str, next: JobStatus, f: F) -> Result<JobRecord, GrnError>
    where
        F: FnOnce(&mut JobRecord) + Send + 'static,
    {
        let job_id = job_id.to_string();
        with_store_blocking(self.jobs.clone(), move |repo| {
            let mut job = repo.get(&job_id)?.ok_or_else(|| GrnError::NotFound(format!("Job {job_id} not found")))?;
            job.transition(next)?;
            f(&mut job);
            repo.put(&job)?;
            Ok(job)
        })
        .await
    }

    /// Rejected or orphaned writes from the execution context are logged and
    /// dropped.
    fn log_rejected(&self, job_id: &str, applied: Result<JobRecord, GrnError>) -> Option<JobRecord> {
        match applied {
            Ok(job) => Some(job),
            Err(e @ (GrnError::InvalidTransition { .. } | GrnError::NotFound(_))) => {
                warn!(job_id, "status write dropped: {e}");
                None
            }
            Err(e) => {
                error!(job_id, "status write failed: {e}");
                None
            }
        }
    }

    async fn execute(&self, task: RunInferenceTask, handle: String) -> TaskOutcome {
        let job_id = task.job_id.clone();

        let started = self
            .apply(&job_id, JobStatus::Running, move |j| {
                j.task_id = Some(handle);
            })
            .await;
        if self.log_rejected(&job_id, started).is_none() {
            return TaskOutcome::failed(&job_id, "job is no longer runnable");
        }
        info!("job running");

        match self.dispatcher.run(&job_id, &task.dataset_path, &task.algorithm, &task.params).await {
            Ok(payload) => {
                let done = self
                    .apply(&job_id, JobStatus::Completed, {
                        let payload = payload.clone();
                        move |j| {
                            j.progress_percent = 100;
                            j.result = Some(payload);
                        }
                    })
                    .await;
                if self.log_rejected(&job_id, done).is_some() {
                    self.record_result(&task, &payload).await;
                    info!(edges = payload.edges_count, mock = payload.mock, "job completed");
                }
                TaskOutcome::completed(&job_id, payload)
            }
            Err(e) => {
                let message = e.to_string();
                error!("job failed: {message}");
                let msg = message.clone();
                let failed = self.apply(&job_id, JobStatus::Failed, move |j| j.error_message = Some(msg)).await;
                self.log_rejected(&job_id, failed);
                TaskOutcome::failed(&job_id, message)
            }
        }
    }

    async fn record_result(&self, task: &RunInferenceTask, payload: &ResultPayload) {
        let created = self
            .results
            .create(&task.job_id, &task.dataset_id, &task.algorithm, ResultSummary::from(payload))
            .await;
        let result = match created {
            Ok(r) => r,
            Err(e) => {
                error!("result record not created: {e}");
                return;
            }
        };

        let dir = self.results_dir_for(&task.job_id);
        let size = tokio::task::spawn_blocking(move || dir_size(&dir)).await.ok().flatten();
        if let Err(e) = self.results.update(&result.id, payload.output_files.clone(), size).await {
            error!(result_id = %result.id, "result files not recorded: {e}");
        }
    }
}

fn task_for(job: &JobRecord, dataset_path: &str) -> RunInferenceTask {
    RunInferenceTask {
        job_id: job.id.clone(),
        dataset_id: job.dataset_id.clone(),
        dataset_path: dataset_path.to_string(),
        algorithm: job.algorithm.clone(),
        params: job.params.clone(),
    }
}

#[async_trait]
impl TaskExecutor for JobManager {
    async fn run_inference(&self, task: RunInferenceTask, handle: String) -> TaskOutcome {
        let span = info_span!("job", job_id = %task.job_id, algorithm = %task.algorithm);
        self.execute(task, handle).instrument(span).await
    }

    async fn cancel_job(&self, job_id: &str) -> bool {
        match self.cancel(job_id).await {
            Ok(cancelled) => cancelled,
            Err(e) => {
                error!(job_id, "cancel_job failed: {e}");
                false
            }
        }
    }

    async fn abandon(&self, job_id: &str, reason: String) {
        let applied = self.apply(job_id, JobStatus::Failed, move |j| j.error_message = Some(reason)).await;
        self.log_rejected(job_id, applied);
    }
}
