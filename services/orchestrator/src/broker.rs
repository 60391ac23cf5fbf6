//! In-process task broker and the worker pool that drains it.
//!
//! Submission gets back an opaque handle only; revoking a handle or sending
//! `cancel_job` is fire-and-forget and callers poll job status for effect.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::GrnError;
use crate::types::new_id;
use crate::types_jobs::{RunInferenceTask, TaskOutcome};

pub const RUN_INFERENCE_TASK: &str = "run_inference_job";
pub const CANCEL_JOB_TASK: &str = "cancel_job";

#[async_trait]
pub trait TaskBroker: Send + Sync {
    /// Enqueues `run_inference_job`, returning its handle.
    async fn send_task(&self, task: RunInferenceTask) -> Result<String, GrnError>;
    /// Enqueues `cancel_job` for `job_id`, returning its handle.
    async fn send_cancel(&self, job_id: &str) -> Result<String, GrnError>;
    /// Best-effort termination of a previously sent task.
    async fn revoke(&self, handle: &str);
}

/// Worker-side entry points, implemented by the job lifecycle manager.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn run_inference(&self, task: RunInferenceTask, handle: String) -> TaskOutcome;
    async fn cancel_job(&self, job_id: &str) -> bool;
    /// Called when a task hits the hard time limit and is dropped.
    async fn abandon(&self, job_id: &str, reason: String);
}

#[derive(Debug)]
pub enum BrokerMessage {
    RunInference { handle: String, task: RunInferenceTask },
    CancelJob { handle: String, job_id: String },
    Revoke { handle: String },
}

#[derive(Clone)]
pub struct LocalBroker {
    tx: mpsc::UnboundedSender<BrokerMessage>,
}

impl LocalBroker {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BrokerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, msg: BrokerMessage) -> Result<(), GrnError> {
        self.tx.send(msg).map_err(|_| GrnError::Dispatch("worker pool is not running".into()))
    }
}

#[async_trait]
impl TaskBroker for LocalBroker {
    async fn send_task(&self, task: RunInferenceTask) -> Result<String, GrnError> {
        let handle = new_id("task");
        info!(task = RUN_INFERENCE_TASK, handle = %handle, job_id = %task.job_id, "task queued");
        self.send(BrokerMessage::RunInference { handle: handle.clone(), task })?;
        Ok(handle)
    }

    async fn send_cancel(&self, job_id: &str) -> Result<String, GrnError> {
        let handle = new_id("task");
        info!(task = CANCEL_JOB_TASK, handle = %handle, job_id, "task queued");
        self.send(BrokerMessage::CancelJob { handle: handle.clone(), job_id: job_id.to_string() })?;
        Ok(handle)
    }

    async fn revoke(&self, handle: &str) {
        if self.send(BrokerMessage::Revoke { handle: handle.to_string() }).is_err() {
            warn!(handle, "revoke dropped: worker pool is not running");
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct WorkerConfig {
    pub max_concurrent: usize,
    pub hard_timeout: Duration,
    pub soft_timeout_margin: Duration,
}

type Running = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// Drains the broker queue until every sender is dropped. Each inference
/// task runs on its own tokio task, at most `max_concurrent` at a time.
pub async fn run_worker_pool(
    mut rx: mpsc::UnboundedReceiver<BrokerMessage>,
    executor: Arc<dyn TaskExecutor>,
    cfg: WorkerConfig,
) {
    info!(max_concurrent = cfg.max_concurrent, "worker_pool: started");
    let permits = Arc::new(Semaphore::new(cfg.max_concurrent));
    let running: Running = Arc::new(Mutex::new(HashMap::new()));

    while let Some(msg) = rx.recv().await {
        match msg {
            BrokerMessage::RunInference { handle, task } => {
                let token = CancellationToken::new();
                lock(&running).insert(handle.clone(), token.clone());
                tokio::spawn(run_one(
                    executor.clone(),
                    permits.clone(),
                    running.clone(),
                    token,
                    handle,
                    task,
                    cfg,
                ));
            }
            BrokerMessage::Revoke { handle } => match lock(&running).get(&handle) {
                Some(token) => {
                    info!(handle = %handle, "revoking task");
                    token.cancel();
                }
                None => info!(handle = %handle, "revoke for unknown or finished task"),
            },
            BrokerMessage::CancelJob { handle, job_id } => {
                let executor = executor.clone();
                tokio::spawn(async move {
                    let cancelled = executor.cancel_job(&job_id).await;
                    info!(task = CANCEL_JOB_TASK, handle = %handle, job_id = %job_id, cancelled, "task done");
                });
            }
        }
    }
    info!("worker_pool: queue closed");
}

async fn run_one(
    executor: Arc<dyn TaskExecutor>,
    permits: Arc<Semaphore>,
    running: Running,
    token: CancellationToken,
    handle: String,
    task: RunInferenceTask,
    cfg: WorkerConfig,
) {
    let job_id = task.job_id.clone();

    let _permit = tokio::select! {
        p = permits.acquire_owned() => match p {
            Ok(p) => p,
            Err(_) => {
                error!(job_id = %job_id, "worker pool closed before task start");
                lock(&running).remove(&handle);
                return;
            }
        },
        _ = token.cancelled() => {
            info!(job_id = %job_id, handle = %handle, "task revoked before start");
            lock(&running).remove(&handle);
            return;
        }
    };

    let soft_after = cfg.hard_timeout.saturating_sub(cfg.soft_timeout_margin);
    let work = executor.run_inference(task, handle.clone());
    let soft = tokio::time::sleep(soft_after);
    let hard = tokio::time::sleep(cfg.hard_timeout);
    tokio::pin!(work, soft, hard);
    let mut warned = false;

    loop {
        tokio::select! {
            outcome = &mut work => {
                match &outcome.error {
                    None => info!(job_id = %job_id, status = ?outcome.status, "task done"),
                    Some(e) => warn!(job_id = %job_id, status = ?outcome.status, "task done: {e}"),
                }
                break;
            }
            _ = token.cancelled() => {
                info!(job_id = %job_id, handle = %handle, "task revoked");
                break;
            }
            _ = &mut soft, if !warned => {
                warned = true;
                warn!(job_id = %job_id, limit_secs = cfg.hard_timeout.as_secs(), "soft time limit reached");
            }
            _ = &mut hard => {
                let reason = format!("Job exceeded time limit of {}s", cfg.hard_timeout.as_secs());
                error!(job_id = %job_id, "{reason}");
                executor.abandon(&job_id, reason).await;
                break;
            }
        }
    }

    lock(&running).remove(&handle);
}

fn lock(running: &Running) -> std::sync::MutexGuard<'_, HashMap<String, CancellationToken>> {
    running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
