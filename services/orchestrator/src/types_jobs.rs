use std::fmt;

use chrono::{DateTime, Utc};
use grnops::{Params, ResultPayload};
use metastore::Record;
use serde::{Deserialize, Serialize};

use crate::error::GrnError;
use crate::types::new_id;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    pub fn is_cancellable(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    /// pending -> running -> {completed, failed}; pending|running -> cancelled.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running) | (Pending, Cancelled) | (Running, Completed) | (Running, Failed) | (Running, Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One JSON document per job under the jobs directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub id: String,
    pub dataset_id: String,
    pub algorithm: String,
    pub status: JobStatus,
    #[serde(default)]
    pub params: Params,

    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub progress_percent: u8,
    pub error_message: Option<String>,

    /// Opaque broker handle, used to revoke the task.
    #[serde(rename = "celery_task_id")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub result: Option<ResultPayload>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for JobRecord {
    fn record_id(&self) -> &str {
        &self.id
    }
}

impl JobRecord {
    pub fn new(dataset_id: &str, algorithm: &str, params: Params) -> Self {
        let now = Utc::now();
        Self {
            id: new_id("job"),
            dataset_id: dataset_id.to_string(),
            algorithm: algorithm.to_string(),
            status: JobStatus::Pending,
            params,
            started_at: None,
            ended_at: None,
            progress_percent: 0,
            error_message: None,
            task_id: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves to `next` if the state machine allows it. Entering a terminal
    /// state stamps `ended_at`.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), GrnError> {
        if !self.status.can_transition_to(next) {
            return Err(GrnError::InvalidTransition { from: self.status, to: next });
        }
        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        match next {
            JobStatus::Running => self.started_at = Some(now),
            s if s.is_terminal() => self.ended_at = Some(now),
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobCreate {
    pub dataset_id: String,
    pub algorithm: String,
    #[serde(default)]
    pub params: Params,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub total: usize,
    pub jobs: Vec<JobRecord>,
}

#[derive(Debug, Serialize)]
pub struct JobLogsResponse {
    pub job_id: String,
    pub logs: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CancelRequested {
    pub job_id: String,
    pub task_id: String,
}

/// Payload of the `run_inference_job` task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunInferenceTask {
    pub job_id: String,
    pub dataset_id: String,
    pub dataset_path: String,
    pub algorithm: String,
    pub params: Params,
}

/// What a finished `run_inference_job` task reports back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskOutcome {
    pub job_id: String,
    pub status: grnops::RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskOutcome {
    pub fn completed(job_id: &str, result: ResultPayload) -> Self {
        Self { job_id: job_id.to_string(), status: grnops::RunStatus::Completed, result: Some(result), error: None }
    }

    pub fn failed(job_id: &str, error: impl Into<String>) -> Self {
        Self { job_id: job_id.to_string(), status: grnops::RunStatus::Failed, result: None, error: Some(error.into()) }
    }
}
