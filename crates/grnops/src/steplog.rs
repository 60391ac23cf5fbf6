//! Per-job step log: `[<ts>] <step>: <details>` lines appended to a text
//! file and mirrored to `tracing`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

pub const LOG_FILE: &str = "logs.txt";

#[derive(Clone, Debug)]
pub struct StepLog {
    job_id: Option<String>,
    path: Option<PathBuf>,
}

impl StepLog {
    /// Logs into `<dir>/logs.txt`.
    pub fn for_job(job_id: &str, dir: &Path) -> Self {
        Self { job_id: Some(job_id.to_string()), path: Some(dir.join(LOG_FILE)) }
    }

    /// tracing only; nothing is written to disk.
    pub fn detached() -> Self {
        Self { job_id: None, path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn step(&self, step: &str, details: impl AsRef<str>) {
        let details = details.as_ref();
        info!(job_id = self.job_id.as_deref().unwrap_or("-"), step, details, "step");
        self.append(step, details);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        warn!(job_id = self.job_id.as_deref().unwrap_or("-"), "{message}");
        self.append("WARNING", message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        error!(job_id = self.job_id.as_deref().unwrap_or("-"), "{message}");
        self.append("ERROR", message);
    }

    fn append(&self, step: &str, details: &str) {
        let Some(path) = &self.path else { return };
        let ts = chrono::Utc::now().to_rfc3339();
        let line = if details.is_empty() {
            format!("[{ts}] {step}\n")
        } else {
            format!("[{ts}] {step}: {details}\n")
        };

        let res = path
            .parent()
            .map(std::fs::create_dir_all)
            .transpose()
            .and_then(|_| OpenOptions::new().create(true).append(true).open(path))
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = res {
            warn!(path = %path.display(), "step log append failed: {e}");
        }
    }
}
