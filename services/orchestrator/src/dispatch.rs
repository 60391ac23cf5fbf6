//! Loads a job's dataset and runs the requested algorithm on the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use grnops::{run_pipeline_until, write_failure, ExpressionMatrix, Params, ResultPayload, RunnerRegistry, StepLog};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::GrnError;
use crate::hub::{is_hub_identifier, HubClient};

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<RunnerRegistry>,
    hub: Arc<dyn HubClient>,
    results_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(registry: Arc<RunnerRegistry>, hub: Arc<dyn HubClient>, results_dir: PathBuf) -> Self {
        Self { registry, hub, results_dir }
    }

    pub fn algorithms(&self) -> &[String] {
        self.registry.algorithms()
    }

    /// `<results_root>/<job_id>/`
    pub fn output_dir(&self, job_id: &str) -> PathBuf {
        self.results_dir.join(job_id)
    }

    pub async fn run(
        &self,
        job_id: &str,
        dataset_path: &str,
        algorithm: &str,
        params: &Params,
    ) -> Result<ResultPayload, GrnError> {
        // Unknown names fail before the output directory is touched.
        self.registry.get(algorithm)?;

        let output_dir = self.output_dir(job_id);
        let log = StepLog::for_job(job_id, &output_dir);
        log.step("Loading dataset", dataset_path);

        let data = match self.load(dataset_path).await {
            Ok(d) => d,
            Err(e) => {
                log.error(e.to_string());
                if let Err(meta_err) = write_failure(&output_dir, algorithm, &e.to_string()) {
                    warn!(job_id, "could not write failure metadata: {meta_err}");
                }
                return Err(e);
            }
        };
        let (genes, samples) = data.shape();
        log.step("Dataset loaded", format!("{genes} genes x {samples} samples"));

        // The blocking thread outlives this future when it is dropped (revoke
        // or hard timeout); the token then keeps it from recording completion.
        let stop = CancellationToken::new();
        let _stop_on_drop = stop.clone().drop_guard();

        let registry = self.registry.clone();
        let algorithm = algorithm.to_string();
        let params = params.clone();
        let payload = tokio::task::spawn_blocking(move || {
            let stopped = || stop.is_cancelled();
            run_pipeline_until(&registry, &data, &algorithm, &params, &output_dir, &log, &stopped)
        })
        .await??;
        Ok(payload)
    }

    async fn load(&self, dataset_path: &str) -> Result<ExpressionMatrix, GrnError> {
        if is_hub_identifier(dataset_path) {
            let rows = self
                .hub
                .rows(dataset_path)
                .await
                .map_err(|e| GrnError::DatasetLoadFailure(format!("{dataset_path}: {e:#}")))?;
            return Ok(ExpressionMatrix::from_records(&rows.columns, &rows.rows)?);
        }

        let path = Path::new(dataset_path).to_path_buf();
        Ok(tokio::task::spawn_blocking(move || ExpressionMatrix::from_csv_path(&path)).await??)
    }
}
