//! Runs one algorithm over one expression matrix into a job output directory.

use std::fs;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::expression::ExpressionMatrix;
use crate::runner::{GrnRunner, RunContext, RunOutcome, RunnerRegistry};
use crate::schema::{FailureRecord, Params, ResultPayload, RunStatus};
use crate::steplog::StepLog;
use crate::{GrnOpsError, Result};

pub const METADATA_FILE: &str = "metadata.json";
pub const STOPPED_MESSAGE: &str = "run stopped before completion";

/// Overlays `params` on `defaults`; every key in `required` must be present
/// afterwards.
pub fn merge_params(params: &Params, required: &[&str], defaults: &Params) -> Result<Params> {
    let mut merged = defaults.clone();
    for (k, v) in params {
        merged.insert(k.clone(), v.clone());
    }
    let missing: Vec<&str> = required.iter().copied().filter(|k| !merged.contains_key(*k)).collect();
    if !missing.is_empty() {
        return Err(GrnOpsError::Execution(format!("Missing required parameters: {}", missing.join(", "))));
    }
    Ok(merged)
}

/// Looks up the runner, executes it and records `metadata.json`.
///
/// An unknown algorithm fails before anything is written. Any later failure
/// leaves a failure record in `metadata.json` and is returned unchanged.
pub fn run_pipeline(
    registry: &RunnerRegistry,
    data: &ExpressionMatrix,
    algorithm: &str,
    params: &Params,
    output_dir: &Path,
    log: &StepLog,
) -> Result<ResultPayload> {
    run_pipeline_until(registry, data, algorithm, params, output_dir, log, &|| false)
}

/// `run_pipeline` for a caller that may give up on the run. Once `stopped`
/// reports true the run is recorded as failed, never as completed.
pub fn run_pipeline_until(
    registry: &RunnerRegistry,
    data: &ExpressionMatrix,
    algorithm: &str,
    params: &Params,
    output_dir: &Path,
    log: &StepLog,
    stopped: &dyn Fn() -> bool,
) -> Result<ResultPayload> {
    let runner = registry.get(algorithm)?;
    let (genes, samples) = data.shape();

    let result = execute(runner.as_ref(), data, params, output_dir, log).and_then(|done| {
        if stopped() {
            return Err(GrnOpsError::Execution(STOPPED_MESSAGE.to_string()));
        }
        Ok(done)
    });

    match result {
        Ok((outcome, elapsed)) => {
            let payload = ResultPayload {
                edges_count: outcome.stats.edges_count,
                mean_weight: outcome.stats.mean_weight,
                max_weight: outcome.stats.max_weight,
                min_weight: outcome.stats.min_weight,
                output_files: outcome.output_files,
                algorithm: algorithm.to_string(),
                output_dir: output_dir.display().to_string(),
                status: RunStatus::Completed,
                mock: outcome.mock,
                note: outcome.note,
                genes,
                samples,
                execution_time_seconds: elapsed,
                adjacency_digest: outcome.adjacency_digest,
            };
            write_json(&output_dir.join(METADATA_FILE), &payload)?;
            log.step("Completed", format!("Edges: {}", payload.edges_count));
            Ok(payload)
        }
        Err(e) => {
            log.error(format!("{algorithm} failed: {e}"));
            if let Err(meta_err) = write_failure(output_dir, algorithm, &e.to_string()) {
                log.warn(format!("could not write failure metadata: {meta_err}"));
            }
            Err(e)
        }
    }
}

fn execute(
    runner: &dyn GrnRunner,
    data: &ExpressionMatrix,
    params: &Params,
    output_dir: &Path,
    log: &StepLog,
) -> Result<(RunOutcome, f64)> {
    fs::create_dir_all(output_dir).map_err(|e| GrnOpsError::io(output_dir, e))?;
    let (genes, samples) = data.shape();
    log.step("Initialization", format!("Algorithm: {}, genes: {genes}, samples: {samples}", runner.algorithm()));

    let started = Instant::now();
    let outcome = runner.execute(&RunContext { data, params, output_dir, log })?;
    Ok((outcome, started.elapsed().as_secs_f64()))
}

/// Writes a failed-status `metadata.json` into `output_dir`.
pub fn write_failure(output_dir: &Path, algorithm: &str, error: &str) -> Result<()> {
    fs::create_dir_all(output_dir).map_err(|e| GrnOpsError::io(output_dir, e))?;
    let record = FailureRecord {
        status: RunStatus::Failed,
        algorithm: algorithm.to_string(),
        error: error.to_string(),
        output_dir: output_dir.display().to_string(),
    };
    write_json(&output_dir.join(METADATA_FILE), &record)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| GrnOpsError::Serialization(e.to_string()))?;
    fs::write(path, bytes).map_err(|e| GrnOpsError::io(path, e))
}
