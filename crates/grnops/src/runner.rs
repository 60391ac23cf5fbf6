//! Algorithm runners and the name -> runner registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use serde_json::Value;

use crate::expression::ExpressionMatrix;
use crate::matrix::{AdjacencyMatrix, ZERO_THRESHOLD};
use crate::mock::{mock_adjacency, DEFAULT_MOCK_SEED};
use crate::pipeline::merge_params;
use crate::schema::{EdgeStats, Params};
use crate::steplog::StepLog;
use crate::{GrnOpsError, Result};

pub const ADJACENCY_FILE: &str = "adjacency_matrix.csv";
pub const MOCK_NOTE: &str = "Mock implementation - for testing/demo purposes";

pub struct RunContext<'a> {
    pub data: &'a ExpressionMatrix,
    pub params: &'a Params,
    pub output_dir: &'a Path,
    pub log: &'a StepLog,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunOutcome {
    pub stats: EdgeStats,
    pub output_files: Vec<String>,
    pub mock: bool,
    pub note: Option<String>,
    pub adjacency_digest: Option<String>,
}

pub trait GrnRunner: Send + Sync {
    fn algorithm(&self) -> &str;
    fn execute(&self, ctx: &RunContext<'_>) -> Result<RunOutcome>;
}

/// Always produces the deterministic placeholder network.
pub struct MockRunner {
    algorithm: String,
}

impl MockRunner {
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self { algorithm: algorithm.into() }
    }
}

impl GrnRunner for MockRunner {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn execute(&self, ctx: &RunContext<'_>) -> Result<RunOutcome> {
        ctx.log.step("Generating mock results", &self.algorithm);

        let seed = ctx.params.get("seed").and_then(Value::as_u64).unwrap_or(DEFAULT_MOCK_SEED);
        let adjacency = mock_adjacency(ctx.data.genes.clone(), seed);

        let path = ctx.output_dir.join(ADJACENCY_FILE);
        let digest = adjacency.write_csv(&path)?;
        let stats = adjacency.stats();

        ctx.log.step("Mock results ready", format!("Edges: {}", stats.edges_count));

        Ok(RunOutcome {
            stats,
            output_files: vec![ADJACENCY_FILE.to_string()],
            mock: true,
            note: Some(MOCK_NOTE.to_string()),
            adjacency_digest: Some(digest),
        })
    }
}

/// Runs an external inference executable when one is installed, falling
/// back to the mock otherwise.
///
/// Tool contract: `<tool> --expression <in.csv> --output <out.csv> [--param k=v]...`
/// where `out.csv` is a square gene-by-gene matrix labeled like
/// `adjacency_matrix.csv`.
pub struct ToolRunner {
    algorithm: String,
    program: Option<PathBuf>,
    output_file: String,
    defaults: Params,
    required: Vec<String>,
    fallback: MockRunner,
}

impl ToolRunner {
    pub fn new(algorithm: impl Into<String>, program: Option<PathBuf>) -> Self {
        let algorithm = algorithm.into();
        let (output_file, defaults) = slot_defaults(&algorithm);
        Self {
            fallback: MockRunner::new(algorithm.clone()),
            algorithm,
            program,
            output_file,
            defaults,
            required: Vec::new(),
        }
    }

    pub fn with_required(mut self, keys: &[&str]) -> Self {
        self.required = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    fn installed_program(&self) -> Option<&Path> {
        self.program.as_deref().filter(|p| p.exists())
    }

    fn run_tool(&self, program: &Path, params: &Params, ctx: &RunContext<'_>) -> Result<RunOutcome> {
        let input = ctx.output_dir.join("expression_input.csv");
        let raw = ctx.output_dir.join(format!("{}.raw.csv", self.algorithm));
        let _scratch = ScratchFiles(vec![input.clone(), raw.clone()]);
        ctx.data.write_csv(&input)?;

        ctx.log.step(&self.algorithm, format!("Running {}", program.display()));
        let mut cmd = Command::new(program);
        cmd.arg("--expression").arg(&input).arg("--output").arg(&raw);
        for (k, v) in params {
            let v = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            cmd.arg("--param").arg(format!("{k}={v}"));
        }

        let output = cmd
            .output()
            .map_err(|e| GrnOpsError::Execution(format!("{} failed to start: {e}", self.algorithm)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            return Err(GrnOpsError::Execution(format!(
                "{} exited with {}: {}",
                self.algorithm,
                output.status,
                tail.join(" | ")
            )));
        }

        let mut adjacency = AdjacencyMatrix::read_csv(&raw)?;
        adjacency.threshold(ZERO_THRESHOLD);

        let out_path = ctx.output_dir.join(&self.output_file);
        let digest = adjacency.write_csv(&out_path)?;
        ctx.log.step("Results saved", out_path.display().to_string());

        Ok(RunOutcome {
            stats: adjacency.stats(),
            output_files: vec![self.output_file.clone()],
            mock: false,
            note: None,
            adjacency_digest: Some(digest),
        })
    }
}

/// Tool input/output files inside the job directory, removed on every exit
/// path so they never show up among the downloadable results.
struct ScratchFiles(Vec<PathBuf>);

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in &self.0 {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl GrnRunner for ToolRunner {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn execute(&self, ctx: &RunContext<'_>) -> Result<RunOutcome> {
        ctx.log.step(&self.algorithm, "Initializing");
        let required: Vec<&str> = self.required.iter().map(String::as_str).collect();
        let params = merge_params(ctx.params, &required, &self.defaults)?;

        match self.installed_program() {
            Some(program) => self.run_tool(program, &params, ctx),
            None => {
                ctx.log.warn(format!("{} tool not installed, using mock implementation", self.algorithm));
                let ctx = RunContext { params: &params, ..*ctx };
                self.fallback.execute(&ctx)
            }
        }
    }
}

/// Output filename and parameter defaults per slot.
fn slot_defaults(algorithm: &str) -> (String, Params) {
    let mut defaults = Params::new();
    let output_file = match algorithm {
        "GRNBoost2" => {
            defaults.insert("n_jobs".into(), Value::from(4));
            defaults.insert("early_stopping".into(), Value::from(true));
            defaults.insert("verbose".into(), Value::from(0));
            ADJACENCY_FILE
        }
        "SCENIC" => "scenic_adjacency.csv",
        _ => ADJACENCY_FILE,
    };
    (output_file.to_string(), defaults)
}

/// Algorithm name -> runner, populated once at startup.
#[derive(Clone, Default)]
pub struct RunnerRegistry {
    runners: HashMap<String, Arc<dyn GrnRunner>>,
    order: Vec<String>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `ToolRunner` per allowed algorithm, wired to the configured tool
    /// executable when there is one.
    pub fn with_defaults(algorithms: &[String], tools: &HashMap<String, PathBuf>) -> Self {
        let mut reg = Self::new();
        for alg in algorithms {
            reg.register(Arc::new(ToolRunner::new(alg.clone(), tools.get(alg).cloned())));
        }
        reg
    }

    pub fn register(&mut self, runner: Arc<dyn GrnRunner>) {
        let name = runner.algorithm().to_string();
        if self.runners.insert(name.clone(), runner).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, algorithm: &str) -> Result<Arc<dyn GrnRunner>> {
        self.runners.get(algorithm).cloned().ok_or_else(|| GrnOpsError::UnsupportedAlgorithm {
            algorithm: algorithm.to_string(),
            supported: self.order.join(", "),
        })
    }

    pub fn algorithms(&self) -> &[String] {
        &self.order
    }
}
