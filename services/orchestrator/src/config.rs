use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

pub const DEFAULT_ALGORITHMS: &[&str] =
    &["GRNBoost2", "SCENIC", "PIDC", "CLR", "ARACNE", "NES", "Inferelator", "pySCENIC"];

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:8000,http://localhost:5173";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,

    pub data_dir: PathBuf,
    pub datasets_dir: PathBuf,
    pub results_dir: PathBuf,
    pub jobs_dir: PathBuf,

    pub supported_algorithms: Vec<String>,
    pub tools: HashMap<String, PathBuf>,

    pub job_timeout: Duration,
    pub soft_timeout_margin: Duration,
    pub max_concurrent_jobs: usize,

    pub hub_api_url: String,
    pub hub_rows_url: String,
    pub hub_token: Option<String>,

    pub log_format: LogFormat,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key -> value source (the process
    /// environment in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = var("GRN_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string());

        let data_dir = PathBuf::from(var("GRN_DATA_DIR").unwrap_or_else(|| "./data".to_string()));
        let datasets_dir = var("GRN_DATASETS_DIR").map(PathBuf::from).unwrap_or_else(|| data_dir.join("datasets"));
        let results_dir = var("GRN_RESULTS_DIR").map(PathBuf::from).unwrap_or_else(|| data_dir.join("results"));
        let jobs_dir = var("GRN_JOBS_DIR").map(PathBuf::from).unwrap_or_else(|| data_dir.join("jobs"));

        let supported_algorithms = match var("GRN_SUPPORTED_ALGORITHMS") {
            Some(v) => split_list(&v),
            None => DEFAULT_ALGORITHMS.iter().map(|s| s.to_string()).collect(),
        };
        let tools = match var("GRN_TOOLS") {
            Some(v) => parse_tools(&v)?,
            None => HashMap::new(),
        };

        let job_timeout_secs: u64 = parse_or(var("GRN_JOB_TIMEOUT_SECS"), 3600, "GRN_JOB_TIMEOUT_SECS")?;
        let soft_margin_secs: u64 =
            parse_or(var("GRN_JOB_SOFT_TIMEOUT_MARGIN_SECS"), 60, "GRN_JOB_SOFT_TIMEOUT_MARGIN_SECS")?;
        let max_concurrent_jobs: usize = parse_or(var("GRN_MAX_CONCURRENT_JOBS"), 4, "GRN_MAX_CONCURRENT_JOBS")?;

        let hub_api_url = var("GRN_HUB_API_URL").unwrap_or_else(|| "https://huggingface.co".to_string());
        let hub_rows_url =
            var("GRN_HUB_ROWS_URL").unwrap_or_else(|| "https://datasets-server.huggingface.co".to_string());
        let hub_token = var("GRN_HUB_TOKEN");

        let log_format = match var("GRN_LOG_FORMAT").as_deref() {
            None | Some("json") => LogFormat::Json,
            Some("plain") | Some("text") => LogFormat::Plain,
            Some(other) => bail!("GRN_LOG_FORMAT must be json or plain, got {other:?}"),
        };
        let cors_origins = split_list(&var("GRN_CORS_ORIGINS").unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string()));

        // Tiny sanity checks (fail fast, fail loud)
        for (key, url) in [("GRN_HUB_API_URL", &hub_api_url), ("GRN_HUB_ROWS_URL", &hub_rows_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!("{key} must start with http:// or https://");
            }
        }
        if supported_algorithms.is_empty() {
            bail!("GRN_SUPPORTED_ALGORITHMS must name at least one algorithm");
        }
        if max_concurrent_jobs == 0 {
            bail!("GRN_MAX_CONCURRENT_JOBS must be at least 1");
        }
        if job_timeout_secs == 0 {
            bail!("GRN_JOB_TIMEOUT_SECS must be at least 1");
        }
        if soft_margin_secs >= job_timeout_secs {
            bail!("GRN_JOB_SOFT_TIMEOUT_MARGIN_SECS must be smaller than GRN_JOB_TIMEOUT_SECS");
        }

        Ok(Self {
            bind_addr,
            data_dir,
            datasets_dir,
            results_dir,
            jobs_dir,
            supported_algorithms,
            tools,
            job_timeout: Duration::from_secs(job_timeout_secs),
            soft_timeout_margin: Duration::from_secs(soft_margin_secs),
            max_concurrent_jobs,
            hub_api_url,
            hub_rows_url,
            hub_token,
            log_format,
            cors_origins,
        })
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.datasets_dir, &self.results_dir, &self.jobs_dir] {
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

/// `Alg=/path/to/tool,Other=/path`
fn parse_tools(v: &str) -> Result<HashMap<String, PathBuf>> {
    let mut tools = HashMap::new();
    for entry in split_list(v) {
        let Some((alg, path)) = entry.split_once('=') else {
            bail!("GRN_TOOLS entry {entry:?} must look like Algorithm=/path/to/tool");
        };
        tools.insert(alg.trim().to_string(), PathBuf::from(path.trim()));
    }
    Ok(tools)
}

fn parse_or<T>(raw: Option<String>, default: T, key: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v.trim().parse().map_err(|e| anyhow::anyhow!("{key}: invalid value {v:?}: {e}")),
        None => Ok(default),
    }
}
