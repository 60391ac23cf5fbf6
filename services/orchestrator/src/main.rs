use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use orchestrator::broker::{run_worker_pool, LocalBroker, TaskExecutor, WorkerConfig};
use orchestrator::config::{AppConfig, LogFormat};
use orchestrator::hub::HttpHubClient;
use orchestrator::state::{AppState, Stores};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cfg = AppConfig::from_env()?;
    init_tracing(cfg.log_format);
    cfg.ensure_dirs()?;

    let stores = Stores::open(&cfg).context("Failed to open metadata store")?;
    let hub = Arc::new(HttpHubClient::new(cfg.hub_api_url.clone(), cfg.hub_rows_url.clone(), cfg.hub_token.clone()));
    let (broker, queue) = LocalBroker::new();

    let state = Arc::new(AppState::new(cfg.clone(), stores, hub, Arc::new(broker)));

    let executor: Arc<dyn TaskExecutor> = state.jobs.clone();
    let worker_cfg = WorkerConfig {
        max_concurrent: cfg.max_concurrent_jobs,
        hard_timeout: cfg.job_timeout,
        soft_timeout_margin: cfg.soft_timeout_margin,
    };
    tokio::spawn(run_worker_pool(queue, executor, worker_cfg));

    // RECOVERY: jobs interrupted by the previous process
    if let Err(e) = state.jobs.recover_jobs().await {
        warn!("job recovery failed: {e}");
    }

    let app = orchestrator::router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.bind_addr))?;
    info!(addr = %cfg.bind_addr, algorithms = ?cfg.supported_algorithms, "grn-orchestrator listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_current_span(true)).init(),
        LogFormat::Plain => registry.with(fmt::layer()).init(),
    }
}
