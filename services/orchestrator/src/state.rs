use std::sync::Arc;

use grnops::RunnerRegistry;
use metastore::{JsonCollectionFile, JsonDirStore, Repository};

use crate::broker::TaskBroker;
use crate::config::AppConfig;
use crate::dataset_registry::DatasetRegistry;
use crate::dispatch::Dispatcher;
use crate::error::GrnError;
use crate::hub::HubClient;
use crate::job_lifecycle::JobManager;
use crate::results_registry::ResultsRegistry;
use crate::store_exec::shared;
use crate::types_datasets::DatasetRecord;
use crate::types_jobs::JobRecord;
use crate::types_results::ResultRecord;

pub const DATASETS_FILE: &str = "datasets_metadata.json";
pub const RESULTS_FILE: &str = "results_metadata.json";

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: AppConfig,
    pub datasets: DatasetRegistry,
    pub jobs: Arc<JobManager>,
    pub results: ResultsRegistry,
}

/// The three collections backing the registries.
pub struct Stores {
    pub datasets: Box<dyn Repository<DatasetRecord>>,
    pub jobs: Box<dyn Repository<JobRecord>>,
    pub results: Box<dyn Repository<ResultRecord>>,
}

impl Stores {
    /// Datasets and results as whole-collection JSON documents, jobs as one
    /// file per record.
    pub fn open(config: &AppConfig) -> Result<Self, GrnError> {
        Ok(Self {
            datasets: Box::new(JsonCollectionFile::<DatasetRecord>::open(config.datasets_dir.join(DATASETS_FILE))?),
            jobs: Box::new(JsonDirStore::<JobRecord>::open(&config.jobs_dir)?),
            results: Box::new(JsonCollectionFile::<ResultRecord>::open(config.results_dir.join(RESULTS_FILE))?),
        })
    }
}

impl AppState {
    pub fn new(config: AppConfig, stores: Stores, hub: Arc<dyn HubClient>, broker: Arc<dyn TaskBroker>) -> Self {
        let registry = Arc::new(RunnerRegistry::with_defaults(&config.supported_algorithms, &config.tools));
        let dispatcher = Dispatcher::new(registry, hub.clone(), config.results_dir.clone());

        let datasets = DatasetRegistry::new(shared(stores.datasets), hub);
        let results = ResultsRegistry::new(shared(stores.results), config.results_dir.clone());
        let jobs = Arc::new(JobManager::new(
            shared(stores.jobs),
            datasets.clone(),
            results.clone(),
            broker,
            dispatcher,
        ));

        Self { config, datasets, jobs, results }
    }
}
