//! GRN job-submission service: dataset registry, job lifecycle, algorithm
//! dispatch, results registry and the HTTP API over them.

pub mod broker;
pub mod config;
pub mod dataset_registry;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod job_lifecycle;
pub mod results_registry;
pub mod routes_datasets;
pub mod routes_health;
pub mod routes_jobs;
pub mod routes_results;
pub mod state;
pub mod store_exec;
pub mod types;
pub mod types_datasets;
pub mod types_jobs;
pub mod types_results;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::state::SharedState;

pub fn router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let datasets = Router::new()
        .route("/", post(routes_datasets::create_dataset).get(routes_datasets::list_datasets))
        .route(
            "/:id",
            get(routes_datasets::get_dataset)
                .patch(routes_datasets::update_dataset)
                .delete(routes_datasets::delete_dataset),
        )
        .route("/:id/schema", get(routes_datasets::get_schema));

    let jobs = Router::new()
        .route("/", post(routes_jobs::create_job).get(routes_jobs::list_jobs))
        .route("/:id", get(routes_jobs::get_job).delete(routes_jobs::cancel_job))
        .route("/:id/logs", get(routes_jobs::get_job_logs))
        .route("/:id/cancel", post(routes_jobs::request_cancel));

    let results = Router::new()
        .route("/", get(routes_results::list_results))
        .route("/:id", get(routes_results::get_result).delete(routes_results::delete_result))
        .route("/:id/files", get(routes_results::list_result_files))
        .route("/:id/download/:filename", get(routes_results::download_file));

    Router::new()
        .route("/", get(routes_health::root))
        .route("/health", get(routes_health::health))
        .nest("/api/datasets", datasets)
        .nest("/api/jobs", jobs)
        .nest("/api/results", results)
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}
