pub mod config;
pub mod modules;
pub mod services;

use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use config::Config;
use modules::metrics::metrics_routes;
use modules::polling::polling_routes;
use services::metrics::{metrics_middleware, MetricsRegistry, PollMetricsCollector};
use services::polling::{HttpStatusFetcher, PollRegistry};
use services::rate_limit::{create_rate_limiter, RateLimitLayer};

pub struct AppState {
    pub config: Config,
    pub polls: PollRegistry,
    pub metrics: Arc<MetricsRegistry>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("Failed to initialise metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, StartupError> {
        let http_client = HttpStatusFetcher::build_client(config.http_timeout())?;
        let metrics = MetricsRegistry::new()?;

        let polls = PollRegistry::new(
            http_client,
            config.api_base_url.clone(),
            config.poll_policies.clone(),
        )
        .with_metrics(PollMetricsCollector::new(metrics.clone()))
        .with_retained_finished(config.poll_retained_finished);

        Ok(Self {
            config,
            polls,
            metrics,
        })
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    let rate_limiter = create_rate_limiter(
        state.config.rate_limit_per_minute,
        state.config.rate_limit_burst,
    );

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(metrics_routes())
        .nest("/polls", polling_routes())
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            metrics_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(1024 * 16)) // 16KB max body
        .layer(RateLimitLayer::new(rate_limiter))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "Site Builder Integration Poller"
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
