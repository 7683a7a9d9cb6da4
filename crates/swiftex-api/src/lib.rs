//! swiftex-api: HTTP surface of the exporter.
//!
//! Serves the latest store snapshot as OpenMetrics text. Handlers
//! only read the store; scrapes never trigger collection.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `<metrics_path>` (default `/metrics`) | Prometheus exposition |
//! | GET | `/healthz` | Per-family collection status (JSON) |
//! | GET | `/` | Index page linking to the metrics path |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use swiftex_store::MetricStore;

/// Options for the scrape router.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Path the exposition is served on.
    pub metrics_path: String,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            metrics_path: "/metrics".to_string(),
        }
    }
}

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: MetricStore,
    pub options: Arc<ServeOptions>,
}

/// Build the scrape router.
pub fn build_router(store: MetricStore, options: ServeOptions) -> Router {
    let metrics_path = options.metrics_path.clone();
    let state = ApiState {
        store,
        options: Arc::new(options),
    };

    Router::new()
        .route("/", get(handlers::index))
        .route("/healthz", get(handlers::healthz))
        .route(&metrics_path, get(handlers::prometheus_metrics))
        .with_state(state)
}
