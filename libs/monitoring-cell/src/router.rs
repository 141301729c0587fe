use axum::{routing::get, Router};

use crate::handlers::{self, MonitoringState};

/// Public `/health` and `/metrics`. Pair with `track_request_metrics` on the
/// same `MonitoringState` so `/metrics` sees the traffic.
pub fn monitoring_routes(state: MonitoringState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health_status))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state)
}
