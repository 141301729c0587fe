use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};

use crate::models::HealthResponse;
use crate::services::{HealthService, RequestMetricsService};

/// Shared by the monitoring routes and the request metrics middleware.
#[derive(Debug, Clone, Default)]
pub struct MonitoringState {
    pub health: Arc<HealthService>,
    pub metrics: Arc<RequestMetricsService>,
}

impl MonitoringState {
    pub fn new() -> Self {
        Self::default()
    }
}

pub async fn get_health_status(State(state): State<MonitoringState>) -> Json<HealthResponse> {
    Json(state.health.check())
}

pub async fn get_metrics(State(state): State<MonitoringState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render_prometheus().await,
    )
}
