use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::handlers::MonitoringState;
use crate::models::RequestLabels;

/// Route label for requests no route matched, so unknown paths cannot grow
/// the series map.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Times every request and records it under its matched route template.
pub async fn track_request_metrics(
    State(state): State<MonitoringState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().as_str().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    let started = Instant::now();
    let response = next.run(request).await;
    let elapsed = started.elapsed().as_secs_f64();

    state.metrics
        .record_request(
            RequestLabels { method, route, status_code: response.status().as_u16() },
            elapsed,
        )
        .await;

    response
}
