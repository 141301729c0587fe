use axum::{middleware, routing::get, Router};

use availability_cell::availability_routes;
use consultation_cell::consultation_routes;
use monitoring_cell::{monitoring_routes, track_request_metrics, MonitoringState};
use shared_database::SchedulingContext;

pub fn create_router(context: SchedulingContext) -> Router {
    let monitoring = MonitoringState::new();

    Router::new()
        .route("/", get(|| async { "Telehealth scheduling API is running!" }))
        .nest("/availability", availability_routes(context.clone()))
        .nest("/consultations", consultation_routes(context))
        .merge(monitoring_routes(monitoring.clone()))
        .layer(middleware::from_fn_with_state(monitoring, track_request_metrics))
}
