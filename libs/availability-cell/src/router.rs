use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_database::SchedulingContext;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn availability_routes(ctx: SchedulingContext) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/doctor/{doctor_id}", get(handlers::get_doctor_available_slots));

    // Doctor-only routes
    let protected_routes = Router::new()
        .route("/schedule", post(handlers::create_schedule).get(handlers::list_schedules))
        .route(
            "/schedule/{schedule_id}",
            put(handlers::update_schedule).delete(handlers::delete_schedule),
        )
        .route("/slots/generate", post(handlers::generate_slots))
        .route("/slots", get(handlers::list_slots))
        .route("/block", post(handlers::block_slots))
        .layer(middleware::from_fn_with_state(ctx.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(ctx)
}
