use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_database::SchedulingContext;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn consultation_routes(ctx: SchedulingContext) -> Router {
    Router::new()
        .route("/book", post(handlers::book_consultation))
        .route("/my", get(handlers::list_my_consultations))
        .route("/{consultation_id}", get(handlers::get_consultation))
        .route("/{consultation_id}/cancel", post(handlers::cancel_consultation))
        .route("/{consultation_id}/reschedule", post(handlers::reschedule_consultation))
        .route("/{consultation_id}/start", post(handlers::start_consultation))
        .route("/{consultation_id}/complete", post(handlers::complete_consultation))
        .route("/{consultation_id}/notes", patch(handlers::update_notes))
        .layer(middleware::from_fn_with_state(ctx.config.clone(), auth_middleware))
        .with_state(ctx)
}
