use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared_database::{resolve_actor, SchedulingContext};
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::scheduling::Consultation;

use crate::models::{
    BookConsultationRequest, CancelConsultationRequest, CompleteConsultationRequest,
    ConsultationListResponse, MyConsultationsQuery, RescheduleConsultationRequest,
    UpdateNotesRequest,
};
use crate::services::ConsultationService;

#[axum::debug_handler]
pub async fn book_consultation(
    State(ctx): State<SchedulingContext>,
    Extension(user): Extension<User>,
    Json(request): Json<BookConsultationRequest>,
) -> Result<(StatusCode, Json<Consultation>), AppError> {
    let actor = resolve_actor(ctx.directory.as_ref(), &user).await?;
    let consultation = ConsultationService::from_context(&ctx).book(&actor, request).await?;

    Ok((StatusCode::CREATED, Json(consultation)))
}

#[axum::debug_handler]
pub async fn list_my_consultations(
    State(ctx): State<SchedulingContext>,
    Extension(user): Extension<User>,
    Query(query): Query<MyConsultationsQuery>,
) -> Result<Json<ConsultationListResponse>, AppError> {
    let actor = resolve_actor(ctx.directory.as_ref(), &user).await?;
    let page = ConsultationService::from_context(&ctx)
        .list_my_consultations(&actor, query)
        .await?;

    Ok(Json(page))
}

#[axum::debug_handler]
pub async fn get_consultation(
    State(ctx): State<SchedulingContext>,
    Path(consultation_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Consultation>, AppError> {
    let actor = resolve_actor(ctx.directory.as_ref(), &user).await?;
    let consultation = ConsultationService::from_context(&ctx)
        .get_consultation(&actor, consultation_id)
        .await?;

    Ok(Json(consultation))
}

#[axum::debug_handler]
pub async fn cancel_consultation(
    State(ctx): State<SchedulingContext>,
    Path(consultation_id): Path<Uuid>,
    Extension(user): Extension<User>,
    request: Option<Json<CancelConsultationRequest>>,
) -> Result<Json<Consultation>, AppError> {
    let actor = resolve_actor(ctx.directory.as_ref(), &user).await?;
    let request = request.map(|Json(body)| body).unwrap_or_default();
    let consultation = ConsultationService::from_context(&ctx)
        .cancel(&actor, consultation_id, request)
        .await?;

    Ok(Json(consultation))
}

#[axum::debug_handler]
pub async fn reschedule_consultation(
    State(ctx): State<SchedulingContext>,
    Path(consultation_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleConsultationRequest>,
) -> Result<Json<Consultation>, AppError> {
    let actor = resolve_actor(ctx.directory.as_ref(), &user).await?;
    let consultation = ConsultationService::from_context(&ctx)
        .reschedule(&actor, consultation_id, request)
        .await?;

    Ok(Json(consultation))
}

#[axum::debug_handler]
pub async fn start_consultation(
    State(ctx): State<SchedulingContext>,
    Path(consultation_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Consultation>, AppError> {
    let actor = resolve_actor(ctx.directory.as_ref(), &user).await?;
    let consultation = ConsultationService::from_context(&ctx)
        .start(&actor, consultation_id)
        .await?;

    Ok(Json(consultation))
}

#[axum::debug_handler]
pub async fn complete_consultation(
    State(ctx): State<SchedulingContext>,
    Path(consultation_id): Path<Uuid>,
    Extension(user): Extension<User>,
    request: Option<Json<CompleteConsultationRequest>>,
) -> Result<Json<Consultation>, AppError> {
    let actor = resolve_actor(ctx.directory.as_ref(), &user).await?;
    let request = request.map(|Json(body)| body).unwrap_or_default();
    let consultation = ConsultationService::from_context(&ctx)
        .complete(&actor, consultation_id, request)
        .await?;

    Ok(Json(consultation))
}

#[axum::debug_handler]
pub async fn update_notes(
    State(ctx): State<SchedulingContext>,
    Path(consultation_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateNotesRequest>,
) -> Result<Json<Consultation>, AppError> {
    let actor = resolve_actor(ctx.directory.as_ref(), &user).await?;
    let consultation = ConsultationService::from_context(&ctx)
        .update_notes(&actor, consultation_id, request)
        .await?;

    Ok(Json(consultation))
}
