use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::debug;
use uuid::Uuid;

use shared_database::{resolve_actor, SchedulingContext};
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::scheduling::WeeklyAvailabilityWindow;

use crate::models::{
    AvailabilityError, AvailableSlotsQuery, BlockSlotsRequest, BlockSlotsResponse,
    CreateScheduleRequest, DeleteScheduleResponse, GenerateSlotsRequest, GenerateSlotsResponse,
    SlotListResponse, SlotQuery, UpdateScheduleRequest,
};
use crate::services::{SlotService, WeeklyScheduleService};

/// Doctor profile id of the caller; every other role is refused.
async fn caller_doctor_id(ctx: &SchedulingContext, user: &User) -> Result<Uuid, AppError> {
    let actor = resolve_actor(ctx.directory.as_ref(), user).await?;
    actor
        .doctor_id()
        .ok_or_else(|| AvailabilityError::NotADoctor.into())
}

fn slot_service(ctx: &SchedulingContext) -> SlotService {
    SlotService::new(ctx.store.clone(), &ctx.config.scheduling)
}

// ==============================================================================
// WEEKLY SCHEDULE
// ==============================================================================

#[axum::debug_handler]
pub async fn create_schedule(
    State(ctx): State<SchedulingContext>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<WeeklyAvailabilityWindow>), AppError> {
    let doctor_id = caller_doctor_id(&ctx, &user).await?;
    let window = WeeklyScheduleService::new(ctx.store.clone())
        .create_schedule(doctor_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(window)))
}

#[axum::debug_handler]
pub async fn list_schedules(
    State(ctx): State<SchedulingContext>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<WeeklyAvailabilityWindow>>, AppError> {
    let doctor_id = caller_doctor_id(&ctx, &user).await?;
    let windows = WeeklyScheduleService::new(ctx.store.clone())
        .list_schedules(doctor_id)
        .await?;

    Ok(Json(windows))
}

#[axum::debug_handler]
pub async fn update_schedule(
    State(ctx): State<SchedulingContext>,
    Path(schedule_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<WeeklyAvailabilityWindow>, AppError> {
    let doctor_id = caller_doctor_id(&ctx, &user).await?;
    let window = WeeklyScheduleService::new(ctx.store.clone())
        .update_schedule(doctor_id, schedule_id, request)
        .await?;

    Ok(Json(window))
}

#[axum::debug_handler]
pub async fn delete_schedule(
    State(ctx): State<SchedulingContext>,
    Path(schedule_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<DeleteScheduleResponse>, AppError> {
    let doctor_id = caller_doctor_id(&ctx, &user).await?;
    let deleted = WeeklyScheduleService::new(ctx.store.clone())
        .delete_schedule(doctor_id, schedule_id)
        .await?;

    Ok(Json(deleted))
}

// ==============================================================================
// SLOTS
// ==============================================================================

#[axum::debug_handler]
pub async fn generate_slots(
    State(ctx): State<SchedulingContext>,
    Extension(user): Extension<User>,
    Json(request): Json<GenerateSlotsRequest>,
) -> Result<(StatusCode, Json<GenerateSlotsResponse>), AppError> {
    let doctor_id = caller_doctor_id(&ctx, &user).await?;
    let generated = slot_service(&ctx).generate_slots(doctor_id, request).await?;

    Ok((StatusCode::CREATED, Json(generated)))
}

#[axum::debug_handler]
pub async fn list_slots(
    State(ctx): State<SchedulingContext>,
    Extension(user): Extension<User>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<SlotListResponse>, AppError> {
    let doctor_id = caller_doctor_id(&ctx, &user).await?;
    let slots = slot_service(&ctx).list_slots(doctor_id, query).await?;

    Ok(Json(slots))
}

#[axum::debug_handler]
pub async fn block_slots(
    State(ctx): State<SchedulingContext>,
    Extension(user): Extension<User>,
    Json(request): Json<BlockSlotsRequest>,
) -> Result<Json<BlockSlotsResponse>, AppError> {
    let doctor_id = caller_doctor_id(&ctx, &user).await?;
    let blocked = slot_service(&ctx).block_slots(doctor_id, request).await?;

    Ok(Json(blocked))
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctor_available_slots(
    State(ctx): State<SchedulingContext>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<SlotListResponse>, AppError> {
    debug!("Listing available slots for doctor {}", doctor_id);

    let doctor = ctx.directory
        .find_doctor(doctor_id)
        .await
        .map_err(AvailabilityError::from)?;
    if doctor.is_none() {
        return Err(AvailabilityError::DoctorNotFound.into());
    }

    let slots = slot_service(&ctx).list_available_slots(doctor_id, query).await?;
    Ok(Json(slots))
}
