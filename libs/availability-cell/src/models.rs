use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::scheduling::{AvailabilitySlot, SlotStatus};

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    pub day_of_week: i32,
    pub start_time: String,
    pub end_time: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateScheduleRequest {
    pub day_of_week: Option<i32>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteScheduleResponse {
    pub id: Uuid,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateSlotsRequest {
    pub start_date: String,
    pub end_date: String,
    #[serde(alias = "slot_duration")]
    pub slot_duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateSlotsResponse {
    pub created: usize,
    /// Candidates that already existed, found either before insertion or by
    /// the store's uniqueness guard.
    pub skipped: usize,
    pub slots: Vec<AvailabilitySlot>,
}

/// Date filters shared by the slot listings. `date` wins over the range.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotQuery {
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Comma-separated statuses, e.g. `available,booked`.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotListResponse {
    pub count: usize,
    pub slots: Vec<AvailabilitySlot>,
}

impl From<Vec<AvailabilitySlot>> for SlotListResponse {
    fn from(slots: Vec<AvailabilitySlot>) -> Self {
        Self { count: slots.len(), slots }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSlotsRequest {
    pub slot_ids: Vec<Uuid>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSlotsResponse {
    pub updated_count: usize,
    pub slots: Vec<AvailabilitySlot>,
    pub skipped_ids: Vec<Uuid>,
}

pub fn parse_status_list(raw: &str) -> Result<Vec<SlotStatus>, AvailabilityError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<SlotStatus>().map_err(AvailabilityError::Validation))
        .collect()
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("{0}")]
    Validation(String),

    #[error("Overlapping schedule exists for the given day")]
    OverlappingSchedule,

    #[error("Schedule not found")]
    ScheduleNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Only doctors can manage availability")]
    NotADoctor,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for AvailabilityError {
    fn from(err: anyhow::Error) -> Self {
        AvailabilityError::DatabaseError(err.to_string())
    }
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        let message = err.to_string();
        match err {
            AvailabilityError::Validation(msg) => AppError::ValidationError(msg),
            AvailabilityError::OverlappingSchedule => AppError::Conflict(message),
            AvailabilityError::ScheduleNotFound | AvailabilityError::DoctorNotFound => {
                AppError::NotFound(message)
            }
            AvailabilityError::NotADoctor => AppError::Forbidden(message),
            AvailabilityError::DatabaseError(detail) => AppError::Internal(detail),
        }
    }
}
