use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::scheduling::{Consultation, ConsultationStatus, ConsultationType};

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookConsultationRequest {
    pub slot_id: Uuid,
    pub consultation_type: Option<ConsultationType>,
    pub chief_complaint: Option<String>,
    pub symptoms: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelConsultationRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleConsultationRequest {
    pub new_slot_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteConsultationRequest {
    pub diagnosis: Option<String>,
    pub doctor_notes: Option<String>,
    pub follow_up_required: Option<bool>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNotesRequest {
    pub doctor_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MyConsultationsQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationListResponse {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub items: Vec<Consultation>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConsultationError {
    #[error("Consultation not found")]
    NotFound,

    #[error("Slot not found")]
    SlotNotFound,

    #[error("Slot not available")]
    SlotNotAvailable,

    #[error("Cannot book a past slot")]
    PastSlot,

    #[error("New slot belongs to a different doctor")]
    DoctorMismatch,

    #[error("Not allowed to access this consultation")]
    Forbidden,

    #[error("Consultation cannot be modified in current status: {0}")]
    InvalidStatusTransition(ConsultationStatus),

    #[error("Consultation status changed while the request was processed")]
    StatusChanged,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for ConsultationError {
    fn from(err: anyhow::Error) -> Self {
        ConsultationError::DatabaseError(err.to_string())
    }
}

impl From<ConsultationError> for AppError {
    fn from(err: ConsultationError) -> Self {
        let message = err.to_string();
        match err {
            ConsultationError::NotFound | ConsultationError::SlotNotFound => {
                AppError::NotFound(message)
            }
            ConsultationError::SlotNotAvailable => AppError::Conflict(message),
            ConsultationError::PastSlot | ConsultationError::DoctorMismatch => {
                AppError::ValidationError(message)
            }
            ConsultationError::Validation(msg) => AppError::ValidationError(msg),
            ConsultationError::Forbidden => AppError::Forbidden(message),
            ConsultationError::InvalidStatusTransition(_) | ConsultationError::StatusChanged => {
                AppError::InvalidState(message)
            }
            ConsultationError::DatabaseError(detail) => AppError::Internal(detail),
        }
    }
}
