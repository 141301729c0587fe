use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use shared_models::scheduling::{
    AvailabilitySlot, Consultation, ConsultationStatus, ConsultationType, DoctorProfile,
    SlotStatus, WeeklyAvailabilityWindow,
};

/// Result of a guarded write. A guard miss is not an error at this layer;
/// callers decide how a lost race surfaces.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome<T> {
    Committed(T),
    /// The slot was not AVAILABLE when the transaction looked at it.
    SlotUnavailable,
    /// The consultation was no longer in the status the caller read.
    StaleStatus,
}

impl<T> CommitOutcome<T> {
    pub fn committed(self) -> Option<T> {
        match self {
            CommitOutcome::Committed(value) => Some(value),
            _ => None,
        }
    }
}

// ==============================================================================
// WRITE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct NewWindow {
    pub doctor_id: Uuid,
    pub day_of_week: i32,
    pub start_time: String,
    pub end_time: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WindowChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSlot {
    pub doctor_id: Uuid,
    pub slot_start_time: DateTime<Utc>,
    pub slot_end_time: DateTime<Utc>,
}

/// Booking request handed to the store. Scheduled times are copied from the
/// slot inside the transaction, never from the caller.
#[derive(Debug, Clone, Serialize)]
pub struct NewConsultation {
    pub consultation_number: String,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub slot_id: Uuid,
    pub consultation_type: ConsultationType,
    pub consultation_fee: f64,
    pub chief_complaint: Option<String>,
    pub symptoms: Option<Value>,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Cancellation {
    pub consultation_id: Uuid,
    pub expected_status: ConsultationStatus,
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reschedule {
    pub consultation_id: Uuid,
    pub new_slot_id: Uuid,
    pub expected_status: ConsultationStatus,
    pub rescheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub consultation_id: Uuid,
    pub expected_status: ConsultationStatus,
    pub diagnosis: Option<String>,
    pub doctor_notes: Option<String>,
    pub follow_up_required: Option<bool>,
    pub follow_up_date: Option<NaiveDate>,
    pub completed_at: DateTime<Utc>,
}

// ==============================================================================
// QUERY MODELS
// ==============================================================================

/// Slot query. Bounds apply to `slot_start_time` and are inclusive.
#[derive(Debug, Clone, Default)]
pub struct SlotFilter {
    pub doctor_id: Uuid,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub statuses: Vec<SlotStatus>,
    pub limit: Option<u32>,
}

impl SlotFilter {
    pub fn for_doctor(doctor_id: Uuid) -> Self {
        Self { doctor_id, ..Default::default() }
    }

    pub fn matches(&self, slot: &AvailabilitySlot) -> bool {
        slot.doctor_id == self.doctor_id
            && self.from.map_or(true, |from| slot.slot_start_time >= from)
            && self.to.map_or(true, |to| slot.slot_start_time <= to)
            && (self.statuses.is_empty() || self.statuses.contains(&slot.status))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConsultationFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<ConsultationStatus>,
}

impl ConsultationFilter {
    pub fn matches(&self, consultation: &Consultation) -> bool {
        self.patient_id.map_or(true, |id| consultation.patient_id == id)
            && self.doctor_id.map_or(true, |id| consultation.doctor_id == id)
            && self.status.map_or(true, |status| consultation.status == status)
    }
}

#[derive(Debug, Clone)]
pub struct ConsultationPage {
    pub items: Vec<Consultation>,
    pub total: u64,
}

// ==============================================================================
// TRAITS
// ==============================================================================

/// Transactional persistence for windows, slots and consultations.
///
/// Every `commit_*` method performs its read-check-write inside one
/// transaction. Implementations must never report `Committed` for a write
/// whose guard did not hold.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn insert_window(&self, window: NewWindow) -> Result<WeeklyAvailabilityWindow>;

    async fn find_window(&self, window_id: Uuid) -> Result<Option<WeeklyAvailabilityWindow>>;

    /// Ordered by day of week, then start time.
    async fn list_windows(&self, doctor_id: Uuid, active_only: bool)
        -> Result<Vec<WeeklyAvailabilityWindow>>;

    /// First active window of the doctor on `day_of_week` overlapping
    /// `[start_time, end_time)`. Times are zero-padded "HH:MM".
    async fn find_overlapping_window(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
        start_time: &str,
        end_time: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<Option<WeeklyAvailabilityWindow>>;

    async fn update_window(&self, window_id: Uuid, changes: WindowChanges)
        -> Result<Option<WeeklyAvailabilityWindow>>;

    /// Returns false when nothing was deleted.
    async fn delete_window(&self, window_id: Uuid) -> Result<bool>;

    async fn find_slot(&self, slot_id: Uuid) -> Result<Option<AvailabilitySlot>>;

    /// Ordered by slot start ascending.
    async fn list_slots(&self, filter: &SlotFilter) -> Result<Vec<AvailabilitySlot>>;

    /// Inserts AVAILABLE slots as one atomic batch. Rows colliding with an
    /// existing (doctor_id, slot_start_time) are dropped; only the rows
    /// actually inserted are returned.
    async fn insert_slots(&self, slots: &[NewSlot]) -> Result<Vec<AvailabilitySlot>>;

    /// AVAILABLE -> CANCELLED for a slot owned by `doctor_id`. `None` when the
    /// guard did not match.
    async fn block_slot(&self, doctor_id: Uuid, slot_id: Uuid) -> Result<Option<AvailabilitySlot>>;

    /// Atomically increments and returns the consultation counter for `day`.
    async fn next_consultation_sequence(&self, day: NaiveDate) -> Result<u32>;

    async fn find_consultation(&self, consultation_id: Uuid) -> Result<Option<Consultation>>;

    /// Ordered by scheduled start descending.
    async fn list_consultations(&self, filter: &ConsultationFilter, offset: u32, limit: u32)
        -> Result<ConsultationPage>;

    async fn commit_booking(&self, booking: NewConsultation) -> Result<CommitOutcome<Consultation>>;

    async fn commit_cancellation(&self, cancellation: Cancellation)
        -> Result<CommitOutcome<Consultation>>;

    async fn commit_reschedule(&self, reschedule: Reschedule) -> Result<CommitOutcome<Consultation>>;

    /// SCHEDULED -> IN_PROGRESS.
    async fn commit_start(&self, consultation_id: Uuid, started_at: DateTime<Utc>)
        -> Result<CommitOutcome<Consultation>>;

    async fn commit_completion(&self, completion: Completion) -> Result<CommitOutcome<Consultation>>;

    /// Refused with `StaleStatus` once the consultation is cancelled.
    async fn update_consultation_notes(&self, consultation_id: Uuid, doctor_notes: Option<String>)
        -> Result<CommitOutcome<Consultation>>;
}

/// Read-only view of doctor profiles owned by the identity subsystem.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn find_doctor_by_user(&self, user_id: Uuid) -> Result<Option<DoctorProfile>>;

    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<DoctorProfile>>;
}
