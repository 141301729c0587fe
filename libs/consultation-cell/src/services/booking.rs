use std::sync::Arc;

use chrono::{Local, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_database::store::{
    Cancellation, CommitOutcome, Completion, ConsultationFilter, DoctorDirectory, NewConsultation,
    Reschedule, SchedulingStore,
};
use shared_database::SchedulingContext;
use shared_models::auth::Actor;
use shared_models::scheduling::{
    AvailabilitySlot, Consultation, ConsultationStatus, DEFAULT_CONSULTATION_FEE,
};

use crate::models::{
    BookConsultationRequest, CancelConsultationRequest, CompleteConsultationRequest,
    ConsultationError, ConsultationListResponse, MyConsultationsQuery,
    RescheduleConsultationRequest, UpdateNotesRequest,
};
use crate::services::lifecycle::ConsultationLifecycleService;
use crate::services::numbering::format_consultation_number;

/// Booking and lifecycle operations for consultations. Every state change
/// goes through one guarded store commit; this service only decides whether
/// the caller may attempt it.
pub struct ConsultationService {
    store: Arc<dyn SchedulingStore>,
    directory: Arc<dyn DoctorDirectory>,
    lifecycle: ConsultationLifecycleService,
    config: SchedulingConfig,
}

impl ConsultationService {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        directory: Arc<dyn DoctorDirectory>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            store,
            directory,
            lifecycle: ConsultationLifecycleService::new(),
            config,
        }
    }

    pub fn from_context(ctx: &SchedulingContext) -> Self {
        Self::new(ctx.store.clone(), ctx.directory.clone(), ctx.config.scheduling.clone())
    }

    // ==============================================================================
    // BOOKING
    // ==============================================================================

    #[instrument(skip(self, request), fields(slot_id = %request.slot_id))]
    pub async fn book(&self, actor: &Actor, request: BookConsultationRequest)
        -> Result<Consultation, ConsultationError> {
        let Actor::Patient { user_id: patient_id } = *actor else {
            return Err(ConsultationError::Forbidden);
        };

        let slot = self.bookable_slot(request.slot_id).await?;

        let consultation_fee = match self.directory.find_doctor(slot.doctor_id).await? {
            Some(doctor) => doctor.consultation_fee,
            None => {
                warn!("No doctor profile for {}, using default fee", slot.doctor_id);
                DEFAULT_CONSULTATION_FEE
            }
        };

        let booking_day = Local::now().date_naive();
        let sequence = self.store.next_consultation_sequence(booking_day).await?;
        let consultation_number =
            format_consultation_number(&self.config.consultation_number_prefix, booking_day, sequence);

        let outcome = self.store
            .commit_booking(NewConsultation {
                consultation_number,
                patient_id,
                doctor_id: slot.doctor_id,
                slot_id: slot.id,
                consultation_type: request.consultation_type.unwrap_or_default(),
                consultation_fee,
                chief_complaint: request.chief_complaint,
                symptoms: request.symptoms,
                booked_at: Utc::now(),
            })
            .await?;

        match outcome {
            CommitOutcome::Committed(consultation) => {
                info!(
                    "Booked consultation {} for patient {} on slot {}",
                    consultation.consultation_number, patient_id, slot.id
                );
                Ok(consultation)
            }
            CommitOutcome::SlotUnavailable | CommitOutcome::StaleStatus => {
                debug!("Slot {} was taken before the booking committed", slot.id);
                Err(ConsultationError::SlotNotAvailable)
            }
        }
    }

    /// Loads a slot and checks it can take a booking right now.
    async fn bookable_slot(&self, slot_id: Uuid) -> Result<AvailabilitySlot, ConsultationError> {
        let slot = self.store
            .find_slot(slot_id)
            .await?
            .ok_or(ConsultationError::SlotNotFound)?;

        if !slot.is_bookable() {
            return Err(ConsultationError::SlotNotAvailable);
        }
        if slot.slot_start_time <= Utc::now() {
            return Err(ConsultationError::PastSlot);
        }

        Ok(slot)
    }

    // ==============================================================================
    // QUERIES
    // ==============================================================================

    pub async fn list_my_consultations(&self, actor: &Actor, query: MyConsultationsQuery)
        -> Result<ConsultationListResponse, ConsultationError> {
        let mut filter = match *actor {
            Actor::Patient { user_id } => ConsultationFilter { patient_id: Some(user_id), ..Default::default() },
            Actor::Doctor { doctor_id, .. } => ConsultationFilter { doctor_id: Some(doctor_id), ..Default::default() },
            Actor::Admin { .. } => return Err(ConsultationError::Forbidden),
        };

        if let Some(status) = query.status.as_deref().filter(|s| !s.trim().is_empty()) {
            filter.status = Some(status.parse().map_err(ConsultationError::Validation)?);
        }

        let (page, limit) = self.config.clamp_page(query.page, query.limit);
        let offset = (page - 1).saturating_mul(limit);
        let result = self.store.list_consultations(&filter, offset, limit).await?;

        Ok(ConsultationListResponse {
            page,
            limit,
            total: result.total,
            items: result.items,
        })
    }

    pub async fn get_consultation(&self, actor: &Actor, consultation_id: Uuid)
        -> Result<Consultation, ConsultationError> {
        let consultation = self.load(consultation_id).await?;
        authorize_participant(actor, &consultation)?;
        Ok(consultation)
    }

    async fn load(&self, consultation_id: Uuid) -> Result<Consultation, ConsultationError> {
        self.store
            .find_consultation(consultation_id)
            .await?
            .ok_or(ConsultationError::NotFound)
    }

    // ==============================================================================
    // LIFECYCLE
    // ==============================================================================

    #[instrument(skip(self, request))]
    pub async fn cancel(
        &self,
        actor: &Actor,
        consultation_id: Uuid,
        request: CancelConsultationRequest,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.load(consultation_id).await?;
        authorize_participant(actor, &consultation)?;
        self.lifecycle
            .validate_status_transition(consultation.status, ConsultationStatus::Cancelled)?;

        let outcome = self.store
            .commit_cancellation(Cancellation {
                consultation_id,
                expected_status: consultation.status,
                reason: request.reason,
                cancelled_at: Utc::now(),
            })
            .await?;

        let cancelled = expect_committed(outcome)?;
        info!("Consultation {} cancelled by {:?}", consultation_id, actor.role());
        Ok(cancelled)
    }

    #[instrument(skip(self, request), fields(new_slot_id = %request.new_slot_id))]
    pub async fn reschedule(
        &self,
        actor: &Actor,
        consultation_id: Uuid,
        request: RescheduleConsultationRequest,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.load(consultation_id).await?;
        authorize_participant(actor, &consultation)?;

        // only a booked, not yet started consultation can move
        if consultation.status != ConsultationStatus::Scheduled {
            warn!("Reschedule refused for consultation {} in status {}", consultation_id, consultation.status);
            return Err(ConsultationError::InvalidStatusTransition(consultation.status));
        }

        let new_slot = self.bookable_slot(request.new_slot_id).await?;
        if new_slot.doctor_id != consultation.doctor_id {
            return Err(ConsultationError::DoctorMismatch);
        }

        if let Some(reason) = request.reason.as_deref() {
            info!("Rescheduling consultation {}: {}", consultation_id, reason);
        }

        let outcome = self.store
            .commit_reschedule(Reschedule {
                consultation_id,
                new_slot_id: new_slot.id,
                expected_status: consultation.status,
                rescheduled_at: Utc::now(),
            })
            .await?;

        match outcome {
            CommitOutcome::Committed(rescheduled) => {
                info!("Consultation {} moved to slot {}", consultation_id, new_slot.id);
                Ok(rescheduled)
            }
            CommitOutcome::SlotUnavailable => Err(ConsultationError::SlotNotAvailable),
            CommitOutcome::StaleStatus => Err(ConsultationError::StatusChanged),
        }
    }

    #[instrument(skip(self))]
    pub async fn start(&self, actor: &Actor, consultation_id: Uuid)
        -> Result<Consultation, ConsultationError> {
        let consultation = self.load(consultation_id).await?;
        authorize_treating_doctor(actor, &consultation)?;
        self.lifecycle
            .validate_status_transition(consultation.status, ConsultationStatus::InProgress)?;

        let started = expect_committed(self.store.commit_start(consultation_id, Utc::now()).await?)?;
        info!("Consultation {} started", consultation_id);
        Ok(started)
    }

    #[instrument(skip(self, request))]
    pub async fn complete(
        &self,
        actor: &Actor,
        consultation_id: Uuid,
        request: CompleteConsultationRequest,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.load(consultation_id).await?;
        authorize_treating_doctor(actor, &consultation)?;
        self.lifecycle
            .validate_status_transition(consultation.status, ConsultationStatus::Completed)?;

        let outcome = self.store
            .commit_completion(Completion {
                consultation_id,
                expected_status: consultation.status,
                diagnosis: request.diagnosis,
                doctor_notes: request.doctor_notes,
                follow_up_required: request.follow_up_required,
                follow_up_date: request.follow_up_date,
                completed_at: Utc::now(),
            })
            .await?;

        let completed = expect_committed(outcome)?;
        info!("Consultation {} completed", consultation_id);
        Ok(completed)
    }

    pub async fn update_notes(
        &self,
        actor: &Actor,
        consultation_id: Uuid,
        request: UpdateNotesRequest,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.load(consultation_id).await?;
        authorize_treating_doctor(actor, &consultation)?;
        if !self.lifecycle.can_edit_notes(consultation.status) {
            return Err(ConsultationError::InvalidStatusTransition(consultation.status));
        }

        let outcome = self.store
            .update_consultation_notes(consultation_id, request.doctor_notes)
            .await?;
        expect_committed(outcome)
    }
}

// ==============================================================================
// AUTHORIZATION
// ==============================================================================

/// Patient who booked, the consultation's doctor, or an admin.
fn authorize_participant(actor: &Actor, consultation: &Consultation) -> Result<(), ConsultationError> {
    let allowed = match *actor {
        Actor::Patient { user_id } => consultation.patient_id == user_id,
        Actor::Doctor { doctor_id, .. } => consultation.doctor_id == doctor_id,
        Actor::Admin { .. } => true,
    };

    if allowed {
        Ok(())
    } else {
        debug!("{:?} denied access to consultation {}", actor.role(), consultation.id);
        Err(ConsultationError::Forbidden)
    }
}

fn authorize_treating_doctor(actor: &Actor, consultation: &Consultation) -> Result<(), ConsultationError> {
    match actor.doctor_id() {
        Some(doctor_id) if doctor_id == consultation.doctor_id => Ok(()),
        _ => Err(ConsultationError::Forbidden),
    }
}

/// A status guard miss after validation means another writer got there first.
fn expect_committed(outcome: CommitOutcome<Consultation>) -> Result<Consultation, ConsultationError> {
    outcome.committed().ok_or(ConsultationError::StatusChanged)
}
