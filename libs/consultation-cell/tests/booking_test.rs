use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use consultation_cell::models::{
    BookConsultationRequest, CancelConsultationRequest, CompleteConsultationRequest,
    ConsultationError, MyConsultationsQuery, RescheduleConsultationRequest, UpdateNotesRequest,
};
use consultation_cell::services::ConsultationService;
use shared_database::store::{NewSlot, SchedulingStore};
use shared_models::auth::Actor;
use shared_models::scheduling::{
    AvailabilitySlot, ConsultationStatus, ConsultationType, SlotStatus, DEFAULT_CONSULTATION_FEE,
};
use shared_utils::test_utils::{SchedulingFixture, TestUser};

struct Clinic {
    fixture: SchedulingFixture,
    service: ConsultationService,
    doctor: Actor,
    patient: Actor,
}

impl Clinic {
    async fn new() -> Self {
        let fixture = SchedulingFixture::new();
        let doctor_user = TestUser::doctor("doc@example.com");
        let doctor_id = fixture.register_doctor(&doctor_user, 650.0).await;
        let service = ConsultationService::from_context(&fixture.context);

        Self {
            service,
            doctor: Actor::Doctor { user_id: doctor_user.uuid(), doctor_id },
            patient: Actor::Patient { user_id: Uuid::new_v4() },
            fixture,
        }
    }

    fn doctor_id(&self) -> Uuid {
        self.doctor.doctor_id().unwrap()
    }

    async fn slot_at(&self, doctor_id: Uuid, offset: Duration) -> AvailabilitySlot {
        let start = Utc::now() + offset;
        self.fixture.store
            .insert_slots(&[NewSlot {
                doctor_id,
                slot_start_time: start,
                slot_end_time: start + Duration::minutes(30),
            }])
            .await
            .unwrap()
            .remove(0)
    }

    async fn open_slot(&self, hours_ahead: i64) -> AvailabilitySlot {
        self.slot_at(self.doctor_id(), Duration::hours(hours_ahead)).await
    }

    async fn book(&self, patient: &Actor, slot_id: Uuid) -> Result<shared_models::scheduling::Consultation, ConsultationError> {
        self.service
            .book(patient, BookConsultationRequest {
                slot_id,
                consultation_type: None,
                chief_complaint: Some("headache".to_string()),
                symptoms: None,
            })
            .await
    }

    async fn slot_status(&self, slot_id: Uuid) -> SlotStatus {
        self.fixture.store.find_slot(slot_id).await.unwrap().unwrap().status
    }
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[tokio::test]
async fn booking_an_open_slot_creates_a_scheduled_consultation() {
    let clinic = Clinic::new().await;
    let slot = clinic.open_slot(24).await;

    let consultation = clinic.book(&clinic.patient, slot.id).await.unwrap();

    assert_eq!(consultation.status, ConsultationStatus::Scheduled);
    assert_eq!(consultation.patient_id, clinic.patient.user_id());
    assert_eq!(consultation.doctor_id, clinic.doctor_id());
    assert_eq!(consultation.slot_id, Some(slot.id));
    assert_eq!(consultation.scheduled_start_time, slot.slot_start_time);
    assert_eq!(consultation.scheduled_end_time, slot.slot_end_time);
    assert_eq!(consultation.consultation_type, ConsultationType::Video);
    assert_eq!(consultation.consultation_fee, 650.0);

    let number = &consultation.consultation_number;
    assert!(number.starts_with("CONS"));
    assert!(NaiveDate::parse_from_str(&number[4..12], "%Y%m%d").is_ok());
    assert!(number.ends_with("001"));

    let booked = clinic.fixture.store.find_slot(slot.id).await.unwrap().unwrap();
    assert_eq!(booked.status, SlotStatus::Booked);
    assert_eq!(booked.consultation_id, Some(consultation.id));

    let other_patient = Actor::Patient { user_id: Uuid::new_v4() };
    assert_matches!(
        clinic.book(&other_patient, slot.id).await,
        Err(ConsultationError::SlotNotAvailable)
    );
}

#[tokio::test]
async fn booking_rejects_missing_past_and_blocked_slots() {
    let clinic = Clinic::new().await;

    assert_matches!(
        clinic.book(&clinic.patient, Uuid::new_v4()).await,
        Err(ConsultationError::SlotNotFound)
    );

    let past = clinic.slot_at(clinic.doctor_id(), Duration::hours(-2)).await;
    assert_matches!(clinic.book(&clinic.patient, past.id).await, Err(ConsultationError::PastSlot));

    let blocked = clinic.open_slot(30).await;
    clinic.fixture.store.block_slot(clinic.doctor_id(), blocked.id).await.unwrap();
    assert_matches!(
        clinic.book(&clinic.patient, blocked.id).await,
        Err(ConsultationError::SlotNotAvailable)
    );
}

#[tokio::test]
async fn only_patients_book() {
    let clinic = Clinic::new().await;
    let slot = clinic.open_slot(24).await;

    assert_matches!(clinic.book(&clinic.doctor, slot.id).await, Err(ConsultationError::Forbidden));
    let admin = Actor::Admin { user_id: Uuid::new_v4() };
    assert_matches!(clinic.book(&admin, slot.id).await, Err(ConsultationError::Forbidden));
    assert_eq!(clinic.slot_status(slot.id).await, SlotStatus::Available);
}

#[tokio::test]
async fn unknown_doctor_profile_falls_back_to_default_fee() {
    let clinic = Clinic::new().await;
    let slot = clinic.slot_at(Uuid::new_v4(), Duration::hours(12)).await;

    let consultation = clinic.book(&clinic.patient, slot.id).await.unwrap();
    assert_eq!(consultation.consultation_fee, DEFAULT_CONSULTATION_FEE);
}

#[tokio::test]
async fn consultation_numbers_increase_within_a_day() {
    let clinic = Clinic::new().await;
    let first = clinic.book(&clinic.patient, clinic.open_slot(10).await.id).await.unwrap();
    let second = clinic.book(&clinic.patient, clinic.open_slot(11).await.id).await.unwrap();

    assert!(first.consultation_number.ends_with("001"));
    assert!(second.consultation_number.ends_with("002"));
}

// ==============================================================================
// CANCELLATION
// ==============================================================================

#[tokio::test]
async fn cancelling_frees_the_slot_for_someone_else() {
    let clinic = Clinic::new().await;
    let slot = clinic.open_slot(24).await;
    let consultation = clinic.book(&clinic.patient, slot.id).await.unwrap();

    let cancelled = clinic.service
        .cancel(&clinic.patient, consultation.id, CancelConsultationRequest { reason: Some("travel".into()) })
        .await
        .unwrap();

    assert_eq!(cancelled.status, ConsultationStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("travel"));
    assert_eq!(cancelled.slot_id, None);

    let freed = clinic.fixture.store.find_slot(slot.id).await.unwrap().unwrap();
    assert_eq!(freed.status, SlotStatus::Available);
    assert_eq!(freed.consultation_id, None);

    let other_patient = Actor::Patient { user_id: Uuid::new_v4() };
    clinic.book(&other_patient, slot.id).await.unwrap();

    assert_matches!(
        clinic.service.cancel(&clinic.patient, consultation.id, CancelConsultationRequest::default()).await,
        Err(ConsultationError::InvalidStatusTransition(ConsultationStatus::Cancelled))
    );
}

#[tokio::test]
async fn completed_consultations_cannot_be_cancelled() {
    let clinic = Clinic::new().await;
    let consultation = clinic.book(&clinic.patient, clinic.open_slot(24).await.id).await.unwrap();
    clinic.service
        .complete(&clinic.doctor, consultation.id, CompleteConsultationRequest::default())
        .await
        .unwrap();

    assert_matches!(
        clinic.service.cancel(&clinic.patient, consultation.id, CancelConsultationRequest::default()).await,
        Err(ConsultationError::InvalidStatusTransition(ConsultationStatus::Completed))
    );
}

#[tokio::test]
async fn cancellation_requires_a_participant() {
    let clinic = Clinic::new().await;
    let consultation = clinic.book(&clinic.patient, clinic.open_slot(24).await.id).await.unwrap();

    let stranger = Actor::Patient { user_id: Uuid::new_v4() };
    assert_matches!(
        clinic.service.cancel(&stranger, consultation.id, CancelConsultationRequest::default()).await,
        Err(ConsultationError::Forbidden)
    );

    let other_doctor = Actor::Doctor { user_id: Uuid::new_v4(), doctor_id: Uuid::new_v4() };
    assert_matches!(
        clinic.service.cancel(&other_doctor, consultation.id, CancelConsultationRequest::default()).await,
        Err(ConsultationError::Forbidden)
    );

    assert_matches!(
        clinic.service.cancel(&clinic.patient, Uuid::new_v4(), CancelConsultationRequest::default()).await,
        Err(ConsultationError::NotFound)
    );

    // the treating doctor and admins may cancel
    let admin = Actor::Admin { user_id: Uuid::new_v4() };
    let cancelled = clinic.service
        .cancel(&admin, consultation.id, CancelConsultationRequest::default())
        .await
        .unwrap();
    assert_eq!(cancelled.status, ConsultationStatus::Cancelled);
}

#[tokio::test]
async fn in_progress_consultations_can_still_be_cancelled() {
    let clinic = Clinic::new().await;
    let slot = clinic.open_slot(24).await;
    let consultation = clinic.book(&clinic.patient, slot.id).await.unwrap();
    clinic.service.start(&clinic.doctor, consultation.id).await.unwrap();

    let cancelled = clinic.service
        .cancel(&clinic.doctor, consultation.id, CancelConsultationRequest::default())
        .await
        .unwrap();
    assert_eq!(cancelled.status, ConsultationStatus::Cancelled);
    assert_eq!(clinic.slot_status(slot.id).await, SlotStatus::Available);
}

// ==============================================================================
// RESCHEDULING
// ==============================================================================

#[tokio::test]
async fn rescheduling_moves_the_booking_between_slots() {
    let clinic = Clinic::new().await;
    let old_slot = clinic.open_slot(24).await;
    let new_slot = clinic.open_slot(48).await;
    let consultation = clinic.book(&clinic.patient, old_slot.id).await.unwrap();

    let moved = clinic.service
        .reschedule(&clinic.patient, consultation.id, RescheduleConsultationRequest {
            new_slot_id: new_slot.id,
            reason: Some("conflict at work".into()),
        })
        .await
        .unwrap();

    assert_eq!(moved.status, ConsultationStatus::Scheduled);
    assert_eq!(moved.slot_id, Some(new_slot.id));
    assert_eq!(moved.scheduled_start_time, new_slot.slot_start_time);
    assert_eq!(moved.scheduled_end_time, new_slot.slot_end_time);
    assert_eq!(moved.consultation_number, consultation.consultation_number);

    assert_eq!(clinic.slot_status(old_slot.id).await, SlotStatus::Available);
    let booked = clinic.fixture.store.find_slot(new_slot.id).await.unwrap().unwrap();
    assert_eq!(booked.status, SlotStatus::Booked);
    assert_eq!(booked.consultation_id, Some(consultation.id));
}

#[tokio::test]
async fn rescheduling_to_another_doctor_is_refused() {
    let clinic = Clinic::new().await;
    let old_slot = clinic.open_slot(24).await;
    let consultation = clinic.book(&clinic.patient, old_slot.id).await.unwrap();

    let other_doctor_user = TestUser::doctor("other@example.com");
    let other_doctor_id = clinic.fixture.register_doctor(&other_doctor_user, 500.0).await;
    let foreign_slot = clinic.slot_at(other_doctor_id, Duration::hours(30)).await;

    assert_matches!(
        clinic.service
            .reschedule(&clinic.patient, consultation.id, RescheduleConsultationRequest {
                new_slot_id: foreign_slot.id,
                reason: None,
            })
            .await,
        Err(ConsultationError::DoctorMismatch)
    );

    assert_eq!(clinic.slot_status(old_slot.id).await, SlotStatus::Booked);
    assert_eq!(clinic.slot_status(foreign_slot.id).await, SlotStatus::Available);
}

#[tokio::test]
async fn rescheduling_checks_the_target_slot() {
    let clinic = Clinic::new().await;
    let consultation = clinic.book(&clinic.patient, clinic.open_slot(24).await.id).await.unwrap();
    let taken = clinic.open_slot(26).await;
    clinic.book(&Actor::Patient { user_id: Uuid::new_v4() }, taken.id).await.unwrap();
    let past = clinic.slot_at(clinic.doctor_id(), Duration::hours(-1)).await;

    let attempt = |slot_id| RescheduleConsultationRequest { new_slot_id: slot_id, reason: None };

    assert_matches!(
        clinic.service.reschedule(&clinic.patient, consultation.id, attempt(Uuid::new_v4())).await,
        Err(ConsultationError::SlotNotFound)
    );
    assert_matches!(
        clinic.service.reschedule(&clinic.patient, consultation.id, attempt(taken.id)).await,
        Err(ConsultationError::SlotNotAvailable)
    );
    assert_matches!(
        clinic.service.reschedule(&clinic.patient, consultation.id, attempt(past.id)).await,
        Err(ConsultationError::PastSlot)
    );
}

#[tokio::test]
async fn only_scheduled_consultations_can_be_rescheduled() {
    let clinic = Clinic::new().await;
    let consultation = clinic.book(&clinic.patient, clinic.open_slot(24).await.id).await.unwrap();
    let target = clinic.open_slot(48).await;
    clinic.service.start(&clinic.doctor, consultation.id).await.unwrap();

    assert_matches!(
        clinic.service
            .reschedule(&clinic.patient, consultation.id, RescheduleConsultationRequest {
                new_slot_id: target.id,
                reason: None,
            })
            .await,
        Err(ConsultationError::InvalidStatusTransition(ConsultationStatus::InProgress))
    );
    assert_eq!(clinic.slot_status(target.id).await, SlotStatus::Available);
}

// ==============================================================================
// START / COMPLETE / NOTES
// ==============================================================================

#[tokio::test]
async fn completing_marks_the_slot_completed() {
    let clinic = Clinic::new().await;
    let slot = clinic.open_slot(24).await;
    let consultation = clinic.book(&clinic.patient, slot.id).await.unwrap();

    let started = clinic.service.start(&clinic.doctor, consultation.id).await.unwrap();
    assert_eq!(started.status, ConsultationStatus::InProgress);
    assert!(started.actual_start_time.is_some());
    assert_matches!(
        clinic.service.start(&clinic.doctor, consultation.id).await,
        Err(ConsultationError::InvalidStatusTransition(ConsultationStatus::InProgress))
    );

    let follow_up = NaiveDate::from_ymd_opt(2030, 2, 1).unwrap();
    let completed = clinic.service
        .complete(&clinic.doctor, consultation.id, CompleteConsultationRequest {
            diagnosis: Some("tension headache".into()),
            doctor_notes: Some("hydrate".into()),
            follow_up_required: Some(true),
            follow_up_date: Some(follow_up),
        })
        .await
        .unwrap();

    assert_eq!(completed.status, ConsultationStatus::Completed);
    assert!(completed.actual_end_time.is_some());
    assert_eq!(completed.diagnosis.as_deref(), Some("tension headache"));
    assert!(completed.follow_up_required);
    assert_eq!(completed.follow_up_date, Some(follow_up));

    assert_eq!(clinic.slot_status(slot.id).await, SlotStatus::Completed);
    assert_matches!(
        clinic.book(&Actor::Patient { user_id: Uuid::new_v4() }, slot.id).await,
        Err(ConsultationError::SlotNotAvailable)
    );
    assert_matches!(
        clinic.service.complete(&clinic.doctor, consultation.id, CompleteConsultationRequest::default()).await,
        Err(ConsultationError::InvalidStatusTransition(ConsultationStatus::Completed))
    );
}

#[tokio::test]
async fn scheduled_consultations_complete_directly() {
    let clinic = Clinic::new().await;
    let consultation = clinic.book(&clinic.patient, clinic.open_slot(24).await.id).await.unwrap();

    let completed = clinic.service
        .complete(&clinic.doctor, consultation.id, CompleteConsultationRequest::default())
        .await
        .unwrap();
    assert_eq!(completed.status, ConsultationStatus::Completed);
}

#[tokio::test]
async fn visits_are_run_by_the_treating_doctor_only() {
    let clinic = Clinic::new().await;
    let consultation = clinic.book(&clinic.patient, clinic.open_slot(24).await.id).await.unwrap();
    let other_doctor = Actor::Doctor { user_id: Uuid::new_v4(), doctor_id: Uuid::new_v4() };
    let admin = Actor::Admin { user_id: Uuid::new_v4() };

    for actor in [&clinic.patient, &other_doctor, &admin] {
        assert_matches!(
            clinic.service.start(actor, consultation.id).await,
            Err(ConsultationError::Forbidden)
        );
        assert_matches!(
            clinic.service.complete(actor, consultation.id, CompleteConsultationRequest::default()).await,
            Err(ConsultationError::Forbidden)
        );
        assert_matches!(
            clinic.service.update_notes(actor, consultation.id, UpdateNotesRequest::default()).await,
            Err(ConsultationError::Forbidden)
        );
    }
}

#[tokio::test]
async fn notes_can_be_edited_until_cancellation() {
    let clinic = Clinic::new().await;
    let consultation = clinic.book(&clinic.patient, clinic.open_slot(24).await.id).await.unwrap();

    let updated = clinic.service
        .update_notes(&clinic.doctor, consultation.id, UpdateNotesRequest { doctor_notes: Some("bring labs".into()) })
        .await
        .unwrap();
    assert_eq!(updated.doctor_notes.as_deref(), Some("bring labs"));

    clinic.service
        .cancel(&clinic.patient, consultation.id, CancelConsultationRequest::default())
        .await
        .unwrap();
    assert_matches!(
        clinic.service
            .update_notes(&clinic.doctor, consultation.id, UpdateNotesRequest { doctor_notes: None })
            .await,
        Err(ConsultationError::InvalidStatusTransition(ConsultationStatus::Cancelled))
    );
}

// ==============================================================================
// QUERIES
// ==============================================================================

#[tokio::test]
async fn participants_can_read_a_consultation() {
    let clinic = Clinic::new().await;
    let consultation = clinic.book(&clinic.patient, clinic.open_slot(24).await.id).await.unwrap();

    for actor in [&clinic.patient, &clinic.doctor, &Actor::Admin { user_id: Uuid::new_v4() }] {
        let found = clinic.service.get_consultation(actor, consultation.id).await.unwrap();
        assert_eq!(found.id, consultation.id);
    }

    assert_matches!(
        clinic.service.get_consultation(&Actor::Patient { user_id: Uuid::new_v4() }, consultation.id).await,
        Err(ConsultationError::Forbidden)
    );
    assert_matches!(
        clinic.service.get_consultation(&clinic.patient, Uuid::new_v4()).await,
        Err(ConsultationError::NotFound)
    );
}

#[tokio::test]
async fn my_consultations_are_paginated_newest_first() {
    let clinic = Clinic::new().await;
    for hours in 1..=12 {
        clinic.book(&clinic.patient, clinic.open_slot(hours * 2).await.id).await.unwrap();
    }
    // someone else's booking stays out of the patient's list
    clinic.book(&Actor::Patient { user_id: Uuid::new_v4() }, clinic.open_slot(100).await.id).await.unwrap();

    let first_page = clinic.service
        .list_my_consultations(&clinic.patient, MyConsultationsQuery::default())
        .await
        .unwrap();
    assert_eq!((first_page.page, first_page.limit, first_page.total), (1, 10, 12));
    assert_eq!(first_page.items.len(), 10);
    assert!(first_page.items
        .windows(2)
        .all(|pair| pair[0].scheduled_start_time >= pair[1].scheduled_start_time));

    let second_page = clinic.service
        .list_my_consultations(&clinic.patient, MyConsultationsQuery { page: Some(2), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(second_page.items.len(), 2);

    let clamped = clinic.service
        .list_my_consultations(&clinic.patient, MyConsultationsQuery {
            page: Some(0),
            limit: Some(500),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!((clamped.page, clamped.limit), (1, 50));
    assert_eq!(clamped.items.len(), 12);

    let doctor_view = clinic.service
        .list_my_consultations(&clinic.doctor, MyConsultationsQuery { limit: Some(0), ..Default::default() })
        .await
        .unwrap();
    assert_eq!((doctor_view.limit, doctor_view.total), (1, 13));
    assert_eq!(doctor_view.items.len(), 1);
}

#[tokio::test]
async fn my_consultations_filter_by_status() {
    let clinic = Clinic::new().await;
    let first = clinic.book(&clinic.patient, clinic.open_slot(24).await.id).await.unwrap();
    clinic.book(&clinic.patient, clinic.open_slot(25).await.id).await.unwrap();
    clinic.service
        .cancel(&clinic.patient, first.id, CancelConsultationRequest::default())
        .await
        .unwrap();

    let cancelled = clinic.service
        .list_my_consultations(&clinic.patient, MyConsultationsQuery {
            status: Some("cancelled".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(cancelled.total, 1);
    assert_eq!(cancelled.items[0].id, first.id);

    assert_matches!(
        clinic.service
            .list_my_consultations(&clinic.patient, MyConsultationsQuery {
                status: Some("rescheduled".into()),
                ..Default::default()
            })
            .await,
        Err(ConsultationError::Validation(_))
    );

    assert_matches!(
        clinic.service
            .list_my_consultations(&Actor::Admin { user_id: Uuid::new_v4() }, MyConsultationsQuery::default())
            .await,
        Err(ConsultationError::Forbidden)
    );
}

#[tokio::test]
async fn store_outages_surface_as_database_errors() {
    let clinic = Clinic::new().await;
    let slot = clinic.open_slot(24).await;
    clinic.fixture.store.set_offline(true);

    assert_matches!(
        clinic.book(&clinic.patient, slot.id).await,
        Err(ConsultationError::DatabaseError(_))
    );
}
