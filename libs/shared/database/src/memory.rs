use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use shared_models::scheduling::{
    AvailabilitySlot, Consultation, ConsultationStatus, DoctorProfile, SlotStatus,
    WeeklyAvailabilityWindow,
};

use crate::store::{
    Cancellation, CommitOutcome, Completion, ConsultationFilter, ConsultationPage,
    DoctorDirectory, NewConsultation, NewSlot, NewWindow, Reschedule, SchedulingStore, SlotFilter,
    WindowChanges,
};

#[derive(Default)]
struct State {
    windows: HashMap<Uuid, WeeklyAvailabilityWindow>,
    slots: HashMap<Uuid, AvailabilitySlot>,
    consultations: HashMap<Uuid, Consultation>,
    sequences: HashMap<NaiveDate, u32>,
    doctors: HashMap<Uuid, DoctorProfile>,
}

/// Process-local store. One mutex guards all tables and is held for the full
/// check-then-apply of every operation, which gives each call the same
/// all-or-nothing behaviour as a database transaction.
#[derive(Default)]
pub struct InMemorySchedulingStore {
    state: Mutex<State>,
    offline: AtomicBool,
}

impl InMemorySchedulingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that starts out knowing the given doctor profiles.
    pub fn with_doctors(doctors: impl IntoIterator<Item = DoctorProfile>) -> Self {
        let state = State {
            doctors: doctors.into_iter().map(|doctor| (doctor.id, doctor)).collect(),
            ..State::default()
        };
        Self { state: Mutex::new(state), offline: AtomicBool::new(false) }
    }

    pub async fn add_doctor(&self, doctor: DoctorProfile) {
        let mut state = self.state.lock().await;
        state.doctors.insert(doctor.id, doctor);
    }

    /// While offline every call fails like an unreachable database.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("scheduling store is unavailable");
        }
        Ok(())
    }
}

fn release_slot(state: &mut State, slot_id: Option<Uuid>, consultation_id: Uuid, now: DateTime<Utc>) {
    let Some(slot) = slot_id else {
        return;
    };
    let Some(slot) = state.slots.get_mut(&slot) else {
        return;
    };

    if slot.consultation_id == Some(consultation_id) && slot.status == SlotStatus::Booked {
        slot.status = SlotStatus::Available;
        slot.consultation_id = None;
        slot.clear_reservation();
        slot.updated_at = now;
    }
}

#[async_trait]
impl SchedulingStore for InMemorySchedulingStore {
    async fn insert_window(&self, window: NewWindow) -> Result<WeeklyAvailabilityWindow> {
        self.ensure_online()?;
        let now = Utc::now();
        let record = WeeklyAvailabilityWindow {
            id: Uuid::new_v4(),
            doctor_id: window.doctor_id,
            day_of_week: window.day_of_week,
            start_time: window.start_time,
            end_time: window.end_time,
            is_active: window.is_active,
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.lock().await;
        state.windows.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_window(&self, window_id: Uuid) -> Result<Option<WeeklyAvailabilityWindow>> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        Ok(state.windows.get(&window_id).cloned())
    }

    async fn list_windows(&self, doctor_id: Uuid, active_only: bool)
        -> Result<Vec<WeeklyAvailabilityWindow>> {
        self.ensure_online()?;
        let state = self.state.lock().await;

        let mut windows: Vec<_> = state
            .windows
            .values()
            .filter(|w| w.doctor_id == doctor_id && (!active_only || w.is_active))
            .cloned()
            .collect();
        windows.sort_by(|a, b| {
            a.day_of_week
                .cmp(&b.day_of_week)
                .then_with(|| a.start_time.cmp(&b.start_time))
        });

        Ok(windows)
    }

    async fn find_overlapping_window(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
        start_time: &str,
        end_time: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<Option<WeeklyAvailabilityWindow>> {
        self.ensure_online()?;
        let state = self.state.lock().await;

        // zero-padded HH:MM compares correctly as text
        Ok(state
            .windows
            .values()
            .find(|w| {
                w.doctor_id == doctor_id
                    && w.day_of_week == day_of_week
                    && w.is_active
                    && Some(w.id) != exclude_id
                    && w.start_time.as_str() < end_time
                    && w.end_time.as_str() > start_time
            })
            .cloned())
    }

    async fn update_window(&self, window_id: Uuid, changes: WindowChanges)
        -> Result<Option<WeeklyAvailabilityWindow>> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;

        let Some(window) = state.windows.get_mut(&window_id) else {
            return Ok(None);
        };

        if let Some(day) = changes.day_of_week {
            window.day_of_week = day;
        }
        if let Some(start) = changes.start_time {
            window.start_time = start;
        }
        if let Some(end) = changes.end_time {
            window.end_time = end;
        }
        if let Some(active) = changes.is_active {
            window.is_active = active;
        }
        window.updated_at = Utc::now();

        Ok(Some(window.clone()))
    }

    async fn delete_window(&self, window_id: Uuid) -> Result<bool> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;
        Ok(state.windows.remove(&window_id).is_some())
    }

    async fn find_slot(&self, slot_id: Uuid) -> Result<Option<AvailabilitySlot>> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        Ok(state.slots.get(&slot_id).cloned())
    }

    async fn list_slots(&self, filter: &SlotFilter) -> Result<Vec<AvailabilitySlot>> {
        self.ensure_online()?;
        let state = self.state.lock().await;

        let mut slots: Vec<_> = state
            .slots
            .values()
            .filter(|slot| filter.matches(slot))
            .cloned()
            .collect();
        slots.sort_by_key(|slot| slot.slot_start_time);

        if let Some(limit) = filter.limit {
            slots.truncate(limit as usize);
        }

        Ok(slots)
    }

    async fn insert_slots(&self, slots: &[NewSlot]) -> Result<Vec<AvailabilitySlot>> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let mut taken: HashSet<(Uuid, DateTime<Utc>)> = state
            .slots
            .values()
            .map(|slot| (slot.doctor_id, slot.slot_start_time))
            .collect();

        let mut inserted = Vec::with_capacity(slots.len());
        for new_slot in slots {
            if !taken.insert((new_slot.doctor_id, new_slot.slot_start_time)) {
                continue;
            }

            let slot = AvailabilitySlot {
                id: Uuid::new_v4(),
                doctor_id: new_slot.doctor_id,
                slot_start_time: new_slot.slot_start_time,
                slot_end_time: new_slot.slot_end_time,
                status: SlotStatus::Available,
                consultation_id: None,
                reserved_by_user_id: None,
                reserved_at: None,
                expires_at: None,
                created_at: now,
                updated_at: now,
            };
            state.slots.insert(slot.id, slot.clone());
            inserted.push(slot);
        }

        debug!("Inserted {} of {} slots", inserted.len(), slots.len());
        Ok(inserted)
    }

    async fn block_slot(&self, doctor_id: Uuid, slot_id: Uuid) -> Result<Option<AvailabilitySlot>> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;

        match state.slots.get_mut(&slot_id) {
            Some(slot) if slot.doctor_id == doctor_id && slot.status == SlotStatus::Available => {
                slot.status = SlotStatus::Cancelled;
                slot.clear_reservation();
                slot.updated_at = Utc::now();
                Ok(Some(slot.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn next_consultation_sequence(&self, day: NaiveDate) -> Result<u32> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;
        let counter = state.sequences.entry(day).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn find_consultation(&self, consultation_id: Uuid) -> Result<Option<Consultation>> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        Ok(state.consultations.get(&consultation_id).cloned())
    }

    async fn list_consultations(&self, filter: &ConsultationFilter, offset: u32, limit: u32)
        -> Result<ConsultationPage> {
        self.ensure_online()?;
        let state = self.state.lock().await;

        let mut matching: Vec<_> = state
            .consultations
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.scheduled_start_time.cmp(&a.scheduled_start_time));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        Ok(ConsultationPage { items, total })
    }

    async fn commit_booking(&self, booking: NewConsultation) -> Result<CommitOutcome<Consultation>> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;

        let Some(slot) = state.slots.get_mut(&booking.slot_id) else {
            return Ok(CommitOutcome::SlotUnavailable);
        };
        if slot.status != SlotStatus::Available || slot.doctor_id != booking.doctor_id {
            return Ok(CommitOutcome::SlotUnavailable);
        }

        let consultation = Consultation {
            id: Uuid::new_v4(),
            consultation_number: booking.consultation_number,
            patient_id: booking.patient_id,
            doctor_id: booking.doctor_id,
            slot_id: Some(slot.id),
            scheduled_start_time: slot.slot_start_time,
            scheduled_end_time: slot.slot_end_time,
            consultation_type: booking.consultation_type,
            status: ConsultationStatus::Scheduled,
            consultation_fee: booking.consultation_fee,
            chief_complaint: booking.chief_complaint,
            symptoms: booking.symptoms,
            diagnosis: None,
            doctor_notes: None,
            actual_start_time: None,
            actual_end_time: None,
            follow_up_required: false,
            follow_up_date: None,
            cancellation_reason: None,
            created_at: booking.booked_at,
            updated_at: booking.booked_at,
        };

        slot.status = SlotStatus::Booked;
        slot.consultation_id = Some(consultation.id);
        slot.clear_reservation();
        slot.updated_at = booking.booked_at;

        state.consultations.insert(consultation.id, consultation.clone());
        Ok(CommitOutcome::Committed(consultation))
    }

    async fn commit_cancellation(&self, cancellation: Cancellation)
        -> Result<CommitOutcome<Consultation>> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;

        let Some(consultation) = state.consultations.get_mut(&cancellation.consultation_id) else {
            return Ok(CommitOutcome::StaleStatus);
        };
        if consultation.status != cancellation.expected_status {
            return Ok(CommitOutcome::StaleStatus);
        }

        let slot_id = consultation.slot_id.take();
        consultation.status = ConsultationStatus::Cancelled;
        consultation.cancellation_reason = cancellation.reason;
        consultation.updated_at = cancellation.cancelled_at;
        let cancelled = consultation.clone();

        release_slot(&mut state, slot_id, cancelled.id, cancellation.cancelled_at);
        Ok(CommitOutcome::Committed(cancelled))
    }

    async fn commit_reschedule(&self, reschedule: Reschedule) -> Result<CommitOutcome<Consultation>> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;
        let now = reschedule.rescheduled_at;

        let Some(current) = state.consultations.get(&reschedule.consultation_id) else {
            return Ok(CommitOutcome::StaleStatus);
        };
        if current.status != reschedule.expected_status {
            return Ok(CommitOutcome::StaleStatus);
        }
        let (old_slot_id, doctor_id) = (current.slot_id, current.doctor_id);

        let (start, end) = match state.slots.get(&reschedule.new_slot_id) {
            Some(slot) if slot.status == SlotStatus::Available && slot.doctor_id == doctor_id => {
                (slot.slot_start_time, slot.slot_end_time)
            }
            _ => return Ok(CommitOutcome::SlotUnavailable),
        };

        release_slot(&mut state, old_slot_id, reschedule.consultation_id, now);

        if let Some(slot) = state.slots.get_mut(&reschedule.new_slot_id) {
            slot.status = SlotStatus::Booked;
            slot.consultation_id = Some(reschedule.consultation_id);
            slot.clear_reservation();
            slot.updated_at = now;
        }

        let Some(consultation) = state.consultations.get_mut(&reschedule.consultation_id) else {
            return Ok(CommitOutcome::StaleStatus);
        };
        consultation.slot_id = Some(reschedule.new_slot_id);
        consultation.scheduled_start_time = start;
        consultation.scheduled_end_time = end;
        consultation.status = ConsultationStatus::Scheduled;
        consultation.updated_at = now;

        Ok(CommitOutcome::Committed(consultation.clone()))
    }

    async fn commit_start(&self, consultation_id: Uuid, started_at: DateTime<Utc>)
        -> Result<CommitOutcome<Consultation>> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;

        match state.consultations.get_mut(&consultation_id) {
            Some(c) if c.status == ConsultationStatus::Scheduled => {
                c.status = ConsultationStatus::InProgress;
                c.actual_start_time = Some(started_at);
                c.updated_at = started_at;
                Ok(CommitOutcome::Committed(c.clone()))
            }
            _ => Ok(CommitOutcome::StaleStatus),
        }
    }

    async fn commit_completion(&self, completion: Completion) -> Result<CommitOutcome<Consultation>> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;
        let now = completion.completed_at;

        let Some(consultation) = state.consultations.get_mut(&completion.consultation_id) else {
            return Ok(CommitOutcome::StaleStatus);
        };
        if consultation.status != completion.expected_status {
            return Ok(CommitOutcome::StaleStatus);
        }

        consultation.status = ConsultationStatus::Completed;
        consultation.actual_end_time = Some(now);
        if completion.diagnosis.is_some() {
            consultation.diagnosis = completion.diagnosis;
        }
        if completion.doctor_notes.is_some() {
            consultation.doctor_notes = completion.doctor_notes;
        }
        if let Some(required) = completion.follow_up_required {
            consultation.follow_up_required = required;
        }
        if completion.follow_up_date.is_some() {
            consultation.follow_up_date = completion.follow_up_date;
        }
        consultation.updated_at = now;
        let completed = consultation.clone();

        if let Some(slot_id) = completed.slot_id {
            if let Some(slot) = state.slots.get_mut(&slot_id) {
                slot.status = SlotStatus::Completed;
                slot.updated_at = now;
            }
        }

        Ok(CommitOutcome::Committed(completed))
    }

    async fn update_consultation_notes(&self, consultation_id: Uuid, doctor_notes: Option<String>)
        -> Result<CommitOutcome<Consultation>> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;

        match state.consultations.get_mut(&consultation_id) {
            Some(c) if c.status != ConsultationStatus::Cancelled => {
                c.doctor_notes = doctor_notes;
                c.updated_at = Utc::now();
                Ok(CommitOutcome::Committed(c.clone()))
            }
            _ => Ok(CommitOutcome::StaleStatus),
        }
    }
}

#[async_trait]
impl DoctorDirectory for InMemorySchedulingStore {
    async fn find_doctor_by_user(&self, user_id: Uuid) -> Result<Option<DoctorProfile>> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        Ok(state.doctors.values().find(|d| d.user_id == user_id).cloned())
    }

    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<DoctorProfile>> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        Ok(state.doctors.get(&doctor_id).cloned())
    }
}
