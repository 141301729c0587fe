use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::scheduling::{
    AvailabilitySlot, Consultation, DoctorProfile, SlotStatus, WeeklyAvailabilityWindow,
    DEFAULT_CONSULTATION_FEE,
};

use crate::store::{
    Cancellation, CommitOutcome, Completion, ConsultationFilter, ConsultationPage,
    DoctorDirectory, NewConsultation, NewSlot, NewWindow, Reschedule, SchedulingStore, SlotFilter,
    WindowChanges,
};
use crate::supabase::SupabaseClient;

const WINDOWS: &str = "/rest/v1/availability_windows";
const SLOTS: &str = "/rest/v1/availability_slots";
const CONSULTATIONS: &str = "/rest/v1/consultations";
const DOCTORS: &str = "/rest/v1/doctors";

/// Scheduling store backed by Supabase PostgREST.
///
/// Single-row transitions are filtered PATCHes carrying the expected status;
/// PostgREST answers with an empty representation when no row matched.
/// Multi-row transitions call the SQL functions from
/// `supabase/migrations`, each of which runs as one transaction.
pub struct SupabaseSchedulingStore {
    supabase: SupabaseClient,
    service_key: String,
}

/// Shape returned by the `book_slot`, `cancel_consultation`,
/// `reschedule_consultation` and `complete_consultation` functions.
#[derive(Debug, Deserialize)]
struct RpcOutcome {
    outcome: String,
    #[serde(default)]
    consultation: Option<Consultation>,
}

impl RpcOutcome {
    fn into_commit(self) -> Result<CommitOutcome<Consultation>> {
        match (self.outcome.as_str(), self.consultation) {
            ("committed", Some(consultation)) => Ok(CommitOutcome::Committed(consultation)),
            ("slot_unavailable", _) => Ok(CommitOutcome::SlotUnavailable),
            ("stale_status", _) => Ok(CommitOutcome::StaleStatus),
            (other, _) => Err(anyhow!("Unexpected outcome from scheduling function: {}", other)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DoctorRow {
    id: Uuid,
    user_id: Uuid,
    #[serde(default)]
    consultation_fee: Option<f64>,
}

impl From<DoctorRow> for DoctorProfile {
    fn from(row: DoctorRow) -> Self {
        DoctorProfile {
            id: row.id,
            user_id: row.user_id,
            consultation_fee: row.consultation_fee.unwrap_or(DEFAULT_CONSULTATION_FEE),
        }
    }
}

fn representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

fn encode_instant(instant: DateTime<Utc>) -> String {
    urlencoding::encode(&instant.to_rfc3339()).into_owned()
}

/// Postgres `time` columns come back as HH:MM:SS.
fn trim_seconds(mut window: WeeklyAvailabilityWindow) -> WeeklyAvailabilityWindow {
    window.start_time.truncate(5);
    window.end_time.truncate(5);
    window
}

fn slot_query(filter: &SlotFilter) -> String {
    let mut path = format!("{}?doctor_id=eq.{}", SLOTS, filter.doctor_id);

    if let Some(from) = filter.from {
        path.push_str(&format!("&slot_start_time=gte.{}", encode_instant(from)));
    }
    if let Some(to) = filter.to {
        path.push_str(&format!("&slot_start_time=lte.{}", encode_instant(to)));
    }
    if !filter.statuses.is_empty() {
        let statuses: Vec<&str> = filter.statuses.iter().map(SlotStatus::as_str).collect();
        path.push_str(&format!("&status=in.({})", statuses.join(",")));
    }

    path.push_str("&order=slot_start_time.asc");

    if let Some(limit) = filter.limit {
        path.push_str(&format!("&limit={}", limit));
    }

    path
}

fn consultation_query(filter: &ConsultationFilter, offset: u32, limit: u32) -> String {
    let mut path = format!("{}?select=*", CONSULTATIONS);

    if let Some(patient_id) = filter.patient_id {
        path.push_str(&format!("&patient_id=eq.{}", patient_id));
    }
    if let Some(doctor_id) = filter.doctor_id {
        path.push_str(&format!("&doctor_id=eq.{}", doctor_id));
    }
    if let Some(status) = filter.status {
        path.push_str(&format!("&status=eq.{}", status));
    }

    path.push_str(&format!(
        "&order=scheduled_start_time.desc&offset={}&limit={}",
        offset, limit
    ));
    path
}

impl SupabaseSchedulingStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_key: config.supabase_service_role_key.clone(),
        }
    }

    fn token(&self) -> Option<&str> {
        Some(self.service_key.as_str())
    }

    async fn select<T>(&self, path: &str) -> Result<Vec<T>>
    where T: serde::de::DeserializeOwned {
        self.supabase.request(Method::GET, path, self.token(), None).await
    }

    async fn patch_returning<T>(&self, path: &str, body: Value) -> Result<Option<T>>
    where T: serde::de::DeserializeOwned {
        let rows: Vec<T> = self.supabase.request_with_headers(
            Method::PATCH,
            path,
            self.token(),
            Some(body),
            Some(representation()),
        ).await?;

        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl SchedulingStore for SupabaseSchedulingStore {
    async fn insert_window(&self, window: NewWindow) -> Result<WeeklyAvailabilityWindow> {
        debug!("Inserting availability window for doctor {}", window.doctor_id);

        let rows: Vec<WeeklyAvailabilityWindow> = self.supabase.request_with_headers(
            Method::POST,
            WINDOWS,
            self.token(),
            Some(serde_json::to_value(&window)?),
            Some(representation()),
        ).await?;

        rows.into_iter()
            .next()
            .map(trim_seconds)
            .ok_or_else(|| anyhow!("Failed to create availability window"))
    }

    async fn find_window(&self, window_id: Uuid) -> Result<Option<WeeklyAvailabilityWindow>> {
        let path = format!("{}?id=eq.{}", WINDOWS, window_id);
        let rows: Vec<WeeklyAvailabilityWindow> = self.select(&path).await?;
        Ok(rows.into_iter().next().map(trim_seconds))
    }

    async fn list_windows(&self, doctor_id: Uuid, active_only: bool)
        -> Result<Vec<WeeklyAvailabilityWindow>> {
        let mut path = format!("{}?doctor_id=eq.{}", WINDOWS, doctor_id);
        if active_only {
            path.push_str("&is_active=eq.true");
        }
        path.push_str("&order=day_of_week.asc,start_time.asc");

        let rows: Vec<WeeklyAvailabilityWindow> = self.select(&path).await?;
        Ok(rows.into_iter().map(trim_seconds).collect())
    }

    async fn find_overlapping_window(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
        start_time: &str,
        end_time: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<Option<WeeklyAvailabilityWindow>> {
        let mut path = format!(
            "{}?doctor_id=eq.{}&day_of_week=eq.{}&is_active=eq.true&start_time=lt.{}&end_time=gt.{}",
            WINDOWS, doctor_id, day_of_week, end_time, start_time
        );
        if let Some(exclude) = exclude_id {
            path.push_str(&format!("&id=neq.{}", exclude));
        }
        path.push_str("&limit=1");

        let rows: Vec<WeeklyAvailabilityWindow> = self.select(&path).await?;
        Ok(rows.into_iter().next().map(trim_seconds))
    }

    async fn update_window(&self, window_id: Uuid, changes: WindowChanges)
        -> Result<Option<WeeklyAvailabilityWindow>> {
        let mut body = serde_json::to_value(&changes)?;
        if let Some(fields) = body.as_object_mut() {
            fields.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        }

        let path = format!("{}?id=eq.{}", WINDOWS, window_id);
        let row: Option<WeeklyAvailabilityWindow> = self.patch_returning(&path, body).await?;
        Ok(row.map(trim_seconds))
    }

    async fn delete_window(&self, window_id: Uuid) -> Result<bool> {
        let path = format!("{}?id=eq.{}", WINDOWS, window_id);
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            self.token(),
            None,
            Some(representation()),
        ).await?;

        Ok(!rows.is_empty())
    }

    async fn find_slot(&self, slot_id: Uuid) -> Result<Option<AvailabilitySlot>> {
        let path = format!("{}?id=eq.{}", SLOTS, slot_id);
        let rows: Vec<AvailabilitySlot> = self.select(&path).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_slots(&self, filter: &SlotFilter) -> Result<Vec<AvailabilitySlot>> {
        self.select(&slot_query(filter)).await
    }

    async fn insert_slots(&self, slots: &[NewSlot]) -> Result<Vec<AvailabilitySlot>> {
        if slots.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<Value> = slots
            .iter()
            .map(|slot| json!({
                "doctor_id": slot.doctor_id,
                "slot_start_time": slot.slot_start_time.to_rfc3339(),
                "slot_end_time": slot.slot_end_time.to_rfc3339(),
                "status": SlotStatus::Available.as_str(),
            }))
            .collect();

        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("return=representation,resolution=ignore-duplicates"),
        );

        // PostgREST inserts a JSON array in a single statement
        let path = format!("{}?on_conflict=doctor_id,slot_start_time", SLOTS);
        let inserted: Vec<AvailabilitySlot> = self.supabase.request_with_headers(
            Method::POST,
            &path,
            self.token(),
            Some(Value::Array(rows)),
            Some(headers),
        ).await?;

        debug!("Inserted {} of {} slots", inserted.len(), slots.len());
        Ok(inserted)
    }

    async fn block_slot(&self, doctor_id: Uuid, slot_id: Uuid) -> Result<Option<AvailabilitySlot>> {
        let path = format!(
            "{}?id=eq.{}&doctor_id=eq.{}&status=eq.available",
            SLOTS, slot_id, doctor_id
        );
        let body = json!({
            "status": SlotStatus::Cancelled.as_str(),
            "reserved_by_user_id": null,
            "reserved_at": null,
            "expires_at": null,
            "updated_at": Utc::now().to_rfc3339(),
        });

        self.patch_returning(&path, body).await
    }

    async fn next_consultation_sequence(&self, day: NaiveDate) -> Result<u32> {
        self.supabase
            .rpc("next_consultation_sequence", self.token(), json!({ "p_day": day }))
            .await
    }

    async fn find_consultation(&self, consultation_id: Uuid) -> Result<Option<Consultation>> {
        let path = format!("{}?id=eq.{}", CONSULTATIONS, consultation_id);
        let rows: Vec<Consultation> = self.select(&path).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_consultations(&self, filter: &ConsultationFilter, offset: u32, limit: u32)
        -> Result<ConsultationPage> {
        let path = consultation_query(filter, offset, limit);
        let (items, total) = self.supabase
            .request_with_count::<Vec<Consultation>>(&path, self.token())
            .await?;

        Ok(ConsultationPage { items, total })
    }

    #[instrument(skip(self, booking), fields(slot_id = %booking.slot_id))]
    async fn commit_booking(&self, booking: NewConsultation) -> Result<CommitOutcome<Consultation>> {
        let args = json!({
            "p_slot_id": booking.slot_id,
            "p_doctor_id": booking.doctor_id,
            "p_patient_id": booking.patient_id,
            "p_consultation_number": booking.consultation_number,
            "p_consultation_type": booking.consultation_type,
            "p_consultation_fee": booking.consultation_fee,
            "p_chief_complaint": booking.chief_complaint,
            "p_symptoms": booking.symptoms,
            "p_booked_at": booking.booked_at.to_rfc3339(),
        });

        let outcome: RpcOutcome = self.supabase.rpc("book_slot", self.token(), args).await?;
        outcome.into_commit()
    }

    #[instrument(skip(self, cancellation), fields(consultation_id = %cancellation.consultation_id))]
    async fn commit_cancellation(&self, cancellation: Cancellation)
        -> Result<CommitOutcome<Consultation>> {
        let args = json!({
            "p_consultation_id": cancellation.consultation_id,
            "p_expected_status": cancellation.expected_status,
            "p_reason": cancellation.reason,
            "p_cancelled_at": cancellation.cancelled_at.to_rfc3339(),
        });

        let outcome: RpcOutcome = self.supabase.rpc("cancel_consultation", self.token(), args).await?;
        outcome.into_commit()
    }

    #[instrument(skip(self, reschedule), fields(consultation_id = %reschedule.consultation_id))]
    async fn commit_reschedule(&self, reschedule: Reschedule) -> Result<CommitOutcome<Consultation>> {
        let args = json!({
            "p_consultation_id": reschedule.consultation_id,
            "p_new_slot_id": reschedule.new_slot_id,
            "p_expected_status": reschedule.expected_status,
            "p_rescheduled_at": reschedule.rescheduled_at.to_rfc3339(),
        });

        let outcome: RpcOutcome = self.supabase
            .rpc("reschedule_consultation", self.token(), args)
            .await?;
        outcome.into_commit()
    }

    async fn commit_start(&self, consultation_id: Uuid, started_at: DateTime<Utc>)
        -> Result<CommitOutcome<Consultation>> {
        let path = format!("{}?id=eq.{}&status=eq.scheduled", CONSULTATIONS, consultation_id);
        let body = json!({
            "status": "in_progress",
            "actual_start_time": started_at.to_rfc3339(),
            "updated_at": started_at.to_rfc3339(),
        });

        match self.patch_returning::<Consultation>(&path, body).await? {
            Some(consultation) => Ok(CommitOutcome::Committed(consultation)),
            None => Ok(CommitOutcome::StaleStatus),
        }
    }

    #[instrument(skip(self, completion), fields(consultation_id = %completion.consultation_id))]
    async fn commit_completion(&self, completion: Completion) -> Result<CommitOutcome<Consultation>> {
        let args = json!({
            "p_consultation_id": completion.consultation_id,
            "p_expected_status": completion.expected_status,
            "p_diagnosis": completion.diagnosis,
            "p_doctor_notes": completion.doctor_notes,
            "p_follow_up_required": completion.follow_up_required,
            "p_follow_up_date": completion.follow_up_date,
            "p_completed_at": completion.completed_at.to_rfc3339(),
        });

        let outcome: RpcOutcome = self.supabase
            .rpc("complete_consultation", self.token(), args)
            .await?;
        outcome.into_commit()
    }

    async fn update_consultation_notes(&self, consultation_id: Uuid, doctor_notes: Option<String>)
        -> Result<CommitOutcome<Consultation>> {
        let path = format!("{}?id=eq.{}&status=neq.cancelled", CONSULTATIONS, consultation_id);
        let body = json!({
            "doctor_notes": doctor_notes,
            "updated_at": Utc::now().to_rfc3339(),
        });

        match self.patch_returning::<Consultation>(&path, body).await? {
            Some(consultation) => Ok(CommitOutcome::Committed(consultation)),
            None => Ok(CommitOutcome::StaleStatus),
        }
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseSchedulingStore {
    async fn find_doctor_by_user(&self, user_id: Uuid) -> Result<Option<DoctorProfile>> {
        let path = format!("{}?user_id=eq.{}&select=id,user_id,consultation_fee", DOCTORS, user_id);
        let rows: Vec<DoctorRow> = self.select(&path).await?;

        if rows.len() > 1 {
            warn!("User {} is linked to {} doctor profiles, using the first", user_id, rows.len());
        }
        Ok(rows.into_iter().next().map(DoctorProfile::from))
    }

    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<DoctorProfile>> {
        let path = format!("{}?id=eq.{}&select=id,user_id,consultation_fee", DOCTORS, doctor_id);
        let rows: Vec<DoctorRow> = self.select(&path).await?;
        Ok(rows.into_iter().next().map(DoctorProfile::from))
    }
}
