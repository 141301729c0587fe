use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::store::{NewWindow, SchedulingStore, WindowChanges};
use shared_models::scheduling::WeeklyAvailabilityWindow;

use crate::models::{
    AvailabilityError, CreateScheduleRequest, DeleteScheduleResponse, UpdateScheduleRequest,
};
use crate::services::time_window::{format_minutes, parse_time_to_minutes};

/// Weekly availability windows of one, already authenticated, doctor.
pub struct WeeklyScheduleService {
    store: Arc<dyn SchedulingStore>,
}

fn validate_day(day_of_week: i32) -> Result<i32, AvailabilityError> {
    if !(0..=6).contains(&day_of_week) {
        return Err(AvailabilityError::Validation(
            "day_of_week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }
    Ok(day_of_week)
}

fn validate_order(start_minutes: i64, end_minutes: i64) -> Result<(), AvailabilityError> {
    if end_minutes <= start_minutes {
        return Err(AvailabilityError::Validation(
            "end_time must be greater than start_time".to_string(),
        ));
    }
    Ok(())
}

impl WeeklyScheduleService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    pub async fn create_schedule(
        &self,
        doctor_id: Uuid,
        request: CreateScheduleRequest,
    ) -> Result<WeeklyAvailabilityWindow, AvailabilityError> {
        debug!("Creating weekly schedule for doctor {}", doctor_id);

        let day_of_week = validate_day(request.day_of_week)?;
        let start = parse_time_to_minutes(&request.start_time)?;
        let end = parse_time_to_minutes(&request.end_time)?;
        validate_order(start, end)?;

        let (start_time, end_time) = (format_minutes(start), format_minutes(end));
        let is_active = request.is_active.unwrap_or(true);

        if is_active {
            self.ensure_no_overlap(doctor_id, day_of_week, &start_time, &end_time, None).await?;
        }

        let window = self.store.insert_window(NewWindow {
            doctor_id,
            day_of_week,
            start_time,
            end_time,
            is_active,
        }).await?;

        info!("Created schedule {} for doctor {}", window.id, doctor_id);
        Ok(window)
    }

    pub async fn list_schedules(&self, doctor_id: Uuid)
        -> Result<Vec<WeeklyAvailabilityWindow>, AvailabilityError> {
        Ok(self.store.list_windows(doctor_id, false).await?)
    }

    /// Applies only the fields present. Ordering and overlap are checked
    /// against the window as it would look after the update.
    pub async fn update_schedule(
        &self,
        doctor_id: Uuid,
        schedule_id: Uuid,
        request: UpdateScheduleRequest,
    ) -> Result<WeeklyAvailabilityWindow, AvailabilityError> {
        debug!("Updating schedule {} for doctor {}", schedule_id, doctor_id);

        let current = self.owned_window(doctor_id, schedule_id).await?;

        let day_of_week = request.day_of_week.map(validate_day).transpose()?;
        let start = request.start_time.as_deref().map(parse_time_to_minutes).transpose()?;
        let end = request.end_time.as_deref().map(parse_time_to_minutes).transpose()?;

        let effective_start = match start {
            Some(minutes) => minutes,
            None => parse_time_to_minutes(&current.start_time)?,
        };
        let effective_end = match end {
            Some(minutes) => minutes,
            None => parse_time_to_minutes(&current.end_time)?,
        };
        validate_order(effective_start, effective_end)?;

        let effective_day = day_of_week.unwrap_or(current.day_of_week);
        let effective_active = request.is_active.unwrap_or(current.is_active);

        if effective_active {
            self.ensure_no_overlap(
                doctor_id,
                effective_day,
                &format_minutes(effective_start),
                &format_minutes(effective_end),
                Some(schedule_id),
            ).await?;
        }

        let changes = WindowChanges {
            day_of_week,
            start_time: start.map(format_minutes),
            end_time: end.map(format_minutes),
            is_active: request.is_active,
        };

        self.store
            .update_window(schedule_id, changes)
            .await?
            .ok_or(AvailabilityError::ScheduleNotFound)
    }

    pub async fn delete_schedule(&self, doctor_id: Uuid, schedule_id: Uuid)
        -> Result<DeleteScheduleResponse, AvailabilityError> {
        self.owned_window(doctor_id, schedule_id).await?;

        if !self.store.delete_window(schedule_id).await? {
            return Err(AvailabilityError::ScheduleNotFound);
        }

        info!("Deleted schedule {} for doctor {}", schedule_id, doctor_id);
        Ok(DeleteScheduleResponse { id: schedule_id, deleted: true })
    }

    async fn owned_window(&self, doctor_id: Uuid, schedule_id: Uuid)
        -> Result<WeeklyAvailabilityWindow, AvailabilityError> {
        match self.store.find_window(schedule_id).await? {
            Some(window) if window.doctor_id == doctor_id => Ok(window),
            Some(_) => {
                warn!("Doctor {} attempted to access schedule {} they do not own", doctor_id, schedule_id);
                Err(AvailabilityError::ScheduleNotFound)
            }
            None => Err(AvailabilityError::ScheduleNotFound),
        }
    }

    async fn ensure_no_overlap(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
        start_time: &str,
        end_time: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<(), AvailabilityError> {
        let existing = self.store
            .find_overlapping_window(doctor_id, day_of_week, start_time, end_time, exclude_id)
            .await?;

        if let Some(window) = existing {
            debug!(
                "Schedule {}-{} on day {} overlaps window {}",
                start_time, end_time, day_of_week, window.id
            );
            return Err(AvailabilityError::OverlappingSchedule);
        }

        Ok(())
    }
}
