use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_database::store::{NewSlot, SchedulingStore, SlotFilter};
use shared_models::scheduling::{SlotStatus, WeeklyAvailabilityWindow};

use crate::models::{
    parse_status_list, AvailabilityError, AvailableSlotsQuery, BlockSlotsRequest,
    BlockSlotsResponse, GenerateSlotsRequest, GenerateSlotsResponse, SlotListResponse, SlotQuery,
};
use crate::services::time_window::{
    add_minutes, day_of_week, days_in_range, end_of_day, parse_date, parse_time_to_minutes,
    start_of_day, window_instant, MINUTES_PER_DAY,
};

/// Candidate slots for a date range, before anything is written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotPlan {
    pub slots: Vec<NewSlot>,
    /// Candidates dropped because their start instant is already taken.
    pub duplicates: usize,
}

/// Expands active weekly windows into fixed-length slots for every day in
/// `[start, end]`. A slot is emitted only if it ends within its window.
/// Starts present in `existing` are skipped, which makes generation
/// idempotent.
pub fn plan_slots(
    doctor_id: Uuid,
    windows: &[WeeklyAvailabilityWindow],
    start: NaiveDate,
    end: NaiveDate,
    slot_minutes: i64,
    existing: &HashSet<DateTime<Utc>>,
) -> Result<SlotPlan, AvailabilityError> {
    let mut plan = SlotPlan::default();
    let mut seen: HashSet<DateTime<Utc>> = existing.clone();

    for day in days_in_range(start, end) {
        let weekday = day_of_week(day);

        for window in windows.iter().filter(|w| w.is_active && w.day_of_week == weekday) {
            let window_start = parse_time_to_minutes(&window.start_time)?;
            let window_end = parse_time_to_minutes(&window.end_time)?;

            let mut offset = window_start;
            while let Some(next) = offset.checked_add(slot_minutes).filter(|next| *next <= window_end) {
                // local times that do not exist are skipped
                if let Some(slot_start) = window_instant(day, offset) {
                    if seen.insert(slot_start) {
                        plan.slots.push(NewSlot {
                            doctor_id,
                            slot_start_time: slot_start,
                            slot_end_time: add_minutes(slot_start, slot_minutes),
                        });
                    } else {
                        plan.duplicates += 1;
                    }
                }
                offset = next;
            }
        }
    }

    Ok(plan)
}

/// Resolves `date` or `start_date`/`end_date` into inclusive instant bounds.
fn date_bounds(
    date: Option<&str>,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), AvailabilityError> {
    if let Some(date) = date {
        let day = parse_date(date)?;
        return Ok((Some(start_of_day(day)), Some(end_of_day(day))));
    }

    let from = start_date.map(parse_date).transpose()?.map(start_of_day);
    let to = end_date.map(parse_date).transpose()?.map(end_of_day);
    Ok((from, to))
}

pub struct SlotService {
    store: Arc<dyn SchedulingStore>,
    batch_size: usize,
}

impl SlotService {
    pub fn new(store: Arc<dyn SchedulingStore>, config: &SchedulingConfig) -> Self {
        Self {
            store,
            batch_size: config.slot_batch_size.max(1),
        }
    }

    #[instrument(skip(self, request), fields(doctor_id = %doctor_id))]
    pub async fn generate_slots(
        &self,
        doctor_id: Uuid,
        request: GenerateSlotsRequest,
    ) -> Result<GenerateSlotsResponse, AvailabilityError> {
        if request.slot_duration_minutes <= 0 {
            return Err(AvailabilityError::Validation(
                "slot_duration_minutes must be a positive number of minutes".to_string(),
            ));
        }
        if request.slot_duration_minutes > MINUTES_PER_DAY {
            return Err(AvailabilityError::Validation(format!(
                "slot_duration_minutes cannot exceed {} minutes",
                MINUTES_PER_DAY
            )));
        }

        let start = parse_date(&request.start_date)?;
        let end = parse_date(&request.end_date)?;
        if end < start {
            return Err(AvailabilityError::Validation(
                "end_date must be on or after start_date".to_string(),
            ));
        }

        let windows = self.store.list_windows(doctor_id, true).await?;
        if windows.is_empty() {
            debug!("Doctor {} has no active windows, nothing to generate", doctor_id);
            return Ok(GenerateSlotsResponse { created: 0, skipped: 0, slots: Vec::new() });
        }

        let existing: HashSet<DateTime<Utc>> = self.store
            .list_slots(&SlotFilter {
                from: Some(start_of_day(start)),
                to: Some(end_of_day(end)),
                ..SlotFilter::for_doctor(doctor_id)
            })
            .await?
            .into_iter()
            .map(|slot| slot.slot_start_time)
            .collect();

        let plan = plan_slots(doctor_id, &windows, start, end, request.slot_duration_minutes, &existing)?;
        let mut skipped = plan.duplicates;
        let mut created = Vec::with_capacity(plan.slots.len());

        for batch in plan.slots.chunks(self.batch_size) {
            let inserted = self.store.insert_slots(batch).await?;
            // rows another writer inserted first
            skipped += batch.len() - inserted.len();
            created.extend(inserted);
        }

        info!("Generated {} slots for doctor {} ({} skipped)", created.len(), doctor_id, skipped);
        Ok(GenerateSlotsResponse { created: created.len(), skipped, slots: created })
    }

    pub async fn list_slots(&self, doctor_id: Uuid, query: SlotQuery)
        -> Result<SlotListResponse, AvailabilityError> {
        let (from, to) = date_bounds(
            query.date.as_deref(),
            query.start_date.as_deref(),
            query.end_date.as_deref(),
        )?;
        let statuses = query.status.as_deref().map(parse_status_list).transpose()?.unwrap_or_default();

        let slots = self.store
            .list_slots(&SlotFilter { from, to, statuses, ..SlotFilter::for_doctor(doctor_id) })
            .await?;

        Ok(slots.into())
    }

    pub async fn list_available_slots(&self, doctor_id: Uuid, query: AvailableSlotsQuery)
        -> Result<SlotListResponse, AvailabilityError> {
        let (from, to) = date_bounds(
            query.date.as_deref(),
            query.start_date.as_deref(),
            query.end_date.as_deref(),
        )?;

        let slots = self.store
            .list_slots(&SlotFilter {
                from,
                to,
                statuses: vec![SlotStatus::Available],
                limit: query.limit.map(|limit| limit.max(1)),
                ..SlotFilter::for_doctor(doctor_id)
            })
            .await?;

        Ok(slots.into())
    }

    /// Takes AVAILABLE slots of this doctor out of circulation. Slots that are
    /// unknown, foreign, or not AVAILABLE are left untouched and reported.
    pub async fn block_slots(&self, doctor_id: Uuid, request: BlockSlotsRequest)
        -> Result<BlockSlotsResponse, AvailabilityError> {
        if request.slot_ids.is_empty() {
            return Err(AvailabilityError::Validation("slot_ids are required".to_string()));
        }

        if let Some(reason) = request.reason.as_deref() {
            info!("Doctor {} blocking {} slots: {}", doctor_id, request.slot_ids.len(), reason);
        }

        let mut blocked = Vec::new();
        let mut skipped_ids = Vec::new();

        for slot_id in request.slot_ids {
            match self.store.block_slot(doctor_id, slot_id).await? {
                Some(slot) => blocked.push(slot),
                None => skipped_ids.push(slot_id),
            }
        }

        if !skipped_ids.is_empty() {
            debug!("Skipped {} slots that could not be blocked", skipped_ids.len());
        }

        Ok(BlockSlotsResponse {
            updated_count: blocked.len(),
            slots: blocked,
            skipped_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(day_of_week: i32, start: &str, end: &str) -> WeeklyAvailabilityWindow {
        let now = Utc::now();
        WeeklyAvailabilityWindow {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            day_of_week,
            start_time: start.to_string(),
            end_time: end.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn slots_must_fit_inside_the_window() {
        // 2030-01-07 is a Monday
        let monday = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let plan = plan_slots(
            Uuid::new_v4(),
            &[window(1, "09:00", "10:00")],
            monday,
            monday,
            25,
            &HashSet::new(),
        ).unwrap();

        // 09:00 and 09:25 fit, 09:50 would end at 10:15
        assert_eq!(plan.slots.len(), 2);
        assert!(plan.slots.iter().all(|s| s.slot_end_time - s.slot_start_time == chrono::Duration::minutes(25)));
    }

    #[test]
    fn existing_starts_are_counted_as_duplicates() {
        let monday = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let windows = [window(1, "09:00", "10:00")];
        let first = plan_slots(Uuid::new_v4(), &windows, monday, monday, 30, &HashSet::new()).unwrap();

        let existing: HashSet<_> = first.slots.iter().map(|s| s.slot_start_time).take(1).collect();
        let second = plan_slots(Uuid::new_v4(), &windows, monday, monday, 30, &existing).unwrap();

        assert_eq!(second.slots.len(), 1);
        assert_eq!(second.duplicates, 1);
    }

    #[test]
    fn inactive_windows_and_other_weekdays_produce_nothing() {
        let monday = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let mut inactive = window(1, "09:00", "12:00");
        inactive.is_active = false;

        let plan = plan_slots(
            Uuid::new_v4(),
            &[inactive, window(3, "09:00", "12:00")],
            monday,
            monday,
            30,
            &HashSet::new(),
        ).unwrap();

        assert_eq!(plan, SlotPlan::default());
    }

    #[test]
    fn oversized_durations_plan_nothing() {
        let monday = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let plan = plan_slots(
            Uuid::new_v4(),
            &[window(1, "09:00", "17:00")],
            monday,
            monday,
            i64::MAX - 100,
            &HashSet::new(),
        ).unwrap();

        assert_eq!(plan, SlotPlan::default());
    }

    #[test]
    fn date_filter_prefers_single_date() {
        let (from, to) = date_bounds(Some("2030-01-07"), Some("2030-01-01"), None).unwrap();
        let day = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        assert_eq!(from, Some(start_of_day(day)));
        assert_eq!(to, Some(end_of_day(day)));

        let (from, to) = date_bounds(None, None, Some("2030-01-07")).unwrap();
        assert_eq!(from, None);
        assert_eq!(to, Some(end_of_day(day)));
    }
}
