// Pure time arithmetic for availability windows and slots.
//
// Window times are wall-clock times in the server's local zone. Instants are
// stored in UTC.
use std::sync::OnceLock;

use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use regex::Regex;

use crate::models::AvailabilityError;

pub const MINUTES_PER_DAY: i64 = 24 * 60;

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{1,2}):(\d{1,2})(?::(\d{1,2}))?$").expect("time pattern is valid")
    })
}

/// "HH:MM" (24h) to minutes since midnight. A trailing ":SS", as Postgres
/// renders `time` columns, is range-checked and then ignored.
pub fn parse_time_to_minutes(time: &str) -> Result<i64, AvailabilityError> {
    let invalid = || AvailabilityError::Validation(format!("Invalid time format '{}'. Expected HH:MM", time));

    let captures = time_pattern().captures(time.trim()).ok_or_else(invalid)?;
    let hours: i64 = captures[1].parse().map_err(|_| invalid())?;
    let minutes: i64 = captures[2].parse().map_err(|_| invalid())?;
    let seconds: i64 = match captures.get(3) {
        Some(seconds) => seconds.as_str().parse().map_err(|_| invalid())?,
        None => 0,
    };

    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) || !(0..=59).contains(&seconds) {
        return Err(invalid());
    }

    Ok(hours * 60 + minutes)
}

/// Canonical zero-padded "HH:MM".
pub fn format_minutes(minutes: i64) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Maps a local wall-clock time to an instant. Returns `None` when the local
/// time does not exist (DST gap); ambiguous times take the earlier instant.
pub fn local_instant(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|instant| instant.with_timezone(&Utc))
}

fn local_or_shifted(naive: NaiveDateTime) -> DateTime<Utc> {
    local_instant(naive)
        .or_else(|| local_instant(naive + Duration::hours(1)))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// 00:00:00.000 local on `date`.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    local_or_shifted(date.and_time(NaiveTime::MIN))
}

/// 23:59:59.999 local on `date`.
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last_milli = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    local_or_shifted(date.and_time(last_milli))
}

pub fn add_minutes(instant: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    instant + Duration::minutes(minutes)
}

/// 0 = Sunday .. 6 = Saturday.
pub fn day_of_week(date: NaiveDate) -> i32 {
    date.weekday().num_days_from_sunday() as i32
}

/// The instant `minutes` after local midnight of `date`, following the wall
/// clock.
pub fn window_instant(date: NaiveDate, minutes: i64) -> Option<DateTime<Utc>> {
    let naive = date.and_time(NaiveTime::MIN) + Duration::minutes(minutes);
    local_instant(naive)
}

/// Accepts "YYYY-MM-DD" or an RFC 3339 timestamp (its local calendar date).
pub fn parse_date(value: &str) -> Result<NaiveDate, AvailabilityError> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }

    DateTime::parse_from_rfc3339(value)
        .map(|instant| instant.with_timezone(&Local).date_naive())
        .map_err(|_| AvailabilityError::Validation(format!("Invalid date provided: '{}'", value)))
}

/// Half-open interval overlap.
pub fn intervals_overlap<T: PartialOrd>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    a_start < b_end && a_end > b_start
}

/// Every calendar date from `start` to `end`, both inclusive.
pub fn days_in_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}
