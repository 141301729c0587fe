use chrono::NaiveDate;

/// Human-readable consultation number: prefix, booking day as YYYYMMDD, and
/// the day's sequence padded to three digits. Sequences past 999 simply grow
/// wider.
pub fn format_consultation_number(prefix: &str, day: NaiveDate, sequence: u32) -> String {
    format!("{}{}{:03}", prefix, day.format("%Y%m%d"), sequence)
}
