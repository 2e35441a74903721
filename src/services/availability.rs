use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::OpeningHours;

pub fn parse_date(raw: Option<&str>) -> Result<NaiveDate, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Date parameter is required.".to_string()))?;

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("Invalid date format. Use YYYY-MM-DD.".to_string()))
}

/// UTC bounds `[start, end)` of a local calendar day, or `None` when the day
/// sits at the edge of the representable range.
pub fn local_day_bounds(
    tz: &FixedOffset,
    date: NaiveDate,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = local_to_utc(tz, date.and_time(chrono::NaiveTime::MIN))?;
    let end = start.checked_add_signed(Duration::days(1))?;
    Some((start, end))
}

pub fn local_to_utc(tz: &FixedOffset, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    local
        .checked_sub_signed(Duration::seconds(tz.local_minus_utc() as i64))
        .map(|utc| utc.and_utc())
}

/// Open slots on `date`, as `HH:MM` in ascending order. Only approved
/// bookings occupy a slot, and occupancy is gym-wide.
pub fn available_slots(
    conn: &Connection,
    hours: &OpeningHours,
    tz: &FixedOffset,
    date: NaiveDate,
) -> Result<Vec<String>, AppError> {
    let (day_start, day_end) = local_day_bounds(tz, date)
        .ok_or_else(|| AppError::Validation(format!("date out of range: {date}")))?;
    let grid = hours.slots_for(date);

    let booked: Vec<NaiveDateTime> = queries::approved_starts_between(conn, &day_start, &day_end)?
        .into_iter()
        .map(|start| start.with_timezone(tz).naive_local())
        .collect();

    Ok(grid
        .into_iter()
        .filter(|slot| !booked.contains(slot))
        .map(|slot| slot.format("%H:%M").to_string())
        .collect())
}
