use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, Caller, Role};
use crate::services::availability::local_to_utc;

/// All bookings owned by `member_id`, newest start first.
pub fn list_for_member(conn: &Connection, member_id: &str) -> anyhow::Result<Vec<Booking>> {
    queries::bookings_for_member(conn, member_id)
}

/// Bookings bound to `trainer_id`, newest start first. With a member filter
/// the trainer instead sees that member's full history, which requires an
/// active assignment between the two.
pub fn list_for_trainer(
    conn: &Connection,
    trainer_id: &str,
    member_filter: Option<&str>,
) -> Result<Vec<Booking>, AppError> {
    match member_filter {
        None => Ok(queries::bookings_for_trainer(conn, trainer_id)?),
        Some(member_id) => {
            if !queries::has_active_assignment(conn, trainer_id, member_id)? {
                tracing::warn!(
                    trainer = trainer_id,
                    member = member_id,
                    "history requested for unassigned member"
                );
                return Err(AppError::Forbidden(
                    "member is not assigned to you".to_string(),
                ));
            }
            Ok(queries::bookings_for_member(conn, member_id)?)
        }
    }
}

/// Role-scoped listing; unrecognized roles see nothing.
pub fn list_bookings(
    conn: &Connection,
    caller: &Caller,
    member_filter: Option<&str>,
) -> Result<Vec<Booking>, AppError> {
    match caller.role {
        Role::Member => Ok(list_for_member(conn, &caller.id)?),
        Role::Trainer => list_for_trainer(conn, &caller.id, member_filter),
        Role::Manager => Ok(vec![]),
    }
}

/// The member whose own calendar a caller may read.
pub fn scoped_member(caller: &Caller) -> Option<&str> {
    match caller.role {
        Role::Member => Some(caller.id.as_str()),
        Role::Trainer | Role::Manager => None,
    }
}

pub fn parse_month(month: Option<&str>, year: Option<&str>) -> Result<(i32, u32), AppError> {
    let invalid =
        || AppError::Validation("Month and year parameters are required and must be integers.".to_string());

    let month: u32 = month.and_then(|m| m.trim().parse().ok()).ok_or_else(invalid)?;
    let year: i32 = year.and_then(|y| y.trim().parse().ok()).ok_or_else(invalid)?;
    if !(1..=12).contains(&month) {
        return Err(AppError::Validation(format!("month out of range: {month}")));
    }
    Ok((year, month))
}

/// A member's bookings starting within the local calendar month.
pub fn booked_in_month(
    conn: &Connection,
    tz: &FixedOffset,
    member_id: &str,
    year: i32,
    month: u32,
) -> Result<Vec<Booking>, AppError> {
    let out_of_range = || AppError::Validation(format!("invalid month: {year}-{month}"));

    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(out_of_range)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(out_of_range)?;

    let start =
        local_to_utc(tz, first.and_time(chrono::NaiveTime::MIN)).ok_or_else(out_of_range)?;
    let end = local_to_utc(tz, next.and_time(chrono::NaiveTime::MIN)).ok_or_else(out_of_range)?;
    Ok(queries::bookings_for_member_between(conn, member_id, &start, &end)?)
}

/// The member's earliest approved booking starting at or after `now`.
pub fn next_upcoming(
    conn: &Connection,
    member_id: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<Option<Booking>> {
    queries::next_approved_for_member(conn, member_id, now)
}
