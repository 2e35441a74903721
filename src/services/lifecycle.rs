use chrono::{DateTime, Datelike, SubsecRound, Utc};
use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Caller, Decision, Role, User};
use crate::services::directory;
use crate::services::notify::notify_best_effort;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub trainer_id: Option<String>,
    pub notes: Option<String>,
}

/// Creates a booking owned by `caller`.
///
/// Naming a valid trainer yields a `Pending` request bound to them. Without
/// one, or when the id does not resolve to a trainer, the booking is
/// self-practice and approved immediately. Approved bookings are re-checked
/// against approved bookings on the same resource inside the write
/// transaction.
pub fn create_booking(
    conn: &mut Connection,
    caller: &Caller,
    new: NewBooking,
    now: DateTime<Utc>,
) -> Result<Booking, AppError> {
    if caller.role != Role::Member {
        return Err(AppError::Forbidden("only members can create bookings".to_string()));
    }

    if new.end_time <= new.start_time {
        return Err(AppError::Validation(
            "End time must be after start time.".to_string(),
        ));
    }
    for t in [&new.start_time, &new.end_time] {
        if !(1..=9999).contains(&t.year()) {
            return Err(AppError::Validation(format!("booking time out of range: {t}")));
        }
    }

    // Stored at whole-second precision.
    let start_time = new.start_time.trunc_subsecs(0);
    let end_time = new.end_time.trunc_subsecs(0);
    if end_time <= start_time {
        return Err(AppError::Validation(
            "Booking must span at least one whole second.".to_string(),
        ));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let trainer = match new.trainer_id.as_deref() {
        Some(id) => {
            let trainer = directory::resolve_trainer(&tx, id)?;
            if trainer.is_none() {
                tracing::warn!(
                    member = %caller.id,
                    trainer_id = id,
                    "unknown trainer reference, booking as self-practice"
                );
            }
            trainer
        }
        None => None,
    };

    let status = if trainer.is_some() {
        BookingStatus::Pending
    } else {
        BookingStatus::Approved
    };

    let now = now.trunc_subsecs(0);
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        member_id: caller.id.clone(),
        trainer_id: trainer.map(|t| t.id),
        start_time,
        end_time,
        status,
        notes: new.notes.filter(|n| !n.trim().is_empty()),
        created_at: now,
        updated_at: now,
    };

    if booking.status == BookingStatus::Approved {
        ensure_resource_free(&tx, &booking)?;
    }
    queries::insert_booking(&tx, &booking).map_err(slot_conflict)?;
    tx.commit()?;

    tracing::info!(
        booking = %booking.id,
        member = %booking.member_id,
        trainer = ?booking.trainer_id,
        status = booking.status.as_str(),
        "booking created"
    );
    Ok(booking)
}

/// Applies a trainer decision and returns the updated booking together with
/// the member to notify.
pub fn apply_decision(
    conn: &mut Connection,
    caller: &Caller,
    booking_id: &str,
    decision: Decision,
    now: DateTime<Utc>,
) -> Result<(Booking, Option<User>), AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut booking = queries::get_booking_by_id(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if caller.role != Role::Trainer || !booking.is_bound_to(&caller.id) {
        tracing::warn!(caller = %caller.id, booking = booking_id, "decision by unbound caller");
        return Err(AppError::Forbidden(
            "only the bound trainer can decide on this booking".to_string(),
        ));
    }

    let next = booking
        .status
        .decide(decision)
        .ok_or_else(|| AppError::InvalidState("booking was not in pending state".to_string()))?;

    if next == BookingStatus::Approved {
        ensure_resource_free(&tx, &booking)?;
    }

    let now = now.trunc_subsecs(0);
    queries::update_booking_status(&tx, &booking.id, next, &now).map_err(slot_conflict)?;
    let member = queries::get_user(&tx, &booking.member_id)?;
    tx.commit()?;

    booking.status = next;
    booking.updated_at = now;

    tracing::info!(
        booking = %booking.id,
        trainer = %caller.id,
        decision = decision.past_tense(),
        "booking decided"
    );
    Ok((booking, member))
}

/// Approve or reject a pending booking, then tell its member.
pub async fn decide(
    state: &AppState,
    caller: &Caller,
    booking_id: &str,
    decision: Decision,
) -> Result<Booking, AppError> {
    let (booking, member) = {
        let mut db = state.db()?;
        apply_decision(&mut db, caller, booking_id, decision, Utc::now())?
    };

    if let Some(member) = member {
        let title = match decision {
            Decision::Approve => "Booking approved",
            Decision::Reject => "Booking rejected",
        };
        let local_start = booking.start_time.with_timezone(&state.config.timezone());
        let body = format!(
            "Your session on {} was {}.",
            local_start.format("%Y-%m-%d %H:%M"),
            decision.past_tense()
        );
        let data = serde_json::json!({
            "booking_id": booking.id,
            "status": booking.status.as_str(),
            "screen": "MyBookings",
        });
        notify_best_effort(state.notifier.as_ref(), &member, title, &body, data).await;
    }

    Ok(booking)
}

/// Soft-cancels a booking on behalf of its owning member.
pub fn cancel_booking(
    conn: &Connection,
    caller: &Caller,
    booking_id: &str,
    now: DateTime<Utc>,
) -> Result<Booking, AppError> {
    let mut booking = queries::get_booking_by_id(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if booking.member_id != caller.id {
        return Err(AppError::Forbidden(
            "only the owning member can cancel this booking".to_string(),
        ));
    }

    let next = booking
        .status
        .withdraw()
        .ok_or_else(|| AppError::InvalidState("booking is already cancelled".to_string()))?;

    let now = now.trunc_subsecs(0);
    queries::update_booking_status(conn, &booking.id, next, &now)?;
    booking.status = next;
    booking.updated_at = now;

    tracing::info!(booking = %booking.id, member = %caller.id, "booking cancelled by member");
    Ok(booking)
}

/// Reads a booking visible to its owner or bound trainer.
pub fn get_booking(conn: &Connection, caller: &Caller, booking_id: &str) -> Result<Booking, AppError> {
    let booking = queries::get_booking_by_id(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if booking.member_id == caller.id || booking.is_bound_to(&caller.id) {
        Ok(booking)
    } else {
        Err(AppError::Forbidden("not your booking".to_string()))
    }
}

fn ensure_resource_free(conn: &Connection, booking: &Booking) -> Result<(), AppError> {
    let taken = queries::approved_overlap_exists(
        conn,
        booking.trainer_id.as_deref(),
        &booking.start_time,
        &booking.end_time,
        Some(&booking.id),
    )?;
    if taken {
        return Err(AppError::Conflict("time slot is already booked".to_string()));
    }
    Ok(())
}

fn slot_conflict(e: rusqlite::Error) -> AppError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            AppError::Conflict("time slot is already booked".to_string())
        }
        _ => AppError::Database(e),
    }
}
