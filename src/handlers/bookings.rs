use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Booking, Decision};
use crate::services::lifecycle::{self, NewBooking};
use crate::services::{auth, listing};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingResponse {
    pub id: String,
    pub member_id: String,
    pub trainer_id: Option<String>,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<FixedOffset>,
}

impl BookingResponse {
    pub fn from_booking(b: &Booking, tz: &FixedOffset) -> Self {
        Self {
            id: b.id.clone(),
            member_id: b.member_id.clone(),
            trainer_id: b.trainer_id.clone(),
            start_time: b.start_time.with_timezone(tz),
            end_time: b.end_time.with_timezone(tz),
            status: b.status.as_str().to_string(),
            notes: b.notes.clone(),
            created_at: b.created_at.with_timezone(tz),
        }
    }
}

// GET /api/bookings?member_id=
#[derive(Deserialize)]
pub struct ListBookingsQuery {
    pub member_id: Option<String>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let db = state.db()?;
    let caller = auth::authenticate(&db, &state.config.token_secret, &headers)?;

    let member_filter = query.member_id.as_deref().filter(|m| !m.is_empty());
    let bookings = listing::list_bookings(&db, &caller, member_filter)?;

    let tz = state.config.timezone();
    Ok(Json(
        bookings
            .iter()
            .map(|b| BookingResponse::from_booking(b, &tz))
            .collect(),
    ))
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub trainer_id: Option<String>,
    pub notes: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let mut db = state.db()?;
    let caller = auth::authenticate(&db, &state.config.token_secret, &headers)?;
    let Json(body) = payload?;

    let new = NewBooking {
        start_time: body.start_time.with_timezone(&Utc),
        end_time: body.end_time.with_timezone(&Utc),
        trainer_id: body.trainer_id.filter(|t| !t.is_empty()),
        notes: body.notes,
    };
    let booking = lifecycle::create_booking(&mut db, &caller, new, Utc::now())?;

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse::from_booking(&booking, &state.config.timezone())),
    ))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let db = state.db()?;
    let caller = auth::authenticate(&db, &state.config.token_secret, &headers)?;

    let booking = lifecycle::get_booking(&db, &caller, &id)?;
    Ok(Json(BookingResponse::from_booking(&booking, &state.config.timezone())))
}

// POST /api/bookings/:id/approve
pub async fn approve_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    decide(&state, &headers, &id, Decision::Approve).await
}

// POST /api/bookings/:id/reject
pub async fn reject_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    decide(&state, &headers, &id, Decision::Reject).await
}

async fn decide(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    decision: Decision,
) -> Result<Json<serde_json::Value>, AppError> {
    let caller = {
        let db = state.db()?;
        auth::authenticate(&db, &state.config.token_secret, headers)?
    };

    let booking = lifecycle::decide(state, &caller, id, decision).await?;
    Ok(Json(serde_json::json!({
        "status": format!("booking {}", decision.past_tense()),
        "booking": BookingResponse::from_booking(&booking, &state.config.timezone()),
    })))
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let db = state.db()?;
    let caller = auth::authenticate(&db, &state.config.token_secret, &headers)?;

    let booking = lifecycle::cancel_booking(&db, &caller, &id, Utc::now())?;
    Ok(Json(BookingResponse::from_booking(&booking, &state.config.timezone())))
}
