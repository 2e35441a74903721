use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::handlers::bookings::BookingResponse;
use crate::services::{auth, availability, listing};
use crate::state::AppState;

// GET /api/slots/available?date=YYYY-MM-DD
#[derive(Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: Option<String>,
}

pub async fn available_slots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    let db = state.db()?;
    auth::authenticate(&db, &state.config.token_secret, &headers)?;

    let date = availability::parse_date(query.date.as_deref())?;
    let slots = availability::available_slots(&db, &state.hours, &state.config.timezone(), date)?;
    Ok(Json(slots))
}

// GET /api/slots/booked?month=&year=
#[derive(Deserialize)]
pub struct BookedSlotsQuery {
    pub month: Option<String>,
    pub year: Option<String>,
}

pub async fn booked_slots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookedSlotsQuery>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let db = state.db()?;
    let caller = auth::authenticate(&db, &state.config.token_secret, &headers)?;

    let (year, month) = listing::parse_month(query.month.as_deref(), query.year.as_deref())?;
    let tz = state.config.timezone();
    let bookings = match listing::scoped_member(&caller) {
        Some(member_id) => listing::booked_in_month(&db, &tz, member_id, year, month)?,
        None => vec![],
    };

    Ok(Json(
        bookings
            .iter()
            .map(|b| BookingResponse::from_booking(b, &tz))
            .collect(),
    ))
}

// GET /api/bookings/upcoming
pub async fn upcoming_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Option<BookingResponse>>, AppError> {
    let db = state.db()?;
    let caller = auth::authenticate(&db, &state.config.token_secret, &headers)?;

    let upcoming = match listing::scoped_member(&caller) {
        Some(member_id) => listing::next_upcoming(&db, member_id, &chrono::Utc::now())?,
        None => None,
    };

    let tz = state.config.timezone();
    Ok(Json(upcoming.map(|b| BookingResponse::from_booking(&b, &tz))))
}
