pub mod admin;
pub mod bookings;
pub mod directory;
pub mod health;
pub mod slots;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/slots/available", get(slots::available_slots))
        .route("/api/slots/booked", get(slots::booked_slots))
        .route("/api/bookings/upcoming", get(slots::upcoming_booking))
        .route(
            "/api/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route("/api/bookings/:id/approve", post(bookings::approve_booking))
        .route("/api/bookings/:id/reject", post(bookings::reject_booking))
        .route("/api/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/api/trainers", get(directory::list_trainers))
        .route("/api/trainer/members", get(directory::my_members))
        .route("/api/me/push-token", post(directory::register_push_token))
        .route("/api/admin/users", post(admin::create_user))
        .route("/api/admin/assignments", post(admin::set_assignment))
        .with_state(state)
}
