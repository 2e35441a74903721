use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::Role;
use crate::services::{auth, directory};
use crate::state::AppState;

// POST /api/admin/users
#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub role: Role,
}

#[derive(Serialize)]
pub struct CreateUserResponse {
    id: String,
    username: String,
    role: Role,
    token: String,
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateUserResponse>), AppError> {
    auth::check_admin(&headers, &state.config.admin_token)?;
    let Json(body) = payload?;

    let (user, token) = {
        let db = state.db()?;
        auth::register_user(&db, &state.config.token_secret, &body.username, body.role)?
    };

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            id: user.id,
            username: user.username,
            role: user.role,
            token,
        }),
    ))
}

// POST /api/admin/assignments
#[derive(Deserialize)]
pub struct AssignmentRequest {
    pub trainer_id: String,
    pub member_id: String,
    pub active: Option<bool>,
}

pub async fn set_assignment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<AssignmentRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth::check_admin(&headers, &state.config.admin_token)?;
    let Json(body) = payload?;

    let active = body.active.unwrap_or(true);
    {
        let db = state.db()?;
        directory::set_assignment(&db, &body.trainer_id, &body.member_id, active)?;
    }

    Ok(Json(serde_json::json!({"ok": true, "active": active})))
}
