use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::User;
use crate::services::{auth, directory};
use crate::state::AppState;

#[derive(Serialize)]
pub struct UserSummary {
    id: String,
    username: String,
}

impl From<User> for UserSummary {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
        }
    }
}

// GET /api/trainers
pub async fn list_trainers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    let db = state.db()?;
    auth::authenticate(&db, &state.config.token_secret, &headers)?;

    let trainers = directory::list_trainers(&db)?;
    Ok(Json(trainers.into_iter().map(UserSummary::from).collect()))
}

// GET /api/trainer/members
pub async fn my_members(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    let db = state.db()?;
    let caller = auth::authenticate(&db, &state.config.token_secret, &headers)?;

    let members = directory::my_members(&db, &caller)?;
    Ok(Json(members.into_iter().map(UserSummary::from).collect()))
}

// POST /api/me/push-token
#[derive(Deserialize)]
pub struct PushTokenRequest {
    pub token: Option<String>,
}

pub async fn register_push_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<PushTokenRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db()?;
    let caller = auth::authenticate(&db, &state.config.token_secret, &headers)?;
    let Json(body) = payload?;

    let token = body.token.as_deref().map(str::trim).filter(|t| !t.is_empty());
    queries::set_push_token(&db, &caller.id, token)?;
    tracing::info!(user = %caller.id, registered = token.is_some(), "push token updated");

    Ok(Json(serde_json::json!({"ok": true})))
}
