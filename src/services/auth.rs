use axum::http::HeaderMap;
use base64::Engine;
use hmac::{Hmac, Mac};
use rusqlite::Connection;
use sha1::Sha1;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Caller, Role, User};

/// Keyed digest of an API token; only the digest is ever stored.
pub fn hash_token(secret: &str, token: &str) -> anyhow::Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid token secret: {e}"))?;
    mac.update(token.as_bytes());
    let digest = mac.finalize().into_bytes();
    Ok(base64::engine::general_purpose::STANDARD.encode(digest))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolves the request's bearer token to the caller it belongs to.
pub fn authenticate(conn: &Connection, secret: &str, headers: &HeaderMap) -> Result<Caller, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    let token_hash = hash_token(secret, token)?;

    match queries::get_user_by_token_hash(conn, &token_hash)? {
        Some(user) => Ok(Caller::from(&user)),
        None => {
            tracing::warn!("rejected unknown API token");
            Err(AppError::Unauthorized)
        }
    }
}

pub fn check_admin(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    match bearer_token(headers) {
        Some(token) if token == expected_token => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

/// Creates a user and returns it along with its freshly issued API token.
/// The token is not recoverable afterwards.
pub fn register_user(
    conn: &Connection,
    secret: &str,
    username: &str,
    role: Role,
) -> Result<(User, String), AppError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("username is required".to_string()));
    }

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        username: username.to_string(),
        role,
        push_token: None,
    };
    let token = uuid::Uuid::new_v4().simple().to_string();
    let token_hash = hash_token(secret, &token)?;

    queries::insert_user(conn, &user, &token_hash).map_err(|e| {
        if is_constraint_violation(&e) {
            AppError::Conflict(format!("username already taken: {username}"))
        } else {
            AppError::Internal(e)
        }
    })?;

    tracing::info!(user = %user.id, role = role.as_str(), "registered user");
    Ok((user, token))
}

fn is_constraint_violation(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
