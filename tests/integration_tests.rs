use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, SubsecRound, Utc};
use tower::ServiceExt;

use gymbook::config::AppConfig;
use gymbook::db;
use gymbook::handlers;
use gymbook::models::User;
use gymbook::services::notify::NotificationSink;
use gymbook::state::AppState;

// ── Mock Notification Sink ──

type Sent = Arc<Mutex<Vec<(String, String, serde_json::Value)>>>;

struct RecordingSink {
    sent: Sent,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(
        &self,
        user: &User,
        title: &str,
        _body: &str,
        data: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((user.id.clone(), title.to_string(), data));
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn notify(
        &self,
        _user: &User,
        _title: &str,
        _body: &str,
        _data: serde_json::Value,
    ) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("push gateway unreachable"))
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_token: "test-admin".to_string(),
        token_secret: "test-secret".to_string(),
        opening_hour: 8,
        closing_hour: 22,
        slot_minutes: 60,
        utc_offset_minutes: 0,
        push_api_url: String::new(),
    }
}

fn test_state_with_sent() -> (Arc<AppState>, Sent) {
    let conn = db::init_db(":memory:").unwrap();
    let sent: Sent = Arc::new(Mutex::new(vec![]));
    let sink = RecordingSink {
        sent: Arc::clone(&sent),
    };
    (Arc::new(AppState::new(conn, test_config(), Box::new(sink))), sent)
}

fn test_state() -> Arc<AppState> {
    test_state_with_sent().0
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::router(state)
}

async fn send(
    state: &Arc<AppState>,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = test_app(state.clone()).oneshot(request).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Registers a user through the admin API, returning `(id, token)`.
async fn register(state: &Arc<AppState>, username: &str, role: &str) -> (String, String) {
    let (status, json) = send(
        state,
        "POST",
        "/api/admin/users",
        Some("test-admin"),
        Some(serde_json::json!({"username": username, "role": role})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (
        json["id"].as_str().unwrap().to_string(),
        json["token"].as_str().unwrap().to_string(),
    )
}

async fn book(
    state: &Arc<AppState>,
    token: &str,
    start: &str,
    end: &str,
    trainer_id: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    send(
        state,
        "POST",
        "/api/bookings",
        Some(token),
        Some(serde_json::json!({
            "start_time": start,
            "end_time": end,
            "trainer_id": trainer_id,
            "notes": "upper body",
        })),
    )
    .await
}

// ── Health & Auth ──

#[tokio::test]
async fn test_health() {
    let state = test_state();
    let (status, json) = send(&state, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_requires_auth() {
    let state = test_state();
    let (status, _) = send(&state, "GET", "/api/slots/available?date=2024-06-01", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &state,
        "GET",
        "/api/slots/available?date=2024-06-01",
        Some("bogus"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_requires_admin_token() {
    let state = test_state();
    let (status, _) = send(
        &state,
        "POST",
        "/api/admin/users",
        Some("wrong"),
        Some(serde_json::json!({"username": "x", "role": "member"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ── Available Slots ──

#[tokio::test]
async fn test_available_slots_excludes_approved_booking() {
    let state = test_state();
    let (_, member) = register(&state, "alice", "member").await;

    let (status, _) = book(
        &state,
        &member,
        "2024-06-01T10:00:00Z",
        "2024-06-01T11:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(
        &state,
        "GET",
        "/api/slots/available?date=2024-06-01",
        Some(&member),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let slots: Vec<String> = serde_json::from_value(json).unwrap();
    assert_eq!(slots.len(), 13);
    assert!(!slots.contains(&"10:00".to_string()));
    assert!(slots.contains(&"08:00".to_string()));
    assert!(slots.contains(&"21:00".to_string()));
    assert!(!slots.contains(&"22:00".to_string()));
}

#[tokio::test]
async fn test_available_slots_is_idempotent() {
    let state = test_state();
    let (_, member) = register(&state, "alice", "member").await;

    let uri = "/api/slots/available?date=2024-06-05";
    let (_, first) = send(&state, "GET", uri, Some(&member), None).await;
    let (_, second) = send(&state, "GET", uri, Some(&member), None).await;
    assert_eq!(first, second);
    assert_eq!(first.as_array().unwrap().len(), 14);
}

#[tokio::test]
async fn test_available_slots_bad_date() {
    let state = test_state();
    let (_, member) = register(&state, "alice", "member").await;

    let (status, json) = send(&state, "GET", "/api/slots/available", Some(&member), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("required"));

    let (status, _) = send(
        &state,
        "GET",
        "/api/slots/available?date=June-1",
        Some(&member),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Booking Lifecycle ──

#[tokio::test]
async fn test_invalid_interval_rejected_and_nothing_stored() {
    let state = test_state();
    let (_, member) = register(&state, "alice", "member").await;

    let (status, _) = book(
        &state,
        &member,
        "2024-06-01T11:00:00Z",
        "2024-06-01T10:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = send(&state, "GET", "/api/bookings", Some(&member), None).await;
    assert_eq!(json.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_malformed_booking_body_is_a_validation_error() {
    let state = test_state();
    let (_, member) = register(&state, "alice", "member").await;

    let bodies = [
        serde_json::json!({"start_time": "2024-06-01T10:00:00Z"}),
        serde_json::json!({"start_time": "June 1st", "end_time": "2024-06-01T11:00:00Z"}),
    ];
    for body in bodies {
        let (status, json) = send(&state, "POST", "/api/bookings", Some(&member), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    let (_, json) = send(&state, "GET", "/api/bookings", Some(&member), None).await;
    assert_eq!(json.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_dates_at_calendar_limit_are_rejected_and_service_stays_up() {
    let state = test_state();
    let (_, member) = register(&state, "alice", "member").await;

    let (status, json) = send(
        &state,
        "GET",
        "/api/slots/available?date=%2B262142-12-31",
        Some(&member),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (status, json) = send(
        &state,
        "GET",
        "/api/slots/available?date=2024-06-01",
        Some(&member),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 14);
}

#[tokio::test]
async fn test_unknown_trainer_degrades_to_self_practice() {
    let state = test_state();
    let (other_member_id, _) = register(&state, "bob", "member").await;
    let (_, member) = register(&state, "alice", "member").await;

    for (i, trainer_ref) in [other_member_id.as_str(), "no-such-user"].into_iter().enumerate() {
        let start = format!("2024-06-0{}T10:00:00Z", i + 1);
        let end = format!("2024-06-0{}T11:00:00Z", i + 1);
        let (status, json) = book(&state, &member, &start, &end, Some(trainer_ref)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["status"], "approved");
        assert!(json["trainer_id"].is_null());
    }
}

#[tokio::test]
async fn test_trainer_approval_flow() {
    let (state, sent) = test_state_with_sent();
    let (member_id, member) = register(&state, "alice", "member").await;
    let (trainer_id, trainer) = register(&state, "coach", "trainer").await;

    let (status, json) = book(
        &state,
        &member,
        "2024-06-01T10:00:00Z",
        "2024-06-01T11:00:00Z",
        Some(&trainer_id),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "pending");
    assert_eq!(json["trainer_id"], trainer_id.as_str());
    let booking_id = json["id"].as_str().unwrap().to_string();

    // Pending requests leave the slot open.
    let (_, slots) = send(
        &state,
        "GET",
        "/api/slots/available?date=2024-06-01",
        Some(&member),
        None,
    )
    .await;
    assert_eq!(slots.as_array().unwrap().len(), 14);

    // The member cannot approve their own request.
    let uri = format!("/api/bookings/{booking_id}/approve");
    let (status, _) = send(&state, "POST", &uri, Some(&member), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(&state, "POST", &uri, Some(&trainer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "booking approved");
    assert_eq!(json["booking"]["status"], "approved");

    {
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, member_id);
        assert_eq!(sent[0].1, "Booking approved");
        assert_eq!(sent[0].2["booking_id"], booking_id.as_str());
    }

    let (status, json) = send(&state, "POST", &uri, Some(&trainer), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "booking was not in pending state");
    assert_eq!(sent.lock().unwrap().len(), 1);

    let (_, json) = send(
        &state,
        "GET",
        &format!("/api/bookings/{booking_id}"),
        Some(&member),
        None,
    )
    .await;
    assert_eq!(json["status"], "approved");

    // Now the slot is taken.
    let (_, slots) = send(
        &state,
        "GET",
        "/api/slots/available?date=2024-06-01",
        Some(&member),
        None,
    )
    .await;
    assert_eq!(slots.as_array().unwrap().len(), 13);
}

#[tokio::test]
async fn test_reject_then_approve_fails() {
    let (state, sent) = test_state_with_sent();
    let (_, member) = register(&state, "alice", "member").await;
    let (trainer_id, trainer) = register(&state, "coach", "trainer").await;

    let (_, json) = book(
        &state,
        &member,
        "2024-06-01T10:00:00Z",
        "2024-06-01T11:00:00Z",
        Some(&trainer_id),
    )
    .await;
    let booking_id = json["id"].as_str().unwrap().to_string();

    let (status, json) = send(
        &state,
        "POST",
        &format!("/api/bookings/{booking_id}/reject"),
        Some(&trainer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "booking rejected");
    assert_eq!(sent.lock().unwrap()[0].1, "Booking rejected");

    let (status, _) = send(
        &state,
        "POST",
        &format!("/api/bookings/{booking_id}/approve"),
        Some(&trainer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_decision_by_other_trainer_forbidden_and_unknown_not_found() {
    let state = test_state();
    let (_, member) = register(&state, "alice", "member").await;
    let (trainer_id, _) = register(&state, "coach", "trainer").await;
    let (_, other_trainer) = register(&state, "coach2", "trainer").await;

    let (_, json) = book(
        &state,
        &member,
        "2024-06-01T10:00:00Z",
        "2024-06-01T11:00:00Z",
        Some(&trainer_id),
    )
    .await;
    let booking_id = json["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &state,
        "POST",
        &format!("/api/bookings/{booking_id}/approve"),
        Some(&other_trainer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &state,
        "GET",
        &format!("/api/bookings/{booking_id}"),
        Some(&other_trainer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &state,
        "POST",
        "/api/bookings/does-not-exist/reject",
        Some(&other_trainer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_notification_failure_does_not_roll_back() {
    let conn = db::init_db(":memory:").unwrap();
    let state = Arc::new(AppState::new(conn, test_config(), Box::new(FailingSink)));
    let (_, member) = register(&state, "alice", "member").await;
    let (trainer_id, trainer) = register(&state, "coach", "trainer").await;

    let (_, json) = book(
        &state,
        &member,
        "2024-06-01T10:00:00Z",
        "2024-06-01T11:00:00Z",
        Some(&trainer_id),
    )
    .await;
    let booking_id = json["id"].as_str().unwrap().to_string();

    let (status, json) = send(
        &state,
        "POST",
        &format!("/api/bookings/{booking_id}/approve"),
        Some(&trainer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["booking"]["status"], "approved");
}

#[tokio::test]
async fn test_overlapping_self_practice_conflicts() {
    let state = test_state();
    let (_, alice) = register(&state, "alice", "member").await;
    let (_, bob) = register(&state, "bob", "member").await;

    let (status, _) = book(&state, &alice, "2024-06-01T10:00:00Z", "2024-06-01T11:00:00Z", None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = book(&state, &bob, "2024-06-01T10:00:00Z", "2024-06-01T11:00:00Z", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_member_cancels_booking() {
    let state = test_state();
    let (_, member) = register(&state, "alice", "member").await;

    let (_, json) = book(&state, &member, "2024-06-01T10:00:00Z", "2024-06-01T11:00:00Z", None).await;
    let booking_id = json["id"].as_str().unwrap().to_string();
    let uri = format!("/api/bookings/{booking_id}/cancel");

    let (status, json) = send(&state, "POST", &uri, Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");

    let (status, _) = send(&state, "POST", &uri, Some(&member), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, slots) = send(
        &state,
        "GET",
        "/api/slots/available?date=2024-06-01",
        Some(&member),
        None,
    )
    .await;
    assert_eq!(slots.as_array().unwrap().len(), 14);
}

// ── Queries ──

#[tokio::test]
async fn test_list_bookings_role_scoped() {
    let state = test_state();
    let (member_id, member) = register(&state, "alice", "member").await;
    let (_, other_member) = register(&state, "bob", "member").await;
    let (trainer_id, trainer) = register(&state, "coach", "trainer").await;
    let (_, manager) = register(&state, "boss", "manager").await;

    book(&state, &member, "2024-06-01T10:00:00Z", "2024-06-01T11:00:00Z", None).await;
    book(&state, &member, "2024-06-03T10:00:00Z", "2024-06-03T11:00:00Z", Some(&trainer_id)).await;
    book(&state, &other_member, "2024-06-02T10:00:00Z", "2024-06-02T11:00:00Z", Some(&trainer_id)).await;

    let (_, json) = send(&state, "GET", "/api/bookings", Some(&member), None).await;
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert!(list[0]["start_time"]
        .as_str()
        .unwrap()
        .starts_with("2024-06-03T10:00:00"));

    let (_, json) = send(&state, "GET", "/api/bookings", Some(&trainer), None).await;
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert!(list[0]["start_time"]
        .as_str()
        .unwrap()
        .starts_with("2024-06-03T10:00:00"));

    let (status, json) = send(&state, "GET", "/api/bookings", Some(&manager), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 0);

    // Member history needs an active assignment.
    let uri = format!("/api/bookings?member_id={member_id}");
    let (status, _) = send(&state, "GET", &uri, Some(&trainer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &state,
        "POST",
        "/api/admin/assignments",
        Some("test-admin"),
        Some(serde_json::json!({"trainer_id": trainer_id, "member_id": member_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&state, "GET", &uri, Some(&trainer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (_, json) = send(&state, "GET", "/api/trainer/members", Some(&trainer), None).await;
    assert_eq!(json.as_array().unwrap()[0]["id"], member_id.as_str());
}

#[tokio::test]
async fn test_booked_slots_by_month() {
    let state = test_state();
    let (_, member) = register(&state, "alice", "member").await;

    book(&state, &member, "2024-06-01T10:00:00Z", "2024-06-01T11:00:00Z", None).await;
    book(&state, &member, "2024-06-20T10:00:00Z", "2024-06-20T11:00:00Z", None).await;
    book(&state, &member, "2024-07-01T10:00:00Z", "2024-07-01T11:00:00Z", None).await;

    let (status, json) = send(
        &state,
        "GET",
        "/api/slots/booked?month=6&year=2024",
        Some(&member),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (status, json) = send(&state, "GET", "/api/slots/booked?month=6", Some(&member), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("must be integers"));

    let (status, _) = send(
        &state,
        "GET",
        "/api/slots/booked?month=six&year=2024",
        Some(&member),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upcoming_booking() {
    let state = test_state();
    let (_, member) = register(&state, "alice", "member").await;
    let (trainer_id, _) = register(&state, "coach", "trainer").await;

    let (status, json) = send(&state, "GET", "/api/bookings/upcoming", Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.is_null());

    let now = Utc::now().trunc_subsecs(0);
    let at = |days: i64| {
        let start = now + Duration::days(days);
        (start.to_rfc3339(), (start + Duration::hours(1)).to_rfc3339())
    };

    let (past_start, past_end) = at(-1);
    book(&state, &member, &past_start, &past_end, None).await;
    let (pending_start, pending_end) = at(1);
    book(&state, &member, &pending_start, &pending_end, Some(&trainer_id)).await;
    let (next_start, next_end) = at(2);
    let (_, expected) = book(&state, &member, &next_start, &next_end, None).await;
    let (later_start, later_end) = at(3);
    book(&state, &member, &later_start, &later_end, None).await;

    let (status, json) = send(&state, "GET", "/api/bookings/upcoming", Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], expected["id"]);
}

#[tokio::test]
async fn test_trainer_directory_and_push_token() {
    let state = test_state();
    let (_, member) = register(&state, "alice", "member").await;
    register(&state, "coach", "trainer").await;

    let (status, json) = send(&state, "GET", "/api/trainers", Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    let trainers = json.as_array().unwrap();
    assert_eq!(trainers.len(), 1);
    assert_eq!(trainers[0]["username"], "coach");

    let (status, _) = send(
        &state,
        "POST",
        "/api/me/push-token",
        Some(&member),
        Some(serde_json::json!({"token": "ExponentPushToken[abc]"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&state, "GET", "/api/trainer/members", Some(&member), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
