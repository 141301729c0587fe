use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use availability_cell::availability_routes;
use consultation_cell::consultation_routes;
use shared_database::store::{NewSlot, SchedulingStore};
use shared_utils::test_utils::{SchedulingFixture, TestUser};

fn app(fixture: &SchedulingFixture) -> Router {
    Router::new()
        .nest("/availability", availability_routes(fixture.context.clone()))
        .nest("/consultations", consultation_routes(fixture.context.clone()))
}

async fn send(app: Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>)
    -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn open_slot(fixture: &SchedulingFixture, doctor_id: Uuid, hours_ahead: i64) -> Uuid {
    let start = Utc::now() + Duration::hours(hours_ahead);
    fixture.store
        .insert_slots(&[NewSlot {
            doctor_id,
            slot_start_time: start,
            slot_end_time: start + Duration::minutes(30),
        }])
        .await
        .unwrap()
        .remove(0)
        .id
}

#[tokio::test]
async fn patient_books_and_doctor_runs_the_visit() {
    let fixture = SchedulingFixture::new();
    let doctor = TestUser::doctor("doc@example.com");
    let doctor_id = fixture.register_doctor(&doctor, 800.0).await;
    let patient = TestUser::patient("pat@example.com");
    let (doctor_token, patient_token) = (fixture.token_for(&doctor), fixture.token_for(&patient));
    let slot_id = open_slot(&fixture, doctor_id, 24).await;

    let (status, booked) = send(
        app(&fixture),
        "POST",
        "/consultations/book",
        Some(&patient_token),
        Some(json!({ "slot_id": slot_id, "consultation_type": "audio", "chief_complaint": "cough" })),
    ).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booked["status"], "scheduled");
    assert_eq!(booked["consultation_type"], "audio");
    assert_eq!(booked["consultation_fee"], 800.0);
    let id = booked["id"].as_str().unwrap().to_string();

    let (status, slots) = send(
        app(&fixture),
        "GET",
        &format!("/availability/doctor/{}", doctor_id),
        None,
        None,
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slots["count"], 0);

    let (status, mine) = send(app(&fixture), "GET", "/consultations/my", Some(&patient_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["total"], 1);
    assert_eq!(mine["page"], 1);

    let (status, started) = send(
        app(&fixture),
        "POST",
        &format!("/consultations/{}/start", id),
        Some(&doctor_token),
        None,
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["status"], "in_progress");

    let (status, completed) = send(
        app(&fixture),
        "POST",
        &format!("/consultations/{}/complete", id),
        Some(&doctor_token),
        Some(json!({ "diagnosis": "viral", "follow_up_required": true, "follow_up_date": "2030-03-01" })),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");
    assert_eq!(completed["follow_up_date"], "2030-03-01");

    let (status, noted) = send(
        app(&fixture),
        "PATCH",
        &format!("/consultations/{}/notes", id),
        Some(&doctor_token),
        Some(json!({ "doctor_notes": "recovered" })),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(noted["doctor_notes"], "recovered");
}

#[tokio::test]
async fn double_booking_is_a_conflict() {
    let fixture = SchedulingFixture::new();
    let doctor_id = fixture.register_doctor(&TestUser::doctor("doc@example.com"), 500.0).await;
    let slot_id = open_slot(&fixture, doctor_id, 24).await;

    let first = fixture.token_for(&TestUser::patient("one@example.com"));
    let second = fixture.token_for(&TestUser::patient("two@example.com"));
    let body = json!({ "slot_id": slot_id });

    let (status, _) = send(app(&fixture), "POST", "/consultations/book", Some(&first), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, error) = send(app(&fixture), "POST", "/consultations/book", Some(&second), Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "Slot not available");
}

#[tokio::test]
async fn cancel_without_body_and_terminal_state_errors() {
    let fixture = SchedulingFixture::new();
    let doctor_id = fixture.register_doctor(&TestUser::doctor("doc@example.com"), 500.0).await;
    let patient = TestUser::patient("pat@example.com");
    let token = fixture.token_for(&patient);
    let slot_id = open_slot(&fixture, doctor_id, 24).await;

    let (_, booked) = send(
        app(&fixture),
        "POST",
        "/consultations/book",
        Some(&token),
        Some(json!({ "slot_id": slot_id })),
    ).await;
    let id = booked["id"].as_str().unwrap().to_string();

    let (status, cancelled) = send(
        app(&fixture),
        "POST",
        &format!("/consultations/{}/cancel", id),
        Some(&token),
        None,
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (status, error) = send(
        app(&fixture),
        "POST",
        &format!("/consultations/{}/cancel", id),
        Some(&token),
        Some(json!({ "reason": "again" })),
    ).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["category"], "invalid_state");
}

#[tokio::test]
async fn access_rules_over_http() {
    let fixture = SchedulingFixture::new();
    let doctor = TestUser::doctor("doc@example.com");
    let doctor_id = fixture.register_doctor(&doctor, 500.0).await;
    let owner = TestUser::patient("owner@example.com");
    let slot_id = open_slot(&fixture, doctor_id, 24).await;

    let (_, booked) = send(
        app(&fixture),
        "POST",
        "/consultations/book",
        Some(&fixture.token_for(&owner)),
        Some(json!({ "slot_id": slot_id })),
    ).await;
    let uri = format!("/consultations/{}", booked["id"].as_str().unwrap());

    let (status, _) = send(app(&fixture), "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stranger = fixture.token_for(&TestUser::patient("stranger@example.com"));
    let (status, _) = send(app(&fixture), "GET", &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = fixture.token_for(&TestUser::admin("admin@example.com"));
    let (status, _) = send(app(&fixture), "GET", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(app(&fixture), "GET", &uri, Some(&fixture.token_for(&doctor)), None).await;
    assert_eq!(status, StatusCode::OK);

    // patients cannot start visits
    let (status, _) = send(
        app(&fixture),
        "POST",
        &format!("{}/start", uri),
        Some(&fixture.token_for(&owner)),
        None,
    ).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        app(&fixture),
        "GET",
        &format!("/consultations/{}", Uuid::new_v4()),
        Some(&admin),
        None,
    ).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
