//! Tool endpoint tests against the in-memory directory and a mock CRM.

mod support;

use axum::http::StatusCode;
use serde_json::json;

use support::{tenant, MockCrm, TestApp, TENANT_PHONE};
use switchboard_api::CrmError;
use switchboard_core::TenantRecord;

fn app() -> TestApp {
    TestApp::new(vec![tenant("T1", TENANT_PHONE)])
}

// ============================================================================
// FIND OR CREATE CONTACT
// ============================================================================

#[tokio::test]
async fn test_creates_contact_when_search_is_empty() -> Result<(), String> {
    let app = app();
    MockCrm::set(&app.crm.search, 200, json!({ "contacts": [] }));
    MockCrm::set(&app.crm.create, 201, json!({ "contact": { "id": "C9" } }));

    let (status, body) = app
        .post_json(
            "/tools/find_or_create_contact",
            json!({ "client_id": "T1", "phone": "+15551112222", "name": "Ada" }),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "contactId": "C9", "existed": false, "contact": { "id": "C9" } }));
    assert_eq!(app.crm.operations(), vec!["search", "create"]);

    let calls = app.crm.calls();
    assert_eq!(calls[0].token, "tok_T1");
    assert_eq!(calls[0].payload["locationId"], "LOC_T1");
    assert_eq!(
        calls[1].payload,
        json!({ "locationId": "LOC_T1", "phone": "+15551112222", "name": "Ada" })
    );
    Ok(())
}

#[tokio::test]
async fn test_returns_existing_contact_without_create() -> Result<(), String> {
    let app = app();
    MockCrm::set(
        &app.crm.search,
        200,
        json!({ "contacts": [{ "id": "C1", "firstName": "Ada" }] }),
    );

    let (status, body) = app
        .post_json(
            "/tools/find_or_create_contact",
            json!({ "client_id": "T1", "phone": "+15551112222" }),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contactId"], "C1");
    assert_eq!(body["existed"], true);
    assert!(body.get("duplicate").is_none());
    assert_eq!(app.crm.operations(), vec!["search"]);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_create_resolves_to_existing_id() -> Result<(), String> {
    let app = app();
    MockCrm::set(
        &app.crm.create,
        400,
        json!({ "message": "duplicated contact", "meta": { "contactId": "C7" } }),
    );

    let (status, body) = app
        .post_json(
            "/tools/find_or_create_contact",
            json!({ "client_id": "T1", "email": "ada@example.com" }),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contactId"], "C7");
    assert_eq!(body["existed"], true);
    assert_eq!(body["duplicate"], true);
    Ok(())
}

#[tokio::test]
async fn test_search_failure_falls_through_to_create() -> Result<(), String> {
    let app = app();
    MockCrm::fail(&app.crm.search, CrmError::Timeout);
    MockCrm::set(&app.crm.create, 200, json!({ "contact": { "id": "C3" } }));

    let (status, body) = app
        .post_json(
            "/tools/find_or_create_contact",
            json!({ "client_id": "T1", "phone": "+15551112222" }),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contactId"], "C3");
    assert_eq!(app.crm.operations(), vec!["search", "create"]);
    Ok(())
}

#[tokio::test]
async fn test_create_rejection_passes_status_through() -> Result<(), String> {
    let app = app();
    MockCrm::set(&app.crm.create, 422, json!({ "message": "phone invalid" }));

    let (status, body) = app
        .post_json(
            "/tools/find_or_create_contact",
            json!({ "client_id": "T1", "phone": "not-a-phone" }),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "UPSTREAM_ERROR");
    assert_eq!(body["message"], "Failed to create contact");
    assert_eq!(body["details"], json!({ "message": "phone invalid" }));
    Ok(())
}

#[tokio::test]
async fn test_contact_requires_phone_or_email() -> Result<(), String> {
    let app = app();

    let (status, body) = app
        .post_json("/tools/find_or_create_contact", json!({ "client_id": "T1" }), &[])
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
    assert_eq!(app.crm.call_count(), 0);
    assert_eq!(app.directory.query_count(), 0);
    Ok(())
}

// ============================================================================
// AVAILABILITY
// ============================================================================

#[tokio::test]
async fn test_availability_sends_epoch_millis() -> Result<(), String> {
    let app = app();
    MockCrm::set(
        &app.crm.slots,
        200,
        json!({ "2025-10-05": { "slots": ["2025-10-05T09:00:00-07:00"] } }),
    );

    let (status, body) = app
        .post_json(
            "/tools/check_availability",
            json!({
                "client_id": "T1",
                "start_date": "2025-10-05T00:00:00Z",
                "end_date": "2025-10-05T23:59:59Z"
            }),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["slots"]["2025-10-05"]["slots"][0], "2025-10-05T09:00:00-07:00");

    let calls = app.crm.calls();
    assert_eq!(
        calls[0].payload,
        json!({ "calendarId": "CAL_T1", "startDate": 1_759_622_400_000_i64, "endDate": 1_759_708_799_000_i64 })
    );
    Ok(())
}

#[tokio::test]
async fn test_availability_rejects_bad_date_before_upstream() -> Result<(), String> {
    let app = app();

    let (status, body) = app
        .post_json(
            "/tools/check_availability",
            json!({ "client_id": "T1", "start_date": "tomorrow", "end_date": "2025-10-05" }),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_FORMAT");
    assert_eq!(app.crm.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_availability_without_calendar_is_client_error() -> Result<(), String> {
    let mut record: TenantRecord = tenant("T2", "+15550000002");
    record.calendar_id = None;
    let app = TestApp::new(vec![record]);

    let (status, body) = app
        .post_json(
            "/tools/check_availability",
            json!({ "client_id": "T2", "start_date": "2025-10-05", "end_date": "2025-10-06" }),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_CREDENTIALS");
    assert_eq!(app.crm.call_count(), 0);
    Ok(())
}

// ============================================================================
// BOOKING
// ============================================================================

#[tokio::test]
async fn test_book_appointment_defaults_title() -> Result<(), String> {
    let app = app();
    MockCrm::set(&app.crm.appointment, 201, json!({ "id": "APT9", "status": "confirmed" }));

    let (status, body) = app
        .post_json(
            "/tools/book_appointment",
            json!({
                "client_id": "T1",
                "contact_id": "C1",
                "start_time": "2025-10-05T09:00:00-07:00",
                "end_time": "2025-10-05T09:30:00-07:00"
            }),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "appointment": { "id": "APT9", "status": "confirmed" } }));

    let payload = &app.crm.calls()[0].payload;
    assert_eq!(payload["calendarId"], "CAL_T1");
    assert_eq!(payload["locationId"], "LOC_T1");
    assert_eq!(payload["contactId"], "C1");
    assert_eq!(payload["title"], "Appointment");
    assert_eq!(payload["appointmentStatus"], "confirmed");
    assert!(payload.get("notes").is_none());
    Ok(())
}

#[tokio::test]
async fn test_booking_missing_end_time_never_leaves_the_process() -> Result<(), String> {
    let app = app();

    let (status, body) = app
        .post_json(
            "/tools/book_appointment",
            json!({ "client_id": "T1", "contact_id": "C1", "start_time": "2025-10-05T09:00:00Z" }),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
    assert!(body["message"].as_str().unwrap_or_default().contains("end_time"));
    assert_eq!(app.crm.call_count(), 0);
    assert_eq!(app.directory.query_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_booking_rejection_carries_upstream_details() -> Result<(), String> {
    let app = app();
    MockCrm::set(&app.crm.appointment, 422, json!({ "message": "slot no longer available" }));

    let (status, body) = app
        .post_json(
            "/tools/book_appointment",
            json!({
                "client_id": "T1",
                "contact_id": "C1",
                "start_time": "2025-10-05T09:00:00Z",
                "end_time": "2025-10-05T09:30:00Z",
                "title": "Cleaning"
            }),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "Failed to book appointment");
    assert_eq!(body["details"]["message"], "slot no longer available");
    Ok(())
}

#[tokio::test]
async fn test_booking_unreachable_upstream_is_bad_gateway() -> Result<(), String> {
    let app = app();
    MockCrm::fail(&app.crm.appointment, CrmError::Transport("connection refused".to_string()));

    let (status, body) = app
        .post_json(
            "/tools/book_appointment",
            json!({
                "client_id": "T1",
                "contact_id": "C1",
                "start_time": "2025-10-05T09:00:00Z",
                "end_time": "2025-10-05T09:30:00Z"
            }),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "UPSTREAM_ERROR");
    Ok(())
}

// ============================================================================
// TENANT RESOLUTION
// ============================================================================

#[tokio::test]
async fn test_unknown_client_is_not_found() -> Result<(), String> {
    let app = app();

    let (status, body) = app
        .post_json(
            "/tools/book_appointment",
            json!({
                "client_id": "nope",
                "contact_id": "C1",
                "start_time": "2025-10-05T09:00:00Z",
                "end_time": "2025-10-05T09:30:00Z"
            }),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "TENANT_NOT_FOUND");
    assert_eq!(app.crm.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_tenant_without_token_is_client_error() -> Result<(), String> {
    let mut record = tenant("T3", "+15550000003");
    record.crm_token = None;
    let app = TestApp::new(vec![record]);

    let (status, body) = app
        .post_json(
            "/tools/find_or_create_contact",
            json!({ "client_id": "T3", "phone": "+15551112222" }),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_CREDENTIALS");
    assert_eq!(app.crm.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_malformed_json_is_invalid_input() -> Result<(), String> {
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/tools/check_availability")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .map_err(|e| e.to_string())?;
    let response = app.router.clone().oneshot(request).await.map_err(|e| e.to_string())?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.crm.call_count(), 0);
    Ok(())
}
