//! Integration tests for `POST /api/generate`
//!
//! Drives the full router with `oneshot`. Mock mode is forced through the
//! config so no test touches the network.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use crisiscast::config::{Config, EnvOverrides};
use crisiscast::delivery::DeliveryCredentials;
use crisiscast::generation::SMS_MAX_LENGTH;
use crisiscast::generation::compliance::{INSUFFICIENT_DETAILS_FLAG, MISSING_ACTION_FLAG};
use crisiscast::handlers::{AppState, build_router};
use crisiscast::middleware::REQUEST_ID_HEADER;
use serde_json::{Value, json};
use tower::ServiceExt;

fn mock_app() -> Router {
    let mut config = Config::default();
    config.generation.mock = true;
    let state = AppState::new(config, EnvOverrides::default(), DeliveryCredentials::default())
        .expect("should create AppState");
    build_router(state)
}

fn live_app_without_key() -> Router {
    let state = AppState::new(
        Config::default(),
        EnvOverrides::default(),
        DeliveryCredentials::default(),
    )
    .expect("should create AppState");
    build_router(state)
}

async fn post_raw(app: Router, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn post(app: Router, body: Value) -> (StatusCode, Value) {
    post_raw(app, &body.to_string()).await
}

#[tokio::test]
async fn test_fire_without_action_uses_template() {
    let (status, body) = post(
        mock_app(),
        json!({
            "incidentType": "Fire",
            "location": "123 Main St",
            "confirmedFacts": "Flames visible on 2nd floor"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let sms = body["sms"].as_str().expect("sms should be a string");
    assert!(sms.starts_with("ALERT: Fire at 123 Main St."));
    assert!(sms.ends_with("Follow official guidance."));
    assert!(sms.chars().count() <= SMS_MAX_LENGTH);

    let flags: Vec<&str> = body["compliance_flags"]
        .as_array()
        .expect("flags array")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(flags.contains(&MISSING_ACTION_FLAG));
    assert!(!flags.contains(&INSUFFICIENT_DETAILS_FLAG));

    assert_eq!(body["metadata"]["sender"], "Emergency Management Office");
    assert_eq!(body["metadata"]["tone"], "Neutral");
    assert_eq!(body["readability_grade_estimate"], 6);
    assert!(body["translations"]["es"].is_string());
}

#[tokio::test]
async fn test_fire_with_short_facts_and_action() {
    let (status, body) = post(
        mock_app(),
        json!({
            "incidentType": "Fire",
            "location": "123 Main St",
            "confirmedFacts": "Smoke",
            "requiredAction": "Evacuate the building now.",
            "tone": "Urgent",
            "sender": "County OEM",
            "readingLevel": 4
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["sms"],
        "URGENT: ALERT: Fire at 123 Main St. Evacuate the building now."
    );
    assert_eq!(body["compliance_flags"], json!([INSUFFICIENT_DETAILS_FLAG]));
    assert_eq!(body["metadata"]["sender"], "County OEM");
    assert_eq!(body["readability_grade_estimate"], 4);
}

#[tokio::test]
async fn test_long_location_is_clipped_everywhere() {
    let location = "A".repeat(300);
    let (status, body) = post(
        mock_app(),
        json!({
            "incidentType": "Gas Leak",
            "location": location,
            "confirmedFacts": "Strong odor of gas reported by residents"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["sms"].as_str().unwrap().chars().count(),
        SMS_MAX_LENGTH
    );
    for (code, text) in body["translations"].as_object().unwrap() {
        assert!(
            text.as_str().unwrap().chars().count() <= SMS_MAX_LENGTH,
            "{} translation exceeds limit",
            code
        );
    }
}

#[tokio::test]
async fn test_follow_up_stage_returns_follow_up_package() {
    let (status, body) = post(
        mock_app(),
        json!({
            "stage": "follow_up",
            "incidentType": "Severe Weather",
            "location": "Riverside County",
            "confirmedFacts": "Flash flood warning in effect until 9 PM",
            "previousSms": "ALERT: Severe Weather at Riverside County."
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("sms").is_none());
    let sms = body["follow_up"]["sms"].as_str().expect("follow-up sms");
    assert!(sms.starts_with("UPDATE: Severe Weather at Riverside County."));
    assert!(body["follow_up"]["email"]["subject"].is_string());
    assert_eq!(
        body["follow_up"]["compliance_flags"],
        json!([MISSING_ACTION_FLAG])
    );
}

#[tokio::test]
async fn test_missing_fields_are_listed() {
    let (status, body) = post(mock_app(), json!({ "location": "  " })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Missing required fields: incidentType, location, confirmedFacts"
    );
}

#[tokio::test]
async fn test_unknown_enum_value_is_bad_request() {
    let (status, body) = post(
        mock_app(),
        json!({
            "incidentType": "Alien Invasion",
            "location": "123 Main St",
            "confirmedFacts": "Flames visible on 2nd floor"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Alien Invasion"));
}

#[tokio::test]
async fn test_reading_level_out_of_range() {
    let (status, _) = post(
        mock_app(),
        json!({
            "incidentType": "Fire",
            "location": "123 Main St",
            "confirmedFacts": "Flames visible on 2nd floor",
            "readingLevel": 20
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_is_invalid_request_body() {
    let (status, body) = post_raw(mock_app(), "{\"incidentType\": ").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid request body" }));
}

#[tokio::test]
async fn test_unknown_stage_is_invalid_request_body() {
    let (status, body) = post(
        mock_app(),
        json!({
            "stage": "final",
            "incidentType": "Fire",
            "location": "123 Main St",
            "confirmedFacts": "Flames visible on 2nd floor"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body");
}

#[tokio::test]
async fn test_blank_stage_is_initial_with_whole_float_reading_level() {
    let (status, body) = post(
        mock_app(),
        json!({
            "stage": "",
            "incidentType": "Fire",
            "location": "123 Main St",
            "confirmedFacts": "Flames visible on 2nd floor",
            "readingLevel": 6.0
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["sms"].is_string());
    assert!(body.get("follow_up").is_none());
}

#[tokio::test]
async fn test_live_mode_without_key_is_server_error() {
    let (status, body) = post(
        live_app_without_key(),
        json!({
            "incidentType": "Fire",
            "location": "123 Main St",
            "confirmedFacts": "Flames visible on 2nd floor"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Server configuration error: missing API key");
}

#[tokio::test]
async fn test_validation_runs_before_key_check() {
    let (status, _) = post(live_app_without_key(), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_response_carries_request_id() {
    let response = mock_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "incidentType": "Lockdown",
                        "location": "Lincoln High School",
                        "confirmedFacts": "Police activity near the east entrance"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let header = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .expect("x-request-id header")
        .to_str()
        .unwrap();
    assert!(uuid::Uuid::parse_str(header).is_ok());
}
