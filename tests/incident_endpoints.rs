//! Integration tests for the incident log endpoints
//!
//! Creates incidents from mock-generated packages and walks them through the
//! lifecycle over HTTP.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use crisiscast::config::Config;
use crisiscast::delivery::DeliveryCredentials;
use crisiscast::generation::compliance::{
    HIGH_SEVERITY_MISSING_ACTION_FLAG, SMS_TOO_LONG_FLAG,
};
use crisiscast::generation::pipeline::Backend;
use crisiscast::handlers::{AppState, build_router};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    let state = AppState::with_backend(
        Config::default(),
        Backend::Mock,
        DeliveryCredentials::default(),
    )
    .expect("should create AppState");
    build_router(state)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn request_fields(severity: &str) -> Value {
    json!({
        "incidentType": "Gas Leak",
        "location": "5th and Pine",
        "severity": severity,
        "confirmedFacts": "Gas odor reported near the school entrance"
    })
}

/// Generate a package with the mock backend, then store it as an incident
async fn create_incident(app: &Router, severity: &str) -> Value {
    let (status, outputs) = call(app, "POST", "/api/generate", Some(request_fields(severity))).await;
    assert_eq!(status, StatusCode::OK);

    let mut body = request_fields(severity);
    body["outputs"] = outputs;
    let (status, incident) = call(app, "POST", "/api/incidents", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    incident
}

#[tokio::test]
async fn test_create_and_fetch_incident() {
    let app = app();
    let incident = create_incident(&app, "Medium").await;

    assert_eq!(incident["incidentType"], "Gas Leak");
    assert_eq!(incident["severity"], "Medium");
    assert_eq!(incident["stage"], "initial");
    assert_eq!(incident["status"], "Active");
    assert_eq!(incident["needsEscalation"], false);
    assert_eq!(incident["followUps"], json!([]));
    assert!(
        incident["outputs"]["sms"]
            .as_str()
            .unwrap()
            .starts_with("ALERT: Gas Leak at 5th and Pine.")
    );

    let id = incident["id"].as_str().unwrap();
    let (status, fetched) = call(&app, "GET", &format!("/api/incidents/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], incident["id"]);
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let app = app();
    let first = create_incident(&app, "Low").await;
    let second = create_incident(&app, "High").await;

    let (status, list) = call(&app, "GET", "/api/incidents", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&Value> = list.as_array().unwrap().iter().map(|i| &i["id"]).collect();
    assert_eq!(ids, vec![&second["id"], &first["id"]]);
}

#[tokio::test]
async fn test_unknown_incident_is_not_found() {
    let app = app();
    let (status, body) = call(
        &app,
        "GET",
        "/api/incidents/00000000-0000-4000-8000-000000000000",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_create_requires_incident_fields() {
    let app = app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/incidents",
        Some(json!({ "location": "5th and Pine", "outputs": {} })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body");
}

#[tokio::test]
async fn test_full_lifecycle() {
    let app = app();
    let incident = create_incident(&app, "High").await;
    let id = incident["id"].as_str().unwrap();

    let (status, after_follow_up) = call(
        &app,
        "POST",
        &format!("/api/incidents/{}/follow-up-sent", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after_follow_up["stage"], "follow_up");
    assert!(after_follow_up["lifecycle"]["followUpSentAt"].is_string());

    let (status, all_clear) =
        call(&app, "POST", &format!("/api/incidents/{}/all-clear", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all_clear["incident"]["stage"], "all_clear");
    let sms = all_clear["allClear"]["sms"].as_str().unwrap();
    assert!(sms.starts_with("All clear: The situation has been resolved. ALERT: Gas Leak"));
    assert!(sms.ends_with("- Emergency Management Office"));
    assert_eq!(
        all_clear["allClear"]["email"]["subject"],
        "All Clear: Gas Leak at 5th and Pine"
    );

    let (status, _) = call(&app, "POST", &format!("/api/incidents/{}/all-clear", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, resolved) =
        call(&app, "POST", &format!("/api/incidents/{}/resolve", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["stage"], "resolved");
    assert_eq!(resolved["status"], "Resolved");

    let (status, body) = call(&app, "POST", &format!("/api/incidents/{}/resolve", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Incident is already resolved");
}

#[tokio::test]
async fn test_follow_up_review_flags_are_merged() {
    let app = app();
    let incident = create_incident(&app, "High").await;
    let id = incident["id"].as_str().unwrap();

    let (status, follow_up) = call(
        &app,
        "POST",
        &format!("/api/incidents/{}/follow-ups", id),
        Some(json!({
            "status": "draft",
            "content": {
                "sms": "U".repeat(200),
                "email": { "subject": "Update", "body": "Crews on scene." }
            },
            "compliance_flags": [SMS_TOO_LONG_FLAG]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(follow_up["status"], "draft");
    assert_eq!(
        follow_up["compliance_flags"],
        json!([SMS_TOO_LONG_FLAG, HIGH_SEVERITY_MISSING_ACTION_FLAG])
    );

    let (_, fetched) = call(&app, "GET", &format!("/api/incidents/{}", id), None).await;
    assert_eq!(fetched["followUps"].as_array().unwrap().len(), 1);
    assert_eq!(fetched["stage"], "initial");
}

#[tokio::test]
async fn test_sent_follow_up_advances_lifecycle() {
    let app = app();
    let incident = create_incident(&app, "Low").await;
    let id = incident["id"].as_str().unwrap();

    let (status, follow_up) = call(
        &app,
        "POST",
        &format!("/api/incidents/{}/follow-ups", id),
        Some(json!({
            "status": "sent",
            "content": {
                "sms": "UPDATE: Gas Leak at 5th and Pine. Crews on scene.",
                "email": { "subject": "Update", "body": "Crews on scene." }
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(follow_up["sentAt"].is_string());

    let (_, fetched) = call(&app, "GET", &format!("/api/incidents/{}", id), None).await;
    assert_eq!(fetched["stage"], "follow_up");
}

#[tokio::test]
async fn test_scheduled_follow_up_requires_time() {
    let app = app();
    let incident = create_incident(&app, "Low").await;
    let id = incident["id"].as_str().unwrap();

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/incidents/{}/follow-ups", id),
        Some(json!({
            "status": "scheduled",
            "content": {
                "sms": "UPDATE",
                "email": { "subject": "Update", "body": "Body" }
            }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("scheduledAt"));
}
