//! Incident log endpoints
//!
//! Every record is returned as an [`IncidentView`], which carries the stage,
//! status badge and escalation flag derived at the time of the request.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::AppState;
use crate::handlers::extractor::ApiJson;
use crate::incidents::{
    AllClearNotice, FollowUp, IncidentView, NewFollowUp, NewIncident, Transition,
    validate_new_incident,
};

/// Response of `POST /api/incidents/{id}/all-clear`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllClearResponse {
    pub incident: IncidentView,
    pub all_clear: AllClearNotice,
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewIncident>,
) -> AppResult<(StatusCode, Json<IncidentView>)> {
    let (incident, outputs) = validate_new_incident(new)?;
    let now = Utc::now();
    let record = state.incidents().create(incident, outputs, now).await;
    Ok((StatusCode::CREATED, Json(record.view(now))))
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<IncidentView>> {
    let now = Utc::now();
    let views = state
        .incidents()
        .list()
        .await
        .iter()
        .map(|record| record.view(now))
        .collect();
    Json(views)
}

pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IncidentView>> {
    let record = state.incidents().get(id).await?;
    Ok(Json(record.view(Utc::now())))
}

pub async fn follow_up_sent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IncidentView>> {
    apply(&state, id, Transition::FollowUpSent).await
}

pub async fn resolve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IncidentView>> {
    apply(&state, id, Transition::Resolve).await
}

pub async fn all_clear(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AllClearResponse>> {
    let now = Utc::now();
    let (record, all_clear) = state.incidents().generate_all_clear(id, now).await?;
    Ok(Json(AllClearResponse {
        incident: record.view(now),
        all_clear,
    }))
}

pub async fn add_follow_up(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(new): ApiJson<NewFollowUp>,
) -> AppResult<(StatusCode, Json<FollowUp>)> {
    let follow_up = state
        .incidents()
        .add_follow_up(id, new, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(follow_up)))
}

async fn apply(state: &AppState, id: Uuid, transition: Transition) -> AppResult<Json<IncidentView>> {
    let now = Utc::now();
    let record = state.incidents().transition(id, transition, now).await?;
    Ok(Json(record.view(now)))
}
