//! Delivery endpoints for approved messages

use axum::{Json, extract::State};

use crate::delivery::{
    EmailMessage, EmailReceipt, SmsMessage, SmsReceipt, SocialPost, SocialReceipt,
};
use crate::error::AppResult;
use crate::handlers::AppState;
use crate::handlers::extractor::ApiJson;

pub async fn send_sms(
    State(state): State<AppState>,
    ApiJson(sms): ApiJson<SmsMessage>,
) -> AppResult<Json<SmsReceipt>> {
    let receipt = state.dispatcher().send_sms(&sms).await?;
    Ok(Json(receipt))
}

pub async fn send_email(
    State(state): State<AppState>,
    ApiJson(email): ApiJson<EmailMessage>,
) -> AppResult<Json<EmailReceipt>> {
    let receipt = state.dispatcher().send_email(&email).await?;
    Ok(Json(receipt))
}

pub async fn post_social(
    State(state): State<AppState>,
    ApiJson(post): ApiJson<SocialPost>,
) -> AppResult<Json<SocialReceipt>> {
    let receipt = state.dispatcher().post_social(&post).await?;
    Ok(Json(receipt))
}
