//! `/api/sms/*` — the admin SMS surface (§6, §8). Backed by whatever
//! [`crate::sms::SmsProvider`] is wired into `AppState`; this core wires in
//! [`crate::sms::NoopSmsProvider`].

use crate::state::AppState;
use ayb_error::ApiResult;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SendSmsRequest {
    pub to: String,
    pub body: String,
}

pub async fn send(State(state): State<AppState>, Json(body): Json<SendSmsRequest>) -> ApiResult<impl IntoResponse> {
    let message = state.sms_provider.send(&body.to, &body.body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> ApiResult<impl IntoResponse> {
    let messages = state.sms_provider.list_recent(query.limit).await?;
    Ok(Json(messages))
}

pub async fn daily_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let stats = state.sms_provider.daily_stats().await?;
    Ok(Json(stats))
}
