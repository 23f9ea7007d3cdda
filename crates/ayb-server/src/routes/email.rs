//! `/api/email/templates/*` — custom template CRUD and the admin preview
//! endpoint (§4.9, §6). Preview is pure and never touches the database.

use crate::state::AppState;
use ayb_error::{ApiError, ApiResult};
use ayb_email::{EmailTemplate, RenderedEmail};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::collections::HashMap;

pub async fn get_template(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let template: Option<EmailTemplate> = ayb_email::resolve(&client, &key).await?;
    match template {
        Some(template) => Ok(Json(template)),
        None => Err(ApiError::not_found("unknown email template key")),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpsertTemplateRequest {
    pub subject_template: String,
    pub html_template: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

pub async fn upsert_template(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<UpsertTemplateRequest>,
) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let template = ayb_email::upsert_custom(&client, &key, &body.subject_template, &body.html_template, body.enabled).await?;
    Ok((StatusCode::OK, Json(template)))
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub subject_template: String,
    pub html_template: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

pub async fn preview(Json(body): Json<PreviewRequest>) -> impl IntoResponse {
    let rendered: RenderedEmail = ayb_email::preview(&body.subject_template, &body.html_template, &body.variables);
    Json(rendered_to_json(rendered))
}

fn rendered_to_json(rendered: RenderedEmail) -> serde_json::Value {
    serde_json::json!({ "subject": rendered.subject, "html": rendered.html })
}
