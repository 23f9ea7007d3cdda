//! `/api/rls/{table}/*` — the admin RLS policy surface (§4.2, §6).
//! Column and table names are validated against the schema cache before any
//! SQL generation, per the contract [`ayb_rls`] documents at its own layer.

use crate::state::AppState;
use ayb_error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

fn known_table(state: &AppState, table: &str) -> ApiResult<()> {
    state
        .schema
        .snapshot()
        .public_table(table)
        .map(|_| ())
        .ok_or_else(|| ApiError::not_found("unknown table"))
}

pub async fn status(State(state): State<AppState>, Path(table): Path<String>) -> ApiResult<impl IntoResponse> {
    known_table(&state, &table)?;
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let status = ayb_rls::status(&client, &table).await?;
    Ok(Json(status))
}

pub async fn list_policies(State(state): State<AppState>, Path(table): Path<String>) -> ApiResult<impl IntoResponse> {
    known_table(&state, &table)?;
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let policies = ayb_rls::list_policies(&client, &table).await?;
    Ok(Json(policies))
}

#[derive(Debug, Deserialize)]
pub struct CreatePolicyRequest {
    pub name: String,
    pub command: String,
    pub using_expr: String,
}

pub async fn create_policy(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(body): Json<CreatePolicyRequest>,
) -> ApiResult<impl IntoResponse> {
    known_table(&state, &table)?;
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    ayb_rls::create_policy(&client, &table, &body.name, &body.command, &body.using_expr).await?;
    Ok(StatusCode::CREATED)
}

pub async fn delete_policy(
    State(state): State<AppState>,
    Path((table, policy_name)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    known_table(&state, &table)?;
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    ayb_rls::delete_policy(&client, &table, &policy_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

pub async fn set_enabled(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(body): Json<SetEnabledRequest>,
) -> ApiResult<impl IntoResponse> {
    known_table(&state, &table)?;
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    ayb_rls::set_enabled(&client, &table, body.enabled).await?;
    Ok(StatusCode::NO_CONTENT)
}
