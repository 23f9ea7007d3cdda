//! Liveness/readiness and the `/api/admin/status` auth probe.

use crate::state::AppState;
use ayb_auth::Principal;
use axum::{extract::State, response::IntoResponse, Extension, Json};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    schema_built_at: i64,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.schema.snapshot();
    Json(HealthResponse {
        status: "ok",
        schema_built_at: snapshot.built_at,
    })
}

/// `GET /api/admin/status` — `{auth: bool}`, used by the admin UI to decide
/// whether to show the login screen without leaking anything else.
pub async fn admin_status(Extension(principal): Extension<Principal>) -> impl IntoResponse {
    Json(json!({ "auth": principal.is_admin() }))
}
