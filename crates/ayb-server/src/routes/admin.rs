//! `/api/admin/*` beyond the status probe in `health.rs`: the single admin
//! login exchange and schema cache control.

use crate::state::AppState;
use ayb_error::{ApiError, ApiResult};
use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct AdminLoginResponse {
    pub token: String,
}

/// The admin token is a single pre-shared secret (§4.2); "login" here is
/// just validating the caller already knows it and handing it back for the
/// `x-admin-token` header the rest of the admin surface expects.
pub async fn login(State(state): State<AppState>, Json(body): Json<AdminLoginRequest>) -> ApiResult<impl IntoResponse> {
    if !state.config.admin_token_configured() {
        return Err(ApiError::internal("no admin token is configured on this server"));
    }
    if body.token != state.config.admin_token {
        return Err(ApiError::unauthenticated("invalid admin token"));
    }
    Ok(Json(AdminLoginResponse { token: body.token }))
}

pub async fn refresh_schema(State(state): State<AppState>) -> impl IntoResponse {
    state.schema.invalidate();
    Json(json!({ "scheduled": true }))
}
