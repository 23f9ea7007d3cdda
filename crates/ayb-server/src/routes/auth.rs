//! `/api/auth/*` — signup, login, logout — and the API key CRUD surface
//! that rides alongside it for an authenticated user.

use crate::state::AppState;
use ayb_auth::{api_key, session, user, Principal};
use ayb_error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub email: String,
}

fn session_cookie_header(token: &str, ttl_hours: i64) -> String {
    format!("ayb_session={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}", ttl_hours * 3600)
}

fn expired_cookie_header() -> &'static str {
    "ayb_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
}

pub async fn signup(State(state): State<AppState>, Json(body): Json<SignupRequest>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let created = user::create_user(&client, &body.email, &body.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user_id: created.id,
            email: created.email,
        }),
    ))
}

pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let authenticated = user::authenticate(&client, &body.email, &body.password).await?;
    let (_, token) = session::create_session(&client, authenticated.id).await?;

    let cookie = session_cookie_header(&token, state.config.session_ttl_hours);
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(SessionResponse {
            user_id: authenticated.id,
            email: authenticated.email,
        }),
    ))
}

pub async fn logout(State(state): State<AppState>, req: axum::extract::Request) -> ApiResult<impl IntoResponse> {
    let cookie = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| cookies.split(';').map(str::trim).find_map(|pair| pair.strip_prefix("ayb_session=")));

    if let Some(token) = cookie {
        let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
        session::delete_session(&client, token).await?;
    }

    Ok((AppendHeaders([(header::SET_COOKIE, expired_cookie_header().to_string())]), StatusCode::NO_CONTENT))
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    pub allowed_tables: Option<Vec<String>>,
    pub app_id: Option<Uuid>,
}

fn default_scope() -> String {
    "readwrite".to_string()
}

#[derive(Debug, Serialize)]
pub struct CreatedApiKeyResponse {
    pub id: Uuid,
    pub key: String,
}

fn current_user_id(principal: &Principal) -> ApiResult<Uuid> {
    principal.user_id.ok_or_else(|| ApiError::forbidden("api keys require an authenticated user"))
}

pub async fn create_api_key(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CreateApiKeyRequest>,
) -> ApiResult<impl IntoResponse> {
    let user_id = current_user_id(&principal)?;
    let scope = ayb_auth::Scope::from_str_field(&body.scope)
        .ok_or_else(|| ApiError::invalid_request("scope must be one of *, readonly, readwrite"))?;

    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let created = api_key::create_api_key(
        &client,
        api_key::NewApiKey {
            user_id,
            app_id: body.app_id,
            name: &body.name,
            scope,
            allowed_tables: body.allowed_tables,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedApiKeyResponse {
            id: created.id,
            key: created.plaintext,
        }),
    ))
}

pub async fn revoke_api_key(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path(key_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    api_key::revoke_api_key(&client, key_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_api_keys(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> ApiResult<impl IntoResponse> {
    let user_id = current_user_id(&principal)?;
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let keys = api_key::list_api_keys(&client, user_id).await?;
    Ok(Json(keys))
}
