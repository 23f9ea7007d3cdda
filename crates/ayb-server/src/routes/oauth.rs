//! `/oauth/*` — the authorization-code + PKCE grant, refresh rotation, and
//! the admin client registry (§4.2, §6).

use crate::state::AppState;
use ayb_auth::oauth::{
    self, CodeChallengeMethod, ConsumedAuthorization, IssuedTokenPair, NewAuthorization,
};
use ayb_auth::oauth_client::{self, ClientType, NewOAuthClient};
use ayb_auth::Principal;
use ayb_error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub code: String,
}

pub async fn authorize(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<AuthorizeRequest>,
) -> ApiResult<impl IntoResponse> {
    let user_id = principal.user_id.ok_or_else(|| ApiError::unauthenticated("login is required to authorize a client"))?;
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;

    let registered = oauth_client::get_client(&client, &body.client_id).await?;
    if registered.revoked {
        return Err(ApiError::invalid_request("client has been revoked"));
    }
    if !oauth_client::redirect_uri_is_registered(&registered.redirect_uris, &body.redirect_uri) {
        return Err(ApiError::invalid_request("redirect_uri is not registered for this client"));
    }
    let method = CodeChallengeMethod::parse(&body.code_challenge_method)
        .ok_or_else(|| ApiError::invalid_request("code_challenge_method must be S256 or plain"))?;

    let code = oauth::create_authorization(
        &client,
        NewAuthorization {
            client_id: &body.client_id,
            user_id,
            redirect_uri: &body.redirect_uri,
            scope: &body.scope,
            code_challenge: &body.code_challenge,
            code_challenge_method: method,
        },
    )
    .await?;

    Ok(Json(AuthorizeResponse { code }))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
pub enum TokenRequest {
    AuthorizationCode {
        code: String,
        client_id: String,
        redirect_uri: String,
        code_verifier: String,
    },
    RefreshToken {
        refresh_token: String,
        client_id: String,
    },
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

impl From<IssuedTokenPair> for TokenResponse {
    fn from(pair: IssuedTokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer",
            expires_in: pair.expires_in,
        }
    }
}

pub async fn token(State(state): State<AppState>, Json(body): Json<TokenRequest>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;

    let pair = match body {
        TokenRequest::AuthorizationCode {
            code,
            client_id,
            redirect_uri,
            code_verifier,
        } => {
            let ConsumedAuthorization { user_id, scope } =
                oauth::consume_authorization(&client, &code, &client_id, &redirect_uri, &code_verifier).await?;
            oauth::issue_token_pair(&client, &client_id, user_id, &scope).await?
        }
        TokenRequest::RefreshToken { refresh_token, client_id } => {
            oauth::rotate_refresh_token(&client, &refresh_token, &client_id).await?
        }
    };

    Ok(Json(TokenResponse::from(pair)))
}

#[derive(Debug, Deserialize)]
pub struct RegisterClientRequest {
    pub name: String,
    pub app_id: Option<Uuid>,
    pub redirect_uris: Vec<String>,
    pub scopes: Vec<String>,
    #[serde(default = "default_client_type")]
    pub client_type: String,
}

fn default_client_type() -> String {
    "confidential".to_string()
}

#[derive(Debug, Serialize)]
pub struct RegisteredClientResponse {
    pub client_id: String,
    pub client_secret: Option<String>,
}

pub async fn register_client(State(state): State<AppState>, Json(body): Json<RegisterClientRequest>) -> ApiResult<impl IntoResponse> {
    let client_type = match body.client_type.as_str() {
        "confidential" => ClientType::Confidential,
        "public" => ClientType::Public,
        _ => return Err(ApiError::invalid_request("client_type must be confidential or public")),
    };

    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let created = oauth_client::register_client(
        &client,
        NewOAuthClient {
            app_id: body.app_id,
            name: &body.name,
            redirect_uris: body.redirect_uris,
            scopes: body.scopes,
            client_type,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisteredClientResponse {
            client_id: created.client.client_id,
            client_secret: created.client_secret,
        }),
    ))
}

pub async fn list_clients(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let clients = oauth_client::list_clients(&client).await?;
    Ok(Json(clients))
}

pub async fn revoke_client(State(state): State<AppState>, Path(client_id): Path<String>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    oauth_client::revoke_client(&client, &client_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
