//! `/api/webhooks/*` — CRUD, the "send test event" admin action, and the
//! delivery history surface (§4.4.7, §6).

use crate::state::AppState;
use ayb_error::{ApiError, ApiResult};
use ayb_webhooks::{self as webhooks, Webhook};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateWebhookRequest {
    pub url: String,
    pub events: Vec<String>,
    #[serde(default)]
    pub tables: Vec<String>,
    pub secret: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub id: Uuid,
    pub url: String,
    pub events: Vec<String>,
    pub tables: Vec<String>,
    pub enabled: bool,
}

fn to_response(webhook: &Webhook) -> WebhookResponse {
    WebhookResponse {
        id: webhook.id,
        url: webhook.url.clone(),
        events: webhook.events.iter().map(|a| a.as_str().to_string()).collect(),
        tables: webhook.tables.clone(),
        enabled: webhook.enabled,
    }
}

pub async fn create(State(state): State<AppState>, Json(body): Json<CreateWebhookRequest>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let id = Uuid::new_v4();

    let row = client
        .query_one(
            "INSERT INTO _ayb_webhooks (id, url, events, tables, enabled)
             VALUES ($1, $2, $3, $4, true)
             RETURNING id, url, events, tables, enabled",
            &[&id, &body.url, &body.events, &body.tables],
        )
        .await
        .map_err(ApiError::from)?;

    if let Some(secret) = &body.secret {
        client
            .execute(
                "INSERT INTO _ayb_webhook_secrets (webhook_id, secret_plain) VALUES ($1, $2)",
                &[&id, secret],
            )
            .await
            .map_err(ApiError::from)?;
    }

    let webhook = Webhook {
        id: row.get("id"),
        url: row.get("url"),
        events: body
            .events
            .iter()
            .filter_map(|e| match e.as_str() {
                "create" => Some(ayb_collections::ChangeAction::Create),
                "update" => Some(ayb_collections::ChangeAction::Update),
                "delete" => Some(ayb_collections::ChangeAction::Delete),
                _ => None,
            })
            .collect(),
        tables: row.get("tables"),
        enabled: row.get("enabled"),
    };

    Ok((StatusCode::CREATED, Json(to_response(&webhook))))
}

pub async fn list(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let webhooks = webhooks::list_enabled(&client).await?;
    Ok(Json(webhooks.iter().map(to_response).collect::<Vec<_>>()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateWebhookRequest {
    pub enabled: bool,
}

pub async fn set_enabled(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateWebhookRequest>,
) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let rows = client
        .execute("UPDATE _ayb_webhooks SET enabled = $2 WHERE id = $1", &[&id, &body.enabled])
        .await
        .map_err(ApiError::from)?;
    if rows == 0 {
        return Err(ApiError::not_found("webhook not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let rows = client.execute("DELETE FROM _ayb_webhooks WHERE id = $1", &[&id]).await.map_err(ApiError::from)?;
    if rows == 0 {
        return Err(ApiError::not_found("webhook not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn load_webhook(state: &AppState, id: Uuid) -> ApiResult<Webhook> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    webhooks::list_enabled(&client)
        .await?
        .into_iter()
        .find(|w| w.id == id)
        .ok_or_else(|| ApiError::not_found("webhook not found or disabled"))
}

#[derive(Debug, Serialize)]
pub struct TestDeliveryResponse {
    pub succeeded: bool,
}

pub async fn send_test(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let webhook = load_webhook(&state, id).await?;
    let succeeded = webhooks::send_test_delivery(&state.http, &state.secret_store, &webhook).await?;
    Ok(Json(TestDeliveryResponse { succeeded }))
}

#[derive(Debug, Serialize)]
pub struct WebhookDeliveryRow {
    pub id: Uuid,
    pub event: Value,
    pub response_status: Option<i32>,
    pub succeeded: bool,
    pub error: Option<String>,
}

pub async fn deliveries(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let rows = client
        .query(
            "SELECT id, event, response_status, succeeded, error
             FROM _ayb_webhook_deliveries WHERE webhook_id = $1 ORDER BY attempted_at DESC LIMIT 100",
            &[&id],
        )
        .await
        .map_err(ApiError::from)?;

    let deliveries: Vec<WebhookDeliveryRow> = rows
        .iter()
        .map(|row| WebhookDeliveryRow {
            id: row.get("id"),
            event: row.get("event"),
            response_status: row.get("response_status"),
            succeeded: row.get("succeeded"),
            error: row.get("error"),
        })
        .collect();

    Ok(Json(deliveries))
}
