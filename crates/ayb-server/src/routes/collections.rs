//! `/api/collections/{table}[...]` — the dynamic CRUD/query surface (§4.4).

use crate::middleware::rls_context_for;
use crate::state::AppState;
use ayb_auth::Principal;
use ayb_collections::{self as collections, batch, query, BatchRequest};
use ayb_db::with_request_conn;
use ayb_error::{ApiError, ApiResult};
use ayb_schema::TableDef;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, Default)]
pub struct RawQuery {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    #[serde(rename = "perPage")]
    pub per_page: Option<u32>,
    pub fields: Option<String>,
    pub expand: Option<String>,
    pub search: Option<String>,
}

impl From<RawQuery> for query::RawQueryParams {
    fn from(raw: RawQuery) -> Self {
        Self {
            filter: raw.filter,
            sort: raw.sort,
            page: raw.page,
            per_page: raw.per_page,
            fields: raw.fields,
            expand: raw.expand,
            search: raw.search,
        }
    }
}

fn authorize_table(principal: &Principal, table_name: &str, needs_write: bool) -> ApiResult<()> {
    if !principal.may_touch_table(table_name) {
        return Err(ApiError::forbidden("caller is not scoped to this table"));
    }
    if needs_write && !principal.scope.allows_write() {
        return Err(ApiError::forbidden("caller's scope is read-only"));
    }
    // Belt-and-suspenders for OAuth-granted callers: `principal.scope` is
    // already derived from the granted scope string, but an OAuth token's
    // request is rejected outright if its own grant never covered a write
    // operation, independent of how `scope` was derived.
    if needs_write {
        if let Some(granted) = &principal.oauth_scopes {
            let covers = ayb_auth::oauth_scope_covers(granted, "readwrite") || ayb_auth::oauth_scope_covers(granted, "*");
            if !covers {
                return Err(ApiError::forbidden("oauth grant does not cover write operations"));
            }
        }
    }
    Ok(())
}

fn lookup_table(state: &AppState, table_name: &str) -> ApiResult<(std::sync::Arc<ayb_schema::SchemaCache>, TableDef)> {
    let snapshot = state.schema.snapshot();
    let table = snapshot
        .public_table(table_name)
        .cloned()
        .ok_or_else(|| ApiError::not_found("unknown collection"))?;
    Ok((snapshot, table))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(table_name): Path<String>,
    Query(raw): Query<RawQuery>,
) -> ApiResult<impl IntoResponse> {
    authorize_table(&principal, &table_name, false)?;
    let (_, table) = lookup_table(&state, &table_name)?;
    let parsed = query::parse(&raw.into(), &table)?;

    let ctx = rls_context_for(&principal);
    let envelope = with_request_conn(&state.pool, ctx, move |client| {
        Box::pin(async move { collections::pipeline::list(client, &table, &parsed).await })
    })
    .await?;

    Ok(Json(envelope))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((table_name, id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    authorize_table(&principal, &table_name, false)?;
    let (_, table) = lookup_table(&state, &table_name)?;

    let ctx = rls_context_for(&principal);
    let doc: Value = with_request_conn(&state.pool, ctx, move |client| {
        Box::pin(async move { collections::pipeline::get_by_id(client, &table, &id).await })
    })
    .await?;

    Ok(Json(doc))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(table_name): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    authorize_table(&principal, &table_name, true)?;
    let (_, table) = lookup_table(&state, &table_name)?;
    let bus = state.change_bus.clone();

    let ctx = rls_context_for(&principal);
    let doc: Value = with_request_conn(&state.pool, ctx, move |client| {
        Box::pin(async move { collections::pipeline::insert(client, &table, &bus, &body).await })
    })
    .await?;

    Ok((axum::http::StatusCode::CREATED, Json(doc)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((table_name, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    authorize_table(&principal, &table_name, true)?;
    let (_, table) = lookup_table(&state, &table_name)?;
    let bus = state.change_bus.clone();

    let ctx = rls_context_for(&principal);
    let doc: Value = with_request_conn(&state.pool, ctx, move |client| {
        Box::pin(async move { collections::pipeline::update(client, &table, &bus, &id, &body).await })
    })
    .await?;

    Ok(Json(doc))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((table_name, id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    authorize_table(&principal, &table_name, true)?;
    let (_, table) = lookup_table(&state, &table_name)?;
    let bus = state.change_bus.clone();

    let ctx = rls_context_for(&principal);
    with_request_conn(&state.pool, ctx, move |client| {
        Box::pin(async move { collections::pipeline::delete(client, &table, &bus, &id).await })
    })
    .await?;

    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn batch(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(table_name): Path<String>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<impl IntoResponse> {
    authorize_table(&principal, &table_name, true)?;
    if let Some(reason) = batch::validate_size(&request) {
        return Err(ApiError::invalid_request(reason));
    }
    let (_, table) = lookup_table(&state, &table_name)?;
    let bus = state.change_bus.clone();

    let ctx = rls_context_for(&principal);
    let results = with_request_conn(&state.pool, ctx, move |client| {
        Box::pin(async move { collections::batch_runner::run(client, &table, &bus, request).await })
    })
    .await?;

    Ok(Json(results))
}
