//! `/api/storage/{bucket}/*` — the object storage HTTP surface (§6, §8).
//! Backed by whatever [`crate::storage::ObjectStore`] is wired into
//! `AppState`; this core wires in [`crate::storage::LocalDiskStore`].

use crate::state::AppState;
use ayb_error::ApiResult;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

pub async fn put(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let meta = state.object_store.put(&bucket, &key, &content_type, body.to_vec()).await?;
    Ok((StatusCode::CREATED, Json(meta)))
}

pub async fn get(State(state): State<AppState>, Path((bucket, key)): Path<(String, String)>) -> ApiResult<impl IntoResponse> {
    let (meta, body) = state.object_store.get(&bucket, &key).await?;
    let headers = [(header::CONTENT_TYPE, meta.content_type.clone())];
    Ok((headers, body))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub prefix: String,
}

pub async fn list(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let objects = state.object_store.list(&bucket, &query.prefix).await?;
    Ok(Json(objects))
}

pub async fn delete(State(state): State<AppState>, Path((bucket, key)): Path<(String, String)>) -> ApiResult<impl IntoResponse> {
    state.object_store.delete(&bucket, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}
