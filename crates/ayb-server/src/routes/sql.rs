//! `POST /api/sql` — the admin-only raw SQL editor (§6). No query planning
//! or parameterization layer sits in front of this: it is an admin-trust
//! escape hatch, not part of the collections pipeline's parameterized path.

use crate::state::AppState;
use ayb_error::{ApiError, ApiResult};
use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct SqlRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SqlResponse {
    pub rows: Vec<Value>,
    pub row_count: usize,
}

pub async fn run_query(State(state): State<AppState>, Json(body): Json<SqlRequest>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;

    let statement = client.prepare_cached(&body.query).await.map_err(ApiError::from)?;
    let rows = client.query(&statement, &[]).await.map_err(ApiError::from)?;

    let json_rows = rows
        .iter()
        .map(|row| {
            let mut obj = serde_json::Map::new();
            for (i, column) in row.columns().iter().enumerate() {
                let value: Value = row.try_get(i).unwrap_or(Value::Null);
                obj.insert(column.name().to_string(), value);
            }
            Value::Object(obj)
        })
        .collect::<Vec<_>>();

    Ok(Json(SqlResponse {
        row_count: json_rows.len(),
        rows: json_rows,
    }))
}
