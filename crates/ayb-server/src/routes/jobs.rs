//! `/api/jobs/*` and `/api/schedules/*` — the job queue admin surface
//! (§4.7, §6). Enqueueing an arbitrary job type from here is an admin
//! action; application code enqueues through [`ayb_queue::enqueue`] directly.

use crate::state::AppState;
use ayb_error::{ApiError, ApiResult};
use ayb_queue::{Job, JobState, Schedule};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct EnqueueJobRequest {
    pub job_type: String,
    #[serde(default)]
    pub payload: Value,
    pub max_attempts: Option<u32>,
    pub idempotency_key: Option<String>,
}

pub async fn enqueue(State(state): State<AppState>, Json(body): Json<EnqueueJobRequest>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let opts = ayb_queue::EnqueueOptions {
        max_attempts: body.max_attempts.unwrap_or(5),
        idempotency_key: body.idempotency_key,
        ..Default::default()
    };
    let job = ayb_queue::enqueue(&client, &body.job_type, body.payload, opts).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub state: Option<String>,
}

pub async fn list(State(state): State<AppState>, Query(query): Query<ListJobsQuery>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let parsed_state = query
        .state
        .as_deref()
        .map(|s| JobState::from_db_str(s).ok_or_else(|| ApiError::invalid_request("unrecognized job state")))
        .transpose()?;
    let jobs: Vec<Job> = ayb_queue::list(&client, parsed_state).await?;
    Ok(Json(jobs))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let job = ayb_queue::get(&client, id).await?;
    Ok(Json(job))
}

pub async fn retry(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let job = ayb_queue::retry(&client, id).await?;
    Ok(Json(job))
}

pub async fn cancel(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let job = ayb_queue::cancel(&client, id).await?;
    Ok(Json(job))
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let stats = ayb_queue::queue_stats(&client).await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub cron_expr: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub job_type: String,
    #[serde(default)]
    pub payload: Value,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

pub async fn create_schedule(
    State(state): State<AppState>,
    Json(body): Json<CreateScheduleRequest>,
) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let next_run_at = ayb_queue::compute_next_run(&body.cron_expr, &body.timezone, chrono::Utc::now())?;

    let row = client
        .query_one(
            "INSERT INTO _ayb_schedules (cron_expr, timezone, job_type, payload, enabled, next_run_at)
             VALUES ($1, $2, $3, $4, true, $5)
             RETURNING id, cron_expr, timezone, job_type, payload, enabled, next_run_at",
            &[&body.cron_expr, &body.timezone, &body.job_type, &body.payload, &next_run_at],
        )
        .await
        .map_err(ApiError::from)?;

    let schedule = Schedule {
        id: row.get("id"),
        cron_expr: row.get("cron_expr"),
        timezone: row.get("timezone"),
        job_type: row.get("job_type"),
        payload: row.get("payload"),
        enabled: row.get("enabled"),
        next_run_at: row.get("next_run_at"),
    };

    Ok((StatusCode::CREATED, Json(ScheduleResponse::from(schedule))))
}

#[derive(Debug, serde::Serialize)]
pub struct ScheduleResponse {
    pub id: Uuid,
    pub cron_expr: String,
    pub timezone: String,
    pub job_type: String,
    pub payload: Value,
    pub enabled: bool,
    pub next_run_at: chrono::DateTime<chrono::Utc>,
}

impl From<Schedule> for ScheduleResponse {
    fn from(schedule: Schedule) -> Self {
        Self {
            id: schedule.id,
            cron_expr: schedule.cron_expr,
            timezone: schedule.timezone,
            job_type: schedule.job_type,
            payload: schedule.payload,
            enabled: schedule.enabled,
            next_run_at: schedule.next_run_at,
        }
    }
}

pub async fn list_schedules(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let rows = client
        .query(
            "SELECT id, cron_expr, timezone, job_type, payload, enabled, next_run_at
             FROM _ayb_schedules ORDER BY next_run_at ASC",
            &[],
        )
        .await
        .map_err(ApiError::from)?;

    let schedules: Vec<ScheduleResponse> = rows
        .iter()
        .map(|row| {
            ScheduleResponse::from(Schedule {
                id: row.get("id"),
                cron_expr: row.get("cron_expr"),
                timezone: row.get("timezone"),
                job_type: row.get("job_type"),
                payload: row.get("payload"),
                enabled: row.get("enabled"),
                next_run_at: row.get("next_run_at"),
            })
        })
        .collect();

    Ok(Json(schedules))
}

#[derive(Debug, Deserialize)]
pub struct SetScheduleEnabledRequest {
    pub enabled: bool,
}

pub async fn set_schedule_enabled(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SetScheduleEnabledRequest>,
) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let rows = client
        .execute("UPDATE _ayb_schedules SET enabled = $2 WHERE id = $1", &[&id, &body.enabled])
        .await
        .map_err(ApiError::from)?;
    if rows == 0 {
        return Err(ApiError::not_found("schedule not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_schedule(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let client = state.pool.get().await.map_err(|err| ApiError::internal(format!("pool error: {err}")))?;
    let rows = client.execute("DELETE FROM _ayb_schedules WHERE id = $1", &[&id]).await.map_err(ApiError::from)?;
    if rows == 0 {
        return Err(ApiError::not_found("schedule not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
