//! Durable queue operations backed by `_ayb_jobs`.

use crate::job::{Job, JobState};
use ayb_error::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use deadpool_postgres::Client;
use serde_json::Value;
use uuid::Uuid;

pub struct EnqueueOptions {
    pub run_at: Option<DateTime<Utc>>,
    pub max_attempts: u32,
    pub idempotency_key: Option<String>,
    pub schedule_id: Option<Uuid>,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            run_at: None,
            max_attempts: 5,
            idempotency_key: None,
            schedule_id: None,
        }
    }
}

fn row_to_job(row: &tokio_postgres::Row) -> ApiResult<Job> {
    let state_str: String = row.get("state");
    let state = JobState::from_db_str(&state_str)
        .ok_or_else(|| ApiError::internal("job row has an unrecognized state"))?;
    Ok(Job {
        id: row.get("id"),
        job_type: row.get("job_type"),
        payload: row.get("payload"),
        state,
        run_at: row.get("run_at"),
        attempts: u32::try_from(row.get::<_, i32>("attempts")).unwrap_or(0),
        max_attempts: u32::try_from(row.get::<_, i32>("max_attempts")).unwrap_or(0),
        worker_id: row.get("worker_id"),
        lease_until: row.get("lease_until"),
        last_error: row.get("last_error"),
        idempotency_key: row.get("idempotency_key"),
        schedule_id: row.get("schedule_id"),
        completed_at: row.get("completed_at"),
        canceled_at: row.get("canceled_at"),
    })
}

/// If `idempotency_key` collides with a non-terminal row of the same type,
/// the existing row is returned rather than a duplicate inserted — this is
/// what makes the scheduler's per-tick contract (§4.7) hold even with
/// multiple scheduler instances racing.
pub async fn enqueue(
    client: &Client,
    job_type: &str,
    payload: Value,
    opts: EnqueueOptions,
) -> ApiResult<Job> {
    if let Some(key) = &opts.idempotency_key {
        let existing = client
            .query_opt(
                "SELECT * FROM _ayb_jobs
                 WHERE job_type = $1 AND idempotency_key = $2
                   AND state IN ('queued', 'running')",
                &[&job_type, key],
            )
            .await
            .map_err(ApiError::from)?;
        if let Some(row) = existing {
            return row_to_job(&row);
        }
    }

    let run_at = opts.run_at.unwrap_or_else(Utc::now);
    let row = client
        .query_one(
            "INSERT INTO _ayb_jobs
                (job_type, payload, state, run_at, attempts, max_attempts,
                 idempotency_key, schedule_id)
             VALUES ($1, $2, 'queued', $3, 0, $4, $5, $6)
             RETURNING *",
            &[
                &job_type,
                &payload,
                &run_at,
                &i32::try_from(opts.max_attempts).unwrap_or(i32::MAX),
                &opts.idempotency_key,
                &opts.schedule_id,
            ],
        )
        .await
        .map_err(ApiError::from)?;

    row_to_job(&row)
}

pub async fn get(client: &Client, id: Uuid) -> ApiResult<Job> {
    let row = client
        .query_opt("SELECT * FROM _ayb_jobs WHERE id = $1", &[&id])
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("job not found"))?;
    row_to_job(&row)
}

pub async fn list(client: &Client, state: Option<JobState>) -> ApiResult<Vec<Job>> {
    let rows = match state {
        Some(state) => {
            client
                .query(
                    "SELECT * FROM _ayb_jobs WHERE state = $1 ORDER BY run_at ASC",
                    &[&state.as_db_str()],
                )
                .await
        }
        None => client.query("SELECT * FROM _ayb_jobs ORDER BY run_at ASC", &[]).await,
    }
    .map_err(ApiError::from)?;

    rows.iter().map(row_to_job).collect()
}

/// Resets a job back to `queued`, clearing lease and error state.
pub async fn retry(client: &Client, id: Uuid) -> ApiResult<Job> {
    let row = client
        .query_opt(
            "UPDATE _ayb_jobs
             SET state = 'queued', lease_until = NULL, last_error = NULL, worker_id = NULL
             WHERE id = $1
             RETURNING *",
            &[&id],
        )
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("job not found"))?;
    row_to_job(&row)
}

/// Only a `queued` job may be canceled — one already running is left to
/// finish or be recovered by the sweeper.
pub async fn cancel(client: &Client, id: Uuid) -> ApiResult<Job> {
    let row = client
        .query_opt(
            "UPDATE _ayb_jobs
             SET state = 'canceled', canceled_at = now()
             WHERE id = $1 AND state = 'queued'
             RETURNING *",
            &[&id],
        )
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::conflict("job is not in a cancelable state"))?;
    row_to_job(&row)
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueStats {
    pub queued: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
    pub canceled: i64,
    pub oldest_queued_age_seconds: Option<i64>,
}

pub async fn queue_stats(client: &Client) -> ApiResult<QueueStats> {
    let row = client
        .query_one(
            "SELECT
                count(*) FILTER (WHERE state = 'queued') AS queued,
                count(*) FILTER (WHERE state = 'running') AS running,
                count(*) FILTER (WHERE state = 'completed') AS completed,
                count(*) FILTER (WHERE state = 'failed') AS failed,
                count(*) FILTER (WHERE state = 'canceled') AS canceled,
                EXTRACT(EPOCH FROM (now() - min(run_at) FILTER (WHERE state = 'queued')))::BIGINT
                    AS oldest_queued_age_seconds
             FROM _ayb_jobs",
            &[],
        )
        .await
        .map_err(ApiError::from)?;

    Ok(QueueStats {
        queued: row.get("queued"),
        running: row.get("running"),
        completed: row.get("completed"),
        failed: row.get("failed"),
        canceled: row.get("canceled"),
        oldest_queued_age_seconds: row.get("oldest_queued_age_seconds"),
    })
}

/// The worker's claim step: select one due `queued` job with `FOR UPDATE
/// SKIP LOCKED` so concurrent workers never contend for the same row, mark
/// it `running`, and hand back the claimed job.
pub async fn claim_next(client: &mut Client, worker_id: &str, lease: chrono::Duration) -> ApiResult<Option<Job>> {
    let txn = client.transaction().await.map_err(ApiError::from)?;

    let row = txn
        .query_opt(
            "SELECT * FROM _ayb_jobs
             WHERE state = 'queued' AND run_at <= now()
             ORDER BY run_at ASC
             FOR UPDATE SKIP LOCKED
             LIMIT 1",
            &[],
        )
        .await
        .map_err(ApiError::from)?;

    let Some(row) = row else {
        txn.commit().await.map_err(ApiError::from)?;
        return Ok(None);
    };

    let id: Uuid = row.get("id");
    let lease_until = Utc::now() + lease;
    let claimed = txn
        .query_one(
            "UPDATE _ayb_jobs
             SET state = 'running', worker_id = $2, lease_until = $3, attempts = attempts + 1
             WHERE id = $1
             RETURNING *",
            &[&id, &worker_id, &lease_until],
        )
        .await
        .map_err(ApiError::from)?;

    txn.commit().await.map_err(ApiError::from)?;
    row_to_job(&claimed).map(Some)
}

pub async fn mark_completed(client: &Client, id: Uuid) -> ApiResult<()> {
    client
        .execute(
            "UPDATE _ayb_jobs SET state = 'completed', completed_at = now() WHERE id = $1",
            &[&id],
        )
        .await
        .map_err(ApiError::from)?;
    Ok(())
}

/// `retry_at` is `None` when attempts are exhausted, in which case the job
/// goes straight to `failed` instead of being rescheduled.
pub async fn mark_failed(
    client: &Client,
    id: Uuid,
    error: &str,
    retry_at: Option<DateTime<Utc>>,
) -> ApiResult<()> {
    match retry_at {
        Some(run_at) => {
            client
                .execute(
                    "UPDATE _ayb_jobs
                     SET state = 'queued', run_at = $2, last_error = $3, lease_until = NULL
                     WHERE id = $1",
                    &[&id, &run_at, &error],
                )
                .await
                .map_err(ApiError::from)?;
        }
        None => {
            client
                .execute(
                    "UPDATE _ayb_jobs SET state = 'failed', last_error = $2 WHERE id = $1",
                    &[&id, &error],
                )
                .await
                .map_err(ApiError::from)?;
        }
    }
    Ok(())
}

/// Returns expired leases to `queued`. Runs on a bounded interval from a
/// dedicated task, independent of any single worker's lifetime.
pub async fn sweep_expired_leases(client: &Client) -> ApiResult<u64> {
    let affected = client
        .execute(
            "UPDATE _ayb_jobs
             SET state = 'queued', worker_id = NULL, lease_until = NULL
             WHERE state = 'running' AND lease_until < now()",
            &[],
        )
        .await
        .map_err(ApiError::from)?;
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enqueue_options_allow_five_attempts() {
        assert_eq!(EnqueueOptions::default().max_attempts, 5);
    }
}
