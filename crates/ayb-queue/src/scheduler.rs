//! Converts cron-defined `Schedule` rows into queued jobs, one per tick,
//! exactly once per `(schedule_id, idempotency_key)` pair (§4.7).

use crate::queue::{enqueue, EnqueueOptions};
use ayb_error::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use deadpool_postgres::Client;
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Schedule {
    pub id: Uuid,
    pub cron_expr: String,
    pub timezone: String,
    pub job_type: String,
    pub payload: Value,
    pub enabled: bool,
    pub next_run_at: DateTime<Utc>,
}

/// Computes the next fire time strictly after `after`, in `timezone`.
///
/// `cron_expr` is the standard 5-field form (`minute hour day-of-month
/// month day-of-week`); the `cron` crate expects a leading seconds field,
/// so a 5-field expression is normalized to 6 fields before parsing.
pub fn compute_next_run(cron_expr: &str, timezone: &str, after: DateTime<Utc>) -> ApiResult<DateTime<Utc>> {
    let normalized = match cron_expr.split_whitespace().count() {
        5 => format!("0 {cron_expr}"),
        _ => cron_expr.to_string(),
    };
    let schedule = CronSchedule::from_str(&normalized)
        .map_err(|err| ApiError::invalid_request(format!("invalid cron expression: {err}")))?;
    let tz: Tz = timezone
        .parse()
        .map_err(|_| ApiError::invalid_request("unrecognized IANA timezone"))?;

    let after_in_tz = after.with_timezone(&tz);
    schedule
        .after(&after_in_tz)
        .next()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ApiError::internal("cron schedule has no future occurrences"))
}

/// Processes one schedule row that is due to fire: enqueues its job with a
/// deterministic idempotency key, then advances `last_run_at`/`next_run_at`.
/// Caller is expected to run this inside the same transaction that read the
/// schedule row, or to rely on the job-level idempotency key for safety
/// under concurrent scheduler instances.
pub async fn fire_schedule(client: &Client, schedule: &Schedule) -> ApiResult<()> {
    let idempotency_key = format!("{}:{}", schedule.id, schedule.next_run_at.to_rfc3339());

    enqueue(
        client,
        &schedule.job_type,
        schedule.payload.clone(),
        EnqueueOptions {
            run_at: Some(schedule.next_run_at),
            max_attempts: 5,
            idempotency_key: Some(idempotency_key),
            schedule_id: Some(schedule.id),
        },
    )
    .await?;

    let next_run_at = compute_next_run(&schedule.cron_expr, &schedule.timezone, schedule.next_run_at)?;

    client
        .execute(
            "UPDATE _ayb_schedules SET last_run_at = $2, next_run_at = $3 WHERE id = $1",
            &[&schedule.id, &schedule.next_run_at, &next_run_at],
        )
        .await
        .map_err(ApiError::from)?;

    Ok(())
}

pub async fn due_schedules(client: &Client) -> ApiResult<Vec<Schedule>> {
    let rows = client
        .query(
            "SELECT id, cron_expr, timezone, job_type, payload, enabled, next_run_at
             FROM _ayb_schedules
             WHERE enabled AND next_run_at <= now()",
            &[],
        )
        .await
        .map_err(ApiError::from)?;

    Ok(rows
        .into_iter()
        .map(|row| Schedule {
            id: row.get("id"),
            cron_expr: row.get("cron_expr"),
            timezone: row.get("timezone"),
            job_type: row.get("job_type"),
            payload: row.get("payload"),
            enabled: row.get("enabled"),
            next_run_at: row.get("next_run_at"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn every_minute_expression_advances_by_sixty_seconds() {
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = compute_next_run("0 * * * * *", "UTC", after).unwrap();
        assert_eq!(next, after + chrono::Duration::minutes(1));
    }

    #[test]
    fn five_field_expression_is_normalized_to_six_fields() {
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = compute_next_run("* * * * *", "UTC", after).unwrap();
        assert_eq!(next, after + chrono::Duration::minutes(1));
    }

    #[test]
    fn invalid_expression_is_rejected() {
        assert!(compute_next_run("not a cron", "UTC", Utc::now()).is_err());
    }

    #[test]
    fn invalid_timezone_is_rejected() {
        let after = Utc::now();
        assert!(compute_next_run("0 * * * * *", "Not/AZone", after).is_err());
    }
}
