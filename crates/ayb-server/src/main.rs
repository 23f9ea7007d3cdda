//! Entrypoint: loads configuration, bootstraps the schema cache, spawns the
//! background loops (schema rebuild, webhook dispatch, job workers,
//! scheduler tick, lease sweeper), and serves the HTTP API.

mod config;
mod middleware;
mod routes;
mod server;
mod sms;
mod state;
mod storage;

use ayb_collections::ChangeBus;
use ayb_queue::BackoffStrategy;
use ayb_webhooks::{ColumnSecretStore, SecretStore};
use config::ServerConfig;
use server::Server;
use sms::NoopSmsProvider;
use state::AppState;
use std::sync::Arc;
use std::time::Duration;
use storage::LocalDiskStore;

const WORKER_LEASE: Duration = Duration::from_secs(60);
const SCHEDULER_TICK: Duration = Duration::from_secs(1);
const LEASE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .json()
        .init();

    let config = ServerConfig::load();
    if let Err(err) = config.validate() {
        tracing::error!(error = %err, "invalid configuration");
        std::process::exit(1);
    }

    let pool = ayb_db::build_pool_from_url(&config.database_url, config.pool_max_size)
        .unwrap_or_else(|err| {
            tracing::error!(error = %err.message, "failed to build connection pool");
            std::process::exit(1);
        });

    let sqlx_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(u32::try_from(config.pool_max_size).unwrap_or(u32::MAX))
        .connect(&config.database_url)
        .await
        .unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to connect schema reflection pool");
            std::process::exit(1);
        });

    let schema = ayb_schema::SchemaHandle::bootstrap(sqlx_pool)
        .await
        .unwrap_or_else(|err| {
            tracing::error!(error = %err.message, "initial schema reflection failed");
            std::process::exit(1);
        });
    schema.spawn_rebuild_loop(config.schema_poll_interval());

    tokio::fs::create_dir_all(&config.storage_root).await.ok();

    let change_bus = ChangeBus::new();
    let secret_store: Arc<dyn SecretStore> = Arc::new(ColumnSecretStore::new(pool.clone()));
    let object_store: Arc<dyn storage::ObjectStore> = Arc::new(LocalDiskStore::new(config.storage_root.clone()));
    let sms_provider: Arc<dyn sms::SmsProvider> = Arc::new(NoopSmsProvider::new());

    let state = AppState {
        schema,
        pool: pool.clone(),
        change_bus: change_bus.clone(),
        rate_limiter: Arc::new(ayb_auth::KeyedRateLimiter::new()),
        config: Arc::new(config.clone()),
        secret_store: secret_store.clone(),
        object_store,
        sms_provider,
        http: reqwest::Client::new(),
    };

    tokio::spawn(ayb_webhooks::run_dispatch_loop(pool.clone(), change_bus.subscribe()));

    for worker_index in 0..config.job_worker_concurrency {
        tokio::spawn(job_worker_loop(
            pool.clone(),
            secret_store.clone(),
            state.http.clone(),
            format!("worker-{worker_index}"),
            config.job_poll_interval(),
        ));
    }

    tokio::spawn(scheduler_loop(pool.clone()));
    tokio::spawn(lease_sweep_loop(pool.clone()));

    let server = Server::build(state);
    if let Err(err) = server.serve().await {
        tracing::error!(error = %err, "server exited with an error");
        std::process::exit(1);
    }
}

/// Claims due jobs and dispatches by `job_type`. This core only knows how
/// to execute `webhook_delivery`; an unrecognized job type is marked failed
/// without retry rather than spinning forever.
async fn job_worker_loop(
    pool: deadpool_postgres::Pool,
    secret_store: Arc<dyn SecretStore>,
    http: reqwest::Client,
    worker_id: String,
    poll_interval: Duration,
) {
    let backoff = BackoffStrategy::Exponential {
        initial: Duration::from_secs(2),
        max: Duration::from_secs(300),
    };

    loop {
        let mut client = match pool.get().await {
            Ok(client) => client,
            Err(err) => {
                tracing::error!(error = %err, "worker could not acquire a connection");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        let claimed = match ayb_queue::claim_next(&mut client, &worker_id, chrono::Duration::from_std(WORKER_LEASE).unwrap()).await {
            Ok(job) => job,
            Err(err) => {
                tracing::error!(error = %err.message, "failed to claim a job");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        let Some(job) = claimed else {
            tokio::time::sleep(poll_interval).await;
            continue;
        };

        let outcome = run_job(&client, &http, &secret_store, &job).await;
        match outcome {
            Ok(()) => {
                if let Err(err) = ayb_queue::mark_completed(&client, job.id).await {
                    tracing::error!(error = %err.message, job_id = %job.id, "failed to mark job completed");
                }
            }
            Err(err) => {
                let retry_at = job.retriable().then(|| chrono::Utc::now() + chrono::Duration::from_std(backoff.delay_for_attempt(job.attempts)).unwrap());
                if let Err(mark_err) = ayb_queue::mark_failed(&client, job.id, &err.message, retry_at).await {
                    tracing::error!(error = %mark_err.message, job_id = %job.id, "failed to mark job failed");
                }
            }
        }
    }
}

async fn run_job(
    client: &deadpool_postgres::Client,
    http: &reqwest::Client,
    secret_store: &Arc<dyn SecretStore>,
    job: &ayb_queue::Job,
) -> ayb_error::ApiResult<()> {
    match job.job_type.as_str() {
        ayb_webhooks::delivery::WEBHOOK_DELIVERY_JOB_TYPE => {
            let webhook_id: uuid::Uuid = job
                .payload
                .get("webhook_id")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| ayb_error::ApiError::internal("webhook_delivery job missing webhook_id"))?;
            let event: ayb_collections::ChangeEvent = job
                .payload
                .get("event")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|err| ayb_error::ApiError::internal(format!("decode webhook event: {err}")))?
                .ok_or_else(|| ayb_error::ApiError::internal("webhook_delivery job missing event"))?;

            let webhooks = ayb_webhooks::list_enabled(client).await?;
            let webhook = webhooks
                .into_iter()
                .find(|w| w.id == webhook_id)
                .ok_or_else(|| ayb_error::ApiError::not_found("webhook no longer exists or is disabled"))?;

            ayb_webhooks::deliver(client, http, secret_store, &webhook, &event, job.id).await?;
            Ok(())
        }
        other => Err(ayb_error::ApiError::internal(format!("unrecognized job type: {other}"))),
    }
}

async fn scheduler_loop(pool: deadpool_postgres::Pool) {
    loop {
        tokio::time::sleep(SCHEDULER_TICK).await;
        let client = match pool.get().await {
            Ok(client) => client,
            Err(err) => {
                tracing::error!(error = %err, "scheduler could not acquire a connection");
                continue;
            }
        };

        let due = match ayb_queue::due_schedules(&client).await {
            Ok(due) => due,
            Err(err) => {
                tracing::error!(error = %err.message, "failed to list due schedules");
                continue;
            }
        };

        for schedule in due {
            if let Err(err) = ayb_queue::fire_schedule(&client, &schedule).await {
                tracing::error!(error = %err.message, schedule_id = %schedule.id, "failed to fire schedule");
            }
        }
    }
}

async fn lease_sweep_loop(pool: deadpool_postgres::Pool) {
    loop {
        tokio::time::sleep(LEASE_SWEEP_INTERVAL).await;
        let client = match pool.get().await {
            Ok(client) => client,
            Err(err) => {
                tracing::error!(error = %err, "lease sweeper could not acquire a connection");
                continue;
            }
        };

        match ayb_queue::sweep_expired_leases(&client).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "recovered jobs with expired leases"),
            Err(err) => tracing::error!(error = %err.message, "lease sweep failed"),
        }
    }
}
