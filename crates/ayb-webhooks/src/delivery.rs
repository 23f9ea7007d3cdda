//! Subscribes to the collections change bus, matches each event against the
//! registered webhooks, and enqueues one durable delivery job per match
//! (§4.4.7, §5). The actual HTTP delivery runs from the job queue worker so
//! a slow or dead endpoint never blocks the request that produced the
//! event; [`send_test_delivery`] is the one synchronous exception, used by
//! the "send test event" admin action.

use crate::secret_store::SecretStore;
use crate::signature::sign;
use ayb_collections::{ChangeAction, ChangeEvent};
use ayb_error::{ApiError, ApiResult};
use ayb_queue::EnqueueOptions;
use chrono::{DateTime, Utc};
use deadpool_postgres::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);
pub const WEBHOOK_DELIVERY_JOB_TYPE: &str = "webhook_delivery";

#[derive(Debug, Clone)]
pub struct Webhook {
    pub id: Uuid,
    pub url: String,
    pub events: Vec<ChangeAction>,
    /// Empty means "every table".
    pub tables: Vec<String>,
    pub enabled: bool,
}

impl Webhook {
    #[must_use]
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.enabled
            && self.events.contains(&event.action)
            && (self.tables.is_empty() || self.tables.iter().any(|t| t == &event.table))
    }
}

fn row_to_webhook(row: &tokio_postgres::Row) -> ApiResult<Webhook> {
    let event_strs: Vec<String> = row.get("events");
    let events = event_strs
        .iter()
        .filter_map(|s| match s.as_str() {
            "create" => Some(ChangeAction::Create),
            "update" => Some(ChangeAction::Update),
            "delete" => Some(ChangeAction::Delete),
            _ => None,
        })
        .collect();
    Ok(Webhook {
        id: row.get("id"),
        url: row.get("url"),
        events,
        tables: row.get("tables"),
        enabled: row.get("enabled"),
    })
}

pub async fn list_enabled(client: &Client) -> ApiResult<Vec<Webhook>> {
    let rows = client
        .query(
            "SELECT id, url, events, tables, enabled FROM _ayb_webhooks WHERE enabled = true",
            &[],
        )
        .await
        .map_err(ApiError::from)?;
    rows.iter().map(row_to_webhook).collect()
}

/// Drains `rx` for the life of the bus, enqueueing one job per matching,
/// enabled webhook. Runs as its own background task; publish failures here
/// are logged, never propagated, per the same rule as the bus itself.
pub async fn run_dispatch_loop(client_pool: deadpool_postgres::Pool, mut rx: tokio::sync::broadcast::Receiver<ChangeEvent>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "webhook dispatcher fell behind the change bus");
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        };

        let client = match client_pool.get().await {
            Ok(client) => client,
            Err(err) => {
                tracing::error!(error = %err, "could not get a connection to dispatch webhooks");
                continue;
            }
        };

        let webhooks = match list_enabled(&client).await {
            Ok(webhooks) => webhooks,
            Err(err) => {
                tracing::error!(error = %err.message, "failed to list webhooks for dispatch");
                continue;
            }
        };

        for webhook in webhooks.iter().filter(|w| w.matches(&event)) {
            let payload = json!({"webhook_id": webhook.id, "event": event});
            let opts = EnqueueOptions {
                idempotency_key: Some(format!("{}:{}:{}", webhook.id, event.table, event.at.to_rfc3339())),
                ..Default::default()
            };
            if let Err(err) = ayb_queue::enqueue(&client, WEBHOOK_DELIVERY_JOB_TYPE, payload, opts).await {
                tracing::error!(webhook_id = %webhook.id, error = %err.message, "failed to enqueue webhook delivery");
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub event: Value,
    pub response_status: Option<i32>,
    pub succeeded: bool,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// Performs the actual outbound request and persists a `WebhookDelivery`
/// row regardless of outcome, so delivery history survives a dead endpoint.
/// Returns `Err` only when the request itself should be retried by the
/// caller (the job queue's backoff); the persisted row always reflects the
/// real outcome either way.
///
/// `delivery_id` is the owning job's id, not a fresh id per attempt: §7
/// requires a retried delivery to carry the same body and `X-AYB-Delivery`
/// id as the attempt before it, and §4.8 names the job id as that stable
/// identifier. The delivery-history row is upserted on `id` so a retry
/// updates the existing row instead of conflicting with it.
pub async fn deliver(
    client: &Client,
    http: &reqwest::Client,
    secret_store: &Arc<dyn SecretStore>,
    webhook: &Webhook,
    event: &ChangeEvent,
    delivery_id: Uuid,
) -> ApiResult<WebhookDelivery> {
    let event_header = format!("{}.{}", event.action.as_str(), event.table);
    let body = json!({
        "id": delivery_id,
        "action": event.action.as_str(),
        "table": event.table,
        "schema": event.schema,
        "record": event.after,
        "old": event.before,
        "occurred_at": event.at,
    });
    let body_bytes = serde_json::to_vec(&body).map_err(|err| ApiError::internal(format!("encode webhook body: {err}")))?;

    let mut request = http
        .post(&webhook.url)
        .timeout(DELIVERY_TIMEOUT)
        .header("Content-Type", "application/json")
        .header("X-AYB-Delivery", delivery_id.to_string())
        .header("X-AYB-Event", event_header);

    if let Some(secret) = secret_store.fetch(webhook.id).await? {
        request = request.header("X-AYB-Signature", sign(&secret, &body_bytes));
    }

    let outcome = request.body(body_bytes).send().await;

    let (status, succeeded, error) = match outcome {
        Ok(response) => {
            let status = response.status();
            (Some(i32::from(status.as_u16())), status.is_success(), None)
        }
        Err(err) => (None, false, Some(err.to_string())),
    };

    let record = WebhookDelivery {
        id: delivery_id,
        webhook_id: webhook.id,
        event: json!(event),
        response_status: status,
        succeeded,
        error: error.clone(),
        attempted_at: Utc::now(),
    };

    client
        .execute(
            "INSERT INTO _ayb_webhook_deliveries
                (id, webhook_id, event, response_status, succeeded, error, attempted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO UPDATE SET
                response_status = EXCLUDED.response_status,
                succeeded = EXCLUDED.succeeded,
                error = EXCLUDED.error,
                attempted_at = EXCLUDED.attempted_at",
            &[
                &record.id,
                &record.webhook_id,
                &record.event,
                &record.response_status,
                &record.succeeded,
                &record.error,
                &record.attempted_at,
            ],
        )
        .await
        .map_err(ApiError::from)?;

    if succeeded {
        Ok(record)
    } else {
        Err(ApiError::upstream(error.unwrap_or_else(|| "webhook endpoint returned an error status".to_string())))
    }
}

/// The admin "send test event" action: builds a synthetic event and
/// delivers it immediately, bypassing the job queue, returning the outcome
/// directly to the caller instead of persisting delivery history.
pub async fn send_test_delivery(
    http: &reqwest::Client,
    secret_store: &Arc<dyn SecretStore>,
    webhook: &Webhook,
) -> ApiResult<bool> {
    let delivery_id = Uuid::new_v4();
    let body = json!({
        "id": delivery_id,
        "action": "create",
        "table": "_test",
        "schema": "public",
        "record": {"message": "this is a test delivery from AYB"},
        "old": Value::Null,
        "occurred_at": Utc::now(),
    });
    let body_bytes = serde_json::to_vec(&body).map_err(|err| ApiError::internal(format!("encode webhook body: {err}")))?;

    let mut request = http
        .post(&webhook.url)
        .timeout(DELIVERY_TIMEOUT)
        .header("Content-Type", "application/json")
        .header("X-AYB-Delivery", delivery_id.to_string())
        .header("X-AYB-Event", "test");

    if let Some(secret) = secret_store.fetch(webhook.id).await? {
        request = request.header("X-AYB-Signature", sign(&secret, &body_bytes));
    }

    let response = request
        .body(body_bytes)
        .send()
        .await
        .map_err(|err| ApiError::upstream(format!("test delivery failed: {err}")))?;

    Ok(response.status().is_success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn sample_webhook(events: Vec<ChangeAction>, tables: Vec<String>) -> Webhook {
        Webhook {
            id: Uuid::new_v4(),
            url: "https://example.com/hook".to_string(),
            events,
            tables,
            enabled: true,
        }
    }

    fn sample_event(action: ChangeAction, table: &str) -> ChangeEvent {
        ChangeEvent {
            action,
            schema: "public".to_string(),
            table: table.to_string(),
            primary_key: json!({"id": 1}),
            before: None,
            after: Some(json!({"id": 1})),
            at: Utc::now(),
        }
    }

    #[test]
    fn matches_when_action_and_table_are_both_subscribed() {
        let webhook = sample_webhook(vec![ChangeAction::Create], vec!["posts".to_string()]);
        assert!(webhook.matches(&sample_event(ChangeAction::Create, "posts")));
    }

    #[test]
    fn does_not_match_unsubscribed_action() {
        let webhook = sample_webhook(vec![ChangeAction::Delete], vec![]);
        assert!(!webhook.matches(&sample_event(ChangeAction::Create, "posts")));
    }

    #[test]
    fn empty_tables_list_matches_every_table() {
        let webhook = sample_webhook(vec![ChangeAction::Update], vec![]);
        assert!(webhook.matches(&sample_event(ChangeAction::Update, "anything")));
    }

    #[test]
    fn disabled_webhook_never_matches() {
        let mut webhook = sample_webhook(vec![ChangeAction::Create], vec![]);
        webhook.enabled = false;
        assert!(!webhook.matches(&sample_event(ChangeAction::Create, "posts")));
    }

    #[test]
    fn event_header_combines_action_and_table() {
        let event = sample_event(ChangeAction::Create, "posts");
        let header = format!("{}.{}", event.action.as_str(), event.table);
        assert_eq!(header, "create.posts");
    }
}
