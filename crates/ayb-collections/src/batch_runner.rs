//! Executes a parsed [`BatchRequest`] (§4.4.5). `atomic: true` (the
//! default) runs every item inside one transaction and rolls all of them
//! back on the first failure; `atomic: false` gives each item its own
//! transaction so failures stay local to that item.
//!
//! Reimplements insert/update/delete at the statement level rather than
//! calling [`crate::pipeline`] directly: those functions open their own
//! transaction internally, which would defeat sharing one transaction
//! across the whole atomic batch.

use crate::batch::{BatchItem, BatchItemResult, BatchMethod, BatchRequest};
use crate::change_bus::{ChangeAction, ChangeBus, ChangeEvent};
use crate::writer::{validate_and_coerce, WriteKind};
use ayb_db::{quote_ident, quote_qualified, BoundValue};
use ayb_error::{ApiError, ApiResult};
use ayb_schema::TableDef;
use chrono::Utc;
use deadpool_postgres::Client;
use serde_json::Value;
use tokio_postgres::types::ToSql;
use tokio_postgres::Transaction;

fn primary_key_of(table: &TableDef) -> ApiResult<&str> {
    table.primary_key.first().map(String::as_str).ok_or_else(|| ApiError::internal("table has no primary key"))
}

fn id_as_value(item: &BatchItem) -> ApiResult<String> {
    match &item.id {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(ApiError::invalid_request("batch item requires an id for this method")),
    }
}

async fn run_create(txn: &Transaction<'_>, table: &TableDef, item: &BatchItem) -> ApiResult<Value> {
    let Some(Value::Object(map)) = &item.body else {
        return Err(ApiError::invalid_request("create requires a JSON object body"));
    };
    let coerced = validate_and_coerce(map, table, &WriteKind::Insert)?;
    let columns: Vec<&String> = coerced.keys().collect();
    let values: Vec<&BoundValue> = coerced.values().collect();
    let qualified = quote_qualified(&table.schema, &table.name);

    let sql = if values.is_empty() {
        format!("INSERT INTO {qualified} DEFAULT VALUES RETURNING row_to_json({0}.*) AS doc", table.name)
    } else {
        let column_list = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        let placeholders = (1..=values.len()).map(|i| format!("${i}")).collect::<Vec<_>>().join(", ");
        format!(
            "INSERT INTO {qualified} ({column_list}) VALUES ({placeholders}) RETURNING row_to_json({0}.*) AS doc",
            table.name,
        )
    };

    let bound: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| *v as &(dyn ToSql + Sync)).collect();
    let row = txn.query_one(sql.as_str(), bound.as_slice()).await.map_err(ApiError::from)?;
    Ok(row.get("doc"))
}

async fn run_update(txn: &Transaction<'_>, table: &TableDef, item: &BatchItem) -> ApiResult<Value> {
    let Some(Value::Object(map)) = &item.body else {
        return Err(ApiError::invalid_request("update requires a JSON object body"));
    };
    let id = id_as_value(item)?;
    let coerced = validate_and_coerce(map, table, &WriteKind::Update)?;
    let pk = primary_key_of(table)?;
    let qualified = quote_qualified(&table.schema, &table.name);

    if coerced.is_empty() {
        let sql = format!("SELECT row_to_json(t) AS doc FROM {qualified} t WHERE t.{} = $1", quote_ident(pk));
        let row = txn
            .query_opt(sql.as_str(), &[&id])
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::not_found("record not found"))?;
        return Ok(row.get("doc"));
    }

    let columns: Vec<&String> = coerced.keys().collect();
    let values: Vec<&BoundValue> = coerced.values().collect();
    let set_clause = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", quote_ident(c), i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let id_placeholder = format!("${}", values.len() + 1);
    let sql = format!(
        "UPDATE {qualified} SET {set_clause} WHERE {} = {id_placeholder} RETURNING row_to_json({0}.*) AS doc",
        quote_ident(pk),
        table.name,
    );
    let mut bound: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| *v as &(dyn ToSql + Sync)).collect();
    bound.push(&id);
    let row = txn
        .query_opt(sql.as_str(), bound.as_slice())
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("record not found"))?;
    Ok(row.get("doc"))
}

async fn run_delete(txn: &Transaction<'_>, table: &TableDef, item: &BatchItem) -> ApiResult<Value> {
    let id = id_as_value(item)?;
    let pk = primary_key_of(table)?;
    let qualified = quote_qualified(&table.schema, &table.name);
    let sql = format!("DELETE FROM {qualified} t WHERE t.{} = $1 RETURNING row_to_json(t.*) AS doc", quote_ident(pk));
    let row = txn
        .query_opt(sql.as_str(), &[&id])
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("record not found"))?;
    Ok(row.get("doc"))
}

fn primary_key_value(table: &TableDef, doc: &Value) -> Value {
    table.primary_key.first().and_then(|pk| doc.get(pk)).cloned().unwrap_or(Value::Null)
}

async fn run_item(txn: &Transaction<'_>, table: &TableDef, item: &BatchItem) -> ApiResult<(ChangeAction, Value)> {
    match item.method {
        BatchMethod::Create => run_create(txn, table, item).await.map(|doc| (ChangeAction::Create, doc)),
        BatchMethod::Update | BatchMethod::Replace => run_update(txn, table, item).await.map(|doc| (ChangeAction::Update, doc)),
        BatchMethod::Delete => run_delete(txn, table, item).await.map(|doc| (ChangeAction::Delete, doc)),
    }
}

fn error_status(err: &ApiError) -> u16 {
    err.kind.status_code().as_u16()
}

fn success_status(action: ChangeAction) -> u16 {
    match action {
        ChangeAction::Create => 201,
        ChangeAction::Update | ChangeAction::Delete => 200,
    }
}

fn publish(bus: &ChangeBus, table: &TableDef, action: ChangeAction, doc: &Value) {
    bus.publish(ChangeEvent {
        action,
        schema: table.schema.clone(),
        table: table.name.clone(),
        primary_key: primary_key_value(table, doc),
        before: None,
        after: if matches!(action, ChangeAction::Delete) { None } else { Some(doc.clone()) },
        at: Utc::now(),
    });
}

/// Runs `request` against `table`. On `atomic: true`, the first item
/// failure rolls back everything and every result entry reports the same
/// failure status for the items attempted so far plus the one that failed.
pub async fn run(client: &mut Client, table: &TableDef, bus: &ChangeBus, request: BatchRequest) -> ApiResult<Vec<BatchItemResult>> {
    if request.atomic {
        run_atomic(client, table, bus, &request.items).await
    } else {
        run_independent(client, table, bus, &request.items).await
    }
}

async fn run_atomic(client: &mut Client, table: &TableDef, bus: &ChangeBus, items: &[BatchItem]) -> ApiResult<Vec<BatchItemResult>> {
    let txn = client.transaction().await.map_err(ApiError::from)?;
    let mut results = Vec::with_capacity(items.len());
    let mut events = Vec::new();

    for (index, item) in items.iter().enumerate() {
        match run_item(&txn, table, item).await {
            Ok((action, doc)) => {
                events.push((action, doc.clone()));
                results.push(BatchItemResult {
                    index,
                    status: success_status(action),
                    body: Some(doc),
                    error: None,
                });
            }
            Err(err) => {
                results.push(BatchItemResult {
                    index,
                    status: error_status(&err),
                    body: None,
                    error: Some(err.message.clone()),
                });
                drop(txn);
                // The transaction rolled back, so every item that appeared
                // to succeed above never actually committed — relabel them
                // to the same failure status rather than reporting a 201/200
                // for work that no longer exists.
                let failure_status = results[index].status;
                for prior in &mut results[..index] {
                    prior.status = failure_status;
                    prior.body = None;
                    prior.error = Some("rolled back: a later item in this atomic batch failed".to_string());
                }
                return Ok(results);
            }
        }
    }

    txn.commit().await.map_err(ApiError::from)?;
    for (action, doc) in events {
        publish(bus, table, action, &doc);
    }
    Ok(results)
}

async fn run_independent(client: &mut Client, table: &TableDef, bus: &ChangeBus, items: &[BatchItem]) -> ApiResult<Vec<BatchItemResult>> {
    let mut results = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let txn = client.transaction().await.map_err(ApiError::from)?;
        match run_item(&txn, table, item).await {
            Ok((action, doc)) => {
                txn.commit().await.map_err(ApiError::from)?;
                publish(bus, table, action, &doc);
                results.push(BatchItemResult {
                    index,
                    status: success_status(action),
                    body: Some(doc),
                    error: None,
                });
            }
            Err(err) => {
                drop(txn);
                results.push(BatchItemResult {
                    index,
                    status: error_status(&err),
                    body: None,
                    error: Some(err.message.clone()),
                });
            }
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_status_matches_http_convention() {
        assert_eq!(success_status(ChangeAction::Create), 201);
        assert_eq!(success_status(ChangeAction::Update), 200);
        assert_eq!(success_status(ChangeAction::Delete), 200);
    }

    #[test]
    fn id_as_value_rejects_missing_id() {
        let item = BatchItem {
            method: BatchMethod::Update,
            id: None,
            body: None,
        };
        assert!(id_as_value(&item).is_err());
    }
}
