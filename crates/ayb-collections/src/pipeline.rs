//! Compiles a [`crate::query::ParsedQuery`] (or a write body) to
//! parameterized SQL against one table, executes it, and returns JSON rows.
//! Reads and the page count run in the same transaction for consistency
//! (§4.4.3); writes run in their own transaction and emit a change event
//! only after it commits (§4.4.7).

use crate::change_bus::{ChangeAction, ChangeBus, ChangeEvent};
use crate::envelope::PageEnvelope;
use crate::expand::apply_expansions;
use crate::fts::compile_search;
use crate::query::ParsedQuery;
use crate::writer::{validate_and_coerce, WriteKind};
use ayb_db::{quote_ident, quote_qualified, BoundValue, PostgresWhereGenerator, WhereClause};
use ayb_error::{ApiError, ApiResult};
use ayb_schema::TableDef;
use chrono::Utc;
use deadpool_postgres::Client;
use serde_json::Value;
use tokio_postgres::types::ToSql;

fn params_as_dyn(params: &[BoundValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

fn combine_filter_and_search(query: &ParsedQuery, table: &TableDef) -> Option<WhereClause> {
    let search_clause = query.search.as_deref().and_then(|term| compile_search(table, term));
    match (query.filter.clone(), search_clause) {
        (Some(f), Some(s)) => Some(WhereClause::and(vec![f, s])),
        (Some(f), None) => Some(f),
        (None, Some(s)) => Some(s),
        (None, None) => None,
    }
}

/// Executes the paged list query plus its matching `COUNT(*)` in one
/// transaction, then applies any requested expansions.
pub async fn list(client: &mut Client, table: &TableDef, query: &ParsedQuery) -> ApiResult<PageEnvelope> {
    let txn = client.transaction().await.map_err(ApiError::from)?;

    let clause = combine_filter_and_search(query, table);
    let (where_sql, params) = match clause {
        Some(c) => {
            let gen = PostgresWhereGenerator::new(1);
            gen.generate(&c)
        }
        None => ("TRUE".to_string(), vec![]),
    };

    let qualified = quote_qualified(&table.schema, &table.name);
    let order_sql = ayb_db::render_order_by(&query.sort, &table.primary_key);

    let count_sql = format!("SELECT count(*) AS n FROM {qualified} WHERE {where_sql}");
    let count_row = txn
        .query_one(count_sql.as_str(), params_as_dyn(&params).as_slice())
        .await
        .map_err(ApiError::from)?;
    let total_items: i64 = count_row.get("n");

    let select_sql = format!(
        "SELECT row_to_json(t) AS doc FROM {qualified} t WHERE {where_sql} ORDER BY {order_sql} LIMIT ${} OFFSET ${}",
        params.len() + 1,
        params.len() + 2,
    );
    let mut bound: Vec<&(dyn ToSql + Sync)> = params_as_dyn(&params);
    let limit = query.pagination.limit();
    let offset = query.pagination.offset();
    bound.push(&limit);
    bound.push(&offset);

    let rows = txn.query(select_sql.as_str(), bound.as_slice()).await.map_err(ApiError::from)?;
    let mut items: Vec<Value> = rows.iter().map(|row| row.get("doc")).collect();

    txn.commit().await.map_err(ApiError::from)?;

    if !query.expand.is_empty() {
        apply_expansions(client, table, &query.expand, &mut items).await?;
    }

    Ok(PageEnvelope::new(items, query.pagination, total_items.max(0) as u64))
}

pub async fn get_by_id(client: &Client, table: &TableDef, id: &str) -> ApiResult<Value> {
    let pk = table
        .primary_key
        .first()
        .ok_or_else(|| ApiError::internal("table has no primary key"))?;
    let qualified = quote_qualified(&table.schema, &table.name);
    let sql = format!("SELECT row_to_json(t) AS doc FROM {qualified} t WHERE t.{} = $1", quote_ident(pk));
    let row = client
        .query_opt(sql.as_str(), &[&id])
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("record not found"))?;
    Ok(row.get("doc"))
}

pub async fn insert(client: &mut Client, table: &TableDef, bus: &ChangeBus, body: &Value) -> ApiResult<Value> {
    let Value::Object(map) = body else {
        return Err(ApiError::invalid_request("request body must be a JSON object"));
    };
    let coerced = validate_and_coerce(map, table, &WriteKind::Insert)?;

    let columns: Vec<&String> = coerced.keys().collect();
    let values: Vec<&BoundValue> = coerced.values().collect();
    let column_list = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    let placeholders = (1..=values.len()).map(|i| format!("${i}")).collect::<Vec<_>>().join(", ");
    let qualified = quote_qualified(&table.schema, &table.name);

    let sql = if values.is_empty() {
        format!("INSERT INTO {qualified} DEFAULT VALUES RETURNING row_to_json({0}.*) AS doc", table.name)
    } else {
        format!(
            "INSERT INTO {qualified} ({column_list}) VALUES ({placeholders}) RETURNING row_to_json({0}.*) AS doc",
            table.name,
        )
    };

    let txn = client.transaction().await.map_err(ApiError::from)?;
    let bound: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| *v as &(dyn ToSql + Sync)).collect();
    let row = txn.query_one(sql.as_str(), bound.as_slice()).await.map_err(ApiError::from)?;
    let doc: Value = row.get("doc");
    txn.commit().await.map_err(ApiError::from)?;

    bus.publish(ChangeEvent {
        action: ChangeAction::Create,
        schema: table.schema.clone(),
        table: table.name.clone(),
        primary_key: primary_key_value(table, &doc),
        before: None,
        after: Some(doc.clone()),
        at: Utc::now(),
    });

    Ok(doc)
}

pub async fn update(
    client: &mut Client,
    table: &TableDef,
    bus: &ChangeBus,
    id: &str,
    body: &Value,
) -> ApiResult<Value> {
    let Value::Object(map) = body else {
        return Err(ApiError::invalid_request("request body must be a JSON object"));
    };
    let coerced = validate_and_coerce(map, table, &WriteKind::Update)?;
    if coerced.is_empty() {
        return get_by_id(client, table, id).await;
    }

    let pk = table
        .primary_key
        .first()
        .ok_or_else(|| ApiError::internal("table has no primary key"))?;
    let qualified = quote_qualified(&table.schema, &table.name);

    let columns: Vec<&String> = coerced.keys().collect();
    let values: Vec<&BoundValue> = coerced.values().collect();
    let set_clause = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", quote_ident(c), i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let id_placeholder = format!("${}", values.len() + 1);

    let txn = client.transaction().await.map_err(ApiError::from)?;

    let before_sql = format!("SELECT row_to_json(t) AS doc FROM {qualified} t WHERE t.{} = $1", quote_ident(pk));
    let before_row = txn
        .query_opt(before_sql.as_str(), &[&id])
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("record not found"))?;
    let before: Value = before_row.get("doc");

    let pk_ident = quote_ident(pk);
    let sql = format!(
        "UPDATE {qualified} SET {set_clause} WHERE {pk_ident} = {id_placeholder} RETURNING row_to_json({}.*) AS doc",
        table.name,
    );
    let mut bound: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| *v as &(dyn ToSql + Sync)).collect();
    bound.push(&id);
    let row = txn.query_one(sql.as_str(), bound.as_slice()).await.map_err(ApiError::from)?;
    let after: Value = row.get("doc");
    txn.commit().await.map_err(ApiError::from)?;

    bus.publish(ChangeEvent {
        action: ChangeAction::Update,
        schema: table.schema.clone(),
        table: table.name.clone(),
        primary_key: primary_key_value(table, &after),
        before: Some(before),
        after: Some(after.clone()),
        at: Utc::now(),
    });

    Ok(after)
}

pub async fn delete(client: &mut Client, table: &TableDef, bus: &ChangeBus, id: &str) -> ApiResult<()> {
    let pk = table
        .primary_key
        .first()
        .ok_or_else(|| ApiError::internal("table has no primary key"))?;
    let qualified = quote_qualified(&table.schema, &table.name);

    let txn = client.transaction().await.map_err(ApiError::from)?;
    let sql = format!(
        "DELETE FROM {qualified} t WHERE t.{} = $1 RETURNING row_to_json(t.*) AS doc",
        quote_ident(pk)
    );
    let row = txn
        .query_opt(sql.as_str(), &[&id])
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("record not found"))?;
    let before: Value = row.get("doc");
    txn.commit().await.map_err(ApiError::from)?;

    bus.publish(ChangeEvent {
        action: ChangeAction::Delete,
        schema: table.schema.clone(),
        table: table.name.clone(),
        primary_key: primary_key_value(table, &before),
        before: Some(before),
        after: None,
        at: Utc::now(),
    });

    Ok(())
}

fn primary_key_value(table: &TableDef, doc: &Value) -> Value {
    match table.primary_key.first() {
        Some(pk) => doc.get(pk).cloned().unwrap_or(Value::Null),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primary_key_value_reads_named_pk_column() {
        let table = TableDef {
            schema: "public".to_string(),
            name: "posts".to_string(),
            is_materialized_view: false,
            columns: vec![],
            primary_key: vec!["id".to_string()],
            foreign_keys: vec![],
            relationships: vec![],
            indexes: vec![],
            search_vector_column: None,
        };
        let doc = json!({"id": 42, "title": "hi"});
        assert_eq!(primary_key_value(&table, &doc), json!(42));
    }
}
