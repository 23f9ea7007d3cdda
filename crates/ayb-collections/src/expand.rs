//! Many-to-one relationship expansion (§4.4.4): collect FK values across a
//! page, issue one secondary fetch per relationship keyed by PK, and attach
//! results under `expand.<fieldName>`. Expansion never follows a cycle
//! twice per page — tracked here by the `visited` set the caller threads
//! through recursive expansion (flat, one level, for this core).

use ayb_db::quote_qualified;
use ayb_error::{ApiError, ApiResult};
use ayb_schema::{RelationshipDef, TableDef};
use deadpool_postgres::Client;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Performs one batched lookup per expand field and attaches the result
/// onto each record's `expand` object, mutating `records` in place.
pub async fn apply_expansions(
    client: &Client,
    table: &TableDef,
    expand_fields: &[String],
    records: &mut [Value],
) -> ApiResult<()> {
    let mut visited = HashSet::new();
    for field in expand_fields {
        if !visited.insert(field.clone()) {
            continue; // never follow the same relationship twice per page
        }
        let rel = table
            .relationship(field)
            .ok_or_else(|| ApiError::invalid_request(format!("unknown expand relationship: {field}")))?;
        expand_one(client, rel, field, records).await?;
    }
    Ok(())
}

async fn expand_one(client: &Client, rel: &RelationshipDef, field: &str, records: &mut [Value]) -> ApiResult<()> {
    let fk_values: Vec<Value> = records
        .iter()
        .filter_map(|r| r.get(&rel.local_column).cloned())
        .filter(|v| !v.is_null())
        .collect();

    if fk_values.is_empty() {
        for record in records.iter_mut() {
            attach(record, field, Value::Null);
        }
        return Ok(());
    }

    let qualified = quote_qualified(&rel.referenced_schema, &rel.referenced_table);
    let sql = format!(
        "SELECT row_to_json(t) AS doc, t.{pk}::text AS pk_text FROM {table} t WHERE t.{pk} = ANY($1)",
        pk = ayb_db::quote_ident(&rel.referenced_column),
        table = qualified,
    );

    let text_values: Vec<String> = fk_values.iter().map(value_to_text).collect();
    let rows = client.query(sql.as_str(), &[&text_values]).await.map_err(ayb_error::ApiError::from)?;

    let mut by_key: HashMap<String, Value> = HashMap::new();
    for row in rows {
        let key: String = row.get("pk_text");
        let doc: Value = row.get("doc");
        by_key.insert(key, doc);
    }

    for record in records.iter_mut() {
        let key = record.get(&rel.local_column).map(value_to_text);
        let related = key.and_then(|k| by_key.get(&k).cloned()).unwrap_or(Value::Null);
        attach(record, field, related);
    }

    Ok(())
}

fn value_to_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn attach(record: &mut Value, field: &str, value: Value) {
    let Value::Object(obj) = record else { return };
    let expand_obj = obj.entry("expand").or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(map) = expand_obj {
        map.insert(field.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attach_inserts_under_expand_namespace() {
        let mut record = json!({"id": 1});
        attach(&mut record, "author", json!({"id": 7, "name": "Ada"}));
        assert_eq!(record["expand"]["author"]["name"], "Ada");
    }

    #[test]
    fn value_to_text_strips_string_quoting() {
        assert_eq!(value_to_text(&json!("abc")), "abc");
        assert_eq!(value_to_text(&json!(7)), "7");
    }
}
