//! Write-path validation, in the fixed order §4.4.6 specifies: unknown
//! columns, then computed/PK-on-update, then type coercion, then NOT NULL.
//! Each stage short-circuits with the status code the spec assigns it.

use ayb_db::BoundValue;
use ayb_error::{ApiError, ApiResult};
use ayb_schema::TableDef;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

pub enum WriteKind {
    Insert,
    Update,
}

/// Validates and coerces a request body against `table`, returning the
/// column/value pairs ready to bind into an INSERT/UPDATE statement.
pub fn validate_and_coerce(
    body: &serde_json::Map<String, JsonValue>,
    table: &TableDef,
    kind: &WriteKind,
) -> ApiResult<BTreeMap<String, BoundValue>> {
    for key in body.keys() {
        if table.column(key).is_none() {
            return Err(ApiError::invalid_request(format!("unknown column: {key}")));
        }
    }

    for key in body.keys() {
        let col = table.column(key).expect("checked above");
        if col.is_generated {
            return Err(ApiError::invalid_request(format!("column is computed and cannot be written: {key}")));
        }
        if matches!(kind, WriteKind::Update) && table.primary_key.iter().any(|pk| pk == key) {
            return Err(ApiError::invalid_request(format!("primary key column cannot be updated: {key}")));
        }
    }

    let mut coerced = BTreeMap::new();
    for (key, value) in body {
        let col = table.column(key).expect("checked above");
        let bound = BoundValue::coerce(value, col.column_type)?;
        coerced.insert(key.clone(), bound);
    }

    if matches!(kind, WriteKind::Insert) {
        for col in &table.columns {
            if col.is_generated || table.primary_key.iter().any(|pk| pk == &col.name) {
                continue;
            }
            let provided = coerced.get(&col.name);
            let is_null_write = matches!(provided, Some(BoundValue::Null));
            if !col.nullable && !col.has_default && (provided.is_none() || is_null_write) {
                return Err(ApiError::validation(format!("column is NOT NULL and has no default: {}", col.name)));
            }
        }
    }

    Ok(coerced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ayb_schema::{ColumnDef, ColumnType};
    use serde_json::json;

    fn table_with(columns: Vec<ColumnDef>, primary_key: Vec<&str>) -> TableDef {
        TableDef {
            schema: "public".to_string(),
            name: "posts".to_string(),
            is_materialized_view: false,
            columns,
            primary_key: primary_key.into_iter().map(str::to_string).collect(),
            foreign_keys: vec![],
            relationships: vec![],
            indexes: vec![],
            search_vector_column: None,
        }
    }

    fn text_col(name: &str, nullable: bool, has_default: bool) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            column_type: ColumnType::Text,
            udt_name: "text".to_string(),
            nullable,
            has_default,
            is_generated: false,
            enum_values: None,
        }
    }

    #[test]
    fn rejects_unknown_column() {
        let table = table_with(vec![text_col("title", false, false)], vec!["id"]);
        let mut body = serde_json::Map::new();
        body.insert("bogus".to_string(), json!("x"));
        assert!(validate_and_coerce(&body, &table, &WriteKind::Insert).is_err());
    }

    #[test]
    fn rejects_pk_write_on_update() {
        let mut id_col = text_col("id", false, false);
        id_col.column_type = ColumnType::Uuid;
        let table = table_with(vec![id_col], vec!["id"]);
        let mut body = serde_json::Map::new();
        body.insert("id".to_string(), json!("11111111-1111-1111-1111-111111111111"));
        assert!(validate_and_coerce(&body, &table, &WriteKind::Update).is_err());
    }

    #[test]
    fn rejects_missing_not_null_without_default_on_insert() {
        let table = table_with(vec![text_col("title", false, false)], vec!["id"]);
        let body = serde_json::Map::new();
        assert!(validate_and_coerce(&body, &table, &WriteKind::Insert).is_err());
    }

    #[test]
    fn allows_missing_not_null_when_default_exists() {
        let table = table_with(vec![text_col("title", false, true)], vec!["id"]);
        let body = serde_json::Map::new();
        assert!(validate_and_coerce(&body, &table, &WriteKind::Insert).is_ok());
    }

    #[test]
    fn coercion_failure_surfaces_as_error() {
        let mut col = text_col("count", false, false);
        col.column_type = ColumnType::Integer;
        col.has_default = true;
        let table = table_with(vec![col], vec!["id"]);
        let mut body = serde_json::Map::new();
        body.insert("count".to_string(), json!("not-a-number"));
        assert!(validate_and_coerce(&body, &table, &WriteKind::Insert).is_err());
    }
}
