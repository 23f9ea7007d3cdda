//! Full-text search convention (§4.4.8, open question (a)): when a table
//! has a `search_vector tsvector` column backed by a GIN index, `search`
//! compiles to a `websearch_to_tsquery` match via [`WhereOperator::TextSearch`];
//! otherwise it silently degrades to an OR of `ILIKE` across declared text
//! columns. The degradation stays silent to the caller (matches prior
//! behavior) but is made observable by logging at debug level every time
//! it happens.

use ayb_db::{BoundValue, Condition, WhereClause, WhereOperator};
use ayb_schema::TableDef;

#[must_use]
pub fn compile_search(table: &TableDef, term: &str) -> Option<WhereClause> {
    if let Some(search_col) = &table.search_vector_column {
        tracing::debug!(table = %table.name, "search using tsvector column {search_col}");
        return Some(WhereClause::Condition(Condition::Scalar {
            column: search_col.clone(),
            operator: WhereOperator::TextSearch,
            value: BoundValue::Text(term.to_string()),
        }));
    }

    let text_columns = table.text_columns();
    if text_columns.is_empty() {
        return None;
    }

    tracing::debug!(
        table = %table.name,
        "no tsvector column configured, degrading search to ILIKE across {} text columns",
        text_columns.len()
    );

    let pattern = format!("%{term}%");
    Some(WhereClause::or(
        text_columns
            .into_iter()
            .map(|col| {
                WhereClause::Condition(Condition::Scalar {
                    column: col.to_string(),
                    operator: WhereOperator::ILike,
                    value: BoundValue::Text(pattern.clone()),
                })
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ayb_schema::{ColumnDef, ColumnType};

    fn table_without_tsvector() -> TableDef {
        TableDef {
            schema: "public".to_string(),
            name: "posts".to_string(),
            is_materialized_view: false,
            columns: vec![ColumnDef {
                name: "title".to_string(),
                column_type: ColumnType::Text,
                udt_name: "text".to_string(),
                nullable: false,
                has_default: false,
                is_generated: false,
                enum_values: None,
            }],
            primary_key: vec!["id".to_string()],
            foreign_keys: vec![],
            relationships: vec![],
            indexes: vec![],
            search_vector_column: None,
        }
    }

    #[test]
    fn degrades_to_ilike_when_no_tsvector_column() {
        let table = table_without_tsvector();
        let clause = compile_search(&table, "hello").unwrap();
        assert!(matches!(clause, WhereClause::Or(_)));
    }

    #[test]
    fn uses_text_search_operator_when_tsvector_column_present() {
        let mut table = table_without_tsvector();
        table.search_vector_column = Some("search_vector".to_string());
        let clause = compile_search(&table, "hello").unwrap();
        let WhereClause::Condition(Condition::Scalar { operator, .. }) = clause else {
            panic!("expected a scalar condition");
        };
        assert_eq!(operator, WhereOperator::TextSearch);
    }

    #[test]
    fn returns_none_when_no_text_columns_at_all() {
        let mut table = table_without_tsvector();
        table.columns.clear();
        assert!(compile_search(&table, "hello").is_none());
    }
}
