//! Catalog reflection: turns a live Postgres connection into a [`SchemaCache`].

use crate::types::{
    ColumnDef, ColumnType, ForeignKeyDef, FunctionDef, FunctionParamDef, IndexDef,
    RelationshipDef, RelationshipKind, SchemaCache, TableDef,
};
use ayb_error::{ApiError, ApiResult};
use sqlx::PgPool;
use std::collections::HashMap;

/// Reflect the full catalog visible to `pool` into a fresh [`SchemaCache`].
///
/// Mirrors the teacher's `PostgresIntrospector` query shapes (information_schema
/// for columns, pg_catalog joins for indexes/FKs), generalized from
/// single-table lookups to a whole-catalog rebuild.
pub async fn reflect(pool: &PgPool) -> ApiResult<SchemaCache> {
    let schemas = reflect_schemas(pool).await?;
    let mut tables = HashMap::new();

    let table_rows: Vec<(String, String, bool)> = sqlx::query_as(
        r"
        SELECT n.nspname AS schema, c.relname AS name, c.relkind = 'm' AS is_matview
        FROM pg_class c
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE c.relkind IN ('r', 'm')
          AND n.nspname NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
          AND n.nspname NOT LIKE 'pg_temp%'
        ORDER BY n.nspname, c.relname
        ",
    )
    .fetch_all(pool)
    .await
    .map_err(ApiError::from)?;

    for (schema, name, is_matview) in table_rows {
        let columns = reflect_columns(pool, &schema, &name).await?;
        let primary_key = reflect_primary_key(pool, &schema, &name).await?;
        let foreign_keys = reflect_foreign_keys(pool, &schema, &name).await?;
        let indexes = reflect_indexes(pool, &schema, &name).await?;
        let search_vector_column = columns
            .iter()
            .find(|c| c.udt_name == "tsvector")
            .map(|c| c.name.clone())
            .filter(|col| {
                indexes
                    .iter()
                    .any(|idx| idx.is_gin && idx.columns.iter().any(|c| c == col))
            });

        let relationships = foreign_keys
            .iter()
            .map(|fk| RelationshipDef {
                name: relationship_name_for(&fk.column),
                kind: RelationshipKind::ManyToOne,
                local_column: fk.column.clone(),
                referenced_schema: fk.referenced_schema.clone(),
                referenced_table: fk.referenced_table.clone(),
                referenced_column: fk.referenced_column.clone(),
            })
            .collect();

        tables.insert(
            format!("{schema}.{name}"),
            TableDef {
                schema,
                name,
                is_materialized_view: is_matview,
                columns,
                primary_key,
                foreign_keys,
                relationships,
                indexes,
                search_vector_column,
            },
        );
    }

    // Second pass: derive the reverse (one-to-many) relationship on the
    // referenced table so `expand` can be extended to reverse lookups later
    // without another reflection pass (§4.4.4 scopes `expand` to many-to-one
    // only; the reverse edge is recorded for completeness and is not
    // consumed today).
    let fk_edges: Vec<(String, RelationshipDef)> = tables
        .values()
        .flat_map(|t| {
            t.foreign_keys.iter().map(move |fk| {
                (
                    format!("{}.{}", fk.referenced_schema, fk.referenced_table),
                    RelationshipDef {
                        name: format!("{}_set", t.name),
                        kind: RelationshipKind::OneToMany,
                        local_column: fk.referenced_column.clone(),
                        referenced_schema: t.schema.clone(),
                        referenced_table: t.name.clone(),
                        referenced_column: fk.column.clone(),
                    },
                )
            })
        })
        .collect();
    for (owner_key, rel) in fk_edges {
        if let Some(owner) = tables.get_mut(&owner_key) {
            owner.relationships.push(rel);
        }
    }

    let functions = reflect_functions(pool).await?;

    Ok(SchemaCache {
        tables,
        schemas,
        functions,
        built_at: chrono::Utc::now().timestamp(),
    })
}

fn relationship_name_for(fk_column: &str) -> String {
    fk_column.strip_suffix("_id").unwrap_or(fk_column).to_string()
}

async fn reflect_schemas(pool: &PgPool) -> ApiResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r"
        SELECT nspname FROM pg_namespace
        WHERE nspname NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
          AND nspname NOT LIKE 'pg_temp%'
        ORDER BY nspname
        ",
    )
    .fetch_all(pool)
    .await
    .map_err(ApiError::from)?;
    Ok(rows.into_iter().map(|(s,)| s).collect())
}

async fn reflect_columns(pool: &PgPool, schema: &str, table: &str) -> ApiResult<Vec<ColumnDef>> {
    let rows: Vec<(String, String, bool, bool, bool)> = sqlx::query_as(
        r"
        SELECT
            a.attname AS column_name,
            format_type(a.atttypid, a.atttypmod) AS udt_name,
            NOT a.attnotnull AS nullable,
            a.atthasdef AS has_default,
            a.attgenerated <> '' AS is_generated
        FROM pg_attribute a
        JOIN pg_class c ON c.oid = a.attrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = $1 AND c.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped
        ORDER BY a.attnum
        ",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(ApiError::from)?;

    Ok(rows
        .into_iter()
        .map(|(name, udt_name, nullable, has_default, is_generated)| ColumnDef {
            column_type: ColumnType::from_pg_type(udt_name.split('(').next().unwrap_or(&udt_name)),
            name,
            udt_name,
            nullable,
            has_default,
            is_generated,
            enum_values: None,
        })
        .collect())
}

async fn reflect_primary_key(pool: &PgPool, schema: &str, table: &str) -> ApiResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r"
        SELECT a.attname
        FROM pg_index i
        JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
        JOIN pg_class c ON c.oid = i.indrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE i.indisprimary AND n.nspname = $1 AND c.relname = $2
        ORDER BY array_position(i.indkey, a.attnum)
        ",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(ApiError::from)?;
    Ok(rows.into_iter().map(|(c,)| c).collect())
}

async fn reflect_foreign_keys(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> ApiResult<Vec<ForeignKeyDef>> {
    let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
        r"
        SELECT
            con.conname,
            att.attname AS column_name,
            fn.nspname AS referenced_schema,
            fc.relname AS referenced_table,
            fatt.attname AS referenced_column
        FROM pg_constraint con
        JOIN pg_class c ON c.oid = con.conrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        JOIN pg_class fc ON fc.oid = con.confrelid
        JOIN pg_namespace fn ON fn.oid = fc.relnamespace
        JOIN pg_attribute att ON att.attrelid = con.conrelid AND att.attnum = con.conkey[1]
        JOIN pg_attribute fatt ON fatt.attrelid = con.confrelid AND fatt.attnum = con.confkey[1]
        WHERE con.contype = 'f' AND n.nspname = $1 AND c.relname = $2
        ",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(ApiError::from)?;

    Ok(rows
        .into_iter()
        .map(
            |(constraint_name, column, referenced_schema, referenced_table, referenced_column)| {
                ForeignKeyDef {
                    constraint_name,
                    column,
                    referenced_schema,
                    referenced_table,
                    referenced_column,
                }
            },
        )
        .collect())
}

async fn reflect_indexes(pool: &PgPool, schema: &str, table: &str) -> ApiResult<Vec<IndexDef>> {
    let rows: Vec<(String, Vec<String>, bool, String)> = sqlx::query_as(
        r"
        SELECT
            ic.relname AS index_name,
            array_agg(a.attname ORDER BY array_position(i.indkey, a.attnum)) AS columns,
            i.indisunique,
            am.amname AS index_method
        FROM pg_index i
        JOIN pg_class ic ON ic.oid = i.indexrelid
        JOIN pg_class c ON c.oid = i.indrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        JOIN pg_am am ON am.oid = ic.relam
        JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
        WHERE n.nspname = $1 AND c.relname = $2
        GROUP BY ic.relname, i.indisunique, am.amname
        ",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(ApiError::from)?;

    Ok(rows
        .into_iter()
        .map(|(name, columns, is_unique, method)| IndexDef {
            name,
            columns,
            is_unique,
            is_gin: method == "gin",
        })
        .collect())
}

async fn reflect_functions(pool: &PgPool) -> ApiResult<Vec<FunctionDef>> {
    let rows: Vec<(String, String, String, String)> = sqlx::query_as(
        r"
        SELECT
            n.nspname AS schema,
            p.proname AS name,
            pg_get_function_identity_arguments(p.oid) AS args,
            format_type(p.prorettype, NULL) AS return_type
        FROM pg_proc p
        JOIN pg_namespace n ON n.oid = p.pronamespace
        WHERE n.nspname NOT IN ('pg_catalog', 'information_schema')
        ",
    )
    .fetch_all(pool)
    .await
    .map_err(ApiError::from)?;

    Ok(rows
        .into_iter()
        .map(|(schema, name, args, return_type)| FunctionDef {
            schema,
            name,
            params: parse_function_args(&args),
            return_type,
        })
        .collect())
}

fn parse_function_args(args: &str) -> Vec<FunctionParamDef> {
    if args.trim().is_empty() {
        return Vec::new();
    }
    args.split(',')
        .filter_map(|raw| {
            let raw = raw.trim();
            let mut parts = raw.splitn(2, ' ');
            let name = parts.next()?.to_string();
            let param_type = parts.next().unwrap_or("").to_string();
            Some(FunctionParamDef { name, param_type })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_name_strips_id_suffix() {
        assert_eq!(relationship_name_for("author_id"), "author");
        assert_eq!(relationship_name_for("owner"), "owner");
    }

    #[test]
    fn parse_function_args_handles_empty() {
        assert!(parse_function_args("").is_empty());
        assert!(parse_function_args("  ").is_empty());
    }

    #[test]
    fn parse_function_args_splits_name_and_type() {
        let parsed = parse_function_args("user_id uuid, active boolean");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "user_id");
        assert_eq!(parsed[0].param_type, "uuid");
        assert_eq!(parsed[1].name, "active");
        assert_eq!(parsed[1].param_type, "boolean");
    }
}
