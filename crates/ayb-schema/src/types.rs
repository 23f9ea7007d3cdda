//! Rust-owned representation of a reflected catalog.
//!
//! Everything under this module is produced once per rebuild tick and never
//! mutated afterward — readers hold an `Arc` to a point-in-time snapshot.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A column's declared SQL type, coarsened to what the collections pipeline
/// needs to coerce JSON scalars (§4.4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Integer,
    BigInt,
    Numeric,
    Boolean,
    Uuid,
    Timestamp,
    TimestampTz,
    Date,
    Json,
    Jsonb,
    Enum,
    TextArray,
    Unknown,
}

impl ColumnType {
    #[must_use]
    pub fn from_pg_type(udt_name: &str) -> Self {
        match udt_name {
            "text" | "varchar" | "bpchar" | "citext" => Self::Text,
            "int2" | "int4" | "serial" => Self::Integer,
            "int8" | "bigserial" => Self::BigInt,
            "numeric" | "float4" | "float8" => Self::Numeric,
            "bool" => Self::Boolean,
            "uuid" => Self::Uuid,
            "timestamp" => Self::Timestamp,
            "timestamptz" => Self::TimestampTz,
            "date" => Self::Date,
            "json" => Self::Json,
            "jsonb" => Self::Jsonb,
            "_text" => Self::TextArray,
            other if other.starts_with('_') => Self::Unknown,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub udt_name: String,
    pub nullable: bool,
    pub has_default: bool,
    pub is_generated: bool,
    pub enum_values: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    pub constraint_name: String,
    pub column: String,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// Direction of a relationship as seen from `TableDef::relationships`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipKind {
    /// This table holds the foreign key (the only kind `expand` may follow).
    ManyToOne,
    /// The referenced table holds the foreign key back to this one.
    OneToMany,
    /// Derived from two many-to-one FKs meeting at a join table.
    ManyToMany,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipDef {
    pub name: String,
    pub kind: RelationshipKind,
    pub local_column: String,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub is_gin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    pub schema: String,
    pub name: String,
    pub is_materialized_view: bool,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDef>,
    pub relationships: Vec<RelationshipDef>,
    pub indexes: Vec<IndexDef>,
    /// Present when a `search_vector tsvector` column + GIN index convention
    /// is detected (§4.4.8).
    pub search_vector_column: Option<String>,
}

impl TableDef {
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn relationship(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships.iter().find(|r| r.name == name)
    }

    #[must_use]
    pub fn text_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| matches!(c.column_type, ColumnType::Text))
            .map(|c| c.name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionParamDef {
    pub name: String,
    pub param_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub schema: String,
    pub name: String,
    pub params: Vec<FunctionParamDef>,
    pub return_type: String,
}

/// A single point-in-time view of the catalog. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchemaCache {
    pub tables: HashMap<String, TableDef>,
    pub schemas: Vec<String>,
    pub functions: Vec<FunctionDef>,
    pub built_at: i64,
}

impl SchemaCache {
    #[must_use]
    pub fn table(&self, schema: &str, name: &str) -> Option<&TableDef> {
        self.tables.get(&format!("{schema}.{name}"))
    }

    /// Convenience lookup assuming the `public` schema, which is how the
    /// collections pipeline addresses tables by bare name.
    #[must_use]
    pub fn public_table(&self, name: &str) -> Option<&TableDef> {
        self.table("public", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_type_maps_known_udt_names() {
        assert_eq!(ColumnType::from_pg_type("uuid"), ColumnType::Uuid);
        assert_eq!(ColumnType::from_pg_type("timestamptz"), ColumnType::TimestampTz);
        assert_eq!(ColumnType::from_pg_type("bogus"), ColumnType::Unknown);
    }

    #[test]
    fn public_table_looks_up_under_public_schema() {
        let mut cache = SchemaCache::default();
        cache.tables.insert(
            "public.posts".to_string(),
            TableDef {
                schema: "public".to_string(),
                name: "posts".to_string(),
                is_materialized_view: false,
                columns: vec![],
                primary_key: vec!["id".to_string()],
                foreign_keys: vec![],
                relationships: vec![],
                indexes: vec![],
                search_vector_column: None,
            },
        );
        assert!(cache.public_table("posts").is_some());
        assert!(cache.public_table("missing").is_none());
    }
}
