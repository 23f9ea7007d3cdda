//! Catalog reflection and the immutable schema-cache snapshot it feeds.
//!
//! [`SchemaHandle`] is the crate's single public entry point: bootstrap it
//! once against a pool, hand clones to every request handler, and call
//! `invalidate()` whenever a migration or admin action changes the catalog.

mod cache;
mod reflect;
pub mod types;

pub use cache::SchemaHandle;
pub use reflect::reflect;
pub use types::{
    ColumnDef, ColumnType, ForeignKeyDef, FunctionDef, FunctionParamDef, IndexDef,
    RelationshipDef, RelationshipKind, SchemaCache, TableDef,
};
