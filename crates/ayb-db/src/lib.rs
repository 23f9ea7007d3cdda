//! Connection pooling, the RLS session-GUC bridge, and parameterized SQL
//! generation shared by every subsystem that touches Postgres directly.

pub mod identifier;
pub mod pagination;
pub mod pool;
pub mod sort;
pub mod value;
pub mod where_clause;
pub mod where_generator;

pub use identifier::{quote_ident, quote_qualified};
pub use pagination::Pagination;
pub use pool::{build_pool, build_pool_from_url, with_request_conn, RlsContext};
pub use sort::{render_order_by, SortDirection, SortTerm};
pub use value::BoundValue;
pub use where_clause::{Condition, WhereClause, WhereOperator};
pub use where_generator::PostgresWhereGenerator;
