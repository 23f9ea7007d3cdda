//! Compiles a [`WhereClause`] tree into parameterized SQL.
//!
//! The parameter counter is a `Cell` rather than `&mut self` so the generator
//! can be threaded through recursive tree-walks without fighting the
//! borrow checker over a mutable reference at every branch.

use crate::identifier::quote_ident;
use crate::value::BoundValue;
use crate::where_clause::{Condition, WhereClause, WhereOperator};
use std::cell::Cell;

/// Generates a Postgres `WHERE` fragment and the parameter list it binds
/// against, numbering placeholders from `starting_at` so callers can splice
/// the fragment into a statement that already has earlier `$n` parameters
/// (e.g. the RLS principal id bound ahead of the filter).
pub struct PostgresWhereGenerator {
    next_param: Cell<usize>,
    params: std::cell::RefCell<Vec<BoundValue>>,
}

impl PostgresWhereGenerator {
    #[must_use]
    pub fn new(starting_at: usize) -> Self {
        Self {
            next_param: Cell::new(starting_at),
            params: std::cell::RefCell::new(Vec::new()),
        }
    }

    /// Returns the `WHERE ...` SQL fragment (without the `WHERE` keyword)
    /// and consumes `self` to hand back the accumulated bind parameters in
    /// `$n` order.
    #[must_use]
    pub fn generate(self, clause: &WhereClause) -> (String, Vec<BoundValue>) {
        let sql = self.walk(clause);
        (sql, self.params.into_inner())
    }

    fn walk(&self, clause: &WhereClause) -> String {
        match clause {
            WhereClause::Condition(cond) => self.condition(cond),
            WhereClause::And(parts) => self.join(parts, "AND"),
            WhereClause::Or(parts) => self.join(parts, "OR"),
        }
    }

    fn join(&self, parts: &[WhereClause], sep: &str) -> String {
        if parts.is_empty() {
            return "TRUE".to_string();
        }
        let rendered: Vec<String> = parts.iter().map(|p| format!("({})", self.walk(p))).collect();
        rendered.join(&format!(" {sep} "))
    }

    fn condition(&self, cond: &Condition) -> String {
        match cond {
            Condition::Unary { column, operator } => {
                format!("{} {}", quote_ident(column), operator.sql_symbol())
            }
            Condition::Scalar {
                column,
                operator,
                value,
            } => {
                let placeholder = self.bind(value.clone());
                if matches!(operator, WhereOperator::TextSearch) {
                    return format!(
                        "{} @@ websearch_to_tsquery('english', {placeholder})",
                        quote_ident(column)
                    );
                }
                format!("{} {} {}", quote_ident(column), operator.sql_symbol(), placeholder)
            }
            Condition::Array {
                column,
                operator,
                values,
            } => {
                let placeholder = self.bind(BoundValue::array_of(values.clone()));
                match operator {
                    WhereOperator::In => {
                        format!("{} {}({})", quote_ident(column), operator.sql_symbol(), placeholder)
                    }
                    WhereOperator::NotIn => {
                        format!("{} {}({})", quote_ident(column), operator.sql_symbol(), placeholder)
                    }
                    _ => unreachable!("array conditions are only constructed for in/nin"),
                }
            }
        }
    }

    fn bind(&self, value: BoundValue) -> String {
        let n = self.next_param.get();
        self.next_param.set(n + 1);
        self.params.borrow_mut().push(value);
        format!("${n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(column: &str, value: BoundValue) -> WhereClause {
        WhereClause::Condition(Condition::Scalar {
            column: column.to_string(),
            operator: WhereOperator::Eq,
            value,
        })
    }

    #[test]
    fn single_condition_uses_dollar_one() {
        let gen = PostgresWhereGenerator::new(1);
        let (sql, params) = gen.generate(&eq("status", BoundValue::Text("active".into())));
        assert_eq!(sql, "\"status\" = $1");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn and_wraps_each_branch_in_parens() {
        let gen = PostgresWhereGenerator::new(1);
        let clause = WhereClause::and(vec![
            eq("status", BoundValue::Text("active".into())),
            eq("author_id", BoundValue::Integer(7)),
        ]);
        let (sql, params) = gen.generate(&clause);
        assert_eq!(sql, "(\"status\" = $1) AND (\"author_id\" = $2)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn starting_offset_is_respected_for_splicing_after_rls_params() {
        let gen = PostgresWhereGenerator::new(2);
        let (sql, _) = gen.generate(&eq("status", BoundValue::Text("active".into())));
        assert_eq!(sql, "\"status\" = $2");
    }

    #[test]
    fn unary_isnull_has_no_placeholder() {
        let gen = PostgresWhereGenerator::new(1);
        let clause = WhereClause::Condition(Condition::Unary {
            column: "deleted_at".to_string(),
            operator: WhereOperator::IsNull,
        });
        let (sql, params) = gen.generate(&clause);
        assert_eq!(sql, "\"deleted_at\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn empty_and_collapses_to_true() {
        let gen = PostgresWhereGenerator::new(1);
        let (sql, params) = gen.generate(&WhereClause::and(vec![]));
        assert_eq!(sql, "TRUE");
        assert!(params.is_empty());
    }

    #[test]
    fn in_condition_on_integer_column_binds_integer_array_not_text() {
        let gen = PostgresWhereGenerator::new(1);
        let clause = WhereClause::Condition(Condition::Array {
            column: "author_id".to_string(),
            operator: WhereOperator::In,
            values: vec![BoundValue::Integer(1), BoundValue::Integer(2)],
        });
        let (sql, params) = gen.generate(&clause);
        assert_eq!(sql, "\"author_id\" = ANY($1)");
        assert!(matches!(params.as_slice(), [BoundValue::IntegerArray(items)] if items == &[1, 2]));
    }

    #[test]
    fn nin_condition_on_text_column_still_binds_text_array() {
        let gen = PostgresWhereGenerator::new(1);
        let clause = WhereClause::Condition(Condition::Array {
            column: "status".to_string(),
            operator: WhereOperator::NotIn,
            values: vec![BoundValue::Text("archived".into()), BoundValue::Text("deleted".into())],
        });
        let (sql, params) = gen.generate(&clause);
        assert_eq!(sql, "\"status\" <> ALL($1)");
        assert!(matches!(params.as_slice(), [BoundValue::TextArray(items)] if items == &["archived".to_string(), "deleted".to_string()]));
    }

    #[test]
    fn text_search_renders_websearch_to_tsquery() {
        let gen = PostgresWhereGenerator::new(1);
        let clause = WhereClause::Condition(Condition::Scalar {
            column: "search_vector".to_string(),
            operator: WhereOperator::TextSearch,
            value: BoundValue::Text("rust async".into()),
        });
        let (sql, params) = gen.generate(&clause);
        assert_eq!(sql, "\"search_vector\" @@ websearch_to_tsquery('english', $1)");
        assert_eq!(params.len(), 1);
    }
}
