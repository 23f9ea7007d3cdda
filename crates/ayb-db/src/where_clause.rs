//! Filter AST compiled from the `filter` query-string grammar (§4.4.2).
//!
//! This tree is the one place a request's filter expression lives before
//! it's handed to [`crate::where_generator::PostgresWhereGenerator`] — no
//! code path ever formats a filter value directly into SQL text.

use crate::value::BoundValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhereOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    /// `tsvector @@ websearch_to_tsquery('english', $n)` (§4.4.8).
    TextSearch,
}

impl WhereOperator {
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "eq" => Some(Self::Eq),
            "neq" => Some(Self::Neq),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "like" => Some(Self::Like),
            "ilike" => Some(Self::ILike),
            "in" => Some(Self::In),
            "nin" => Some(Self::NotIn),
            "isnull" => Some(Self::IsNull),
            "isnotnull" => Some(Self::IsNotNull),
            _ => None,
        }
    }

    #[must_use]
    pub const fn sql_symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::ILike => "ILIKE",
            Self::In => "= ANY",
            Self::NotIn => "<> ALL",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
            Self::TextSearch => "@@",
        }
    }

    /// Whether this operator consumes a bound value at all (`isnull`/
    /// `isnotnull` are nullary).
    #[must_use]
    pub const fn is_unary(self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

/// A single `column op value` condition, or an array operand for `in`/`nin`.
#[derive(Debug, Clone)]
pub enum Condition {
    Scalar {
        column: String,
        operator: WhereOperator,
        value: BoundValue,
    },
    Array {
        column: String,
        operator: WhereOperator,
        values: Vec<BoundValue>,
    },
    Unary {
        column: String,
        operator: WhereOperator,
    },
}

/// A boolean tree of conditions. Leaves are implicitly AND-ed together by
/// the grammar (§4.4.2 does not expose OR at the query-string level), so
/// `Or` exists for completeness and for programmatic callers such as the
/// full-text ILIKE fallback, which needs to OR several columns together.
#[derive(Debug, Clone)]
pub enum WhereClause {
    Condition(Condition),
    And(Vec<WhereClause>),
    Or(Vec<WhereClause>),
}

impl WhereClause {
    #[must_use]
    pub fn and(clauses: Vec<WhereClause>) -> Self {
        Self::And(clauses)
    }

    #[must_use]
    pub fn or(clauses: Vec<WhereClause>) -> Self {
        Self::Or(clauses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_suffix_round_trips_known_names() {
        assert_eq!(WhereOperator::from_suffix("gte"), Some(WhereOperator::Gte));
        assert_eq!(WhereOperator::from_suffix("bogus"), None);
    }

    #[test]
    fn unary_operators_are_isnull_family_only() {
        assert!(WhereOperator::IsNull.is_unary());
        assert!(WhereOperator::IsNotNull.is_unary());
        assert!(!WhereOperator::Eq.is_unary());
    }

    #[test]
    fn text_search_symbol_is_the_match_operator() {
        assert_eq!(WhereOperator::TextSearch.sql_symbol(), "@@");
    }
}
