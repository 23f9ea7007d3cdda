//! Compiles the `sort` query parameter into an `ORDER BY` clause with a
//! stable primary-key tie-break appended (§4.4.3 — pagination must be
//! deterministic across pages even when the sort key has duplicates).

use crate::identifier::quote_ident;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct SortTerm {
    pub column: String,
    pub direction: SortDirection,
}

impl SortTerm {
    /// Parses one comma-separated term: a bare column name (`created_at`)
    /// sorts ascending; a `-` prefix (`-created_at`) sorts descending.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(column) = raw.strip_prefix('-') {
            Some(Self {
                column: column.to_string(),
                direction: SortDirection::Desc,
            })
        } else {
            Some(Self {
                column: raw.to_string(),
                direction: SortDirection::Asc,
            })
        }
    }
}

/// Renders `terms` plus a tie-break on `primary_key` into `ORDER BY ...`.
/// `terms` that already name a primary-key column are not duplicated.
#[must_use]
pub fn render_order_by(terms: &[SortTerm], primary_key: &[String]) -> String {
    let mut pieces: Vec<String> = terms
        .iter()
        .map(|t| {
            let dir = match t.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!("{} {}", quote_ident(&t.column), dir)
        })
        .collect();

    for pk_col in primary_key {
        if !terms.iter().any(|t| &t.column == pk_col) {
            pieces.push(format!("{} ASC", quote_ident(pk_col)));
        }
    }

    pieces.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ascending_bare_column() {
        let term = SortTerm::parse("created_at").unwrap();
        assert_eq!(term.column, "created_at");
        assert_eq!(term.direction, SortDirection::Asc);
    }

    #[test]
    fn parses_descending_dash_prefix() {
        let term = SortTerm::parse("-created_at").unwrap();
        assert_eq!(term.direction, SortDirection::Desc);
    }

    #[test]
    fn appends_primary_key_tie_break() {
        let terms = vec![SortTerm::parse("-created_at").unwrap()];
        let sql = render_order_by(&terms, &["id".to_string()]);
        assert_eq!(sql, "\"created_at\" DESC, \"id\" ASC");
    }

    #[test]
    fn does_not_duplicate_tie_break_already_sorted_on() {
        let terms = vec![SortTerm::parse("id").unwrap()];
        let sql = render_order_by(&terms, &["id".to_string()]);
        assert_eq!(sql, "\"id\" ASC");
    }
}
