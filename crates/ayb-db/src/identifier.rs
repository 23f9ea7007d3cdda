//! Safe quoting for identifiers that must be interpolated into SQL text
//! (table/column/schema names can never be bind parameters in Postgres DDL
//! or in dynamic `ORDER BY`/`SELECT` column lists).

/// Double-quotes `ident`, escaping embedded quotes. Callers are expected to
/// have already validated `ident` against the schema cache — this function's
/// job is purely to make the quoting correct, not to authorize the name.
#[must_use]
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quotes a `schema.table` pair as `"schema"."table"`.
#[must_use]
pub fn quote_qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_plain_identifier() {
        assert_eq!(quote_ident("posts"), "\"posts\"");
    }

    #[test]
    fn escapes_embedded_quote() {
        assert_eq!(quote_ident("weird\"name"), "\"weird\"\"name\"");
    }

    #[test]
    fn qualifies_schema_and_table() {
        assert_eq!(quote_qualified("public", "posts"), "\"public\".\"posts\"");
    }
}
