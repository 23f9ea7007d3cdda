//! Parses the `filter`/`sort`/`page`/`perPage`/`fields`/`expand`/`search`
//! query-string grammar (§4.4.2) into a typed [`ParsedQuery`], validating
//! every column name against the schema cache before any SQL is built.

use ayb_db::{BoundValue, Condition, Pagination, SortTerm, WhereClause, WhereOperator};
use ayb_error::{ApiError, ApiResult};
use ayb_schema::TableDef;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ParsedQuery {
    pub filter: Option<WhereClause>,
    pub sort: Vec<SortTerm>,
    pub pagination: Pagination,
    pub fields: Option<Vec<String>>,
    pub expand: Vec<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawQueryParams {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub fields: Option<String>,
    pub expand: Option<String>,
    pub search: Option<String>,
}

/// Parses `raw`, checking every referenced column against `table`. Unknown
/// columns anywhere in the grammar are rejected with `400` (§4.4.2).
pub fn parse(raw: &RawQueryParams, table: &TableDef) -> ApiResult<ParsedQuery> {
    let filter = raw
        .filter
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| parse_filter(s, table))
        .transpose()?;

    let sort = raw
        .sort
        .as_deref()
        .unwrap_or("")
        .split(',')
        .filter_map(SortTerm::parse)
        .map(|term| {
            if table.column(&term.column).is_none() {
                return Err(ApiError::invalid_request(format!("unknown sort column: {}", term.column)));
            }
            Ok(term)
        })
        .collect::<ApiResult<Vec<_>>>()?;

    let fields = raw.fields.as_deref().map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
    });
    if let Some(fields) = &fields {
        for f in fields {
            if table.column(f).is_none() {
                return Err(ApiError::invalid_request(format!("unknown projection column: {f}")));
            }
        }
    }

    let expand = raw
        .expand
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    for field in &expand {
        if table.relationship(field).is_none() {
            return Err(ApiError::invalid_request(format!("unknown expand relationship: {field}")));
        }
    }

    if let Some(per_page) = raw.per_page {
        if per_page == 0 {
            return Err(ApiError::invalid_request("perPage must be at least 1"));
        }
    }
    if let Some(page) = raw.page {
        if page == 0 {
            return Err(ApiError::invalid_request("page must be at least 1"));
        }
    }

    Ok(ParsedQuery {
        filter,
        sort,
        pagination: Pagination::clamp(raw.page, raw.per_page),
        fields,
        expand,
        search: raw.search.clone().filter(|s| !s.is_empty()),
    })
}

/// A minimal but real recursive-descent parser for the filter grammar:
/// `col<op>value` terms joined by `AND`/`OR`, with parenthesized grouping.
/// Operators: `=`, `!=`, `>`, `>=`, `<`, `<=`, `LIKE`, `IN (...)`.
fn parse_filter(input: &str, table: &TableDef) -> ApiResult<WhereClause> {
    let tokens = tokenize(input)?;
    let mut pos = 0;
    let clause = parse_or(&tokens, &mut pos, table)?;
    if pos != tokens.len() {
        return Err(ApiError::invalid_request("unexpected trailing tokens in filter"));
    }
    Ok(clause)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Op(String),
    LParen,
    RParen,
    And,
    Or,
    Literal(String),
}

fn tokenize(input: &str) -> ApiResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else if c == '\'' {
            let start = i + 1;
            let mut j = start;
            while j < chars.len() && chars[j] != '\'' {
                j += 1;
            }
            if j >= chars.len() {
                return Err(ApiError::invalid_request("unterminated string literal in filter"));
            }
            tokens.push(Token::Literal(chars[start..j].iter().collect()));
            i = j + 1;
        } else if "=!<>".contains(c) {
            let mut j = i + 1;
            if j < chars.len() && chars[j] == '=' {
                j += 1;
            }
            tokens.push(Token::Op(chars[i..j].iter().collect()));
            i = j;
        } else {
            let start = i;
            while i < chars.len() && !chars[i].is_whitespace() && !"()'=!<>".contains(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match word.to_ascii_uppercase().as_str() {
                "AND" => tokens.push(Token::And),
                "OR" => tokens.push(Token::Or),
                "LIKE" => tokens.push(Token::Op("LIKE".to_string())),
                "IN" => tokens.push(Token::Op("IN".to_string())),
                _ if !word.is_empty() => tokens.push(Token::Ident(word)),
                _ => {}
            }
        }
    }
    Ok(tokens)
}

fn parse_or(tokens: &[Token], pos: &mut usize, table: &TableDef) -> ApiResult<WhereClause> {
    let mut parts = vec![parse_and(tokens, pos, table)?];
    while matches!(tokens.get(*pos), Some(Token::Or)) {
        *pos += 1;
        parts.push(parse_and(tokens, pos, table)?);
    }
    Ok(if parts.len() == 1 {
        parts.remove(0)
    } else {
        WhereClause::or(parts)
    })
}

fn parse_and(tokens: &[Token], pos: &mut usize, table: &TableDef) -> ApiResult<WhereClause> {
    let mut parts = vec![parse_primary(tokens, pos, table)?];
    while matches!(tokens.get(*pos), Some(Token::And)) {
        *pos += 1;
        parts.push(parse_primary(tokens, pos, table)?);
    }
    Ok(if parts.len() == 1 {
        parts.remove(0)
    } else {
        WhereClause::and(parts)
    })
}

fn parse_primary(tokens: &[Token], pos: &mut usize, table: &TableDef) -> ApiResult<WhereClause> {
    if matches!(tokens.get(*pos), Some(Token::LParen)) {
        *pos += 1;
        let inner = parse_or(tokens, pos, table)?;
        if !matches!(tokens.get(*pos), Some(Token::RParen)) {
            return Err(ApiError::invalid_request("unbalanced parentheses in filter"));
        }
        *pos += 1;
        return Ok(inner);
    }

    let Some(Token::Ident(column)) = tokens.get(*pos) else {
        return Err(ApiError::invalid_request("expected a column name in filter"));
    };
    let column = column.clone();
    *pos += 1;

    let col_def = table
        .column(&column)
        .ok_or_else(|| ApiError::invalid_request(format!("unknown filter column: {column}")))?;

    let Some(Token::Op(op_str)) = tokens.get(*pos) else {
        return Err(ApiError::invalid_request("expected an operator in filter"));
    };
    let op_str = op_str.clone();
    *pos += 1;

    if op_str == "IN" {
        if !matches!(tokens.get(*pos), Some(Token::LParen)) {
            return Err(ApiError::invalid_request("expected '(' after IN"));
        }
        *pos += 1;
        let mut values = Vec::new();
        loop {
            match tokens.get(*pos) {
                Some(Token::Literal(lit)) => {
                    values.push(BoundValue::coerce(&JsonValue::String(lit.clone()), col_def.column_type)?);
                    *pos += 1;
                }
                _ => return Err(ApiError::invalid_request("expected a literal inside IN (...)")),
            }
            match tokens.get(*pos) {
                Some(Token::RParen) => {
                    *pos += 1;
                    break;
                }
                Some(Token::Ident(comma)) if comma == "," => {
                    *pos += 1;
                }
                _ => return Err(ApiError::invalid_request("expected ',' or ')' inside IN (...)")),
            }
        }
        return Ok(WhereClause::Condition(Condition::Array {
            column,
            operator: WhereOperator::In,
            values,
        }));
    }

    let operator = match op_str.as_str() {
        "=" => WhereOperator::Eq,
        "!=" => WhereOperator::Neq,
        ">" => WhereOperator::Gt,
        ">=" => WhereOperator::Gte,
        "<" => WhereOperator::Lt,
        "<=" => WhereOperator::Lte,
        "LIKE" => WhereOperator::Like,
        other => return Err(ApiError::invalid_request(format!("unknown filter operator: {other}"))),
    };

    let Some(Token::Literal(lit)) = tokens.get(*pos) else {
        return Err(ApiError::invalid_request("expected a literal after the operator"));
    };
    let value = BoundValue::coerce(&JsonValue::String(lit.clone()), col_def.column_type)?;
    *pos += 1;

    Ok(WhereClause::Condition(Condition::Scalar {
        column,
        operator,
        value,
    }))
}

pub type FieldMap = HashMap<String, JsonValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use ayb_schema::{ColumnDef, ColumnType};

    fn posts_table() -> TableDef {
        TableDef {
            schema: "public".to_string(),
            name: "posts".to_string(),
            is_materialized_view: false,
            columns: vec![
                ColumnDef {
                    name: "status".to_string(),
                    column_type: ColumnType::Text,
                    udt_name: "text".to_string(),
                    nullable: false,
                    has_default: false,
                    is_generated: false,
                    enum_values: None,
                },
                ColumnDef {
                    name: "title".to_string(),
                    column_type: ColumnType::Text,
                    udt_name: "text".to_string(),
                    nullable: false,
                    has_default: false,
                    is_generated: false,
                    enum_values: None,
                },
            ],
            primary_key: vec!["id".to_string()],
            foreign_keys: vec![],
            relationships: vec![],
            indexes: vec![],
            search_vector_column: None,
        }
    }

    #[test]
    fn parses_simple_equality_filter() {
        let table = posts_table();
        let clause = parse_filter("status = 'active'", &table).unwrap();
        assert!(matches!(clause, WhereClause::Condition(_)));
    }

    #[test]
    fn parses_and_of_two_conditions() {
        let table = posts_table();
        let clause = parse_filter("status = 'active' AND title = 'x'", &table).unwrap();
        assert!(matches!(clause, WhereClause::And(parts) if parts.len() == 2));
    }

    #[test]
    fn rejects_unknown_column() {
        let table = posts_table();
        assert!(parse_filter("bogus = 'x'", &table).is_err());
    }

    #[test]
    fn parses_in_list() {
        let table = posts_table();
        let clause = parse_filter("status IN ('active', 'pending')", &table).unwrap();
        assert!(matches!(clause, WhereClause::Condition(Condition::Array { .. })));
    }

    #[test]
    fn per_page_zero_is_rejected() {
        let table = posts_table();
        let raw = RawQueryParams {
            per_page: Some(0),
            ..Default::default()
        };
        assert!(parse(&raw, &table).is_err());
    }

    #[test]
    fn page_zero_is_rejected() {
        let table = posts_table();
        let raw = RawQueryParams {
            page: Some(0),
            ..Default::default()
        };
        assert!(parse(&raw, &table).is_err());
    }

    #[test]
    fn unknown_sort_column_is_rejected() {
        let table = posts_table();
        let raw = RawQueryParams {
            sort: Some("bogus".to_string()),
            ..Default::default()
        };
        assert!(parse(&raw, &table).is_err());
    }
}
