//! A coerced bind value, used anywhere a JSON scalar from a request body or
//! query string needs to become a single `tokio_postgres` parameter.
//!
//! Collapsing the JSON dynamic type down to this closed set lets the SQL
//! generators bind parameters without boxing a `dyn ToSql` per call site.

use ayb_error::ApiError;
use ayb_schema::ColumnType;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use tokio_postgres::types::{IsNull, ToSql, Type};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum BoundValue {
    Text(String),
    Integer(i64),
    Numeric(f64),
    Boolean(bool),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Json(JsonValue),
    /// A `text[]` column's own value, or the text fallback for an `in`/`nin`
    /// filter whose elements don't share one of the typed array variants
    /// below.
    TextArray(Vec<String>),
    IntegerArray(Vec<i64>),
    NumericArray(Vec<f64>),
    BooleanArray(Vec<bool>),
    UuidArray(Vec<Uuid>),
    TimestampArray(Vec<DateTime<Utc>>),
    DateArray(Vec<NaiveDate>),
    Null,
}

impl BoundValue {
    /// Coerces a JSON scalar from a query string or request body into the
    /// bind value appropriate for `column_type`, per the writer/filter
    /// coercion rules (unparseable values are rejected, not silently
    /// truncated or nulled).
    pub fn coerce(json: &JsonValue, column_type: ColumnType) -> Result<Self, ApiError> {
        if json.is_null() {
            return Ok(Self::Null);
        }
        match column_type {
            ColumnType::Text | ColumnType::Enum => json
                .as_str()
                .map(|s| Self::Text(s.to_string()))
                .ok_or_else(|| ApiError::validation("expected a string value")),
            ColumnType::Integer | ColumnType::BigInt => json
                .as_i64()
                .map(Self::Integer)
                .ok_or_else(|| ApiError::validation("expected an integer value")),
            ColumnType::Numeric => json
                .as_f64()
                .map(Self::Numeric)
                .ok_or_else(|| ApiError::validation("expected a numeric value")),
            ColumnType::Boolean => json
                .as_bool()
                .map(Self::Boolean)
                .ok_or_else(|| ApiError::validation("expected a boolean value")),
            ColumnType::Uuid => json
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(Self::Uuid)
                .ok_or_else(|| ApiError::validation("expected a UUID string")),
            ColumnType::Timestamp | ColumnType::TimestampTz => json
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| Self::Timestamp(dt.with_timezone(&Utc)))
                .ok_or_else(|| ApiError::validation("expected an RFC 3339 timestamp")),
            ColumnType::Date => json
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .map(Self::Date)
                .ok_or_else(|| ApiError::validation("expected a YYYY-MM-DD date")),
            ColumnType::Json | ColumnType::Jsonb => Ok(Self::Json(json.clone())),
            ColumnType::TextArray => json
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .map(Self::TextArray)
                .ok_or_else(|| ApiError::validation("expected an array of strings")),
            ColumnType::Unknown => Ok(Self::Text(json.to_string())),
        }
    }

    /// Groups already-coerced scalars (the elements of an `in`/`nin` filter,
    /// each coerced against the column's real type by the caller) into the
    /// array-typed `BoundValue` matching that element type, so the generated
    /// `= ANY($n)`/`<> ALL($n)` binds a `integer[]`/`uuid[]`/... parameter
    /// instead of always degrading to `text[]` against a non-text column.
    #[must_use]
    pub fn array_of(values: Vec<BoundValue>) -> Self {
        match values.first() {
            Some(Self::Integer(_)) => {
                Self::IntegerArray(values.into_iter().filter_map(|v| match v { Self::Integer(i) => Some(i), _ => None }).collect())
            }
            Some(Self::Numeric(_)) => {
                Self::NumericArray(values.into_iter().filter_map(|v| match v { Self::Numeric(n) => Some(n), _ => None }).collect())
            }
            Some(Self::Boolean(_)) => {
                Self::BooleanArray(values.into_iter().filter_map(|v| match v { Self::Boolean(b) => Some(b), _ => None }).collect())
            }
            Some(Self::Uuid(_)) => {
                Self::UuidArray(values.into_iter().filter_map(|v| match v { Self::Uuid(u) => Some(u), _ => None }).collect())
            }
            Some(Self::Timestamp(_)) => {
                Self::TimestampArray(values.into_iter().filter_map(|v| match v { Self::Timestamp(t) => Some(t), _ => None }).collect())
            }
            Some(Self::Date(_)) => {
                Self::DateArray(values.into_iter().filter_map(|v| match v { Self::Date(d) => Some(d), _ => None }).collect())
            }
            _ => Self::TextArray(values.iter().map(scalar_display).collect()),
        }
    }
}

/// Renders a single already-coerced scalar as the text an array literal's
/// element would show — used only for the `text[]` fallback path of
/// [`BoundValue::array_of`] (text/JSON/unrecognized element types).
fn scalar_display(value: &BoundValue) -> String {
    match value {
        BoundValue::Text(s) => s.clone(),
        BoundValue::Integer(i) => i.to_string(),
        BoundValue::Numeric(f) => f.to_string(),
        BoundValue::Boolean(b) => b.to_string(),
        BoundValue::Uuid(u) => u.to_string(),
        BoundValue::Timestamp(dt) => dt.to_rfc3339(),
        BoundValue::Date(d) => d.to_string(),
        BoundValue::Json(v) => v.to_string(),
        BoundValue::TextArray(items) => items.join(","),
        BoundValue::IntegerArray(items) => items.iter().map(i64::to_string).collect::<Vec<_>>().join(","),
        BoundValue::NumericArray(items) => items.iter().map(f64::to_string).collect::<Vec<_>>().join(","),
        BoundValue::BooleanArray(items) => items.iter().map(bool::to_string).collect::<Vec<_>>().join(","),
        BoundValue::UuidArray(items) => items.iter().map(Uuid::to_string).collect::<Vec<_>>().join(","),
        BoundValue::TimestampArray(items) => items.iter().map(DateTime::to_rfc3339).collect::<Vec<_>>().join(","),
        BoundValue::DateArray(items) => items.iter().map(NaiveDate::to_string).collect::<Vec<_>>().join(","),
        BoundValue::Null => String::new(),
    }
}

impl ToSql for BoundValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Self::Text(v) => v.to_sql(ty, out),
            Self::Integer(v) => v.to_sql(ty, out),
            Self::Numeric(v) => v.to_sql(ty, out),
            Self::Boolean(v) => v.to_sql(ty, out),
            Self::Uuid(v) => v.to_sql(ty, out),
            Self::Timestamp(v) => v.to_sql(ty, out),
            Self::Date(v) => v.to_sql(ty, out),
            Self::Json(v) => v.to_sql(ty, out),
            Self::TextArray(v) => v.to_sql(ty, out),
            Self::IntegerArray(v) => v.to_sql(ty, out),
            Self::NumericArray(v) => v.to_sql(ty, out),
            Self::BooleanArray(v) => v.to_sql(ty, out),
            Self::UuidArray(v) => v.to_sql(ty, out),
            Self::TimestampArray(v) => v.to_sql(ty, out),
            Self::DateArray(v) => v.to_sql(ty, out),
            Self::Null => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_string_to_text() {
        let v = BoundValue::coerce(&json!("hello"), ColumnType::Text).unwrap();
        assert!(matches!(v, BoundValue::Text(s) if s == "hello"));
    }

    #[test]
    fn rejects_wrong_type_for_integer() {
        assert!(BoundValue::coerce(&json!("nope"), ColumnType::Integer).is_err());
    }

    #[test]
    fn null_json_becomes_bound_null_regardless_of_column_type() {
        assert!(matches!(
            BoundValue::coerce(&JsonValue::Null, ColumnType::Uuid).unwrap(),
            BoundValue::Null
        ));
    }

    #[test]
    fn coerces_uuid_string() {
        let id = Uuid::new_v4();
        let v = BoundValue::coerce(&json!(id.to_string()), ColumnType::Uuid).unwrap();
        assert!(matches!(v, BoundValue::Uuid(u) if u == id));
    }

    #[test]
    fn array_of_integers_groups_into_integer_array_not_text() {
        let v = BoundValue::array_of(vec![BoundValue::Integer(1), BoundValue::Integer(2), BoundValue::Integer(3)]);
        assert!(matches!(v, BoundValue::IntegerArray(items) if items == vec![1, 2, 3]));
    }

    #[test]
    fn array_of_text_falls_back_to_text_array() {
        let v = BoundValue::array_of(vec![BoundValue::Text("a".into()), BoundValue::Text("b".into())]);
        assert!(matches!(v, BoundValue::TextArray(items) if items == vec!["a".to_string(), "b".to_string()]));
    }
}
