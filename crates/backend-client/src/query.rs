//! Equality filters, row-count expectations and typed select helpers.

use crate::api::TableApi;
use crate::error::{BackendError, BackendResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// `column = value` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Query-string form used by the REST interface: `column=eq.value`.
    pub fn to_query_pair(&self) -> (String, String) {
        (self.column.clone(), format!("eq.{}", self.value))
    }

    /// Whether a JSON row satisfies this filter.
    pub fn matches(&self, row: &Value) -> bool {
        match row.get(&self.column) {
            Some(Value::String(s)) => *s == self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// How many rows a query must return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Many,
    ExactlyOne,
    AtMostOne,
}

impl Cardinality {
    pub fn check(self, actual: usize) -> BackendResult<()> {
        let ok = match self {
            Cardinality::Many => true,
            Cardinality::ExactlyOne => actual == 1,
            Cardinality::AtMostOne => actual <= 1,
        };
        if ok {
            Ok(())
        } else {
            Err(BackendError::RowCount {
                expected: self,
                actual,
            })
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cardinality::Many => "any number of",
            Cardinality::ExactlyOne => "exactly one",
            Cardinality::AtMostOne => "at most one",
        })
    }
}

pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> BackendResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(BackendError::from))
        .collect()
}

/// All matching rows, decoded.
pub async fn select_rows<T: DeserializeOwned>(
    tables: &dyn TableApi,
    relation: &str,
    filters: &[Filter],
) -> BackendResult<Vec<T>> {
    let rows = tables.select(relation, "*", filters).await?;
    decode_rows(rows)
}

/// Exactly one matching row; zero or several is an error.
pub async fn select_single<T: DeserializeOwned>(
    tables: &dyn TableApi,
    relation: &str,
    filters: &[Filter],
) -> BackendResult<T> {
    let rows = tables.select(relation, "*", filters).await?;
    Cardinality::ExactlyOne.check(rows.len())?;
    decode_rows(rows)?
        .pop()
        .ok_or(BackendError::RowCount {
            expected: Cardinality::ExactlyOne,
            actual: 0,
        })
}

/// Zero or one matching row; several is an error.
pub async fn select_maybe_single<T: DeserializeOwned>(
    tables: &dyn TableApi,
    relation: &str,
    filters: &[Filter],
) -> BackendResult<Option<T>> {
    let rows = tables.select(relation, "*", filters).await?;
    Cardinality::AtMostOne.check(rows.len())?;
    Ok(decode_rows(rows)?.pop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_query_pair() {
        let filter = Filter::eq("user_id", "abc");
        assert_eq!(
            filter.to_query_pair(),
            ("user_id".to_string(), "eq.abc".to_string())
        );
    }

    #[test]
    fn test_filter_matches_strings_and_scalars() {
        let row = json!({ "id": "1", "count": 3, "owner": null });
        assert!(Filter::eq("id", "1").matches(&row));
        assert!(Filter::eq("count", "3").matches(&row));
        assert!(!Filter::eq("owner", "null").matches(&row));
        assert!(!Filter::eq("missing", "x").matches(&row));
    }

    #[test]
    fn test_cardinality_check() {
        assert!(Cardinality::Many.check(0).is_ok());
        assert!(Cardinality::ExactlyOne.check(1).is_ok());
        assert!(Cardinality::ExactlyOne.check(0).is_err());
        assert!(Cardinality::ExactlyOne.check(2).is_err());
        assert!(Cardinality::AtMostOne.check(0).is_ok());
        assert!(matches!(
            Cardinality::AtMostOne.check(2),
            Err(BackendError::RowCount { actual: 2, .. })
        ));
    }
}
