//! Rows and cells returned by the query engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Outcome of one executed statement.
///
/// `rows` holds at most the engine's row cap; `total_rows` counts what the
/// statement produced before the cap was applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Row>,
    #[serde(rename = "execution_ms", with = "as_millis")]
    pub execution_time: Duration,
    pub row_count: usize,
    pub total_rows: Option<usize>,
    #[serde(default)]
    pub was_truncated: bool,
}

impl QueryResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an untimed, untruncated result.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self {
            row_count: rows.len(),
            total_rows: Some(rows.len()),
            columns,
            rows,
            ..Self::default()
        }
    }

    pub fn with_execution_time(self, execution_time: Duration) -> Self {
        Self {
            execution_time,
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// All cells of column `index`, top to bottom.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// Message telling the user that rows were dropped by the row cap.
    pub fn truncation_warning(&self) -> Option<String> {
        self.was_truncated.then(|| {
            format!(
                "Result truncated: showing {} of {} rows",
                self.row_count,
                self.total_rows.unwrap_or(self.row_count)
            )
        })
    }
}

/// Result column name and the declared type SQLite reports for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Empty for expressions without a declared type.
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

pub type Row = Vec<Value>;

/// One cell, tagged with its SQLite storage class.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric reading of the cell. Text is parsed, so `"85000"` counts.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null | Value::Blob(_) => None,
        }
    }

    pub fn to_display_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    i64 => Integer,
    f64 => Real,
    String => Text,
    &str => Text,
    Vec<u8> => Blob,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

mod as_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_display_string(), "NULL");
        assert_eq!(Value::Integer(42).to_display_string(), "42");
        assert_eq!(Value::Real(85.5).to_display_string(), "85.5");
        assert_eq!(Value::from("doble").to_display_string(), "doble");
        assert_eq!(Value::Blob(vec![1, 2, 3]).to_display_string(), "<3 bytes>");
    }

    #[test]
    fn test_value_as_f64() {
        assert_eq!(Value::Integer(3).as_f64(), Some(3.0));
        assert_eq!(Value::Real(120.5).as_f64(), Some(120.5));
        assert_eq!(Value::from(" 99.9 ").as_f64(), Some(99.9));
        assert_eq!(Value::from("suite").as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }

    #[test]
    fn test_optional_cells() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".to_string()));
        assert_eq!(Value::from(Some(7i64)), Value::Integer(7));
    }

    #[test]
    fn test_value_serializes_untagged() {
        let row: Row = vec![Value::Integer(1), Value::from("doble"), Value::Null];
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"[1,"doble",null]"#);
    }

    #[test]
    fn test_query_result_with_data() {
        let result = QueryResult::with_data(
            vec![ColumnInfo::new("numero", "TEXT"), ColumnInfo::new("piso", "INTEGER")],
            vec![
                vec![Value::from("101"), Value::Integer(1)],
                vec![Value::from("201"), Value::Integer(2)],
            ],
        );

        assert!(!result.is_empty());
        assert_eq!(result.row_count, 2);
        assert_eq!(result.column_names(), vec!["numero", "piso"]);
        assert_eq!(
            result.column_values(1).collect::<Vec<_>>(),
            vec![&Value::Integer(1), &Value::Integer(2)]
        );
        assert!(result.truncation_warning().is_none());
    }

    #[test]
    fn test_truncation_warning() {
        let mut result = QueryResult::with_data(vec![], vec![vec![], vec![]]);
        result.was_truncated = true;
        result.total_rows = Some(10);
        assert_eq!(
            result.truncation_warning().unwrap(),
            "Result truncated: showing 2 of 10 rows"
        );
    }

    #[test]
    fn test_execution_time_serialized_as_millis() {
        let result = QueryResult::new().with_execution_time(Duration::from_millis(12));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["execution_ms"], 12);
    }
}
