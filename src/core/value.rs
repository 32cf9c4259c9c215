//! Values and rows exchanged with the driver.

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A single column value, either bound as a statement parameter or read back
/// from a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
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

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the value as a SQL literal for logs and error messages.
    ///
    /// Text is double-quoted with embedded quotes doubled. The output is never
    /// sent to the driver; statements always bind values as parameters.
    pub fn to_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => format!("\"{}\"", s.replace('"', "\"\"")),
            Value::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{:02X}", byte)).collect();
                format!("X'{}'", hex)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Blob(b) => write!(f, "<BLOB: {} bytes>", b.len()),
            other => f.write_str(&other.to_literal()),
        }
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Null => ValueRef::Null,
            Value::Integer(i) => ValueRef::Integer(*i),
            Value::Real(f) => ValueRef::Real(*f),
            Value::Text(s) => ValueRef::Text(s.as_bytes()),
            Value::Blob(b) => ValueRef::Blob(b),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::Integer(i64::from(value))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Real(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Shape used when rows are rendered to JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowFormat {
    /// One object per row, keyed by column name
    #[default]
    #[serde(alias = "dict")]
    Map,
    /// One array per row, in column order
    #[serde(alias = "tuple")]
    Sequence,
}

/// One result row. Column names are shared between all rows of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Row { columns, values }
    }

    /// Looks up a value by column name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    pub fn to_json(&self, format: RowFormat) -> serde_json::Result<serde_json::Value> {
        match format {
            RowFormat::Map => {
                let mut map = serde_json::Map::with_capacity(self.values.len());
                for (column, value) in self.iter() {
                    map.insert(column.to_string(), serde_json::to_value(value)?);
                }
                Ok(serde_json::Value::Object(map))
            }
            RowFormat::Sequence => serde_json::to_value(&self.values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_row() -> Row {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string(), "score".to_string()].into();
        Row::new(
            columns,
            vec![Value::Integer(7), Value::from("Alice"), Value::Null],
        )
    }

    #[test]
    fn test_literal_rendering() {
        assert_eq!(Value::Null.to_literal(), "NULL");
        assert_eq!(Value::from(42).to_literal(), "42");
        assert_eq!(Value::from(1.5).to_literal(), "1.5");
        assert_eq!(Value::from("x").to_literal(), "\"x\"");
        assert_eq!(Value::from("say \"hi\"").to_literal(), "\"say \"\"hi\"\"\"");
        assert_eq!(Value::from(vec![0x48u8, 0x69]).to_literal(), "X'4869'");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(true), Value::Integer(1));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".to_string()));
        assert_eq!(Value::from(ValueRef::Text(b"abc")), Value::Text("abc".to_string()));
        assert_eq!(Value::Integer(3).as_f64(), Some(3.0));
    }

    #[test]
    fn test_row_lookup() {
        let row = sample_row();
        assert_eq!(row.get("name"), Some(&Value::from("Alice")));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get_index(0).and_then(Value::as_i64), Some(7));
        assert_eq!(row.len(), 3);
        let columns: Vec<&str> = row.iter().map(|(c, _)| c).collect();
        assert_eq!(columns, vec!["id", "name", "score"]);
    }

    #[test]
    fn test_row_json_formats() {
        let row = sample_row();
        assert_eq!(
            row.to_json(RowFormat::Map).unwrap(),
            json!({"id": 7, "name": "Alice", "score": null})
        );
        assert_eq!(
            row.to_json(RowFormat::Sequence).unwrap(),
            json!([7, "Alice", null])
        );
    }
}
