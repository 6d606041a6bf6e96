//! Column-major export of fetched rows.

use crate::cursor::Cursor;
use athena_jdbc_core::{ColumnDescription, Result, Row, Value};
use serde::Serialize;
use serde_json::{Map, Number};

/// Fetched rows laid out column by column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table from a cursor description and its rows.
    pub fn from_rows(description: &[ColumnDescription], rows: Vec<Row>) -> Self {
        let names: Vec<String> = description.iter().map(|d| d.name.clone()).collect();
        let mut columns: Vec<Vec<Value>> = names
            .iter()
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();
        for row in rows {
            let mut values = row.into_values().into_iter();
            for column in &mut columns {
                column.push(values.next().unwrap_or(Value::Null));
            }
        }
        Self { names, columns }
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Values of the first column called `name`.
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        let index = self.names.iter().position(|n| n == name)?;
        self.columns.get(index).map(Vec::as_slice)
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn num_columns(&self) -> usize {
        self.names.len()
    }

    /// A JSON object mapping each column name to its array of values.
    ///
    /// Decimals stay strings, binary becomes lowercase hex, dates and
    /// timestamps use ISO 8601.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = Map::with_capacity(self.names.len());
        for (name, values) in self.names.iter().zip(&self.columns) {
            if object.contains_key(name) {
                continue;
            }
            let array = values.iter().map(value_to_json).collect();
            object.insert(name.clone(), serde_json::Value::Array(array));
        }
        serde_json::Value::Object(object)
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::Number(Number::from(*n)),
        Value::Double(f) => Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::Decimal(s) | Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::String(hex::encode(b)),
        Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
        Value::Timestamp(ts) => {
            serde_json::Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
    }
}

/// Fetch everything left on `cursor` into a [`Table`].
///
/// A cursor without a result set fails the same way `fetchall` does.
pub fn as_table(cursor: &Cursor) -> Result<Table> {
    let description = cursor.description()?.unwrap_or_default();
    let rows = cursor.fetchall()?;
    Ok(Table::from_rows(&description, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use athena_jdbc_core::Nullability;
    use chrono::NaiveDate;

    fn describe(name: &str) -> ColumnDescription {
        ColumnDescription {
            name: name.to_string(),
            type_code: Some("VARCHAR".to_string()),
            display_size: 0,
            internal_size: None,
            precision: 0,
            scale: 0,
            null_ok: Nullability::Unknown,
        }
    }

    fn sample() -> Table {
        let names = vec!["id".to_string(), "name".to_string()];
        let rows = vec![
            Row::new(names.clone(), vec![Value::Int(1), Value::Text("a".into())]),
            Row::new(names, vec![Value::Int(2), Value::Null]),
        ];
        Table::from_rows(&[describe("id"), describe("name")], rows)
    }

    #[test]
    fn rows_are_transposed_into_columns() {
        let table = sample();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.num_columns(), 2);
        assert_eq!(table.column("id"), Some(&[Value::Int(1), Value::Int(2)][..]));
        assert_eq!(
            table.column("name"),
            Some(&[Value::Text("a".into()), Value::Null][..])
        );
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn empty_result_has_named_columns_and_no_rows() {
        let table = Table::from_rows(&[describe("x")], Vec::new());
        assert_eq!(table.column_names(), &["x".to_string()]);
        assert_eq!(table.num_rows(), 0);
    }

    #[test]
    fn json_export_is_keyed_by_column() {
        let json = sample().to_json();
        assert_eq!(json, serde_json::json!({"id": [1, 2], "name": ["a", null]}));
    }

    #[test]
    fn json_export_of_special_values() {
        let names = vec!["d".to_string(), "b".to_string(), "n".to_string(), "f".to_string()];
        let row = Row::new(
            names.clone(),
            vec![
                Value::Date(NaiveDate::from_ymd_opt(2017, 1, 2).unwrap()),
                Value::Bytes(vec![0xde, 0xad]),
                Value::Decimal("0.0000000001".into()),
                Value::Double(f64::NAN),
            ],
        );
        let description: Vec<_> = names.iter().map(|n| describe(n)).collect();
        let json = Table::from_rows(&description, vec![row]).to_json();
        assert_eq!(
            json,
            serde_json::json!({"d": ["2017-01-02"], "b": ["dead"], "n": ["0.0000000001"], "f": [null]})
        );
    }
}
