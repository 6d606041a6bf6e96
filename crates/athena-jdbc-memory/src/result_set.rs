//! Forward-only result sets over scripted tables.

use crate::runtime::Shared;
use crate::table::{MemoryColumn, MemoryTable};
use athena_jdbc_core::{JdbcType, NativeError, NativeResult, ResultSet, ResultSetMetaData, Value};
use std::str::FromStr;
use std::sync::Arc;

const SQL_EXCEPTION: &str = "java.sql.SQLException";

fn sql_error(message: impl Into<String>) -> NativeError {
    NativeError::sql(SQL_EXCEPTION, message)
}

fn column_at(columns: &[MemoryColumn], column: usize) -> NativeResult<&MemoryColumn> {
    column
        .checked_sub(1)
        .and_then(|i| columns.get(i))
        .ok_or_else(|| sql_error(format!("Invalid column index: {column}")))
}

pub struct MemoryResultSet {
    shared: Arc<Shared>,
    columns: Arc<Vec<MemoryColumn>>,
    rows: Vec<Vec<Option<String>>>,
    /// Index of the current row; `None` before the first `next`
    position: Option<usize>,
    last_null: bool,
    closed: bool,
}

impl MemoryResultSet {
    pub(crate) fn new(shared: Arc<Shared>, table: MemoryTable) -> Self {
        Self {
            shared,
            columns: Arc::new(table.columns),
            rows: table.rows,
            position: None,
            last_null: false,
            closed: false,
        }
    }

    fn ensure_open(&self) -> NativeResult<()> {
        if self.closed {
            Err(sql_error("ResultSet is closed"))
        } else {
            Ok(())
        }
    }

    /// Read a cell and latch its null flag.
    fn cell(&mut self, column: usize) -> NativeResult<Option<String>> {
        self.shared.ensure_attached()?;
        self.ensure_open()?;
        column_at(&self.columns, column)?;
        let row = self
            .position
            .and_then(|p| self.rows.get(p))
            .ok_or_else(|| sql_error("No current row"))?;
        let value = row.get(column - 1).cloned().flatten();
        self.last_null = value.is_none();
        Ok(value)
    }

    fn parse<T: FromStr>(&mut self, column: usize, zero: T, target: &str) -> NativeResult<T> {
        match self.cell(column)? {
            None => Ok(zero),
            Some(text) => text.trim().parse().map_err(|_| {
                sql_error(format!("Cannot convert value '{text}' in column {column} to {target}"))
            }),
        }
    }
}

impl ResultSet for MemoryResultSet {
    fn set_fetch_size(&mut self, rows: usize) -> NativeResult<()> {
        self.shared.ensure_attached()?;
        self.ensure_open()?;
        self.shared.record_fetch_size(rows);
        Ok(())
    }

    fn metadata(&mut self) -> NativeResult<Box<dyn ResultSetMetaData>> {
        self.shared.ensure_attached()?;
        self.ensure_open()?;
        Ok(Box::new(MemoryMetaData {
            shared: Arc::clone(&self.shared),
            columns: Arc::clone(&self.columns),
        }))
    }

    fn next(&mut self) -> NativeResult<bool> {
        self.shared.ensure_attached()?;
        self.ensure_open()?;
        let next = self.position.map_or(0, |p| (p + 1).min(self.rows.len()));
        self.position = Some(next);
        Ok(next < self.rows.len())
    }

    fn was_null(&self) -> NativeResult<bool> {
        self.ensure_open()?;
        Ok(self.last_null)
    }

    fn get_boolean(&mut self, column: usize) -> NativeResult<bool> {
        match self.cell(column)? {
            None => Ok(false),
            Some(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(sql_error(format!(
                    "Cannot convert value '{text}' in column {column} to boolean"
                ))),
            },
        }
    }

    fn get_long(&mut self, column: usize) -> NativeResult<i64> {
        self.parse(column, 0, "long")
    }

    fn get_double(&mut self, column: usize) -> NativeResult<f64> {
        self.parse(column, 0.0, "double")
    }

    fn get_string(&mut self, column: usize) -> NativeResult<Option<String>> {
        self.cell(column)
    }

    fn get_date(&mut self, column: usize) -> NativeResult<Option<String>> {
        self.cell(column)
    }

    fn get_timestamp(&mut self, column: usize) -> NativeResult<Option<String>> {
        self.cell(column)
    }

    fn get_array(&mut self, column: usize) -> NativeResult<Option<String>> {
        self.cell(column)
    }

    fn get_object(&mut self, column: usize) -> NativeResult<Value> {
        let jdbc_type = column_at(&self.columns, column)?.jdbc_type;
        if self.cell(column)?.is_none() {
            return Ok(Value::Null);
        }
        Ok(match jdbc_type {
            JdbcType::TinyInt | JdbcType::SmallInt | JdbcType::Integer | JdbcType::BigInt => {
                Value::Int(self.get_long(column)?)
            }
            JdbcType::Real | JdbcType::Float | JdbcType::Double => {
                Value::Double(self.get_double(column)?)
            }
            JdbcType::Boolean | JdbcType::Bit => Value::Bool(self.get_boolean(column)?),
            _ => self.cell(column)?.map_or(Value::Null, Value::Text),
        })
    }

    fn close(&mut self) -> NativeResult<()> {
        self.shared.ensure_attached()?;
        if !self.closed {
            self.closed = true;
            self.shared.count_result_set_close();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

struct MemoryMetaData {
    shared: Arc<Shared>,
    columns: Arc<Vec<MemoryColumn>>,
}

impl MemoryMetaData {
    fn column(&self, column: usize) -> NativeResult<&MemoryColumn> {
        self.shared.ensure_attached()?;
        self.shared.count_metadata_call();
        column_at(&self.columns, column)
    }
}

impl ResultSetMetaData for MemoryMetaData {
    fn column_count(&self) -> NativeResult<usize> {
        self.shared.ensure_attached()?;
        self.shared.count_metadata_call();
        Ok(self.columns.len())
    }

    fn column_name(&self, column: usize) -> NativeResult<String> {
        Ok(self.column(column)?.name.clone())
    }

    fn column_type(&self, column: usize) -> NativeResult<i32> {
        Ok(self.column(column)?.jdbc_type.code())
    }

    fn display_size(&self, column: usize) -> NativeResult<i32> {
        Ok(self.column(column)?.display_size)
    }

    fn precision(&self, column: usize) -> NativeResult<i32> {
        Ok(self.column(column)?.precision)
    }

    fn scale(&self, column: usize) -> NativeResult<i32> {
        Ok(self.column(column)?.scale)
    }

    fn is_nullable(&self, column: usize) -> NativeResult<i32> {
        Ok(self.column(column)?.nullable)
    }
}
