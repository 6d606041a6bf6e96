//! Type conversion from result-set columns to [`Value`]s.
//!
//! Decoders are registered by symbolic type name (`"DECIMAL"`) and stored by
//! the numeric code the live type catalog assigns to that name. Codes without
//! a decoder fall back to [`to_object`].

use crate::formatter::normalize_decimal;
use athena_jdbc_core::{DataError, Error, ResultSet, Result, TypeCatalog, Value};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Reads column `column` (1-based) of the current row.
pub type Decoder = Arc<dyn Fn(&mut dyn ResultSet, usize) -> Result<Value> + Send + Sync>;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// The decoders installed by [`TypeConverter::new`], keyed by type name.
pub const DEFAULT_DECODERS: &[(&str, fn(&mut dyn ResultSet, usize) -> Result<Value>)] = &[
    ("NULL", to_null),
    ("BOOLEAN", to_bool),
    ("TINYINT", to_int),
    ("SMALLINT", to_int),
    ("BIGINT", to_int),
    ("INTEGER", to_int),
    ("REAL", to_double),
    ("DOUBLE", to_double),
    ("FLOAT", to_double),
    ("CHAR", to_text),
    ("NCHAR", to_text),
    ("VARCHAR", to_text),
    ("NVARCHAR", to_text),
    ("LONGVARCHAR", to_text),
    ("LONGNVARCHAR", to_text),
    ("DATE", to_date),
    ("TIMESTAMP", to_timestamp),
    ("TIMESTAMP_WITH_TIMEZONE", to_timestamp),
    ("ARRAY", to_array_text),
    ("DECIMAL", to_decimal),
    ("NUMERIC", to_decimal),
    ("BINARY", to_binary),
    ("VARBINARY", to_binary),
    ("LONGVARBINARY", to_binary),
    ("JAVA_OBJECT", to_text),
];

fn malformed(expected: &'static str, actual: &str, column: usize) -> Error {
    Error::Data(DataError {
        expected,
        actual: format!("'{actual}'"),
        column: Some(column),
    })
}

/// Always NULL.
pub fn to_null(_: &mut dyn ResultSet, _: usize) -> Result<Value> {
    Ok(Value::Null)
}

pub fn to_bool(rs: &mut dyn ResultSet, column: usize) -> Result<Value> {
    let value = rs.get_boolean(column)?;
    if rs.was_null()? {
        return Ok(Value::Null);
    }
    Ok(Value::Bool(value))
}

pub fn to_int(rs: &mut dyn ResultSet, column: usize) -> Result<Value> {
    let value = rs.get_long(column)?;
    if rs.was_null()? {
        return Ok(Value::Null);
    }
    Ok(Value::Int(value))
}

pub fn to_double(rs: &mut dyn ResultSet, column: usize) -> Result<Value> {
    let value = rs.get_double(column)?;
    if rs.was_null()? {
        return Ok(Value::Null);
    }
    Ok(Value::Double(value))
}

pub fn to_text(rs: &mut dyn ResultSet, column: usize) -> Result<Value> {
    let value = rs.get_string(column)?;
    if rs.was_null()? {
        return Ok(Value::Null);
    }
    Ok(value.map_or(Value::Null, Value::Text))
}

/// Exact decimal via the column's string form; never through `f64`.
pub fn to_decimal(rs: &mut dyn ResultSet, column: usize) -> Result<Value> {
    let value = rs.get_string(column)?;
    if rs.was_null()? {
        return Ok(Value::Null);
    }
    let Some(text) = value else {
        return Ok(Value::Null);
    };
    let text = text.trim();
    if normalize_decimal(text).is_none() {
        return Err(malformed("decimal", text, column));
    }
    Ok(Value::Decimal(text.to_string()))
}

pub fn to_date(rs: &mut dyn ResultSet, column: usize) -> Result<Value> {
    let value = rs.get_date(column)?;
    if rs.was_null()? {
        return Ok(Value::Null);
    }
    let Some(text) = value else {
        return Ok(Value::Null);
    };
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map(Value::Date)
        .map_err(|_| malformed("date (YYYY-MM-DD)", &text, column))
}

pub fn to_timestamp(rs: &mut dyn ResultSet, column: usize) -> Result<Value> {
    let value = rs.get_timestamp(column)?;
    if rs.was_null()? {
        return Ok(Value::Null);
    }
    let Some(text) = value else {
        return Ok(Value::Null);
    };
    NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT)
        .map(Value::Timestamp)
        .map_err(|_| malformed("timestamp (YYYY-MM-DD HH:MM:SS.ffffff)", &text, column))
}

/// The array's string form, e.g. `[1, 2, 3]`.
pub fn to_array_text(rs: &mut dyn ResultSet, column: usize) -> Result<Value> {
    let value = rs.get_array(column)?;
    if rs.was_null()? {
        return Ok(Value::Null);
    }
    Ok(value.map_or(Value::Null, Value::Text))
}

/// Binary columns arrive as space-separated hex pairs (`"de ad be ef"`).
pub fn to_binary(rs: &mut dyn ResultSet, column: usize) -> Result<Value> {
    let value = rs.get_string(column)?;
    if rs.was_null()? {
        return Ok(Value::Null);
    }
    let Some(text) = value else {
        return Ok(Value::Null);
    };
    let compact: String = text.split(' ').collect();
    hex::decode(&compact)
        .map(Value::Bytes)
        .map_err(|_| malformed("hex-encoded binary", &text, column))
}

/// Fallback for codes without a decoder: whatever the bridge returns.
pub fn to_object(rs: &mut dyn ResultSet, column: usize) -> Result<Value> {
    let value = rs.get_object(column)?;
    if rs.was_null()? {
        return Ok(Value::Null);
    }
    Ok(value)
}

/// Maps wire type codes to decoders.
pub struct TypeConverter {
    catalog: TypeCatalog,
    decoders: RwLock<HashMap<i32, Decoder>>,
}

impl fmt::Debug for TypeConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self
            .read()
            .keys()
            .filter_map(|code| self.catalog.name(*code))
            .collect();
        names.sort_unstable();
        f.debug_struct("TypeConverter")
            .field("catalog_size", &self.catalog.len())
            .field("decoders", &names)
            .finish()
    }
}

impl TypeConverter {
    /// Build a converter over `catalog` with the default decoder table.
    ///
    /// Default entries whose name the catalog lacks are skipped with a warning.
    pub fn new(catalog: TypeCatalog) -> Self {
        let converter = Self {
            catalog,
            decoders: RwLock::new(HashMap::new()),
        };
        for (name, decoder) in DEFAULT_DECODERS {
            converter.register(name, *decoder);
        }
        converter
    }

    /// A converter over the full standard `java.sql.Types` catalog.
    pub fn standard() -> Self {
        Self::new(TypeCatalog::standard())
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<i32, Decoder>> {
        self.decoders.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Decode column `column` (1-based) of the current row.
    pub fn convert(&self, type_code: i32, rs: &mut dyn ResultSet, column: usize) -> Result<Value> {
        let decoder = self.read().get(&type_code).cloned();
        match decoder {
            Some(decoder) => decoder(rs, column),
            None => to_object(rs, column),
        }
    }

    /// Install `decoder` for `type_name`.
    ///
    /// Returns `false`, logging a warning, when the catalog has no such type.
    pub fn register<F>(&self, type_name: &str, decoder: F) -> bool
    where
        F: Fn(&mut dyn ResultSet, usize) -> Result<Value> + Send + Sync + 'static,
    {
        self.register_decoder(type_name, Arc::new(decoder))
    }

    pub fn register_decoder(&self, type_name: &str, decoder: Decoder) -> bool {
        let Some(code) = self.catalog.code(type_name) else {
            tracing::warn!(type_name, "Type is not defined in java.sql.Types");
            return false;
        };
        self.decoders
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(code, decoder);
        true
    }

    /// Remove the decoder for `type_name`, reverting it to [`to_object`].
    pub fn unregister(&self, type_name: &str) -> bool {
        let Some(code) = self.catalog.code(type_name) else {
            return false;
        };
        self.decoders
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&code)
            .is_some()
    }

    pub fn decoder(&self, type_name: &str) -> Option<Decoder> {
        let code = self.catalog.code(type_name)?;
        self.read().get(&code).cloned()
    }

    pub fn type_code(&self, type_name: &str) -> Option<i32> {
        self.catalog.code(type_name)
    }

    pub fn type_name(&self, type_code: i32) -> Option<&str> {
        self.catalog.name(type_code)
    }
}

impl Default for TypeConverter {
    fn default() -> Self {
        Self::standard()
    }
}
