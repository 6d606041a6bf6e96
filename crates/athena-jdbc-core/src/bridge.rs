//! The native bridge contract.
//!
//! The driver never talks to the query service itself. It drives a JDBC
//! driver living inside a native runtime through the traits below, which
//! mirror the slice of `java.sql` the driver uses:
//!
//! - [`Runtime`] - the process-wide native runtime hosting the JDBC driver
//! - [`Session`] - a `java.sql.Connection`
//! - [`Statement`] - a `java.sql.Statement`
//! - [`ResultSet`] / [`ResultSetMetaData`] - forward-only result access
//!
//! Every call is synchronous and may fail with a [`NativeError`]; the driver
//! translates those at the call site. Column ordinals are 1-based.

use crate::error::NativeError;
use crate::types::TypeCatalog;
use crate::value::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Result of a bridge call.
pub type NativeResult<T> = std::result::Result<T, NativeError>;

/// Options used to start the native runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Path to the runtime's shared library; `None` lets the runtime pick its default
    pub library_path: Option<PathBuf>,
    /// Startup arguments, in order
    pub args: Vec<String>,
}

impl RuntimeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Ordered `java.util.Properties` handed to the JDBC driver on connect.
///
/// Insertion order is kept; setting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverProperties {
    entries: Vec<(String, String)>,
}

impl DriverProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// The native runtime hosting the JDBC driver.
///
/// A runtime is started at most once per process and every OS thread that
/// calls into it must be attached first.
pub trait Runtime: Send + Sync {
    /// Start the runtime. Called once, under the driver's bootstrap lock.
    fn start(&self, options: &RuntimeOptions) -> NativeResult<()>;

    fn is_started(&self) -> bool;

    /// Attach the calling OS thread. Attaching an attached thread is a no-op.
    fn attach_current_thread(&self) -> NativeResult<()>;

    fn is_thread_attached(&self) -> bool;

    /// The live `java.sql.Types` catalog of this runtime.
    fn type_catalog(&self) -> NativeResult<TypeCatalog>;

    /// `DriverManager.getConnection(url, properties)`.
    fn connect(&self, url: &str, properties: &DriverProperties)
    -> NativeResult<Arc<dyn Session>>;
}

/// An open `java.sql.Connection`.
pub trait Session: Send + Sync {
    fn create_statement(&self) -> NativeResult<Arc<dyn Statement>>;

    fn close(&self) -> NativeResult<()>;

    fn is_closed(&self) -> bool;
}

/// A `java.sql.Statement`.
///
/// Shared between the cursor that executes it and whoever cancels it, so
/// every method takes `&self`. `cancel` must be callable while `execute` is
/// blocked on another thread.
pub trait Statement: Send + Sync {
    /// Execute `sql`; `true` when the first result is a result set.
    fn execute(&self, sql: &str) -> NativeResult<bool>;

    /// The current result set, if the last execute produced one.
    fn result_set(&self) -> NativeResult<Option<Box<dyn ResultSet>>>;

    /// Rows affected by the last execute; `-1` when it produced a result set.
    fn update_count(&self) -> NativeResult<i64>;

    fn cancel(&self) -> NativeResult<()>;

    fn close(&self) -> NativeResult<()>;

    fn is_closed(&self) -> bool;
}

/// A forward-only `java.sql.ResultSet`.
///
/// Getters follow JDBC: on SQL NULL the primitive getters return a zero
/// value, the object getters return `None`, and [`ResultSet::was_null`]
/// reports `true` until the next getter call.
pub trait ResultSet: Send {
    fn set_fetch_size(&mut self, rows: usize) -> NativeResult<()>;

    fn metadata(&mut self) -> NativeResult<Box<dyn ResultSetMetaData>>;

    /// Advance to the next row; `false` once the rows are exhausted.
    fn next(&mut self) -> NativeResult<bool>;

    /// Whether the last getter read SQL NULL.
    fn was_null(&self) -> NativeResult<bool>;

    fn get_boolean(&mut self, column: usize) -> NativeResult<bool>;

    fn get_long(&mut self, column: usize) -> NativeResult<i64>;

    fn get_double(&mut self, column: usize) -> NativeResult<f64>;

    fn get_string(&mut self, column: usize) -> NativeResult<Option<String>>;

    /// `getDate(column).toString()`, i.e. `YYYY-MM-DD`.
    fn get_date(&mut self, column: usize) -> NativeResult<Option<String>>;

    /// `getTimestamp(column).toString()`, i.e. `YYYY-MM-DD HH:MM:SS.f...`.
    fn get_timestamp(&mut self, column: usize) -> NativeResult<Option<String>>;

    /// `getArray(column).toString()`.
    fn get_array(&mut self, column: usize) -> NativeResult<Option<String>>;

    /// `getObject(column)`, in whatever shape the bridge can express it.
    fn get_object(&mut self, column: usize) -> NativeResult<Value>;

    fn close(&mut self) -> NativeResult<()>;

    fn is_closed(&self) -> bool;
}

/// `java.sql.ResultSetMetaData`.
pub trait ResultSetMetaData: Send {
    fn column_count(&self) -> NativeResult<usize>;

    fn column_name(&self, column: usize) -> NativeResult<String>;

    /// The column's `java.sql.Types` code.
    fn column_type(&self, column: usize) -> NativeResult<i32>;

    fn display_size(&self, column: usize) -> NativeResult<i32>;

    fn precision(&self, column: usize) -> NativeResult<i32>;

    fn scale(&self, column: usize) -> NativeResult<i32>;

    /// `columnNoNulls` (0), `columnNullable` (1) or `columnNullableUnknown` (2).
    fn is_nullable(&self, column: usize) -> NativeResult<i32>;
}
