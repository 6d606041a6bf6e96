//! Core types and the native bridge contract for athena-jdbc.
//!
//! This crate provides the foundational pieces the driver is built from:
//!
//! - `Error` taxonomy following the DB-API exception classes
//! - `Value` for parameters and decoded columns
//! - `Row` and `ColumnDescription` for results
//! - `JdbcType`/`TypeCatalog` for wire type codes
//! - The `Runtime`/`Session`/`Statement`/`ResultSet` bridge traits

pub mod bridge;
pub mod error;
pub mod row;
pub mod types;
pub mod value;

pub use bridge::{
    DriverProperties, NativeResult, ResultSet, ResultSetMetaData, Runtime, RuntimeOptions,
    Session, Statement,
};
pub use error::{
    BridgeError, DataError, DatabaseError, Error, NativeError, NotSupportedError,
    ProgrammingError, ProgrammingErrorKind, Result,
};
pub use row::{ColumnDescription, ColumnInfo, FromValue, Nullability, Row};
pub use types::{DbApiType, JdbcType, TypeCatalog};
pub use value::{Value, ValueKind};
