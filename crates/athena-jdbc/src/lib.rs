//! athena-jdbc - a DB-API style client for Amazon Athena over a JDBC bridge.
//!
//! The driver speaks to Athena through the official JDBC driver hosted in a
//! native runtime. This crate provides:
//!
//! - `Connection`/`Cursor` with DB-API semantics (`execute`, `fetchone`,
//!   `fetchmany`, `fetchall`, `description`, `cancel`)
//! - pyformat parameter substitution (`%(name)s`) with engine-aware escaping
//! - Decoding of JDBC columns into [`Value`]s keyed by the live type catalog
//! - Credential and connection option resolution with environment fallback
//! - Column-major export of results to JSON
//!
//! # Quick Start
//!
//! ```ignore
//! use athena_jdbc::{ConnectOptions, Parameters, connect};
//!
//! let conn = connect(
//!     &ConnectOptions::new()
//!         .region("us-west-2")
//!         .s3_staging_dir("s3://my-bucket/results/")
//!         .runtime(runtime),
//! )?;
//! let cursor = conn.cursor()?;
//! cursor.execute(
//!     "SELECT * FROM many_rows WHERE a > %(a)s",
//!     Some(&Parameters::new().set("a", 10)),
//! )?;
//! for row in &cursor {
//!     println!("{:?}", row?);
//! }
//! ```
//!
//! The bridge runtime is supplied by the caller, either on the options or
//! process-wide through [`runtime::install`].

pub mod config;
pub mod connection;
pub mod converter;
pub mod credentials;
pub mod cursor;
pub mod formatter;
pub mod guard;
pub mod runtime;
pub mod table;

pub use config::{ConnectOptions, ResolvedOptions};
pub use connection::Connection;
pub use converter::{Decoder, TypeConverter};
pub use credentials::{CredentialSettings, Credentials};
pub use cursor::{Cursor, CursorPhase, MAX_FETCH_SIZE, Rows};
pub use formatter::{EscapeStyle, FormatFn, Literal, ParameterFormatter, Parameters};
pub use table::{Table, as_table};

pub use athena_jdbc_core::{
    BridgeError, ColumnDescription, ColumnInfo, DataError, DatabaseError, DbApiType, Error,
    FromValue, JdbcType, NativeError, NotSupportedError, Nullability, ProgrammingError,
    ProgrammingErrorKind, Result, Row, TypeCatalog, Value, ValueKind,
};

/// DB-API level implemented.
pub const APILEVEL: &str = "2.0";
/// Threads may share the module, connections and cursors.
pub const THREADSAFETY: u8 = 3;
pub const PARAMSTYLE: &str = "pyformat";

pub const DRIVER_VERSION: &str = "1.0.0";
pub const ATHENA_JAR: &str = "AthenaJDBC41-1.0.0.jar";
pub const DRIVER_DOWNLOAD_URL: &str =
    "https://s3.amazonaws.com/athena-downloads/drivers/AthenaJDBC41-1.0.0.jar";
pub const DRIVER_CLASS_NAME: &str = "com.amazonaws.athena.jdbc.AthenaDriver";
/// JDBC URL template; `{region}` is replaced with the connection's region.
pub const CONNECTION_STRING: &str = "jdbc:awsathena://athena.{region}.amazonaws.com:443/";

pub type Date = chrono::NaiveDate;
pub type Time = chrono::NaiveTime;
pub type Timestamp = chrono::NaiveDateTime;

/// Open a connection.
pub fn connect(options: &ConnectOptions) -> Result<Connection> {
    Connection::open(options)
}
