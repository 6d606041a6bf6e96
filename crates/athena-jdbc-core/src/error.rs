//! Error types for athena-jdbc operations.
//!
//! The variants follow the DB-API exception classes: misuse of the API is a
//! [`ProgrammingError`], failures reported by the remote engine are a
//! [`DatabaseError`], capabilities the engine does not have are a
//! [`NotSupportedError`], and bridge faults that are not SQL exceptions end up
//! in [`BridgeError`].

use std::fmt;

/// The primary error type for all athena-jdbc operations.
#[derive(Debug)]
pub enum Error {
    /// API misuse: closed resources, bad SQL templates, bad parameters
    Programming(ProgrammingError),
    /// Execution failure reported by the remote engine
    Database(DatabaseError),
    /// A remote value could not be decoded
    Data(DataError),
    /// Capability the backing engine does not have
    NotSupported(NotSupportedError),
    /// Native bridge fault that is not a SQL exception
    Bridge(BridgeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgrammingError {
    pub kind: ProgrammingErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgrammingErrorKind {
    /// Operation on a closed cursor or connection
    Closed,
    /// Query template is empty or blank
    EmptyQuery,
    /// Template references a parameter that was not supplied
    MissingParameter,
    /// No formatter is registered for a parameter's type
    UnsupportedParameter,
    /// Parameter value could not be rendered (malformed decimal, NaN, ...)
    InvalidParameter,
    /// Malformed placeholder syntax in the template
    InvalidTemplate,
    /// Fetch without a result set
    NoResultSet,
    /// Cursor setting out of range
    OutOfRange,
    /// Connection options could not be resolved
    Configuration,
}

#[derive(Debug)]
pub struct DatabaseError {
    pub message: String,
    pub sql: Option<String>,
    pub sql_state: Option<String>,
    pub source: Option<NativeError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataError {
    pub expected: &'static str,
    pub actual: String,
    /// 1-based column ordinal
    pub column: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotSupportedError {
    pub message: String,
}

#[derive(Debug)]
pub struct BridgeError {
    pub message: String,
    pub source: Option<NativeError>,
}

/// An exception raised on the native side of the bridge.
///
/// Native exceptions nest: a driver-level `SQLException` usually wraps the
/// service error that actually explains the failure. The full chain is kept
/// so callers can inspect it through `std::error::Error::source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    /// Fully qualified class name of the native exception
    pub class_name: String,
    pub message: Option<String>,
    pub sql_state: Option<String>,
    /// Whether the exception is a `java.sql.SQLException` (or subclass)
    pub sql_exception: bool,
    pub cause: Option<Box<NativeError>>,
}

impl NativeError {
    /// A `java.sql.SQLException`-family error.
    pub fn sql(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: Some(message.into()),
            sql_state: None,
            sql_exception: true,
            cause: None,
        }
    }

    /// Any other native exception.
    pub fn runtime(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: Some(message.into()),
            sql_state: None,
            sql_exception: false,
            cause: None,
        }
    }

    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    pub fn with_cause(mut self, cause: NativeError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Iterate this error followed by each nested cause.
    pub fn chain(&self) -> impl Iterator<Item = &NativeError> {
        std::iter::successors(Some(self), |e| e.cause.as_deref())
    }

    /// The message of the deepest cause that carries one.
    pub fn innermost_message(&self) -> Option<&str> {
        self.chain()
            .filter_map(|e| e.message.as_deref())
            .filter(|m| !m.trim().is_empty())
            .last()
    }

    /// The first SQLSTATE found walking down the chain.
    pub fn sql_state(&self) -> Option<&str> {
        self.chain().find_map(|e| e.sql_state.as_deref())
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {}", self.class_name, msg),
            None => write!(f, "{}", self.class_name),
        }
    }
}

impl std::error::Error for NativeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

impl Error {
    /// Build a programming error.
    pub fn programming(kind: ProgrammingErrorKind, message: impl Into<String>) -> Self {
        Error::Programming(ProgrammingError {
            kind,
            message: message.into(),
        })
    }

    /// The error every operation on a closed resource returns.
    ///
    /// `resource` is `"Connection"` or `"Cursor"`.
    pub fn closed(resource: &str) -> Self {
        Self::programming(
            ProgrammingErrorKind::Closed,
            format!("{resource} is closed."),
        )
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Error::NotSupported(NotSupportedError {
            message: message.into(),
        })
    }

    /// Translate a native exception into this crate's taxonomy.
    ///
    /// SQL exceptions become [`DatabaseError`] carrying the innermost message
    /// of the cause chain; anything else is a [`BridgeError`]. The native
    /// error is preserved as the source either way.
    pub fn from_native(err: NativeError, sql: Option<&str>) -> Self {
        let message = err
            .innermost_message()
            .map_or_else(|| err.class_name.clone(), str::to_string);
        if err.sql_exception {
            Error::Database(DatabaseError {
                message,
                sql: sql.map(str::to_string),
                sql_state: err.sql_state().map(str::to_string),
                source: Some(err),
            })
        } else {
            Error::Bridge(BridgeError {
                message,
                source: Some(err),
            })
        }
    }

    /// DB-API class name of this error.
    pub fn class_name(&self) -> &'static str {
        match self {
            Error::Programming(_) => "ProgrammingError",
            Error::Database(_) => "DatabaseError",
            Error::Data(_) => "DataError",
            Error::NotSupported(_) => "NotSupportedError",
            Error::Bridge(_) => "Error",
        }
    }

    pub fn is_programming(&self) -> bool {
        matches!(self, Error::Programming(_))
    }

    /// Is this a failure that originated in the database (including decode errors)?
    pub fn is_database(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Data(_))
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, Error::NotSupported(_))
    }

    /// Programming error kind, if this is a programming error.
    pub fn programming_kind(&self) -> Option<ProgrammingErrorKind> {
        match self {
            Error::Programming(p) => Some(p.kind),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Database(d) => d.sql.as_deref(),
            _ => None,
        }
    }

    /// Get SQLSTATE if available
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Error::Database(d) => d.sql_state.as_deref(),
            _ => None,
        }
    }

    /// The native exception this error was translated from, if any.
    pub fn native(&self) -> Option<&NativeError> {
        match self {
            Error::Database(d) => d.source.as_ref(),
            Error::Bridge(b) => b.source.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Programming(e) => write!(f, "{}", e.message),
            Error::Database(e) => {
                if let Some(state) = &e.sql_state {
                    write!(f, "{} (SQLSTATE {})", e.message, state)
                } else {
                    write!(f, "{}", e.message)
                }
            }
            Error::Data(e) => write!(f, "{}", e),
            Error::NotSupported(e) => write!(f, "{}", e.message),
            Error::Bridge(e) => write!(f, "{}", e.message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.native()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

impl fmt::Display for ProgrammingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = self.column {
            write!(
                f,
                "expected {} in column {}, found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for NotSupportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<NativeError> for Error {
    fn from(err: NativeError) -> Self {
        Error::from_native(err, None)
    }
}

impl From<ProgrammingError> for Error {
    fn from(err: ProgrammingError) -> Self {
        Error::Programming(err)
    }
}

impl From<DataError> for Error {
    fn from(err: DataError) -> Self {
        Error::Data(err)
    }
}

impl From<NotSupportedError> for Error {
    fn from(err: NotSupportedError) -> Self {
        Error::NotSupported(err)
    }
}

/// Result type alias for athena-jdbc operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    fn nested() -> NativeError {
        NativeError::sql("java.sql.SQLException", "[Simba]AthenaJDBC error")
            .with_cause(
                NativeError::runtime(
                    "com.amazonaws.services.athena.model.InvalidRequestException",
                    "line 1:8: Column 'foo' cannot be resolved",
                )
                .with_sql_state("42000"),
            )
    }

    #[test]
    fn sql_exception_becomes_database_error_with_innermost_message() {
        let err = Error::from_native(nested(), Some("SELECT foo"));
        assert!(err.is_database());
        assert_eq!(err.class_name(), "DatabaseError");
        assert_eq!(err.to_string(), "line 1:8: Column 'foo' cannot be resolved (SQLSTATE 42000)");
        assert_eq!(err.sql(), Some("SELECT foo"));
        assert_eq!(err.sql_state(), Some("42000"));
    }

    #[test]
    fn source_chain_is_preserved() {
        let err = Error::from_native(nested(), None);
        let outer = err.source().expect("native source");
        assert!(outer.to_string().starts_with("java.sql.SQLException"));
        let inner = outer.source().expect("nested cause");
        assert!(inner.to_string().contains("cannot be resolved"));
        assert!(inner.source().is_none());
    }

    #[test]
    fn non_sql_exception_becomes_bridge_error() {
        let err: Error = NativeError::runtime("java.lang.NullPointerException", "").into();
        assert_eq!(err.class_name(), "Error");
        assert!(!err.is_database());
        // Blank messages fall back to the class name
        assert_eq!(err.to_string(), "java.lang.NullPointerException");
    }

    #[test]
    fn innermost_message_skips_blank_causes() {
        let err = NativeError::sql("java.sql.SQLException", "outer")
            .with_cause(NativeError::runtime("java.lang.RuntimeException", "  "));
        assert_eq!(err.innermost_message(), Some("outer"));
        assert_eq!(err.chain().count(), 2);
    }

    #[test]
    fn closed_helper() {
        let err = Error::closed("Connection");
        assert!(err.is_programming());
        assert_eq!(err.programming_kind(), Some(ProgrammingErrorKind::Closed));
        assert_eq!(err.to_string(), "Connection is closed.");
    }
}
