//! Wire type codes and DB-API type objects.
//!
//! Result columns are tagged with `java.sql.Types` codes. The numeric codes
//! are an implementation detail of the driver; everything user-facing is
//! addressed by the symbolic name (`"VARCHAR"`, `"DECIMAL"`, ...), and the
//! name/code mapping is taken from the live catalog the bridge reports.

use std::collections::HashMap;

/// The `java.sql.Types` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JdbcType {
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    VarChar,
    LongVarChar,
    Date,
    Time,
    Timestamp,
    Binary,
    VarBinary,
    LongVarBinary,
    Null,
    Other,
    JavaObject,
    Distinct,
    Struct,
    Array,
    Blob,
    Clob,
    Ref,
    DataLink,
    Boolean,
    RowId,
    NChar,
    NVarChar,
    LongNVarChar,
    NClob,
    SqlXml,
    RefCursor,
    TimeWithTimezone,
    TimestampWithTimezone,
}

impl JdbcType {
    /// Every constant, in declaration order of `java.sql.Types`.
    pub const ALL: [JdbcType; 39] = [
        JdbcType::Bit,
        JdbcType::TinyInt,
        JdbcType::SmallInt,
        JdbcType::Integer,
        JdbcType::BigInt,
        JdbcType::Float,
        JdbcType::Real,
        JdbcType::Double,
        JdbcType::Numeric,
        JdbcType::Decimal,
        JdbcType::Char,
        JdbcType::VarChar,
        JdbcType::LongVarChar,
        JdbcType::Date,
        JdbcType::Time,
        JdbcType::Timestamp,
        JdbcType::Binary,
        JdbcType::VarBinary,
        JdbcType::LongVarBinary,
        JdbcType::Null,
        JdbcType::Other,
        JdbcType::JavaObject,
        JdbcType::Distinct,
        JdbcType::Struct,
        JdbcType::Array,
        JdbcType::Blob,
        JdbcType::Clob,
        JdbcType::Ref,
        JdbcType::DataLink,
        JdbcType::Boolean,
        JdbcType::RowId,
        JdbcType::NChar,
        JdbcType::NVarChar,
        JdbcType::LongNVarChar,
        JdbcType::NClob,
        JdbcType::SqlXml,
        JdbcType::RefCursor,
        JdbcType::TimeWithTimezone,
        JdbcType::TimestampWithTimezone,
    ];

    /// Numeric type code.
    pub const fn code(self) -> i32 {
        match self {
            JdbcType::Bit => -7,
            JdbcType::TinyInt => -6,
            JdbcType::SmallInt => 5,
            JdbcType::Integer => 4,
            JdbcType::BigInt => -5,
            JdbcType::Float => 6,
            JdbcType::Real => 7,
            JdbcType::Double => 8,
            JdbcType::Numeric => 2,
            JdbcType::Decimal => 3,
            JdbcType::Char => 1,
            JdbcType::VarChar => 12,
            JdbcType::LongVarChar => -1,
            JdbcType::Date => 91,
            JdbcType::Time => 92,
            JdbcType::Timestamp => 93,
            JdbcType::Binary => -2,
            JdbcType::VarBinary => -3,
            JdbcType::LongVarBinary => -4,
            JdbcType::Null => 0,
            JdbcType::Other => 1111,
            JdbcType::JavaObject => 2000,
            JdbcType::Distinct => 2001,
            JdbcType::Struct => 2002,
            JdbcType::Array => 2003,
            JdbcType::Blob => 2004,
            JdbcType::Clob => 2005,
            JdbcType::Ref => 2006,
            JdbcType::DataLink => 70,
            JdbcType::Boolean => 16,
            JdbcType::RowId => -8,
            JdbcType::NChar => -15,
            JdbcType::NVarChar => -9,
            JdbcType::LongNVarChar => -16,
            JdbcType::NClob => 2011,
            JdbcType::SqlXml => 2009,
            JdbcType::RefCursor => 2012,
            JdbcType::TimeWithTimezone => 2013,
            JdbcType::TimestampWithTimezone => 2014,
        }
    }

    /// Symbolic name as spelled in `java.sql.Types`.
    pub const fn name(self) -> &'static str {
        match self {
            JdbcType::Bit => "BIT",
            JdbcType::TinyInt => "TINYINT",
            JdbcType::SmallInt => "SMALLINT",
            JdbcType::Integer => "INTEGER",
            JdbcType::BigInt => "BIGINT",
            JdbcType::Float => "FLOAT",
            JdbcType::Real => "REAL",
            JdbcType::Double => "DOUBLE",
            JdbcType::Numeric => "NUMERIC",
            JdbcType::Decimal => "DECIMAL",
            JdbcType::Char => "CHAR",
            JdbcType::VarChar => "VARCHAR",
            JdbcType::LongVarChar => "LONGVARCHAR",
            JdbcType::Date => "DATE",
            JdbcType::Time => "TIME",
            JdbcType::Timestamp => "TIMESTAMP",
            JdbcType::Binary => "BINARY",
            JdbcType::VarBinary => "VARBINARY",
            JdbcType::LongVarBinary => "LONGVARBINARY",
            JdbcType::Null => "NULL",
            JdbcType::Other => "OTHER",
            JdbcType::JavaObject => "JAVA_OBJECT",
            JdbcType::Distinct => "DISTINCT",
            JdbcType::Struct => "STRUCT",
            JdbcType::Array => "ARRAY",
            JdbcType::Blob => "BLOB",
            JdbcType::Clob => "CLOB",
            JdbcType::Ref => "REF",
            JdbcType::DataLink => "DATALINK",
            JdbcType::Boolean => "BOOLEAN",
            JdbcType::RowId => "ROWID",
            JdbcType::NChar => "NCHAR",
            JdbcType::NVarChar => "NVARCHAR",
            JdbcType::LongNVarChar => "LONGNVARCHAR",
            JdbcType::NClob => "NCLOB",
            JdbcType::SqlXml => "SQLXML",
            JdbcType::RefCursor => "REF_CURSOR",
            JdbcType::TimeWithTimezone => "TIME_WITH_TIMEZONE",
            JdbcType::TimestampWithTimezone => "TIMESTAMP_WITH_TIMEZONE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }
}

/// Bidirectional symbolic-name / numeric-code mapping.
///
/// Built from whatever catalog the bridge exposes, so an older runtime that
/// lacks e.g. `TIMESTAMP_WITH_TIMEZONE` simply has no entry for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeCatalog {
    by_name: HashMap<String, i32>,
    by_code: HashMap<i32, String>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from `(name, code)` pairs.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, i32)>,
        S: Into<String>,
    {
        let mut catalog = Self::new();
        for (name, code) in entries {
            catalog.insert(name, code);
        }
        catalog
    }

    /// The full Java 8 `java.sql.Types` catalog.
    pub fn standard() -> Self {
        Self::from_entries(JdbcType::ALL.iter().map(|t| (t.name(), t.code())))
    }

    pub fn insert(&mut self, name: impl Into<String>, code: i32) {
        let name = name.into();
        if let Some(previous) = self.by_name.insert(name.clone(), code) {
            if previous != code {
                tracing::warn!(name = %name, previous, code, "Type name remapped in catalog");
                self.by_code.remove(&previous);
            }
        }
        self.by_code.insert(code, name);
    }

    pub fn code(&self, name: &str) -> Option<i32> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, code: i32) -> Option<&str> {
        self.by_code.get(&code).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Iterate `(name, code)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.by_name.iter().map(|(n, c)| (n.as_str(), *c))
    }
}

/// DB-API type objects, for comparing against a column description's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbApiType {
    String,
    Binary,
    Number,
    Datetime,
    RowId,
}

impl DbApiType {
    /// The wire type names this type object stands for.
    pub const fn members(self) -> &'static [&'static str] {
        match self {
            DbApiType::String => &[
                "CHAR",
                "NCHAR",
                "VARCHAR",
                "NVARCHAR",
                "LONGVARCHAR",
                "LONGNVARCHAR",
            ],
            DbApiType::Binary => &["BINARY", "VARBINARY", "LONGVARBINARY"],
            DbApiType::Number => &[
                "BOOLEAN", "TINYINT", "SMALLINT", "BIGINT", "INTEGER", "REAL", "DOUBLE", "FLOAT",
                "DECIMAL", "NUMERIC",
            ],
            DbApiType::Datetime => &["TIMESTAMP"],
            DbApiType::RowId => &[""],
        }
    }

    pub fn matches(self, type_name: &str) -> bool {
        self.members().contains(&type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_round_trips_every_constant() {
        let catalog = TypeCatalog::standard();
        assert_eq!(catalog.len(), JdbcType::ALL.len());
        for t in JdbcType::ALL {
            assert_eq!(catalog.code(t.name()), Some(t.code()));
            assert_eq!(catalog.name(t.code()), Some(t.name()));
        }
    }

    #[test]
    fn codes_are_unique() {
        let mut codes: Vec<i32> = JdbcType::ALL.iter().map(|t| t.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), JdbcType::ALL.len());
    }

    #[test]
    fn lookup_by_name_and_code() {
        assert_eq!(JdbcType::from_name("DECIMAL"), Some(JdbcType::Decimal));
        assert_eq!(JdbcType::from_code(12), Some(JdbcType::VarChar));
        assert_eq!(JdbcType::from_name("varchar"), None);
    }

    #[test]
    fn partial_catalog_lacks_missing_names() {
        let catalog = TypeCatalog::from_entries([("VARCHAR", 12), ("INTEGER", 4)]);
        assert!(catalog.contains("VARCHAR"));
        assert!(!catalog.contains("TIMESTAMP_WITH_TIMEZONE"));
        assert_eq!(catalog.name(4), Some("INTEGER"));
    }

    #[test]
    fn remapping_a_name_drops_the_stale_code() {
        let mut catalog = TypeCatalog::from_entries([("CUSTOM", 9000)]);
        catalog.insert("CUSTOM", 9001);
        assert_eq!(catalog.code("CUSTOM"), Some(9001));
        assert_eq!(catalog.name(9000), None);
    }

    #[test]
    fn dbapi_type_objects() {
        assert!(DbApiType::String.matches("VARCHAR"));
        assert!(DbApiType::Number.matches("DECIMAL"));
        assert!(DbApiType::Datetime.matches("TIMESTAMP"));
        assert!(!DbApiType::Datetime.matches("DATE"));
        assert!(DbApiType::Binary.matches("VARBINARY"));
    }
}
