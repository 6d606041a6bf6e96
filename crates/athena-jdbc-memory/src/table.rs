//! Scripted result tables.

use athena_jdbc_core::JdbcType;

/// Column metadata of a scripted result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryColumn {
    pub name: String,
    pub jdbc_type: JdbcType,
    pub display_size: i32,
    pub precision: i32,
    pub scale: i32,
    /// JDBC nullability code; Athena reports `columnNullableUnknown` (2)
    pub nullable: i32,
}

impl MemoryColumn {
    pub fn new(name: impl Into<String>, jdbc_type: JdbcType) -> Self {
        Self {
            name: name.into(),
            jdbc_type,
            display_size: 0,
            precision: 0,
            scale: 0,
            nullable: 2,
        }
    }

    pub fn display_size(mut self, size: i32) -> Self {
        self.display_size = size;
        self
    }

    pub fn precision(mut self, precision: i32, scale: i32) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    pub fn nullable(mut self, code: i32) -> Self {
        self.nullable = code;
        self
    }
}

/// A result set held as wire text, one `Option<String>` per cell.
///
/// Cells are stored the way the JDBC driver hands them out through
/// `getString`: numbers as decimal text, dates as `YYYY-MM-DD`, binary as
/// space-separated hex pairs. `None` is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTable {
    pub(crate) columns: Vec<MemoryColumn>,
    pub(crate) rows: Vec<Vec<Option<String>>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column with default metadata.
    pub fn column(self, name: impl Into<String>, jdbc_type: JdbcType) -> Self {
        self.column_with(MemoryColumn::new(name, jdbc_type))
    }

    pub fn column_with(mut self, column: MemoryColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Append a row. Short rows are padded with NULL, long rows truncated.
    pub fn row<I, S>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let mut row: Vec<Option<String>> = cells.into_iter().map(|c| c.map(Into::into)).collect();
        row.resize(self.columns.len(), None);
        self.rows.push(row);
        self
    }

    pub fn columns(&self) -> &[MemoryColumn] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_column_count() {
        let table = MemoryTable::new()
            .column("a", JdbcType::Integer)
            .column("b", JdbcType::VarChar)
            .row([Some("1")]);
        assert_eq!(table.rows[0], vec![Some("1".to_string()), None]);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn column_builder_sets_metadata() {
        let col = MemoryColumn::new("price", JdbcType::Decimal)
            .precision(10, 2)
            .display_size(12)
            .nullable(1);
        assert_eq!((col.precision, col.scale, col.display_size, col.nullable), (10, 2, 12, 1));
    }
}
