//! Cursor: statement execution and row fetching.
//!
//! A cursor owns one bridge statement for its whole life. Every public
//! operation attaches the calling thread to the runtime and then holds the
//! cursor's state lock until it returns; [`Cursor::cancel`] is the one
//! exception and only touches the statement handle.

use crate::converter::TypeConverter;
use crate::formatter::{ParameterFormatter, Parameters};
use crate::guard::{self, lock};
use athena_jdbc_core::error::ProgrammingErrorKind;
use athena_jdbc_core::{
    BridgeError, ColumnDescription, ColumnInfo, Error, Nullability, Result, ResultSet,
    ResultSetMetaData, Row, Runtime, Session, Statement,
};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Upper bound for [`Cursor::set_arraysize`].
pub const MAX_FETCH_SIZE: usize = 1000;

/// Rows fetched per round trip unless changed.
pub const DEFAULT_ARRAYSIZE: usize = MAX_FETCH_SIZE;

/// Where a cursor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorPhase {
    /// Nothing executed yet, or the last batch left no result
    Idle,
    ResultSet,
    UpdateCount,
    Closed,
}

struct CursorState {
    closed: bool,
    phase: CursorPhase,
    result_set: Option<Box<dyn ResultSet>>,
    metadata: Option<Box<dyn ResultSetMetaData>>,
    column_types: Vec<i32>,
    columns: Arc<ColumnInfo>,
    description: Option<Vec<ColumnDescription>>,
    rownumber: Option<u64>,
    update_count: Option<i64>,
    arraysize: usize,
}

impl CursorState {
    fn new() -> Self {
        Self {
            closed: false,
            phase: CursorPhase::Idle,
            result_set: None,
            metadata: None,
            column_types: Vec::new(),
            columns: Arc::new(ColumnInfo::new(Vec::new())),
            description: None,
            rownumber: None,
            update_count: None,
            arraysize: DEFAULT_ARRAYSIZE,
        }
    }

    /// Forget everything the previous execution produced.
    fn reset(&mut self) -> Result<()> {
        self.description = None;
        self.metadata = None;
        self.column_types.clear();
        self.columns = Arc::new(ColumnInfo::new(Vec::new()));
        self.rownumber = None;
        self.update_count = None;
        self.phase = CursorPhase::Idle;
        if let Some(mut result_set) = self.result_set.take() {
            if !result_set.is_closed() {
                result_set.close()?;
            }
        }
        Ok(())
    }
}

/// A DB-API style cursor bound to one connection's session.
pub struct Cursor {
    runtime: Arc<dyn Runtime>,
    session: Arc<dyn Session>,
    converter: Arc<TypeConverter>,
    formatter: Arc<ParameterFormatter>,
    state: Mutex<CursorState>,
    handle: Mutex<Option<Arc<dyn Statement>>>,
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("Cursor")
            .field("phase", &state.phase)
            .field("rownumber", &state.rownumber)
            .field("arraysize", &state.arraysize)
            .finish_non_exhaustive()
    }
}

impl Cursor {
    pub(crate) fn new(
        runtime: Arc<dyn Runtime>,
        session: Arc<dyn Session>,
        statement: Arc<dyn Statement>,
        converter: Arc<TypeConverter>,
        formatter: Arc<ParameterFormatter>,
    ) -> Self {
        Self {
            runtime,
            session,
            converter,
            formatter,
            state: Mutex::new(CursorState::new()),
            handle: Mutex::new(Some(statement)),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut CursorState) -> Result<T>) -> Result<T> {
        guard::attached(&*self.runtime, || guard::synchronized(&self.state, f))
    }

    fn ensure_open(&self, state: &CursorState) -> Result<()> {
        if state.closed {
            return Err(Error::closed("Cursor"));
        }
        if self.session.is_closed() {
            return Err(Error::closed("Connection"));
        }
        Ok(())
    }

    fn statement(&self) -> Result<Arc<dyn Statement>> {
        lock(&self.handle)
            .clone()
            .ok_or_else(|| Error::closed("Cursor"))
    }

    /// Format `operation` with `parameters` and run it.
    ///
    /// Blocks until the query finishes, fails, or is cancelled from another
    /// thread.
    pub fn execute(&self, operation: &str, parameters: Option<&Parameters>) -> Result<()> {
        self.with_state(|state| self.execute_locked(state, operation, parameters))
    }

    fn execute_locked(
        &self,
        state: &mut CursorState,
        operation: &str,
        parameters: Option<&Parameters>,
    ) -> Result<()> {
        self.ensure_open(state)?;
        let sql = self.formatter.format(operation, parameters)?;
        tracing::debug!(sql = %sql, "Executing query");
        state.reset()?;

        let outcome = self.run(state, &sql);
        if let Err(err) = &outcome {
            tracing::error!(error = %err, sql = %sql, "Query failed");
        }
        outcome
    }

    fn run(&self, state: &mut CursorState, sql: &str) -> Result<()> {
        let statement = self.statement()?;
        let has_result_set = statement
            .execute(sql)
            .map_err(|e| Error::from_native(e, Some(sql)))?;

        if !has_result_set {
            state.update_count = Some(statement.update_count()?);
            state.phase = CursorPhase::UpdateCount;
            return Ok(());
        }

        let mut result_set = statement.result_set()?.ok_or_else(|| {
            Error::Bridge(BridgeError {
                message: "Statement reported a result set but returned none.".to_string(),
                source: None,
            })
        })?;
        result_set.set_fetch_size(state.arraysize)?;
        let metadata = result_set.metadata()?;
        let count = metadata.column_count()?;
        let mut column_types = Vec::with_capacity(count);
        let mut names = Vec::with_capacity(count);
        for column in 1..=count {
            column_types.push(metadata.column_type(column)?);
            names.push(metadata.column_name(column)?);
        }

        state.result_set = Some(result_set);
        state.metadata = Some(metadata);
        state.column_types = column_types;
        state.columns = Arc::new(ColumnInfo::new(names));
        state.rownumber = Some(0);
        state.phase = CursorPhase::ResultSet;
        Ok(())
    }

    /// Run `operation` once per parameter set.
    ///
    /// The cursor is left without a result set afterwards, even when the
    /// statements produced rows or one of them failed.
    pub fn executemany(&self, operation: &str, seq_of_parameters: &[Parameters]) -> Result<()> {
        self.with_state(|state| {
            self.ensure_open(state)?;
            let outcome = seq_of_parameters
                .iter()
                .try_for_each(|parameters| self.execute_locked(state, operation, Some(parameters)));
            let reset = state.reset();
            outcome.and(reset)
        })
    }

    fn fetch_locked(&self, state: &mut CursorState) -> Result<Option<Row>> {
        self.ensure_open(state)?;
        let Some(result_set) = state.result_set.as_mut() else {
            return Err(Error::programming(
                ProgrammingErrorKind::NoResultSet,
                "No result set.",
            ));
        };
        if !result_set.next()? {
            return Ok(None);
        }
        state.rownumber = Some(state.rownumber.map_or(1, |n| n + 1));

        let mut values = Vec::with_capacity(state.column_types.len());
        for (i, type_code) in state.column_types.iter().enumerate() {
            values.push(self.converter.convert(*type_code, &mut **result_set, i + 1)?);
        }
        Ok(Some(Row::with_columns(Arc::clone(&state.columns), values)))
    }

    /// The next row, or `None` once the result set is exhausted.
    pub fn fetchone(&self) -> Result<Option<Row>> {
        self.with_state(|state| self.fetch_locked(state))
    }

    /// Up to `size` rows; `None` or `Some(0)` means [`arraysize`](Self::arraysize).
    pub fn fetchmany(&self, size: Option<usize>) -> Result<Vec<Row>> {
        self.with_state(|state| {
            let size = match size {
                Some(n) if n > 0 => n,
                _ => state.arraysize,
            };
            let mut rows = Vec::with_capacity(size.min(MAX_FETCH_SIZE));
            while rows.len() < size {
                match self.fetch_locked(state)? {
                    Some(row) => rows.push(row),
                    None => break,
                }
            }
            Ok(rows)
        })
    }

    /// Every remaining row.
    pub fn fetchall(&self) -> Result<Vec<Row>> {
        self.with_state(|state| {
            let mut rows = Vec::new();
            while let Some(row) = self.fetch_locked(state)? {
                rows.push(row);
            }
            Ok(rows)
        })
    }

    /// Column descriptions of the current result set.
    ///
    /// Read from the result-set metadata on first access after an execute
    /// and cached until the next execute or close.
    pub fn description(&self) -> Result<Option<Vec<ColumnDescription>>> {
        self.with_state(|state| self.description_locked(state))
    }

    fn description_locked(&self, state: &mut CursorState) -> Result<Option<Vec<ColumnDescription>>> {
        self.ensure_open(state)?;
        if let Some(description) = &state.description {
            return Ok(Some(description.clone()));
        }
        let Some(metadata) = state.metadata.as_ref() else {
            return Ok(None);
        };
        let mut description = Vec::with_capacity(state.column_types.len());
        for (i, type_code) in state.column_types.iter().enumerate() {
            let column = i + 1;
            description.push(ColumnDescription {
                name: state.columns.name_at(i).unwrap_or_default().to_string(),
                type_code: self.converter.type_name(*type_code).map(str::to_string),
                display_size: metadata.display_size(column)?,
                internal_size: None,
                precision: metadata.precision(column)?,
                scale: metadata.scale(column)?,
                null_ok: Nullability::from_code(metadata.is_nullable(column)?),
            });
        }
        state.description = Some(description.clone());
        Ok(Some(description))
    }

    /// Ask the running statement to stop. Safe to call from another thread
    /// while [`execute`](Self::execute) blocks.
    pub fn cancel(&self) -> Result<()> {
        guard::attach(&*self.runtime)?;
        let statement = self.statement()?;
        if self.session.is_closed() {
            return Err(Error::closed("Connection"));
        }
        statement.cancel()?;
        Ok(())
    }

    /// Release the result set and the statement. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        self.with_state(|state| {
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            let reset = state.reset();
            state.phase = CursorPhase::Closed;
            let statement = lock(&self.handle).take();
            let closed = match statement {
                Some(statement) if !statement.is_closed() => statement.close().map_err(Error::from),
                _ => Ok(()),
            };
            tracing::debug!("Cursor closed");
            reset.and(closed)
        })
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    /// Rows fetched since the last execute; `None` without a result set.
    pub fn rownumber(&self) -> Option<u64> {
        lock(&self.state).rownumber
    }

    /// Always -1: the engine does not report affected rows up front.
    pub fn rowcount(&self) -> i64 {
        -1
    }

    /// Update count of the last statement when it produced no rows.
    pub fn update_count(&self) -> Option<i64> {
        let state = lock(&self.state);
        match state.phase {
            CursorPhase::UpdateCount => state.update_count,
            _ => None,
        }
    }

    pub fn phase(&self) -> CursorPhase {
        lock(&self.state).phase
    }

    pub fn arraysize(&self) -> Result<usize> {
        let state = lock(&self.state);
        self.ensure_open(&state)?;
        Ok(state.arraysize)
    }

    /// Set the fetch batch size, between 1 and [`MAX_FETCH_SIZE`].
    pub fn set_arraysize(&self, size: usize) -> Result<()> {
        self.with_state(|state| {
            self.ensure_open(state)?;
            if size == 0 || size > MAX_FETCH_SIZE {
                return Err(Error::programming(
                    ProgrammingErrorKind::OutOfRange,
                    format!("MaxResults is more than maximum allowed length {MAX_FETCH_SIZE}."),
                ));
            }
            state.arraysize = size;
            if let Some(result_set) = state.result_set.as_mut() {
                result_set.set_fetch_size(size)?;
            }
            Ok(())
        })
    }

    /// Accepted and ignored.
    pub fn setinputsizes(&self, _sizes: &[usize]) {}

    /// Accepted and ignored.
    pub fn setoutputsize(&self, _size: usize, _column: Option<usize>) {}

    /// Iterate over the remaining rows.
    pub fn iter(&self) -> Rows<'_> {
        Rows {
            cursor: self,
            done: false,
        }
    }

    pub fn converter(&self) -> &Arc<TypeConverter> {
        &self.converter
    }

    pub fn formatter(&self) -> &Arc<ParameterFormatter> {
        &self.formatter
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(err) = self.close() {
            tracing::debug!(error = %err, "Failed to close cursor on drop");
        }
    }
}

/// Forward-only iterator over a cursor's rows.
///
/// Ends after the last row or after the first error.
#[derive(Debug)]
pub struct Rows<'a> {
    cursor: &'a Cursor,
    done: bool,
}

impl Iterator for Rows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.cursor.fetchone() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl std::iter::FusedIterator for Rows<'_> {}

impl<'a> IntoIterator for &'a Cursor {
    type Item = Result<Row>;
    type IntoIter = Rows<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
