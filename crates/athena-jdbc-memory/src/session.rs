//! Sessions and statements.

use crate::result_set::MemoryResultSet;
use crate::runtime::{Response, Shared, lock, unscripted};
use crate::table::MemoryTable;
use athena_jdbc_core::{NativeError, NativeResult, ResultSet, Session, Statement};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const SQL_EXCEPTION: &str = "java.sql.SQLException";

pub struct MemorySession {
    shared: Arc<Shared>,
    closed: AtomicBool,
}

impl MemorySession {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            closed: AtomicBool::new(false),
        }
    }
}

impl Session for MemorySession {
    fn create_statement(&self) -> NativeResult<Arc<dyn Statement>> {
        self.shared.ensure_attached()?;
        if self.is_closed() {
            return Err(NativeError::sql(SQL_EXCEPTION, "Connection is closed"));
        }
        Ok(Arc::new(MemoryStatement::new(Arc::clone(&self.shared))))
    }

    fn close(&self) -> NativeResult<()> {
        self.shared.ensure_attached()?;
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shared.count_session_close();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct StatementState {
    table: Option<MemoryTable>,
    update_count: i64,
}

pub struct MemoryStatement {
    shared: Arc<Shared>,
    state: Mutex<StatementState>,
    cancelled: AtomicBool,
    closed: AtomicBool,
}

impl MemoryStatement {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            state: Mutex::new(StatementState {
                table: None,
                update_count: -1,
            }),
            cancelled: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> NativeResult<()> {
        if self.is_closed() {
            Err(NativeError::sql(SQL_EXCEPTION, "Statement is closed"))
        } else {
            Ok(())
        }
    }
}

impl Statement for MemoryStatement {
    fn execute(&self, sql: &str) -> NativeResult<bool> {
        self.shared.ensure_attached()?;
        self.ensure_open()?;
        self.cancelled.store(false, Ordering::SeqCst);
        *lock(&self.state) = StatementState {
            table: None,
            update_count: -1,
        };
        self.shared.record_execute(sql);
        tracing::debug!(sql, "Memory statement executing");

        self.shared.simulate_latency(&self.cancelled)?;
        let response = self.shared.response(sql).ok_or_else(|| unscripted(sql))?;
        let mut state = lock(&self.state);
        match response {
            Response::Rows(table) => {
                state.table = Some(table);
                Ok(true)
            }
            Response::UpdateCount(count) => {
                state.update_count = count;
                Ok(false)
            }
            Response::Fail(error) => Err(error),
        }
    }

    fn result_set(&self) -> NativeResult<Option<Box<dyn ResultSet>>> {
        self.shared.ensure_attached()?;
        self.ensure_open()?;
        Ok(lock(&self.state).table.take().map(|table| {
            Box::new(MemoryResultSet::new(Arc::clone(&self.shared), table)) as Box<dyn ResultSet>
        }))
    }

    fn update_count(&self) -> NativeResult<i64> {
        self.shared.ensure_attached()?;
        self.ensure_open()?;
        Ok(lock(&self.state).update_count)
    }

    fn cancel(&self) -> NativeResult<()> {
        self.shared.ensure_attached()?;
        self.ensure_open()?;
        self.cancelled.store(true, Ordering::SeqCst);
        self.shared.count_cancel();
        Ok(())
    }

    fn close(&self) -> NativeResult<()> {
        self.shared.ensure_attached()?;
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shared.count_statement_close();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
