//! In-memory runtime: scripted responses plus call bookkeeping.

use crate::session::MemorySession;
use crate::table::MemoryTable;
use athena_jdbc_core::{
    DriverProperties, NativeError, NativeResult, Runtime, RuntimeOptions, Session, TypeCatalog,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

const SQL_EXCEPTION: &str = "java.sql.SQLException";
const ILLEGAL_STATE: &str = "java.lang.IllegalStateException";

/// What a scripted statement returns.
#[derive(Debug, Clone)]
pub enum Response {
    Rows(MemoryTable),
    UpdateCount(i64),
    Fail(NativeError),
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// State shared by a runtime and every session, statement and result set it
/// hands out.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    started: AtomicBool,
    start_calls: AtomicUsize,
    start_options: Mutex<Option<RuntimeOptions>>,
    start_delay: Mutex<Option<Duration>>,
    attached: Mutex<HashSet<ThreadId>>,
    catalog: Mutex<Option<TypeCatalog>>,
    responses: Mutex<HashMap<String, Response>>,
    latency: Mutex<Option<Duration>>,
    connect_failure: Mutex<Option<NativeError>>,
    connections: Mutex<Vec<(String, DriverProperties)>>,
    executed: Mutex<Vec<String>>,
    fetch_sizes: Mutex<Vec<usize>>,
    metadata_calls: AtomicUsize,
    cancels: AtomicUsize,
    session_closes: AtomicUsize,
    statement_closes: AtomicUsize,
    result_set_closes: AtomicUsize,
}

impl Shared {
    /// Bridge calls from threads that never attached fail, as they would on a real runtime.
    pub(crate) fn ensure_attached(&self) -> NativeResult<()> {
        if lock(&self.attached).contains(&thread::current().id()) {
            Ok(())
        } else {
            Err(NativeError::runtime(
                ILLEGAL_STATE,
                "Current thread is not attached to the runtime",
            ))
        }
    }

    pub(crate) fn record_execute(&self, sql: &str) {
        lock(&self.executed).push(sql.to_string());
    }

    pub(crate) fn response(&self, sql: &str) -> Option<Response> {
        lock(&self.responses).get(sql.trim()).cloned()
    }

    /// Sleep for the configured latency, failing early once `cancelled` is set.
    pub(crate) fn simulate_latency(&self, cancelled: &AtomicBool) -> NativeResult<()> {
        let Some(latency) = *lock(&self.latency) else {
            return if cancelled.load(Ordering::SeqCst) {
                Err(query_cancelled())
            } else {
                Ok(())
            };
        };
        let deadline = Instant::now() + latency;
        loop {
            if cancelled.load(Ordering::SeqCst) {
                return Err(query_cancelled());
            }
            if Instant::now() >= deadline {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    pub(crate) fn record_fetch_size(&self, rows: usize) {
        lock(&self.fetch_sizes).push(rows);
    }

    pub(crate) fn count_metadata_call(&self) {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn count_cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn count_session_close(&self) {
        self.session_closes.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn count_statement_close(&self) {
        self.statement_closes.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn count_result_set_close(&self) {
        self.result_set_closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn query_cancelled() -> NativeError {
    NativeError::sql(SQL_EXCEPTION, "Query cancelled").with_sql_state("HY008")
}

/// SQL with no scripted response fails the way an unknown table does.
pub(crate) fn unscripted(sql: &str) -> NativeError {
    NativeError::sql(
        SQL_EXCEPTION,
        "[Simba][AthenaJDBC](100071) An error has been thrown from the AWS Athena client.",
    )
    .with_cause(NativeError::runtime(
        "com.amazonaws.services.athena.model.InvalidRequestException",
        format!("No response scripted for query: {}", sql.trim()),
    ))
}

/// An in-process [`Runtime`] serving scripted responses.
///
/// Clones share state, so a test can hand one clone to the driver and keep
/// another to script responses and inspect what the driver did.
#[derive(Debug, Clone, Default)]
pub struct MemoryRuntime {
    shared: Arc<Shared>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `catalog` instead of the standard `java.sql.Types` catalog.
    pub fn with_catalog(self, catalog: TypeCatalog) -> Self {
        *lock(&self.shared.catalog) = Some(catalog);
        self
    }

    /// Make `start` take at least `delay`, widening first-use races.
    pub fn with_start_delay(self, delay: Duration) -> Self {
        *lock(&self.shared.start_delay) = Some(delay);
        self
    }

    /// Make every execute block for `latency` unless cancelled.
    pub fn with_latency(self, latency: Duration) -> Self {
        *lock(&self.shared.latency) = Some(latency);
        self
    }

    /// Make `connect` fail with `error`.
    pub fn with_connect_failure(self, error: NativeError) -> Self {
        *lock(&self.shared.connect_failure) = Some(error);
        self
    }

    /// Script the response for `sql` (matched after trimming).
    pub fn respond(&self, sql: &str, response: Response) {
        lock(&self.shared.responses).insert(sql.trim().to_string(), response);
    }

    pub fn respond_rows(&self, sql: &str, table: MemoryTable) {
        self.respond(sql, Response::Rows(table));
    }

    pub fn respond_update_count(&self, sql: &str, count: i64) {
        self.respond(sql, Response::UpdateCount(count));
    }

    pub fn respond_error(&self, sql: &str, error: NativeError) {
        self.respond(sql, Response::Fail(error));
    }

    /// How many times `start` was called.
    pub fn start_calls(&self) -> usize {
        self.shared.start_calls.load(Ordering::SeqCst)
    }

    /// The options the runtime was started with.
    pub fn start_options(&self) -> Option<RuntimeOptions> {
        lock(&self.shared.start_options).clone()
    }

    /// Every `(url, properties)` pair `connect` was called with.
    pub fn connections(&self) -> Vec<(String, DriverProperties)> {
        lock(&self.shared.connections).clone()
    }

    /// Every SQL string executed, in order.
    pub fn executed(&self) -> Vec<String> {
        lock(&self.shared.executed).clone()
    }

    /// Every fetch size set on a result set, in order.
    pub fn fetch_sizes(&self) -> Vec<usize> {
        lock(&self.shared.fetch_sizes).clone()
    }

    /// Number of `ResultSetMetaData` accessor calls.
    pub fn metadata_calls(&self) -> usize {
        self.shared.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.shared.cancels.load(Ordering::SeqCst)
    }

    pub fn session_closes(&self) -> usize {
        self.shared.session_closes.load(Ordering::SeqCst)
    }

    pub fn statement_closes(&self) -> usize {
        self.shared.statement_closes.load(Ordering::SeqCst)
    }

    pub fn result_set_closes(&self) -> usize {
        self.shared.result_set_closes.load(Ordering::SeqCst)
    }
}

impl Runtime for MemoryRuntime {
    fn start(&self, options: &RuntimeOptions) -> NativeResult<()> {
        self.shared.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = *lock(&self.shared.start_delay) {
            thread::sleep(delay);
        }
        if self.shared.started.swap(true, Ordering::SeqCst) {
            return Err(NativeError::runtime(ILLEGAL_STATE, "Runtime is already started"));
        }
        *lock(&self.shared.start_options) = Some(options.clone());
        tracing::debug!(args = ?options.args, "Memory runtime started");
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.shared.started.load(Ordering::SeqCst)
    }

    fn attach_current_thread(&self) -> NativeResult<()> {
        if !self.is_started() {
            return Err(NativeError::runtime(ILLEGAL_STATE, "Runtime is not started"));
        }
        lock(&self.shared.attached).insert(thread::current().id());
        Ok(())
    }

    fn is_thread_attached(&self) -> bool {
        lock(&self.shared.attached).contains(&thread::current().id())
    }

    fn type_catalog(&self) -> NativeResult<TypeCatalog> {
        self.shared.ensure_attached()?;
        Ok(lock(&self.shared.catalog)
            .clone()
            .unwrap_or_else(TypeCatalog::standard))
    }

    fn connect(
        &self,
        url: &str,
        properties: &DriverProperties,
    ) -> NativeResult<Arc<dyn Session>> {
        self.shared.ensure_attached()?;
        lock(&self.shared.connections).push((url.to_string(), properties.clone()));
        if let Some(error) = lock(&self.shared.connect_failure).clone() {
            return Err(error);
        }
        tracing::debug!(url, "Memory session opened");
        Ok(Arc::new(MemorySession::new(Arc::clone(&self.shared))))
    }
}
